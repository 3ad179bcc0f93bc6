//! The `lifegrid` binary: `worker`, `coordinator`, and `client` subcommands.

use anyhow::Context;
use clap::Parser;
use lifegrid_tonic_server::{
    client::{
        event::Event,
        io::{read_grid, write_grid},
        session::GolClient,
    },
    server::{
        config::{
            CliArgs, ClientConfig, Command, CoordinatorConfig, WorkerConfig,
        },
        serve::{serve_coordinator, serve_worker, shutdown_signal},
        service::coordinator::CoordinatorService,
        telemetry::init_telemetry,
    },
};
use tokio::{net::TcpListener, sync::mpsc};
use tokio_stream::wrappers::TcpListenerStream;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();

    match args.command {
        Command::Worker(args) => run_worker(WorkerConfig::try_from(args)?).await,
        Command::Coordinator(args) => run_coordinator(CoordinatorConfig::try_from(args)?).await,
        Command::Client(args) => run_client(ClientConfig::try_from(args)?).await,
    }
}

async fn run_worker(config: WorkerConfig) -> anyhow::Result<()> {
    let providers = init_telemetry("lifegrid-worker")?;

    let listener = TcpListener::bind(&config.server_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.server_addr))?;
    #[cfg(feature = "tracing")]
    tracing::info!("Starting worker on {}", listener.local_addr()?);

    let res = serve_worker(TcpListenerStream::new(listener), &config, shutdown_signal()).await;
    providers.shutdown();
    res
}

async fn run_coordinator(config: CoordinatorConfig) -> anyhow::Result<()> {
    let providers = init_telemetry("lifegrid-coordinator")?;

    let listener = TcpListener::bind(&config.server_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.server_addr))?;
    log_startup_info(&listener.local_addr()?.to_string(), &config);

    let service = CoordinatorService::new(config)?;
    let res = serve_coordinator(TcpListenerStream::new(listener), service, shutdown_signal()).await;
    providers.shutdown();
    res
}

fn log_startup_info(_addr: &str, _config: &CoordinatorConfig) {
    if cfg!(debug_assertions) {
        #[cfg(feature = "tracing")]
        tracing::info!(
            "Starting coordinator on {} with full config: {:#?}",
            _addr,
            _config
        );
    } else {
        #[cfg(feature = "tracing")]
        tracing::info!(
            "Starting coordinator on {} with {} workers",
            _addr,
            _config.workers.len()
        );
    }
}

async fn run_client(config: ClientConfig) -> anyhow::Result<()> {
    let providers = init_telemetry("lifegrid-client")?;

    let grid = read_grid(&config.input, config.width, config.height).await?;
    let client = GolClient::connect(config.coordinator.clone(), config.max_message_bytes).await?;

    let (tx, mut rx) = mpsc::channel::<Event>(16);
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            println!("{event}");
        }
    });

    let result = client
        .run(grid, config.turns, &config.workers, config.progress_interval, tx)
        .await;
    // The sender was moved into `run`, so the printer ends once it is drained.
    let _ = printer.await;

    let res = match result {
        Ok(result) => match &config.output {
            Some(path) => write_grid(path, &result.grid).await,
            None => Ok(()),
        },
        Err(err) => Err(err),
    };
    providers.shutdown();
    res
}
