use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use core::time::Duration;
use lifegrid_tonic_core::types::{DEFAULT_MAX_MESSAGE_BYTES, DEFAULT_PROGRESS_INTERVAL};
use std::path::PathBuf;
use tonic::transport::Uri;

/// Command line for the `lifegrid` binary.
///
/// Every option can also be supplied through the environment (or a `.env`
/// file), which is how the worker endpoint list is usually injected in
/// deployments.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "lifegrid",
    version,
    about = "Distributed Game of Life: coordinator, workers, and client"
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Serve `lifegrid.Worker`: step row partitions on request.
    Worker(WorkerArgs),
    /// Serve `lifegrid.Coordinator`: run jobs across a worker pool.
    Coordinator(CoordinatorArgs),
    /// Submit a job to a coordinator and report progress.
    Client(ClientArgs),
}

#[derive(Args, Debug, Clone)]
pub struct WorkerArgs {
    /// Address to listen on.
    ///
    /// Environment variable: `WORKER_ADDR`
    #[arg(long, env = "WORKER_ADDR", default_value_t = String::from("0.0.0.0:8040"))]
    pub server_addr: String,

    /// Largest gRPC message accepted or sent, in bytes.
    ///
    /// Every compute request carries the full grid, so this bounds the largest
    /// grid the worker can step.
    ///
    /// Environment variable: `MAX_MESSAGE_BYTES`
    #[arg(long, env = "MAX_MESSAGE_BYTES", default_value_t = DEFAULT_MAX_MESSAGE_BYTES)]
    pub max_message_bytes: usize,
}

#[derive(Args, Debug, Clone)]
pub struct CoordinatorArgs {
    /// Address to listen on.
    ///
    /// Environment variable: `COORDINATOR_ADDR`
    #[arg(long, env = "COORDINATOR_ADDR", default_value_t = String::from("0.0.0.0:8030"))]
    pub server_addr: String,

    /// Comma separated worker endpoints, e.g. `10.0.0.2:8040,10.0.0.3:8040`.
    ///
    /// The order fixes each worker's partition index. Endpoints without a
    /// scheme are dialled over plain `http://`.
    ///
    /// Environment variable: `WORKERS`
    #[arg(long, env = "WORKERS", value_delimiter = ',', required = true)]
    pub workers: Vec<String>,

    /// Timeout for establishing a connection to a worker, in milliseconds.
    ///
    /// Environment variable: `CONNECT_TIMEOUT_MS`
    #[arg(long, env = "CONNECT_TIMEOUT_MS", default_value_t = 2_000)]
    pub connect_timeout_ms: u64,

    /// Timeout for a single partition computation, in milliseconds.
    ///
    /// Environment variable: `REQUEST_TIMEOUT_MS`
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value_t = 30_000)]
    pub request_timeout_ms: u64,

    /// Extra attempts for a worker that is unreachable.
    ///
    /// Retries happen inside the generation that failed; a generation never
    /// completes with a partition missing.
    ///
    /// Environment variable: `WORKER_RETRIES`
    #[arg(long, env = "WORKER_RETRIES", default_value_t = 0)]
    pub worker_retries: usize,

    /// Largest gRPC message accepted or sent, in bytes.
    ///
    /// Environment variable: `MAX_MESSAGE_BYTES`
    #[arg(long, env = "MAX_MESSAGE_BYTES", default_value_t = DEFAULT_MAX_MESSAGE_BYTES)]
    pub max_message_bytes: usize,

    /// Seconds to let a running job finish before it is cancelled on shutdown.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT`
    #[arg(long, env = "SHUTDOWN_TIMEOUT", default_value_t = 5)]
    pub shutdown_timeout: u64,
}

#[derive(Args, Debug, Clone)]
pub struct ClientArgs {
    /// Coordinator endpoint.
    ///
    /// Environment variable: `COORDINATOR_URL`
    #[arg(long, env = "COORDINATOR_URL", default_value_t = String::from("http://127.0.0.1:8030"))]
    pub coordinator: String,

    /// Raw grid file: row-major, one byte per cell, 0 dead and 255 alive.
    #[arg(long)]
    pub input: PathBuf,

    /// Where to write the final grid, in the same encoding as the input.
    #[arg(long)]
    pub output: Option<PathBuf>,

    #[arg(long)]
    pub width: usize,

    #[arg(long)]
    pub height: usize,

    /// Generations to run.
    #[arg(long, allow_negative_numbers = true)]
    pub turns: i64,

    /// Worker endpoints for this job only. Defaults to the coordinator's pool.
    #[arg(long, value_delimiter = ',')]
    pub workers: Vec<String>,

    /// Interval between progress reports, in milliseconds.
    ///
    /// Environment variable: `PROGRESS_INTERVAL_MS`
    #[arg(long, env = "PROGRESS_INTERVAL_MS", default_value_t = DEFAULT_PROGRESS_INTERVAL.as_millis() as u64)]
    pub progress_interval_ms: u64,

    /// Largest gRPC message accepted or sent, in bytes.
    ///
    /// Environment variable: `MAX_MESSAGE_BYTES`
    #[arg(long, env = "MAX_MESSAGE_BYTES", default_value_t = DEFAULT_MAX_MESSAGE_BYTES)]
    pub max_message_bytes: usize,
}

/// How the coordinator talks to its workers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_message_bytes: usize,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(2),
            request_timeout: Duration::from_secs(30),
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub server_addr: String,
    pub max_message_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub server_addr: String,
    pub workers: Vec<String>,
    pub channel: ChannelSettings,
    pub worker_retries: usize,
    pub shutdown_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub coordinator: String,
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub width: usize,
    pub height: usize,
    pub turns: i64,
    pub workers: Vec<String>,
    pub progress_interval: Duration,
    pub max_message_bytes: usize,
}

/// Normalises a worker endpoint into a dialable URI string.
///
/// `host:port` becomes `http://host:port`; endpoints with a scheme are kept.
///
/// # Errors
///
/// Returns an error if the result does not parse as a URI with an authority.
pub fn normalize_endpoint(raw: &str) -> anyhow::Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        bail!("worker endpoint is empty");
    }
    let endpoint = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };
    let uri: Uri = endpoint
        .parse()
        .with_context(|| format!("invalid worker endpoint `{raw}`"))?;
    if uri.authority().is_none() {
        bail!("worker endpoint `{raw}` has no host");
    }
    Ok(endpoint)
}

/// Normalises every endpoint in order, dropping blank entries.
///
/// # Errors
///
/// Returns the first endpoint that fails [`normalize_endpoint`].
pub fn normalize_endpoints<S: AsRef<str>>(raw: &[S]) -> anyhow::Result<Vec<String>> {
    raw.iter()
        .map(AsRef::as_ref)
        .filter(|s| !s.trim().is_empty())
        .map(normalize_endpoint)
        .collect()
}

fn check_message_bytes(max_message_bytes: usize) -> anyhow::Result<()> {
    if max_message_bytes == 0 {
        bail!("MAX_MESSAGE_BYTES must be greater than 0");
    }
    Ok(())
}

impl TryFrom<WorkerArgs> for WorkerConfig {
    type Error = anyhow::Error;

    fn try_from(args: WorkerArgs) -> Result<Self, Self::Error> {
        check_message_bytes(args.max_message_bytes)?;
        Ok(Self {
            server_addr: args.server_addr,
            max_message_bytes: args.max_message_bytes,
        })
    }
}

impl TryFrom<CoordinatorArgs> for CoordinatorConfig {
    type Error = anyhow::Error;

    fn try_from(args: CoordinatorArgs) -> Result<Self, Self::Error> {
        let workers = normalize_endpoints(&args.workers)?;
        if workers.is_empty() {
            bail!("WORKERS must list at least one worker endpoint");
        }
        if args.connect_timeout_ms == 0 || args.request_timeout_ms == 0 {
            bail!("CONNECT_TIMEOUT_MS and REQUEST_TIMEOUT_MS must be greater than 0");
        }
        check_message_bytes(args.max_message_bytes)?;

        Ok(Self {
            server_addr: args.server_addr,
            workers,
            channel: ChannelSettings {
                connect_timeout: Duration::from_millis(args.connect_timeout_ms),
                request_timeout: Duration::from_millis(args.request_timeout_ms),
                max_message_bytes: args.max_message_bytes,
            },
            worker_retries: args.worker_retries,
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout),
        })
    }
}

impl TryFrom<ClientArgs> for ClientConfig {
    type Error = anyhow::Error;

    fn try_from(args: ClientArgs) -> Result<Self, Self::Error> {
        if args.width == 0 || args.height == 0 {
            bail!("--width and --height must be greater than 0");
        }
        if args.progress_interval_ms == 0 {
            bail!("PROGRESS_INTERVAL_MS must be greater than 0");
        }
        check_message_bytes(args.max_message_bytes)?;

        Ok(Self {
            coordinator: args.coordinator,
            input: args.input,
            output: args.output,
            width: args.width,
            height: args.height,
            // Negative turn counts are the coordinator's to reject.
            turns: args.turns,
            workers: normalize_endpoints(&args.workers)?,
            progress_interval: Duration::from_millis(args.progress_interval_ms),
            max_message_bytes: args.max_message_bytes,
        })
    }
}
