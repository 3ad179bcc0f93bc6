//! Transport wiring for both services.
//!
//! The functions here take any connection stream, so the binary passes a
//! `TcpListenerStream` while tests bind ephemeral loopback ports. Each
//! service is registered with `tonic-health` and flipped to not-serving
//! before the server drains.

use super::{
    config::WorkerConfig,
    service::{coordinator::CoordinatorService, worker::WorkerService},
};
use core::future::Future;
use lifegrid_tonic_core::proto::{
    coordinator_server::CoordinatorServer, worker_server::WorkerServer,
};
use futures::Stream;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::signal;
use tonic::transport::{Server, server::Connected};

/// Serves `lifegrid.Worker` until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the transport fails.
pub async fn serve_worker<I, IO, IE, F>(
    incoming: I,
    config: &WorkerConfig,
    shutdown: F,
) -> anyhow::Result<()>
where
    I: Stream<Item = Result<IO, IE>>,
    IO: AsyncRead + AsyncWrite + Connected + Unpin + Send + 'static,
    IE: Into<tower::BoxError>,
    F: Future<Output = ()>,
{
    let (health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_serving::<WorkerServer<WorkerService>>()
        .await;

    Server::builder()
        .http2_adaptive_window(Some(true))
        .add_service(health_service)
        .add_service(WorkerService::new().into_server(config.max_message_bytes))
        .serve_with_incoming_shutdown(incoming, async move {
            shutdown.await;
            health_reporter
                .set_not_serving::<WorkerServer<WorkerService>>()
                .await;
        })
        .await?;

    #[cfg(feature = "tracing")]
    tracing::info!("Worker shut down successfully");
    Ok(())
}

/// Serves `lifegrid.Coordinator` until `shutdown` resolves, then shuts the
/// service down (see [`CoordinatorService::shutdown`]).
///
/// # Errors
///
/// Returns an error if the transport fails.
pub async fn serve_coordinator<I, IO, IE, F>(
    incoming: I,
    service: CoordinatorService,
    shutdown: F,
) -> anyhow::Result<()>
where
    I: Stream<Item = Result<IO, IE>>,
    IO: AsyncRead + AsyncWrite + Connected + Unpin + Send + 'static,
    IE: Into<tower::BoxError>,
    F: Future<Output = ()>,
{
    let (health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_serving::<CoordinatorServer<CoordinatorService>>()
        .await;

    Server::builder()
        .http2_adaptive_window(Some(true))
        .add_service(health_service)
        .add_service(service.clone().into_server())
        .serve_with_incoming_shutdown(incoming, async move {
            shutdown.await;
            // 1. Publish the status
            health_reporter
                .set_not_serving::<CoordinatorServer<CoordinatorService>>()
                .await;
            // 2. Finish or cancel the running job
            service.shutdown().await;
        })
        .await?;

    #[cfg(feature = "tracing")]
    tracing::info!("Coordinator shut down successfully");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
///
/// # Panics
///
/// Panics if the signal handlers cannot be installed.
pub async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    tokio::select! {
        () = ctrl_c => {
            #[cfg(feature = "tracing")]
            tracing::info!("Received Ctrl+C signal");
        },
        () = terminate => {
            #[cfg(feature = "tracing")]
            tracing::info!("Received SIGTERM signal");
        },
    }

    #[cfg(feature = "tracing")]
    tracing::info!("Shutdown signal received, terminating gracefully...");
}
