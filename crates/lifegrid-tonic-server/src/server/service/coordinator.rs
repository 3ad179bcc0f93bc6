//! `lifegrid.Coordinator`: job submission, status, and cancellation.
//!
//! The service runs one job at a time. `SubmitJob` stays open for the whole
//! run and resolves with the final grid; meanwhile `QueryStatus` and
//! `CancelJob` reach the same job through the service's `current` slot.
//!
//! The turn loop runs on its own task so that it always reaches a terminal
//! state. If the `SubmitJob` caller goes away, a drop guard cancels the job
//! and the task unwinds through the normal cancellation path, releasing any
//! parked status query.
//!
//! ## Shutdown
//!
//! [`CoordinatorService::shutdown`] refuses new jobs, gives the running job
//! `shutdown_timeout` to finish, then cancels it.

use crate::server::{
    config::{CoordinatorConfig, normalize_endpoints},
    engine::coordinator::Coordinator,
    pool::manager::WorkerPool,
    telemetry::{
        decrement_jobs_inflight, increment_job_errors, increment_jobs, increment_jobs_inflight,
        increment_status_queries,
    },
};
use core::time::Duration;
use lifegrid_tonic_core::{
    Error,
    proto::{
        CancelJobRequest, CancelJobResponse, FinalResult, QueryStatusRequest, StatusSnapshot,
        SubmitJobRequest,
        coordinator_server::{Coordinator as CoordinatorRpc, CoordinatorServer},
    },
    types::JobSpec,
};
use parking_lot::Mutex;
use portable_atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status, codec::CompressionEncoding};

#[derive(Clone)]
pub struct CoordinatorService {
    inner: Arc<Inner>,
}

struct Inner {
    config: CoordinatorConfig,
    pool: Arc<WorkerPool>,
    current: Mutex<Option<Arc<Coordinator>>>,
    shutdown: CancellationToken,
    refusing: AtomicBool,
    inflight: AtomicUsize,
}

impl CoordinatorService {
    /// Creates the service with a pool of remote workers from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidJob`] if the worker list is empty or malformed.
    pub fn new(config: CoordinatorConfig) -> lifegrid_tonic_core::Result<Self> {
        let pool = WorkerPool::connect(&config.workers, &config.channel)?
            .with_retries(config.worker_retries);
        Ok(Self::with_pool(config, pool))
    }

    /// Creates the service around an existing pool. `config.workers` is not
    /// consulted.
    pub fn with_pool(config: CoordinatorConfig, pool: WorkerPool) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                pool: Arc::new(pool),
                current: Mutex::new(None),
                shutdown: CancellationToken::new(),
                refusing: AtomicBool::new(false),
                inflight: AtomicUsize::new(0),
            }),
        }
    }

    /// Wraps the service with compression and message limits.
    pub fn into_server(self) -> CoordinatorServer<Self> {
        let max_message_bytes = self.inner.config.channel.max_message_bytes;
        CoordinatorServer::new(self)
            .max_decoding_message_size(max_message_bytes)
            .max_encoding_message_size(max_message_bytes)
            .send_compressed(CompressionEncoding::Zstd)
            .send_compressed(CompressionEncoding::Gzip)
            .accept_compressed(CompressionEncoding::Zstd)
            .accept_compressed(CompressionEncoding::Gzip)
    }

    /// The most recently submitted job, finished or not.
    pub fn job(&self) -> Option<Arc<Coordinator>> {
        self.inner.current.lock().clone()
    }

    pub fn jobs_inflight(&self) -> usize {
        self.inner.inflight.load(Ordering::Acquire)
    }

    /// Stops accepting jobs, waits up to `shutdown_timeout` for the running
    /// job, then cancels whatever is left.
    pub async fn shutdown(&self) {
        // === Phase 0: Stop accepting new jobs ===
        #[cfg(feature = "tracing")]
        tracing::info!("Refusing new jobs");
        self.inner.refusing.store(true, Ordering::Release);

        // === Phase 1: Let the running job finish ===
        #[cfg(feature = "tracing")]
        tracing::info!("Draining in-flight jobs ({} active)", self.jobs_inflight());
        let drained = timeout(self.inner.config.shutdown_timeout, async {
            while self.jobs_inflight() > 0 {
                sleep(Duration::from_millis(100)).await;
            }
        })
        .await;

        if drained.is_err() {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                "Graceful drain timed out ({} jobs still active)",
                self.jobs_inflight()
            );
        }

        // === Phase 2: Cancel the rest ===
        #[cfg(feature = "tracing")]
        tracing::debug!("Cancelling remaining jobs via shutdown token");
        self.inner.shutdown.cancel();

        let unwound = timeout(Duration::from_secs(1), async {
            while self.jobs_inflight() > 0 {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        if unwound.is_err() {
            #[cfg(feature = "tracing")]
            tracing::error!("Cancelled jobs did not unwind in time");
        }
    }

    fn pool_for(&self, workers: &[String]) -> lifegrid_tonic_core::Result<Arc<WorkerPool>> {
        if workers.is_empty() {
            return Ok(Arc::clone(&self.inner.pool));
        }
        let endpoints = normalize_endpoints(workers).map_err(|e| Error::invalid_job(format!("{e:#}")))?;
        let pool = WorkerPool::connect(&endpoints, &self.inner.config.channel)?
            .with_retries(self.inner.config.worker_retries);
        Ok(Arc::new(pool))
    }

    /// Claims the `current` slot for `coordinator`.
    fn claim(&self, coordinator: &Arc<Coordinator>) -> lifegrid_tonic_core::Result<()> {
        let mut current = self.inner.current.lock();
        if current
            .as_ref()
            .is_some_and(|job| !job.state().is_terminal())
        {
            return Err(Error::JobInProgress);
        }
        *current = Some(Arc::clone(coordinator));
        Ok(())
    }
}

/// Counts a job as in flight until dropped, even if its task panics.
struct Inflight(Arc<Inner>);

impl Inflight {
    fn enter(inner: Arc<Inner>) -> Self {
        inner.inflight.fetch_add(1, Ordering::AcqRel);
        increment_jobs_inflight();
        Self(inner)
    }
}

impl Drop for Inflight {
    fn drop(&mut self) {
        self.0.inflight.fetch_sub(1, Ordering::AcqRel);
        decrement_jobs_inflight();
    }
}

#[tonic::async_trait]
impl CoordinatorRpc for CoordinatorService {
    /// Validates the job, runs it to completion, and returns the final grid.
    ///
    /// Invalid jobs, including an empty worker pool, are rejected here and
    /// never reach the turn loop.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(total_turns = req.get_ref().total_turns)))]
    async fn submit_job(
        &self,
        req: Request<SubmitJobRequest>,
    ) -> Result<Response<FinalResult>, Status> {
        if self.inner.refusing.load(Ordering::Acquire) {
            return Err(Error::ServiceShutdown.into());
        }

        let spec = JobSpec::try_from(req.into_inner()).inspect_err(|_| increment_job_errors())?;
        let pool = self.pool_for(&spec.workers)?;
        if pool.is_empty() {
            increment_job_errors();
            return Err(Error::invalid_job("worker list is empty").into());
        }
        let coordinator = Arc::new(Coordinator::with_cancel(
            pool,
            self.inner.shutdown.child_token(),
        ));
        self.claim(&coordinator)?;

        increment_jobs();
        // Cancels the job if this handler is dropped before the job ends.
        let guard = coordinator.cancel_token().clone().drop_guard();

        let job = Arc::clone(&coordinator);
        let inflight = Inflight::enter(Arc::clone(&self.inner));
        let task = tokio::spawn(async move {
            let _inflight = inflight;
            job.run(spec.grid, spec.total_turns).await
        });

        let outcome = task.await.unwrap_or_else(|e| {
            let err = Error::ChannelError {
                context: format!("job task failed: {e}"),
            };
            coordinator.abandon(&err);
            Err(err)
        });
        guard.disarm();

        match outcome {
            Ok(result) => Ok(Response::new(result.into())),
            Err(err) => {
                increment_job_errors();
                Err(err.into())
            }
        }
    }

    async fn query_status(
        &self,
        _req: Request<QueryStatusRequest>,
    ) -> Result<Response<StatusSnapshot>, Status> {
        let Some(job) = self.job() else {
            return Err(Error::QueryBeforeStart.into());
        };
        let snapshot = job.query_status().await?;
        increment_status_queries();
        Ok(Response::new(snapshot))
    }

    async fn cancel_job(
        &self,
        _req: Request<CancelJobRequest>,
    ) -> Result<Response<CancelJobResponse>, Status> {
        let cancelled = self.job().is_some_and(|job| job.cancel());
        #[cfg(feature = "tracing")]
        tracing::info!(cancelled, "Cancel requested");
        Ok(Response::new(CancelJobResponse { cancelled }))
    }
}
