//! The turn loop.
//!
//! A [`Coordinator`] owns one job: the authoritative grid, the
//! [`StatusRendezvous`] that status queries go through, and the
//! [`CancellationToken`] that aborts it. [`Coordinator::run`] drives the job
//! to a terminal state:
//!
//! ```text
//! start -> publish(0) -> [ snapshot -> fan out -> barrier -> stitch -> publish(t) ] x turns -> complete
//!                                      |
//!                       worker error / cancel -> fail
//! ```
//!
//! Generations are strictly sequential. The grid is held in an `Arc` that is
//! replaced, never mutated, so every worker call in a generation reads the
//! same snapshot and a failed generation leaves the previous grid intact.

use super::status::{JobState, StatusRendezvous};
use crate::server::{
    pool::{backend::Snapshot, manager::WorkerPool},
    telemetry::{increment_generations, record_generation_duration},
};
use lifegrid_tonic_core::{
    Error, Result, lifegrid::Grid, proto::StatusSnapshot, types::JobResult,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Runs one job across a [`WorkerPool`].
///
/// Status queries and cancellation may come from any task while
/// [`run`](Self::run) is in progress; both go through `&self`.
#[derive(Debug)]
pub struct Coordinator {
    pool: Arc<WorkerPool>,
    status: StatusRendezvous,
    cancel: CancellationToken,
}

impl Coordinator {
    pub fn new(pool: Arc<WorkerPool>) -> Self {
        Self::with_cancel(pool, CancellationToken::new())
    }

    /// Uses `cancel` as the job's token, typically a child of a service-wide
    /// shutdown token.
    pub fn with_cancel(pool: Arc<WorkerPool>, cancel: CancellationToken) -> Self {
        Self {
            pool,
            status: StatusRendezvous::new(),
            cancel,
        }
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub fn state(&self) -> JobState {
        self.status.state()
    }

    pub fn has_pending_query(&self) -> bool {
        self.status.is_pending()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Requests cancellation. Returns `false` if the job had already finished.
    pub fn cancel(&self) -> bool {
        if self.state().is_terminal() {
            return false;
        }
        self.cancel.cancel();
        true
    }

    /// Ends a job whose run can no longer finish, for example because its
    /// task died. A job that already ended is left as it is.
    pub fn abandon(&self, err: &Error) -> bool {
        self.status.settle(err)
    }

    /// Reports the next generation boundary of the running job.
    ///
    /// # Errors
    ///
    /// See [`StatusRendezvous::query`].
    pub async fn query_status(&self) -> Result<StatusSnapshot> {
        self.status.query().await
    }

    /// Runs `total_turns` generations starting from `grid`.
    ///
    /// The job always ends in a terminal state. If this future is dropped
    /// mid-run it becomes `Cancelled`; if it panics, `Failed`. Either way a
    /// parked status query is released.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidJob`] if the pool is empty. The job is not started.
    /// - [`Error::JobInProgress`] if this coordinator already ran a job.
    /// - [`Error::JobCancelled`] if the token fires before the last
    ///   generation is stitched.
    /// - Any error from [`WorkerPool::run_generation`], tagged with the
    ///   failing worker and generation.
    #[cfg_attr(feature = "tracing", tracing::instrument(name = "job", skip_all, fields(width = grid.width(), height = grid.height(), total_turns = total_turns, workers = self.pool.len())))]
    pub async fn run(&self, grid: Grid, total_turns: u64) -> Result<JobResult> {
        if self.pool.is_empty() {
            return Err(Error::invalid_job("worker list is empty"));
        }
        self.status.start()?;
        let _settle = Settle(&self.status);

        match self.turn_loop(grid, total_turns).await {
            Ok(grid) => {
                self.status.complete(total_turns);
                #[cfg(feature = "tracing")]
                tracing::info!(turns = total_turns, "Job completed");
                Ok(JobResult::new(grid, total_turns))
            }
            Err(err) => {
                self.status.fail(&err);
                #[cfg(feature = "tracing")]
                tracing::warn!(turn = self.status.turn(), "Job ended early: {err}");
                Err(err)
            }
        }
    }

    async fn turn_loop(&self, grid: Grid, total_turns: u64) -> Result<Grid> {
        if self.cancel.is_cancelled() {
            return Err(Error::JobCancelled);
        }

        let mut current = Arc::new(Snapshot::new(grid));
        self.status.publish(0, current.grid());

        for turn in 1..=total_turns {
            let started = std::time::Instant::now();

            let next = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Err(Error::JobCancelled),
                next = self.pool.run_generation(&current, turn) => next?,
            };

            current = Arc::new(Snapshot::new(next));
            self.status.publish(turn, current.grid());

            increment_generations();
            record_generation_duration(started.elapsed().as_secs_f64() * 1000.0);
            #[cfg(feature = "tracing")]
            tracing::debug!(turn, "Generation stitched");
        }

        // All worker calls have completed, so this is the only reference.
        Ok(Arc::try_unwrap(current)
            .map(Snapshot::into_grid)
            .unwrap_or_else(|shared| shared.grid().clone()))
    }
}

/// Settles a job whose run ended without reaching a terminal state.
struct Settle<'a>(&'a StatusRendezvous);

impl Drop for Settle<'_> {
    fn drop(&mut self) {
        let err = if std::thread::panicking() {
            Error::ChannelError {
                context: "job panicked".to_string(),
            }
        } else {
            Error::JobCancelled
        };
        if self.0.settle(&err) {
            #[cfg(feature = "tracing")]
            tracing::warn!(turn = self.0.turn(), "Job abandoned mid-run: {err}");
        }
    }
}
