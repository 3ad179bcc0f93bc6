//! A client session against a coordinator.
//!
//! [`GolClient::run`] submits a job and, while the submission is open, polls
//! `QueryStatus` on a fixed interval. Progress and lifecycle notifications go
//! to an `mpsc` channel so the caller decides how to render them.

use super::event::Event;
use anyhow::Context;
use core::time::Duration;
use lifegrid_tonic_core::{
    lifegrid::Grid,
    proto::{
        CancelJobRequest, GridData, QueryStatusRequest, StatusSnapshot, SubmitJobRequest,
        coordinator_client::CoordinatorClient,
    },
    types::JobResult,
};
use tokio::{sync::mpsc, time::MissedTickBehavior};
use tonic::{
    Code, Status,
    codec::CompressionEncoding,
    transport::{Channel, Endpoint},
};

#[derive(Debug, Clone)]
pub struct GolClient {
    inner: CoordinatorClient<Channel>,
}

impl GolClient {
    /// Connects to the coordinator at `url`.
    ///
    /// # Errors
    ///
    /// Fails if `url` is not a valid URI or the coordinator cannot be reached.
    pub async fn connect(url: impl Into<String>, max_message_bytes: usize) -> anyhow::Result<Self> {
        let url = url.into();
        let channel = Endpoint::from_shared(url.clone())
            .with_context(|| format!("invalid coordinator url `{url}`"))?
            .tcp_nodelay(true)
            .connect()
            .await
            .with_context(|| format!("failed to connect to coordinator at {url}"))?;
        Ok(Self::new(channel, max_message_bytes))
    }

    pub fn new(channel: Channel, max_message_bytes: usize) -> Self {
        let inner = CoordinatorClient::new(channel)
            .max_decoding_message_size(max_message_bytes)
            .max_encoding_message_size(max_message_bytes)
            .send_compressed(CompressionEncoding::Zstd)
            .accept_compressed(CompressionEncoding::Zstd);
        Self { inner }
    }

    /// Runs a job to completion and returns its result.
    ///
    /// An empty `workers` list runs on the coordinator's own pool.
    pub async fn submit(
        &self,
        grid: &Grid,
        turns: i64,
        workers: &[String],
    ) -> Result<JobResult, Status> {
        let request = SubmitJobRequest {
            grid: Some(GridData::from(grid)),
            total_turns: turns,
            workers: workers.to_vec(),
        };
        let reply = self.inner.clone().submit_job(request).await?.into_inner();
        JobResult::try_from(reply).map_err(Status::from)
    }

    /// Reports the next generation boundary of the running job.
    pub async fn query_status(&self) -> Result<StatusSnapshot, Status> {
        let reply = self
            .inner
            .clone()
            .query_status(QueryStatusRequest {})
            .await?;
        Ok(reply.into_inner())
    }

    /// Cancels the running job. Returns `false` if nothing was running.
    pub async fn cancel(&self) -> Result<bool, Status> {
        let reply = self.inner.clone().cancel_job(CancelJobRequest {}).await?;
        Ok(reply.into_inner().cancelled)
    }

    /// Submits a job and reports its progress every `progress_interval`.
    ///
    /// Emits [`Event::Started`], then [`Event::Progress`] for every answered
    /// status query, then [`Event::Completed`] if the job succeeded, and
    /// finally [`Event::Quitting`]. Events are dropped silently if the
    /// receiver is gone.
    ///
    /// # Errors
    ///
    /// Returns the submission's error if the job fails.
    pub async fn run(
        &self,
        grid: Grid,
        turns: i64,
        workers: &[String],
        progress_interval: Duration,
        events: mpsc::Sender<Event>,
    ) -> anyhow::Result<JobResult> {
        let _ = events
            .send(Event::Started {
                width: grid.width(),
                height: grid.height(),
                turns,
            })
            .await;

        let submit = self.submit(&grid, turns, workers);
        tokio::pin!(submit);

        let mut ticker = tokio::time::interval(progress_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        let outcome = loop {
            tokio::select! {
                outcome = &mut submit => break outcome,
                _ = ticker.tick() => match self.query_status().await {
                    Ok(status) => {
                        let _ = events
                            .send(Event::Progress {
                                turn: status.current_turn,
                                alive_count: status.alive_cell_count,
                            })
                            .await;
                    }
                    // Not started yet, already finished, or another poller
                    // got there first.
                    Err(status) if matches!(status.code(), Code::FailedPrecondition | Code::ResourceExhausted) => {
                        #[cfg(feature = "tracing")]
                        tracing::trace!("Status unavailable: {}", status.message());
                    }
                    Err(_status) => {
                        #[cfg(feature = "tracing")]
                        tracing::warn!("Status query failed: {}", _status.message());
                    }
                },
            }
        };

        let result = outcome.map_err(|status| {
            anyhow::anyhow!("job failed ({:?}): {}", status.code(), status.message())
        });
        if let Ok(result) = &result {
            let _ = events
                .send(Event::Completed {
                    turn: result.turns_completed,
                    alive_cells: result.alive_cells.clone(),
                })
                .await;
        }
        let _ = events.send(Event::Quitting).await;
        result
    }
}
