//! Fan-out, barrier, and stitch for one generation.
//!
//! [`WorkerPool::run_generation`] is the only place where worker results
//! become a grid. Each generation:
//!
//! 1. Partitions `[0, height)` across the pool, one range per worker in pool
//!    order (empty ranges included, so indices stay stable).
//! 2. Issues every partition concurrently against the same [`Snapshot`].
//! 3. Waits for all of them (`try_join_all`). The first failure drops the
//!    remaining calls, which aborts the underlying requests.
//! 4. Checks each reply against the range it was asked for, then stitches the
//!    replies into a fresh buffer.
//!
//! The caller's grid is never touched; a failed generation simply yields no
//! grid.

use super::{
    backend::{ComputeBackend, ComputedRows, PartitionJob, Snapshot},
    worker::RemoteWorker,
};
use crate::server::config::ChannelSettings;
use futures::future::try_join_all;
use lifegrid_tonic_core::{
    Error, Result,
    lifegrid::{ALIVE, DEAD, Grid, Stitcher, partition},
};
use std::sync::Arc;

/// A fixed, ordered list of compute backends.
///
/// The order is the partition order: the backend at position `i` always
/// computes partition `i`.
#[derive(Clone)]
pub struct WorkerPool {
    workers: Vec<Arc<dyn ComputeBackend>>,
    retries: usize,
}

impl core::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.endpoints())
            .field("retries", &self.retries)
            .finish()
    }
}

impl WorkerPool {
    pub fn new(workers: Vec<Arc<dyn ComputeBackend>>) -> Self {
        Self {
            workers,
            retries: 0,
        }
    }

    /// Extra attempts for a partition whose backend is unreachable.
    ///
    /// Retries run inside the partition's own future, so they finish before
    /// the generation's barrier releases.
    #[must_use]
    pub fn with_retries(mut self, retries: usize) -> Self {
        self.retries = retries;
        self
    }

    /// Builds a pool of [`RemoteWorker`]s, one per endpoint, in order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidJob`] if the list is empty or an endpoint is
    /// malformed.
    pub fn connect<S: AsRef<str>>(endpoints: &[S], settings: &ChannelSettings) -> Result<Self> {
        if endpoints.is_empty() {
            return Err(Error::invalid_job("worker list is empty"));
        }
        let workers = endpoints
            .iter()
            .map(|endpoint| {
                RemoteWorker::connect(endpoint.as_ref(), settings)
                    .map(|worker| Arc::new(worker) as Arc<dyn ComputeBackend>)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(workers))
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn endpoints(&self) -> Vec<&str> {
        self.workers.iter().map(|w| w.endpoint()).collect()
    }

    /// Computes generation `generation` from `snapshot` across the pool.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidJob`] if the pool is empty.
    /// - [`Error::WorkerUnreachable`] or [`Error::WorkerFault`] from the first
    ///   backend that fails (after retries).
    /// - [`Error::PartitionMismatch`] if a backend returns rows other than the
    ///   ones it was given, or malformed cells.
    /// - [`Error::ChannelError`] if the replies leave rows uncovered.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip_all, fields(generation = generation, workers = self.workers.len())))]
    pub async fn run_generation(&self, snapshot: &Arc<Snapshot>, generation: u64) -> Result<Grid> {
        if self.workers.is_empty() {
            return Err(Error::invalid_job("worker list is empty"));
        }
        let grid = snapshot.grid();

        let calls = partition(grid.height(), self.workers.len())
            .into_iter()
            .zip(&self.workers)
            .map(|(partition, backend)| {
                let job = PartitionJob {
                    snapshot: Arc::clone(snapshot),
                    partition,
                    generation,
                };
                self.dispatch(backend.as_ref(), job)
            });
        let replies = try_join_all(calls).await?;
        stitch(grid, generation, replies)
    }

    async fn dispatch(
        &self,
        backend: &dyn ComputeBackend,
        job: PartitionJob,
    ) -> Result<(PartitionJob, ComputedRows)> {
        let mut attempt = 0;
        loop {
            match backend.compute(&job).await {
                Ok(computed) => {
                    check_reply(&job, &computed)?;
                    return Ok((job, computed));
                }
                Err(err) if err.is_retryable() && attempt < self.retries => {
                    attempt += 1;
                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        worker = job.partition.index,
                        endpoint = backend.endpoint(),
                        attempt,
                        "Retrying partition: {err}"
                    );
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Builds the next grid from checked replies.
///
/// A reply that does not fit is pinned on its worker. Rows that no reply
/// covered are a coordinator fault and become [`Error::ChannelError`].
fn stitch(
    grid: &Grid,
    generation: u64,
    replies: Vec<(PartitionJob, ComputedRows)>,
) -> Result<Grid> {
    let mut stitcher = Stitcher::new(grid.width(), grid.height());
    for (job, computed) in replies {
        stitcher
            .insert(job.rows(), &computed.cells)
            .map_err(|e| mismatch(&job, e))?;
    }
    stitcher.finish().map_err(|e| Error::ChannelError {
        context: format!("generation {generation} left rows unstitched: {e}"),
    })
}

fn mismatch(job: &PartitionJob, reason: impl ToString) -> Error {
    Error::PartitionMismatch {
        worker: job.partition.index,
        generation: job.generation,
        reason: reason.to_string(),
    }
}

fn check_reply(job: &PartitionJob, computed: &ComputedRows) -> Result<()> {
    let expected = job.rows();
    if computed.rows != expected {
        return Err(mismatch(
            job,
            format!("asked for rows {expected:?}, got {:?}", computed.rows),
        ));
    }
    let width = job.snapshot.grid().width();
    if computed.cells.len() != expected.len() * width {
        return Err(mismatch(
            job,
            format!(
                "expected {} cells for rows {expected:?}, got {}",
                expected.len() * width,
                computed.cells.len()
            ),
        ));
    }
    if let Some(index) = computed
        .cells
        .iter()
        .position(|&value| value != DEAD && value != ALIVE)
    {
        return Err(mismatch(
            job,
            format!("invalid cell value {} at offset {index}", computed.cells[index]),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use lifegrid_tonic_core::lifegrid::Partition;

    fn reply(
        snapshot: &Arc<Snapshot>,
        index: usize,
        rows: core::ops::Range<usize>,
    ) -> (PartitionJob, ComputedRows) {
        let cells = snapshot.grid().step_rows(rows.clone()).unwrap();
        let job = PartitionJob {
            snapshot: Arc::clone(snapshot),
            partition: Partition {
                index,
                rows: rows.clone(),
            },
            generation: 3,
        };
        (
            job,
            ComputedRows {
                rows,
                cells: Bytes::from(cells),
            },
        )
    }

    #[test]
    fn stitches_complete_replies() {
        let grid = Grid::from_alive(4, 4, [(1, 0), (1, 1), (1, 2)]).unwrap();
        let snapshot = Arc::new(Snapshot::new(grid.clone()));
        let replies = vec![reply(&snapshot, 0, 0..2), reply(&snapshot, 1, 2..4)];
        assert_eq!(stitch(&grid, 3, replies).unwrap(), grid.step());
    }

    #[test]
    fn missing_rows_are_not_blamed_on_the_job() {
        let grid = Grid::from_alive(4, 4, [(1, 0), (1, 1), (1, 2)]).unwrap();
        let snapshot = Arc::new(Snapshot::new(grid.clone()));
        let err = stitch(&grid, 3, vec![reply(&snapshot, 0, 0..2)]).unwrap_err();
        assert!(matches!(err, Error::ChannelError { .. }), "{err}");
        assert!(err.to_string().contains("generation 3"), "{err}");
    }

    #[test]
    fn overlapping_replies_name_the_worker() {
        let grid = Grid::from_alive(4, 4, [(1, 0), (1, 1), (1, 2)]).unwrap();
        let snapshot = Arc::new(Snapshot::new(grid.clone()));
        let replies = vec![reply(&snapshot, 0, 0..3), reply(&snapshot, 1, 2..4)];
        let err = stitch(&grid, 3, replies).unwrap_err();
        assert!(
            matches!(
                err,
                Error::PartitionMismatch {
                    worker: 1,
                    generation: 3,
                    ..
                }
            ),
            "{err}"
        );
    }
}
