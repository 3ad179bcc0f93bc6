//! The seam between the turn loop and whatever computes a partition.
//!
//! The coordinator only ever sees [`ComputeBackend`]s. In production these
//! are [`RemoteWorker`](super::worker::RemoteWorker)s; the worker service
//! implements the trait too, which lets tests run the whole engine in one
//! process.

use bytes::Bytes;
use core::ops::Range;
use lifegrid_tonic_core::{
    Result,
    lifegrid::{Grid, Partition},
    proto::GridData,
};
use std::sync::{Arc, OnceLock};

/// The grid at a generation boundary, shared read-only by every worker call of
/// the next generation.
///
/// The wire encoding is built at most once per generation no matter how many
/// workers receive it.
#[derive(Debug)]
pub struct Snapshot {
    grid: Grid,
    wire: OnceLock<GridData>,
}

impl Snapshot {
    pub fn new(grid: Grid) -> Self {
        Self {
            grid,
            wire: OnceLock::new(),
        }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn into_grid(self) -> Grid {
        self.grid
    }

    /// The grid as a protobuf message. Cloning shares the cell buffer.
    pub fn wire(&self) -> GridData {
        self.wire
            .get_or_init(|| GridData::from(&self.grid))
            .clone()
    }
}

impl From<Grid> for Snapshot {
    fn from(grid: Grid) -> Self {
        Self::new(grid)
    }
}

/// One worker's share of one generation.
#[derive(Debug, Clone)]
pub struct PartitionJob {
    pub snapshot: Arc<Snapshot>,
    pub partition: Partition,
    /// 1-based number of the generation being computed.
    pub generation: u64,
}

impl PartitionJob {
    pub fn rows(&self) -> Range<usize> {
        self.partition.rows.clone()
    }
}

/// Rows returned by a backend, as claimed by the backend. The pool checks
/// them against the [`PartitionJob`] before stitching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputedRows {
    pub rows: Range<usize>,
    pub cells: Bytes,
}

/// Computes the next generation of one row range.
#[tonic::async_trait]
pub trait ComputeBackend: Send + Sync {
    /// Human readable address, used in errors and logs.
    fn endpoint(&self) -> &str;

    /// Steps `job.partition` of `job.snapshot` by one generation.
    ///
    /// # Errors
    ///
    /// [`Error::WorkerUnreachable`](lifegrid_tonic_core::Error::WorkerUnreachable)
    /// when the backend cannot be reached and
    /// [`Error::WorkerFault`](lifegrid_tonic_core::Error::WorkerFault) when it
    /// was reached but failed.
    async fn compute(&self, job: &PartitionJob) -> Result<ComputedRows>;
}
