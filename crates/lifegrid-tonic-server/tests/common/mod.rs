#![allow(dead_code)]

use lifegrid_tonic_server::server::{
    pool::{
        backend::{ComputeBackend, ComputedRows, PartitionJob},
        manager::WorkerPool,
    },
    service::worker::WorkerService,
};
use lifegrid_tonic_core::{Error, Result, lifegrid::Grid};
use portable_atomic::{AtomicBool, AtomicUsize, Ordering};
use rand::{Rng, SeedableRng, rngs::StdRng};
use std::sync::Arc;
use tokio::sync::Notify;

pub fn random_grid(seed: u64, width: usize, height: usize) -> Grid {
    let mut rng = StdRng::seed_from_u64(seed);
    let cells = (0..width * height)
        .map(|_| if rng.random_bool(0.35) { 255 } else { 0 })
        .collect();
    Grid::from_cells(width, height, cells).unwrap()
}

pub fn glider(width: usize, height: usize) -> Grid {
    Grid::from_alive(width, height, [(1, 0), (2, 1), (0, 2), (1, 2), (2, 2)]).unwrap()
}

/// Sequential reference: `grid` after `turns` whole-grid steps.
pub fn reference(grid: &Grid, turns: u64) -> Grid {
    (0..turns).fold(grid.clone(), |grid, _| grid.step())
}

pub fn in_process_pool(workers: usize) -> WorkerPool {
    pool_of((0..workers).map(|_| Arc::new(WorkerService::new()) as Arc<dyn ComputeBackend>))
}

pub fn pool_of(backends: impl IntoIterator<Item = Arc<dyn ComputeBackend>>) -> WorkerPool {
    WorkerPool::new(backends.into_iter().collect())
}

fn unreachable(job: &PartitionJob, endpoint: &str) -> Error {
    Error::WorkerUnreachable {
        worker: job.partition.index,
        endpoint: endpoint.to_string(),
        generation: job.generation,
        reason: "connection refused".into(),
    }
}

/// Sleeps before every partition.
pub struct Slow(pub core::time::Duration);

#[tonic::async_trait]
impl ComputeBackend for Slow {
    fn endpoint(&self) -> &str {
        "slow"
    }

    async fn compute(&self, job: &PartitionJob) -> Result<ComputedRows> {
        tokio::time::sleep(self.0).await;
        WorkerService::new().compute(job).await
    }
}

/// Unreachable for the first `failures` calls, then healthy.
pub struct Flaky {
    pub failures: AtomicUsize,
    pub calls: AtomicUsize,
}

impl Flaky {
    pub fn new(failures: usize) -> Self {
        Self {
            failures: AtomicUsize::new(failures),
            calls: AtomicUsize::new(0),
        }
    }
}

#[tonic::async_trait]
impl ComputeBackend for Flaky {
    fn endpoint(&self) -> &str {
        "flaky"
    }

    async fn compute(&self, job: &PartitionJob) -> Result<ComputedRows> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let left = self.failures.load(Ordering::SeqCst);
        if left > 0 {
            self.failures.store(left - 1, Ordering::SeqCst);
            return Err(unreachable(job, self.endpoint()));
        }
        WorkerService::new().compute(job).await
    }
}

/// Always reports a compute failure.
#[derive(Default)]
pub struct Faulty {
    pub calls: AtomicUsize,
}

#[tonic::async_trait]
impl ComputeBackend for Faulty {
    fn endpoint(&self) -> &str {
        "faulty"
    }

    async fn compute(&self, job: &PartitionJob) -> Result<ComputedRows> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(Error::WorkerFault {
            worker: job.partition.index,
            endpoint: self.endpoint().to_string(),
            generation: job.generation,
            reason: "out of memory".into(),
        })
    }
}

/// Returns rows shifted one down from the requested range.
pub struct Shifted;

#[tonic::async_trait]
impl ComputeBackend for Shifted {
    fn endpoint(&self) -> &str {
        "shifted"
    }

    async fn compute(&self, job: &PartitionJob) -> Result<ComputedRows> {
        let mut computed = WorkerService::new().compute(job).await?;
        computed.rows = computed.rows.start + 1..computed.rows.end + 1;
        Ok(computed)
    }
}

/// Returns one cell too few.
pub struct Truncated;

#[tonic::async_trait]
impl ComputeBackend for Truncated {
    fn endpoint(&self) -> &str {
        "truncated"
    }

    async fn compute(&self, job: &PartitionJob) -> Result<ComputedRows> {
        let mut computed = WorkerService::new().compute(job).await?;
        computed.cells.truncate(computed.cells.len().saturating_sub(1));
        Ok(computed)
    }
}

/// What a [`Gate`] does once released.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateOutcome {
    /// Never completes; only cancellation gets the job past the gate.
    Hang,
    /// Fails as unreachable.
    Unreachable,
    /// Panics, as a backend with a bug would.
    Panic,
}

/// Healthy until generation `at`, where it stops and waits for
/// [`Gate::release`].
pub struct Gate {
    pub at: u64,
    pub outcome: GateOutcome,
    reached: AtomicBool,
    release: Notify,
}

impl Gate {
    pub fn new(at: u64, outcome: GateOutcome) -> Self {
        Self {
            at,
            outcome,
            reached: AtomicBool::new(false),
            release: Notify::new(),
        }
    }

    pub async fn wait_reached(&self) {
        while !self.reached.load(Ordering::SeqCst) {
            tokio::time::sleep(core::time::Duration::from_millis(1)).await;
        }
    }

    pub fn release(&self) {
        self.release.notify_one();
    }
}

#[tonic::async_trait]
impl ComputeBackend for Gate {
    fn endpoint(&self) -> &str {
        "http://gate:8040"
    }

    async fn compute(&self, job: &PartitionJob) -> Result<ComputedRows> {
        if job.generation < self.at {
            return WorkerService::new().compute(job).await;
        }
        self.reached.store(true, Ordering::SeqCst);
        match self.outcome {
            GateOutcome::Hang => std::future::pending().await,
            GateOutcome::Unreachable => {
                self.release.notified().await;
                Err(unreachable(job, self.endpoint()))
            }
            GateOutcome::Panic => {
                self.release.notified().await;
                panic!("gate panicked in generation {}", job.generation);
            }
        }
    }
}
