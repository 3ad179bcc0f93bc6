//! The turn loop against in-process backends.

mod common;

use common::*;
use lifegrid_tonic_core::{Error, lifegrid::Grid, proto::StatusSnapshot};
use lifegrid_tonic_server::server::{
    engine::{coordinator::Coordinator, status::JobState},
    pool::{
        backend::{ComputeBackend, Snapshot},
        manager::WorkerPool,
    },
    service::worker::WorkerService,
};
use portable_atomic::Ordering;
use std::sync::Arc;

fn coordinator(pool: WorkerPool) -> Arc<Coordinator> {
    Arc::new(Coordinator::new(Arc::new(pool)))
}

#[tokio::test]
async fn partitioned_generation_matches_whole_grid_step() {
    for seed in 0..4 {
        let grid = random_grid(seed, 23, 17);
        let snapshot = Arc::new(Snapshot::new(grid.clone()));
        for workers in 1..=5 {
            let next = in_process_pool(workers)
                .run_generation(&snapshot, 1)
                .await
                .unwrap();
            assert_eq!(next, grid.step(), "seed={seed} workers={workers}");
        }
    }
}

#[tokio::test]
async fn more_workers_than_rows() {
    let grid = random_grid(9, 6, 3);
    let result = coordinator(in_process_pool(5)).run(grid.clone(), 6).await.unwrap();
    assert_eq!(result.grid, reference(&grid, 6));
}

#[tokio::test]
async fn multi_generation_run_matches_reference() {
    let grid = random_grid(42, 40, 32);
    let result = coordinator(in_process_pool(4)).run(grid.clone(), 25).await.unwrap();
    assert_eq!(result.turns_completed, 25);
    assert_eq!(result.grid, reference(&grid, 25));
    assert_eq!(result.alive_cells, result.grid.alive_cells());
}

#[tokio::test]
async fn zero_turns_returns_the_input() {
    let grid = random_grid(3, 8, 8);
    let result = coordinator(in_process_pool(2)).run(grid.clone(), 0).await.unwrap();
    assert_eq!(result.grid, grid);
    assert_eq!(result.turns_completed, 0);
}

#[tokio::test]
async fn block_is_still_and_blinker_oscillates() {
    let block = Grid::from_alive(6, 6, [(2, 2), (3, 2), (2, 3), (3, 3)]).unwrap();
    for turns in [1, 2, 7] {
        let result = coordinator(in_process_pool(3)).run(block.clone(), turns).await.unwrap();
        assert_eq!(result.grid, block);
    }

    let blinker = Grid::from_alive(5, 5, [(1, 2), (2, 2), (3, 2)]).unwrap();
    let odd = coordinator(in_process_pool(2)).run(blinker.clone(), 1).await.unwrap();
    let even = coordinator(in_process_pool(2)).run(blinker.clone(), 2).await.unwrap();
    assert_ne!(odd.grid, blinker);
    assert_eq!(even.grid, blinker);
}

#[tokio::test]
async fn glider_translates_after_four_generations() {
    let grid = glider(10, 10);
    let result = coordinator(in_process_pool(3)).run(grid, 4).await.unwrap();
    assert_eq!(
        result.grid,
        Grid::from_alive(10, 10, [(2, 1), (3, 2), (1, 3), (2, 3), (3, 3)]).unwrap()
    );
}

#[tokio::test]
async fn a_coordinator_runs_one_job() {
    let job = coordinator(in_process_pool(1));
    job.run(glider(5, 5), 1).await.unwrap();
    assert_eq!(job.run(glider(5, 5), 1).await, Err(Error::JobInProgress));
}

#[tokio::test]
async fn empty_pool_is_an_invalid_job() {
    let job = coordinator(WorkerPool::new(Vec::new()));
    let err = job.run(glider(5, 5), 1).await.unwrap_err();
    assert!(matches!(err, Error::InvalidJob { .. }), "{err}");
    // Rejected before the job started.
    assert_eq!(job.state(), JobState::Idle);
}

#[tokio::test]
async fn queries_outside_a_run_fail_fast() {
    let job = coordinator(in_process_pool(1));
    assert_eq!(job.query_status().await, Err(Error::QueryBeforeStart));
    job.run(glider(5, 5), 3).await.unwrap();
    assert_eq!(job.state(), JobState::Completed);
    assert_eq!(job.query_status().await, Err(Error::QueryBeforeStart));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn status_queries_follow_the_run() {
    const TURNS: u64 = 100;
    let grid = random_grid(7, 24, 24);
    let expected: Vec<u64> = (0..=TURNS)
        .scan(grid.clone(), |current, _| {
            let alive = current.alive_count() as u64;
            *current = current.step();
            Some(alive)
        })
        .collect();

    let slow = core::time::Duration::from_millis(1);
    let job = coordinator(pool_of(
        (0..3).map(|_| Arc::new(Slow(slow)) as Arc<dyn ComputeBackend>),
    ));

    let pollers: Vec<_> = (0..2)
        .map(|_| {
            let job = Arc::clone(&job);
            tokio::spawn(async move {
                let mut seen: Vec<StatusSnapshot> = Vec::new();
                loop {
                    match job.query_status().await {
                        Ok(status) => seen.push(status),
                        Err(Error::QueryPending) => tokio::task::yield_now().await,
                        Err(Error::QueryBeforeStart) if job.state() == JobState::Idle => {
                            tokio::task::yield_now().await;
                        }
                        Err(Error::QueryBeforeStart) => return seen,
                        Err(err) => panic!("unexpected status error: {err}"),
                    }
                }
            })
        })
        .collect();

    let result = job.run(grid, TURNS).await.unwrap();
    assert_eq!(result.turns_completed, TURNS);

    let mut answered = 0;
    for poller in pollers {
        let seen = poller.await.unwrap();
        answered += seen.len();
        for pair in seen.windows(2) {
            assert!(pair[0].current_turn <= pair[1].current_turn, "{pair:?}");
        }
        for status in seen {
            assert!(status.current_turn <= TURNS);
            assert_eq!(
                status.alive_cell_count, expected[status.current_turn as usize],
                "turn {}",
                status.current_turn
            );
        }
    }
    assert!(answered > 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn second_pending_query_is_rejected() {
    let gate = Arc::new(Gate::new(2, GateOutcome::Hang));
    let job = coordinator(pool_of([
        Arc::new(WorkerService::new()) as Arc<dyn ComputeBackend>,
        gate.clone() as Arc<dyn ComputeBackend>,
    ]));

    let run = tokio::spawn({
        let job = Arc::clone(&job);
        async move { job.run(glider(8, 8), 10).await }
    });
    gate.wait_reached().await;

    let first = tokio::spawn({
        let job = Arc::clone(&job);
        async move { job.query_status().await }
    });
    while !job.has_pending_query() {
        tokio::task::yield_now().await;
    }
    assert_eq!(job.query_status().await, Err(Error::QueryPending));

    assert!(job.cancel());
    assert_eq!(first.await.unwrap(), Err(Error::JobCancelled));
    assert_eq!(run.await.unwrap(), Err(Error::JobCancelled));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancellation_releases_run_and_query() {
    let gate = Arc::new(Gate::new(3, GateOutcome::Hang));
    let job = coordinator(pool_of([gate.clone() as Arc<dyn ComputeBackend>]));

    let run = tokio::spawn({
        let job = Arc::clone(&job);
        async move { job.run(glider(6, 6), 50).await }
    });
    gate.wait_reached().await;

    let query = tokio::spawn({
        let job = Arc::clone(&job);
        async move { job.query_status().await }
    });
    while !job.has_pending_query() {
        tokio::task::yield_now().await;
    }

    assert!(job.cancel());
    assert_eq!(run.await.unwrap(), Err(Error::JobCancelled));
    assert_eq!(query.await.unwrap(), Err(Error::JobCancelled));
    assert_eq!(job.state(), JobState::Cancelled);
    assert!(!job.cancel());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn panicking_backend_fails_the_job() {
    let gate = Arc::new(Gate::new(2, GateOutcome::Panic));
    let job = coordinator(pool_of([
        Arc::new(WorkerService::new()) as Arc<dyn ComputeBackend>,
        gate.clone() as Arc<dyn ComputeBackend>,
    ]));

    let run = tokio::spawn({
        let job = Arc::clone(&job);
        async move { job.run(glider(8, 8), 10).await }
    });
    gate.wait_reached().await;

    let query = tokio::spawn({
        let job = Arc::clone(&job);
        async move { job.query_status().await }
    });
    while !job.has_pending_query() {
        tokio::task::yield_now().await;
    }

    gate.release();
    assert!(run.await.unwrap_err().is_panic());
    assert!(matches!(
        query.await.unwrap(),
        Err(Error::ChannelError { .. })
    ));
    assert_eq!(job.state(), JobState::Failed);
    assert_eq!(job.query_status().await, Err(Error::QueryBeforeStart));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dropped_run_cancels_the_job() {
    let gate = Arc::new(Gate::new(2, GateOutcome::Hang));
    let job = coordinator(pool_of([gate.clone() as Arc<dyn ComputeBackend>]));

    let run = tokio::spawn({
        let job = Arc::clone(&job);
        async move { job.run(glider(6, 6), 10).await }
    });
    gate.wait_reached().await;

    let query = tokio::spawn({
        let job = Arc::clone(&job);
        async move { job.query_status().await }
    });
    while !job.has_pending_query() {
        tokio::task::yield_now().await;
    }

    run.abort();
    assert!(run.await.unwrap_err().is_cancelled());
    assert_eq!(query.await.unwrap(), Err(Error::JobCancelled));
    assert_eq!(job.state(), JobState::Cancelled);
    assert!(!job.cancel());
}

#[tokio::test]
async fn timed_out_run_cancels_the_job() {
    let gate = Arc::new(Gate::new(1, GateOutcome::Hang));
    let job = coordinator(pool_of([gate as Arc<dyn ComputeBackend>]));

    let outcome = tokio::time::timeout(
        core::time::Duration::from_millis(50),
        job.run(glider(6, 6), 10),
    )
    .await;
    assert!(outcome.is_err());
    assert_eq!(job.state(), JobState::Cancelled);
    assert_eq!(job.query_status().await, Err(Error::QueryBeforeStart));
    assert_eq!(job.run(glider(6, 6), 1).await, Err(Error::JobInProgress));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unreachable_worker_fails_the_job() {
    let gate = Arc::new(Gate::new(4, GateOutcome::Unreachable));
    let job = coordinator(pool_of([
        Arc::new(WorkerService::new()) as Arc<dyn ComputeBackend>,
        gate.clone() as Arc<dyn ComputeBackend>,
        Arc::new(WorkerService::new()) as Arc<dyn ComputeBackend>,
    ]));

    let run = tokio::spawn({
        let job = Arc::clone(&job);
        async move { job.run(random_grid(5, 12, 12), 10).await }
    });
    gate.wait_reached().await;

    let query = tokio::spawn({
        let job = Arc::clone(&job);
        async move { job.query_status().await }
    });
    while !job.has_pending_query() {
        tokio::task::yield_now().await;
    }
    gate.release();

    let err = run.await.unwrap().unwrap_err();
    match &err {
        Error::WorkerUnreachable {
            worker,
            generation,
            endpoint,
            ..
        } => {
            assert_eq!((*worker, *generation), (1, 4));
            assert_eq!(endpoint, "http://gate:8040");
        }
        other => panic!("expected WorkerUnreachable, got {other}"),
    }
    assert_eq!(query.await.unwrap(), Err(err));
    assert_eq!(job.state(), JobState::Failed);
}

#[tokio::test]
async fn failed_generation_leaves_no_grid() {
    let grid = random_grid(11, 10, 10);
    let snapshot = Arc::new(Snapshot::new(grid.clone()));
    let pool = pool_of([
        Arc::new(WorkerService::new()) as Arc<dyn ComputeBackend>,
        Arc::new(Faulty::default()) as Arc<dyn ComputeBackend>,
    ]);

    let err = pool.run_generation(&snapshot, 1).await.unwrap_err();
    assert!(matches!(err, Error::WorkerFault { worker: 1, generation: 1, .. }), "{err}");
    assert_eq!(snapshot.grid(), &grid);
}

#[tokio::test]
async fn unreachable_partitions_are_retried_within_the_generation() {
    let grid = random_grid(21, 9, 9);
    let snapshot = Arc::new(Snapshot::new(grid.clone()));

    let flaky = Arc::new(Flaky::new(2));
    let pool = pool_of([
        flaky.clone() as Arc<dyn ComputeBackend>,
        Arc::new(WorkerService::new()) as Arc<dyn ComputeBackend>,
    ])
    .with_retries(2);
    assert_eq!(pool.run_generation(&snapshot, 1).await.unwrap(), grid.step());
    assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);

    let flaky = Arc::new(Flaky::new(2));
    let pool = pool_of([flaky.clone() as Arc<dyn ComputeBackend>]).with_retries(1);
    let err = pool.run_generation(&snapshot, 1).await.unwrap_err();
    assert!(err.is_retryable(), "{err}");
}

#[tokio::test]
async fn faults_are_not_retried() {
    let faulty = Arc::new(Faulty::default());
    let pool = pool_of([faulty.clone() as Arc<dyn ComputeBackend>]).with_retries(3);
    let snapshot = Arc::new(Snapshot::new(glider(5, 5)));
    assert!(pool.run_generation(&snapshot, 1).await.is_err());
    assert_eq!(faulty.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn mismatched_partitions_are_rejected() {
    let snapshot = Arc::new(Snapshot::new(random_grid(2, 8, 8)));

    let pool = pool_of([
        Arc::new(Shifted) as Arc<dyn ComputeBackend>,
        Arc::new(WorkerService::new()) as Arc<dyn ComputeBackend>,
    ]);
    let err = pool.run_generation(&snapshot, 5).await.unwrap_err();
    assert!(
        matches!(err, Error::PartitionMismatch { worker: 0, generation: 5, .. }),
        "{err}"
    );

    let pool = pool_of([
        Arc::new(WorkerService::new()) as Arc<dyn ComputeBackend>,
        Arc::new(Truncated) as Arc<dyn ComputeBackend>,
    ]);
    let err = pool.run_generation(&snapshot, 1).await.unwrap_err();
    assert!(matches!(err, Error::PartitionMismatch { worker: 1, .. }), "{err}");
}
