//! `lifegrid.Worker`: stateless partition stepping.
//!
//! Each call carries the full grid snapshot and a row range. The worker
//! decodes and validates the snapshot, steps the range on the blocking pool,
//! and returns the rows. Nothing survives between calls.

use crate::server::{
    pool::backend::{ComputeBackend, ComputedRows, PartitionJob},
    telemetry::increment_partitions_computed,
};
use bytes::Bytes;
use lifegrid_tonic_core::{
    Error,
    proto::{ComputeRequest, UpdatedRows, worker_server::Worker, worker_server::WorkerServer},
    types::decode_grid,
};
use std::sync::Arc;
use tonic::{Request, Response, Status, codec::CompressionEncoding};

#[derive(Debug, Clone, Copy, Default)]
pub struct WorkerService;

impl WorkerService {
    pub const fn new() -> Self {
        Self
    }

    /// Wraps the service with compression and message limits.
    pub fn into_server(self, max_message_bytes: usize) -> WorkerServer<Self> {
        WorkerServer::new(self)
            .max_decoding_message_size(max_message_bytes)
            .max_encoding_message_size(max_message_bytes)
            .send_compressed(CompressionEncoding::Zstd)
            .send_compressed(CompressionEncoding::Gzip)
            .accept_compressed(CompressionEncoding::Zstd)
            .accept_compressed(CompressionEncoding::Gzip)
    }
}

/// Runs the transition rule off the async runtime.
async fn blocking<T, F>(f: F) -> lifegrid_tonic_core::Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::ChannelError {
            context: format!("compute task failed: {e}"),
        })
}

#[tonic::async_trait]
impl Worker for WorkerService {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(
        worker = req.get_ref().worker_index,
        generation = req.get_ref().generation,
        row_start = req.get_ref().row_start,
        row_end = req.get_ref().row_end
    )))]
    async fn compute_partition(
        &self,
        req: Request<ComputeRequest>,
    ) -> Result<Response<UpdatedRows>, Status> {
        let request = req.into_inner();
        let grid = decode_grid(request.grid)?;
        let (row_start, row_end) = (request.row_start, request.row_end);
        let rows = row_start as usize..row_end as usize;
        let generations = request.generations;

        let cells = blocking(move || grid.advance_rows(rows, generations))
            .await?
            .map_err(Error::from)?;

        increment_partitions_computed();
        #[cfg(feature = "tracing")]
        tracing::trace!("Partition computed");

        Ok(Response::new(UpdatedRows {
            row_start,
            row_end,
            rows: Bytes::from(cells),
        }))
    }
}

/// Steps partitions in-process, for tests and single-process runs.
#[tonic::async_trait]
impl ComputeBackend for WorkerService {
    fn endpoint(&self) -> &str {
        "in-process"
    }

    async fn compute(&self, job: &PartitionJob) -> lifegrid_tonic_core::Result<ComputedRows> {
        let snapshot = Arc::clone(&job.snapshot);
        let rows = job.rows();
        let cells = blocking(move || snapshot.grid().step_rows(rows))
            .await?
            .map_err(|e| Error::WorkerFault {
                worker: job.partition.index,
                endpoint: self.endpoint().to_string(),
                generation: job.generation,
                reason: e.to_string(),
            })?;

        increment_partitions_computed();
        Ok(ComputedRows {
            rows: job.rows(),
            cells: Bytes::from(cells),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::pool::backend::Snapshot;
    use core::ops::Range;
    use lifegrid_tonic_core::{
        lifegrid::{Grid, Partition, partition},
        proto::GridData,
    };
    use tonic::Code;

    fn glider() -> Grid {
        Grid::from_alive(8, 8, [(1, 0), (2, 1), (0, 2), (1, 2), (2, 2)]).unwrap()
    }

    fn request(grid: &Grid, rows: Range<u32>) -> Request<ComputeRequest> {
        Request::new(ComputeRequest {
            grid: Some(GridData::from(grid)),
            row_start: rows.start,
            row_end: rows.end,
            generations: 1,
            worker_index: 0,
            generation: 1,
        })
    }

    #[tokio::test]
    async fn steps_the_requested_rows() {
        let grid = glider();
        let reply = WorkerService::new()
            .compute_partition(request(&grid, 2..5))
            .await
            .unwrap()
            .into_inner();

        assert_eq!((reply.row_start, reply.row_end), (2, 5));
        assert_eq!(&reply.rows[..], grid.step().rows(2..5).unwrap());
    }

    #[tokio::test]
    async fn rejects_absent_and_empty_grids() {
        let worker = WorkerService::new();
        let status = worker
            .compute_partition(Request::new(ComputeRequest {
                grid: None,
                row_start: 0,
                row_end: 1,
                generations: 1,
                worker_index: 0,
                generation: 1,
            }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);

        let status = worker
            .compute_partition(Request::new(ComputeRequest {
                grid: Some(GridData::default()),
                ..ComputeRequest::default()
            }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);
    }

    #[tokio::test]
    async fn rejects_rows_past_the_end() {
        let status = WorkerService::new()
            .compute_partition(request(&glider(), 4..9))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);
    }

    #[tokio::test]
    async fn advances_several_generations() {
        let grid = glider();
        let mut req = request(&grid, 0..8);
        req.get_mut().generations = 4;
        let reply = WorkerService::new()
            .compute_partition(req)
            .await
            .unwrap()
            .into_inner();

        let expected = grid.step().step().step().step();
        assert_eq!(&reply.rows[..], expected.cells());
    }

    #[tokio::test]
    async fn in_process_backend_matches_the_rule() {
        let grid = glider();
        let snapshot = Arc::new(Snapshot::new(grid.clone()));
        for Partition { index, rows } in partition(grid.height(), 3) {
            let job = PartitionJob {
                snapshot: Arc::clone(&snapshot),
                partition: Partition {
                    index,
                    rows: rows.clone(),
                },
                generation: 1,
            };
            let computed = WorkerService::new().compute(&job).await.unwrap();
            assert_eq!(computed.rows, rows);
            assert_eq!(&computed.cells[..], grid.step().rows(rows).unwrap());
        }
    }
}
