//! The fixed set of workers a job fans out to.
//!
//! ## Structure
//!
//! - [`backend`] - the [`ComputeBackend`](backend::ComputeBackend) seam and
//!   the per-generation job and result types.
//! - [`worker`] - a backend that calls a remote `lifegrid.Worker` over gRPC.
//! - [`manager`] - [`WorkerPool`](manager::WorkerPool): partition, fan out,
//!   barrier, stitch.

pub mod backend;
pub mod manager;
pub mod worker;
