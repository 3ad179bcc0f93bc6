//! gRPC messages and generated service bindings for the `lifegrid` package.
//!
//! ## Services
//!
//! - `lifegrid.Worker/ComputePartition` - steps one row range of a full grid
//!   snapshot. Issued by the coordinator to every worker once per generation.
//! - `lifegrid.Coordinator/SubmitJob` - runs a whole simulation and returns the
//!   final grid. The call stays open for the duration of the job; dropping it
//!   cancels the job.
//! - `lifegrid.Coordinator/QueryStatus` - reports the turn and live cell count
//!   at the next generation boundary of the running job.
//! - `lifegrid.Coordinator/CancelJob` - aborts the running job.
//!
//! ## Message Format
//!
//! Grids are sent as [`GridData`]: dimensions plus a row-major `cells` buffer,
//! one byte per cell (`0` dead, `255` alive). [`UpdatedRows::rows`] uses the
//! same encoding for `row_end - row_start` full rows.
//!
//! ## Invariants
//!
//! - `cells.len() == width * height`
//! - `rows.len() == (row_end - row_start) * width`

use prost::bytes::Bytes;

/// A full grid on the wire.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GridData {
    #[prost(uint32, tag = "1")]
    pub width: u32,
    #[prost(uint32, tag = "2")]
    pub height: u32,
    #[prost(bytes = "bytes", tag = "3")]
    pub cells: Bytes,
}

/// Coordinator -> worker: step `[row_start, row_end)` of `grid`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ComputeRequest {
    #[prost(message, optional, tag = "1")]
    pub grid: ::core::option::Option<GridData>,
    #[prost(uint32, tag = "2")]
    pub row_start: u32,
    #[prost(uint32, tag = "3")]
    pub row_end: u32,
    /// Generations to advance locally; the coordinator always sends 1.
    #[prost(uint32, tag = "4")]
    pub generations: u32,
    /// Position of the worker in the pool, for logs.
    #[prost(uint32, tag = "5")]
    pub worker_index: u32,
    /// Generation being computed, for logs.
    #[prost(uint64, tag = "6")]
    pub generation: u64,
}

/// Worker -> coordinator: the updated rows of one partition.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UpdatedRows {
    #[prost(uint32, tag = "1")]
    pub row_start: u32,
    #[prost(uint32, tag = "2")]
    pub row_end: u32,
    #[prost(bytes = "bytes", tag = "3")]
    pub rows: Bytes,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SubmitJobRequest {
    #[prost(message, optional, tag = "1")]
    pub grid: ::core::option::Option<GridData>,
    /// Signed so that negative turn counts can be rejected instead of wrapping.
    #[prost(int64, tag = "2")]
    pub total_turns: i64,
    /// Worker endpoints for this job. Empty means the coordinator's own pool.
    #[prost(string, repeated, tag = "3")]
    pub workers: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, ::prost::Message)]
pub struct AliveCell {
    #[prost(uint32, tag = "1")]
    pub x: u32,
    #[prost(uint32, tag = "2")]
    pub y: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FinalResult {
    #[prost(message, optional, tag = "1")]
    pub grid: ::core::option::Option<GridData>,
    #[prost(uint64, tag = "2")]
    pub turns_completed: u64,
    #[prost(message, repeated, tag = "3")]
    pub alive_cells: ::prost::alloc::vec::Vec<AliveCell>,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct QueryStatusRequest {}

#[derive(Clone, Copy, PartialEq, Eq, Hash, ::prost::Message)]
pub struct StatusSnapshot {
    #[prost(uint64, tag = "1")]
    pub current_turn: u64,
    #[prost(uint64, tag = "2")]
    pub alive_cell_count: u64,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct CancelJobRequest {}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct CancelJobResponse {
    /// `false` when no job was running.
    #[prost(bool, tag = "1")]
    pub cancelled: bool,
}

include!(concat!(env!("OUT_DIR"), "/lifegrid.Worker.rs"));
include!(concat!(env!("OUT_DIR"), "/lifegrid.Coordinator.rs"));
