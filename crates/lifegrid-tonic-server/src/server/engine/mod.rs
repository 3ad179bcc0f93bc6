//! The per-job turn loop and its status side channel.
//!
//! - [`status`] - [`StatusRendezvous`](status::StatusRendezvous), the job
//!   state plus the single pending-query slot.
//! - [`coordinator`] - [`Coordinator`](coordinator::Coordinator), which drives
//!   a [`WorkerPool`](crate::server::pool::manager::WorkerPool) one
//!   generation at a time.

pub mod coordinator;
pub mod status;
