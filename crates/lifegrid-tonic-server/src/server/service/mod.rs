//! gRPC service implementations.
//!
//! ## Structure
//!
//! - [`worker`] - `lifegrid.Worker` ([`WorkerService`](worker::WorkerService)).
//! - [`coordinator`] - `lifegrid.Coordinator`
//!   ([`CoordinatorService`](coordinator::CoordinatorService)).

pub mod coordinator;
pub mod worker;
