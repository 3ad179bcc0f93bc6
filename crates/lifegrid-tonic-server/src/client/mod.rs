//! Client side of `lifegrid.Coordinator`.
//!
//! - [`session`] - [`GolClient`](session::GolClient): submit a job and poll
//!   its progress.
//! - [`event`] - lifecycle notifications emitted while a job runs.
//! - [`io`] - raw grid files.

pub mod event;
pub mod io;
pub mod session;
