//! Shared types and error definitions used by the coordinator, the workers,
//! and clients.
//!
//! ## Submodules
//!
//! - [`error`] - Service error type and its `tonic::Status` mapping.
//! - [`types`] - Grid <-> wire conversions and shared limits.

pub mod error;
pub mod types;

pub use error::{Error, Result};
