//! Error types for the distributed engine.
//!
//! This module defines the central `Error` enum shared by the coordinator, the
//! workers, and clients. It implements `From<Error>` for `tonic::Status` so
//! service handlers can return it directly with an appropriate status code.
//!
//! ## Error Cases
//! - `InvalidJob`: Malformed grid, negative turn count, or bad row range.
//! - `WorkerUnreachable`: Transport failure talking to a worker.
//! - `WorkerFault`: A worker answered with an error.
//! - `PartitionMismatch`: A worker returned rows that do not match the request.
//! - `QueryBeforeStart`: A status query arrived while no job was running.
//! - `QueryPending`: A status query arrived while another one was waiting.
//! - `JobInProgress`: A job was submitted while another one was running.
//! - `JobCancelled`: The job was cancelled before it completed.
//! - `ChannelError`: An internal communication failure between tasks.
//! - `ServiceShutdown`: A request arrived while the service was shutting down.

use lifegrid::GridError;
use tonic::{Code, Status};

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the distributed engine.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// The submitted job or compute request is malformed.
    #[error("Invalid job: {reason}")]
    InvalidJob { reason: String },

    /// The worker could not be reached (connect, transport, or deadline).
    #[error("Worker {worker} ({endpoint}) unreachable in generation {generation}: {reason}")]
    WorkerUnreachable {
        worker: usize,
        endpoint: String,
        generation: u64,
        reason: String,
    },

    /// The worker was reached but failed to compute its partition.
    #[error("Worker {worker} ({endpoint}) failed in generation {generation}: {reason}")]
    WorkerFault {
        worker: usize,
        endpoint: String,
        generation: u64,
        reason: String,
    },

    /// The worker returned rows other than the ones it was asked for.
    #[error("Worker {worker} returned a mismatched partition in generation {generation}: {reason}")]
    PartitionMismatch {
        worker: usize,
        generation: u64,
        reason: String,
    },

    /// Status is only available while a job is running.
    #[error("No job is running")]
    QueryBeforeStart,

    /// Another status query is already waiting for the next generation.
    #[error("A status query is already pending")]
    QueryPending,

    /// The coordinator is already running a job.
    #[error("A job is already running")]
    JobInProgress,

    /// The job was cancelled before it completed.
    #[error("Job cancelled")]
    JobCancelled,

    /// Internal channel send/receive failure.
    #[error("Channel error: {context}")]
    ChannelError { context: String },

    /// The service is in the process of shutting down.
    #[error("Service is shutting down")]
    ServiceShutdown,
}

impl Error {
    /// Wraps anything printable as [`Error::InvalidJob`].
    pub fn invalid_job(reason: impl ToString) -> Self {
        Self::InvalidJob {
            reason: reason.to_string(),
        }
    }

    /// Classifies a `tonic::Status` returned by a remote worker.
    ///
    /// Transport-level failures become [`Error::WorkerUnreachable`]; anything
    /// the worker itself reported becomes [`Error::WorkerFault`].
    pub fn from_worker_status(
        status: &Status,
        worker: usize,
        endpoint: &str,
        generation: u64,
    ) -> Self {
        let reason = format!("{:?}: {}", status.code(), status.message());
        let endpoint = endpoint.to_string();
        match status.code() {
            Code::Unavailable | Code::DeadlineExceeded | Code::Cancelled => {
                Self::WorkerUnreachable {
                    worker,
                    endpoint,
                    generation,
                    reason,
                }
            }
            // tonic reports connection failures as `Unknown` with a transport
            // error source.
            Code::Unknown if std::error::Error::source(status).is_some() => {
                Self::WorkerUnreachable {
                    worker,
                    endpoint,
                    generation,
                    reason,
                }
            }
            _ => Self::WorkerFault {
                worker,
                endpoint,
                generation,
                reason,
            },
        }
    }

    /// Whether the error may succeed on a retry within the same generation.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::WorkerUnreachable { .. })
    }
}

impl From<GridError> for Error {
    fn from(err: GridError) -> Self {
        Self::invalid_job(err)
    }
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        let message = err.to_string();
        match err {
            Error::InvalidJob { .. } => Status::invalid_argument(message),
            Error::WorkerUnreachable { .. } => Status::unavailable(message),
            Error::WorkerFault { .. }
            | Error::PartitionMismatch { .. }
            | Error::ChannelError { .. } => Status::internal(message),
            Error::QueryBeforeStart | Error::JobInProgress => {
                Status::failed_precondition(message)
            }
            Error::QueryPending => Status::resource_exhausted(message),
            Error::JobCancelled => Status::cancelled(message),
            Error::ServiceShutdown => Status::unavailable(message),
        }
    }
}
