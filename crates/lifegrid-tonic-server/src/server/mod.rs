//! Server side: configuration, telemetry, the worker pool, the turn loop, and
//! the gRPC services.

pub mod config;
pub mod engine;
pub mod pool;
pub mod serve;
pub mod service;
pub mod telemetry;
