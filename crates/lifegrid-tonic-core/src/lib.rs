#![doc = include_str!("../README.md")]

mod common;
pub mod proto;

pub use common::*;
// Public re-export so downstream crates can access `lifegrid` via
// `lifegrid_tonic_core::lifegrid`
pub use lifegrid;
