#![doc = include_str!("../README.md")]

mod cell;
mod error;
mod grid;
mod partition;

pub use crate::cell::*;
pub use crate::error::*;
pub use crate::grid::*;
pub use crate::partition::*;
