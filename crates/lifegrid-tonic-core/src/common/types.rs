//! # Wire Conversions and Shared Limits
//!
//! Converts between [`lifegrid`] values and their protobuf representation in
//! [`crate::proto`], and defines the limits both sides of a connection agree
//! on.
//!
//! ## Conversions
//!
//! - `&Grid` -> [`GridData`] and [`GridData`] -> `Grid` (validated)
//! - [`Cell`] <-> [`AliveCell`]
//! - [`StatusSnapshot::new`] from a turn and a live cell count
//! - [`JobResult`] <-> [`FinalResult`]
//!
//! Decoding a [`GridData`] re-validates dimensions, buffer length and cell
//! values, so a malformed message turns into
//! [`Error::InvalidJob`](crate::Error::InvalidJob) at the service boundary
//! instead of a panic in the transition rule.

use crate::proto::{AliveCell, FinalResult, GridData, StatusSnapshot, SubmitJobRequest};
use lifegrid::{Cell, Grid, GridError};
use prost::bytes::Bytes;

/// Default gRPC message size limit, in bytes, for both directions.
///
/// A full grid is broadcast to every worker each generation, so the tonic
/// default of 4 MiB only fits grids up to 2048x2048.
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 64 * 1024 * 1024;

/// Default interval between client status polls.
pub const DEFAULT_PROGRESS_INTERVAL: core::time::Duration = core::time::Duration::from_secs(2);

fn wire_u32(value: usize) -> u32 {
    // Saturating keeps an oversized grid decodable into a length mismatch
    // rather than a silently smaller grid.
    u32::try_from(value).unwrap_or(u32::MAX)
}

impl From<&Grid> for GridData {
    fn from(grid: &Grid) -> Self {
        Self {
            width: wire_u32(grid.width()),
            height: wire_u32(grid.height()),
            cells: Bytes::copy_from_slice(grid.cells()),
        }
    }
}

impl From<Grid> for GridData {
    fn from(grid: Grid) -> Self {
        Self {
            width: wire_u32(grid.width()),
            height: wire_u32(grid.height()),
            cells: Bytes::from(grid.into_cells()),
        }
    }
}

impl TryFrom<GridData> for Grid {
    type Error = GridError;

    fn try_from(data: GridData) -> Result<Self, Self::Error> {
        Grid::from_cells(data.width as usize, data.height as usize, data.cells.into())
    }
}

impl From<Cell> for AliveCell {
    fn from(cell: Cell) -> Self {
        Self {
            x: wire_u32(cell.x),
            y: wire_u32(cell.y),
        }
    }
}

impl From<AliveCell> for Cell {
    fn from(cell: AliveCell) -> Self {
        Cell::new(cell.x as usize, cell.y as usize)
    }
}

impl StatusSnapshot {
    pub const fn new(current_turn: u64, alive_cell_count: u64) -> Self {
        Self {
            current_turn,
            alive_cell_count,
        }
    }
}

/// The outcome of a completed job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobResult {
    pub grid: Grid,
    pub turns_completed: u64,
    /// Live cells of `grid` in row-major order.
    pub alive_cells: Vec<Cell>,
}

impl JobResult {
    pub fn new(grid: Grid, turns_completed: u64) -> Self {
        let alive_cells = grid.alive_cells();
        Self {
            grid,
            turns_completed,
            alive_cells,
        }
    }
}

impl From<JobResult> for FinalResult {
    fn from(result: JobResult) -> Self {
        Self {
            alive_cells: result.alive_cells.into_iter().map(AliveCell::from).collect(),
            grid: Some(result.grid.into()),
            turns_completed: result.turns_completed,
        }
    }
}

impl TryFrom<FinalResult> for JobResult {
    type Error = crate::Error;

    fn try_from(result: FinalResult) -> Result<Self, Self::Error> {
        Ok(Self {
            grid: decode_grid(result.grid)?,
            turns_completed: result.turns_completed,
            alive_cells: result.alive_cells.into_iter().map(Cell::from).collect(),
        })
    }
}

/// A submission that passed validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobSpec {
    pub grid: Grid,
    pub total_turns: u64,
    /// Requested worker endpoints; empty means the coordinator's own pool.
    pub workers: Vec<String>,
}

impl TryFrom<SubmitJobRequest> for JobSpec {
    type Error = crate::Error;

    /// # Errors
    ///
    /// Returns [`Error::InvalidJob`](crate::Error::InvalidJob) for an absent
    /// or malformed grid and for a negative turn count.
    fn try_from(request: SubmitJobRequest) -> Result<Self, Self::Error> {
        let total_turns = u64::try_from(request.total_turns).map_err(|_| {
            crate::Error::invalid_job(format!(
                "total_turns must not be negative, got {}",
                request.total_turns
            ))
        })?;
        Ok(Self {
            grid: decode_grid(request.grid)?,
            total_turns,
            workers: request.workers,
        })
    }
}

/// Decodes an optional grid field, treating an absent grid as an invalid job.
///
/// # Errors
///
/// Returns [`Error::InvalidJob`](crate::Error::InvalidJob) if the grid is
/// missing or fails validation.
pub fn decode_grid(grid: Option<GridData>) -> crate::Result<Grid> {
    let data = grid.ok_or_else(|| crate::Error::invalid_job("grid is absent"))?;
    Ok(Grid::try_from(data)?)
}
