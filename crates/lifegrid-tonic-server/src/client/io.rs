//! Raw grid files: row-major, one byte per cell, `0` dead and `255` alive.

use anyhow::Context;
use lifegrid_tonic_core::lifegrid::Grid;
use std::path::Path;

/// Reads a `width` x `height` grid from `path`.
///
/// # Errors
///
/// Fails if the file cannot be read, its length is not `width * height`, or
/// it contains a byte other than `0` or `255`.
pub async fn read_grid(path: impl AsRef<Path>, width: usize, height: usize) -> anyhow::Result<Grid> {
    let path = path.as_ref();
    let cells = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read grid from {}", path.display()))?;
    Grid::from_cells(width, height, cells)
        .with_context(|| format!("{} is not a {width}x{height} grid", path.display()))
}

/// Writes `grid` to `path` in the same encoding [`read_grid`] accepts.
///
/// # Errors
///
/// Fails if the file cannot be written.
pub async fn write_grid(path: impl AsRef<Path>, grid: &Grid) -> anyhow::Result<()> {
    let path = path.as_ref();
    tokio::fs::write(path, grid.cells())
        .await
        .with_context(|| format!("failed to write grid to {}", path.display()))
}
