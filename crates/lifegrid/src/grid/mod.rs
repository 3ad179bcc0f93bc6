mod rule;

use crate::{ALIVE, Cell, DEAD, GridError, Result, is_alive};
use core::{fmt, ops::Range};

/// An H×W toroidal Game of Life grid.
///
/// Cells are stored row-major with one byte per cell, using the same encoding
/// as the wire format and the raw image files: [`DEAD`] (`0`) or [`ALIVE`]
/// (`255`). A grid is never empty; every constructor rejects zero dimensions.
///
/// Grids are plain values. The coordinator shares them as `Arc<Grid>`
/// snapshots and builds each new generation into a fresh buffer, so a
/// snapshot handed to a worker is never mutated underneath it.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Grid {
    width: usize,
    height: usize,
    cells: Vec<u8>,
}

impl Grid {
    /// Creates an all-dead grid.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::Empty`] if either dimension is zero and
    /// [`GridError::TooLarge`] if `width * height` overflows.
    pub fn new(width: usize, height: usize) -> Result<Self> {
        let len = checked_len(width, height)?;
        Ok(Self {
            width,
            height,
            cells: vec![DEAD; len],
        })
    }

    /// Wraps an encoded row-major cell buffer.
    ///
    /// # Errors
    ///
    /// - [`GridError::Empty`] if either dimension is zero.
    /// - [`GridError::TooLarge`] if `width * height` overflows.
    /// - [`GridError::LengthMismatch`] if `cells.len() != width * height`.
    /// - [`GridError::InvalidCellValue`] for any byte other than `0` or `255`.
    pub fn from_cells(width: usize, height: usize, cells: Vec<u8>) -> Result<Self> {
        let expected = checked_len(width, height)?;
        if cells.len() != expected {
            return Err(GridError::LengthMismatch {
                expected,
                actual: cells.len(),
            });
        }
        if let Some(index) = cells.iter().position(|&v| v != ALIVE && v != DEAD) {
            return Err(GridError::InvalidCellValue {
                index,
                value: cells[index],
            });
        }
        Ok(Self {
            width,
            height,
            cells,
        })
    }

    /// Builds a grid with exactly the given cells alive.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::Empty`] for zero dimensions and
    /// [`GridError::CellOutOfBounds`] for coordinates outside the grid.
    pub fn from_alive<I, C>(width: usize, height: usize, alive: I) -> Result<Self>
    where
        I: IntoIterator<Item = C>,
        C: Into<Cell>,
    {
        let mut grid = Self::new(width, height)?;
        for cell in alive {
            let Cell { x, y } = cell.into();
            grid.set(x, y, true)?;
        }
        Ok(grid)
    }

    pub const fn width(&self) -> usize {
        self.width
    }

    pub const fn height(&self) -> usize {
        self.height
    }

    /// The encoded row-major cell buffer.
    pub fn cells(&self) -> &[u8] {
        &self.cells
    }

    pub fn into_cells(self) -> Vec<u8> {
        self.cells
    }

    /// Returns whether `(x, y)` is alive. Coordinates wrap around the torus.
    pub fn is_alive(&self, x: usize, y: usize) -> bool {
        is_alive(self.cells[(y % self.height) * self.width + (x % self.width)])
    }

    /// Sets a single cell.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::CellOutOfBounds`] if `(x, y)` is outside the grid.
    /// Unlike [`Grid::is_alive`], writes never wrap.
    pub fn set(&mut self, x: usize, y: usize, alive: bool) -> Result<()> {
        if x >= self.width || y >= self.height {
            return Err(GridError::CellOutOfBounds { x, y });
        }
        self.cells[y * self.width + x] = if alive { ALIVE } else { DEAD };
        Ok(())
    }

    /// The encoded cells of `rows`, row-major.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::RowsOutOfBounds`] if the range is reversed or
    /// extends past the last row.
    pub fn rows(&self, rows: Range<usize>) -> Result<&[u8]> {
        self.check_rows(&rows)?;
        Ok(&self.cells[rows.start * self.width..rows.end * self.width])
    }

    /// Number of live cells.
    pub fn alive_count(&self) -> usize {
        self.cells.iter().filter(|&&v| is_alive(v)).count()
    }

    /// Every live cell in row-major order.
    pub fn alive_cells(&self) -> Vec<Cell> {
        self.cells
            .iter()
            .enumerate()
            .filter(|&(_, &v)| is_alive(v))
            .map(|(i, _)| Cell::new(i % self.width, i / self.width))
            .collect()
    }

    fn check_rows(&self, rows: &Range<usize>) -> Result<()> {
        if rows.start > rows.end || rows.end > self.height {
            return Err(GridError::RowsOutOfBounds {
                start: rows.start,
                end: rows.end,
                height: self.height,
            });
        }
        Ok(())
    }
}

fn checked_len(width: usize, height: usize) -> Result<usize> {
    if width == 0 || height == 0 {
        return Err(GridError::Empty);
    }
    width
        .checked_mul(height)
        .ok_or(GridError::TooLarge { width, height })
}

impl fmt::Debug for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Grid {}x{} ({} alive)", self.width, self.height, self.alive_count())?;
        // Large grids only get the summary line.
        if self.width * self.height <= 64 * 64 {
            for row in self.cells.chunks(self.width) {
                let line: String = row
                    .iter()
                    .map(|&v| if is_alive(v) { '#' } else { '.' })
                    .collect();
                writeln!(f, "{line}")?;
            }
        }
        Ok(())
    }
}
