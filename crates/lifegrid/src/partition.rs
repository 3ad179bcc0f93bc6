//! Row partitioning and stitching.
//!
//! A generation is computed by splitting `[0, height)` into one contiguous row
//! range per worker with [`partition`], stepping each range independently, and
//! reassembling the results with a [`Stitcher`].

use crate::{DEAD, Grid, GridError, Result};
use core::ops::Range;

/// A contiguous row range owned by one worker for one generation.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Partition {
    /// Position of the worker in the pool.
    pub index: usize,
    /// Rows `[start, end)` the worker computes.
    pub rows: Range<usize>,
}

impl Partition {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Splits `height` rows across `workers` workers.
///
/// Worker `i` receives `[i * height / workers, (i + 1) * height / workers)`.
/// The ranges are disjoint, cover `[0, height)` exactly, and differ in length
/// by at most one. With more workers than rows some ranges are empty. Zero
/// workers yields no partitions.
pub fn partition(height: usize, workers: usize) -> Vec<Partition> {
    if workers == 0 {
        return Vec::new();
    }
    (0..workers)
        .map(|index| Partition {
            index,
            rows: bound(index, height, workers)..bound(index + 1, height, workers),
        })
        .collect()
}

fn bound(index: usize, height: usize, workers: usize) -> usize {
    // u128 keeps `index * height` from overflowing on 32-bit targets.
    ((index as u128 * height as u128) / workers as u128) as usize
}

/// Reassembles per-partition results into the next [`Grid`].
///
/// Ranges may arrive in any order. Each row can be written once;
/// [`Stitcher::finish`] succeeds only when every row has been written.
#[derive(Debug)]
pub struct Stitcher {
    width: usize,
    height: usize,
    cells: Vec<u8>,
    written: Vec<bool>,
    covered: usize,
}

impl Stitcher {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![DEAD; width * height],
            written: vec![false; height],
            covered: 0,
        }
    }

    /// Writes the encoded cells of `rows`.
    ///
    /// # Errors
    ///
    /// - [`GridError::RowsOutOfBounds`] if the range is reversed or past the
    ///   last row.
    /// - [`GridError::LengthMismatch`] if `data` is not `rows.len() * width`
    ///   bytes.
    /// - [`GridError::OverlappingRows`] if a row was already written.
    ///
    /// Nothing is written when an error is returned.
    pub fn insert(&mut self, rows: Range<usize>, data: &[u8]) -> Result<()> {
        if rows.start > rows.end || rows.end > self.height {
            return Err(GridError::RowsOutOfBounds {
                start: rows.start,
                end: rows.end,
                height: self.height,
            });
        }
        let expected = rows.len() * self.width;
        if data.len() != expected {
            return Err(GridError::LengthMismatch {
                expected,
                actual: data.len(),
            });
        }
        if let Some(row) = rows.clone().find(|&row| self.written[row]) {
            return Err(GridError::OverlappingRows { row });
        }

        self.cells[rows.start * self.width..rows.end * self.width].copy_from_slice(data);
        self.written[rows.clone()].fill(true);
        self.covered += rows.len();
        Ok(())
    }

    /// Produces the stitched grid.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::IncompleteStitch`] if any row is missing, and
    /// whatever [`Grid::from_cells`] rejects in the stitched buffer.
    pub fn finish(self) -> Result<Grid> {
        if self.covered != self.height {
            return Err(GridError::IncompleteStitch {
                covered: self.covered,
                height: self.height,
            });
        }
        Grid::from_cells(self.width, self.height, self.cells)
    }
}
