//! The B3/S23 transition rule on a torus.
//!
//! Every function here reads an immutable [`Grid`] and writes into a fresh
//! buffer, so all cells of a generation derive from the same view no matter
//! how the rows are split between callers.

use super::Grid;
use crate::{ALIVE, DEAD, Result, is_alive};
use core::ops::Range;

impl Grid {
    /// Computes the next generation of `rows`.
    ///
    /// Returns `rows.len() * width` encoded cells, row-major. Neighbours are
    /// read from the whole grid with wraparound, so the result depends on rows
    /// outside the range but never on the order in which ranges are computed.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::RowsOutOfBounds`](crate::GridError::RowsOutOfBounds)
    /// if the range is reversed or extends past the last row.
    pub fn step_rows(&self, rows: Range<usize>) -> Result<Vec<u8>> {
        self.check_rows(&rows)?;
        let mut out = Vec::with_capacity(rows.len() * self.width);
        for y in rows {
            self.step_row_into(y, &mut out);
        }
        Ok(out)
    }

    /// Advances the whole grid by one generation.
    pub fn step(&self) -> Grid {
        let mut cells = Vec::with_capacity(self.cells.len());
        for y in 0..self.height {
            self.step_row_into(y, &mut cells);
        }
        Grid {
            width: self.width,
            height: self.height,
            cells,
        }
    }

    /// Advances `rows` by `generations` steps and returns their cells.
    ///
    /// The neighbourhood of a row range grows by one row on each side per
    /// generation, so for `generations > 1` the whole grid is advanced
    /// `generations - 1` times before the final step of the range. Zero
    /// generations returns the rows unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::RowsOutOfBounds`](crate::GridError::RowsOutOfBounds)
    /// if the range is reversed or extends past the last row.
    pub fn advance_rows(&self, rows: Range<usize>, generations: u32) -> Result<Vec<u8>> {
        if generations == 0 {
            return self.rows(rows).map(<[u8]>::to_vec);
        }
        self.check_rows(&rows)?;
        if generations == 1 {
            return self.step_rows(rows);
        }

        let mut current = self.step();
        for _ in 2..generations {
            current = current.step();
        }
        current.step_rows(rows)
    }

    fn step_row_into(&self, y: usize, out: &mut Vec<u8>) {
        let (w, h) = (self.width, self.height);
        let above = &self.cells[((y + h - 1) % h) * w..][..w];
        let row = &self.cells[y * w..][..w];
        let below = &self.cells[((y + 1) % h) * w..][..w];

        for x in 0..w {
            let left = (x + w - 1) % w;
            let right = (x + 1) % w;
            let neighbours = [
                above[left],
                above[x],
                above[right],
                row[left],
                row[right],
                below[left],
                below[x],
                below[right],
            ]
            .into_iter()
            .filter(|&v| is_alive(v))
            .count();

            out.push(match (is_alive(row[x]), neighbours) {
                (true, 2 | 3) | (false, 3) => ALIVE,
                _ => DEAD,
            });
        }
    }
}
