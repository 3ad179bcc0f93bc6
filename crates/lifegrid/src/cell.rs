/// Encoded value of a live cell.
pub const ALIVE: u8 = 255;

/// Encoded value of a dead cell.
pub const DEAD: u8 = 0;

/// Coordinates of a single cell, `x` being the column and `y` the row.
///
/// A `Cell` is derived from a [`Grid`](crate::Grid) and never authoritative on
/// its own. Ordering is row-major, matching the order in which
/// [`Grid::alive_cells`](crate::Grid::alive_cells) reports them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Cell {
    pub x: usize,
    pub y: usize,
}

impl Cell {
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

impl From<(usize, usize)> for Cell {
    fn from((x, y): (usize, usize)) -> Self {
        Self { x, y }
    }
}

impl PartialOrd for Cell {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cell {
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        (self.y, self.x).cmp(&(other.y, other.x))
    }
}

/// Returns `true` when an encoded cell value is alive.
#[inline]
pub const fn is_alive(value: u8) -> bool {
    value == ALIVE
}
