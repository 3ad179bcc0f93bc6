use core::fmt;

/// A result type defaulting to [`GridError`].
pub type Result<T, E = GridError> = core::result::Result<T, E>;

/// All errors the core grid operations can produce.
///
/// Every variant describes malformed input. The transition rule itself is
/// infallible once a [`Grid`](crate::Grid) exists.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum GridError {
    /// The grid has no rows or no columns.
    Empty,

    /// `width * height` does not fit in `usize`.
    TooLarge { width: usize, height: usize },

    /// The encoded buffer does not hold exactly `width * height` cells.
    LengthMismatch { expected: usize, actual: usize },

    /// A cell byte is neither `0` nor `255`.
    InvalidCellValue { index: usize, value: u8 },

    /// A coordinate lies outside the grid.
    CellOutOfBounds { x: usize, y: usize },

    /// A row range is reversed or extends past the last row.
    RowsOutOfBounds {
        start: usize,
        end: usize,
        height: usize,
    },

    /// Two stitched ranges both claim the same row.
    OverlappingRows { row: usize },

    /// Stitching finished before every row was written.
    IncompleteStitch { covered: usize, height: usize },
}

impl fmt::Display for GridError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Empty => write!(fmt, "grid is empty"),
            Self::TooLarge { width, height } => {
                write!(fmt, "a {width}x{height} grid does not fit in memory")
            }
            Self::LengthMismatch { expected, actual } => {
                write!(fmt, "expected {expected} cells, got {actual}")
            }
            Self::InvalidCellValue { index, value } => {
                write!(fmt, "cell {index} has value {value}, expected 0 or 255")
            }
            Self::CellOutOfBounds { x, y } => write!(fmt, "cell ({x}, {y}) is outside the grid"),
            Self::RowsOutOfBounds { start, end, height } => {
                write!(fmt, "rows [{start}, {end}) invalid for height {height}")
            }
            Self::OverlappingRows { row } => write!(fmt, "row {row} stitched twice"),
            Self::IncompleteStitch { covered, height } => {
                write!(fmt, "stitched {covered} of {height} rows")
            }
        }
    }
}

impl core::error::Error for GridError {}
