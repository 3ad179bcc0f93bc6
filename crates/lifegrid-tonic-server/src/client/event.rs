use core::fmt;
use lifegrid_tonic_core::lifegrid::Cell;

/// Lifecycle notifications of one client session, in emission order:
/// `Started`, any number of `Progress`, `Completed` on success, `Quitting`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Started {
        width: usize,
        height: usize,
        turns: i64,
    },
    Progress {
        turn: u64,
        alive_count: u64,
    },
    Completed {
        turn: u64,
        alive_cells: Vec<Cell>,
    },
    Quitting,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started {
                width,
                height,
                turns,
            } => write!(f, "Started {width}x{height} for {turns} turns"),
            Self::Progress { turn, alive_count } => {
                write!(f, "Turn {turn}: {alive_count} cells alive")
            }
            Self::Completed { turn, alive_cells } => write!(
                f,
                "Completed after {turn} turns with {} cells alive",
                alive_cells.len()
            ),
            Self::Quitting => f.write_str("Quitting"),
        }
    }
}
