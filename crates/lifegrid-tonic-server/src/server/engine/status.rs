//! Single-slot status rendezvous between query handlers and the turn loop.
//!
//! A query handler calls [`StatusRendezvous::query`], which parks a
//! [`oneshot::Sender`] in the slot and waits on the receiver. The turn loop
//! calls [`StatusRendezvous::publish`] at every generation boundary; if the
//! slot holds a sender, the loop counts live cells of the grid it just
//! published and answers. With no query waiting, `publish` is one uncontended
//! lock and nothing else.
//!
//! The job state lives under the same lock as the slot, so a query can never
//! be parked after the terminal transition and left waiting forever.
//!
//! ## Guarantees
//!
//! - The turn loop never waits for a reader.
//! - Every answer describes a published generation boundary.
//! - At most one query is parked at a time; a second one is rejected with
//!   [`Error::QueryPending`].
//! - Answers are delivered in turn order, so a client issuing queries one
//!   after another sees non-decreasing turns.

use lifegrid_tonic_core::{Error, Result, lifegrid::Grid, proto::StatusSnapshot};
use parking_lot::Mutex;
use tokio::sync::oneshot;

/// Lifecycle of one job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum JobState {
    Idle,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

type Reply = oneshot::Sender<Result<StatusSnapshot>>;

#[derive(Debug)]
struct Slot {
    state: JobState,
    turn: u64,
    pending: Option<Reply>,
}

#[derive(Debug)]
pub struct StatusRendezvous {
    slot: Mutex<Slot>,
}

impl Default for StatusRendezvous {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusRendezvous {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                state: JobState::Idle,
                turn: 0,
                pending: None,
            }),
        }
    }

    pub fn state(&self) -> JobState {
        self.slot.lock().state
    }

    /// Last published turn.
    pub fn turn(&self) -> u64 {
        self.slot.lock().turn
    }

    /// Whether a query is parked and still has a live receiver.
    pub fn is_pending(&self) -> bool {
        self.slot
            .lock()
            .pending
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
    }

    /// Moves the job from `Idle` to `Running`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::JobInProgress`] if the job was already started.
    pub fn start(&self) -> Result<()> {
        let mut slot = self.slot.lock();
        if slot.state != JobState::Idle {
            return Err(Error::JobInProgress);
        }
        slot.state = JobState::Running;
        Ok(())
    }

    /// Waits for the next generation boundary and reports it.
    ///
    /// # Errors
    ///
    /// - [`Error::QueryBeforeStart`] if the job is not running.
    /// - [`Error::QueryPending`] if another query is already parked.
    /// - The job's error if it fails or is cancelled while the query waits.
    pub async fn query(&self) -> Result<StatusSnapshot> {
        let rx = {
            let mut slot = self.slot.lock();
            if slot.state != JobState::Running {
                return Err(Error::QueryBeforeStart);
            }
            // A parked sender whose receiver was dropped (the caller went
            // away) does not block the slot.
            if slot.pending.as_ref().is_some_and(|tx| !tx.is_closed()) {
                return Err(Error::QueryPending);
            }
            let (tx, rx) = oneshot::channel();
            slot.pending = Some(tx);
            rx
        };

        rx.await.map_err(|_| Error::ChannelError {
            context: "status reply dropped before a generation boundary".to_string(),
        })?
    }

    /// Publishes generation boundary `turn` and answers a parked query.
    pub fn publish(&self, turn: u64, grid: &Grid) {
        let pending = {
            let mut slot = self.slot.lock();
            slot.turn = turn;
            slot.pending.take()
        };
        if let Some(tx) = pending {
            answer(tx, turn, grid);
        }
    }

    /// Moves the job to `Completed` after its final boundary was published.
    ///
    /// A query parked since that boundary will not see another one and is
    /// released with [`Error::QueryBeforeStart`], so each boundary answers
    /// at most one query.
    pub fn complete(&self, turn: u64) {
        let pending = {
            let mut slot = self.slot.lock();
            slot.turn = turn;
            slot.state = JobState::Completed;
            slot.pending.take()
        };
        if let Some(tx) = pending {
            let _ = tx.send(Err(Error::QueryBeforeStart));
        }
    }

    /// Moves the job to `Failed` (or `Cancelled` for [`Error::JobCancelled`])
    /// and releases a parked query with `err`.
    pub fn fail(&self, err: &Error) {
        self.end_with(err, true);
    }

    /// Like [`fail`](Self::fail), but leaves a job that already reached a
    /// terminal state untouched. Returns whether the state changed.
    pub fn settle(&self, err: &Error) -> bool {
        self.end_with(err, false)
    }

    fn end_with(&self, err: &Error, overwrite: bool) -> bool {
        let pending = {
            let mut slot = self.slot.lock();
            if !overwrite && slot.state.is_terminal() {
                return false;
            }
            slot.state = match err {
                Error::JobCancelled => JobState::Cancelled,
                _ => JobState::Failed,
            };
            slot.pending.take()
        };
        if let Some(tx) = pending {
            let _ = tx.send(Err(err.clone()));
        }
        true
    }
}

fn answer(tx: Reply, turn: u64, grid: &Grid) {
    // Counting is skipped when the caller already gave up.
    if tx.is_closed() {
        return;
    }
    let snapshot = StatusSnapshot::new(turn, grid.alive_count() as u64);
    if tx.send(Ok(snapshot)).is_err() {
        #[cfg(feature = "tracing")]
        tracing::trace!(turn, "Status query dropped before its answer");
    }
}
