//! One-shot notification signals surfaced to the presentation layer.
//!
//! Each signal is a small explicit state machine rather than a bare boolean
//! flag: transitions happen only on the specific crossing events, and a
//! crossing that arrives while a notification is on screen re-arms the
//! signal instead of stacking a backlog.

use super::Rank;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalState {
    Idle,
    Armed,
    Displaying,
}

/// Fires when the rank changes across a mutation. The first observation
/// after startup establishes the baseline silently.
#[derive(Debug)]
pub struct RankUpSignal {
    state: SignalState,
    baseline: Rank,
    pending: Option<Rank>,
}

impl RankUpSignal {
    pub fn new(baseline: Rank) -> Self {
        Self {
            state: SignalState::Idle,
            baseline,
            pending: None,
        }
    }

    pub fn state(&self) -> SignalState {
        self.state
    }

    /// Record the rank after a mutation; arms the signal when it differs
    /// from the last observed rank. A change while a notification is still
    /// on screen updates the pending rank and re-arms on acknowledge.
    pub fn observe(&mut self, rank: Rank) {
        if rank == self.baseline {
            return;
        }
        self.baseline = rank;
        self.pending = Some(rank);
        if self.state == SignalState::Idle {
            self.state = SignalState::Armed;
        }
    }

    /// Consume an armed signal: moves to Displaying and yields the new rank.
    pub fn take(&mut self) -> Option<Rank> {
        if self.state != SignalState::Armed {
            return None;
        }
        self.state = SignalState::Displaying;
        self.pending.take()
    }

    /// Close the notification. Re-arms if another change landed while it
    /// was on screen.
    pub fn acknowledge(&mut self) {
        self.state = if self.pending.is_some() {
            SignalState::Armed
        } else {
            SignalState::Idle
        };
    }
}

/// Fires when a hope-spotlight unlock threshold is crossed. Crossings never
/// stack: at most one spotlight shows at a time, and a crossing during
/// display queues only the re-arming of the signal.
#[derive(Debug)]
pub struct SpotlightSignal {
    state: SignalState,
    rearm_pending: bool,
}

impl SpotlightSignal {
    pub fn new() -> Self {
        Self {
            state: SignalState::Idle,
            rearm_pending: false,
        }
    }

    pub fn state(&self) -> SignalState {
        self.state
    }

    pub fn arm(&mut self) {
        match self.state {
            SignalState::Idle => self.state = SignalState::Armed,
            SignalState::Armed => {}
            SignalState::Displaying => self.rearm_pending = true,
        }
    }

    /// Consume an armed signal: returns true once per unlock and moves to
    /// Displaying.
    pub fn take(&mut self) -> bool {
        if self.state != SignalState::Armed {
            return false;
        }
        self.state = SignalState::Displaying;
        true
    }

    pub fn acknowledge(&mut self) {
        self.state = if self.rearm_pending {
            SignalState::Armed
        } else {
            SignalState::Idle
        };
        self.rearm_pending = false;
    }
}

impl Default for SpotlightSignal {
    fn default() -> Self {
        Self::new()
    }
}
