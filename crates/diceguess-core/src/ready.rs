use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::player::ActorId;

/// Ready acknowledgments versus connected players, as mirrored in the
/// `ReadyCount` room property.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadyCounter {
    pub count: u32,
    pub total: u32,
}

/// What an acknowledgment did to the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// Counted; the new counter value.
    Counted(ReadyCounter),
    /// This actor already acknowledged since the last reset.
    Duplicate,
}

/// Barrier that opens once every connected player has acknowledged.
///
/// Held by the master. Satisfaction is reported exactly once per reset via
/// [`ReadyGate::take_satisfied`], so repeated checks within a tick or
/// spurious extra acknowledgments never trigger a second transition.
#[derive(Debug, Default)]
pub struct ReadyGate {
    acknowledged: HashSet<ActorId>,
    total: u32,
    fired: bool,
}

impl ReadyGate {
    pub fn new(total: u32) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    /// Zero the counter and re-arm the gate.
    pub fn reset(&mut self, total: u32) {
        self.acknowledged.clear();
        self.total = total;
        self.fired = false;
    }

    pub fn acknowledge(&mut self, actor_id: ActorId) -> AckOutcome {
        if self.acknowledged.insert(actor_id) {
            AckOutcome::Counted(self.counter())
        } else {
            AckOutcome::Duplicate
        }
    }

    /// Update the number of connected players (joins/leaves). Acknowledgments
    /// from players who left are dropped via `forget`.
    pub fn set_total(&mut self, total: u32) {
        self.total = total;
    }

    pub fn forget(&mut self, actor_id: ActorId) {
        self.acknowledged.remove(&actor_id);
    }

    pub fn counter(&self) -> ReadyCounter {
        ReadyCounter {
            count: self.acknowledged.len() as u32,
            total: self.total,
        }
    }

    /// True iff every connected player acknowledged. An empty room never is.
    pub fn is_satisfied(&self) -> bool {
        let c = self.counter();
        c.total > 0 && c.count >= c.total
    }

    /// Returns true the first time the gate is observed satisfied after a
    /// reset, false on every later call until the next reset.
    pub fn take_satisfied(&mut self) -> bool {
        if self.fired || !self.is_satisfied() {
            return false;
        }
        self.fired = true;
        true
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }
}
