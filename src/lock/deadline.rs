use chrono::{DateTime, Utc};

/// Which window a deadline closes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadlineTag {
    /// End of the grace window after a correct challenge
    AutoLockExpiry,
    /// End of the guardian override window
    OverrideExpiry,
}

/// A pending point in time plus the window it closes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    pub fire_at: DateTime<Utc>,
    pub tag: DeadlineTag,
}

/// Single-slot deadline owner.
///
/// At most one deadline is ever pending: arming a new one cancels and
/// replaces any existing one regardless of tag. Grace and override
/// windows can never overlap, so one slot is sufficient and a superseded
/// deadline can never be delivered.
#[derive(Debug, Default)]
pub struct DeadlineArbiter {
    pending: Option<Deadline>,
}

impl DeadlineArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a deadline, unconditionally replacing any pending one.
    pub fn arm(&mut self, fire_at: DateTime<Utc>, tag: DeadlineTag) {
        if let Some(old) = self.pending.replace(Deadline { fire_at, tag }) {
            tracing::debug!(
                "Replacing pending {:?} deadline with {:?} at {}",
                old.tag,
                tag,
                fire_at
            );
        }
    }

    /// Clear the pending deadline if present. Idempotent.
    pub fn cancel(&mut self) {
        self.pending = None;
    }

    /// The currently armed deadline, if any.
    pub fn pending(&self) -> Option<Deadline> {
        self.pending
    }

    /// Deliver the tag of a due deadline exactly once.
    ///
    /// Returns `None` while nothing is armed or the armed deadline is
    /// still in the future. A cancelled or replaced deadline is never
    /// delivered.
    pub fn take_due(&mut self, now: DateTime<Utc>) -> Option<DeadlineTag> {
        match self.pending {
            Some(d) if d.fire_at <= now => {
                self.pending = None;
                Some(d.tag)
            }
            _ => None,
        }
    }
}
