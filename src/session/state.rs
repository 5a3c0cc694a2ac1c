//! Decision state machine for obtaining a token.

use std::fmt;

/// Phase of a single `obtain` run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Nothing has happened yet.
    #[default]
    Start,
    /// Looking the identity up in the store.
    Lookup,
    /// Stored token is still valid and will be returned as-is.
    Reuse,
    /// Stored token has expired and has been dropped from the store.
    Expired,
    /// No token is stored for the identity.
    Missing,
    /// Exchanging credentials for a new token.
    Acquire,
    /// A token has been handed back to the caller.
    Done,
    /// Acquisition failed; nothing was stored.
    Failed,
}

impl Phase {
    /// Check if transition to target phase is valid.
    ///
    /// Valid transitions:
    /// - Start -> Lookup
    /// - Lookup -> Reuse | Expired | Missing
    /// - Expired -> Acquire
    /// - Missing -> Acquire
    /// - Reuse -> Done
    /// - Acquire -> Done | Failed
    pub fn can_transition_to(&self, target: Phase) -> bool {
        use Phase::*;
        matches!(
            (*self, target),
            (Start, Lookup)
                | (Lookup, Reuse)
                | (Lookup, Expired)
                | (Lookup, Missing)
                | (Expired, Acquire)
                | (Missing, Acquire)
                | (Reuse, Done)
                | (Acquire, Done)
                | (Acquire, Failed)
        )
    }

    /// Attempt to transition to a new phase.
    ///
    /// Returns `Ok(())` if the transition is valid, or an error otherwise.
    pub fn transition_to(&mut self, target: Phase) -> crate::Result<()> {
        if self.can_transition_to(target) {
            tracing::trace!(from = %self, to = %target, "session phase");
            *self = target;
            Ok(())
        } else {
            Err(crate::error::Error::InvalidTransition {
                from: *self,
                to: target,
            })
        }
    }

    /// Check if this is a terminal phase (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Done | Phase::Failed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Start => "START",
            Phase::Lookup => "LOOKUP",
            Phase::Reuse => "REUSE",
            Phase::Expired => "EXPIRED",
            Phase::Missing => "MISSING",
            Phase::Acquire => "ACQUIRE",
            Phase::Done => "DONE",
            Phase::Failed => "FAILED",
        };
        f.write_str(name)
    }
}
