//! Lifecycle of a single key access object through a rewrap.

use std::fmt::{self, Display};

use tracing::debug;
use warden_types::DecisionOutcome;

use crate::error::{KasError, Result};

/// ```text
/// Requested ─► EntitiesResolved ─► Entitled ─► Decided(Permit) ─► KeyUnwrapped ─► KeyRewrapped ─► Returned
///                                                 Decided(Deny) ─────────────────────────────────► Returned
/// ```
///
/// A failure at any step ends the object's rewrap with an error result; the
/// state never moves backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewrapState {
    Requested,
    EntitiesResolved,
    Entitled,
    Decided(DecisionOutcome),
    KeyUnwrapped,
    KeyRewrapped,
    Returned,
}

impl RewrapState {
    pub fn can_advance_to(self, next: Self) -> bool {
        use RewrapState::{
            Decided, Entitled, EntitiesResolved, KeyRewrapped, KeyUnwrapped, Requested, Returned,
        };
        match (self, next) {
            (Requested, EntitiesResolved)
            | (EntitiesResolved, Entitled)
            | (Decided(DecisionOutcome::Permit), KeyUnwrapped)
            | (Decided(DecisionOutcome::Deny), Returned)
            | (KeyUnwrapped, KeyRewrapped)
            | (KeyRewrapped, Returned) => true,
            (Entitled, Decided(outcome)) => outcome != DecisionOutcome::Unspecified,
            _ => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == Self::Returned
    }
}

impl Display for RewrapState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Requested => f.write_str("REQUESTED"),
            Self::EntitiesResolved => f.write_str("ENTITIES_RESOLVED"),
            Self::Entitled => f.write_str("ENTITLED"),
            Self::Decided(DecisionOutcome::Permit) => f.write_str("DECIDED(PERMIT)"),
            Self::Decided(DecisionOutcome::Deny) => f.write_str("DECIDED(DENY)"),
            Self::Decided(DecisionOutcome::Unspecified) => f.write_str("DECIDED(UNSPECIFIED)"),
            Self::KeyUnwrapped => f.write_str("KEY_UNWRAPPED"),
            Self::KeyRewrapped => f.write_str("KEY_REWRAPPED"),
            Self::Returned => f.write_str("RETURNED"),
        }
    }
}

/// Tracks one key access object's progress.
#[derive(Debug)]
pub(crate) struct Progress<'a> {
    id: &'a str,
    state: RewrapState,
}

impl<'a> Progress<'a> {
    pub(crate) fn new(id: &'a str) -> Self {
        Self {
            id,
            state: RewrapState::Requested,
        }
    }

    pub(crate) fn advance(&mut self, next: RewrapState) -> Result<()> {
        if !self.state.can_advance_to(next) {
            return Err(KasError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        debug!(kao = self.id, from = %self.state, to = %next, "rewrap state");
        self.state = next;
        Ok(())
    }
}
