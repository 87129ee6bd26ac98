//! Transfer FSM State Definitions

use std::fmt;

use crate::error::{LedgerError, LedgerResult};

/// Per-attempt transfer state.
///
/// ```text
/// Initiated -> Validated -> Debited -> Credited -> Committed
///     |            |           |          |
///     +-> Failed <-+           +---> RolledBack -> Failed
/// ```
///
/// Terminal states: COMMITTED, FAILED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferState {
    /// Request accepted, nothing checked yet
    Initiated,

    /// Accounts resolved, funds checked under both locks
    Validated,

    /// Sender balance decremented in memory (not yet durable)
    Debited,

    /// Recipient balance incremented in memory (not yet durable)
    Credited,

    /// Terminal: commit record durable
    Committed,

    /// In-memory effects undone after a failed commit
    RolledBack,

    /// Terminal: no funds moved
    Failed,
}

impl TransferState {
    /// Check if this is a terminal state (no more transitions possible)
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferState::Committed | TransferState::Failed)
    }

    /// Balances have been touched but the commit record is not durable
    #[inline]
    pub fn is_in_flight(&self) -> bool {
        matches!(self, TransferState::Debited | TransferState::Credited)
    }

    pub fn can_transition_to(&self, next: TransferState) -> bool {
        use TransferState::*;
        matches!(
            (self, next),
            (Initiated, Validated)
                | (Initiated, Failed)
                | (Validated, Debited)
                | (Validated, Failed)
                | (Debited, Credited)
                | (Debited, RolledBack)
                | (Credited, Committed)
                | (Credited, RolledBack)
                | (RolledBack, Failed)
        )
    }

    /// Move to `next`, rejecting edges not in the state diagram
    pub fn advance(&mut self, next: TransferState) -> LedgerResult<()> {
        if !self.can_transition_to(next) {
            return Err(LedgerError::InvalidStateTransition(format!(
                "transfer {} -> {}",
                self, next
            )));
        }
        *self = next;
        Ok(())
    }

    /// Get human-readable state name
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferState::Initiated => "INITIATED",
            TransferState::Validated => "VALIDATED",
            TransferState::Debited => "DEBITED",
            TransferState::Credited => "CREDITED",
            TransferState::Committed => "COMMITTED",
            TransferState::RolledBack => "ROLLED_BACK",
            TransferState::Failed => "FAILED",
        }
    }
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
