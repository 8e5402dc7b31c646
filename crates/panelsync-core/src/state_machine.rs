//! Sync operation state machine
//!
//! ```text
//! Pending ──progress──▶ InProgress ──complete──▶ Completed
//!    │                      │
//!    └──error/timeout──▶ Failed ◀──error/timeout─┘
//! ```

use crate::error::SyncError;
use crate::types::SyncStatus;

/// Validate a status transition
pub fn validate_transition(from: SyncStatus, to: SyncStatus) -> Result<(), SyncError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(SyncError::IllegalTransition { from, to })
    }
}

/// Statuses reachable in one step
#[must_use]
pub fn allowed_transitions(from: SyncStatus) -> Vec<SyncStatus> {
    use SyncStatus::{Completed, Failed, InProgress, Pending};
    match from {
        Pending => vec![InProgress, Failed],
        InProgress => vec![Completed, Failed],
        Completed | Failed => vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_requires_acknowledgement() {
        assert!(validate_transition(SyncStatus::Pending, SyncStatus::Completed).is_err());
        assert!(validate_transition(SyncStatus::InProgress, SyncStatus::Completed).is_ok());
    }

    #[test]
    fn terminal_states_are_final() {
        for to in [
            SyncStatus::Pending,
            SyncStatus::InProgress,
            SyncStatus::Completed,
            SyncStatus::Failed,
        ] {
            assert!(validate_transition(SyncStatus::Completed, to).is_err());
            assert!(validate_transition(SyncStatus::Failed, to).is_err());
        }
    }
}
