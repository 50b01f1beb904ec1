//! Transfer lifecycle state machine.
//!
//! Every engine operation (fund, pay, purchase) moves through the same
//! phases. There is no partially-committed observable state: an external
//! reader sees either the pre-transfer world or the fully committed one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identifiers::TransferId;

/// Transfer phase representing the lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferPhase {
    /// Reading fresh account state and running business checks.
    Validating,
    /// Applying compare-and-set balance mutations.
    Applying,
    /// Appending paired ledger records.
    Recording,
    /// All mutations and records visible together.
    Committed,
    /// Terminal failure with no visible side effects.
    Aborted,
}

impl TransferPhase {
    /// Check if this is a final state.
    pub fn is_final(&self) -> bool {
        matches!(self, TransferPhase::Committed | TransferPhase::Aborted)
    }

    /// Get valid next phases from the current phase.
    pub fn valid_transitions(&self) -> &[TransferPhase] {
        match self {
            TransferPhase::Validating => &[TransferPhase::Applying, TransferPhase::Aborted],
            TransferPhase::Applying => &[TransferPhase::Recording, TransferPhase::Aborted],
            TransferPhase::Recording => &[TransferPhase::Committed, TransferPhase::Aborted],
            TransferPhase::Committed => &[],
            TransferPhase::Aborted => &[],
        }
    }

    /// Check if transition to the given phase is valid.
    pub fn can_transition_to(&self, next: TransferPhase) -> bool {
        self.valid_transitions().contains(&next)
    }
}

/// Lifecycle tracking for one engine operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transfer {
    /// Unique transfer identifier.
    pub id: TransferId,
    /// Current phase.
    pub phase: TransferPhase,
    /// When the transfer started.
    pub started_at: DateTime<Utc>,
    /// When the transfer reached a final phase.
    pub finished_at: Option<DateTime<Utc>>,
    /// Validate-phase attempts, counting conflict retries.
    pub attempts: u32,
}

impl Transfer {
    /// Start a new transfer in the validating phase.
    pub fn begin() -> Self {
        Self {
            id: TransferId::new(),
            phase: TransferPhase::Validating,
            started_at: Utc::now(),
            finished_at: None,
            attempts: 1,
        }
    }

    /// Transition to a new phase.
    pub fn transition_to(&mut self, next: TransferPhase) -> Result<(), InvalidPhaseTransition> {
        if !self.phase.can_transition_to(next) {
            return Err(InvalidPhaseTransition {
                from: self.phase,
                to: next,
            });
        }
        self.phase = next;
        if next.is_final() {
            self.finished_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Rewind to Validating for a conflict retry.
    pub fn restart(&mut self) {
        self.phase = TransferPhase::Validating;
        self.attempts += 1;
    }

    /// Mark the transfer aborted from any non-final phase.
    pub fn abort(&mut self) {
        if !self.phase.is_final() {
            self.phase = TransferPhase::Aborted;
            self.finished_at = Some(Utc::now());
        }
    }
}

/// Error when attempting an invalid phase transition.
#[derive(Debug, Clone)]
pub struct InvalidPhaseTransition {
    pub from: TransferPhase,
    pub to: TransferPhase,
}

impl std::fmt::Display for InvalidPhaseTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Invalid phase transition from {:?} to {:?}",
            self.from, self.to
        )
    }
}

impl std::error::Error for InvalidPhaseTransition {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let mut transfer = Transfer::begin();
        assert_eq!(transfer.phase, TransferPhase::Validating);

        assert!(transfer.transition_to(TransferPhase::Applying).is_ok());
        assert!(transfer.transition_to(TransferPhase::Recording).is_ok());
        assert!(transfer.transition_to(TransferPhase::Committed).is_ok());
        assert!(transfer.finished_at.is_some());
    }

    #[test]
    fn test_cannot_skip_phases() {
        let mut transfer = Transfer::begin();
        assert!(transfer.transition_to(TransferPhase::Committed).is_err());
        assert!(transfer.transition_to(TransferPhase::Recording).is_err());
    }

    #[test]
    fn test_abort_from_any_phase() {
        let mut transfer = Transfer::begin();
        transfer.transition_to(TransferPhase::Applying).unwrap();
        transfer.abort();
        assert_eq!(transfer.phase, TransferPhase::Aborted);
        assert!(transfer.phase.is_final());
    }

    #[test]
    fn test_restart_counts_attempts() {
        let mut transfer = Transfer::begin();
        transfer.transition_to(TransferPhase::Applying).unwrap();
        transfer.restart();
        assert_eq!(transfer.phase, TransferPhase::Validating);
        assert_eq!(transfer.attempts, 2);
    }

    #[test]
    fn test_final_phases() {
        assert!(TransferPhase::Committed.is_final());
        assert!(TransferPhase::Aborted.is_final());
        assert!(!TransferPhase::Validating.is_final());
    }
}
