use tracing::debug;

use crate::{ledger::Confirmation, ErrorCode};

/// Lifecycle of the one transaction a session may have in flight.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TxState {
    #[default]
    Idle,
    Submitted,
    Confirmed(Confirmation),
    Failed(String),
}

/// `Idle -> Submitted -> Confirmed | Failed`, then back to `Idle` via [`TxTracker::reset`].
#[derive(Debug, Default)]
pub struct TxTracker {
    state: TxState,
}

impl TxTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &TxState {
        &self.state
    }

    pub fn is_pending(&self) -> bool {
        self.state == TxState::Submitted
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, TxState::Confirmed(_) | TxState::Failed(_))
    }

    pub fn submit(&mut self) -> Result<(), ErrorCode> {
        match self.state {
            TxState::Idle => self.transition(TxState::Submitted),
            _ => Err(ErrorCode::InvalidTransition),
        }
    }

    pub fn confirm(&mut self, confirmation: Confirmation) -> Result<(), ErrorCode> {
        match self.state {
            TxState::Submitted => self.transition(TxState::Confirmed(confirmation)),
            _ => Err(ErrorCode::InvalidTransition),
        }
    }

    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), ErrorCode> {
        match self.state {
            TxState::Submitted => self.transition(TxState::Failed(reason.into())),
            _ => Err(ErrorCode::InvalidTransition),
        }
    }

    /// Clear a finished transaction. A pending one cannot be dropped.
    pub fn reset(&mut self) -> Result<(), ErrorCode> {
        match self.state {
            TxState::Submitted => Err(ErrorCode::InvalidTransition),
            _ => self.transition(TxState::Idle),
        }
    }

    fn transition(&mut self, next: TxState) -> Result<(), ErrorCode> {
        debug!(from = ?self.state, to = ?next, "tx state");
        self.state = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Outcome;

    fn confirmation() -> Confirmation {
        Confirmation {
            tx_id: 7,
            outcome: Outcome::LiquidityRemoved {
                base_amount: 1,
                token_amount: 2,
            },
        }
    }

    #[test]
    fn test_confirm_path() {
        let mut tracker = TxTracker::new();
        assert_eq!(tracker.state(), &TxState::Idle);
        tracker.submit().unwrap();
        assert!(tracker.is_pending());
        tracker.confirm(confirmation()).unwrap();
        assert_eq!(tracker.state(), &TxState::Confirmed(confirmation()));
        assert!(tracker.is_finished());
        tracker.reset().unwrap();
        assert_eq!(tracker.state(), &TxState::Idle);
    }

    #[test]
    fn test_fail_path() {
        let mut tracker = TxTracker::new();
        tracker.submit().unwrap();
        tracker.fail("reverted").unwrap();
        assert_eq!(tracker.state(), &TxState::Failed("reverted".to_string()));
    }

    #[test]
    fn test_invalid_transitions() {
        let mut tracker = TxTracker::new();
        assert!(matches!(tracker.confirm(confirmation()), Err(ErrorCode::InvalidTransition)));
        assert!(matches!(tracker.fail("x"), Err(ErrorCode::InvalidTransition)));

        tracker.submit().unwrap();
        assert!(matches!(tracker.submit(), Err(ErrorCode::InvalidTransition)));
        assert!(matches!(tracker.reset(), Err(ErrorCode::InvalidTransition)));

        tracker.fail("x").unwrap();
        assert!(matches!(tracker.submit(), Err(ErrorCode::InvalidTransition)));
        assert!(matches!(tracker.confirm(confirmation()), Err(ErrorCode::InvalidTransition)));
    }
}
