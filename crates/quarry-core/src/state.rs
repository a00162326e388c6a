//! Run lifecycle states.

use serde::{Deserialize, Serialize};

/// Lifecycle of the current run.
///
/// Transitions only on user action (run/cancel) or on an engine response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionState {
    /// Nothing has run yet.
    #[default]
    Idle,
    /// A first-page request is outstanding.
    Running,
    /// Cancel was requested; waiting for the request to settle.
    Cancelling,
    /// The last run produced a result.
    Succeeded,
    /// The last run ended with an engine error.
    Failed,
    /// The last run was cancelled.
    Cancelled,
}

impl ExecutionState {
    /// Whether a new run may start from this state.
    pub fn can_run(self) -> bool {
        matches!(
            self,
            ExecutionState::Idle
                | ExecutionState::Succeeded
                | ExecutionState::Failed
                | ExecutionState::Cancelled
        )
    }

    /// Whether a request is outstanding.
    pub fn is_busy(self) -> bool {
        matches!(self, ExecutionState::Running | ExecutionState::Cancelling)
    }

    /// Status label for the run history.
    pub fn history_status(self) -> Option<&'static str> {
        match self {
            ExecutionState::Succeeded => Some("successful"),
            ExecutionState::Failed => Some("fail"),
            ExecutionState::Cancelled => Some("cancelled"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_can_run() {
        assert!(ExecutionState::Idle.can_run());
        assert!(ExecutionState::Succeeded.can_run());
        assert!(ExecutionState::Failed.can_run());
        assert!(ExecutionState::Cancelled.can_run());
        assert!(!ExecutionState::Running.can_run());
        assert!(!ExecutionState::Cancelling.can_run());
    }

    #[test]
    fn test_history_status() {
        assert_eq!(ExecutionState::Succeeded.history_status(), Some("successful"));
        assert_eq!(ExecutionState::Failed.history_status(), Some("fail"));
        assert_eq!(ExecutionState::Running.history_status(), None);
    }
}
