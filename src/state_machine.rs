//! Game session lifecycle: Idle → Running → Idle.
//! There is no paused state; a running session only ends, for one of four reasons.

use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameState {
    /// No registry entry for the group.
    Idle,
    /// Entry present, listener active.
    Running,
}

impl std::fmt::Display for GameState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GameState::Idle => write!(f, "Idle"),
            GameState::Running => write!(f, "Running"),
        }
    }
}

impl GameState {
    /// Returns whether transitioning from `self` to `next` is valid.
    pub fn can_transition_to(self, next: GameState) -> bool {
        matches!(
            (self, next),
            (GameState::Idle, GameState::Running) | (GameState::Running, GameState::Idle)
        )
    }

    /// Validated transition for `group`. Tallies do not change state.
    pub fn transition(self, next: GameState, group: &str) -> Result<GameState, String> {
        if !self.can_transition_to(next) {
            let msg = format!("invalid transition: {} -> {}", self, next);
            warn!(group, "{}", msg);
            return Err(msg);
        }
        info!(group, from = %self, to = %next, "session_transition");
        Ok(next)
    }
}

/// Why a running session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndReason {
    /// Stop phrase received.
    ManualStop,
    /// Game duration elapsed.
    Timeout,
    /// Error while processing messages.
    ForcedStop,
    /// Plugin unloaded.
    Shutdown,
}

impl std::fmt::Display for EndReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EndReason::ManualStop => write!(f, "manual_stop"),
            EndReason::Timeout => write!(f, "timeout"),
            EndReason::ForcedStop => write!(f, "forced_stop"),
            EndReason::Shutdown => write!(f, "shutdown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        assert!(GameState::Idle.can_transition_to(GameState::Running));
        assert!(GameState::Running.can_transition_to(GameState::Idle));
        assert!(!GameState::Running.can_transition_to(GameState::Running));
        assert!(!GameState::Idle.can_transition_to(GameState::Idle));
    }

    #[test]
    fn test_transition_rejects_double_start() {
        assert_eq!(GameState::Idle.transition(GameState::Running, "g1"), Ok(GameState::Running));
        assert!(GameState::Running.transition(GameState::Running, "g1").is_err());
    }

    #[test]
    fn test_reason_labels() {
        assert_eq!(EndReason::ManualStop.to_string(), "manual_stop");
        assert_eq!(EndReason::ForcedStop.to_string(), "forced_stop");
    }
}
