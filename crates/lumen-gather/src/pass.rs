//! Per-pass state machine.
//!
//! A pass only moves forward: `Idle → EnvironmentConfigured →
//! BeforeHooksRun → Navigated → Recording → AfterHooksRun → Complete`.
//! There is no retry within a pass; a failed pass aborts the run.

/// Lifecycle states of one pass, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PassState {
    Idle,
    EnvironmentConfigured,
    BeforeHooksRun,
    Navigated,
    Recording,
    AfterHooksRun,
    Complete,
}

impl PassState {
    /// Move to `next`. Backward or repeated transitions are a logic error.
    pub fn advance(&mut self, next: PassState) {
        debug_assert!(
            *self < next,
            "pass state may only move forward: {self:?} -> {next:?}"
        );
        tracing::debug!(from = ?*self, to = ?next, "pass state transition");
        *self = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_states_are_ordered() {
        assert!(PassState::Idle < PassState::EnvironmentConfigured);
        assert!(PassState::EnvironmentConfigured < PassState::BeforeHooksRun);
        assert!(PassState::BeforeHooksRun < PassState::Navigated);
        assert!(PassState::Navigated < PassState::Recording);
        assert!(PassState::Recording < PassState::AfterHooksRun);
        assert!(PassState::AfterHooksRun < PassState::Complete);
    }

    #[test]
    fn test_advance_moves_forward() {
        let mut state = PassState::Idle;
        state.advance(PassState::EnvironmentConfigured);
        state.advance(PassState::Navigated);
        assert_eq!(state, PassState::Navigated);
    }

    #[test]
    #[should_panic(expected = "only move forward")]
    #[cfg(debug_assertions)]
    fn test_backward_transition_panics_in_debug() {
        let mut state = PassState::Navigated;
        state.advance(PassState::Idle);
    }
}
