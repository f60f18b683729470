use serde::Serialize;
use std::fmt;

/// Where an orchestrator is in its build lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Initializing,
    Configuring,
    Importing,
    InvokingBuilder,
    CollectingArtifacts,
    Done,
    Failed,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed)
    }

    /// Whether the state machine allows moving from `self` to `next`
    pub fn can_transition_to(&self, next: PipelineState) -> bool {
        use PipelineState::*;
        match (self, next) {
            (Idle | Done | Failed, Initializing) => true,
            (Idle, _) => false,
            (Done | Failed, _) => false,
            (_, Failed) => true,
            (Initializing, Configuring)
            | (Configuring, Importing)
            | (Importing, InvokingBuilder)
            | (InvokingBuilder, CollectingArtifacts)
            | (CollectingArtifacts, Done) => true,
            _ => false,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Idle => "idle",
            PipelineState::Initializing => "initializing",
            PipelineState::Configuring => "configuring",
            PipelineState::Importing => "importing",
            PipelineState::InvokingBuilder => "invoking_builder",
            PipelineState::CollectingArtifacts => "collecting_artifacts",
            PipelineState::Done => "done",
            PipelineState::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PipelineState::*;

    #[test]
    fn test_happy_path_transitions() {
        let path = [
            Idle,
            Initializing,
            Configuring,
            Importing,
            InvokingBuilder,
            CollectingArtifacts,
            Done,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_failed_reachable_from_active_states() {
        for state in [Initializing, Configuring, Importing, InvokingBuilder, CollectingArtifacts] {
            assert!(state.can_transition_to(Failed));
        }
        assert!(!Idle.can_transition_to(Failed));
    }

    #[test]
    fn test_no_skipping_stages() {
        assert!(!Configuring.can_transition_to(InvokingBuilder));
        assert!(!Initializing.can_transition_to(Done));
        assert!(!Done.can_transition_to(Failed));
    }

    #[test]
    fn test_terminal_states_can_restart() {
        assert!(Done.is_terminal());
        assert!(Failed.is_terminal());
        assert!(Done.can_transition_to(Initializing));
        assert!(Failed.can_transition_to(Initializing));
    }
}
