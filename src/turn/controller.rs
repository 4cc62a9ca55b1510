//! The turn-taking state machine.
//!
//! Voice conversation is half-duplex per speaker while the system stays
//! structurally full-duplex: agent audio keeps flowing while capture watches
//! for interruption. This controller is the single authority deciding
//! whether inbound audio is new user input or noise during agent speech.
//! It is a pure decision machine: activities report signals, the
//! orchestrator's control loop is the only writer and carries out the
//! returned directives in order.

/// Whose turn it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum TurnState {
    Idle,
    UserSpeaking,
    AgentResponding,
    Interrupted,
}

/// Observations reported by the concurrent activities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnSignal {
    /// Voice activity detected on the capture path.
    VoiceActivity,
    /// End-of-utterance (silence threshold) from the speech bridge.
    EndOfUtterance,
    /// The channel began emitting events for a new agent turn.
    AgentStreamStarted,
    /// The channel marked the agent turn ended.
    AgentStreamEnded,
}

/// Side effects the orchestrator must carry out, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnDirective {
    /// Stop playback immediately. Emitted exactly once per barge-in.
    StopPlayback,
    /// Best-effort cancel the agent turn on the channel.
    CancelAgentTurn,
    /// Mark the current agent turn terminal.
    EndAgentTurn,
    /// Open a user turn.
    BeginUserTurn,
    /// Close the user turn and forward it to the agent.
    EndUserTurn,
    /// Open an agent turn.
    BeginAgentTurn,
}

/// States entered and directives produced by one signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// Every state entered, in order. Barge-in passes through
    /// `Interrupted` before landing on `UserSpeaking`.
    pub entered: Vec<TurnState>,
    pub directives: Vec<TurnDirective>,
}

impl Transition {
    fn none() -> Self {
        Self {
            entered: Vec::new(),
            directives: Vec::new(),
        }
    }
}

/// Single-writer turn state machine. Initial state is `Idle`; there is no
/// terminal state, the machine is torn down with the session.
#[derive(Debug)]
pub struct TurnController {
    state: TurnState,
}

impl Default for TurnController {
    fn default() -> Self {
        Self::new()
    }
}

impl TurnController {
    pub fn new() -> Self {
        Self {
            state: TurnState::Idle,
        }
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    /// Apply a signal, returning the states entered and the side effects
    /// the caller must perform. Signals that do not apply in the current
    /// state are no-ops.
    pub fn signal(&mut self, signal: TurnSignal) -> Transition {
        use TurnDirective::*;
        use TurnSignal::*;
        use TurnState::*;

        match (self.state, signal) {
            (Idle, VoiceActivity) => self.enter(
                vec![UserSpeaking],
                vec![BeginUserTurn],
            ),
            (UserSpeaking, EndOfUtterance) => self.enter(vec![Idle], vec![EndUserTurn]),
            (Idle, AgentStreamStarted) => self.enter(vec![AgentResponding], vec![BeginAgentTurn]),
            (AgentResponding, AgentStreamEnded) => self.enter(vec![Idle], vec![EndAgentTurn]),
            // Barge-in: playback stops and the agent turn is cancelled
            // before the new user turn opens. `Interrupted` transitions to
            // `UserSpeaking` immediately; the barge-in audio starts the
            // next turn.
            (AgentResponding, VoiceActivity) => self.enter(
                vec![Interrupted, UserSpeaking],
                vec![StopPlayback, CancelAgentTurn, EndAgentTurn, BeginUserTurn],
            ),
            _ => Transition::none(),
        }
    }

    fn enter(&mut self, entered: Vec<TurnState>, directives: Vec<TurnDirective>) -> Transition {
        for state in &entered {
            tracing::trace!(from = %self.state, to = %state, "turn transition");
            self.state = *state;
        }
        Transition {
            entered,
            directives,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_idle() {
        assert_eq!(TurnController::new().state(), TurnState::Idle);
    }

    #[test]
    fn voice_activity_opens_a_user_turn() {
        let mut controller = TurnController::new();
        let transition = controller.signal(TurnSignal::VoiceActivity);

        assert_eq!(controller.state(), TurnState::UserSpeaking);
        assert_eq!(transition.directives, vec![TurnDirective::BeginUserTurn]);
    }

    #[test]
    fn end_of_utterance_closes_the_user_turn() {
        let mut controller = TurnController::new();
        controller.signal(TurnSignal::VoiceActivity);
        let transition = controller.signal(TurnSignal::EndOfUtterance);

        assert_eq!(controller.state(), TurnState::Idle);
        assert_eq!(transition.directives, vec![TurnDirective::EndUserTurn]);
    }

    #[test]
    fn agent_stream_runs_between_idle_states() {
        let mut controller = TurnController::new();
        controller.signal(TurnSignal::AgentStreamStarted);
        assert_eq!(controller.state(), TurnState::AgentResponding);

        controller.signal(TurnSignal::AgentStreamEnded);
        assert_eq!(controller.state(), TurnState::Idle);
    }

    #[test]
    fn barge_in_passes_through_interrupted_with_one_playback_stop() {
        let mut controller = TurnController::new();
        controller.signal(TurnSignal::AgentStreamStarted);

        let transition = controller.signal(TurnSignal::VoiceActivity);

        assert_eq!(
            transition.entered,
            vec![TurnState::Interrupted, TurnState::UserSpeaking]
        );
        assert_eq!(controller.state(), TurnState::UserSpeaking);
        let stops = transition
            .directives
            .iter()
            .filter(|d| **d == TurnDirective::StopPlayback)
            .count();
        assert_eq!(stops, 1);
        assert!(transition.directives.contains(&TurnDirective::CancelAgentTurn));
    }

    #[test]
    fn inapplicable_signals_are_no_ops() {
        let mut controller = TurnController::new();
        let transition = controller.signal(TurnSignal::EndOfUtterance);
        assert!(transition.entered.is_empty());
        assert!(transition.directives.is_empty());
        assert_eq!(controller.state(), TurnState::Idle);

        controller.signal(TurnSignal::VoiceActivity);
        let transition = controller.signal(TurnSignal::AgentStreamStarted);
        assert!(transition.directives.is_empty());
        assert_eq!(controller.state(), TurnState::UserSpeaking);
    }

    #[test]
    fn repeated_voice_activity_while_speaking_changes_nothing() {
        let mut controller = TurnController::new();
        controller.signal(TurnSignal::VoiceActivity);
        let transition = controller.signal(TurnSignal::VoiceActivity);

        assert!(transition.directives.is_empty());
        assert_eq!(controller.state(), TurnState::UserSpeaking);
    }
}
