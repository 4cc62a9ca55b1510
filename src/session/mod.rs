//! Session data model.

pub mod orchestrator;

pub use orchestrator::{SessionDeps, SessionOrchestrator};

use serde_json::Value;
use uuid::Uuid;

use crate::error::VoiceError;
use crate::turn::{Speaker, Turn};

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum SessionState {
    Connecting,
    Active,
    Draining,
    Closed,
}

/// One active voice conversation.
///
/// Owned exclusively by the orchestrator: the turn log is append-only with
/// a single writer, and at most one turn is non-terminal at any instant.
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    agent_id: String,
    state: SessionState,
    current: Option<Turn>,
    log: Vec<Turn>,
}

impl Session {
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            agent_id: agent_id.into(),
            state: SessionState::Connecting,
            current: None,
            log: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            tracing::debug!(session_id = %self.id, from = %self.state, to = %state, "session state");
            self.state = state;
        }
    }

    /// The non-terminal turn, if one is open.
    pub fn current_turn(&self) -> Option<&Turn> {
        self.current.as_ref()
    }

    pub fn current_turn_mut(&mut self) -> Option<&mut Turn> {
        self.current.as_mut()
    }

    /// Turns in the order they terminated.
    pub fn turn_log(&self) -> &[Turn] {
        &self.log
    }

    /// Open a new turn. Enforces the single-active-turn invariant.
    pub fn begin_turn(&mut self, speaker: Speaker) -> Result<Uuid, VoiceError> {
        if self.current.is_some() {
            return Err(VoiceError::InvalidState(
                "a non-terminal turn is already open".into(),
            ));
        }
        let turn = Turn::new(speaker);
        let id = turn.id();
        tracing::debug!(session_id = %self.id, turn_id = %id, %speaker, "turn opened");
        self.current = Some(turn);
        Ok(id)
    }

    /// Mark the current turn terminal and append it to the log.
    pub fn end_current_turn(&mut self) -> Result<Uuid, VoiceError> {
        let mut turn = self
            .current
            .take()
            .ok_or_else(|| VoiceError::InvalidState("no turn is open".into()))?;
        turn.end()?;
        let id = turn.id();
        tracing::debug!(session_id = %self.id, turn_id = %id, "turn closed");
        self.log.push(turn);
        Ok(id)
    }

    /// Record a tool result that completed after its turn closed
    /// (barge-in). The result lands in the log only.
    pub fn record_late_tool_result(
        &mut self,
        turn_id: Uuid,
        request_id: &str,
        result: Value,
    ) -> Result<(), VoiceError> {
        let turn = self
            .log
            .iter_mut()
            .find(|t| t.id() == turn_id)
            .ok_or_else(|| {
                VoiceError::InvalidState(format!("turn {turn_id} is not in the log"))
            })?;
        turn.record_late_tool_result(request_id, result);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::turn::TurnEventKind;

    #[test]
    fn at_most_one_non_terminal_turn() {
        let mut session = Session::new("agent-1");
        session.begin_turn(Speaker::User).expect("first turn");

        let err = session
            .begin_turn(Speaker::Agent)
            .expect_err("second open turn must be rejected");
        assert!(matches!(err, VoiceError::InvalidState(_)));

        session.end_current_turn().expect("close");
        session.begin_turn(Speaker::Agent).expect("next turn opens");
    }

    #[test]
    fn turns_append_to_log_in_termination_order() {
        let mut session = Session::new("agent-1");

        let first = session.begin_turn(Speaker::User).unwrap();
        session.end_current_turn().unwrap();
        let second = session.begin_turn(Speaker::Agent).unwrap();
        session.end_current_turn().unwrap();

        let ids: Vec<Uuid> = session.turn_log().iter().map(|t| t.id()).collect();
        assert_eq!(ids, vec![first, second]);
        assert!(session.turn_log().iter().all(|t| t.is_terminal()));
    }

    #[test]
    fn late_tool_results_reach_the_logged_turn() {
        let mut session = Session::new("agent-1");
        let turn_id = session.begin_turn(Speaker::Agent).unwrap();
        session.end_current_turn().unwrap();

        session
            .record_late_tool_result(turn_id, "req-9", serde_json::json!({"ok": true}))
            .expect("late result is recorded");

        let turn = &session.turn_log()[0];
        assert!(matches!(
            turn.events().last().map(|e| &e.kind),
            Some(TurnEventKind::ToolCallResult { request_id, .. }) if request_id == "req-9"
        ));
    }

    #[test]
    fn ending_without_an_open_turn_fails() {
        let mut session = Session::new("agent-1");
        assert!(session.end_current_turn().is_err());
    }
}
