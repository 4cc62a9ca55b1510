//! Turns and the events recorded within them.

pub mod controller;

pub use controller::{Transition, TurnController, TurnDirective, TurnSignal, TurnState};

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::audio::AudioFrame;
use crate::error::VoiceError;
use crate::tools::ToolCall;

/// Which party owns a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Speaker {
    User,
    Agent,
}

/// What happened, without the timestamp.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEventKind {
    TranscriptDelta(String),
    AudioDelta(AudioFrame),
    ToolCallRequested(ToolCall),
    ToolCallResult { request_id: String, result: Value },
    TurnEnded,
}

/// A timestamped unit within a turn, strictly ordered by arrival.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnEvent {
    pub at: DateTime<Utc>,
    pub kind: TurnEventKind,
}

/// One exchange unit owned by a single speaker.
///
/// Mutable only while non-terminal; once ended it is immutable and belongs
/// in the session's turn log. The single sanctioned exception is a late
/// tool result landing after barge-in, appended through
/// [`Turn::record_late_tool_result`].
#[derive(Debug, Clone)]
pub struct Turn {
    id: Uuid,
    speaker: Speaker,
    events: Vec<TurnEvent>,
    terminal: bool,
}

impl Turn {
    pub fn new(speaker: Speaker) -> Self {
        Self {
            id: Uuid::new_v4(),
            speaker,
            events: Vec::new(),
            terminal: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn speaker(&self) -> Speaker {
        self.speaker
    }

    pub fn events(&self) -> &[TurnEvent] {
        &self.events
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    /// Append an event in arrival order.
    pub fn push(&mut self, kind: TurnEventKind) -> Result<(), VoiceError> {
        if self.terminal {
            return Err(VoiceError::InvalidState(format!(
                "turn {} is terminal and cannot accept events",
                self.id
            )));
        }
        self.events.push(TurnEvent {
            at: Utc::now(),
            kind,
        });
        Ok(())
    }

    /// Record `TurnEnded` and mark the turn terminal.
    pub fn end(&mut self) -> Result<(), VoiceError> {
        self.push(TurnEventKind::TurnEnded)?;
        self.terminal = true;
        Ok(())
    }

    /// Record the result of a tool call that outlived its turn (barge-in
    /// leaves dispatched calls running). Logged only; never re-surfaced
    /// audibly or on the channel.
    pub fn record_late_tool_result(&mut self, request_id: impl Into<String>, result: Value) {
        self.events.push(TurnEvent {
            at: Utc::now(),
            kind: TurnEventKind::ToolCallResult {
                request_id: request_id.into(),
                result,
            },
        });
    }
}
