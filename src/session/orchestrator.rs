//! The session orchestrator control loop.
//!
//! Four concurrent activities run for the lifetime of an active session:
//! audio capture, audio playback, channel event receipt, and tool
//! execution. They communicate only by reporting events into this loop's
//! queue; the loop is the single writer of turn state and the only place
//! barge-in side effects are triggered.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::audio::{AudioCapture, AudioFrame, AudioPlayback};
use crate::channel::{decode_audio_payload, AgentChannel, InboundMessage, OutboundMessage};
use crate::config::SessionConfig;
use crate::error::VoiceError;
use crate::speech::{SpeechRecognizer, SpeechSynthesizer};
use crate::tools::{ToolCall, ToolDispatcher, ToolOutcome, ToolRegistry};
use crate::turn::{
    Speaker, Transition, TurnController, TurnDirective, TurnEventKind, TurnSignal, TurnState,
};

use super::{Session, SessionState};

/// External collaborators the orchestrator drives.
pub struct SessionDeps {
    /// Established conversation channel. Connection and authentication
    /// failures surface while constructing it, before a session exists.
    pub channel: Arc<dyn AgentChannel>,
    pub recognizer: Arc<dyn SpeechRecognizer>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub capture: Box<dyn AudioCapture>,
    pub playback: Arc<dyn AudioPlayback>,
}

/// Events the concurrent activities report into the control loop.
enum LoopEvent {
    Frame(AudioFrame),
    CaptureEnded,
    Inbound(InboundMessage),
    ChannelClosed,
    ToolDone(ToolCompletion),
    SynthesisDone,
    Fault(VoiceError),
}

struct ToolCompletion {
    turn_id: Uuid,
    request_id: String,
    name: String,
    outcome: Result<ToolOutcome, VoiceError>,
}

/// Top-level coordinator for one voice conversation.
pub struct SessionOrchestrator {
    config: SessionConfig,
    session: Session,
    controller: TurnController,
    dispatcher: ToolDispatcher,
    channel: Arc<dyn AgentChannel>,
    recognizer: Arc<dyn SpeechRecognizer>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    playback: Arc<dyn AudioPlayback>,
    events_tx: mpsc::Sender<LoopEvent>,
    events_rx: Option<mpsc::Receiver<LoopEvent>>,
    cancel: CancellationToken,
    capture_task: JoinHandle<()>,
    channel_task: JoinHandle<()>,
    synth_task: Option<JoinHandle<()>>,
    last_voice_activity: Option<Instant>,
    /// Outstanding tool calls, request id to owning turn.
    pending: HashMap<String, Uuid>,
    /// Request order of the current agent turn's tool calls.
    tool_order: Vec<String>,
    /// Completed results awaiting the per-turn flush.
    tool_results: HashMap<String, Value>,
    /// The agent marked its turn ended while tool calls were outstanding.
    agent_turn_done: bool,
    /// Inbound events held back until the current turn fully resolves.
    deferred: VecDeque<InboundMessage>,
    agent_turn_text: String,
    agent_turn_had_audio: bool,
}

impl std::fmt::Debug for SessionOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionOrchestrator")
            .field("config", &self.config)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl SessionOrchestrator {
    /// Create the session and start the capture and channel activities.
    ///
    /// Fails with a configuration error when the config is incomplete or a
    /// required tool is missing from the registry.
    pub async fn connect(
        config: SessionConfig,
        registry: Arc<ToolRegistry>,
        deps: SessionDeps,
    ) -> Result<Self, VoiceError> {
        config.validate()?;
        for name in &config.required_tools {
            registry.resolve(name).map_err(|_| {
                VoiceError::Configuration(format!("required tool '{name}' is not registered"))
            })?;
        }

        let mut session = Session::new(&config.agent_id);
        let dispatcher =
            ToolDispatcher::new(registry).with_call_timeout(config.tool_call_timeout);
        let cancel = CancellationToken::new();
        let (events_tx, events_rx) = mpsc::channel(256);

        let capture_task = spawn_capture_pump(deps.capture, events_tx.clone(), cancel.clone());
        let channel_task =
            spawn_channel_pump(deps.channel.clone(), events_tx.clone(), cancel.clone());

        session.set_state(SessionState::Active);
        tracing::info!(
            session_id = %session.id(),
            agent_id = %config.agent_id,
            "session active"
        );

        Ok(Self {
            config,
            session,
            controller: TurnController::new(),
            dispatcher,
            channel: deps.channel,
            recognizer: deps.recognizer,
            synthesizer: deps.synthesizer,
            playback: deps.playback,
            events_tx,
            events_rx: Some(events_rx),
            cancel,
            capture_task,
            channel_task,
            synth_task: None,
            last_voice_activity: None,
            pending: HashMap::new(),
            tool_order: Vec::new(),
            tool_results: HashMap::new(),
            agent_turn_done: false,
            deferred: VecDeque::new(),
            agent_turn_text: String::new(),
            agent_turn_had_audio: false,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn turn_state(&self) -> TurnState {
        self.controller.state()
    }

    /// Token that cancels the session when triggered (operator quit).
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Drive the session until cancellation or a fatal error.
    ///
    /// Devices and the channel are released on every exit path. Tool-level
    /// failures are contained as conversational content; fatal errors stop
    /// playback, report one diagnostic summary, and close the session.
    pub async fn run(&mut self) -> Result<(), VoiceError> {
        let mut events_rx = self
            .events_rx
            .take()
            .ok_or_else(|| VoiceError::InvalidState("run may only be called once".into()))?;

        let mut silence_check = tokio::time::interval(Duration::from_millis(100));
        silence_check.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let cancel = self.cancel.clone();

        let outcome = loop {
            tokio::select! {
                _ = cancel.cancelled() => break Ok(()),
                maybe = events_rx.recv() => {
                    let Some(event) = maybe else {
                        break Err(VoiceError::InvalidState("activity queue closed".into()));
                    };
                    if let Err(err) = self.on_event(event).await {
                        if err.is_fatal() {
                            break Err(err);
                        }
                        tracing::warn!(error = %err, "contained session error");
                    }
                }
                _ = silence_check.tick() => {
                    if let Err(err) = self.check_silence().await {
                        if err.is_fatal() {
                            break Err(err);
                        }
                        tracing::warn!(error = %err, "contained session error");
                    }
                }
            }
        };

        match outcome {
            Ok(()) => {
                self.close().await;
                Ok(())
            }
            Err(err) => {
                self.fail(&err).await;
                Err(err)
            }
        }
    }

    /// Scoped teardown: stops capture and playback, closes the channel,
    /// and marks the session closed. Idempotent.
    pub async fn close(&mut self) {
        if self.session.state() == SessionState::Closed {
            return;
        }
        self.session.set_state(SessionState::Draining);
        self.cancel.cancel();
        if let Some(task) = self.synth_task.take() {
            task.abort();
        }
        if let Err(err) = self.playback.stop().await {
            tracing::warn!(error = %err, "playback stop during teardown");
        }
        if let Err(err) = self.channel.close().await {
            tracing::warn!(error = %err, "channel close during teardown");
        }
        self.capture_task.abort();
        self.channel_task.abort();
        self.session.set_state(SessionState::Closed);
    }

    async fn fail(&mut self, err: &VoiceError) {
        self.session.set_state(SessionState::Draining);
        if let Some(task) = self.synth_task.take() {
            task.abort();
        }
        let _ = self.playback.stop().await;
        // The one user-visible diagnostic for a fatal error.
        tracing::error!(category = %err.category(), error = %err, "session failed");
        self.close().await;
    }

    async fn on_event(&mut self, event: LoopEvent) -> Result<(), VoiceError> {
        match event {
            LoopEvent::Frame(frame) => self.on_frame(frame).await,
            LoopEvent::CaptureEnded => Err(VoiceError::SpeechBridge(
                "capture device stream ended".into(),
            )),
            LoopEvent::Inbound(message) => {
                if self.holding_inbound() {
                    self.deferred.push_back(message);
                    Ok(())
                } else {
                    self.on_inbound(message).await
                }
            }
            LoopEvent::ChannelClosed => {
                Err(VoiceError::Connection("channel closed by peer".into()))
            }
            LoopEvent::ToolDone(done) => self.on_tool_done(done).await,
            LoopEvent::SynthesisDone => self.on_synthesis_done().await,
            LoopEvent::Fault(err) => Err(err),
        }
    }

    /// Later-turn events wait while the current agent turn still owes tool
    /// results or synthesized speech.
    fn holding_inbound(&self) -> bool {
        self.agent_turn_done || self.synth_task.is_some()
    }

    async fn on_frame(&mut self, frame: AudioFrame) -> Result<(), VoiceError> {
        if frame.rms_energy() > self.config.vad_energy_threshold {
            self.last_voice_activity = Some(Instant::now());
            let transition = self.controller.signal(TurnSignal::VoiceActivity);
            self.apply(transition).await?;
        }

        if self.controller.state() == TurnState::UserSpeaking {
            let delta = self.recognizer.accept_frame(&frame).await?;
            self.channel.send(OutboundMessage::user_audio(&frame)).await?;
            if let Some(text) = delta {
                if let Some(turn) = self.session.current_turn_mut() {
                    turn.push(TurnEventKind::TranscriptDelta(text))?;
                }
            }
        }
        Ok(())
    }

    async fn check_silence(&mut self) -> Result<(), VoiceError> {
        if self.controller.state() != TurnState::UserSpeaking {
            return Ok(());
        }
        let Some(last) = self.last_voice_activity else {
            return Ok(());
        };
        if last.elapsed() >= self.config.silence_timeout {
            let transition = self.controller.signal(TurnSignal::EndOfUtterance);
            self.apply(transition).await?;
        }
        Ok(())
    }

    async fn on_inbound(&mut self, message: InboundMessage) -> Result<(), VoiceError> {
        match message {
            InboundMessage::AgentTranscriptDelta { text } => {
                if !self.ensure_agent_turn().await? {
                    return Ok(());
                }
                self.agent_turn_text.push_str(&text);
                if let Some(turn) = self.session.current_turn_mut() {
                    turn.push(TurnEventKind::TranscriptDelta(text))?;
                }
            }
            InboundMessage::AgentAudioDelta { audio, seq } => {
                if !self.ensure_agent_turn().await? {
                    return Ok(());
                }
                let frame = decode_audio_payload(&audio, self.config.sample_rate, seq)?;
                self.agent_turn_had_audio = true;
                if let Some(turn) = self.session.current_turn_mut() {
                    turn.push(TurnEventKind::AudioDelta(frame.clone()))?;
                }
                if self.controller.state() == TurnState::AgentResponding {
                    self.playback.play(frame).await?;
                }
            }
            InboundMessage::ToolCallRequested {
                request_id,
                name,
                arguments,
            } => {
                if !self.ensure_agent_turn().await? {
                    return Ok(());
                }
                let call = ToolCall::new(request_id.clone(), name, arguments);
                let turn_id = match self.session.current_turn_mut() {
                    Some(turn) => {
                        turn.push(TurnEventKind::ToolCallRequested(call.clone()))?;
                        turn.id()
                    }
                    None => return Ok(()),
                };
                self.pending.insert(request_id.clone(), turn_id);
                self.tool_order.push(request_id);
                self.spawn_tool(call, turn_id);
            }
            InboundMessage::TurnEnded => {
                if self.pending_for_current_turn() > 0 {
                    self.agent_turn_done = true;
                } else {
                    self.on_agent_stream_end().await?;
                }
            }
        }
        Ok(())
    }

    /// Open an agent turn for the first event of a new agent stream.
    /// Returns false when the event arrives in a state that cannot accept
    /// it (e.g. while the user is speaking) and should be dropped.
    async fn ensure_agent_turn(&mut self) -> Result<bool, VoiceError> {
        if self.controller.state() == TurnState::Idle {
            let transition = self.controller.signal(TurnSignal::AgentStreamStarted);
            self.apply(transition).await?;
        }
        if self.controller.state() == TurnState::AgentResponding
            && self.session.current_turn().is_some()
        {
            Ok(true)
        } else {
            tracing::warn!(state = %self.controller.state(), "dropping agent event outside agent turn");
            Ok(false)
        }
    }

    fn pending_for_current_turn(&self) -> usize {
        let Some(current) = self.session.current_turn() else {
            return 0;
        };
        let id = current.id();
        self.pending.values().filter(|t| **t == id).count()
    }

    fn spawn_tool(&self, mut call: ToolCall, turn_id: Uuid) {
        let dispatcher = self.dispatcher.clone();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let request_id = call.request_id().to_string();
            let name = call.name().to_string();
            let outcome = dispatcher.invoke(&mut call).await;
            let _ = tx
                .send(LoopEvent::ToolDone(ToolCompletion {
                    turn_id,
                    request_id,
                    name,
                    outcome,
                }))
                .await;
        });
    }

    async fn on_tool_done(&mut self, done: ToolCompletion) -> Result<(), VoiceError> {
        let Some(owning_turn) = self.pending.remove(&done.request_id) else {
            tracing::warn!(request_id = %done.request_id, "completion for unknown tool call");
            return Ok(());
        };

        // Failures become failed tool results; the agent recovers
        // conversationally.
        let result = match done.outcome {
            Ok(outcome) => outcome.body,
            Err(err) => {
                tracing::warn!(
                    tool = %done.name,
                    request_id = %done.request_id,
                    error = %err,
                    "tool call failed"
                );
                json!({ "error": err.to_string() })
            }
        };

        let current_id = self.session.current_turn().map(|t| t.id());
        if current_id == Some(owning_turn) {
            self.tool_results.insert(done.request_id, result);
            if self.pending_for_current_turn() == 0 {
                self.flush_tool_results().await?;
            }
        } else {
            // The owning turn was closed by barge-in. The result is logged,
            // never re-surfaced audibly or sent to the agent.
            self.session
                .record_late_tool_result(owning_turn, &done.request_id, result)?;
        }
        Ok(())
    }

    /// Deliver the current turn's gathered tool results, in request order,
    /// then let the turn resolve.
    async fn flush_tool_results(&mut self) -> Result<(), VoiceError> {
        let order: Vec<String> = self.tool_order.drain(..).collect();
        for request_id in order {
            let Some(result) = self.tool_results.remove(&request_id) else {
                continue;
            };
            if let Some(turn) = self.session.current_turn_mut() {
                turn.push(TurnEventKind::ToolCallResult {
                    request_id: request_id.clone(),
                    result: result.clone(),
                })?;
            }
            self.channel
                .send(OutboundMessage::ToolResult { request_id, result })
                .await?;
        }

        if self.agent_turn_done {
            self.agent_turn_done = false;
            self.on_agent_stream_end().await?;
            self.drain_deferred().await?;
        }
        Ok(())
    }

    /// The agent finished streaming its turn and all tool results are
    /// flushed. Text-only turns are synthesized before the turn closes.
    async fn on_agent_stream_end(&mut self) -> Result<(), VoiceError> {
        let needs_synthesis =
            !self.agent_turn_had_audio && !self.agent_turn_text.trim().is_empty();
        if needs_synthesis && self.synth_task.is_none() {
            let text = std::mem::take(&mut self.agent_turn_text);
            self.start_synthesis(text).await?;
            return Ok(());
        }
        let transition = self.controller.signal(TurnSignal::AgentStreamEnded);
        self.apply(transition).await
    }

    async fn start_synthesis(&mut self, text: String) -> Result<(), VoiceError> {
        let synthesizer = self.synthesizer.clone();
        let playback = self.playback.clone();
        let tx = self.events_tx.clone();
        self.synth_task = Some(tokio::spawn(async move {
            let result = async {
                let mut stream = synthesizer.synthesize(&text).await?;
                while let Some(frame) = stream.next().await {
                    playback.play(frame?).await?;
                }
                Ok::<(), VoiceError>(())
            }
            .await;
            if let Err(err) = result {
                let _ = tx.send(LoopEvent::Fault(err)).await;
            }
            // Completion is reported even after a fault so a contained
            // error still lets the turn resolve.
            let _ = tx.send(LoopEvent::SynthesisDone).await;
        }));
        Ok(())
    }

    async fn on_synthesis_done(&mut self) -> Result<(), VoiceError> {
        self.synth_task = None;
        let transition = self.controller.signal(TurnSignal::AgentStreamEnded);
        self.apply(transition).await?;
        self.drain_deferred().await
    }

    async fn drain_deferred(&mut self) -> Result<(), VoiceError> {
        while !self.holding_inbound() {
            let Some(message) = self.deferred.pop_front() else {
                break;
            };
            self.on_inbound(message).await?;
        }
        Ok(())
    }

    /// Carry out a transition's side effects, in order. Playback stop is
    /// awaited before any turn bookkeeping changes.
    async fn apply(&mut self, transition: Transition) -> Result<(), VoiceError> {
        let interrupted = transition.entered.contains(&TurnState::Interrupted);
        for directive in transition.directives {
            match directive {
                TurnDirective::StopPlayback => {
                    if let Some(task) = self.synth_task.take() {
                        task.abort();
                    }
                    self.playback.stop().await?;
                }
                TurnDirective::CancelAgentTurn => {
                    if self.channel.supports_cancellation() {
                        if let Some(turn) = self.session.current_turn() {
                            self.channel
                                .send(OutboundMessage::CancelTurn {
                                    turn_id: turn.id().to_string(),
                                })
                                .await?;
                        }
                    }
                }
                TurnDirective::EndAgentTurn => self.finalize_agent_turn(interrupted)?,
                TurnDirective::BeginUserTurn => {
                    self.session.begin_turn(Speaker::User)?;
                    self.last_voice_activity = Some(Instant::now());
                }
                TurnDirective::EndUserTurn => self.finalize_user_turn().await?,
                TurnDirective::BeginAgentTurn => {
                    self.session.begin_turn(Speaker::Agent)?;
                    self.agent_turn_text.clear();
                    self.agent_turn_had_audio = false;
                }
            }
        }
        Ok(())
    }

    fn finalize_agent_turn(&mut self, interrupted: bool) -> Result<(), VoiceError> {
        // Outstanding calls keep running; their completions route to the
        // closed turn's log through the pending map.
        self.agent_turn_done = false;
        self.tool_order.clear();
        self.tool_results.clear();
        if interrupted {
            self.agent_turn_text.clear();
            // Anything queued behind the interrupted stream predates the
            // barge-in; replaying it would speak a cancelled turn.
            self.deferred.clear();
        }
        self.session.end_current_turn()?;
        Ok(())
    }

    async fn finalize_user_turn(&mut self) -> Result<(), VoiceError> {
        let final_text = self.recognizer.finish().await?;
        self.recognizer.reset().await?;
        self.last_voice_activity = None;
        self.session.end_current_turn()?;
        if !final_text.trim().is_empty() {
            self.channel
                .send(OutboundMessage::UserTranscript { text: final_text })
                .await?;
        }
        Ok(())
    }
}

fn spawn_capture_pump(
    mut capture: Box<dyn AudioCapture>,
    tx: mpsc::Sender<LoopEvent>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                next = capture.next_frame() => match next {
                    Ok(Some(frame)) => {
                        if tx.send(LoopEvent::Frame(frame)).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        let _ = tx.send(LoopEvent::CaptureEnded).await;
                        break;
                    }
                    Err(err) => {
                        let fatal = err.is_fatal();
                        if tx.send(LoopEvent::Fault(err)).await.is_err() || fatal {
                            break;
                        }
                    }
                }
            }
        }
    })
}

fn spawn_channel_pump(
    channel: Arc<dyn AgentChannel>,
    tx: mpsc::Sender<LoopEvent>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                next = channel.recv() => match next {
                    Ok(Some(message)) => {
                        if tx.send(LoopEvent::Inbound(message)).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        let _ = tx.send(LoopEvent::ChannelClosed).await;
                        break;
                    }
                    // A malformed message is reported and skipped; only
                    // transport-level failures end the pump.
                    Err(err) => {
                        let fatal = err.is_fatal();
                        if tx.send(LoopEvent::Fault(err)).await.is_err() || fatal {
                            break;
                        }
                    }
                }
            }
        }
    })
}
