//! Orchestrator
//!
//! Facade over the session components. Every user intent and every transport
//! result enters here and comes back out as an ordered list of [`Command`]s
//! for the host to execute.

use crate::{
    Command,
    board::{BoardContent, ToolCallBridge},
    lifecycle::{ConnectRequest, ConnectionLifecycle, Transition},
    playback::AudioPlaybackGate,
    preferences::{PreferenceUpdate, Preferences, is_supported_model},
    protocol::ClientEvent,
    router::{EventRouter, InboundEvent, ToolTarget, TranscriptUpdate},
    scenario::Scenario,
    session::{AttemptId, Codec, SessionStatus},
    supervisor::AutoConnectSupervisor,
    turn::TurnDetectionController,
};
use secrecy::SecretString;
use serde_json::{Value, json};
use tracing::{info, warn};

pub const GREETING_TRIGGER: &str = "hi";

pub struct Orchestrator {
    scenario: Scenario,
    codec: Codec,
    preferences: Preferences,
    selected_agent: Option<String>,
    lifecycle: ConnectionLifecycle,
    turn: TurnDetectionController,
    board: ToolCallBridge,
    playback: AudioPlaybackGate,
    supervisor: AutoConnectSupervisor,
    /// Between `response.created` and `response.done`.
    responding: bool,
}

impl Orchestrator {
    pub fn new(scenario: Scenario, codec: Codec, preferences: Preferences) -> Self {
        let selected_agent = scenario.roster.root().map(|a| a.name.clone());
        Self {
            turn: TurnDetectionController::new(preferences.push_to_talk),
            playback: AudioPlaybackGate::new(preferences.audio_playback_enabled),
            scenario,
            codec,
            preferences,
            selected_agent,
            lifecycle: ConnectionLifecycle::new(),
            board: ToolCallBridge::new(),
            supervisor: AutoConnectSupervisor::new(),
            responding: false,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.lifecycle.status()
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    pub fn board(&self) -> BoardContent {
        self.board.current()
    }

    pub fn selected_agent(&self) -> Option<&str> {
        self.selected_agent.as_deref()
    }

    pub fn pending_speech(&self) -> bool {
        self.turn.pending_speech()
    }

    pub fn auto_connect_enabled(&self) -> bool {
        self.supervisor.enabled()
    }

    /// Initial local state for a freshly loaded scenario.
    pub fn start(&mut self) -> Vec<Command> {
        let mut commands = self.playback.apply();
        if let Some(agent) = self.selected_agent.clone() {
            commands.push(Command::AgentChanged(agent));
            commands.extend(self.board.reset());
        }
        commands
    }

    pub fn toggle(&mut self) -> Vec<Command> {
        match self.status() {
            SessionStatus::Connected | SessionStatus::Connecting => self.disconnect(),
            SessionStatus::Disconnected => {
                self.supervisor.enable();
                self.connect()
            }
        }
    }

    pub fn connect(&mut self) -> Vec<Command> {
        let Some(agent) = self.selected_agent.clone() else {
            warn!("Connect requested without a selected agent");
            return Vec::new();
        };
        let request = ConnectRequest {
            agent,
            model: self.preferences.model.clone(),
            roster: self.scenario.roster.clone(),
            codec: self.codec,
            guardrails: self.scenario.guardrails(),
            extra_context: json!({
                "scenario": self.scenario.key,
                "institution": self.scenario.institution_name,
            }),
        };
        self.lifecycle.connect(request)
    }

    /// Explicit user disconnect; also stops auto-connect.
    pub fn disconnect(&mut self) -> Vec<Command> {
        self.supervisor.disable();
        self.teardown()
    }

    fn teardown(&mut self) -> Vec<Command> {
        let mut commands = self.lifecycle.disconnect();
        commands.extend(self.turn.clear_pending());
        self.responding = false;
        commands
    }

    /// The user picked another agent of the scenario: the current session
    /// ends and the supervisor reconnects with that agent as root.
    pub fn select_agent(&mut self, agent: &str) -> Vec<Command> {
        if !self.scenario.roster.contains(agent) {
            warn!(agent, "Unknown agent selected");
            return vec![Command::ReportError(format!("Unknown agent '{}'", agent))];
        }
        if self.selected_agent.as_deref() == Some(agent) {
            return Vec::new();
        }
        let mut commands = self.teardown();
        commands.extend(self.change_agent(agent));
        commands.extend(self.supervise());
        commands
    }

    fn change_agent(&mut self, agent: &str) -> Vec<Command> {
        info!(agent, "Active agent changed");
        self.selected_agent = Some(agent.to_string());
        let mut commands = vec![Command::AgentChanged(agent.to_string())];
        commands.extend(self.board.reset());
        commands
    }

    fn supervise(&mut self) -> Vec<Command> {
        if self
            .supervisor
            .should_connect(self.selected_agent.as_deref(), self.status(), &self.preferences.model)
        {
            self.connect()
        } else {
            Vec::new()
        }
    }

    /// The one setter surface for preferences. Every update is persisted.
    pub fn update_preference(&mut self, update: PreferenceUpdate) -> Vec<Command> {
        match update {
            PreferenceUpdate::PushToTalk(enabled) => return self.set_push_to_talk(enabled),
            PreferenceUpdate::AudioPlaybackEnabled(enabled) => return self.set_playback_enabled(enabled),
            PreferenceUpdate::Model(model) => return self.set_model(&model),
            PreferenceUpdate::SidePanelExpanded(v) => self.preferences.side_panel_expanded = v,
            PreferenceUpdate::TranscriptVisible(v) => self.preferences.transcript_visible = v,
            PreferenceUpdate::RightPaneView(v) => self.preferences.right_pane_view = v,
        }
        vec![self.persist()]
    }

    fn persist(&self) -> Command {
        Command::PersistPreferences(self.preferences.clone())
    }

    pub fn set_push_to_talk(&mut self, enabled: bool) -> Vec<Command> {
        self.preferences.push_to_talk = enabled;
        let mut commands = self.turn.set_push_to_talk(enabled, self.status());
        commands.push(self.persist());
        commands
    }

    pub fn set_playback_enabled(&mut self, enabled: bool) -> Vec<Command> {
        self.preferences.audio_playback_enabled = enabled;
        let mut commands = self.playback.set_playback_enabled(enabled, self.status());
        commands.push(self.persist());
        commands
    }

    /// The model is fixed per session, so a change while a session exists
    /// forces a disconnect followed by a supervised reconnect.
    pub fn set_model(&mut self, model: &str) -> Vec<Command> {
        if !is_supported_model(model) {
            warn!(model, "Unsupported model requested");
            return vec![Command::ReportError(format!("Unsupported model '{}'", model))];
        }
        let mut commands = Vec::new();
        if self.preferences.model != model {
            info!(model, "Realtime model changed");
            self.preferences.model = model.to_string();
            if self.status() != SessionStatus::Disconnected {
                commands.extend(self.teardown());
                self.supervisor.enable();
            }
            commands.extend(self.supervise());
        }
        commands.push(self.persist());
        commands
    }

    pub fn talk_down(&mut self) -> Vec<Command> {
        let commands = self.turn.talk_down(self.status(), self.responding);
        if !commands.is_empty() {
            self.responding = false;
        }
        commands
    }

    pub fn talk_up(&mut self) -> Vec<Command> {
        self.turn.talk_up(self.status())
    }

    /// Typed user input. Interrupts the agent, then injects the message.
    pub fn send_text(&mut self, text: &str) -> Vec<Command> {
        let text = text.trim();
        if text.is_empty() || self.status() != SessionStatus::Connected {
            return Vec::new();
        }
        let mut commands = vec![Command::Interrupt {
            cancel_response: std::mem::take(&mut self.responding),
        }];
        commands.extend(EventRouter::simulated_user_message(text));
        commands
    }

    /// Base64 microphone audio. Dropped unless connected.
    pub fn append_audio(&self, audio: String) -> Vec<Command> {
        if self.status() != SessionStatus::Connected {
            return Vec::new();
        }
        vec![Command::Send {
            event: ClientEvent::InputAudioBufferAppend { audio },
            label: None,
        }]
    }

    pub fn on_credential(&mut self, attempt: AttemptId, secret: Option<SecretString>) -> Vec<Command> {
        let transition = self.lifecycle.on_credential(attempt, secret);
        self.settle(transition)
    }

    pub fn on_connect_error(&mut self, attempt: AttemptId, message: String) -> Vec<Command> {
        let transition = self.lifecycle.on_connect_error(attempt, message);
        self.settle(transition)
    }

    pub fn on_transport_opened(&mut self, attempt: AttemptId) -> Vec<Command> {
        let transition = self.lifecycle.on_transport_opened(attempt);
        self.settle(transition)
    }

    /// The live transport closed without being asked to.
    pub fn on_transport_lost(&mut self) -> Vec<Command> {
        let mut commands = self.lifecycle.on_transport_lost();
        if commands.is_empty() {
            return commands;
        }
        commands.extend(self.turn.clear_pending());
        self.responding = false;
        commands.extend(self.supervise());
        commands
    }

    fn settle(&mut self, transition: Transition) -> Vec<Command> {
        match transition {
            Transition::Stale(commands) | Transition::Progress(commands) => commands,
            Transition::Failed { request, commands, .. } => {
                self.supervisor.record_failure(&request.agent, &request.model);
                commands
            }
            Transition::Connected(mut commands) => {
                self.supervisor.record_success();
                self.responding = false;
                commands.push(self.playback.sync_transport());
                commands.extend(self.session_ready());
                commands
            }
        }
    }

    /// Side effects of an agent taking control of a live session: the agent
    /// breadcrumb, the full session configuration and, unless a handoff
    /// caused it, the greeting trigger.
    fn session_ready(&mut self) -> Vec<Command> {
        let handoff = self.lifecycle.handoff_token().take();
        let Some(session) = self.lifecycle.session() else {
            return Vec::new();
        };
        let Some(agent) = session.roster.get(&session.active_agent) else {
            warn!(agent = %session.active_agent, "Active agent missing from roster");
            return Vec::new();
        };
        let mut commands = vec![
            Command::Breadcrumb {
                title: format!("Agent: {}", agent.name),
                data: json!({ "agent": agent, "extra_context": session.extra_context }),
            },
            Command::Send {
                event: EventRouter::session_configuration(
                    agent,
                    self.turn.mode(),
                    session.codec,
                    &session.guardrails,
                ),
                label: Some("session configuration"),
            },
        ];
        if !handoff {
            commands.extend(EventRouter::simulated_user_message(GREETING_TRIGGER));
        }
        commands
    }

    /// Applies one inbound transport event, in delivery order.
    pub fn handle_server_event(&mut self, event: Value) -> Vec<Command> {
        let inbound = EventRouter::normalize(&event);
        let mut commands = vec![Command::LogServerEvent(event)];
        match inbound {
            InboundEvent::TranscriptDelta { item_id, role, delta } => {
                commands.push(Command::Transcript(TranscriptUpdate::Delta { item_id, role, delta }));
            }
            InboundEvent::TranscriptDone { item_id, role, text } => {
                commands.push(Command::Transcript(TranscriptUpdate::Done { item_id, role, text }));
            }
            InboundEvent::AudioDelta { audio } => commands.push(Command::AudioChunk(audio)),
            InboundEvent::ResponseCreated => self.responding = true,
            InboundEvent::ResponseDone => self.responding = false,
            InboundEvent::SpeechStarted => {
                // Server VAD cancels the response itself; only local audio is flushed.
                if self.responding && !self.turn.is_push_to_talk() {
                    commands.push(Command::Interrupt {
                        cancel_response: false,
                    });
                }
            }
            InboundEvent::Error { message } => {
                warn!(error = %message, "Realtime server error");
                commands.push(Command::ReportError(message));
            }
            InboundEvent::FunctionCall {
                call_id,
                name,
                arguments,
            } => commands.extend(self.handle_tool_call(&call_id, &name, &arguments)),
            InboundEvent::Other => {}
        }
        commands
    }

    fn handle_tool_call(&mut self, call_id: &str, name: &str, arguments: &str) -> Vec<Command> {
        let Some(session) = self.lifecycle.session() else {
            warn!(tool = name, "Tool call without a live session");
            return Vec::new();
        };
        let target = match session.roster.get(&session.active_agent) {
            Some(agent) => EventRouter::tool_target(name, agent),
            None => ToolTarget::Unknown,
        };
        match target {
            ToolTarget::Board => {
                let mut commands = match self.board.invoke(arguments) {
                    Ok(commands) => commands,
                    Err(e) => {
                        warn!(error = %e, "Ignoring board_content call");
                        Vec::new()
                    }
                };
                commands.extend(EventRouter::tool_output(call_id, ToolCallBridge::acknowledgment()));
                commands
            }
            ToolTarget::Handoff(agent) => self.handoff(call_id, &agent),
            ToolTarget::Unknown => {
                warn!(tool = name, "Unknown tool called by agent");
                EventRouter::tool_output(call_id, json!({"ok": false, "error": "unknown tool"}))
            }
        }
    }

    /// Agent-initiated transfer inside the live session. The new agent gets
    /// its configuration but no greeting trigger.
    fn handoff(&mut self, call_id: &str, agent: &str) -> Vec<Command> {
        let mut commands = Vec::new();
        if self.lifecycle.set_active_agent(agent) {
            info!(agent, "Agent handoff");
            self.lifecycle.handoff_token().mark();
            commands.push(Command::Breadcrumb {
                title: "Handoff".to_string(),
                data: json!({ "to": agent }),
            });
            commands.extend(self.change_agent(agent));
            commands.extend(self.session_ready());
        }
        commands.extend(EventRouter::tool_output(
            call_id,
            json!({"ok": true, "assistant": agent}),
        ));
        commands
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        preferences::RightPaneView,
        protocol::Role,
        scenario::{AgentConfig, AgentRoster, AgentTool},
    };

    fn scenario() -> Scenario {
        Scenario {
            key: "universityTutor".to_string(),
            institution_name: "Tutoría Universitaria de Finanzas".to_string(),
            roster: AgentRoster::new(vec![
                AgentConfig::new("tutorFinanzas", "sage")
                    .with_tool(AgentTool::BoardContent)
                    .with_handoff("tutorEvaluador"),
                AgentConfig::new("tutorEvaluador", "sage").with_tool(AgentTool::BoardContent),
            ]),
        }
    }

    fn orchestrator() -> Orchestrator {
        Orchestrator::new(scenario(), Codec::Opus, Preferences::default())
    }

    fn secret() -> Option<SecretString> {
        Some(SecretString::from("ek_test".to_string()))
    }

    fn fetch_attempt(commands: &[Command]) -> Option<AttemptId> {
        commands.iter().find_map(|c| match c {
            Command::FetchCredential { attempt, .. } => Some(*attempt),
            _ => None,
        })
    }

    fn fetched_model(commands: &[Command]) -> Option<String> {
        commands.iter().find_map(|c| match c {
            Command::FetchCredential { model, .. } => Some(model.clone()),
            _ => None,
        })
    }

    fn complete(orch: &mut Orchestrator, commands: &[Command]) -> Vec<Command> {
        let attempt = fetch_attempt(commands).unwrap();
        orch.on_credential(attempt, secret());
        orch.on_transport_opened(attempt)
    }

    fn connected() -> (Orchestrator, Vec<Command>) {
        let mut orch = orchestrator();
        let commands = orch.toggle();
        let commands = complete(&mut orch, &commands);
        (orch, commands)
    }

    fn sent(commands: &[Command]) -> Vec<&'static str> {
        commands
            .iter()
            .filter_map(|c| match c {
                Command::Send { event, .. } => Some(event.kind()),
                _ => None,
            })
            .collect()
    }

    fn sent_json(commands: &[Command]) -> Vec<Value> {
        commands
            .iter()
            .filter_map(|c| match c {
                Command::Send { event, .. } => Some(serde_json::to_value(event).unwrap()),
                _ => None,
            })
            .collect()
    }

    fn tool_call(name: &str, arguments: &str) -> Value {
        json!({
            "type": "response.function_call_arguments.done",
            "call_id": "call_1",
            "name": name,
            "arguments": arguments
        })
    }

    fn tool_output(commands: &[Command]) -> Value {
        let events = sent_json(commands);
        let output = events
            .iter()
            .find(|e| e["item"]["type"] == "function_call_output")
            .unwrap();
        serde_json::from_str(output["item"]["output"].as_str().unwrap()).unwrap()
    }

    #[test]
    fn test_connect_emits_configuration_then_greeting() {
        let (orch, commands) = connected();
        assert_eq!(orch.status(), SessionStatus::Connected);
        assert_eq!(
            sent(&commands),
            vec!["session.update", "conversation.item.create", "response.create"]
        );
        let events = sent_json(&commands);
        assert_eq!(events[0]["session"]["turn_detection"]["threshold"], json!(0.9));
        assert_eq!(events[1]["item"]["content"][0]["text"], GREETING_TRIGGER);
        assert!(commands.iter().any(|c| matches!(c, Command::TransportMute(false))));
        assert!(commands.iter().any(
            |c| matches!(c, Command::Breadcrumb { title, .. } if title == "Agent: tutorFinanzas")
        ));
    }

    #[test]
    fn test_toggle_status_sequence() {
        let mut orch = orchestrator();
        let commands = orch.toggle();
        assert!(matches!(commands.first(), Some(Command::StatusChanged(SessionStatus::Connecting))));
        assert!(orch.auto_connect_enabled());
        complete(&mut orch, &commands);
        assert_eq!(orch.status(), SessionStatus::Connected);

        let commands = orch.toggle();
        assert!(matches!(commands.last(), Some(Command::StatusChanged(SessionStatus::Disconnected))));
        assert!(!orch.auto_connect_enabled());
        assert_eq!(orch.status(), SessionStatus::Disconnected);
    }

    #[test]
    fn test_connect_while_connecting_is_noop() {
        let mut orch = orchestrator();
        orch.toggle();
        assert!(orch.connect().is_empty());
        assert_eq!(orch.status(), SessionStatus::Connecting);
    }

    #[test]
    fn test_toggle_while_connecting_discards_late_result() {
        let mut orch = orchestrator();
        let commands = orch.toggle();
        let attempt = fetch_attempt(&commands).unwrap();
        orch.toggle();
        assert_eq!(orch.status(), SessionStatus::Disconnected);

        assert!(orch.on_credential(attempt, secret()).is_empty());
        let commands = orch.on_transport_opened(attempt);
        assert!(matches!(commands.as_slice(), [Command::DiscardTransport { .. }]));
        assert_eq!(orch.status(), SessionStatus::Disconnected);
    }

    #[test]
    fn test_missing_credential_is_not_retried() {
        let mut orch = orchestrator();
        let commands = orch.toggle();
        let attempt = fetch_attempt(&commands).unwrap();
        let commands = orch.on_credential(attempt, None);
        assert!(commands.iter().any(|c| matches!(c, Command::ReportError(_))));
        assert!(fetch_attempt(&commands).is_none());
        assert_eq!(orch.status(), SessionStatus::Disconnected);

        // A model change is a new pair and is tried once more.
        let commands = orch.set_model("gpt-realtime");
        assert_eq!(fetched_model(&commands).as_deref(), Some("gpt-realtime"));
    }

    #[test]
    fn test_model_change_while_connected_reconnects() {
        let (mut orch, _) = connected();
        let commands = orch.set_model("gpt-realtime");
        assert!(commands.iter().any(|c| matches!(c, Command::CloseTransport)));
        assert_eq!(fetched_model(&commands).as_deref(), Some("gpt-realtime"));
        assert_eq!(orch.status(), SessionStatus::Connecting);
        assert!(matches!(commands.last(), Some(Command::PersistPreferences(p)) if p.model == "gpt-realtime"));
    }

    #[test]
    fn test_model_change_while_idle_only_persists() {
        let mut orch = orchestrator();
        let commands = orch.set_model("gpt-realtime");
        assert!(matches!(commands.as_slice(), [Command::PersistPreferences(_)]));
        assert_eq!(orch.status(), SessionStatus::Disconnected);

        assert!(matches!(
            orch.set_model("gpt-4").as_slice(),
            [Command::ReportError(_)]
        ));
        assert_eq!(orch.preferences().model, "gpt-realtime");
    }

    #[test]
    fn test_select_agent_reconnects_with_new_root() {
        let (mut orch, _) = connected();
        let commands = orch.select_agent("tutorEvaluador");
        assert!(commands.iter().any(|c| matches!(c, Command::CloseTransport)));
        assert!(commands.iter().any(|c| matches!(c, Command::BoardChanged(BoardContent::Clean))));
        let commands = complete(&mut orch, &commands);
        assert!(commands.iter().any(
            |c| matches!(c, Command::Breadcrumb { title, .. } if title == "Agent: tutorEvaluador")
        ));
        assert_eq!(orch.selected_agent(), Some("tutorEvaluador"));
        assert!(orch.select_agent("tutorEvaluador").is_empty());
        assert!(matches!(orch.select_agent("nobody").as_slice(), [Command::ReportError(_)]));
    }

    #[test]
    fn test_select_agent_after_manual_disconnect_stays_disconnected() {
        let (mut orch, _) = connected();
        orch.toggle();
        let commands = orch.select_agent("tutorEvaluador");
        assert!(fetch_attempt(&commands).is_none());
        assert_eq!(orch.status(), SessionStatus::Disconnected);
    }

    #[test]
    fn test_board_tool_call_updates_board_and_acknowledges() {
        let (mut orch, _) = connected();
        let commands =
            orch.handle_server_event(tool_call("board_content", r#"{"content_action":"FINANCIAMIENTO"}"#));
        assert_eq!(orch.board(), BoardContent::Financiamiento);
        assert_eq!(tool_output(&commands), json!({"ok": true}));
        assert_eq!(
            sent(&commands),
            vec!["conversation.item.create", "response.create"]
        );
    }

    #[test]
    fn test_unrecognized_board_value_is_acknowledged_without_mutation() {
        let (mut orch, _) = connected();
        orch.handle_server_event(tool_call("board_content", r#"{"content_action":"FUENTES"}"#));
        let commands =
            orch.handle_server_event(tool_call("board_content", r#"{"content_action":"NOPE"}"#));
        assert_eq!(orch.board(), BoardContent::Fuentes);
        assert_eq!(tool_output(&commands), json!({"ok": true}));
        assert!(!commands.iter().any(|c| matches!(c, Command::BoardChanged(_))));
    }

    #[test]
    fn test_unknown_tool_is_answered() {
        let (mut orch, _) = connected();
        let commands = orch.handle_server_event(tool_call("lookup_grades", "{}"));
        assert_eq!(tool_output(&commands), json!({"ok": false, "error": "unknown tool"}));
    }

    #[test]
    fn test_handoff_skips_greeting_exactly_once() {
        let (mut orch, _) = connected();
        orch.handle_server_event(tool_call("board_content", r#"{"content_action":"INNOVACION"}"#));

        let commands = orch.handle_server_event(tool_call("transfer_to_tutorEvaluador", "{}"));
        assert_eq!(orch.selected_agent(), Some("tutorEvaluador"));
        assert_eq!(orch.board(), BoardContent::Clean);
        assert!(commands.iter().any(|c| matches!(c, Command::AgentChanged(a) if a == "tutorEvaluador")));
        let events = sent_json(&commands);
        assert_eq!(events[0]["type"], "session.update");
        assert!(!events.iter().any(|e| e["item"]["type"] == "message"));
        assert_eq!(
            tool_output(&commands),
            json!({"ok": true, "assistant": "tutorEvaluador"})
        );

        // The next natural transition greets again.
        orch.toggle();
        let commands = orch.toggle();
        let commands = complete(&mut orch, &commands);
        assert!(sent_json(&commands).iter().any(|e| e["item"]["type"] == "message"));
    }

    #[test]
    fn test_transfer_to_unlisted_agent_is_unknown() {
        let (mut orch, _) = connected();
        let commands = orch.select_agent("tutorEvaluador");
        complete(&mut orch, &commands);
        // tutorEvaluador lists no handoff targets.
        let commands = orch.handle_server_event(tool_call("transfer_to_tutorFinanzas", "{}"));
        assert!(!commands.iter().any(|c| matches!(c, Command::AgentChanged(_))));
        assert_eq!(tool_output(&commands), json!({"ok": false, "error": "unknown tool"}));
        assert_eq!(orch.selected_agent(), Some("tutorEvaluador"));
    }

    #[test]
    fn test_transcript_and_audio_events() {
        let (mut orch, _) = connected();
        let commands = orch.handle_server_event(json!({
            "type": "response.output_audio_transcript.delta",
            "item_id": "it_1",
            "delta": "Hola"
        }));
        assert!(matches!(commands[0], Command::LogServerEvent(_)));
        assert!(matches!(
            &commands[1],
            Command::Transcript(TranscriptUpdate::Delta { role: Role::Assistant, delta, .. }) if delta == "Hola"
        ));
        let commands = orch.handle_server_event(json!({"type": "response.audio.delta", "delta": "AAAA"}));
        assert!(matches!(&commands[1], Command::AudioChunk(a) if a == "AAAA"));
        let commands = orch.handle_server_event(json!({"type": "session.created"}));
        assert_eq!(commands.len(), 1);
    }

    #[test]
    fn test_speech_started_interrupts_response_under_vad() {
        let (mut orch, _) = connected();
        let idle = orch.handle_server_event(json!({"type": "input_audio_buffer.speech_started"}));
        assert_eq!(idle.len(), 1);
        orch.handle_server_event(json!({"type": "response.created"}));
        let commands = orch.handle_server_event(json!({"type": "input_audio_buffer.speech_started"}));
        assert!(matches!(
            commands.last(),
            Some(Command::Interrupt {
                cancel_response: false
            })
        ));
    }

    #[test]
    fn test_push_to_talk_turn() {
        let (mut orch, _) = connected();
        let commands = orch.set_push_to_talk(true);
        let events = sent_json(&commands);
        assert_eq!(events[0]["session"]["turn_detection"], json!(null));
        assert!(events[0]["session"].get("instructions").is_none());

        orch.handle_server_event(json!({"type": "response.created"}));
        let mut commands = orch.talk_down();
        assert!(matches!(
            commands.first(),
            Some(Command::Interrupt {
                cancel_response: true
            })
        ));
        assert!(orch.pending_speech());
        commands.extend(orch.talk_up());
        assert_eq!(
            sent(&commands),
            vec!["input_audio_buffer.clear", "input_audio_buffer.commit", "response.create"]
        );
        assert!(orch.talk_up().is_empty());
    }

    #[test]
    fn test_disconnect_clears_pending_speech() {
        let mut orch = Orchestrator::new(
            scenario(),
            Codec::Opus,
            Preferences {
                push_to_talk: true,
                ..Preferences::default()
            },
        );
        let commands = orch.toggle();
        let commands = complete(&mut orch, &commands);
        assert_eq!(sent_json(&commands)[0]["session"]["turn_detection"], json!(null));
        orch.talk_down();
        let commands = orch.toggle();
        assert!(commands.iter().any(|c| matches!(c, Command::PendingSpeech(false))));
        assert!(!orch.pending_speech());
    }

    #[test]
    fn test_send_text() {
        let mut orch = orchestrator();
        assert!(orch.send_text("hola").is_empty());
        let (mut orch, _) = connected();
        assert!(orch.send_text("   ").is_empty());
        let commands = orch.send_text("  ¿Qué es un bono?  ");
        assert!(matches!(commands[0], Command::Interrupt { cancel_response: false }));
        assert_eq!(sent_json(&commands)[0]["item"]["content"][0]["text"], "¿Qué es un bono?");
    }

    #[test]
    fn test_append_audio_only_while_connected() {
        let mut orch = orchestrator();
        assert!(orch.append_audio("AAAA".to_string()).is_empty());
        orch.toggle();
        assert!(orch.append_audio("AAAA".to_string()).is_empty());
        let (orch, _) = connected();
        assert_eq!(orch.append_audio("AAAA".to_string()).len(), 1);
    }

    #[test]
    fn test_playback_toggle_mutes_transport_when_connected() {
        let (mut orch, _) = connected();
        let commands = orch.update_preference(PreferenceUpdate::AudioPlaybackEnabled(false));
        assert!(commands.iter().any(|c| matches!(c, Command::TransportMute(true))));
        assert!(!orch.preferences().audio_playback_enabled);
    }

    #[test]
    fn test_transport_lost_reconnects_when_enabled() {
        let (mut orch, _) = connected();
        let commands = orch.on_transport_lost();
        assert!(matches!(commands.get(1), Some(Command::StatusChanged(SessionStatus::Disconnected))));
        assert!(fetch_attempt(&commands).is_some());
        assert_eq!(orch.status(), SessionStatus::Connecting);
    }

    #[test]
    fn test_layout_preferences_are_persisted() {
        let mut orch = orchestrator();
        let commands = orch.update_preference(PreferenceUpdate::RightPaneView(RightPaneView::Logs));
        assert!(matches!(
            commands.as_slice(),
            [Command::PersistPreferences(p)] if p.right_pane_view == RightPaneView::Logs
        ));
    }

    #[test]
    fn test_start_resets_board_for_root_agent() {
        let mut orch = orchestrator();
        let commands = orch.start();
        assert!(commands.iter().any(|c| matches!(c, Command::AgentChanged(a) if a == "tutorFinanzas")));
        assert!(commands.iter().any(|c| matches!(c, Command::BoardChanged(BoardContent::Clean))));
    }
}
