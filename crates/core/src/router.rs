//! Event Router
//!
//! The single funnel for protocol events. Inbound events arrive as raw JSON
//! and are normalized through a dispatch table keyed by event `type`; the
//! outbound helpers build the client events the other components emit.

use crate::{
    Command,
    board::{BOARD_TOOL_NAME, ToolCallBridge},
    protocol::{
        ClientEvent, ContentPart, ConversationItem, InputAudioTranscription, Role, SessionConfig,
        ToolDefinition,
    },
    scenario::{AgentConfig, AgentTool, OutputGuardrail},
    session::Codec,
    turn::TurnDetectionMode,
};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, warn};
use uuid::Uuid;

pub const HANDOFF_TOOL_PREFIX: &str = "transfer_to_";
pub const TRANSCRIPTION_MODEL: &str = "gpt-4o-mini-transcribe";

/// Updates for the transcript collaborator.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TranscriptUpdate {
    Message {
        id: String,
        role: Role,
        text: String,
        is_final: bool,
    },
    Delta {
        item_id: String,
        role: Role,
        delta: String,
    },
    Done {
        item_id: String,
        role: Role,
        text: String,
    },
}

/// An inbound transport event after normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    TranscriptDelta {
        item_id: String,
        role: Role,
        delta: String,
    },
    TranscriptDone {
        item_id: String,
        role: Role,
        text: String,
    },
    AudioDelta {
        audio: String,
    },
    FunctionCall {
        call_id: String,
        name: String,
        arguments: String,
    },
    ResponseCreated,
    ResponseDone,
    SpeechStarted,
    Error {
        message: String,
    },
    /// Logged raw, otherwise ignored.
    Other,
}

/// What a tool call is addressed to, from the active agent's point of view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolTarget {
    Board,
    Handoff(String),
    Unknown,
}

type Handler = fn(&Value) -> Option<InboundEvent>;

const DISPATCH: &[(&str, Handler)] = &[
    ("conversation.item.input_audio_transcription.delta", user_transcript_delta),
    ("conversation.item.input_audio_transcription.completed", user_transcript_done),
    ("response.audio_transcript.delta", assistant_transcript_delta),
    ("response.output_audio_transcript.delta", assistant_transcript_delta),
    ("response.text.delta", assistant_transcript_delta),
    ("response.output_text.delta", assistant_transcript_delta),
    ("response.audio_transcript.done", assistant_transcript_done),
    ("response.output_audio_transcript.done", assistant_transcript_done),
    ("response.text.done", assistant_transcript_done),
    ("response.output_text.done", assistant_transcript_done),
    ("response.audio.delta", audio_delta),
    ("response.output_audio.delta", audio_delta),
    ("response.function_call_arguments.done", function_call),
    ("response.created", response_created),
    ("response.done", response_done),
    ("input_audio_buffer.speech_started", speech_started),
    ("error", error),
];

fn str_field(event: &Value, key: &str) -> Option<String> {
    event.get(key).and_then(Value::as_str).map(str::to_string)
}

fn user_transcript_delta(event: &Value) -> Option<InboundEvent> {
    Some(InboundEvent::TranscriptDelta {
        item_id: str_field(event, "item_id")?,
        role: Role::User,
        delta: str_field(event, "delta")?,
    })
}

fn user_transcript_done(event: &Value) -> Option<InboundEvent> {
    Some(InboundEvent::TranscriptDone {
        item_id: str_field(event, "item_id")?,
        role: Role::User,
        text: str_field(event, "transcript").unwrap_or_default(),
    })
}

fn assistant_transcript_delta(event: &Value) -> Option<InboundEvent> {
    Some(InboundEvent::TranscriptDelta {
        item_id: str_field(event, "item_id")?,
        role: Role::Assistant,
        delta: str_field(event, "delta")?,
    })
}

fn assistant_transcript_done(event: &Value) -> Option<InboundEvent> {
    let text = str_field(event, "transcript").or_else(|| str_field(event, "text"))?;
    Some(InboundEvent::TranscriptDone {
        item_id: str_field(event, "item_id")?,
        role: Role::Assistant,
        text,
    })
}

fn audio_delta(event: &Value) -> Option<InboundEvent> {
    Some(InboundEvent::AudioDelta {
        audio: str_field(event, "delta")?,
    })
}

fn function_call(event: &Value) -> Option<InboundEvent> {
    Some(InboundEvent::FunctionCall {
        call_id: str_field(event, "call_id")?,
        name: str_field(event, "name").unwrap_or_default(),
        arguments: str_field(event, "arguments").unwrap_or_else(|| "{}".to_string()),
    })
}

fn response_created(_: &Value) -> Option<InboundEvent> {
    Some(InboundEvent::ResponseCreated)
}

fn response_done(_: &Value) -> Option<InboundEvent> {
    Some(InboundEvent::ResponseDone)
}

fn speech_started(_: &Value) -> Option<InboundEvent> {
    Some(InboundEvent::SpeechStarted)
}

fn error(event: &Value) -> Option<InboundEvent> {
    let message = event
        .pointer("/error/message")
        .and_then(Value::as_str)
        .unwrap_or("unknown server error");
    Some(InboundEvent::Error {
        message: message.to_string(),
    })
}

pub struct EventRouter;

impl EventRouter {
    /// Looks the event up by `type`. Unknown kinds and malformed payloads
    /// normalize to [`InboundEvent::Other`].
    pub fn normalize(event: &Value) -> InboundEvent {
        let Some(kind) = event.get("type").and_then(Value::as_str) else {
            warn!("Inbound event without a type");
            return InboundEvent::Other;
        };
        match DISPATCH.iter().find(|(k, _)| *k == kind) {
            Some((_, handler)) => handler(event).unwrap_or_else(|| {
                warn!(kind, "Malformed inbound event");
                InboundEvent::Other
            }),
            None => {
                debug!(kind, "Unrouted inbound event");
                InboundEvent::Other
            }
        }
    }

    pub fn tool_target(name: &str, agent: &AgentConfig) -> ToolTarget {
        if name == BOARD_TOOL_NAME && agent.has_tool(AgentTool::BoardContent) {
            return ToolTarget::Board;
        }
        match name.strip_prefix(HANDOFF_TOOL_PREFIX) {
            Some(target) if agent.can_hand_off_to(target) => ToolTarget::Handoff(target.to_string()),
            _ => ToolTarget::Unknown,
        }
    }

    /// A user turn injected by the client: recorded in the transcript as
    /// final, then sent and answered.
    pub fn simulated_user_message(text: &str) -> Vec<Command> {
        let id = Uuid::new_v4().simple().to_string();
        vec![
            Command::Transcript(TranscriptUpdate::Message {
                id: id.clone(),
                role: Role::User,
                text: text.to_string(),
                is_final: true,
            }),
            Command::Send {
                event: ClientEvent::ConversationItemCreate {
                    item: ConversationItem::Message {
                        id,
                        role: Role::User,
                        content: vec![ContentPart::InputText {
                            text: text.to_string(),
                        }],
                    },
                },
                label: None,
            },
            Command::Send {
                event: ClientEvent::ResponseCreate,
                label: Some("(simulated user text message)"),
            },
        ]
    }

    /// Answers a tool call and lets the agent continue.
    pub fn tool_output(call_id: &str, output: Value) -> Vec<Command> {
        vec![
            Command::Send {
                event: ClientEvent::ConversationItemCreate {
                    item: ConversationItem::FunctionCallOutput {
                        call_id: call_id.to_string(),
                        output: output.to_string(),
                    },
                },
                label: Some("tool output"),
            },
            Command::Send {
                event: ClientEvent::ResponseCreate,
                label: None,
            },
        ]
    }

    /// The full `session.update` for an agent taking control.
    pub fn session_configuration(
        agent: &AgentConfig,
        turn: TurnDetectionMode,
        codec: Codec,
        guardrails: &[OutputGuardrail],
    ) -> ClientEvent {
        let mut instructions = agent.instructions.clone();
        for guardrail in guardrails {
            if !instructions.is_empty() {
                instructions.push_str("\n\n");
            }
            instructions.push_str(&guardrail.policy());
        }

        let mut tools = Vec::new();
        if agent.has_tool(AgentTool::BoardContent) {
            tools.push(ToolCallBridge::tool_definition());
        }
        for target in &agent.handoffs {
            tools.push(ToolDefinition::function(
                format!("{}{}", HANDOFF_TOOL_PREFIX, target),
                format!("Transfers the conversation to {}.", target),
                json!({"type": "object", "properties": {}, "additionalProperties": false}),
            ));
        }

        let format = codec.audio_format();
        ClientEvent::SessionUpdate {
            session: SessionConfig {
                turn_detection: turn.to_wire(),
                instructions: Some(instructions),
                voice: Some(agent.voice.clone()),
                tools: Some(tools),
                input_audio_format: Some(format),
                output_audio_format: Some(format),
                input_audio_transcription: Some(InputAudioTranscription {
                    model: TRANSCRIPTION_MODEL.to_string(),
                }),
            },
        }
    }
}
