//! Board Tool Bridge
//!
//! The board is a single-value cursor over a closed set of lesson contents.
//! The agent drives it through the `board_content` tool; the presentation
//! layer only reads it.

use crate::{Command, error::SessionError, protocol::ToolDefinition};
use schemars::{JsonSchema, Schema, SchemaGenerator};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::{fmt, str::FromStr};
use tracing::info;

pub const BOARD_TOOL_NAME: &str = "board_content";

/// Content keys the board can show. `Clean` is the empty board.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BoardContent {
    #[default]
    #[serde(rename = "CLEAN")]
    Clean,
    #[serde(rename = "FINANCIAMIENTO")]
    Financiamiento,
    #[serde(rename = "INNOVACION")]
    Innovacion,
    #[serde(rename = "FUENTES")]
    Fuentes,
    #[serde(rename = "INSTRUMENTOS")]
    Instrumentos,
    #[serde(rename = "EVAL_PREGUNTA_1")]
    EvalPregunta1,
    #[serde(rename = "EVAL_PREGUNTA_2")]
    EvalPregunta2,
    #[serde(rename = "EVAL_PREGUNTA_3")]
    EvalPregunta3,
    #[serde(rename = "HISTORIA_ZAPATERO_1")]
    HistoriaZapatero1,
    #[serde(rename = "HISTORIA_ZAPATERO_2")]
    HistoriaZapatero2,
    #[serde(rename = "HISTORIA_ZAPATERO_3")]
    HistoriaZapatero3,
}

impl BoardContent {
    pub const ALL: [BoardContent; 11] = [
        BoardContent::Clean,
        BoardContent::Financiamiento,
        BoardContent::Innovacion,
        BoardContent::Fuentes,
        BoardContent::Instrumentos,
        BoardContent::EvalPregunta1,
        BoardContent::EvalPregunta2,
        BoardContent::EvalPregunta3,
        BoardContent::HistoriaZapatero1,
        BoardContent::HistoriaZapatero2,
        BoardContent::HistoriaZapatero3,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BoardContent::Clean => "CLEAN",
            BoardContent::Financiamiento => "FINANCIAMIENTO",
            BoardContent::Innovacion => "INNOVACION",
            BoardContent::Fuentes => "FUENTES",
            BoardContent::Instrumentos => "INSTRUMENTOS",
            BoardContent::EvalPregunta1 => "EVAL_PREGUNTA_1",
            BoardContent::EvalPregunta2 => "EVAL_PREGUNTA_2",
            BoardContent::EvalPregunta3 => "EVAL_PREGUNTA_3",
            BoardContent::HistoriaZapatero1 => "HISTORIA_ZAPATERO_1",
            BoardContent::HistoriaZapatero2 => "HISTORIA_ZAPATERO_2",
            BoardContent::HistoriaZapatero3 => "HISTORIA_ZAPATERO_3",
        }
    }
}

impl fmt::Display for BoardContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BoardContent {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BoardContent::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| SessionError::InvalidToolArgument(format!("unknown content_action '{}'", s)))
    }
}

/// Arguments of the `board_content` tool.
///
/// `content_action` stays a plain string so that an unrecognized value reaches
/// the bridge (and is acknowledged) instead of failing deserialization.
#[derive(Deserialize, JsonSchema, Debug)]
#[serde(deny_unknown_fields)]
pub struct BoardContentArgs {
    #[schemars(schema_with = "content_action_schema")]
    pub content_action: String,
}

fn content_action_schema(_: &mut SchemaGenerator) -> Schema {
    let keys: Vec<Value> = BoardContent::ALL.iter().map(|c| json!(c.as_str())).collect();
    let mut schema = Map::new();
    schema.insert("type".to_string(), json!("string"));
    schema.insert("description".to_string(), json!("Acción a desplegar en el board"));
    schema.insert("enum".to_string(), Value::Array(keys));
    Schema::from(schema)
}

/// Maps `board_content` invocations to board state transitions.
#[derive(Debug, Default)]
pub struct ToolCallBridge {
    current: BoardContent,
}

impl ToolCallBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> BoardContent {
        self.current
    }

    /// The tool definition advertised to agents that own the board.
    pub fn tool_definition() -> ToolDefinition {
        let schema = schemars::schema_for!(BoardContentArgs);
        let mut parameters = serde_json::to_value(&schema).unwrap_or_else(|_| json!({"type": "object"}));
        if let Value::Object(map) = &mut parameters {
            map.remove("$schema");
            map.remove("title");
        }
        ToolDefinition::function(
            BOARD_TOOL_NAME,
            "Actualiza la información mostrada en el board visible para el estudiante.",
            parameters,
        )
    }

    /// The acknowledgment returned for every `board_content` call.
    pub fn acknowledgment() -> Value {
        json!({"ok": true})
    }

    /// Applies one invocation. Exactly one mutation per valid call; an invalid
    /// call leaves the board untouched.
    pub fn invoke(&mut self, arguments: &str) -> Result<Vec<Command>, SessionError> {
        let args: BoardContentArgs = serde_json::from_str(arguments)
            .map_err(|e| SessionError::InvalidToolArgument(e.to_string()))?;
        let content: BoardContent = args.content_action.parse()?;
        self.current = content;
        info!(content_action = %content, "Board content updated by agent");
        Ok(vec![
            Command::BoardChanged(content),
            Command::Breadcrumb {
                title: BOARD_TOOL_NAME.to_string(),
                data: json!({ "content_action": content.as_str() }),
            },
        ])
    }

    /// Clears the board for a new agent identity, whatever it showed before.
    pub fn reset(&mut self) -> Vec<Command> {
        self.current = BoardContent::Clean;
        vec![
            Command::BoardChanged(BoardContent::Clean),
            Command::Breadcrumb {
                title: "Board".to_string(),
                data: json!({ "action": BoardContent::Clean.as_str(), "reason": "agent_change" }),
            },
        ]
    }
}
