//! API Models
//!
//! Response shapes of the REST surface, documented with `utoipa`. They mirror
//! core types so that the core crate stays free of HTTP concerns.

use serde::{Deserialize, Serialize};
use tutoria_core::{
    preferences::{Preferences, RightPaneView},
    scenario::{AgentConfig, AgentTool, Scenario},
};
use utoipa::ToSchema;

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct AgentSummary {
    #[schema(example = "tutorFinanzas")]
    pub name: String,
    #[schema(example = "sage")]
    pub voice: String,
    pub tools: Vec<String>,
    pub handoffs: Vec<String>,
}

impl From<&AgentConfig> for AgentSummary {
    fn from(agent: &AgentConfig) -> Self {
        Self {
            name: agent.name.clone(),
            voice: agent.voice.clone(),
            tools: agent
                .tools
                .iter()
                .map(|t| match t {
                    AgentTool::BoardContent => tutoria_core::board::BOARD_TOOL_NAME.to_string(),
                })
                .collect(),
            handoffs: agent.handoffs.clone(),
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct ScenarioSummary {
    #[schema(example = "universityTutor")]
    pub key: String,
    #[schema(example = "Tutoría Universitaria de Finanzas")]
    pub institution_name: String,
    /// Agents in roster order; the first one is the root.
    pub agents: Vec<AgentSummary>,
}

impl From<&Scenario> for ScenarioSummary {
    fn from(scenario: &Scenario) -> Self {
        Self {
            key: scenario.key.clone(),
            institution_name: scenario.institution_name.clone(),
            agents: scenario.roster.iter().map(AgentSummary::from).collect(),
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct PreferencesResponse {
    pub push_to_talk: bool,
    pub side_panel_expanded: bool,
    pub transcript_visible: bool,
    pub audio_playback_enabled: bool,
    #[schema(example = "gpt-realtime-mini")]
    pub model: String,
    #[schema(example = "board")]
    pub right_pane_view: String,
}

impl From<&Preferences> for PreferencesResponse {
    fn from(prefs: &Preferences) -> Self {
        Self {
            push_to_talk: prefs.push_to_talk,
            side_panel_expanded: prefs.side_panel_expanded,
            transcript_visible: prefs.transcript_visible,
            audio_playback_enabled: prefs.audio_playback_enabled,
            model: prefs.model.clone(),
            right_pane_view: match prefs.right_pane_view {
                RightPaneView::Logs => "logs".to_string(),
                RightPaneView::Board => "board".to_string(),
            },
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tutoria_core::scenario::ScenarioCatalog;

    #[test]
    fn test_scenario_summary_from_catalog() {
        let catalog = ScenarioCatalog::builtin();
        let scenario = catalog.get("universityTutorEvaluation").unwrap();
        let summary = ScenarioSummary::from(scenario);

        assert_eq!(summary.key, "universityTutorEvaluation");
        assert_eq!(summary.agents.len(), 1);
        assert_eq!(summary.agents[0].name, "tutorEvaluador");
        assert_eq!(summary.agents[0].tools, vec!["board_content".to_string()]);
    }

    #[test]
    fn test_scenario_summary_serialization() {
        let catalog = ScenarioCatalog::builtin();
        let summary = ScenarioSummary::from(catalog.get("universityTutor").unwrap());
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["institution_name"], "Tutoría Universitaria de Finanzas");
        assert_eq!(json["agents"][0]["voice"], "sage");
        assert!(json["agents"][0]["tools"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_preferences_response_from_defaults() {
        let response = PreferencesResponse::from(&Preferences::default());
        assert!(!response.push_to_talk);
        assert!(response.audio_playback_enabled);
        assert_eq!(response.model, "gpt-realtime-mini");
        assert_eq!(response.right_pane_view, "board");
    }

    #[test]
    fn test_error_response_serialization() {
        let error = ErrorResponse {
            message: "Scenario 'x' not found".to_string(),
        };
        let json = serde_json::to_string(&error).unwrap();
        assert_eq!(json, r#"{"message":"Scenario 'x' not found"}"#);
    }
}
