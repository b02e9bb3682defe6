//! User preferences: read once at startup, updated through one setter
//! surface, persisted by the host.

use serde::{Deserialize, Serialize};

pub const DEFAULT_MODEL: &str = "gpt-realtime-mini";
pub const SUPPORTED_MODELS: [&str; 2] = ["gpt-realtime-mini", "gpt-realtime"];

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RightPaneView {
    Logs,
    #[default]
    Board,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Preferences {
    pub push_to_talk: bool,
    pub side_panel_expanded: bool,
    pub transcript_visible: bool,
    pub audio_playback_enabled: bool,
    pub model: String,
    pub right_pane_view: RightPaneView,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            push_to_talk: false,
            side_panel_expanded: true,
            transcript_visible: false,
            audio_playback_enabled: true,
            model: DEFAULT_MODEL.to_string(),
            right_pane_view: RightPaneView::Board,
        }
    }
}

/// One preference change.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "key", content = "value", rename_all = "snake_case")]
pub enum PreferenceUpdate {
    PushToTalk(bool),
    SidePanelExpanded(bool),
    TranscriptVisible(bool),
    AudioPlaybackEnabled(bool),
    Model(String),
    RightPaneView(RightPaneView),
}

pub fn is_supported_model(model: &str) -> bool {
    SUPPORTED_MODELS.contains(&model)
}
