use std::time::Duration;

use blockpad_plate::EditorConfig;
use serde::{Deserialize, Serialize};

const DEFAULT_TITLE: &str = "Untitled";
const DEFAULT_FOCUS_DELAY_MS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaygroundConfig {
    pub title: String,
    /// How long after an edit a requested focus move is applied.
    pub focus_delay_ms: u64,
    /// Shared by every block's editor.
    pub editor: EditorConfig,
}

impl Default for PlaygroundConfig {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            focus_delay_ms: DEFAULT_FOCUS_DELAY_MS,
            editor: EditorConfig::default(),
        }
    }
}

impl PlaygroundConfig {
    pub fn focus_delay(&self) -> Duration {
        Duration::from_millis(self.focus_delay_ms)
    }

    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
