use serde::{Deserialize, Serialize};

const DEFAULT_PLACEHOLDER: &str = "type here";
const DEFAULT_HEADING_LEVELS: u64 = 3;
const MAX_HEADING_LEVELS: u64 = 6;
const DEFAULT_MAX_NORMALIZE_ITERATIONS: usize = 100;

/// Which node kinds an editor accepts, plus its presentation defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Shown by the host while the editor is empty.
    pub placeholder: String,
    /// Highest heading level enabled; `0` disables headings.
    pub heading_levels: u64,
    /// Enables bulleted and ordered list items.
    pub lists: bool,
    pub max_normalize_iterations: usize,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
            heading_levels: DEFAULT_HEADING_LEVELS,
            lists: true,
            max_normalize_iterations: DEFAULT_MAX_NORMALIZE_ITERATIONS,
        }
    }
}

impl EditorConfig {
    pub(crate) fn with_defaults(mut self) -> Self {
        if self.max_normalize_iterations == 0 {
            self.max_normalize_iterations = DEFAULT_MAX_NORMALIZE_ITERATIONS;
        }
        self.heading_levels = self.heading_levels.min(MAX_HEADING_LEVELS);
        self
    }

    pub fn headings_enabled(&self) -> bool {
        self.heading_levels > 0
    }

    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config = EditorConfig::from_json_str(r#"{ "lists": false }"#).unwrap();
        assert_eq!(config.placeholder, "type here");
        assert_eq!(config.heading_levels, 3);
        assert!(!config.lists);
    }

    #[test]
    fn with_defaults_repairs_out_of_range_values() {
        let config = EditorConfig {
            heading_levels: 42,
            max_normalize_iterations: 0,
            ..EditorConfig::default()
        }
        .with_defaults();
        assert_eq!(config.heading_levels, 6);
        assert_eq!(config.max_normalize_iterations, 100);
    }
}
