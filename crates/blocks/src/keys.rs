use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Modifiers {
    pub shift: bool,
    pub control: bool,
    pub alt: bool,
    /// Cmd on macOS, the Windows key elsewhere.
    pub platform: bool,
}

impl Modifiers {
    pub fn any(&self) -> bool {
        self.shift || self.control || self.alt || self.platform
    }
}

/// A key press as delivered to a block, named like keybindings are
/// (`enter`, `shift-enter`, `backspace`, `cmd-b`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    pub key: String,
    #[serde(default)]
    pub modifiers: Modifiers,
}

impl KeyEvent {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            modifiers: Modifiers::default(),
        }
    }

    /// Parses `mod-mod-key`. Unknown modifier names are kept as part of the key.
    pub fn parse(keystroke: &str) -> Self {
        let mut modifiers = Modifiers::default();
        let mut parts: Vec<&str> = keystroke.split('-').collect();
        let key = parts.pop().unwrap_or_default();
        let mut rest = Vec::new();
        for part in parts {
            match part {
                "shift" => modifiers.shift = true,
                "ctrl" => modifiers.control = true,
                "alt" => modifiers.alt = true,
                "cmd" | "super" | "win" | "platform" => modifiers.platform = true,
                other => rest.push(other),
            }
        }
        rest.push(key);
        Self {
            key: rest.join("-").to_ascii_lowercase(),
            modifiers,
        }
    }

    pub fn is(&self, key: &str) -> bool {
        self.key.eq_ignore_ascii_case(key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    /// The block handled the key; the editor must not.
    PreventDefault,
    /// Let the editor run its own handling.
    Propagate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_keybinding_style_keystrokes() {
        let plain = KeyEvent::parse("enter");
        assert!(plain.is("enter"));
        assert!(!plain.modifiers.any());

        let shifted = KeyEvent::parse("shift-enter");
        assert!(shifted.is("enter"));
        assert!(shifted.modifiers.shift);

        let cmd = KeyEvent::parse("cmd-shift-z");
        assert!(cmd.modifiers.platform && cmd.modifiers.shift);
        assert_eq!(cmd.key, "z");
    }
}
