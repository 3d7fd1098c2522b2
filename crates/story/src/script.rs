//! Scripted sessions: a JSON array of steps replayed against a playground.
//!
//! Blocks are addressed by their position at the time the step runs, since
//! ids are only known once the playground exists.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use blockpad::{BlockId, DragEvent, KeyEvent, Playground, VirtualClock};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Step {
    /// Types text at the caret.
    Type { block: usize, text: String },
    /// A keystroke such as `enter`, `shift-enter` or `backspace`.
    Key { block: usize, key: String },
    Click {
        block: usize,
        #[serde(default)]
        offset: Option<usize>,
    },
    Add { block: usize },
    Drag {
        from: usize,
        #[serde(default)]
        over: Option<usize>,
    },
    Command {
        block: usize,
        command: String,
        #[serde(default)]
        args: Option<serde_json::Value>,
    },
    /// Advances the clock and runs due focus moves.
    Wait { ms: u64 },
}

pub fn parse_script(json: &str) -> Result<Vec<Step>> {
    serde_json::from_str(json).context("invalid script")
}

pub struct Runner<'a> {
    playground: &'a mut Playground,
    clock: VirtualClock,
}

impl<'a> Runner<'a> {
    pub fn new(playground: &'a mut Playground, clock: VirtualClock) -> Self {
        Self { playground, clock }
    }

    pub fn run(&mut self, step: &Step) -> Result<()> {
        info!(?step, "step");
        match step {
            Step::Type { block, text } => {
                let id = self.block(*block)?;
                self.playground.input_text(id, text)?;
            }
            Step::Key { block, key } => {
                let id = self.block(*block)?;
                let outcome = self.playground.key_down(id, &KeyEvent::parse(key))?;
                info!(?outcome, "key handled");
            }
            Step::Click { block, offset } => {
                let id = self.block(*block)?;
                self.playground.click(id, *offset)?;
            }
            Step::Add { block } => {
                let id = self.block(*block)?;
                self.playground.add_sibling(id)?;
            }
            Step::Drag { from, over } => {
                let active = self.block(*from)?;
                let over = over.map(|ix| self.block(ix)).transpose()?;
                self.playground.drag(DragEvent::Start { active })?;
                self.playground.drag(DragEvent::End { active, over })?;
            }
            Step::Command {
                block,
                command,
                args,
            } => {
                let id = self.block(*block)?;
                self.playground.run_command(id, command, args.clone())?;
            }
            Step::Wait { ms } => {
                self.clock.advance(Duration::from_millis(*ms));
                for outcome in self.playground.tick() {
                    info!(?outcome, "focus");
                }
            }
        }
        Ok(())
    }

    fn block(&self, index: usize) -> Result<BlockId> {
        self.playground
            .document()
            .id_at(index)
            .ok_or_else(|| anyhow!("no block at index {index}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_parse_from_tagged_json() {
        let steps = parse_script(
            r#"[
                { "type": "click", "block": 0, "offset": 2 },
                { "type": "key", "block": 0, "key": "enter" },
                { "type": "drag", "from": 1 },
                { "type": "wait", "ms": 10 }
            ]"#,
        )
        .unwrap();

        assert_eq!(
            steps,
            vec![
                Step::Click {
                    block: 0,
                    offset: Some(2)
                },
                Step::Key {
                    block: 0,
                    key: "enter".to_string()
                },
                Step::Drag { from: 1, over: None },
                Step::Wait { ms: 10 },
            ]
        );
    }

    #[test]
    fn unknown_step_type_is_rejected() {
        assert!(parse_script(r#"[{ "type": "jump" }]"#).is_err());
    }
}
