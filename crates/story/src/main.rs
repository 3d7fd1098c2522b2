//! Blockpad story - replays a scripted editing session against a playground
//! and prints the resulting document.
//!
//! # Usage
//!
//! ```bash
//! blockpad-story --block hello --script session.json
//! blockpad-story --config playground.json --plain
//! ```

mod script;
mod view;

use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{Context, Result};
use blockpad::{
    Block, BlockContent, BlockId, Document, PlateEngine, Playground, PlaygroundConfig,
    VirtualClock,
};
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser};
use tracing::{info, warn};

use crate::script::{Runner, parse_script};

/// Headless block editor playground
#[derive(Parser, Debug)]
#[command(name = "blockpad-story", version, about, long_about = None)]
struct Cli {
    /// Playground configuration (JSON)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Steps to replay (JSON array)
    #[arg(short, long, value_name = "FILE")]
    script: Option<PathBuf>,

    /// Initial block text; repeat for more blocks, mixed with --html in order
    #[arg(long = "block", value_name = "TEXT")]
    blocks: Vec<String>,

    /// Initial block stored as legacy HTML; repeat for more blocks, mixed with --block in order
    #[arg(long = "html", value_name = "HTML")]
    html_blocks: Vec<String>,

    /// Stop at the first step that fails
    #[arg(long)]
    strict: bool,

    /// Print plain text instead of JSON
    #[arg(long)]
    plain: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let matches = Cli::command().get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|err| err.exit());

    let config = match &cli.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            PlaygroundConfig::from_json_str(&raw)
                .with_context(|| format!("parsing {}", path.display()))?
        }
        None => PlaygroundConfig::default(),
    };

    let steps = match &cli.script {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            parse_script(&raw)?
        }
        None => Vec::new(),
    };

    let mut blocks = initial_blocks(&cli, &matches);
    if blocks.is_empty() {
        blocks.push(Block::default());
    }
    let document = Document::with_blocks(
        config.title.clone(),
        blocks.into_iter().map(|block| (BlockId::new(), block)),
    );

    let clock = VirtualClock::new();
    let engine = PlateEngine::new(config.editor.clone());
    let mut playground =
        Playground::with_parts(config, document, Rc::new(clock.clone()), Box::new(engine));
    info!(blocks = playground.document().len(), "playground ready");

    let mut runner = Runner::new(&mut playground, clock);
    for (ix, step) in steps.iter().enumerate() {
        if let Err(err) = runner.run(step) {
            if cli.strict {
                return Err(err.context(format!("step {ix} failed")));
            }
            warn!(step = ix, %err, "step failed");
        }
    }

    if cli.plain {
        println!("{}", playground.document().plain_text());
    } else {
        let json = view::document_json(&playground);
        println!("{}", serde_json::to_string_pretty(&json)?);
    }

    Ok(())
}

/// `--block` and `--html` blocks in the order they were given.
fn initial_blocks(cli: &Cli, matches: &ArgMatches) -> Vec<Block> {
    let text = matches
        .indices_of("blocks")
        .into_iter()
        .flatten()
        .zip(&cli.blocks)
        .map(|(ix, text)| (ix, Block::from_text(text)));
    let html = matches
        .indices_of("html_blocks")
        .into_iter()
        .flatten()
        .zip(&cli.html_blocks)
        .map(|(ix, html)| (ix, Block::new(BlockContent::legacy_html(html.as_str()))));

    let mut blocks: Vec<(usize, Block)> = text.chain(html).collect();
    blocks.sort_by_key(|(ix, _)| *ix);
    blocks.into_iter().map(|(_, block)| block).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_blocks_keep_command_line_order() {
        let matches = Cli::command().get_matches_from([
            "blockpad-story",
            "--html",
            "<p>one</p>",
            "--block",
            "two",
            "--html",
            "<h1>three</h1>",
        ]);
        let cli = Cli::from_arg_matches(&matches).unwrap();

        let blocks = initial_blocks(&cli, &matches);

        let texts: Vec<String> = blocks.iter().map(|b| b.content.plain_text()).collect();
        assert_eq!(texts, ["one", "two", "three"]);
        assert!(blocks[0].content.is_legacy());
        assert!(!blocks[1].content.is_legacy());
    }
}
