use blockpad_plate::RichTextTree;
use serde::{Deserialize, Serialize};

/// What a block holds. Legacy HTML is read once at mount and the block is
/// stored as rich text from its first edit on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum BlockContent {
    #[serde(rename = "richtext")]
    RichText { tree: RichTextTree },
    #[serde(rename = "legacyHtml")]
    LegacyHtml { html: String },
}

impl BlockContent {
    pub fn rich_text(tree: RichTextTree) -> Self {
        Self::RichText { tree }
    }

    pub fn legacy_html(html: impl Into<String>) -> Self {
        Self::LegacyHtml { html: html.into() }
    }

    /// The tree an editor should be seeded with.
    pub fn to_tree(&self) -> RichTextTree {
        match self {
            Self::RichText { tree } => tree.clone(),
            Self::LegacyHtml { html } => RichTextTree::from_legacy_html(html),
        }
    }

    pub fn plain_text(&self) -> String {
        self.to_tree().plain_text()
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, Self::LegacyHtml { .. })
    }
}

impl Default for BlockContent {
    fn default() -> Self {
        Self::rich_text(RichTextTree::empty())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Block {
    pub content: BlockContent,
}

impl Block {
    pub fn new(content: BlockContent) -> Self {
        Self { content }
    }

    pub fn from_tree(tree: RichTextTree) -> Self {
        Self::new(BlockContent::rich_text(tree))
    }

    pub fn from_text(text: impl Into<String>) -> Self {
        Self::from_tree(RichTextTree::from_text(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_is_tagged_by_kind() {
        let json = serde_json::to_value(BlockContent::legacy_html("<p>x</p>")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "kind": "legacyHtml", "html": "<p>x</p>" })
        );

        let back: BlockContent = serde_json::from_value(serde_json::json!({
            "kind": "richtext",
            "tree": { "children": [] }
        }))
        .unwrap();
        assert!(!back.is_legacy());
    }

    #[test]
    fn legacy_html_is_read_as_rich_text() {
        let content = BlockContent::legacy_html("<p>a</p><p>b</p>");
        assert_eq!(content.plain_text(), "a\nb");
    }
}
