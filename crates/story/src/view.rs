use blockpad::{BlockContent, Playground};
use serde_json::{Value, json};

/// The playground as JSON, blocks in document order.
pub fn document_json(playground: &Playground) -> Value {
    let focused = playground.focused_block();
    let blocks: Vec<Value> = playground
        .document()
        .iter()
        .map(|(id, block)| {
            let (kind, tree) = match &block.content {
                BlockContent::RichText { tree } => ("richtext", tree.clone()),
                BlockContent::LegacyHtml { .. } => ("legacyHtml", block.content.to_tree()),
            };
            let kinds: Vec<&str> = tree.blocks().map(|el| el.kind.as_str()).collect();
            json!({
                "id": id.to_string(),
                "kind": kind,
                "nodes": kinds,
                "text": tree.plain_text(),
                "focused": focused == Some(id),
            })
        })
        .collect();

    json!({
        "title": playground.document().title,
        "revision": playground.revision(),
        "blocks": blocks,
    })
}
