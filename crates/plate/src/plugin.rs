use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::EditorConfig;
use crate::core::{AttrPatch, Attrs, Editor, ElementNode, Node, Point, RichTextTree, Selection};
use crate::ops::{Op, Transaction};

pub const LIST_TYPES: [&str; 2] = ["bulleted", "ordered"];

#[derive(Debug, Clone)]
pub struct CommandError {
    message: String,
}

impl CommandError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for CommandError {}

#[derive(Debug, Clone)]
pub struct QueryError {
    message: String,
}

impl QueryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for QueryError {}

type CommandHandler = Arc<dyn Fn(&mut Editor, Option<Value>) -> Result<(), CommandError> + Send + Sync>;
type QueryHandler = Arc<dyn Fn(&Editor, Option<Value>) -> Result<Value, QueryError> + Send + Sync>;

#[derive(Clone)]
pub struct CommandSpec {
    pub id: String,
    pub label: String,
    pub description: Option<String>,
    pub handler: CommandHandler,
}

impl CommandSpec {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        handler: impl Fn(&mut Editor, Option<Value>) -> Result<(), CommandError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            description: None,
            handler: Arc::new(handler),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Clone)]
pub struct QuerySpec {
    pub id: String,
    pub handler: QueryHandler,
}

impl QuerySpec {
    pub fn new(
        id: impl Into<String>,
        handler: impl Fn(&Editor, Option<Value>) -> Result<Value, QueryError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            handler: Arc::new(handler),
        }
    }
}

/// A block-level node kind an editor accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub kind: String,
    pub label: String,
}

impl NodeSpec {
    fn new(kind: &str, label: &str) -> Self {
        Self {
            kind: kind.to_string(),
            label: label.to_string(),
        }
    }
}

pub trait NormalizePass: Send + Sync {
    fn id(&self) -> &'static str;
    fn run(&self, tree: &RichTextTree, registry: &PluginRegistry) -> Vec<Op>;
}

pub trait PlatePlugin: Send + Sync {
    fn id(&self) -> &'static str;
    fn node_specs(&self) -> Vec<NodeSpec> {
        Vec::new()
    }
    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        Vec::new()
    }
    fn commands(&self) -> Vec<CommandSpec> {
        Vec::new()
    }
    fn queries(&self) -> Vec<QuerySpec> {
        Vec::new()
    }
}

#[derive(Default)]
pub struct PluginRegistry {
    node_specs: HashMap<String, NodeSpec>,
    normalize_passes: Vec<Box<dyn NormalizePass>>,
    commands: HashMap<String, CommandSpec>,
    queries: HashMap<String, QuerySpec>,
}

impl PluginRegistry {
    pub fn new(plugins: impl IntoIterator<Item = Box<dyn PlatePlugin>>) -> Result<Self, String> {
        let mut registry = Self::default();
        for plugin in plugins {
            registry.register_plugin(plugin)?;
        }
        Ok(registry)
    }

    /// The plugin set enabled by `config`.
    pub fn from_config(config: &EditorConfig) -> Self {
        let mut plugins: Vec<Box<dyn PlatePlugin>> = vec![
            Box::new(CoreParagraphPlugin),
            Box::new(CoreNormalizePlugin),
            Box::new(CoreEditingPlugin),
        ];
        if config.headings_enabled() {
            plugins.push(Box::new(HeadingPlugin {
                max_level: config.heading_levels,
            }));
        }
        if config.lists {
            plugins.push(Box::new(ListPlugin));
        }
        Self::new(plugins).expect("built-in plugin set must be valid")
    }

    pub fn register_plugin(&mut self, plugin: Box<dyn PlatePlugin>) -> Result<(), String> {
        for spec in plugin.node_specs() {
            if self.node_specs.contains_key(&spec.kind) {
                return Err(format!("Duplicate node spec kind: {}", spec.kind));
            }
            self.node_specs.insert(spec.kind.clone(), spec);
        }

        self.normalize_passes.extend(plugin.normalize_passes());

        for cmd in plugin.commands() {
            if self.commands.contains_key(&cmd.id) {
                return Err(format!("Duplicate command id: {}", cmd.id));
            }
            self.commands.insert(cmd.id.clone(), cmd);
        }

        for query in plugin.queries() {
            if self.queries.contains_key(&query.id) {
                return Err(format!("Duplicate query id: {}", query.id));
            }
            self.queries.insert(query.id.clone(), query);
        }

        Ok(())
    }

    pub fn node_specs(&self) -> &HashMap<String, NodeSpec> {
        &self.node_specs
    }

    pub fn normalize_passes(&self) -> &[Box<dyn NormalizePass>] {
        &self.normalize_passes
    }

    pub fn commands(&self) -> &HashMap<String, CommandSpec> {
        &self.commands
    }

    pub fn command(&self, id: &str) -> Option<CommandSpec> {
        self.commands.get(id).cloned()
    }

    pub fn queries(&self) -> &HashMap<String, QuerySpec> {
        &self.queries
    }

    pub fn query(&self, id: &str) -> Option<QuerySpec> {
        self.queries.get(id).cloned()
    }

    pub fn normalize(&self, tree: &RichTextTree) -> Vec<Op> {
        // Passes see the tree as it was before this round; stop at the first
        // pass with work so later passes never act on stale paths.
        for pass in &self.normalize_passes {
            let ops = pass.run(tree, self);
            if !ops.is_empty() {
                return ops;
            }
        }
        Vec::new()
    }

    pub fn normalize_selection(&self, tree: &RichTextTree, selection: &Selection) -> Selection {
        let fallback = first_text_point(tree).unwrap_or(Point {
            path: vec![0],
            offset: 0,
        });

        let anchor = normalize_point_to_existing_text(tree, &selection.anchor).unwrap_or_else(|| {
            normalize_point_to_existing_text(tree, &selection.focus)
                .unwrap_or_else(|| fallback.clone())
        });
        let focus = normalize_point_to_existing_text(tree, &selection.focus)
            .unwrap_or_else(|| anchor.clone());

        Selection { anchor, focus }
    }

    pub fn is_known_kind(&self, kind: &str) -> bool {
        self.node_specs.contains_key(kind)
    }
}

fn first_text_point(tree: &RichTextTree) -> Option<Point> {
    tree.children.iter().enumerate().find_map(|(ix, node)| {
        let Node::Element(el) = node else {
            return None;
        };
        el.children
            .iter()
            .position(|n| matches!(n, Node::Text(_)))
            .map(|child_ix| Point::new(vec![ix, child_ix], 0))
    })
}

fn normalize_point_to_existing_text(tree: &RichTextTree, point: &Point) -> Option<Point> {
    if point.path.is_empty() || tree.children.is_empty() {
        return None;
    }

    let block_ix = point.path[0].min(tree.children.len() - 1);
    let Node::Element(el) = &tree.children[block_ix] else {
        return None;
    };
    if el.children.is_empty() {
        return None;
    }

    let wanted = point.path.get(1).copied().unwrap_or(0);
    let child_ix = wanted.min(el.children.len() - 1);
    let offset = if wanted == child_ix { point.offset } else { usize::MAX };
    match &el.children[child_ix] {
        Node::Text(t) => Some(Point::new(
            vec![block_ix, child_ix],
            crate::text::clamp_to_char_boundary(&t.text, offset),
        )),
        Node::Element(_) => el
            .children
            .iter()
            .position(|n| matches!(n, Node::Text(_)))
            .map(|ix| Point::new(vec![block_ix, ix], 0)),
    }
}

pub(crate) fn active_block(editor: &Editor) -> Option<(usize, &ElementNode)> {
    let block_ix = *editor.selection().focus.path.first()?;
    match editor.tree().children.get(block_ix)? {
        Node::Element(el) => Some((block_ix, el)),
        Node::Text(_) => None,
    }
}

struct CoreParagraphPlugin;

impl PlatePlugin for CoreParagraphPlugin {
    fn id(&self) -> &'static str {
        "core.paragraph"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::new("paragraph", "Paragraph")]
    }
}

struct CoreNormalizePlugin;

impl PlatePlugin for CoreNormalizePlugin {
    fn id(&self) -> &'static str {
        "core.normalize"
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![
            Box::new(EnsureNonEmptyTree),
            Box::new(WrapStrayText),
            Box::new(DowngradeUnknownKinds),
            Box::new(EnsureBlockHasTextLeaf),
            Box::new(MergeAdjacentTextLeaves),
        ]
    }
}

struct EnsureNonEmptyTree;

impl NormalizePass for EnsureNonEmptyTree {
    fn id(&self) -> &'static str {
        "core.ensure_non_empty_tree"
    }

    fn run(&self, tree: &RichTextTree, _registry: &PluginRegistry) -> Vec<Op> {
        if tree.children.is_empty() {
            return vec![Op::InsertNode {
                path: vec![0],
                node: Node::paragraph(""),
            }];
        }
        Vec::new()
    }
}

struct WrapStrayText;

impl NormalizePass for WrapStrayText {
    fn id(&self) -> &'static str {
        "core.wrap_stray_text"
    }

    fn run(&self, tree: &RichTextTree, _registry: &PluginRegistry) -> Vec<Op> {
        let mut ops = Vec::new();
        for (ix, node) in tree.children.iter().enumerate() {
            if let Node::Text(_) = node {
                ops.push(Op::RemoveNode { path: vec![ix] });
                ops.push(Op::InsertNode {
                    path: vec![ix],
                    node: Node::Element(ElementNode {
                        kind: "paragraph".to_string(),
                        attrs: Attrs::default(),
                        children: vec![node.clone()],
                    }),
                });
            }
        }
        ops
    }
}

/// Blocks whose kind is not enabled become paragraphs with the same text.
struct DowngradeUnknownKinds;

impl NormalizePass for DowngradeUnknownKinds {
    fn id(&self) -> &'static str {
        "core.downgrade_unknown_kinds"
    }

    fn run(&self, tree: &RichTextTree, registry: &PluginRegistry) -> Vec<Op> {
        let mut ops = Vec::new();
        for (ix, node) in tree.children.iter().enumerate() {
            let Node::Element(el) = node else {
                continue;
            };
            if registry.is_known_kind(&el.kind) {
                continue;
            }
            let children = el
                .children
                .iter()
                .filter(|n| matches!(n, Node::Text(_)))
                .cloned()
                .collect();
            ops.push(Op::RemoveNode { path: vec![ix] });
            ops.push(Op::InsertNode {
                path: vec![ix],
                node: Node::Element(ElementNode {
                    kind: "paragraph".to_string(),
                    attrs: Attrs::default(),
                    children,
                }),
            });
        }
        ops
    }
}

struct EnsureBlockHasTextLeaf;

impl NormalizePass for EnsureBlockHasTextLeaf {
    fn id(&self) -> &'static str {
        "core.ensure_block_has_text_leaf"
    }

    fn run(&self, tree: &RichTextTree, _registry: &PluginRegistry) -> Vec<Op> {
        let mut ops = Vec::new();
        for (ix, node) in tree.children.iter().enumerate() {
            let Node::Element(el) = node else {
                continue;
            };
            if !el.children.iter().any(|n| matches!(n, Node::Text(_))) {
                ops.push(Op::InsertNode {
                    path: vec![ix, 0],
                    node: Node::text(""),
                });
            }
        }
        ops
    }
}

struct MergeAdjacentTextLeaves;

impl NormalizePass for MergeAdjacentTextLeaves {
    fn id(&self) -> &'static str {
        "core.merge_adjacent_text_leaves"
    }

    fn run(&self, tree: &RichTextTree, _registry: &PluginRegistry) -> Vec<Op> {
        let mut ops = Vec::new();

        for (block_ix, node) in tree.children.iter().enumerate() {
            let Node::Element(el) = node else {
                continue;
            };
            if el.children.len() < 2 {
                continue;
            }

            let mut ix = el.children.len();
            while ix > 0 {
                ix -= 1;
                let Node::Text(right) = &el.children[ix] else {
                    continue;
                };

                let mut start = ix;
                while start > 0 {
                    let Some(Node::Text(left)) = el.children.get(start - 1) else {
                        break;
                    };
                    if left.marks != right.marks {
                        break;
                    }
                    start -= 1;
                }

                if start == ix {
                    continue;
                }

                let Some(Node::Text(first)) = el.children.get(start) else {
                    continue;
                };
                let appended: String = el.children[start + 1..=ix]
                    .iter()
                    .filter_map(|n| match n {
                        Node::Text(t) => Some(t.text.as_str()),
                        Node::Element(_) => None,
                    })
                    .collect();

                if !appended.is_empty() {
                    ops.push(Op::InsertText {
                        path: vec![block_ix, start],
                        offset: first.text.len(),
                        text: appended,
                    });
                }
                for remove_ix in (start + 1..=ix).rev() {
                    ops.push(Op::RemoveNode {
                        path: vec![block_ix, remove_ix],
                    });
                }

                ix = start;
            }
        }

        ops
    }
}

struct CoreEditingPlugin;

impl PlatePlugin for CoreEditingPlugin {
    fn id(&self) -> &'static str {
        "core.editing"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("core.insert_text", "Insert text", |editor, args| {
                let text = args
                    .as_ref()
                    .and_then(|v| v.get("text"))
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| CommandError::new("Missing args.text"))?
                    .to_string();
                editor
                    .insert_text(&text)
                    .map_err(|e| CommandError::new(format!("Failed to insert text: {e}")))
            })
            .description("Insert text at the caret, replacing the selection."),
            CommandSpec::new("core.insert_break", "Insert break", |editor, _args| {
                editor
                    .insert_break()
                    .map_err(|e| CommandError::new(format!("Failed to insert break: {e}")))
            })
            .description("Split the active block at the caret."),
            CommandSpec::new("core.insert_soft_break", "Insert soft break", |editor, _args| {
                editor
                    .insert_soft_break()
                    .map_err(|e| CommandError::new(format!("Failed to insert soft break: {e}")))
            })
            .description("Insert a line break inside the active block."),
            CommandSpec::new("core.delete_backward", "Delete backward", |editor, _args| {
                editor
                    .delete_backward()
                    .map_err(|e| CommandError::new(format!("Failed to delete: {e}")))
            }),
            CommandSpec::new("core.delete_forward", "Delete forward", |editor, _args| {
                editor
                    .delete_forward()
                    .map_err(|e| CommandError::new(format!("Failed to delete: {e}")))
            }),
        ]
    }

    fn queries(&self) -> Vec<QuerySpec> {
        vec![
            QuerySpec::new("core.plain_text", |editor, _args| {
                Ok(Value::String(editor.plain_text()))
            }),
            QuerySpec::new("core.caret_offset", |editor, _args| {
                Ok(Value::from(editor.caret_offset()))
            }),
            QuerySpec::new("block.kind", |editor, _args| {
                Ok(active_block(editor)
                    .map(|(_, el)| Value::String(el.kind.clone()))
                    .unwrap_or(Value::Null))
            }),
        ]
    }
}

struct HeadingPlugin {
    max_level: u64,
}

impl PlatePlugin for HeadingPlugin {
    fn id(&self) -> &'static str {
        "heading"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::new("heading", "Heading")]
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![Box::new(NormalizeHeadingLevels {
            max_level: self.max_level,
        })]
    }

    fn commands(&self) -> Vec<CommandSpec> {
        let max_level = self.max_level;
        vec![
            CommandSpec::new("block.set_heading", "Set heading", move |editor, args| {
                let level = args
                    .as_ref()
                    .and_then(|v| v.get("level"))
                    .and_then(|v| v.as_u64())
                    .unwrap_or(1)
                    .clamp(1, max_level);
                let tx = set_heading(editor, level).map_err(CommandError::new)?;
                if tx.ops.is_empty() {
                    return Ok(());
                }
                editor
                    .apply(tx)
                    .map_err(|e| CommandError::new(format!("Failed to set heading: {e}")))
            })
            .description("Convert the active block into a heading."),
            CommandSpec::new("block.unset_heading", "Unset heading", |editor, _args| {
                let tx = unset_heading(editor).map_err(CommandError::new)?;
                if tx.ops.is_empty() {
                    return Ok(());
                }
                editor
                    .apply(tx)
                    .map_err(|e| CommandError::new(format!("Failed to unset heading: {e}")))
            })
            .description("Convert a heading back to a paragraph."),
        ]
    }

    fn queries(&self) -> Vec<QuerySpec> {
        vec![QuerySpec::new("block.heading_level", |editor, _args| {
            Ok(active_heading_level(editor))
        })]
    }
}

struct NormalizeHeadingLevels {
    max_level: u64,
}

impl NormalizePass for NormalizeHeadingLevels {
    fn id(&self) -> &'static str {
        "heading.normalize_levels"
    }

    fn run(&self, tree: &RichTextTree, _registry: &PluginRegistry) -> Vec<Op> {
        let mut ops = Vec::new();
        for (ix, node) in tree.children.iter().enumerate() {
            let Node::Element(el) = node else {
                continue;
            };
            if el.kind != "heading" {
                continue;
            }
            let current = el.attrs.get("level").and_then(|v| v.as_u64());
            let level = current.unwrap_or(1).clamp(1, self.max_level);
            if current != Some(level) {
                ops.push(Op::SetNodeAttrs {
                    path: vec![ix],
                    patch: AttrPatch::set("level", Value::from(level)),
                });
            }
        }
        ops
    }
}

fn active_heading_level(editor: &Editor) -> Value {
    match active_block(editor) {
        Some((_, el)) if el.kind == "heading" => el
            .attrs
            .get("level")
            .and_then(|v| v.as_u64())
            .map(Value::from)
            .unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn set_heading(editor: &Editor, level: u64) -> Result<Transaction, String> {
    let Some((block_ix, el)) = active_block(editor) else {
        return Err("No active block".into());
    };
    let current_level = (el.kind == "heading")
        .then(|| el.attrs.get("level").and_then(|v| v.as_u64()))
        .flatten();
    if current_level == Some(level) {
        return Ok(Transaction::new(Vec::new()).source("command:block.set_heading"));
    }

    let mut attrs = el.attrs.clone();
    attrs.remove("list_type");
    attrs.insert("level".to_string(), Value::from(level));
    let next = Node::Element(ElementNode {
        kind: "heading".to_string(),
        attrs,
        children: el.children.clone(),
    });

    Ok(replace_block_tx(editor, block_ix, next).source("command:block.set_heading"))
}

fn unset_heading(editor: &Editor) -> Result<Transaction, String> {
    let Some((block_ix, el)) = active_block(editor) else {
        return Err("No active block".into());
    };
    if el.kind != "heading" {
        return Ok(Transaction::new(Vec::new()).source("command:block.unset_heading"));
    }

    let mut attrs = el.attrs.clone();
    attrs.remove("level");
    let next = Node::Element(ElementNode {
        kind: "paragraph".to_string(),
        attrs,
        children: el.children.clone(),
    });

    Ok(replace_block_tx(editor, block_ix, next).source("command:block.unset_heading"))
}

struct ListPlugin;

impl PlatePlugin for ListPlugin {
    fn id(&self) -> &'static str {
        "list"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::new("list_item", "List item")]
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![Box::new(NormalizeListType)]
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("list.toggle_bulleted", "Toggle bulleted list", |editor, _args| {
                toggle_list(editor, "bulleted")
            })
            .description("Toggle a bulleted list item for the active block."),
            CommandSpec::new("list.toggle_ordered", "Toggle ordered list", |editor, _args| {
                toggle_list(editor, "ordered")
            })
            .description("Toggle an ordered list item for the active block."),
        ]
    }

    fn queries(&self) -> Vec<QuerySpec> {
        vec![QuerySpec::new("list.active_type", |editor, _args| {
            Ok(active_list_type(editor)
                .map(Value::String)
                .unwrap_or(Value::Null))
        })]
    }
}

struct NormalizeListType;

impl NormalizePass for NormalizeListType {
    fn id(&self) -> &'static str {
        "list.normalize_type"
    }

    fn run(&self, tree: &RichTextTree, _registry: &PluginRegistry) -> Vec<Op> {
        let mut ops = Vec::new();
        for (ix, node) in tree.children.iter().enumerate() {
            let Node::Element(el) = node else {
                continue;
            };
            if el.kind != "list_item" {
                continue;
            }
            let valid = el
                .attrs
                .get("list_type")
                .and_then(|v| v.as_str())
                .is_some_and(|t| LIST_TYPES.contains(&t));
            if !valid {
                ops.push(Op::SetNodeAttrs {
                    path: vec![ix],
                    patch: AttrPatch::set("list_type", Value::from(LIST_TYPES[0])),
                });
            }
        }
        ops
    }
}

fn active_list_type(editor: &Editor) -> Option<String> {
    let (_, el) = active_block(editor)?;
    if el.kind != "list_item" {
        return None;
    }
    el.attrs
        .get("list_type")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

fn toggle_list(editor: &mut Editor, list_type: &str) -> Result<(), CommandError> {
    let Some((block_ix, el)) = active_block(editor) else {
        return Err(CommandError::new("No active block"));
    };

    let mut attrs = el.attrs.clone();
    attrs.remove("level");
    let kind = if active_list_type(editor).as_deref() == Some(list_type) {
        attrs.remove("list_type");
        "paragraph"
    } else {
        attrs.insert("list_type".to_string(), Value::from(list_type));
        "list_item"
    };
    let next = Node::Element(ElementNode {
        kind: kind.to_string(),
        attrs,
        children: el.children.clone(),
    });

    let tx = replace_block_tx(editor, block_ix, next).source("command:list.toggle");
    editor
        .apply(tx)
        .map_err(|e| CommandError::new(format!("Failed to toggle list: {e}")))
}

/// Swaps the block at `block_ix` for `next`, keeping the selection in place.
fn replace_block_tx(editor: &Editor, block_ix: usize, next: Node) -> Transaction {
    Transaction::new(vec![
        Op::RemoveNode {
            path: vec![block_ix],
        },
        Op::InsertNode {
            path: vec![block_ix],
            node: next,
        },
    ])
    .selection_after(editor.selection().clone())
}
