use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::EditorConfig;
use crate::ops::{Op, Path, Transaction};
use crate::plugin::{CommandError, PluginRegistry, QueryError};
use crate::text::clamp_to_char_boundary;

pub type Attrs = BTreeMap<String, serde_json::Value>;
pub type ElementKind = String;

/// Rich-text content of a single block.
///
/// The tree root is always of kind [`RichTextTree::KIND`]; its children are
/// block-level elements (paragraphs, headings, list items), each holding
/// inline text runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RichTextTree {
    #[serde(default)]
    pub children: Vec<Node>,
}

impl RichTextTree {
    pub const KIND: &'static str = "document";

    pub fn new(children: Vec<Node>) -> Self {
        Self { children }
    }

    /// A tree holding a single empty paragraph.
    pub fn empty() -> Self {
        Self::new(vec![Node::paragraph("")])
    }

    /// A tree holding a single paragraph with `text`.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self::new(vec![Node::paragraph(text)])
    }

    pub fn kind(&self) -> &'static str {
        Self::KIND
    }

    /// Text of every block, joined with `\n`.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        for (ix, el) in self.blocks().enumerate() {
            if ix > 0 {
                out.push('\n');
            }
            out.push_str(&el.inline_text());
        }
        out
    }

    /// Length in bytes of [`Self::plain_text`].
    pub fn text_len(&self) -> usize {
        let mut len = 0usize;
        for (ix, el) in self.blocks().enumerate() {
            if ix > 0 {
                len += 1;
            }
            len += el.inline_text_len();
        }
        len
    }

    pub fn is_blank(&self) -> bool {
        self.blocks().all(|el| el.inline_text_len() == 0)
    }

    pub fn blocks(&self) -> impl Iterator<Item = &ElementNode> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    Element(ElementNode),
    Text(TextNode),
}

impl Node {
    pub fn paragraph(text: impl Into<String>) -> Self {
        Self::block("paragraph", Attrs::default(), text)
    }

    pub fn heading(level: u64, text: impl Into<String>) -> Self {
        let mut attrs = Attrs::default();
        attrs.insert("level".to_string(), Value::from(level));
        Self::block("heading", attrs, text)
    }

    pub fn list_item(list_type: &str, text: impl Into<String>) -> Self {
        let mut attrs = Attrs::default();
        attrs.insert("list_type".to_string(), Value::from(list_type));
        Self::block("list_item", attrs, text)
    }

    pub fn text(text: impl Into<String>) -> Self {
        Node::Text(TextNode {
            text: text.into(),
            marks: Marks::default(),
        })
    }

    fn block(kind: &str, attrs: Attrs, text: impl Into<String>) -> Self {
        Node::Element(ElementNode {
            kind: kind.to_string(),
            attrs,
            children: vec![Node::text(text)],
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementNode {
    pub kind: ElementKind,
    #[serde(default)]
    pub attrs: Attrs,
    #[serde(default)]
    pub children: Vec<Node>,
}

impl ElementNode {
    pub fn inline_text(&self) -> String {
        self.children
            .iter()
            .filter_map(|n| match n {
                Node::Text(t) => Some(t.text.as_str()),
                Node::Element(_) => None,
            })
            .collect()
    }

    pub fn inline_text_len(&self) -> usize {
        crate::text::inline_len(&self.children)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextNode {
    pub text: String,
    #[serde(default)]
    pub marks: Marks,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Marks {
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub underline: bool,
    #[serde(default)]
    pub strikethrough: bool,
    #[serde(default)]
    pub code: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    #[serde(default)]
    pub path: Path,
    pub offset: usize,
}

impl Point {
    pub fn new(path: Path, offset: usize) -> Self {
        Self { path, offset }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub anchor: Point,
    pub focus: Point,
}

impl Selection {
    pub fn collapsed(point: Point) -> Self {
        Self {
            anchor: point.clone(),
            focus: point,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }
}

/// A single editing session over one [`RichTextTree`].
///
/// Every mutation goes through [`Editor::apply`], which runs the registry's
/// normalize passes to a fixed point before committing.
pub struct Editor {
    tree: RichTextTree,
    selection: Selection,
    registry: PluginRegistry,
    config: EditorConfig,
}

impl Editor {
    pub fn new(tree: RichTextTree, selection: Selection, config: EditorConfig) -> Self {
        let config = config.with_defaults();
        let registry = PluginRegistry::from_config(&config);
        Self::with_registry(tree, selection, registry, config)
    }

    pub fn with_registry(
        tree: RichTextTree,
        selection: Selection,
        registry: PluginRegistry,
        config: EditorConfig,
    ) -> Self {
        let mut editor = Self {
            tree,
            selection,
            registry,
            config: config.with_defaults(),
        };
        editor.normalize_in_place();
        editor
    }

    /// An editor over a single empty paragraph.
    pub fn from_config(config: EditorConfig) -> Self {
        Self::with_tree(RichTextTree::empty(), config)
    }

    /// An editor over `tree` with the caret at the start of content.
    pub fn with_tree(tree: RichTextTree, config: EditorConfig) -> Self {
        let selection = Selection::collapsed(Point::new(vec![0, 0], 0));
        Self::new(tree, selection, config)
    }

    pub fn tree(&self) -> &RichTextTree {
        &self.tree
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn set_selection(&mut self, selection: Selection) {
        self.selection = selection;
        self.normalize_selection_in_place();
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Replaces the whole tree without going through a transaction. The caret
    /// is clamped to the nearest existing text position.
    pub fn load(&mut self, tree: RichTextTree) {
        self.tree = tree;
        self.normalize_in_place();
    }

    /// Applies `tx` atomically: either every op and the normalization succeed,
    /// or the editor is left untouched.
    pub fn apply(&mut self, tx: Transaction) -> Result<(), ApplyError> {
        if tx.is_noop() {
            return Ok(());
        }
        tracing::trace!(source = tx.source, ops = tx.ops.len(), "applying transaction");

        let mut tree = self.tree.clone();
        let mut selection = self.selection.clone();

        for op in tx.ops {
            let path = op.path().to_vec();
            apply_op_to(&mut tree, &mut selection, op).map_err(|err| match err {
                ApplyError::InvalidPath(msg) => {
                    ApplyError::InvalidPath(format!("{msg} (at {path:?} in {})", tx.source))
                }
                other => other,
            })?;
        }
        if let Some(sel) = tx.selection_after {
            selection = sel;
        }

        normalize_to_fixed_point(
            &mut tree,
            &mut selection,
            &self.registry,
            self.config.max_normalize_iterations,
        )?;

        self.tree = tree;
        self.selection = selection;
        self.normalize_selection_in_place();
        Ok(())
    }

    pub fn run_command(
        &mut self,
        id: &str,
        args: Option<serde_json::Value>,
    ) -> Result<(), CommandError> {
        let Some(command) = self.registry.command(id) else {
            return Err(CommandError::new(format!("Unknown command: {id}")));
        };
        (command.handler)(self, args)
    }

    pub fn run_query_json(&self, id: &str, args: Option<Value>) -> Result<Value, QueryError> {
        let Some(query) = self.registry.query(id) else {
            return Err(QueryError::new(format!("Unknown query: {id}")));
        };
        (query.handler)(self, args)
    }

    pub fn run_query<T>(&self, id: &str, args: Option<Value>) -> Result<T, QueryError>
    where
        T: DeserializeOwned,
    {
        let value = self.run_query_json(id, args)?;
        serde_json::from_value(value)
            .map_err(|err| QueryError::new(format!("Failed to decode query result: {err}")))
    }

    fn normalize_in_place(&mut self) {
        let result = normalize_to_fixed_point(
            &mut self.tree,
            &mut self.selection,
            &self.registry,
            self.config.max_normalize_iterations,
        );
        if let Err(err) = result {
            tracing::warn!(?err, "normalization did not settle");
        }
        self.normalize_selection_in_place();
    }

    fn normalize_selection_in_place(&mut self) {
        self.selection = self
            .registry
            .normalize_selection(&self.tree, &self.selection);
    }
}

fn normalize_to_fixed_point(
    tree: &mut RichTextTree,
    selection: &mut Selection,
    registry: &PluginRegistry,
    max_iterations: usize,
) -> Result<(), ApplyError> {
    for _ in 0..max_iterations {
        let ops = registry.normalize(tree);
        if ops.is_empty() {
            return Ok(());
        }
        for op in ops {
            apply_op_to(tree, selection, op)?;
        }
    }
    Err(ApplyError::NormalizeDidNotConverge)
}

fn apply_op_to(tree: &mut RichTextTree, selection: &mut Selection, op: Op) -> Result<(), ApplyError> {
    match op {
        Op::InsertText { path, offset, text } => {
            let text_node = node_text_mut(tree, &path)?;
            let offset = clamp_to_char_boundary(&text_node.text, offset);
            text_node.text.insert_str(offset, &text);
            transform_selection_insert_text(selection, &path, offset, text.len());
        }
        Op::RemoveText { path, range } => {
            let text_node = node_text_mut(tree, &path)?;
            let start = clamp_to_char_boundary(&text_node.text, range.start);
            let end = clamp_to_char_boundary(&text_node.text, range.end);
            if start < end {
                text_node.text.replace_range(start..end, "");
                transform_selection_remove_text(selection, &path, start..end);
            }
        }
        Op::InsertNode { path, node } => {
            insert_node(tree, &path, node)?;
            transform_selection_insert_node(selection, &path);
        }
        Op::RemoveNode { path } => {
            let removed = remove_node(tree, &path)?;
            transform_selection_remove_node(selection, &path, &removed, tree);
        }
        Op::SetNodeAttrs { path, patch } => match node_mut(tree, &path)? {
            Node::Element(el) => patch.apply_to(&mut el.attrs),
            Node::Text(_) => return Err(ApplyError::InvalidPath("Text has no attrs".into())),
        },
    }
    Ok(())
}

#[derive(Debug)]
pub enum ApplyError {
    InvalidPath(String),
    NormalizeDidNotConverge,
}

impl std::fmt::Display for ApplyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApplyError::InvalidPath(msg) => write!(f, "invalid path: {msg}"),
            ApplyError::NormalizeDidNotConverge => f.write_str("normalization did not converge"),
        }
    }
}

impl std::error::Error for ApplyError {}

impl From<PathError> for ApplyError {
    fn from(value: PathError) -> Self {
        ApplyError::InvalidPath(value.0)
    }
}

#[derive(Debug)]
pub struct PathError(pub String);

fn transform_selection_insert_text(
    selection: &mut Selection,
    path: &[usize],
    offset: usize,
    len: usize,
) {
    for point in [&mut selection.anchor, &mut selection.focus] {
        if point.path == path && point.offset >= offset {
            point.offset = point.offset.saturating_add(len);
        }
    }
}

fn transform_selection_remove_text(
    selection: &mut Selection,
    path: &[usize],
    range: std::ops::Range<usize>,
) {
    let removed_len = range.end - range.start;
    for point in [&mut selection.anchor, &mut selection.focus] {
        if point.path != path || point.offset <= range.start {
            continue;
        }
        if point.offset >= range.end {
            point.offset -= removed_len;
        } else {
            point.offset = range.start;
        }
    }
}

fn transform_selection_insert_node(selection: &mut Selection, path: &[usize]) {
    let Some((&index, parent_path)) = path.split_last() else {
        return;
    };
    let depth = parent_path.len();

    for point in [&mut selection.anchor, &mut selection.focus] {
        if point.path.len() > depth
            && point.path.starts_with(parent_path)
            && point.path[depth] >= index
        {
            point.path[depth] += 1;
        }
    }
}

fn transform_selection_remove_node(
    selection: &mut Selection,
    path: &[usize],
    removed: &Node,
    tree_after_remove: &RichTextTree,
) {
    let Some((&index, parent_path)) = path.split_last() else {
        return;
    };
    let depth = parent_path.len();

    // Normalization merges a text run into its left sibling by appending the
    // text first and removing the run second; keep points at the same text.
    let merge_prefix_len = match (removed, index.checked_sub(1)) {
        (Node::Text(removed_text), Some(left_index)) => {
            let mut left_path = parent_path.to_vec();
            left_path.push(left_index);
            match node_at_path(tree_after_remove, &left_path) {
                Some(Node::Text(left_text))
                    if left_text.marks == removed_text.marks
                        && left_text.text.ends_with(&removed_text.text) =>
                {
                    Some(left_text.text.len() - removed_text.text.len())
                }
                _ => None,
            }
        }
        _ => None,
    };

    for point in [&mut selection.anchor, &mut selection.focus] {
        if point.path.len() <= depth || !point.path.starts_with(parent_path) {
            continue;
        }
        let ix = point.path[depth];
        if ix > index {
            point.path[depth] = ix - 1;
            continue;
        }
        if ix < index {
            continue;
        }

        // Point was inside the removed subtree. Map it to a nearby point.
        point.path.truncate(depth + 1);
        point.path[depth] = index.saturating_sub(1);
        point.offset = match (merge_prefix_len, removed) {
            (Some(prefix), Node::Text(removed_text)) => {
                prefix + point.offset.min(removed_text.text.len())
            }
            _ => 0,
        };
    }
}

pub(crate) fn node_at_path<'a>(tree: &'a RichTextTree, path: &[usize]) -> Option<&'a Node> {
    let (first, rest) = path.split_first()?;
    let mut node = tree.children.get(*first)?;
    for &ix in rest {
        node = match node {
            Node::Element(el) => el.children.get(ix)?,
            Node::Text(_) => return None,
        };
    }
    Some(node)
}

fn children_mut<'a>(
    tree: &'a mut RichTextTree,
    parent_path: &[usize],
) -> Result<&'a mut Vec<Node>, PathError> {
    let mut children = &mut tree.children;
    for (depth, &ix) in parent_path.iter().enumerate() {
        let len = children.len();
        children = match children.get_mut(ix) {
            Some(Node::Element(el)) => &mut el.children,
            Some(Node::Text(_)) => {
                return Err(PathError(format!("Non-container node at depth {depth}")));
            }
            None => {
                return Err(PathError(format!(
                    "Path out of bounds at depth {depth}: {ix} >= {len}"
                )));
            }
        };
    }
    Ok(children)
}

fn node_mut<'a>(tree: &'a mut RichTextTree, path: &[usize]) -> Result<&'a mut Node, PathError> {
    let Some((&index, parent_path)) = path.split_last() else {
        return Err(PathError("Empty path".into()));
    };
    let children = children_mut(tree, parent_path)?;
    let len = children.len();
    children.get_mut(index).ok_or_else(|| {
        PathError(format!(
            "Path out of bounds at depth {}: {index} >= {len}",
            parent_path.len()
        ))
    })
}

fn node_text_mut<'a>(
    tree: &'a mut RichTextTree,
    path: &[usize],
) -> Result<&'a mut TextNode, PathError> {
    match node_mut(tree, path)? {
        Node::Text(t) => Ok(t),
        Node::Element(_) => Err(PathError("Expected Text node".into())),
    }
}

fn insert_node(tree: &mut RichTextTree, path: &[usize], node: Node) -> Result<(), PathError> {
    let Some((&index, parent_path)) = path.split_last() else {
        return Err(PathError("Empty insert path".into()));
    };
    let children = children_mut(tree, parent_path)?;
    if index > children.len() {
        return Err(PathError(format!(
            "Insert index out of bounds: {index} > {}",
            children.len()
        )));
    }
    children.insert(index, node);
    Ok(())
}

fn remove_node(tree: &mut RichTextTree, path: &[usize]) -> Result<Node, PathError> {
    let Some((&index, parent_path)) = path.split_last() else {
        return Err(PathError("Empty remove path".into()));
    };
    let children = children_mut(tree, parent_path)?;
    if index >= children.len() {
        return Err(PathError(format!(
            "Remove index out of bounds: {index} >= {}",
            children.len()
        )));
    }
    Ok(children.remove(index))
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttrPatch {
    pub set: Attrs,
    pub remove: Vec<String>,
}

impl AttrPatch {
    pub fn set(key: impl Into<String>, value: Value) -> Self {
        let mut set = Attrs::new();
        set.insert(key.into(), value);
        Self {
            set,
            remove: Vec::new(),
        }
    }

    fn apply_to(&self, attrs: &mut Attrs) {
        for (k, v) in &self.set {
            attrs.insert(k.clone(), v.clone());
        }
        for key in &self.remove {
            attrs.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remove_node_parks_point_on_previous_sibling() {
        let mut tree = RichTextTree::new(vec![Node::paragraph("ab"), Node::paragraph("cd")]);
        let mut selection = Selection::collapsed(Point::new(vec![1, 0], 1));
        apply_op_to(&mut tree, &mut selection, Op::RemoveNode { path: vec![1] }).unwrap();
        assert_eq!(selection.focus.path, vec![0]);
        assert_eq!(selection.focus.offset, 0);
    }

    #[test]
    fn merged_text_run_keeps_point_offset() {
        let mut tree = RichTextTree::new(vec![Node::Element(ElementNode {
            kind: "paragraph".into(),
            attrs: Attrs::default(),
            children: vec![Node::text("ab"), Node::text("cd")],
        })]);
        let mut selection = Selection::collapsed(Point::new(vec![0, 1], 1));
        let ops = vec![
            Op::InsertText {
                path: vec![0, 0],
                offset: 2,
                text: "cd".into(),
            },
            Op::RemoveNode { path: vec![0, 1] },
        ];
        for op in ops {
            apply_op_to(&mut tree, &mut selection, op).unwrap();
        }
        assert_eq!(selection.focus, Point::new(vec![0, 0], 3));
    }

    #[test]
    fn insert_text_shifts_points_after_offset() {
        let mut tree = RichTextTree::from_text("ac");
        let mut selection = Selection::collapsed(Point::new(vec![0, 0], 1));
        apply_op_to(
            &mut tree,
            &mut selection,
            Op::InsertText {
                path: vec![0, 0],
                offset: 1,
                text: "b".into(),
            },
        )
        .unwrap();
        assert_eq!(tree.plain_text(), "abc");
        assert_eq!(selection.focus.offset, 2);
    }

    #[test]
    fn invalid_path_is_reported() {
        let mut tree = RichTextTree::empty();
        let mut selection = Selection::collapsed(Point::new(vec![0, 0], 0));
        let err = apply_op_to(&mut tree, &mut selection, Op::RemoveNode { path: vec![3] });
        assert!(matches!(err, Err(ApplyError::InvalidPath(_))));
    }
}
