//! Primitive tree edits and the transactions that group them.

use std::ops::Range;

use crate::core::{AttrPatch, Node, Selection};

/// Child indices from the tree root down to a node.
pub type Path = Vec<usize>;

/// One primitive edit. Each op's path is resolved against the tree left by
/// the ops before it in the same transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    InsertText {
        path: Path,
        offset: usize,
        text: String,
    },
    RemoveText {
        path: Path,
        range: Range<usize>,
    },
    InsertNode {
        path: Path,
        node: Node,
    },
    RemoveNode {
        path: Path,
    },
    SetNodeAttrs {
        path: Path,
        patch: AttrPatch,
    },
}

impl Op {
    pub fn path(&self) -> &[usize] {
        match self {
            Op::InsertText { path, .. }
            | Op::RemoveText { path, .. }
            | Op::InsertNode { path, .. }
            | Op::RemoveNode { path }
            | Op::SetNodeAttrs { path, .. } => path,
        }
    }
}

/// Ops that [`crate::Editor::apply`] lands together or not at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transaction {
    pub ops: Vec<Op>,
    /// Replaces whatever selection the ops leave behind.
    pub selection_after: Option<Selection>,
    /// Who built the transaction, for logs.
    pub source: &'static str,
}

impl Transaction {
    pub fn new(ops: Vec<Op>) -> Self {
        Self {
            ops,
            ..Self::default()
        }
    }

    pub fn selection_after(mut self, selection: Selection) -> Self {
        self.selection_after = Some(selection);
        self
    }

    pub fn source(mut self, source: &'static str) -> Self {
        self.source = source;
        self
    }

    pub fn is_noop(&self) -> bool {
        self.ops.is_empty() && self.selection_after.is_none()
    }
}
