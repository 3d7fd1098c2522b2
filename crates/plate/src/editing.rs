//! Caret movement and text editing on top of [`Editor::apply`].
//!
//! Caret positions are exposed as global offsets (see [`crate::text`]), which
//! is what a host needs to reason about "start" and "end" of content without
//! knowing the tree shape.

use crate::core::{ApplyError, Editor, ElementNode, Node, Point, RichTextTree, Selection};
use crate::ops::{Op, Transaction};
use crate::text::{
    global_offset, inline_offset, merge_adjacent_runs, point_for_global_offset,
    point_for_inline_offset, split_inlines_at,
};

impl Editor {
    pub fn plain_text(&self) -> String {
        self.tree().plain_text()
    }

    /// True when the session holds no text at all (a single empty block).
    pub fn is_empty(&self) -> bool {
        self.tree().text_len() == 0
    }

    pub fn caret_offset(&self) -> usize {
        global_offset(self.tree(), &self.selection().focus)
    }

    pub fn caret_at_start(&self) -> bool {
        self.selection().is_collapsed() && self.caret_offset() == 0
    }

    pub fn caret_at_end(&self) -> bool {
        self.selection().is_collapsed() && self.caret_offset() == self.tree().text_len()
    }

    pub fn move_to_start(&mut self) {
        self.set_caret_offset(0);
    }

    pub fn move_to_end(&mut self) {
        let end = self.tree().text_len();
        self.set_caret_offset(end);
    }

    /// Collapses the selection at `offset`, clamped to the content length.
    pub fn set_caret_offset(&mut self, offset: usize) {
        let point = point_for_global_offset(self.tree(), offset);
        self.set_selection(Selection::collapsed(point));
    }

    pub fn select_offsets(&mut self, anchor: usize, focus: usize) {
        let anchor = point_for_global_offset(self.tree(), anchor);
        let focus = point_for_global_offset(self.tree(), focus);
        self.set_selection(Selection { anchor, focus });
    }

    /// Inserts `text` at the caret, replacing a non-collapsed selection.
    pub fn insert_text(&mut self, text: &str) -> Result<(), ApplyError> {
        self.delete_selection()?;
        if text.is_empty() {
            return Ok(());
        }

        let focus = self.selection().focus.clone();
        let after = Point::new(focus.path.clone(), focus.offset + text.len());
        let tx = Transaction::new(vec![Op::InsertText {
            path: focus.path,
            offset: focus.offset,
            text: text.to_string(),
        }])
        .selection_after(Selection::collapsed(after))
        .source("editing:insert_text");
        self.apply(tx)
    }

    /// A line break inside the active block.
    pub fn insert_soft_break(&mut self) -> Result<(), ApplyError> {
        self.insert_text("\n")
    }

    /// Splits the active block at the caret; the caret moves to the start of
    /// the new block.
    pub fn insert_break(&mut self) -> Result<(), ApplyError> {
        self.delete_selection()?;
        let Some((block_ix, left, right)) = self.break_at_caret() else {
            return Ok(());
        };

        let caret = point_for_inline_offset(&[block_ix + 1], &right.children, 0);
        let tx = Transaction::new(vec![
            Op::RemoveNode {
                path: vec![block_ix],
            },
            Op::InsertNode {
                path: vec![block_ix],
                node: Node::Element(left),
            },
            Op::InsertNode {
                path: vec![block_ix + 1],
                node: Node::Element(right),
            },
        ])
        .selection_after(Selection::collapsed(caret))
        .source("editing:insert_break");
        self.apply(tx)
    }

    /// Breaks the content at the caret and moves everything after the break
    /// out of this editor. The caret ends at the end of what remains.
    pub fn split_off_at_caret(&mut self) -> Result<RichTextTree, ApplyError> {
        self.delete_selection()?;
        let Some((block_ix, left, right)) = self.break_at_caret() else {
            return Ok(RichTextTree::empty());
        };

        let mut tail = vec![Node::Element(right)];
        tail.extend(self.tree().children[block_ix + 1..].iter().cloned());

        let caret = point_for_inline_offset(&[block_ix], &left.children, usize::MAX);
        let mut ops: Vec<Op> = (block_ix..self.tree().children.len())
            .rev()
            .map(|ix| Op::RemoveNode { path: vec![ix] })
            .collect();
        ops.push(Op::InsertNode {
            path: vec![block_ix],
            node: Node::Element(left),
        });

        let tx = Transaction::new(ops)
            .selection_after(Selection::collapsed(caret))
            .source("editing:split_off");
        self.apply(tx)?;
        Ok(RichTextTree::new(tail))
    }

    /// Removes the character before the caret, joining with the previous block
    /// when the caret sits at a block start.
    pub fn delete_backward(&mut self) -> Result<(), ApplyError> {
        if !self.selection().is_collapsed() {
            return self.delete_selection();
        }
        let offset = self.caret_offset();
        let plain = self.plain_text();
        let Some(ch) = plain.get(..offset).and_then(|s| s.chars().next_back()) else {
            return Ok(());
        };
        self.delete_range(offset - ch.len_utf8(), offset)
    }

    /// Removes the character after the caret, pulling the next block in when
    /// the caret sits at a block end.
    pub fn delete_forward(&mut self) -> Result<(), ApplyError> {
        if !self.selection().is_collapsed() {
            return self.delete_selection();
        }
        let offset = self.caret_offset();
        let plain = self.plain_text();
        let Some(ch) = plain.get(offset..).and_then(|s| s.chars().next()) else {
            return Ok(());
        };
        self.delete_range(offset, offset + ch.len_utf8())
    }

    pub fn delete_selection(&mut self) -> Result<(), ApplyError> {
        if self.selection().is_collapsed() {
            return Ok(());
        }
        let anchor = global_offset(self.tree(), &self.selection().anchor);
        let focus = global_offset(self.tree(), &self.selection().focus);
        self.delete_range(anchor.min(focus), anchor.max(focus))
    }

    /// Deletes the global range `start..end`. The first touched block keeps its
    /// kind and absorbs the tail of the last one.
    fn delete_range(&mut self, start: usize, end: usize) -> Result<(), ApplyError> {
        let Some(tx) = self.delete_range_tx(start, end) else {
            return Ok(());
        };
        self.apply(tx)
    }

    fn delete_range_tx(&self, start: usize, end: usize) -> Option<Transaction> {
        if start >= end {
            return None;
        }
        let tree = self.tree();
        let start_point = point_for_global_offset(tree, start);
        let end_point = point_for_global_offset(tree, end);

        if start_point.path == end_point.path {
            let range = start_point.offset..end_point.offset;
            return Some(
                Transaction::new(vec![Op::RemoveText {
                    path: start_point.path.clone(),
                    range,
                }])
                .selection_after(Selection::collapsed(start_point))
                .source("editing:remove_text"),
            );
        }

        let (first_ix, first) = element_at(tree, &start_point)?;
        let (last_ix, last) = element_at(tree, &end_point)?;

        let start_inline = inline_offset(
            &first.children,
            start_point.path.get(1).copied().unwrap_or(0),
            start_point.offset,
        );
        let end_inline = inline_offset(
            &last.children,
            end_point.path.get(1).copied().unwrap_or(0),
            end_point.offset,
        );

        let (mut children, _) = split_inlines_at(&first.children, start_inline);
        let (_, right) = split_inlines_at(&last.children, end_inline);
        children.extend(right);
        let children = merge_adjacent_runs(children);

        let caret = point_for_inline_offset(&[first_ix], &children, start_inline);
        let merged = Node::Element(ElementNode {
            kind: first.kind.clone(),
            attrs: first.attrs.clone(),
            children,
        });

        let mut ops: Vec<Op> = (first_ix..=last_ix)
            .rev()
            .map(|ix| Op::RemoveNode { path: vec![ix] })
            .collect();
        ops.push(Op::InsertNode {
            path: vec![first_ix],
            node: merged,
        });

        Some(
            Transaction::new(ops)
                .selection_after(Selection::collapsed(caret))
                .source("editing:delete_range"),
        )
    }

    /// The active block split at the caret, as `(block index, left, right)`.
    fn break_at_caret(&self) -> Option<(usize, ElementNode, ElementNode)> {
        let focus = &self.selection().focus;
        let (block_ix, el) = element_at(self.tree(), focus)?;
        let offset = inline_offset(
            &el.children,
            focus.path.get(1).copied().unwrap_or(0),
            focus.offset,
        );
        let (left, right) = split_inlines_at(&el.children, offset);

        let right_is_empty = crate::text::inline_len(&right) == 0;
        let right = if el.kind == "heading" && right_is_empty {
            // Breaking at the end of a heading continues with body text.
            let mut attrs = el.attrs.clone();
            attrs.remove("level");
            ElementNode {
                kind: "paragraph".to_string(),
                attrs,
                children: right,
            }
        } else {
            ElementNode {
                kind: el.kind.clone(),
                attrs: el.attrs.clone(),
                children: right,
            }
        };
        let left = ElementNode {
            kind: el.kind.clone(),
            attrs: el.attrs.clone(),
            children: left,
        };
        Some((block_ix, left, right))
    }
}

fn element_at<'a>(tree: &'a RichTextTree, point: &Point) -> Option<(usize, &'a ElementNode)> {
    let block_ix = *point.path.first()?;
    match tree.children.get(block_ix)? {
        Node::Element(el) => Some((block_ix, el)),
        Node::Text(_) => None,
    }
}
