//! Offset arithmetic over inline runs.
//!
//! Two addressing schemes are used. An *inline offset* is a byte offset into
//! the concatenated text of one block. A *global offset* is a byte offset into
//! [`RichTextTree::plain_text`], where blocks are joined by a single `\n`.

use crate::core::{Marks, Node, Point, RichTextTree, TextNode};

pub(crate) fn clamp_to_char_boundary(s: &str, mut ix: usize) -> usize {
    ix = ix.min(s.len());
    while ix > 0 && !s.is_char_boundary(ix) {
        ix -= 1;
    }
    ix
}

pub(crate) fn inline_len(children: &[Node]) -> usize {
    children
        .iter()
        .map(|n| match n {
            Node::Text(t) => t.text.len(),
            Node::Element(_) => 0,
        })
        .sum()
}

/// Inline offset of `offset` inside child `child_ix`.
pub(crate) fn inline_offset(children: &[Node], child_ix: usize, offset: usize) -> usize {
    let mut total = 0usize;
    for (ix, node) in children.iter().enumerate() {
        let Node::Text(t) = node else {
            continue;
        };
        if ix < child_ix {
            total += t.text.len();
            continue;
        }
        if ix == child_ix {
            total += clamp_to_char_boundary(&t.text, offset);
        }
        break;
    }
    total
}

/// Maps an inline offset back to a text point inside `block_path`.
///
/// On a boundary between two runs the point lands at the start of the later
/// run, which is where typed text picks up its marks.
pub(crate) fn point_for_inline_offset(block_path: &[usize], children: &[Node], offset: usize) -> Point {
    let mut remaining = offset;
    for (child_ix, node) in children.iter().enumerate() {
        let Node::Text(t) = node else {
            continue;
        };
        if remaining < t.text.len() {
            let mut path = block_path.to_vec();
            path.push(child_ix);
            return Point::new(path, clamp_to_char_boundary(&t.text, remaining));
        }
        if remaining == t.text.len() {
            if matches!(children.get(child_ix + 1), Some(Node::Text(_))) {
                let mut path = block_path.to_vec();
                path.push(child_ix + 1);
                return Point::new(path, 0);
            }
            let mut path = block_path.to_vec();
            path.push(child_ix);
            return Point::new(path, t.text.len());
        }
        remaining -= t.text.len();
    }

    // Fallback to end of last text node.
    for (child_ix, node) in children.iter().enumerate().rev() {
        if let Node::Text(t) = node {
            let mut path = block_path.to_vec();
            path.push(child_ix);
            return Point::new(path, t.text.len());
        }
    }

    let mut path = block_path.to_vec();
    path.push(0);
    Point::new(path, 0)
}

pub(crate) fn global_offset(tree: &RichTextTree, point: &Point) -> usize {
    let Some((&block_ix, rest)) = point.path.split_first() else {
        return 0;
    };
    let mut total = 0usize;
    for (ix, node) in tree.children.iter().enumerate() {
        let Node::Element(el) = node else {
            continue;
        };
        if ix < block_ix {
            total += el.inline_text_len() + 1;
            continue;
        }
        if ix == block_ix {
            let child_ix = rest.first().copied().unwrap_or(0);
            total += inline_offset(&el.children, child_ix, point.offset);
        }
        break;
    }
    total
}

pub(crate) fn point_for_global_offset(tree: &RichTextTree, offset: usize) -> Point {
    let mut remaining = offset;
    let mut last_block: Option<usize> = None;
    for (ix, node) in tree.children.iter().enumerate() {
        let Node::Element(el) = node else {
            continue;
        };
        let len = el.inline_text_len();
        if remaining <= len {
            return point_for_inline_offset(&[ix], &el.children, remaining);
        }
        remaining -= len + 1;
        last_block = Some(ix);
    }

    match last_block {
        Some(ix) => match &tree.children[ix] {
            Node::Element(el) => point_for_inline_offset(&[ix], &el.children, usize::MAX),
            Node::Text(_) => Point::new(vec![ix], 0),
        },
        None => Point::new(vec![0, 0], 0),
    }
}

/// Splits inline children at an inline offset. Both halves keep at least one
/// text run so that either can stand alone as a block's content.
pub(crate) fn split_inlines_at(children: &[Node], offset: usize) -> (Vec<Node>, Vec<Node>) {
    let mut left: Vec<Node> = Vec::new();
    let mut right: Vec<Node> = Vec::new();
    let mut cursor = 0usize;

    for node in children {
        let Node::Text(t) = node else {
            if cursor < offset {
                left.push(node.clone());
            } else {
                right.push(node.clone());
            }
            continue;
        };
        let end = cursor + t.text.len();
        if end <= offset {
            left.push(node.clone());
        } else if cursor >= offset {
            right.push(node.clone());
        } else {
            let rel = clamp_to_char_boundary(&t.text, offset - cursor);
            left.push(Node::Text(TextNode {
                text: t.text[..rel].to_string(),
                marks: t.marks.clone(),
            }));
            right.push(Node::Text(TextNode {
                text: t.text[rel..].to_string(),
                marks: t.marks.clone(),
            }));
        }
        cursor = end;
    }

    fn edge_marks<'a>(mut nodes: impl Iterator<Item = &'a Node>) -> Marks {
        nodes
            .find_map(|n| match n {
                Node::Text(t) => Some(t.marks.clone()),
                Node::Element(_) => None,
            })
            .unwrap_or_default()
    }

    if !left.iter().any(|n| matches!(n, Node::Text(_))) {
        left.push(Node::Text(TextNode {
            text: String::new(),
            marks: edge_marks(right.iter()),
        }));
    }
    if !right.iter().any(|n| matches!(n, Node::Text(_))) {
        right.push(Node::Text(TextNode {
            text: String::new(),
            marks: edge_marks(left.iter().rev()),
        }));
    }

    (merge_adjacent_runs(left), merge_adjacent_runs(right))
}

/// Joins neighbouring runs that carry identical marks and drops empty runs
/// when something else remains.
pub(crate) fn merge_adjacent_runs(children: Vec<Node>) -> Vec<Node> {
    let mut out: Vec<Node> = Vec::with_capacity(children.len());
    for node in children {
        if let (Node::Text(next), Some(Node::Text(prev))) = (&node, out.last_mut()) {
            if prev.marks == next.marks || next.text.is_empty() {
                prev.text.push_str(&next.text);
                continue;
            }
            if prev.text.is_empty() {
                *prev = next.clone();
                continue;
            }
        }
        out.push(node);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bold(text: &str) -> Node {
        Node::Text(TextNode {
            text: text.to_string(),
            marks: Marks {
                bold: true,
                ..Marks::default()
            },
        })
    }

    #[test]
    fn split_inside_a_run() {
        let (left, right) = split_inlines_at(&[Node::text("AB")], 1);
        assert_eq!(left, vec![Node::text("A")]);
        assert_eq!(right, vec![Node::text("B")]);
    }

    #[test]
    fn split_at_end_keeps_marks_on_empty_half() {
        let (left, right) = split_inlines_at(&[bold("AB")], 2);
        assert_eq!(left, vec![bold("AB")]);
        assert_eq!(right, vec![bold("")]);
    }

    #[test]
    fn merge_joins_equal_marks() {
        let merged = merge_adjacent_runs(vec![Node::text("a"), Node::text("b"), bold("c")]);
        assert_eq!(merged, vec![Node::text("ab"), bold("c")]);
    }

    #[test]
    fn global_offsets_count_block_separators() {
        let tree = RichTextTree::new(vec![Node::paragraph("ab"), Node::paragraph("cd")]);
        let point = point_for_global_offset(&tree, 3);
        assert_eq!(point, Point::new(vec![1, 0], 0));
        assert_eq!(global_offset(&tree, &point), 3);
        assert_eq!(
            point_for_global_offset(&tree, 99),
            Point::new(vec![1, 0], 2)
        );
    }

    #[test]
    fn boundary_between_runs_prefers_later_run() {
        let children = vec![Node::text("ab"), bold("cd")];
        assert_eq!(
            point_for_inline_offset(&[0], &children, 2),
            Point::new(vec![0, 1], 0)
        );
    }
}
