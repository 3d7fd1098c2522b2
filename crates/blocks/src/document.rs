//! The canonical ordered collection of blocks.
//!
//! Every edit is a pure function returning a new [`Document`]. Block payloads
//! sit behind `Arc`, so an edit copies the id list and map but never the
//! rich-text trees it leaves alone.

use std::collections::HashMap;
use std::sync::Arc;

use blockpad_plate::RichTextTree;
use serde::{Deserialize, Serialize};

use crate::content::{Block, BlockContent};
use crate::id::BlockId;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Document {
    pub title: String,
    pub blocks: Blocks,
}

/// `order` lists every key of `data` exactly once.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Blocks {
    order: Vec<BlockId>,
    data: HashMap<BlockId, Arc<Block>>,
}

impl Document {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            blocks: Blocks::default(),
        }
    }

    /// Builds a document from blocks in order. Repeated ids keep their first
    /// occurrence.
    pub fn with_blocks(
        title: impl Into<String>,
        blocks: impl IntoIterator<Item = (BlockId, Block)>,
    ) -> Self {
        blocks
            .into_iter()
            .fold(Self::new(title), |doc, (id, block)| {
                let end = doc.len();
                doc.insert_block(end, id, block)
            })
    }

    /// Inserts `block` at `index`; an index past the end appends. A duplicate
    /// id leaves the document unchanged.
    pub fn insert_block(&self, index: usize, id: BlockId, block: Block) -> Self {
        if self.blocks.data.contains_key(&id) {
            return self.clone();
        }
        let mut next = self.clone();
        let index = index.min(next.blocks.order.len());
        next.blocks.order.insert(index, id);
        next.blocks.data.insert(id, Arc::new(block));
        next
    }

    pub fn delete_block(&self, id: BlockId) -> Self {
        if !self.blocks.data.contains_key(&id) {
            return self.clone();
        }
        let mut next = self.clone();
        next.blocks.order.retain(|other| *other != id);
        next.blocks.data.remove(&id);
        next
    }

    /// Replaces the content of `id` with `tree`. Legacy content becomes rich
    /// text here.
    pub fn update_block_content(&self, id: BlockId, tree: RichTextTree) -> Self {
        if !self.blocks.data.contains_key(&id) {
            return self.clone();
        }
        let mut next = self.clone();
        next.blocks
            .data
            .insert(id, Arc::new(Block::new(BlockContent::rich_text(tree))));
        next
    }

    /// Moves the block at `from` so it ends up at `to`.
    pub fn reorder(&self, from: usize, to: usize) -> Self {
        let len = self.blocks.order.len();
        if from >= len || to >= len || from == to {
            return self.clone();
        }
        let mut next = self.clone();
        let id = next.blocks.order.remove(from);
        next.blocks.order.insert(to, id);
        next
    }

    pub fn order(&self) -> &[BlockId] {
        &self.blocks.order
    }

    pub fn len(&self) -> usize {
        self.blocks.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.order.is_empty()
    }

    pub fn index_of(&self, id: BlockId) -> Option<usize> {
        self.blocks.order.iter().position(|other| *other == id)
    }

    pub fn id_at(&self, index: usize) -> Option<BlockId> {
        self.blocks.order.get(index).copied()
    }

    pub fn contains(&self, id: BlockId) -> bool {
        self.blocks.data.contains_key(&id)
    }

    pub fn block(&self, id: BlockId) -> Option<&Arc<Block>> {
        self.blocks.data.get(&id)
    }

    /// Blocks in document order.
    pub fn iter(&self) -> impl Iterator<Item = (BlockId, &Arc<Block>)> {
        self.blocks
            .order
            .iter()
            .filter_map(|id| self.blocks.data.get(id).map(|block| (*id, block)))
    }

    pub fn is_consistent(&self) -> bool {
        let mut seen = std::collections::HashSet::with_capacity(self.blocks.order.len());
        self.blocks.order.len() == self.blocks.data.len()
            && self
                .blocks
                .order
                .iter()
                .all(|id| seen.insert(*id) && self.blocks.data.contains_key(id))
    }

    /// Text of every block in order, separated by blank lines.
    pub fn plain_text(&self) -> String {
        self.iter()
            .map(|(_, block)| block.content.plain_text())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
