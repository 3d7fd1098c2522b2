use std::collections::HashMap;

use tracing::trace;

use crate::handle::{SharedHandle, WeakHandle};
use crate::id::BlockId;

/// Non-owning lookup from block id to its mounted editor.
///
/// Entries are written by block setup and cleanup notifications only.
#[derive(Default)]
pub struct HandleRegistry {
    handles: HashMap<BlockId, WeakHandle>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: BlockId, handle: WeakHandle) {
        trace!(block = %id.short(), "editor registered");
        self.handles.insert(id, handle);
    }

    pub fn unregister(&mut self, id: BlockId) {
        if self.handles.remove(&id).is_some() {
            trace!(block = %id.short(), "editor unregistered");
        }
    }

    /// The live handle for `id`, if its unit is still mounted.
    pub fn get(&self, id: BlockId) -> Option<SharedHandle> {
        self.handles.get(&id).and_then(|weak| weak.upgrade())
    }

    pub fn contains(&self, id: BlockId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn clear(&mut self) {
        self.handles.clear();
    }

    /// Ids whose editor is currently focused.
    pub fn focused(&self) -> Vec<BlockId> {
        self.handles
            .iter()
            .filter_map(|(id, weak)| {
                let handle = weak.upgrade()?;
                let focused = handle.borrow().is_focused();
                focused.then_some(*id)
            })
            .collect()
    }

    pub(crate) fn handles(&self) -> impl Iterator<Item = (BlockId, SharedHandle)> + '_ {
        self.handles
            .iter()
            .filter_map(|(id, weak)| weak.upgrade().map(|h| (*id, h)))
    }
}

impl std::fmt::Debug for HandleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandleRegistry")
            .field("ids", &self.handles.keys().collect::<Vec<_>>())
            .finish()
    }
}
