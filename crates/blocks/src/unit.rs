//! One mounted block: its editing session, key rules, and outgoing events.
//!
//! A unit never touches the document. Everything it wants done goes out
//! through its callbacks, which the playground refreshes on every render.

use std::cell::RefCell;
use std::rc::Rc;

use blockpad_plate::RichTextTree;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::callback::StableCallback;
use crate::content::BlockContent;
use crate::handle::{EditorEngine, ListenerId, SharedHandle, WeakHandle};
use crate::id::BlockId;
use crate::keys::{KeyEvent, KeyOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeDirection {
    /// Into the previous block.
    Before,
    /// Pull the next block in.
    After,
}

#[derive(Clone, Default)]
pub struct BlockCallbacks {
    pub on_change: StableCallback<RichTextTree>,
    pub on_add: StableCallback<()>,
    pub on_delete: StableCallback<()>,
    pub on_split: StableCallback<()>,
    pub on_merge: StableCallback<MergeDirection>,
    pub on_editor_setup: StableCallback<WeakHandle>,
    pub on_editor_cleanup: StableCallback<()>,
}

impl BlockCallbacks {
    /// Points every slot of `self` at the functions currently in `other`.
    /// Holders of `self` keep their handles.
    pub fn refresh_from(&self, other: &BlockCallbacks) {
        copy_slot(&self.on_change, &other.on_change);
        copy_slot(&self.on_add, &other.on_add);
        copy_slot(&self.on_delete, &other.on_delete);
        copy_slot(&self.on_split, &other.on_split);
        copy_slot(&self.on_merge, &other.on_merge);
        copy_slot(&self.on_editor_setup, &other.on_editor_setup);
        copy_slot(&self.on_editor_cleanup, &other.on_editor_cleanup);
    }
}

fn copy_slot<A: 'static>(into: &StableCallback<A>, from: &StableCallback<A>) {
    if into.same_slot(from) {
        return;
    }
    let from = from.clone();
    into.replace(move |arg| from.call(arg));
}

enum KeyIntent {
    Split,
    Delete,
    Merge(MergeDirection),
}

pub struct BlockUnit {
    id: BlockId,
    handle: SharedHandle,
    callbacks: BlockCallbacks,
    listener: ListenerId,
    synced: RefCell<BlockContent>,
}

impl BlockUnit {
    pub fn mount(
        id: BlockId,
        content: &BlockContent,
        engine: &dyn EditorEngine,
        callbacks: BlockCallbacks,
    ) -> Self {
        let handle = engine.create(content);

        let on_change = callbacks.on_change.clone();
        let listener = handle
            .borrow_mut()
            .subscribe(Rc::new(move |tree: &RichTextTree| on_change.call(tree.clone())));

        callbacks.on_editor_setup.call(Rc::downgrade(&handle));
        trace!(block = %id.short(), "block mounted");

        Self {
            id,
            handle,
            callbacks,
            listener,
            synced: RefCell::new(content.clone()),
        }
    }

    pub fn id(&self) -> BlockId {
        self.id
    }

    pub fn handle(&self) -> &SharedHandle {
        &self.handle
    }

    pub fn callbacks(&self) -> &BlockCallbacks {
        &self.callbacks
    }

    /// Runs before the editor's own key handling. `PreventDefault` means an
    /// intent was emitted and the editor must ignore the key.
    pub fn key_down(&self, event: &KeyEvent) -> KeyOutcome {
        let Some(intent) = self.key_intent(event) else {
            return KeyOutcome::Propagate;
        };
        match intent {
            KeyIntent::Split => self.callbacks.on_split.call(()),
            KeyIntent::Delete => self.callbacks.on_delete.call(()),
            KeyIntent::Merge(direction) => self.callbacks.on_merge.call(direction),
        }
        KeyOutcome::PreventDefault
    }

    fn key_intent(&self, event: &KeyEvent) -> Option<KeyIntent> {
        let handle = self.handle.borrow();
        if event.is("enter") {
            return (!event.modifiers.any()).then_some(KeyIntent::Split);
        }
        if event.is("backspace") {
            if handle.is_empty() {
                return Some(KeyIntent::Delete);
            }
            if handle.caret_at_start() {
                return Some(KeyIntent::Merge(MergeDirection::Before));
            }
            return None;
        }
        if event.is("delete") && handle.caret_at_end() {
            return Some(KeyIntent::Merge(MergeDirection::After));
        }
        None
    }

    /// The "+" affordance next to the block.
    pub fn add_sibling(&self) {
        self.callbacks.on_add.call(());
    }

    /// Brings the editor in line with `content` after the document changed
    /// underneath it. Returns true when the editor was reloaded.
    pub fn sync_content(&self, content: &BlockContent) -> bool {
        if *self.synced.borrow() == *content {
            return false;
        }
        *self.synced.borrow_mut() = content.clone();

        let tree = content.to_tree();
        let mut handle = self.handle.borrow_mut();
        if handle.snapshot() == tree {
            return false;
        }
        handle.load(tree);
        true
    }
}

impl Drop for BlockUnit {
    fn drop(&mut self) {
        if let Ok(mut handle) = self.handle.try_borrow_mut() {
            handle.unsubscribe(self.listener);
        }
        self.callbacks.on_editor_cleanup.call(());
        trace!(block = %self.id.short(), "block unmounted");
    }
}

impl std::fmt::Debug for BlockUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockUnit").field("id", &self.id).finish()
    }
}
