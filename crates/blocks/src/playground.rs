//! The document controller.
//!
//! Block units report through callbacks that only queue a [`BlockEvent`]; the
//! playground drains that queue after every input, turns each intent into a
//! single document transition, and reconciles the mounted units with the new
//! document. Cross-block edits reach the other block's editor through the
//! [`HandleRegistry`], which the units themselves keep up to date.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use blockpad_plate::RichTextTree;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::callback::StableCallback;
use crate::config::PlaygroundConfig;
use crate::content::{Block, BlockContent};
use crate::document::Document;
use crate::error::PlaygroundError;
use crate::handle::{EditorEngine, PlateEngine, SharedHandle};
use crate::id::BlockId;
use crate::keys::{KeyEvent, KeyOutcome};
use crate::registry::HandleRegistry;
use crate::scheduler::{Clock, DeferredQueue, SystemClock, TaskId};
use crate::unit::{BlockCallbacks, BlockUnit, MergeDirection};

/// What a block unit asked for, tagged with the index and id it had when its
/// callbacks were last refreshed.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockEvent {
    Changed { id: BlockId, tree: RichTextTree },
    Add { index: usize, id: BlockId },
    Delete { index: usize, id: BlockId },
    Split { index: usize, id: BlockId },
    Merge {
        index: usize,
        id: BlockId,
        direction: MergeDirection,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DragEvent {
    Start { active: BlockId },
    End {
        active: BlockId,
        over: Option<BlockId>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPosition {
    Start,
    End,
    /// Leave the caret where the edit put it.
    Keep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FocusTarget {
    pub id: BlockId,
    pub position: FocusPosition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusOutcome {
    Focused(BlockId),
    AlreadyFocused(BlockId),
    /// The block exists but its editor is not mounted.
    Unavailable(BlockId),
    /// The block is gone.
    Stale(BlockId),
}

type Inbox = Rc<RefCell<VecDeque<BlockEvent>>>;

pub struct Playground {
    config: PlaygroundConfig,
    document: Document,
    engine: Box<dyn EditorEngine>,
    units: Vec<BlockUnit>,
    registry: Rc<RefCell<HandleRegistry>>,
    inbox: Inbox,
    clock: Rc<dyn Clock>,
    focus_queue: DeferredQueue<FocusTarget>,
    active_drag: Option<BlockId>,
    revision: u64,
}

impl Playground {
    /// A playground holding one empty block.
    pub fn new(config: PlaygroundConfig) -> Self {
        let document = Document::with_blocks(
            config.title.clone(),
            [(BlockId::new(), Block::default())],
        );
        Self::with_document(config, document)
    }

    pub fn with_document(config: PlaygroundConfig, document: Document) -> Self {
        let engine = PlateEngine::new(config.editor.clone());
        Self::with_parts(config, document, Rc::new(SystemClock::new()), Box::new(engine))
    }

    pub fn with_parts(
        config: PlaygroundConfig,
        document: Document,
        clock: Rc<dyn Clock>,
        engine: Box<dyn EditorEngine>,
    ) -> Self {
        let mut playground = Self {
            config,
            document,
            engine,
            units: Vec::new(),
            registry: Rc::new(RefCell::new(HandleRegistry::new())),
            inbox: Rc::new(RefCell::new(VecDeque::new())),
            clock,
            focus_queue: DeferredQueue::new(),
            active_drag: None,
            revision: 0,
        };
        playground.render();
        playground.flush();
        playground
    }

    pub fn config(&self) -> &PlaygroundConfig {
        &self.config
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Number of document transitions committed so far.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Ids in the order the drag-and-drop list shows them.
    pub fn drag_items(&self) -> Vec<BlockId> {
        self.document.order().to_vec()
    }

    pub fn active_drag(&self) -> Option<BlockId> {
        self.active_drag
    }

    pub fn mounted(&self) -> Vec<BlockId> {
        self.units.iter().map(BlockUnit::id).collect()
    }

    /// The registered editor for `id`, if mounted.
    pub fn handle(&self, id: BlockId) -> Option<SharedHandle> {
        self.registry.borrow().get(id)
    }

    pub fn focused_block(&self) -> Option<BlockId> {
        self.registry.borrow().focused().first().copied()
    }

    pub fn pending_focus(&self) -> usize {
        self.focus_queue.len()
    }

    pub fn block_text(&self, id: BlockId) -> Option<String> {
        self.document.block(id).map(|block| block.content.plain_text())
    }

    // Input entry points. Each one drains the intents it caused before
    // returning.

    /// Delivers a key press to a block. Keys the block does not claim get the
    /// editor's own handling.
    pub fn key_down(&mut self, id: BlockId, event: &KeyEvent) -> Result<KeyOutcome, PlaygroundError> {
        let unit = self.unit(id).ok_or(PlaygroundError::StaleReference)?;
        let outcome = unit.key_down(event);
        let handle = unit.handle().clone();

        let result = match outcome {
            KeyOutcome::PreventDefault => Ok(()),
            KeyOutcome::Propagate => default_key_action(&handle, event),
        };
        self.flush();
        result.map(|()| outcome)
    }

    /// Types `text` at the caret of a block.
    pub fn input_text(&mut self, id: BlockId, text: &str) -> Result<(), PlaygroundError> {
        let handle = self.unit_handle(id)?;
        let result = handle.borrow_mut().insert_text(text);
        self.flush();
        result
    }

    /// Runs an editor command (headings, lists) in a block.
    pub fn run_command(
        &mut self,
        id: BlockId,
        command: &str,
        args: Option<serde_json::Value>,
    ) -> Result<(), PlaygroundError> {
        let handle = self.unit_handle(id)?;
        let result = handle.borrow_mut().run_command(command, args);
        self.flush();
        result
    }

    /// The "+" button next to a block.
    pub fn add_sibling(&mut self, id: BlockId) -> Result<(), PlaygroundError> {
        self.unit(id).ok_or(PlaygroundError::StaleReference)?.add_sibling();
        self.flush();
        Ok(())
    }

    /// A pointer click into a block. The user's choice wins over any focus
    /// move still waiting to run.
    pub fn click(&mut self, id: BlockId, offset: Option<usize>) -> Result<(), PlaygroundError> {
        let handle = self.unit_handle(id)?;
        let cancelled = self.focus_queue.cancel_all();
        if cancelled > 0 {
            debug!(block = %id.short(), cancelled, "click cancelled pending focus");
        }
        self.blur_all_except(id);
        let mut handle = handle.borrow_mut();
        if let Some(offset) = offset {
            handle.set_caret(offset);
        }
        handle.focus();
        Ok(())
    }

    pub fn drag(&mut self, event: DragEvent) -> Result<(), PlaygroundError> {
        match event {
            DragEvent::Start { active } => {
                self.active_drag = Some(active);
                Ok(())
            }
            DragEvent::End { active, over } => {
                self.active_drag = None;
                let over = over.ok_or(PlaygroundError::InvalidDropTarget)?;
                let from = self
                    .document
                    .index_of(active)
                    .ok_or(PlaygroundError::StaleReference)?;
                let to = self
                    .document
                    .index_of(over)
                    .ok_or(PlaygroundError::StaleReference)?;
                let next = self.document.reorder(from, to);
                self.commit(next, "reorder");
                Ok(())
            }
        }
    }

    // Focus.

    /// Queues a focus move to run `focus_delay` from now.
    pub fn schedule_focus(&mut self, id: BlockId, position: FocusPosition) -> TaskId {
        let due = self.clock.now() + self.config.focus_delay();
        self.focus_queue.schedule(due, FocusTarget { id, position })
    }

    pub fn cancel_focus(&mut self, task: TaskId) -> bool {
        self.focus_queue.cancel(task)
    }

    /// Runs every focus move that is due.
    pub fn tick(&mut self) -> Vec<FocusOutcome> {
        let due = self.focus_queue.take_due(self.clock.now());
        due.into_iter()
            .map(|target| {
                let outcome = self.apply_focus(target);
                trace!(?outcome, "focus task ran");
                outcome
            })
            .collect()
    }

    fn apply_focus(&self, target: FocusTarget) -> FocusOutcome {
        let FocusTarget { id, position } = target;
        if !self.document.contains(id) {
            return FocusOutcome::Stale(id);
        }
        let Some(handle) = self.handle(id) else {
            return FocusOutcome::Unavailable(id);
        };
        if handle.borrow().is_focused() {
            return FocusOutcome::AlreadyFocused(id);
        }

        self.blur_all_except(id);
        let mut handle = handle.borrow_mut();
        match position {
            FocusPosition::Start => handle.move_to_start(),
            FocusPosition::End => handle.move_to_end(),
            FocusPosition::Keep => {}
        }
        handle.focus();
        FocusOutcome::Focused(id)
    }

    fn blur_all_except(&self, id: BlockId) {
        let registry = self.registry.borrow();
        for (other, handle) in registry.handles() {
            if other != id {
                handle.borrow_mut().blur();
            }
        }
    }

    /// Unmounts every block and forgets every editor.
    pub fn teardown(&mut self) {
        self.focus_queue.cancel_all();
        self.units.clear();
        self.registry.borrow_mut().clear();
        self.inbox.borrow_mut().clear();
        self.active_drag = None;
    }

    // Intents.

    fn flush(&mut self) {
        loop {
            let Some(event) = self.inbox.borrow_mut().pop_front() else {
                break;
            };
            if let Err(err) = self.dispatch(event) {
                debug!(%err, "block event ignored");
            }
        }
    }

    fn dispatch(&mut self, event: BlockEvent) -> Result<(), PlaygroundError> {
        match event {
            BlockEvent::Changed { id, tree } => self.on_change(id, tree),
            BlockEvent::Add { index, id } => self.on_add(index, id),
            BlockEvent::Delete { index, id } => self.on_delete(index, id),
            BlockEvent::Split { index, id } => self.on_split(index, id),
            BlockEvent::Merge {
                index,
                id,
                direction,
            } => match direction {
                MergeDirection::Before => self.merge_before(index, id),
                MergeDirection::After => self.merge_after(index, id),
            },
        }
    }

    fn on_change(&mut self, id: BlockId, tree: RichTextTree) -> Result<(), PlaygroundError> {
        let block = self
            .document
            .block(id)
            .ok_or(PlaygroundError::StaleReference)?;
        if matches!(&block.content, BlockContent::RichText { tree: current } if *current == tree) {
            return Ok(());
        }
        let next = self.document.update_block_content(id, tree);
        self.commit(next, "change");
        Ok(())
    }

    fn on_add(&mut self, index: usize, id: BlockId) -> Result<(), PlaygroundError> {
        let index = self.resolve(index, id)?;
        let new_id = BlockId::new();
        let next = self
            .document
            .insert_block(index + 1, new_id, Block::default());
        self.commit(next, "add");
        self.schedule_focus(new_id, FocusPosition::Start);
        Ok(())
    }

    fn on_delete(&mut self, index: usize, id: BlockId) -> Result<(), PlaygroundError> {
        let index = self.resolve(index, id)?;
        // The document keeps at least one block to type into.
        if self.document.len() == 1 {
            trace!(block = %id.short(), "sole block kept");
            return Ok(());
        }
        let next = self.document.delete_block(id);
        self.commit(next, "delete");
        if let Some(target) = self.document.id_at(index.saturating_sub(1)) {
            self.schedule_focus(target, FocusPosition::End);
        }
        Ok(())
    }

    fn on_split(&mut self, index: usize, id: BlockId) -> Result<(), PlaygroundError> {
        let index = self.resolve(index, id)?;
        let handle = self.registered(id)?;
        let (before, after) = handle.borrow_mut().split_at_caret()?;

        let new_id = BlockId::new();
        let next = self
            .document
            .update_block_content(id, before)
            .insert_block(index + 1, new_id, Block::from_tree(after));
        self.commit(next, "split");
        self.schedule_focus(new_id, FocusPosition::Start);
        Ok(())
    }

    /// Appends the text of the block at `index` to the previous block.
    fn merge_before(&mut self, index: usize, id: BlockId) -> Result<(), PlaygroundError> {
        let index = self.resolve(index, id)?;
        let Some(prev_id) = index.checked_sub(1).and_then(|ix| self.document.id_at(ix)) else {
            return Ok(());
        };
        let text = self.registered(id)?.borrow().plain_text();
        let merged = append_at_end(&self.registered(prev_id)?, &text)?;

        let next = self
            .document
            .update_block_content(prev_id, merged)
            .delete_block(id);
        self.commit(next, "merge before");
        self.schedule_focus(prev_id, FocusPosition::Keep);
        Ok(())
    }

    /// Pulls the text of the block after `index` into it.
    fn merge_after(&mut self, index: usize, id: BlockId) -> Result<(), PlaygroundError> {
        let index = self.resolve(index, id)?;
        let Some(next_id) = self.document.id_at(index + 1) else {
            return Ok(());
        };
        let text = self.registered(next_id)?.borrow().plain_text();
        let merged = append_at_end(&self.registered(id)?, &text)?;

        let next = self
            .document
            .update_block_content(id, merged)
            .delete_block(next_id);
        self.commit(next, "merge after");
        self.schedule_focus(id, FocusPosition::Keep);
        Ok(())
    }

    /// The current index of `id`. `hint` is where the block was when its
    /// callbacks were last refreshed.
    fn resolve(&self, hint: usize, id: BlockId) -> Result<usize, PlaygroundError> {
        if self.document.id_at(hint) == Some(id) {
            return Ok(hint);
        }
        self.document
            .index_of(id)
            .ok_or(PlaygroundError::StaleReference)
    }

    fn registered(&self, id: BlockId) -> Result<SharedHandle, PlaygroundError> {
        self.handle(id)
            .ok_or(PlaygroundError::EditorHandleUnavailable(id))
    }

    fn unit(&self, id: BlockId) -> Option<&BlockUnit> {
        self.units.iter().find(|unit| unit.id() == id)
    }

    fn unit_handle(&self, id: BlockId) -> Result<SharedHandle, PlaygroundError> {
        self.unit(id)
            .map(|unit| unit.handle().clone())
            .ok_or(PlaygroundError::StaleReference)
    }

    // Rendering.

    fn commit(&mut self, next: Document, reason: &'static str) {
        if next == self.document {
            return;
        }
        debug_assert!(next.is_consistent());
        self.document = next;
        self.revision += 1;
        trace!(revision = self.revision, reason, blocks = self.document.len(), "document committed");
        self.render();
    }

    /// Mounts units for new blocks, unmounts units for removed ones, and hands
    /// every unit callbacks bound to its current position.
    fn render(&mut self) {
        let mut previous: HashMap<BlockId, BlockUnit> =
            self.units.drain(..).map(|unit| (unit.id(), unit)).collect();

        let mut units = Vec::with_capacity(self.document.len());
        for (index, (id, block)) in self.document.iter().enumerate() {
            let callbacks = self.callbacks_for(index, id);
            let unit = match previous.remove(&id) {
                Some(unit) => {
                    unit.callbacks().refresh_from(&callbacks);
                    if unit.sync_content(&block.content) {
                        trace!(block = %id.short(), "editor resynced");
                    }
                    unit
                }
                None => BlockUnit::mount(id, &block.content, self.engine.as_ref(), callbacks),
            };
            units.push(unit);
        }
        self.units = units;
        drop(previous);
    }

    fn callbacks_for(&self, index: usize, id: BlockId) -> BlockCallbacks {
        let inbox = &self.inbox;
        let push = |event: BlockEvent| {
            let inbox = inbox.clone();
            move || inbox.borrow_mut().push_back(event.clone())
        };

        let on_change = {
            let inbox = inbox.clone();
            StableCallback::from_fn(move |tree: RichTextTree| {
                inbox.borrow_mut().push_back(BlockEvent::Changed { id, tree })
            })
        };
        let on_merge = {
            let inbox = inbox.clone();
            StableCallback::from_fn(move |direction| {
                inbox.borrow_mut().push_back(BlockEvent::Merge {
                    index,
                    id,
                    direction,
                })
            })
        };
        let add = push(BlockEvent::Add { index, id });
        let delete = push(BlockEvent::Delete { index, id });
        let split = push(BlockEvent::Split { index, id });

        let registry = self.registry.clone();
        let on_editor_setup =
            StableCallback::from_fn(move |handle| registry.borrow_mut().register(id, handle));
        let registry = self.registry.clone();
        let on_editor_cleanup =
            StableCallback::from_fn(move |()| registry.borrow_mut().unregister(id));

        BlockCallbacks {
            on_change,
            on_add: StableCallback::from_fn(move |()| add()),
            on_delete: StableCallback::from_fn(move |()| delete()),
            on_split: StableCallback::from_fn(move |()| split()),
            on_merge,
            on_editor_setup,
            on_editor_cleanup,
        }
    }
}

impl Drop for Playground {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Inserts `text` at the end of the editor's content and leaves the caret at
/// the boundary the text was inserted at.
fn append_at_end(handle: &SharedHandle, text: &str) -> Result<RichTextTree, PlaygroundError> {
    let mut handle = handle.borrow_mut();
    handle.move_to_end();
    let boundary = handle.caret_offset();
    handle.insert_text(text)?;
    handle.set_caret(boundary);
    Ok(handle.snapshot())
}

fn default_key_action(handle: &SharedHandle, event: &KeyEvent) -> Result<(), PlaygroundError> {
    let mut handle = handle.borrow_mut();
    if event.is("enter") {
        return handle.insert_soft_break();
    }
    if event.is("backspace") {
        return handle.delete_backward();
    }
    if event.is("delete") {
        return handle.delete_forward();
    }
    Ok(())
}

impl std::fmt::Debug for Playground {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Playground")
            .field("document", &self.document)
            .field("revision", &self.revision)
            .field("active_drag", &self.active_drag)
            .finish_non_exhaustive()
    }
}
