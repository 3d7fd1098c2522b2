//! Live editing sessions bound to mounted blocks.
//!
//! The block unit owns its handle; everyone else holds a [`WeakHandle`] and
//! has to cope with it being gone.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use blockpad_plate::{Editor, EditorConfig, RichTextTree};

use crate::content::BlockContent;
use crate::error::PlaygroundError;

pub type SharedHandle = Rc<RefCell<dyn EditorHandle>>;
pub type WeakHandle = Weak<RefCell<dyn EditorHandle>>;

/// Called with the new tree after every content mutation.
pub type UpdateListener = Rc<dyn Fn(&RichTextTree)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Offsets are byte offsets into [`EditorHandle::plain_text`], where blocks of
/// the tree are joined by `\n`.
pub trait EditorHandle {
    fn snapshot(&self) -> RichTextTree;
    fn plain_text(&self) -> String;
    fn placeholder(&self) -> &str;

    fn caret_offset(&self) -> usize;
    fn is_empty(&self) -> bool;
    fn caret_at_start(&self) -> bool;
    fn caret_at_end(&self) -> bool;
    fn move_to_start(&mut self);
    fn move_to_end(&mut self);
    fn set_caret(&mut self, offset: usize);

    fn insert_text(&mut self, text: &str) -> Result<(), PlaygroundError>;
    fn insert_soft_break(&mut self) -> Result<(), PlaygroundError>;
    fn delete_backward(&mut self) -> Result<(), PlaygroundError>;
    fn delete_forward(&mut self) -> Result<(), PlaygroundError>;
    fn run_command(
        &mut self,
        id: &str,
        args: Option<serde_json::Value>,
    ) -> Result<(), PlaygroundError>;

    /// Breaks the content at the caret, keeping what precedes it. Returns the
    /// `(before, after)` trees.
    fn split_at_caret(&mut self) -> Result<(RichTextTree, RichTextTree), PlaygroundError>;

    /// Replaces the content without notifying listeners.
    fn load(&mut self, tree: RichTextTree);

    fn subscribe(&mut self, listener: UpdateListener) -> ListenerId;
    fn unsubscribe(&mut self, id: ListenerId);

    fn focus(&mut self);
    fn blur(&mut self);
    fn is_focused(&self) -> bool;
}

/// Builds editing sessions for blocks.
pub trait EditorEngine {
    fn create(&self, content: &BlockContent) -> SharedHandle;
}

pub struct PlateEngine {
    config: EditorConfig,
}

impl PlateEngine {
    pub fn new(config: EditorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }
}

impl Default for PlateEngine {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

impl EditorEngine for PlateEngine {
    fn create(&self, content: &BlockContent) -> SharedHandle {
        Rc::new(RefCell::new(PlateHandle::new(
            content.to_tree(),
            self.config.clone(),
        )))
    }
}

/// [`EditorHandle`] over a `blockpad_plate` editor.
pub struct PlateHandle {
    editor: Editor,
    listeners: Vec<(ListenerId, UpdateListener)>,
    next_listener: u64,
    focused: bool,
}

impl PlateHandle {
    pub fn new(tree: RichTextTree, config: EditorConfig) -> Self {
        Self {
            editor: Editor::with_tree(tree, config),
            listeners: Vec::new(),
            next_listener: 0,
            focused: false,
        }
    }

    pub fn editor(&self) -> &Editor {
        &self.editor
    }

    fn mutate<T>(
        &mut self,
        f: impl FnOnce(&mut Editor) -> Result<T, PlaygroundError>,
    ) -> Result<T, PlaygroundError> {
        let before = self.editor.tree().clone();
        let out = f(&mut self.editor)?;
        if self.editor.tree() != &before {
            self.notify();
        }
        Ok(out)
    }

    fn notify(&self) {
        let tree = self.editor.tree();
        let listeners: Vec<UpdateListener> =
            self.listeners.iter().map(|(_, l)| l.clone()).collect();
        for listener in listeners {
            listener(tree);
        }
    }
}

impl EditorHandle for PlateHandle {
    fn snapshot(&self) -> RichTextTree {
        self.editor.tree().clone()
    }

    fn plain_text(&self) -> String {
        self.editor.plain_text()
    }

    fn placeholder(&self) -> &str {
        &self.editor.config().placeholder
    }

    fn caret_offset(&self) -> usize {
        self.editor.caret_offset()
    }

    fn is_empty(&self) -> bool {
        self.editor.is_empty()
    }

    fn caret_at_start(&self) -> bool {
        self.editor.caret_at_start()
    }

    fn caret_at_end(&self) -> bool {
        self.editor.caret_at_end()
    }

    fn move_to_start(&mut self) {
        self.editor.move_to_start();
    }

    fn move_to_end(&mut self) {
        self.editor.move_to_end();
    }

    fn set_caret(&mut self, offset: usize) {
        self.editor.set_caret_offset(offset);
    }

    fn insert_text(&mut self, text: &str) -> Result<(), PlaygroundError> {
        self.mutate(|editor| Ok(editor.insert_text(text)?))
    }

    fn insert_soft_break(&mut self) -> Result<(), PlaygroundError> {
        self.mutate(|editor| Ok(editor.insert_soft_break()?))
    }

    fn delete_backward(&mut self) -> Result<(), PlaygroundError> {
        self.mutate(|editor| Ok(editor.delete_backward()?))
    }

    fn delete_forward(&mut self) -> Result<(), PlaygroundError> {
        self.mutate(|editor| Ok(editor.delete_forward()?))
    }

    fn run_command(
        &mut self,
        id: &str,
        args: Option<serde_json::Value>,
    ) -> Result<(), PlaygroundError> {
        self.mutate(|editor| {
            editor
                .run_command(id, args)
                .map_err(|err| PlaygroundError::Engine(err.to_string()))
        })
    }

    fn split_at_caret(&mut self) -> Result<(RichTextTree, RichTextTree), PlaygroundError> {
        self.mutate(|editor| {
            let after = editor.split_off_at_caret()?;
            Ok((editor.tree().clone(), after))
        })
    }

    fn load(&mut self, tree: RichTextTree) {
        self.editor.load(tree);
    }

    fn subscribe(&mut self, listener: UpdateListener) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, listener));
        id
    }

    fn unsubscribe(&mut self, id: ListenerId) {
        self.listeners.retain(|(other, _)| *other != id);
    }

    fn focus(&mut self) {
        self.focused = true;
    }

    fn blur(&mut self) {
        self.focused = false;
    }

    fn is_focused(&self) -> bool {
        self.focused
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[test]
    fn listeners_fire_on_content_changes_only() {
        let mut handle = PlateHandle::new(RichTextTree::from_text("ab"), EditorConfig::default());
        let calls = Rc::new(Cell::new(0));
        let c = calls.clone();
        let id = handle.subscribe(Rc::new(move |_| c.set(c.get() + 1)));

        handle.move_to_end();
        handle.delete_forward().unwrap();
        assert_eq!(calls.get(), 0);

        handle.insert_text("c").unwrap();
        assert_eq!(calls.get(), 1);

        handle.load(RichTextTree::from_text("x"));
        assert_eq!(calls.get(), 1);

        handle.unsubscribe(id);
        handle.insert_text("y").unwrap();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn unknown_command_is_an_engine_error() {
        let mut handle = PlateHandle::new(RichTextTree::empty(), EditorConfig::default());
        assert!(matches!(
            handle.run_command("nope", None),
            Err(PlaygroundError::Engine(_))
        ));
    }
}
