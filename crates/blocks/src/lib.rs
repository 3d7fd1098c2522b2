//! Block-structured editing on top of `blockpad_plate`.
//!
//! A [`Document`] is an ordered list of blocks, each edited by its own
//! editor session. The [`Playground`] keeps the two in step.

pub mod callback;
pub mod config;
pub mod content;
pub mod document;
pub mod error;
pub mod handle;
pub mod id;
pub mod keys;
pub mod playground;
pub mod registry;
pub mod scheduler;
pub mod unit;

pub use crate::callback::StableCallback;
pub use crate::config::PlaygroundConfig;
pub use crate::content::{Block, BlockContent};
pub use crate::document::Document;
pub use crate::error::PlaygroundError;
pub use crate::handle::{
    EditorEngine, EditorHandle, PlateEngine, PlateHandle, SharedHandle, WeakHandle,
};
pub use crate::id::BlockId;
pub use crate::keys::{KeyEvent, KeyOutcome, Modifiers};
pub use crate::playground::{
    BlockEvent, DragEvent, FocusOutcome, FocusPosition, FocusTarget, Playground,
};
pub use crate::registry::HandleRegistry;
pub use crate::scheduler::{Clock, DeferredQueue, SystemClock, TaskId, VirtualClock};
pub use crate::unit::{BlockCallbacks, BlockUnit, MergeDirection};
