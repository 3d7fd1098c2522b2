use thiserror::Error;

use crate::id::BlockId;

/// Why a playground operation did nothing.
///
/// None of these leave partial state behind; the dispatcher logs them and
/// carries on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaygroundError {
    /// The id or index the intent referred to is gone.
    #[error("stale block reference")]
    StaleReference,

    /// A drag ended without a drop target.
    #[error("drag ended without a drop target")]
    InvalidDropTarget,

    /// The block is in the document but its editor is not mounted.
    #[error("no editor mounted for block {0}")]
    EditorHandleUnavailable(BlockId),

    #[error("editor rejected the edit: {0}")]
    Engine(String),
}

impl From<blockpad_plate::ApplyError> for PlaygroundError {
    fn from(err: blockpad_plate::ApplyError) -> Self {
        Self::Engine(err.to_string())
    }
}
