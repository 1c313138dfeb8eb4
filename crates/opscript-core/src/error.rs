//! Error types for script building.

use thiserror::Error;

use crate::Action;

/// Errors that can occur while building an operation script.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The action is not one this builder handles.
    #[error("Unsupported action for script building: {action}")]
    UnsupportedAction { action: Action },

    /// An operation could not be allocated or appended.
    #[error("Out of memory while building the operation script")]
    OutOfMemory,
}

impl BuildError {
    /// Check if the error comes from the requested action rather than resources.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::UnsupportedAction { .. })
    }
}
