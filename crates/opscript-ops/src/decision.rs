//! Answers an observer can give when the worker asks about a failure.
//!
//! Each prompt has its own closed set of answers. Variants ending in `All`
//! apply to the rest of the run; the worker records them in
//! [`BuildState`](opscript_core::BuildState) and stops asking.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

/// Answer to a generic I/O failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize)]
pub enum FileErrorDecision {
    /// Try the failed step again.
    Retry,
    /// Abandon this operation.
    Skip,
    /// Abandon this and every later operation failing the same way.
    #[strum(to_string = "Skip all")]
    SkipAll,
    /// Carry on as if the step had succeeded.
    Ignore,
    /// Stop the whole script.
    Cancel,
}

/// Answer to a yes/no confirmation (overwrite, protected file, data loss).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize)]
pub enum ConfirmDecision {
    Yes,
    #[strum(to_string = "Yes to all")]
    YesAll,
    Skip,
    #[strum(to_string = "Skip all")]
    SkipAll,
    Cancel,
}

impl ConfirmDecision {
    /// Check if this decision applies to all remaining prompts of its class.
    pub fn is_global(&self) -> bool {
        matches!(self, Self::YesAll | Self::SkipAll | Self::Cancel)
    }

    /// Convert a global decision to its single-item equivalent.
    pub fn to_single(&self) -> Self {
        match self {
            Self::YesAll => Self::Yes,
            Self::SkipAll => Self::Skip,
            _ => *self,
        }
    }
}

/// Answer to a failed rename or move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize)]
pub enum RetrySkipDecision {
    Retry,
    Skip,
    #[strum(to_string = "Skip all")]
    SkipAll,
    Cancel,
}

/// Answer to an alternate stream read failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize)]
pub enum IgnoreDecision {
    Skip,
    #[strum(to_string = "Skip all")]
    SkipAll,
    Ignore,
    #[strum(to_string = "Ignore all")]
    IgnoreAll,
    Cancel,
}

/// Answer to a stream open failure or a post-copy metadata failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize)]
pub enum RetryIgnoreDecision {
    Retry,
    Skip,
    #[strum(to_string = "Skip all")]
    SkipAll,
    Ignore,
    #[strum(to_string = "Ignore all")]
    IgnoreAll,
    Cancel,
}

/// Answer to a failure setting a directory timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize)]
pub enum DirTimeDecision {
    Retry,
    Ignore,
    #[strum(to_string = "Ignore all")]
    IgnoreAll,
    Cancel,
}
