//! Operation types: one step of an operation script.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use crate::Attributes;

/// Smallest progress weight of a file transfer.
pub const COPY_MIN_FILE_WEIGHT: u64 = 1024;
/// Progress weight of a file deletion.
pub const DELETE_FILE_WEIGHT: u64 = 1024;
/// Progress weight of a directory deletion.
pub const DELETE_DIR_WEIGHT: u64 = 1024;
/// Progress weight of a directory link deletion.
pub const DELETE_DIR_LINK_WEIGHT: u64 = 1024;
/// Progress weight of a directory creation.
pub const CREATE_DIR_WEIGHT: u64 = 1024;

/// The kind of a single operation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Opcode {
    #[strum(to_string = "Copy file")]
    CopyFile,
    #[strum(to_string = "Move file")]
    MoveFile,
    #[strum(to_string = "Delete file")]
    DeleteFile,
    #[strum(to_string = "Delete directory")]
    DeleteDir,
    #[strum(to_string = "Delete directory link")]
    DeleteDirLink,
    #[strum(to_string = "Create directory")]
    CreateDir,
}

impl Opcode {
    /// Check if this opcode transfers file content.
    pub fn is_transfer(self) -> bool {
        matches!(self, Self::CopyFile | Self::MoveFile)
    }

    /// Check if this opcode removes its source.
    pub fn is_delete(self) -> bool {
        matches!(self, Self::DeleteFile | Self::DeleteDir | Self::DeleteDirLink)
    }

    /// Verb shown while the operation runs.
    pub fn verb(self) -> &'static str {
        match self {
            Self::CopyFile => "Copying",
            Self::MoveFile => "Moving",
            Self::DeleteFile | Self::DeleteDir | Self::DeleteDirLink => "Deleting",
            Self::CreateDir => "Creating",
        }
    }

    /// Fixed progress weight, if this opcode has one.
    pub fn fixed_weight(self) -> Option<u64> {
        match self {
            Self::CopyFile | Self::MoveFile => None,
            Self::DeleteFile => Some(DELETE_FILE_WEIGHT),
            Self::DeleteDir => Some(DELETE_DIR_WEIGHT),
            Self::DeleteDirLink => Some(DELETE_DIR_LINK_WEIGHT),
            Self::CreateDir => Some(CREATE_DIR_WEIGHT),
        }
    }
}

/// Execution status of one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    #[default]
    Pending,
    #[strum(to_string = "In progress")]
    InProgress,
    Suspended,
    Done,
    Skipped,
    Failed,
    Cancelled,
}

impl OperationStatus {
    /// Check if the operation reached a final state.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Done | Self::Skipped | Self::Failed | Self::Cancelled
        )
    }
}

/// A path in both its narrow form and its long-path-safe wide form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpPath {
    /// Full path as shown to the user.
    pub name: String,
    /// Full path used for I/O, long-path prefixed where needed.
    pub wide: String,
}

impl OpPath {
    pub fn new(name: impl Into<String>, wide: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            wide: wide.into(),
        }
    }

    /// Path to hand to the file system.
    pub fn io_path(&self) -> &str {
        &self.wide
    }
}

impl std::fmt::Display for OpPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// One step of an operation script.
///
/// Each operation owns its path strings; nothing is shared between steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub opcode: Opcode,
    pub source: OpPath,
    /// Target path (transfers and directory creation only).
    pub target: Option<OpPath>,
    pub attrs: Attributes,
    /// Weight used for proportional progress.
    pub weight: u64,
    /// Real size of the transferred file (0 for other opcodes).
    pub file_size: u64,
    #[serde(default)]
    pub status: OperationStatus,
}

impl Operation {
    /// Create an operation with no target.
    pub fn new(opcode: Opcode, source: OpPath, attrs: Attributes, weight: u64) -> Self {
        Self {
            opcode,
            source,
            target: None,
            attrs,
            weight,
            file_size: 0,
            status: OperationStatus::Pending,
        }
    }

    pub fn with_target(mut self, target: OpPath) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_file_size(mut self, file_size: u64) -> Self {
        self.file_size = file_size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_weights() {
        assert_eq!(Opcode::CopyFile.fixed_weight(), None);
        assert_eq!(Opcode::DeleteFile.fixed_weight(), Some(DELETE_FILE_WEIGHT));
        assert_eq!(Opcode::CreateDir.fixed_weight(), Some(CREATE_DIR_WEIGHT));
    }

    #[test]
    fn test_status_terminal() {
        assert!(!OperationStatus::Pending.is_terminal());
        assert!(!OperationStatus::Suspended.is_terminal());
        assert!(OperationStatus::Skipped.is_terminal());
        assert!(OperationStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_opcode_display() {
        assert_eq!(Opcode::DeleteDirLink.to_string(), "Delete directory link");
        assert_eq!(OperationStatus::InProgress.to_string(), "In progress");
    }
}
