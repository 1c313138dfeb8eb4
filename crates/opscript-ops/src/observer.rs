//! The worker observer protocol.
//!
//! The worker never talks to a user directly. Everything it wants to show
//! and every question it needs answered goes through a [`WorkerObserver`],
//! which can be backed by dialogs ([`DialogObserver`](crate::DialogObserver)),
//! fixed policies ([`HeadlessObserver`](crate::HeadlessObserver)) or anything
//! else a host provides.

use std::fmt;
use std::io;

use chrono::{DateTime, Utc};
use humansize::{BINARY, format_size};
use opscript_core::{Attributes, Opcode, Operation, OperationStatus};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use crate::decision::{
    ConfirmDecision, DirTimeDecision, FileErrorDecision, IgnoreDecision, RetryIgnoreDecision,
    RetrySkipDecision,
};
use crate::progress::Progress;

/// What the worker is about to do, for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationInfo {
    pub opcode: Opcode,
    pub source: String,
    pub target: Option<String>,
    /// Bytes to transfer, for file transfers.
    pub size: Option<u64>,
}

impl OperationInfo {
    pub fn from_operation(op: &Operation) -> Self {
        Self {
            opcode: op.opcode,
            source: op.source.name.clone(),
            target: op.target.as_ref().map(|t| t.name.clone()),
            size: op.opcode.is_transfer().then_some(op.file_size),
        }
    }
}

impl fmt::Display for OperationInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.opcode.verb(), self.source)?;
        if let Some(target) = &self.target {
            write!(f, " to {target}")?;
        }
        if let Some(size) = self.size {
            write!(f, " ({})", format_size(size, BINARY))?;
        }
        Ok(())
    }
}

/// Symbolic titles and messages for prompts.
///
/// Adapters that localize override the `*_by_id` methods; the defaults use
/// the English text below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize)]
pub enum MessageId {
    #[strum(to_string = "Cannot open source file")]
    CannotOpenSource,
    #[strum(to_string = "Cannot create target file")]
    CannotCreateTarget,
    #[strum(to_string = "Error reading source file")]
    ReadError,
    #[strum(to_string = "Error writing target file")]
    WriteError,
    #[strum(to_string = "Source and target are the same file")]
    SameSourceAndTarget,
    #[strum(to_string = "Cannot remove source file")]
    CannotRemoveSource,
    #[strum(to_string = "Cannot delete")]
    CannotDelete,
    #[strum(to_string = "Cannot create directory")]
    CannotCreateDir,
    #[strum(to_string = "Cannot read directory")]
    CannotListDir,
    #[strum(to_string = "Name is too long")]
    NameTooLong,
    #[strum(to_string = "File is too big for the FAT32 target")]
    FileTooBigForFat32,
    #[strum(to_string = "Cannot read the size of the link target")]
    LinkTargetSize,
    #[strum(to_string = "Target is a hidden, system or read-only file")]
    ConfirmOverwriteProtected,
    #[strum(to_string = "Item is hidden or system")]
    ConfirmDeleteProtected,
    #[strum(to_string = "Directory is not empty")]
    ConfirmDeleteNonEmptyDir,
    #[strum(to_string = "Target cannot hold alternate data streams")]
    ConfirmAdsLoss,
    #[strum(to_string = "Source is a link")]
    ConfirmCopyLinkContent,
    #[strum(to_string = "Do you want to overwrite it?")]
    ActionOverwrite,
    #[strum(to_string = "Do you want to delete it?")]
    ActionDelete,
    #[strum(to_string = "Do you want to copy it without its alternate data streams?")]
    ActionDropStreams,
    #[strum(to_string = "Do you want to copy the file it points to?")]
    ActionCopyLinkContent,
}

/// A platform error code plus its portable kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorCode {
    /// Raw OS error number, if the error came from the OS.
    pub raw: Option<i32>,
    pub kind: io::ErrorKind,
}

impl ErrorCode {
    pub fn new(kind: io::ErrorKind) -> Self {
        Self { raw: None, kind }
    }
}

impl From<&io::Error> for ErrorCode {
    fn from(err: &io::Error) -> Self {
        Self {
            raw: err.raw_os_error(),
            kind: err.kind(),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.raw {
            Some(raw) => write!(f, "{}", io::Error::from_raw_os_error(raw)),
            None => write!(f, "{}", self.kind),
        }
    }
}

/// Size and modification time of one side of an overwrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStamp {
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

impl fmt::Display for FileStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format_size(self.size, BINARY))?;
        if let Some(modified) = self.modified {
            write!(f, ", {}", modified.format("%Y-%m-%d %H:%M:%S"))?;
        }
        Ok(())
    }
}

/// Everything a worker reports to, and asks of, whoever watches it.
///
/// Decision methods return what the user (or policy) chose. Remembering
/// "all" answers is the worker's job, not the observer's.
pub trait WorkerObserver: Send {
    /// Describe the operation about to run.
    fn set_operation_info(&mut self, info: &OperationInfo);

    /// Report progress at an operation boundary. May block while suspended.
    fn set_progress(&mut self, progress: Progress);

    /// Report progress from inside a transfer. Never blocks.
    fn set_progress_without_suspend(&mut self, progress: Progress);

    /// Cooperative pause point.
    fn wait_if_suspended(&mut self);

    fn is_suspended(&self) -> bool {
        false
    }

    /// The status of operation `index` changed.
    fn set_operation_status(&mut self, _index: usize, _status: OperationStatus) {}

    fn is_cancelled(&self) -> bool;

    /// Whether any operation failed. Called once, at the end.
    fn set_error(&mut self, error: bool);

    /// The run is over. Called once, after [`set_error`](Self::set_error).
    fn notify_done(&mut self);

    fn ask_file_error(&mut self, title: &str, file: &str, error: &str) -> FileErrorDecision;

    fn ask_overwrite(
        &mut self,
        source: &str,
        source_info: &str,
        target: &str,
        target_info: &str,
    ) -> ConfirmDecision;

    fn ask_ads_overwrite(
        &mut self,
        source: &str,
        source_info: &str,
        target: &str,
        target_info: &str,
    ) -> ConfirmDecision;

    fn ask_hidden_or_system(&mut self, title: &str, file: &str, action: &str) -> ConfirmDecision;

    fn ask_cannot_move(
        &mut self,
        error: &str,
        source: &str,
        target: &str,
        is_dir: bool,
    ) -> RetrySkipDecision;

    /// Informational; nothing to decide.
    fn notify_error(&mut self, title: &str, file: &str, error: &str);

    fn ask_ads_read_error(&mut self, file: &str, stream: &str) -> IgnoreDecision;

    fn ask_ads_open_error(&mut self, file: &str, stream: &str, error: &str) -> RetryIgnoreDecision;

    fn ask_set_attrs_error(
        &mut self,
        file: &str,
        failed: Attributes,
        current: Attributes,
    ) -> RetryIgnoreDecision;

    fn ask_copy_perm_error(&mut self, source: &str, target: &str, error: &str)
    -> RetryIgnoreDecision;

    fn ask_copy_dir_time_error(&mut self, dir: &str, error: &str) -> DirTimeDecision;

    fn ask_encryption_loss(&mut self, is_encrypted: bool, file: &str, is_dir: bool)
    -> ConfirmDecision;

    fn ask_file_error_by_id(
        &mut self,
        title: MessageId,
        file: &str,
        error: ErrorCode,
    ) -> FileErrorDecision {
        self.ask_file_error(&title.to_string(), file, &error.to_string())
    }

    fn ask_overwrite_by_id(
        &mut self,
        source: &str,
        source_stamp: FileStamp,
        target: &str,
        target_stamp: FileStamp,
    ) -> ConfirmDecision {
        self.ask_overwrite(
            source,
            &source_stamp.to_string(),
            target,
            &target_stamp.to_string(),
        )
    }

    fn ask_ads_overwrite_by_id(
        &mut self,
        source: &str,
        source_stamp: FileStamp,
        target: &str,
        target_stamp: FileStamp,
    ) -> ConfirmDecision {
        self.ask_ads_overwrite(
            source,
            &source_stamp.to_string(),
            target,
            &target_stamp.to_string(),
        )
    }

    fn ask_hidden_or_system_by_id(
        &mut self,
        title: MessageId,
        file: &str,
        action: MessageId,
    ) -> ConfirmDecision {
        self.ask_hidden_or_system(&title.to_string(), file, &action.to_string())
    }

    fn ask_cannot_move_by_id(
        &mut self,
        error: ErrorCode,
        source: &str,
        target: &str,
        is_dir: bool,
    ) -> RetrySkipDecision {
        self.ask_cannot_move(&error.to_string(), source, target, is_dir)
    }

    fn notify_error_by_id(&mut self, title: MessageId, file: &str, error: ErrorCode) {
        self.notify_error(&title.to_string(), file, &error.to_string());
    }

    fn ask_ads_open_error_by_id(
        &mut self,
        file: &str,
        stream: &str,
        error: ErrorCode,
    ) -> RetryIgnoreDecision {
        self.ask_ads_open_error(file, stream, &error.to_string())
    }

    fn ask_copy_perm_error_by_id(
        &mut self,
        source: &str,
        target: &str,
        error: ErrorCode,
    ) -> RetryIgnoreDecision {
        self.ask_copy_perm_error(source, target, &error.to_string())
    }

    fn ask_copy_dir_time_error_by_id(&mut self, dir: &str, error: ErrorCode) -> DirTimeDecision {
        self.ask_copy_dir_time_error(dir, &error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use opscript_core::OpPath;

    #[test]
    fn test_operation_info_display() {
        let op = Operation::new(
            Opcode::CopyFile,
            OpPath::new("/s/a.txt", "/s/a.txt"),
            Attributes::ARCHIVE,
            2048,
        )
        .with_target(OpPath::new("/t/a.txt", "/t/a.txt"))
        .with_file_size(2048);

        let info = OperationInfo::from_operation(&op);
        assert_eq!(info.to_string(), "Copying /s/a.txt to /t/a.txt (2 KiB)");
    }

    #[test]
    fn test_delete_info_has_no_size() {
        let op = Operation::new(
            Opcode::DeleteDir,
            OpPath::new("/s/d", "/s/d"),
            Attributes::DIRECTORY,
            1024,
        );
        let info = OperationInfo::from_operation(&op);
        assert_eq!(info.size, None);
        assert_eq!(info.to_string(), "Deleting /s/d");
    }

    #[test]
    fn test_error_code_without_os_code() {
        let code = ErrorCode::from(&io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert_eq!(code.raw, None);
        assert_eq!(code.kind, io::ErrorKind::NotFound);
        assert_eq!(code.to_string(), io::ErrorKind::NotFound.to_string());
    }

    #[test]
    fn test_file_stamp_display() {
        let stamp = FileStamp {
            size: 1024,
            modified: Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap()),
        };
        assert_eq!(stamp.to_string(), "1 KiB, 2024-03-01 12:30:00");
    }
}
