//! Operation script engine for opscript.
//!
//! This crate turns a selection snapshot into an operation script
//! ([`build`]) and executes the script on a dedicated worker thread
//! ([`spawn_worker`], or [`run_script`] in place). The worker reports to and
//! asks a [`WorkerObserver`]: [`DialogObserver`] bridges it to an async
//! dialog host over channels, [`HeadlessObserver`] answers from fixed
//! policies and records the calls.

mod builder;
mod control;
mod copy;
mod create;
mod decision;
mod delete;
mod dialog;
mod fs;
mod headless;
mod move_op;
mod observer;
mod progress;
mod worker;

pub use builder::{build, build_into};
pub use control::WorkerControl;
pub use copy::{COPY_BUFFER_SIZE, FAT32_MAX_FILE_SIZE};
pub use decision::{
    ConfirmDecision, DirTimeDecision, FileErrorDecision, IgnoreDecision, RetryIgnoreDecision,
    RetrySkipDecision,
};
pub use dialog::{
    Button, DIALOG_CHANNEL_SIZE, DialogEvent, DialogKind, DialogObserver, DialogRequest,
    dialog_channel,
};
pub use fs::{EntryInfo, FileSystem, StdFileSystem};
pub use headless::{CallKind, DialogPolicy, HEADLESS_RETRY_LIMIT, HeadlessObserver, ObserverCall};
pub use observer::{ErrorCode, FileStamp, MessageId, OperationInfo, WorkerObserver};
pub use progress::{PROGRESS_INTERVAL, PROGRESS_SCALE, Progress, RunSummary, WorkerOutcome};
pub use worker::{WorkerError, WorkerHandle, WorkerReport, run_script, spawn_worker};
