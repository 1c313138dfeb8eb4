//! The worker: executes an operation script one operation at a time.
//!
//! Failures never escape as errors. Each one is put to the observer, and
//! the answer decides whether the step is retried, ignored, the operation
//! abandoned, or the run cancelled. "All" answers are recorded in the
//! caller's [`BuildState`] so the same class of failure is asked once.

use std::collections::HashSet;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use opscript_core::{
    BuildState, ExecutionPolicy, MAX_LONG_PATH, OpPath, Opcode, Operation, OperationScript,
    OperationStatus,
};
use thiserror::Error;
use tracing::{debug, warn};

use crate::decision::{
    ConfirmDecision, DirTimeDecision, FileErrorDecision, RetryIgnoreDecision,
};
use crate::fs::FileSystem;
use crate::observer::{ErrorCode, MessageId, OperationInfo, WorkerObserver};
use crate::progress::{PROGRESS_INTERVAL, PROGRESS_SCALE, Progress, RunSummary, WorkerOutcome};

/// Why an operation stopped before finishing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Halt {
    /// The user declined a confirmation.
    Skipped,
    /// An error was not recovered from.
    Failed,
    /// The run is over.
    Cancelled,
}

pub(crate) type Step<T = ()> = Result<T, Halt>;

/// How to carry on after a negotiated failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Recovery {
    Retry,
    Ignore,
}

/// Accessor for one "apply to all" flag in [`BuildState`].
pub(crate) type Flag = fn(&mut BuildState) -> &mut bool;

/// Errors starting or joining a background worker.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[from] io::Error),

    #[error("Worker thread panicked")]
    Panicked,
}

pub(crate) struct Worker<'a> {
    pub(crate) script: &'a mut OperationScript,
    pub(crate) state: &'a mut BuildState,
    pub(crate) observer: &'a mut dyn WorkerObserver,
    pub(crate) fs: &'a dyn FileSystem,
    pub(crate) policy: ExecutionPolicy,
    pub(crate) is_copy: bool,
    pub(crate) is_copy_or_move: bool,
    pub(crate) bytes_transferred: u64,
    /// Sources already moved away as a whole by a fast directory move.
    pub(crate) moved_dirs: HashSet<String>,
    /// Index of the operation being executed.
    current: usize,
    total_weight: u64,
    weight_done: u64,
}

impl<'a> Worker<'a> {
    pub(crate) fn new(
        script: &'a mut OperationScript,
        state: &'a mut BuildState,
        observer: &'a mut dyn WorkerObserver,
        fs: &'a dyn FileSystem,
    ) -> Self {
        Self {
            policy: script.policy.clone(),
            is_copy: script.is_copy,
            is_copy_or_move: script.is_copy_or_move,
            total_weight: script.total_weight(),
            script,
            state,
            observer,
            fs,
            bytes_transferred: 0,
            moved_dirs: HashSet::new(),
            current: 0,
            weight_done: 0,
        }
    }

    pub(crate) fn run(mut self) -> RunSummary {
        if !self.script.is_good() {
            warn!("Refusing to run an operation script that is not well-formed");
            self.observer.set_error(true);
            self.observer.notify_done();
            return RunSummary::empty(WorkerOutcome::Failed);
        }

        let mut summary = RunSummary::empty(WorkerOutcome::Done);
        let len = self.script.len();

        for index in 0..len {
            self.observer.wait_if_suspended();
            if self.observer.is_cancelled() {
                summary.outcome = WorkerOutcome::Cancelled;
                summary.cancelled = len - index;
                break;
            }

            let Some(op) = self.script.get(index).cloned() else {
                break;
            };

            self.current = index;
            self.set_status(index, OperationStatus::InProgress);
            self.observer
                .set_operation_info(&OperationInfo::from_operation(&op));
            debug!(index, opcode = %op.opcode, source = %op.source, "Executing operation");

            let status = match self.execute(&op) {
                Ok(()) => OperationStatus::Done,
                Err(Halt::Skipped) => OperationStatus::Skipped,
                Err(Halt::Failed) => OperationStatus::Failed,
                Err(Halt::Cancelled) => OperationStatus::Cancelled,
            };
            self.set_status(index, status);

            match status {
                OperationStatus::Done => summary.done += 1,
                OperationStatus::Skipped => summary.skipped += 1,
                OperationStatus::Failed => {
                    warn!(index, source = %op.source, "Operation failed");
                    summary.failed += 1;
                }
                _ => {
                    summary.outcome = WorkerOutcome::Cancelled;
                    summary.cancelled = len - index;
                    break;
                }
            }

            self.weight_done += op.weight;
            let progress = Progress::new(PROGRESS_SCALE, self.summary_progress(0));
            self.observer.set_progress(progress);
            self.state.mark_interaction();
        }

        if summary.outcome == WorkerOutcome::Done && summary.failed > 0 {
            summary.outcome = WorkerOutcome::Failed;
        }
        summary.bytes_transferred = self.bytes_transferred;
        summary.weight_done = self.weight_done;

        debug!(
            outcome = %summary.outcome,
            done = summary.done,
            skipped = summary.skipped,
            failed = summary.failed,
            "Operation script finished"
        );
        self.observer.set_error(summary.failed > 0);
        self.observer.notify_done();
        summary
    }

    fn set_status(&mut self, index: usize, status: OperationStatus) {
        self.script.set_status(index, status);
        self.observer.set_operation_status(index, status);
    }

    /// Cooperative pause and cancel point inside an operation.
    ///
    /// The operation shows as suspended for as long as the wait lasts.
    pub(crate) fn checkpoint(&mut self) -> Step {
        if self.observer.is_suspended() {
            debug!(index = self.current, "Suspended");
            self.set_status(self.current, OperationStatus::Suspended);
            self.observer.wait_if_suspended();
            self.set_status(self.current, OperationStatus::InProgress);
        }
        if self.observer.is_cancelled() {
            return Err(Halt::Cancelled);
        }
        Ok(())
    }

    fn execute(&mut self, op: &Operation) -> Step {
        match op.opcode {
            Opcode::CopyFile => self.copy_file(op),
            Opcode::MoveFile => self.move_file(op),
            Opcode::DeleteFile => self.delete_file(op),
            Opcode::DeleteDir => self.delete_dir(op),
            Opcode::DeleteDirLink => self.delete_dir_link(op),
            Opcode::CreateDir => self.create_dir(op),
        }
    }

    fn summary_progress(&self, current_weight: u64) -> u32 {
        Progress::ratio(self.weight_done + current_weight, self.total_weight)
    }

    /// Report progress from inside a transfer, at most once per interval.
    pub(crate) fn report_transfer(&mut self, done: u64, size: u64, weight: u64) {
        if done < size && self.state.since_interaction() < PROGRESS_INTERVAL {
            return;
        }
        let current_weight = if size == 0 {
            weight
        } else {
            (u128::from(weight) * u128::from(done.min(size)) / u128::from(size)) as u64
        };
        let progress = Progress::new(
            Progress::ratio(done, size),
            self.summary_progress(current_weight),
        );
        self.observer.set_progress_without_suspend(progress);
        self.state.mark_interaction();
    }

    /// Ask the observer to resolve an I/O failure, honoring `skip_all`.
    pub(crate) fn file_error_with(
        &mut self,
        skip_all: Flag,
        title: MessageId,
        path: &str,
        err: &io::Error,
    ) -> Step<Recovery> {
        warn!(path, error = %err, "{title}");
        if *skip_all(self.state) {
            return Err(Halt::Failed);
        }
        self.checkpoint()?;

        let decision = self
            .observer
            .ask_file_error_by_id(title, path, ErrorCode::from(err));
        self.state.mark_interaction();

        match decision {
            FileErrorDecision::Retry => Ok(Recovery::Retry),
            FileErrorDecision::Ignore => Ok(Recovery::Ignore),
            FileErrorDecision::Skip => Err(Halt::Failed),
            FileErrorDecision::SkipAll => {
                *skip_all(self.state) = true;
                Err(Halt::Failed)
            }
            FileErrorDecision::Cancel => Err(Halt::Cancelled),
        }
    }

    pub(crate) fn file_error(
        &mut self,
        title: MessageId,
        path: &str,
        err: &io::Error,
    ) -> Step<Recovery> {
        self.file_error_with(|s| &mut s.file_error_skip_all, title, path, err)
    }

    /// Run `f` until it succeeds, negotiating each failure.
    ///
    /// Returns `None` if the user chose to ignore the failure.
    pub(crate) fn io_retry<T>(
        &mut self,
        title: MessageId,
        path: &str,
        mut f: impl FnMut(&dyn FileSystem) -> io::Result<T>,
    ) -> Step<Option<T>> {
        loop {
            match f(self.fs) {
                Ok(value) => return Ok(Some(value)),
                Err(err) => match self.file_error(title, path, &err)? {
                    Recovery::Retry => continue,
                    Recovery::Ignore => return Ok(None),
                },
            }
        }
    }

    /// Report a condition that retrying cannot fix. Ignore proceeds anyway.
    pub(crate) fn refuse(
        &mut self,
        skip_all: Flag,
        title: MessageId,
        path: &str,
        err: io::Error,
    ) -> Step {
        match self.file_error_with(skip_all, title, path, &err)? {
            Recovery::Ignore => Ok(()),
            Recovery::Retry => Err(Halt::Failed),
        }
    }

    pub(crate) fn check_name_length(&mut self, path: &str, skip_all: Flag) -> Step {
        if path.chars().count() <= MAX_LONG_PATH {
            return Ok(());
        }
        let err = io::Error::new(io::ErrorKind::InvalidInput, "path exceeds the maximum length");
        self.refuse(skip_all, MessageId::NameTooLong, path, err)
    }

    /// Ask a yes/no confirmation, honoring its "all" flags.
    pub(crate) fn confirm(
        &mut self,
        all: Flag,
        skip_all: Flag,
        ask: impl FnOnce(&mut dyn WorkerObserver) -> ConfirmDecision,
    ) -> Step {
        if *all(self.state) {
            return Ok(());
        }
        if *skip_all(self.state) {
            return Err(Halt::Skipped);
        }
        self.checkpoint()?;

        let decision = ask(&mut *self.observer);
        self.state.mark_interaction();

        match decision {
            ConfirmDecision::Yes => Ok(()),
            ConfirmDecision::YesAll => {
                *all(self.state) = true;
                Ok(())
            }
            ConfirmDecision::Skip => Err(Halt::Skipped),
            ConfirmDecision::SkipAll => {
                *skip_all(self.state) = true;
                Err(Halt::Skipped)
            }
            ConfirmDecision::Cancel => Err(Halt::Cancelled),
        }
    }

    /// Negotiate a failure whose answers include ignoring it.
    pub(crate) fn retry_ignore(
        &mut self,
        skip_all: Flag,
        ignore_all: Flag,
        ask: impl FnOnce(&mut dyn WorkerObserver) -> RetryIgnoreDecision,
    ) -> Step<Recovery> {
        if *ignore_all(self.state) {
            return Ok(Recovery::Ignore);
        }
        if *skip_all(self.state) {
            return Err(Halt::Failed);
        }
        self.checkpoint()?;

        let decision = ask(&mut *self.observer);
        self.state.mark_interaction();

        match decision {
            RetryIgnoreDecision::Retry => Ok(Recovery::Retry),
            RetryIgnoreDecision::Ignore => Ok(Recovery::Ignore),
            RetryIgnoreDecision::IgnoreAll => {
                *ignore_all(self.state) = true;
                Ok(Recovery::Ignore)
            }
            RetryIgnoreDecision::Skip => Err(Halt::Failed),
            RetryIgnoreDecision::SkipAll => {
                *skip_all(self.state) = true;
                Err(Halt::Failed)
            }
            RetryIgnoreDecision::Cancel => Err(Halt::Cancelled),
        }
    }

    pub(crate) fn dir_time_error(&mut self, dir: &str, err: &io::Error) -> Step<Recovery> {
        warn!(dir, error = %err, "Cannot set directory time");
        if self.state.dir_time_ignore_all {
            return Ok(Recovery::Ignore);
        }
        self.checkpoint()?;

        let decision = self
            .observer
            .ask_copy_dir_time_error_by_id(dir, ErrorCode::from(err));
        self.state.mark_interaction();

        match decision {
            DirTimeDecision::Retry => Ok(Recovery::Retry),
            DirTimeDecision::Ignore => Ok(Recovery::Ignore),
            DirTimeDecision::IgnoreAll => {
                self.state.dir_time_ignore_all = true;
                Ok(Recovery::Ignore)
            }
            DirTimeDecision::Cancel => Err(Halt::Cancelled),
        }
    }
}

/// Target path of a transfer or directory creation.
pub(crate) fn target_of(op: &Operation) -> Step<&OpPath> {
    op.target.as_ref().ok_or_else(|| {
        warn!(opcode = %op.opcode, source = %op.source, "Operation has no target");
        Halt::Failed
    })
}

/// Execute `script` to completion on the current thread.
///
/// Everything the run has to say goes through `observer`; the returned
/// summary is for the caller's bookkeeping. Per-operation status is
/// recorded in `script`, "apply to all" decisions in `state`.
pub fn run_script(
    script: &mut OperationScript,
    state: &mut BuildState,
    observer: &mut dyn WorkerObserver,
    fs: &dyn FileSystem,
) -> RunSummary {
    Worker::new(script, state, observer, fs).run()
}

/// Everything a background worker hands back when it finishes.
#[derive(Debug)]
pub struct WorkerReport<O> {
    pub summary: RunSummary,
    pub script: OperationScript,
    pub state: BuildState,
    pub observer: O,
}

/// Handle to a worker running on its own thread.
#[derive(Debug)]
pub struct WorkerHandle<O> {
    thread: JoinHandle<WorkerReport<O>>,
}

impl<O> WorkerHandle<O> {
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the worker to finish.
    pub fn join(self) -> Result<WorkerReport<O>, WorkerError> {
        self.thread.join().map_err(|_| WorkerError::Panicked)
    }
}

/// Run `script` on a dedicated worker thread.
pub fn spawn_worker<O>(
    mut script: OperationScript,
    mut state: BuildState,
    mut observer: O,
    fs: Arc<dyn FileSystem>,
) -> Result<WorkerHandle<O>, WorkerError>
where
    O: WorkerObserver + 'static,
{
    let thread = thread::Builder::new()
        .name("opscript-worker".to_string())
        .spawn(move || {
            let summary = run_script(&mut script, &mut state, &mut observer, fs.as_ref());
            WorkerReport {
                summary,
                script,
                state,
                observer,
            }
        })?;

    Ok(WorkerHandle { thread })
}
