//! Observer that answers from fixed policies and records every call.

use std::collections::{HashMap, VecDeque};

use opscript_core::{Attributes, OperationStatus};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use tracing::debug;

use crate::control::WorkerControl;
use crate::decision::{
    ConfirmDecision, DirTimeDecision, FileErrorDecision, IgnoreDecision, RetryIgnoreDecision,
    RetrySkipDecision,
};
use crate::observer::{OperationInfo, WorkerObserver};
use crate::progress::Progress;

/// Retries a standing policy gets on one question before it becomes Skip.
pub const HEADLESS_RETRY_LIMIT: usize = 3;

/// A canned answer. Mapped onto whatever the asked question allows.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DialogPolicy {
    Skip,
    SkipAll,
    Retry,
    Yes,
    YesAll,
    No,
    Cancel,
    Ignore,
    IgnoreAll,
}

/// Observer calls, as recorded in the call log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallKind {
    OperationInfo,
    FileError,
    Overwrite,
    AdsOverwrite,
    HiddenOrSystem,
    CannotMove,
    NotifyError,
    AdsReadError,
    AdsOpenError,
    SetAttrsError,
    CopyPermError,
    CopyDirTimeError,
    EncryptionLoss,
    SetError,
    Done,
}

/// One recorded observer call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObserverCall {
    pub kind: CallKind,
    /// Main subject, usually the file.
    pub arg1: String,
    /// Secondary detail: target, stream or error text.
    pub arg2: String,
    /// The decision returned, for questions.
    pub answer: Option<String>,
}

/// [`WorkerObserver`] for tests and unattended runs.
///
/// Questions are answered from a per-kind queue of scripted answers first,
/// then from the kind's policy. Progress updates are counted but not logged.
/// A question answered Retry more than [`HEADLESS_RETRY_LIMIT`] times in a
/// row within one operation is answered Skip instead.
#[derive(Debug)]
pub struct HeadlessObserver {
    policies: HashMap<CallKind, DialogPolicy>,
    answers: HashMap<CallKind, VecDeque<DialogPolicy>>,
    calls: Vec<ObserverCall>,
    retries: HashMap<CallKind, usize>,
    statuses: Vec<(usize, OperationStatus)>,
    control: WorkerControl,
    cancel_after: Option<usize>,
    progress_updates: usize,
    operations_finished: usize,
    last_progress: Option<Progress>,
    last_operation: Option<OperationInfo>,
    error: Option<bool>,
    done: bool,
}

impl Default for HeadlessObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessObserver {
    pub fn new() -> Self {
        Self::with_control(WorkerControl::new())
    }

    /// Share cancellation and suspension with a host.
    pub fn with_control(control: WorkerControl) -> Self {
        Self {
            policies: HashMap::new(),
            answers: HashMap::new(),
            calls: Vec::new(),
            retries: HashMap::new(),
            statuses: Vec::new(),
            control,
            cancel_after: None,
            progress_updates: 0,
            operations_finished: 0,
            last_progress: None,
            last_operation: None,
            error: None,
            done: false,
        }
    }

    /// Set the standing answer for one kind of question.
    pub fn with_policy(mut self, kind: CallKind, policy: DialogPolicy) -> Self {
        self.policies.insert(kind, policy);
        self
    }

    /// Queue a one-off answer, used before the standing policy.
    pub fn push_answer(&mut self, kind: CallKind, answer: DialogPolicy) {
        self.answers.entry(kind).or_default().push_back(answer);
    }

    /// Cancel once `count` operations have finished.
    pub fn cancel_after(mut self, count: usize) -> Self {
        self.cancel_after = Some(count);
        self
    }

    pub fn control(&self) -> &WorkerControl {
        &self.control
    }

    /// Standing answer for `kind`.
    ///
    /// Stream, attribute, permission and directory time questions follow the
    /// file error policy unless set; stream overwrites follow overwrites.
    pub fn policy(&self, kind: CallKind) -> DialogPolicy {
        if let Some(policy) = self.policies.get(&kind) {
            return *policy;
        }
        match kind {
            CallKind::Overwrite | CallKind::HiddenOrSystem | CallKind::EncryptionLoss => {
                DialogPolicy::Yes
            }
            CallKind::AdsOverwrite => self.policy(CallKind::Overwrite),
            CallKind::AdsReadError
            | CallKind::AdsOpenError
            | CallKind::SetAttrsError
            | CallKind::CopyPermError
            | CallKind::CopyDirTimeError => self.policy(CallKind::FileError),
            _ => DialogPolicy::Skip,
        }
    }

    pub fn calls(&self) -> &[ObserverCall] {
        &self.calls
    }

    /// Number of logged calls of one kind.
    pub fn count(&self, kind: CallKind) -> usize {
        self.calls.iter().filter(|call| call.kind == kind).count()
    }

    /// Every status change the worker reported, in order.
    pub fn status_changes(&self) -> &[(usize, OperationStatus)] {
        &self.statuses
    }

    pub fn progress_updates(&self) -> usize {
        self.progress_updates
    }

    pub fn last_progress(&self) -> Option<Progress> {
        self.last_progress
    }

    pub fn last_operation(&self) -> Option<&OperationInfo> {
        self.last_operation.as_ref()
    }

    /// The error flag reported at the end of the run, if it ended.
    pub fn error(&self) -> Option<bool> {
        self.error
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    fn answer(&mut self, kind: CallKind) -> DialogPolicy {
        let answer = self
            .answers
            .get_mut(&kind)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| self.policy(kind));
        if answer != DialogPolicy::Retry {
            self.retries.remove(&kind);
            return answer;
        }
        let retries = self.retries.entry(kind).or_default();
        *retries += 1;
        if *retries > HEADLESS_RETRY_LIMIT {
            debug!(%kind, retries = HEADLESS_RETRY_LIMIT, "Giving up retrying");
            self.retries.remove(&kind);
            return DialogPolicy::Skip;
        }
        answer
    }

    fn record(&mut self, kind: CallKind, arg1: &str, arg2: &str, answer: Option<String>) {
        self.calls.push(ObserverCall {
            kind,
            arg1: arg1.to_string(),
            arg2: arg2.to_string(),
            answer,
        });
    }

    fn ask<D>(&mut self, kind: CallKind, arg1: &str, arg2: &str) -> D
    where
        D: From<DialogPolicy> + std::fmt::Display,
    {
        let decision = D::from(self.answer(kind));
        debug!(%kind, file = arg1, %decision, "Answered headless");
        self.record(kind, arg1, arg2, Some(decision.to_string()));
        decision
    }
}

impl From<DialogPolicy> for FileErrorDecision {
    fn from(policy: DialogPolicy) -> Self {
        match policy {
            DialogPolicy::Retry => Self::Retry,
            DialogPolicy::Skip | DialogPolicy::No | DialogPolicy::Yes => Self::Skip,
            DialogPolicy::SkipAll | DialogPolicy::YesAll => Self::SkipAll,
            DialogPolicy::Ignore | DialogPolicy::IgnoreAll => Self::Ignore,
            DialogPolicy::Cancel => Self::Cancel,
        }
    }
}

impl From<DialogPolicy> for ConfirmDecision {
    fn from(policy: DialogPolicy) -> Self {
        match policy {
            DialogPolicy::Yes | DialogPolicy::Retry | DialogPolicy::Ignore => Self::Yes,
            DialogPolicy::YesAll | DialogPolicy::IgnoreAll => Self::YesAll,
            DialogPolicy::Skip | DialogPolicy::No => Self::Skip,
            DialogPolicy::SkipAll => Self::SkipAll,
            DialogPolicy::Cancel => Self::Cancel,
        }
    }
}

impl From<DialogPolicy> for RetrySkipDecision {
    fn from(policy: DialogPolicy) -> Self {
        match policy {
            DialogPolicy::Retry => Self::Retry,
            DialogPolicy::SkipAll | DialogPolicy::YesAll | DialogPolicy::IgnoreAll => {
                Self::SkipAll
            }
            DialogPolicy::Cancel => Self::Cancel,
            _ => Self::Skip,
        }
    }
}

impl From<DialogPolicy> for IgnoreDecision {
    fn from(policy: DialogPolicy) -> Self {
        match policy {
            DialogPolicy::Skip | DialogPolicy::No => Self::Skip,
            DialogPolicy::SkipAll => Self::SkipAll,
            DialogPolicy::Ignore | DialogPolicy::Yes | DialogPolicy::Retry => Self::Ignore,
            DialogPolicy::IgnoreAll | DialogPolicy::YesAll => Self::IgnoreAll,
            DialogPolicy::Cancel => Self::Cancel,
        }
    }
}

impl From<DialogPolicy> for RetryIgnoreDecision {
    fn from(policy: DialogPolicy) -> Self {
        match policy {
            DialogPolicy::Retry => Self::Retry,
            DialogPolicy::Skip | DialogPolicy::No => Self::Skip,
            DialogPolicy::SkipAll => Self::SkipAll,
            DialogPolicy::Ignore | DialogPolicy::Yes => Self::Ignore,
            DialogPolicy::IgnoreAll | DialogPolicy::YesAll => Self::IgnoreAll,
            DialogPolicy::Cancel => Self::Cancel,
        }
    }
}

impl From<DialogPolicy> for DirTimeDecision {
    fn from(policy: DialogPolicy) -> Self {
        match policy {
            DialogPolicy::Retry => Self::Retry,
            DialogPolicy::IgnoreAll | DialogPolicy::SkipAll | DialogPolicy::YesAll => {
                Self::IgnoreAll
            }
            DialogPolicy::Cancel => Self::Cancel,
            _ => Self::Ignore,
        }
    }
}

impl WorkerObserver for HeadlessObserver {
    fn set_operation_info(&mut self, info: &OperationInfo) {
        let target = info.target.clone().unwrap_or_default();
        self.record(CallKind::OperationInfo, &info.source, &target, None);
        self.last_operation = Some(info.clone());
        self.retries.clear();
    }

    fn set_operation_status(&mut self, index: usize, status: OperationStatus) {
        self.statuses.push((index, status));
    }

    /// Called once per finished operation.
    fn set_progress(&mut self, progress: Progress) {
        self.progress_updates += 1;
        self.operations_finished += 1;
        self.last_progress = Some(progress);
        if self
            .cancel_after
            .is_some_and(|limit| self.operations_finished >= limit)
        {
            debug!(operations = self.operations_finished, "Cancelling headless run");
            self.control.cancel();
        }
    }

    fn set_progress_without_suspend(&mut self, progress: Progress) {
        self.progress_updates += 1;
        self.last_progress = Some(progress);
    }

    fn wait_if_suspended(&mut self) {
        self.control.wait_if_suspended();
    }

    fn is_suspended(&self) -> bool {
        self.control.is_suspended()
    }

    fn is_cancelled(&self) -> bool {
        self.control.is_cancelled()
    }

    fn set_error(&mut self, error: bool) {
        self.record(CallKind::SetError, &error.to_string(), "", None);
        self.error = Some(error);
    }

    fn notify_done(&mut self) {
        self.record(CallKind::Done, "", "", None);
        self.done = true;
    }

    fn ask_file_error(&mut self, title: &str, file: &str, error: &str) -> FileErrorDecision {
        self.ask(CallKind::FileError, file, &format!("{title}: {error}"))
    }

    fn ask_overwrite(
        &mut self,
        source: &str,
        _source_info: &str,
        target: &str,
        _target_info: &str,
    ) -> ConfirmDecision {
        self.ask(CallKind::Overwrite, source, target)
    }

    fn ask_ads_overwrite(
        &mut self,
        source: &str,
        _source_info: &str,
        target: &str,
        _target_info: &str,
    ) -> ConfirmDecision {
        self.ask(CallKind::AdsOverwrite, source, target)
    }

    fn ask_hidden_or_system(&mut self, title: &str, file: &str, _action: &str) -> ConfirmDecision {
        self.ask(CallKind::HiddenOrSystem, file, title)
    }

    fn ask_cannot_move(
        &mut self,
        error: &str,
        source: &str,
        _target: &str,
        _is_dir: bool,
    ) -> RetrySkipDecision {
        self.ask(CallKind::CannotMove, source, error)
    }

    fn notify_error(&mut self, title: &str, file: &str, error: &str) {
        self.record(CallKind::NotifyError, file, &format!("{title}: {error}"), None);
    }

    fn ask_ads_read_error(&mut self, file: &str, stream: &str) -> IgnoreDecision {
        self.ask(CallKind::AdsReadError, file, stream)
    }

    fn ask_ads_open_error(
        &mut self,
        file: &str,
        stream: &str,
        _error: &str,
    ) -> RetryIgnoreDecision {
        self.ask(CallKind::AdsOpenError, file, stream)
    }

    fn ask_set_attrs_error(
        &mut self,
        file: &str,
        failed: Attributes,
        _current: Attributes,
    ) -> RetryIgnoreDecision {
        self.ask(CallKind::SetAttrsError, file, &failed.to_string())
    }

    fn ask_copy_perm_error(
        &mut self,
        source: &str,
        _target: &str,
        error: &str,
    ) -> RetryIgnoreDecision {
        self.ask(CallKind::CopyPermError, source, error)
    }

    fn ask_copy_dir_time_error(&mut self, dir: &str, error: &str) -> DirTimeDecision {
        self.ask(CallKind::CopyDirTimeError, dir, error)
    }

    fn ask_encryption_loss(
        &mut self,
        _is_encrypted: bool,
        file: &str,
        is_dir: bool,
    ) -> ConfirmDecision {
        let what = if is_dir { "directory" } else { "file" };
        self.ask(CallKind::EncryptionLoss, file, what)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policies() {
        let observer = HeadlessObserver::new();
        assert_eq!(observer.policy(CallKind::FileError), DialogPolicy::Skip);
        assert_eq!(observer.policy(CallKind::Overwrite), DialogPolicy::Yes);
        assert_eq!(observer.policy(CallKind::HiddenOrSystem), DialogPolicy::Yes);
        assert_eq!(observer.policy(CallKind::CannotMove), DialogPolicy::Skip);
        assert_eq!(observer.policy(CallKind::EncryptionLoss), DialogPolicy::Yes);
    }

    #[test]
    fn test_fallback_policies_follow_their_family() {
        let observer = HeadlessObserver::new()
            .with_policy(CallKind::FileError, DialogPolicy::Cancel)
            .with_policy(CallKind::Overwrite, DialogPolicy::SkipAll);
        assert_eq!(observer.policy(CallKind::CopyPermError), DialogPolicy::Cancel);
        assert_eq!(observer.policy(CallKind::CopyDirTimeError), DialogPolicy::Cancel);
        assert_eq!(observer.policy(CallKind::AdsOverwrite), DialogPolicy::SkipAll);
    }

    #[test]
    fn test_queued_answers_come_first() {
        let mut observer =
            HeadlessObserver::new().with_policy(CallKind::FileError, DialogPolicy::SkipAll);
        observer.push_answer(CallKind::FileError, DialogPolicy::Retry);

        let first = observer.ask_file_error("Cannot delete", "a.txt", "denied");
        let second = observer.ask_file_error("Cannot delete", "a.txt", "denied");
        assert_eq!(first, FileErrorDecision::Retry);
        assert_eq!(second, FileErrorDecision::SkipAll);
        assert_eq!(observer.count(CallKind::FileError), 2);
        assert_eq!(observer.calls()[0].answer.as_deref(), Some("Retry"));
    }

    #[test]
    fn test_standing_retry_gives_up() {
        let mut observer =
            HeadlessObserver::new().with_policy(CallKind::FileError, DialogPolicy::Retry);
        let answers: Vec<_> = (0..=HEADLESS_RETRY_LIMIT)
            .map(|_| observer.ask_file_error("Cannot delete", "a.txt", "denied"))
            .collect();

        assert!(answers[..HEADLESS_RETRY_LIMIT].iter().all(|d| *d == FileErrorDecision::Retry));
        assert_eq!(answers[HEADLESS_RETRY_LIMIT], FileErrorDecision::Skip);
    }

    #[test]
    fn test_retry_count_resets_per_operation() {
        let mut observer =
            HeadlessObserver::new().with_policy(CallKind::FileError, DialogPolicy::Retry);
        for _ in 0..HEADLESS_RETRY_LIMIT {
            observer.ask_file_error("Cannot delete", "a.txt", "denied");
        }
        observer.set_operation_info(&OperationInfo {
            opcode: opscript_core::Opcode::DeleteFile,
            source: "b.txt".into(),
            target: None,
            size: None,
        });
        let decision = observer.ask_file_error("Cannot delete", "b.txt", "denied");
        assert_eq!(decision, FileErrorDecision::Retry);
    }

    #[test]
    fn test_cancel_after_counts_finished_operations() {
        let mut observer = HeadlessObserver::new().cancel_after(2);
        observer.set_progress_without_suspend(Progress::new(500, 100));
        observer.set_progress(Progress::new(1000, 500));
        assert!(!observer.is_cancelled());
        observer.set_progress(Progress::new(1000, 1000));
        assert!(observer.is_cancelled());
        assert_eq!(observer.progress_updates(), 3);
    }

    #[test]
    fn test_policy_parses_from_text() {
        assert_eq!("skip_all".parse::<DialogPolicy>().unwrap(), DialogPolicy::SkipAll);
        assert_eq!(DialogPolicy::IgnoreAll.to_string(), "ignore_all");
        assert!("maybe".parse::<DialogPolicy>().is_err());
    }

    #[test]
    fn test_dir_time_has_no_skip() {
        assert_eq!(DirTimeDecision::from(DialogPolicy::Skip), DirTimeDecision::Ignore);
        assert_eq!(DirTimeDecision::from(DialogPolicy::SkipAll), DirTimeDecision::IgnoreAll);
    }
}
