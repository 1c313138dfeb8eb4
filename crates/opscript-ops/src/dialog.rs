//! Observer that bridges the worker to a dialog host.
//!
//! Every question becomes a [`DialogRequest`]: a dialog number, its text
//! slots and a reply channel for the button the user pressed. The worker
//! thread blocks on the reply; the host side is async and can live on any
//! runtime. A host that goes away is treated as a cancel.

use opscript_core::{Attributes, OperationStatus};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};
use tokio::sync::{mpsc, oneshot};
use tracing::{trace, warn};

use crate::control::WorkerControl;
use crate::decision::{
    ConfirmDecision, DirTimeDecision, FileErrorDecision, IgnoreDecision, RetryIgnoreDecision,
    RetrySkipDecision,
};
use crate::observer::{OperationInfo, WorkerObserver};
use crate::progress::Progress;

/// Default channel buffer size for dialog events.
pub const DIALOG_CHANNEL_SIZE: usize = 100;

/// The dialogs a worker can raise, by number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize)]
#[repr(u8)]
pub enum DialogKind {
    #[strum(to_string = "File error")]
    FileError = 0,
    #[strum(to_string = "Overwrite")]
    Overwrite = 1,
    #[strum(to_string = "Overwrite streams")]
    AdsOverwrite = 2,
    #[strum(to_string = "Hidden or system")]
    HiddenOrSystem = 3,
    #[strum(to_string = "Cannot move file")]
    CannotMoveFile = 4,
    #[strum(to_string = "Cannot move directory")]
    CannotMoveDir = 5,
    #[strum(to_string = "Error")]
    Error = 6,
    #[strum(to_string = "Stream read error")]
    AdsReadError = 7,
    #[strum(to_string = "Stream open error")]
    AdsOpenError = 8,
    #[strum(to_string = "Set attributes error")]
    SetAttrsError = 9,
    #[strum(to_string = "Copy permissions error")]
    CopyPermError = 10,
    #[strum(to_string = "Directory time error")]
    CopyDirTimeError = 11,
    #[strum(to_string = "Encryption loss")]
    EncryptionLoss = 12,
}

impl DialogKind {
    /// The dialog number a host looks its resources up by.
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Buttons this dialog offers.
    pub fn buttons(self) -> &'static [Button] {
        use Button as B;
        match self {
            Self::FileError => &[B::Retry, B::Skip, B::SkipAll, B::Ignore, B::Cancel],
            Self::Overwrite | Self::AdsOverwrite | Self::HiddenOrSystem | Self::EncryptionLoss => {
                &[B::Yes, B::YesAll, B::Skip, B::SkipAll, B::Cancel]
            }
            Self::CannotMoveFile | Self::CannotMoveDir => {
                &[B::Retry, B::Skip, B::SkipAll, B::Cancel]
            }
            Self::Error => &[B::Ok],
            Self::AdsReadError => &[B::Skip, B::SkipAll, B::Ignore, B::IgnoreAll, B::Cancel],
            Self::AdsOpenError | Self::SetAttrsError | Self::CopyPermError => {
                &[B::Retry, B::Skip, B::SkipAll, B::Ignore, B::IgnoreAll, B::Cancel]
            }
            Self::CopyDirTimeError => &[B::Retry, B::Ignore, B::IgnoreAll, B::Cancel],
        }
    }
}

/// A dialog button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize)]
pub enum Button {
    Ok,
    Yes,
    #[strum(to_string = "Yes to all")]
    YesAll,
    Retry,
    Skip,
    #[strum(to_string = "Skip all")]
    SkipAll,
    Ignore,
    #[strum(to_string = "Ignore all")]
    IgnoreAll,
    Cancel,
}

/// One dialog to show, with the channel to answer it on.
#[derive(Debug)]
pub struct DialogRequest {
    pub kind: DialogKind,
    /// Text slots, in the order the dialog lays them out.
    pub slots: Vec<String>,
    pub reply: oneshot::Sender<Button>,
}

impl DialogRequest {
    /// Send the pressed button back to the worker.
    pub fn answer(self, button: Button) {
        if self.reply.send(button).is_err() {
            trace!(kind = %self.kind, "Worker no longer waiting for dialog");
        }
    }
}

/// Events sent from the worker to the dialog host.
#[derive(Debug)]
pub enum DialogEvent {
    OperationInfo(OperationInfo),
    /// Operation `index` moved to `status`.
    Status {
        index: usize,
        status: OperationStatus,
    },
    Progress(Progress),
    Dialog(DialogRequest),
    /// Whether the run had errors. Sent once, before `Done`.
    Error(bool),
    Done,
}

/// Create a dialog observer and the receiver the host listens on.
pub fn dialog_channel(control: WorkerControl) -> (DialogObserver, mpsc::Receiver<DialogEvent>) {
    let (tx, rx) = mpsc::channel(DIALOG_CHANNEL_SIZE);
    (DialogObserver::new(tx, control), rx)
}

/// [`WorkerObserver`] that forwards everything to a dialog host.
///
/// Must be used from a thread outside any async runtime, which is where
/// [`spawn_worker`](crate::spawn_worker) runs it.
#[derive(Debug)]
pub struct DialogObserver {
    tx: mpsc::Sender<DialogEvent>,
    control: WorkerControl,
    last_progress: Option<Progress>,
}

impl DialogObserver {
    pub fn new(tx: mpsc::Sender<DialogEvent>, control: WorkerControl) -> Self {
        Self {
            tx,
            control,
            last_progress: None,
        }
    }

    pub fn control(&self) -> &WorkerControl {
        &self.control
    }

    fn send(&self, event: DialogEvent) {
        if self.tx.blocking_send(event).is_err() {
            warn!("Dialog host is gone, cancelling");
            self.control.cancel();
        }
    }

    fn forward_progress(&mut self, progress: Progress) {
        if self.last_progress == Some(progress) {
            return;
        }
        match self.tx.try_send(DialogEvent::Progress(progress)) {
            Ok(()) => self.last_progress = Some(progress),
            // A busy host just misses an intermediate value.
            Err(mpsc::error::TrySendError::Full(_)) => {}
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("Dialog host is gone, cancelling");
                self.control.cancel();
            }
        }
    }

    /// Show a dialog and wait for its button. `None` if the host is gone.
    fn show(&self, kind: DialogKind, slots: Vec<String>) -> Option<Button> {
        let (reply, answer) = oneshot::channel();
        let request = DialogRequest { kind, slots, reply };
        if self.tx.blocking_send(DialogEvent::Dialog(request)).is_err() {
            warn!(%kind, "Dialog host is gone, cancelling");
            self.control.cancel();
            return None;
        }
        match answer.blocking_recv() {
            Ok(button) => {
                trace!(%kind, %button, "Dialog answered");
                Some(button)
            }
            Err(_) => {
                warn!(%kind, "Dialog dropped without an answer, cancelling");
                self.control.cancel();
                None
            }
        }
    }

    fn ask<D>(&self, kind: DialogKind, slots: Vec<String>, map: fn(Button) -> Option<D>) -> D
    where
        D: Cancel,
    {
        match self.show(kind, slots) {
            Some(button) => map(button).unwrap_or_else(|| {
                warn!(%kind, %button, "Button not offered by this dialog, cancelling");
                D::CANCEL
            }),
            None => D::CANCEL,
        }
    }
}

/// Decisions that have a cancel answer.
trait Cancel {
    const CANCEL: Self;
}

impl Cancel for FileErrorDecision {
    const CANCEL: Self = Self::Cancel;
}
impl Cancel for ConfirmDecision {
    const CANCEL: Self = Self::Cancel;
}
impl Cancel for RetrySkipDecision {
    const CANCEL: Self = Self::Cancel;
}
impl Cancel for IgnoreDecision {
    const CANCEL: Self = Self::Cancel;
}
impl Cancel for RetryIgnoreDecision {
    const CANCEL: Self = Self::Cancel;
}
impl Cancel for DirTimeDecision {
    const CANCEL: Self = Self::Cancel;
}

fn file_error(button: Button) -> Option<FileErrorDecision> {
    Some(match button {
        Button::Retry => FileErrorDecision::Retry,
        Button::Skip => FileErrorDecision::Skip,
        Button::SkipAll => FileErrorDecision::SkipAll,
        Button::Ignore => FileErrorDecision::Ignore,
        Button::Cancel => FileErrorDecision::Cancel,
        _ => return None,
    })
}

fn confirm(button: Button) -> Option<ConfirmDecision> {
    Some(match button {
        Button::Yes => ConfirmDecision::Yes,
        Button::YesAll => ConfirmDecision::YesAll,
        Button::Skip => ConfirmDecision::Skip,
        Button::SkipAll => ConfirmDecision::SkipAll,
        Button::Cancel => ConfirmDecision::Cancel,
        _ => return None,
    })
}

fn retry_skip(button: Button) -> Option<RetrySkipDecision> {
    Some(match button {
        Button::Retry => RetrySkipDecision::Retry,
        Button::Skip => RetrySkipDecision::Skip,
        Button::SkipAll => RetrySkipDecision::SkipAll,
        Button::Cancel => RetrySkipDecision::Cancel,
        _ => return None,
    })
}

fn ignore(button: Button) -> Option<IgnoreDecision> {
    Some(match button {
        Button::Skip => IgnoreDecision::Skip,
        Button::SkipAll => IgnoreDecision::SkipAll,
        Button::Ignore => IgnoreDecision::Ignore,
        Button::IgnoreAll => IgnoreDecision::IgnoreAll,
        Button::Cancel => IgnoreDecision::Cancel,
        _ => return None,
    })
}

fn retry_ignore(button: Button) -> Option<RetryIgnoreDecision> {
    Some(match button {
        Button::Retry => RetryIgnoreDecision::Retry,
        Button::Skip => RetryIgnoreDecision::Skip,
        Button::SkipAll => RetryIgnoreDecision::SkipAll,
        Button::Ignore => RetryIgnoreDecision::Ignore,
        Button::IgnoreAll => RetryIgnoreDecision::IgnoreAll,
        Button::Cancel => RetryIgnoreDecision::Cancel,
        _ => return None,
    })
}

fn dir_time(button: Button) -> Option<DirTimeDecision> {
    Some(match button {
        Button::Retry => DirTimeDecision::Retry,
        Button::Ignore => DirTimeDecision::Ignore,
        Button::IgnoreAll => DirTimeDecision::IgnoreAll,
        Button::Cancel => DirTimeDecision::Cancel,
        _ => return None,
    })
}

fn slots<const N: usize>(texts: [&str; N]) -> Vec<String> {
    texts.iter().map(|s| s.to_string()).collect()
}

impl WorkerObserver for DialogObserver {
    fn set_operation_info(&mut self, info: &OperationInfo) {
        self.control.wait_if_suspended();
        self.send(DialogEvent::OperationInfo(info.clone()));
    }

    fn set_progress(&mut self, progress: Progress) {
        self.control.wait_if_suspended();
        self.forward_progress(progress);
    }

    fn set_operation_status(&mut self, index: usize, status: OperationStatus) {
        self.send(DialogEvent::Status { index, status });
    }

    fn set_progress_without_suspend(&mut self, progress: Progress) {
        self.forward_progress(progress);
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
        self.send(DialogEvent::Error(error));
    }

    fn notify_done(&mut self) {
        self.send(DialogEvent::Done);
    }

    fn ask_file_error(&mut self, title: &str, file: &str, error: &str) -> FileErrorDecision {
        self.ask(DialogKind::FileError, slots([title, file, error]), file_error)
    }

    fn ask_overwrite(
        &mut self,
        source: &str,
        source_info: &str,
        target: &str,
        target_info: &str,
    ) -> ConfirmDecision {
        self.ask(
            DialogKind::Overwrite,
            slots([source, source_info, target, target_info]),
            confirm,
        )
    }

    fn ask_ads_overwrite(
        &mut self,
        source: &str,
        source_info: &str,
        target: &str,
        target_info: &str,
    ) -> ConfirmDecision {
        self.ask(
            DialogKind::AdsOverwrite,
            slots([source, source_info, target, target_info]),
            confirm,
        )
    }

    fn ask_hidden_or_system(&mut self, title: &str, file: &str, action: &str) -> ConfirmDecision {
        self.ask(DialogKind::HiddenOrSystem, slots([title, file, action]), confirm)
    }

    fn ask_cannot_move(
        &mut self,
        error: &str,
        source: &str,
        target: &str,
        is_dir: bool,
    ) -> RetrySkipDecision {
        let kind = if is_dir {
            DialogKind::CannotMoveDir
        } else {
            DialogKind::CannotMoveFile
        };
        self.ask(kind, slots([error, source, target]), retry_skip)
    }

    fn notify_error(&mut self, title: &str, file: &str, error: &str) {
        // Only the acknowledgement matters.
        let _ = self.show(DialogKind::Error, slots([title, file, error]));
    }

    fn ask_ads_read_error(&mut self, file: &str, stream: &str) -> IgnoreDecision {
        self.ask(DialogKind::AdsReadError, slots([file, stream]), ignore)
    }

    fn ask_ads_open_error(&mut self, file: &str, stream: &str, error: &str) -> RetryIgnoreDecision {
        self.ask(
            DialogKind::AdsOpenError,
            slots([file, stream, error]),
            retry_ignore,
        )
    }

    fn ask_set_attrs_error(
        &mut self,
        file: &str,
        failed: Attributes,
        current: Attributes,
    ) -> RetryIgnoreDecision {
        let slots = vec![file.to_string(), failed.to_string(), current.to_string()];
        self.ask(DialogKind::SetAttrsError, slots, retry_ignore)
    }

    fn ask_copy_perm_error(
        &mut self,
        source: &str,
        target: &str,
        error: &str,
    ) -> RetryIgnoreDecision {
        self.ask(
            DialogKind::CopyPermError,
            slots([source, target, error]),
            retry_ignore,
        )
    }

    fn ask_copy_dir_time_error(&mut self, dir: &str, error: &str) -> DirTimeDecision {
        self.ask(DialogKind::CopyDirTimeError, slots([dir, error]), dir_time)
    }

    fn ask_encryption_loss(
        &mut self,
        is_encrypted: bool,
        file: &str,
        is_dir: bool,
    ) -> ConfirmDecision {
        let what = match (is_dir, is_encrypted) {
            (true, true) => "encrypted directory",
            (true, false) => "directory",
            (false, true) => "encrypted file",
            (false, false) => "file",
        };
        self.ask(DialogKind::EncryptionLoss, slots([file, what]), confirm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use strum::IntoEnumIterator;

    #[test]
    fn test_dialog_ids_are_dense() {
        let ids: Vec<u8> = DialogKind::iter().map(DialogKind::id).collect();
        assert_eq!(ids, (0..=12).collect::<Vec<_>>());
    }

    #[test]
    fn test_every_offered_button_maps() {
        for button in DialogKind::FileError.buttons() {
            assert!(file_error(*button).is_some());
        }
        for button in DialogKind::AdsReadError.buttons() {
            assert!(ignore(*button).is_some());
        }
        for button in DialogKind::CopyDirTimeError.buttons() {
            assert!(dir_time(*button).is_some());
        }
        assert!(confirm(Button::Retry).is_none());
    }

    #[test]
    fn test_answer_is_returned() {
        let (mut observer, mut rx) = dialog_channel(WorkerControl::new());
        let host = thread::spawn(move || {
            let Some(DialogEvent::Dialog(request)) = rx.blocking_recv() else {
                panic!("expected a dialog");
            };
            assert_eq!(request.kind, DialogKind::Overwrite);
            assert_eq!(request.slots[0], "a.txt");
            request.answer(Button::SkipAll);
        });

        let decision = observer.ask_overwrite("a.txt", "1 KiB", "b.txt", "2 KiB");
        host.join().unwrap();
        assert_eq!(decision, ConfirmDecision::SkipAll);
        assert!(!observer.is_cancelled());
    }

    #[test]
    fn test_dropped_host_cancels() {
        let (mut observer, rx) = dialog_channel(WorkerControl::new());
        drop(rx);

        let decision = observer.ask_file_error("Cannot delete", "a.txt", "denied");
        assert_eq!(decision, FileErrorDecision::Cancel);
        assert!(observer.is_cancelled());
    }

    #[test]
    fn test_status_changes_are_forwarded() {
        let (mut observer, mut rx) = dialog_channel(WorkerControl::new());
        observer.set_operation_status(3, OperationStatus::Suspended);
        drop(observer);

        let Some(DialogEvent::Status { index, status }) = rx.blocking_recv() else {
            panic!("expected a status change");
        };
        assert_eq!(index, 3);
        assert_eq!(status, OperationStatus::Suspended);
    }

    #[test]
    fn test_unchanged_progress_is_not_resent() {
        let (mut observer, mut rx) = dialog_channel(WorkerControl::new());
        observer.set_progress_without_suspend(Progress::new(10, 5));
        observer.set_progress_without_suspend(Progress::new(10, 5));
        observer.set_progress_without_suspend(Progress::new(20, 5));
        drop(observer);

        let mut seen = Vec::new();
        while let Some(event) = rx.blocking_recv() {
            if let DialogEvent::Progress(progress) = event {
                seen.push(progress.operation);
            }
        }
        assert_eq!(seen, vec![10, 20]);
    }
}
