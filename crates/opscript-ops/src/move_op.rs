//! MoveFile: rename in place, or copy and remove across devices.

use std::io;

use opscript_core::{Attributes, OpPath, Operation};
use tracing::{debug, warn};

use crate::decision::RetrySkipDecision;
use crate::fs::EntryInfo;
use crate::observer::{ErrorCode, MessageId};
use crate::worker::{Halt, Step, Worker, target_of};

impl Worker<'_> {
    pub(crate) fn move_file(&mut self, op: &Operation) -> Step {
        let target = target_of(op)?;
        let source = self.prepare_transfer(op, target)?;
        let src = op.source.io_path();
        let tgt = target.io_path();

        loop {
            match self.fs.rename(src, tgt) {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == io::ErrorKind::CrossesDevices => {
                    debug!(source = %op.source, "Rename crosses devices, copying instead");
                    break;
                }
                Err(err) => self.cannot_move(&err, op, target, false)?,
            }
        }

        self.copy_contents(op, target, &source)?;
        self.remove_moved_source(op, &source.info)
    }

    /// Negotiate a failed rename. `Ok` means try again.
    pub(crate) fn cannot_move(
        &mut self,
        err: &io::Error,
        op: &Operation,
        target: &OpPath,
        is_dir: bool,
    ) -> Step {
        warn!(source = %op.source, target = %target, error = %err, "Cannot move");
        if self.state.cannot_move_skip_all {
            return Err(Halt::Failed);
        }
        self.checkpoint()?;

        let decision = self.observer.ask_cannot_move_by_id(
            ErrorCode::from(err),
            &op.source.name,
            &target.name,
            is_dir,
        );
        self.state.mark_interaction();

        match decision {
            RetrySkipDecision::Retry => Ok(()),
            RetrySkipDecision::Skip => Err(Halt::Failed),
            RetrySkipDecision::SkipAll => {
                self.state.cannot_move_skip_all = true;
                Err(Halt::Failed)
            }
            RetrySkipDecision::Cancel => Err(Halt::Cancelled),
        }
    }

    fn remove_moved_source(&mut self, op: &Operation, info: &EntryInfo) -> Step {
        let src = op.source.io_path();
        if info.attrs.contains(Attributes::READONLY) {
            let attrs = info.attrs.without(Attributes::READONLY);
            if let Err(err) = self.fs.set_attributes(src, attrs) {
                debug!(source = %op.source, error = %err, "Could not clear read-only");
            }
        }
        self.io_retry(MessageId::CannotRemoveSource, &op.source.name, |fs| {
            fs.remove_file(src)
        })?;
        Ok(())
    }
}
