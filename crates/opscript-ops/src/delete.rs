//! DeleteFile, DeleteDir and DeleteDirLink.

use std::io;

use opscript_core::{Attributes, Operation};
use tracing::debug;

use crate::observer::MessageId;
use crate::worker::{Recovery, Step, Worker};

impl Worker<'_> {
    pub(crate) fn delete_file(&mut self, op: &Operation) -> Step {
        let path = op.source.io_path();
        self.check_name_length(path, |s| &mut s.name_too_long_skip_all)?;

        let Some(attrs) = self.current_attrs(op) else {
            return Ok(());
        };

        if self.policy.confirm_delete_hidden_file && attrs.is_protected() {
            self.confirm_protected_delete(op)?;
        }
        if attrs.contains(Attributes::READONLY) {
            if let Err(err) = self.fs.set_attributes(path, attrs.without(Attributes::READONLY)) {
                debug!(path, error = %err, "Could not clear read-only");
            }
        }

        let recycle = self.policy.recycle();
        self.io_retry(MessageId::CannotDelete, &op.source.name, |fs| {
            if recycle {
                fs.move_to_trash(path)
            } else {
                fs.remove_file(path)
            }
        })?;
        Ok(())
    }

    pub(crate) fn delete_dir(&mut self, op: &Operation) -> Step {
        let path = op.source.io_path();
        if self.moved_dirs.contains(path) {
            debug!(path, "Directory was moved as a whole");
            return Ok(());
        }
        self.check_name_length(path, |s| &mut s.dir_name_too_long_skip_all)?;

        let Some(attrs) = self.current_attrs(op) else {
            return Ok(());
        };

        if self.policy.confirm_delete_hidden_dir && attrs.is_protected() {
            self.confirm_protected_delete(op)?;
        }

        // The source of a move must already be empty; never take content with it.
        let recursive = !self.is_copy_or_move && self.confirm_nonempty(op)?;
        let recycle = !self.is_copy_or_move && self.policy.recycle();

        if attrs.contains(Attributes::READONLY) {
            if let Err(err) = self.fs.set_attributes(path, attrs.without(Attributes::READONLY)) {
                debug!(path, error = %err, "Could not clear read-only");
            }
        }

        self.io_retry(MessageId::CannotDelete, &op.source.name, |fs| {
            if recycle {
                fs.move_to_trash(path)
            } else if recursive {
                fs.remove_dir_all(path)
            } else {
                fs.remove_dir(path)
            }
        })?;
        Ok(())
    }

    pub(crate) fn delete_dir_link(&mut self, op: &Operation) -> Step {
        let path = op.source.io_path();
        if self.moved_dirs.contains(path) {
            debug!(path, "Directory link was moved as a whole");
            return Ok(());
        }
        self.check_name_length(path, |s| &mut s.dir_name_too_long_skip_all)?;

        if self.current_attrs(op).is_none() {
            return Ok(());
        }

        self.io_retry(MessageId::CannotDelete, &op.source.name, |fs| {
            fs.remove_dir_link(path)
        })?;
        Ok(())
    }

    /// Attributes of the source now, or `None` if it is already gone.
    fn current_attrs(&self, op: &Operation) -> Option<Attributes> {
        match self.fs.symlink_metadata(op.source.io_path()) {
            Ok(info) => Some(info.attrs),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(source = %op.source, "Already gone");
                None
            }
            // Let the removal itself report the problem.
            Err(_) => Some(op.attrs),
        }
    }

    fn confirm_protected_delete(&mut self, op: &Operation) -> Step {
        self.confirm(
            |s| &mut s.hidden_or_system_all,
            |s| &mut s.hidden_or_system_skip_all,
            |o| {
                o.ask_hidden_or_system_by_id(
                    MessageId::ConfirmDeleteProtected,
                    &op.source.name,
                    MessageId::ActionDelete,
                )
            },
        )
    }

    /// Check for content and confirm taking it along.
    ///
    /// Returns whether the removal has to be recursive.
    fn confirm_nonempty(&mut self, op: &Operation) -> Step<bool> {
        if !self.policy.confirm_delete_nonempty_dir {
            return Ok(true);
        }

        let path = op.source.io_path();
        let names = loop {
            match self.fs.read_dir_names(path) {
                Ok(names) => break names,
                Err(err) => match self.file_error_with(
                    |s| &mut s.list_dir_skip_all,
                    MessageId::CannotListDir,
                    &op.source.name,
                    &err,
                )? {
                    Recovery::Retry => continue,
                    Recovery::Ignore => break Vec::new(),
                },
            }
        };
        if names.is_empty() {
            return Ok(false);
        }

        self.confirm(
            |s| &mut s.delete_nonempty_all,
            |s| &mut s.delete_nonempty_skip_all,
            |o| {
                o.ask_hidden_or_system_by_id(
                    MessageId::ConfirmDeleteNonEmptyDir,
                    &op.source.name,
                    MessageId::ActionDelete,
                )
            },
        )?;
        Ok(true)
    }
}
