//! CreateDir, including the fast directory move.

use std::io;

use opscript_core::{Attributes, Operation};
use tracing::debug;

use crate::observer::MessageId;
use crate::worker::{Halt, Recovery, Step, Worker, target_of};

impl Worker<'_> {
    pub(crate) fn create_dir(&mut self, op: &Operation) -> Step {
        let target = target_of(op)?;
        let src = op.source.io_path();
        let tgt = target.io_path();

        self.check_name_length(src, |s| &mut s.source_dir_name_too_long_skip_all)?;
        self.check_name_length(tgt, |s| &mut s.target_dir_name_too_long_skip_all)?;

        let source_info = self.fs.symlink_metadata(src).ok();
        let source_attrs = source_info.map_or(op.attrs, |info| info.attrs);

        if source_attrs.contains(Attributes::ENCRYPTED) && !self.policy.target_supports_encryption
        {
            self.confirm(
                |s| &mut s.encryption_loss_all,
                |s| &mut s.encryption_loss_skip_all,
                |o| o.ask_encryption_loss(true, &op.source.name, true),
            )?;
        }

        if !self.is_copy && self.policy.fast_dir_move && !self.fs.exists(tgt) {
            match self.fs.rename(src, tgt) {
                Ok(()) => {
                    debug!(source = %op.source, target = %target, "Moved directory as a whole");
                    self.moved_dirs.insert(src.to_string());
                    return Ok(());
                }
                Err(err) => {
                    debug!(source = %op.source, error = %err, "Fast directory move failed");
                }
            }
        }

        if self.is_copy && self.policy.skip_empty_dirs {
            let empty = self
                .fs
                .read_dir_names(src)
                .map(|names| names.is_empty())
                .unwrap_or(false);
            if empty {
                debug!(source = %op.source, "Skipping empty directory");
                return Err(Halt::Skipped);
            }
        }

        loop {
            let result = match self.fs.symlink_metadata(tgt) {
                Ok(existing) if existing.is_dir => {
                    debug!(target = %target, "Reusing existing directory");
                    break;
                }
                Ok(_) => Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    "a file with this name already exists",
                )),
                Err(_) => self.fs.create_dir(tgt),
            };
            let Err(err) = result else {
                break;
            };
            match self.file_error(MessageId::CannotCreateDir, &target.name, &err)? {
                Recovery::Retry => continue,
                Recovery::Ignore => return Ok(()),
            }
        }

        if self.policy.copy_attrs {
            // Read-only on a directory would block filling it.
            let attrs = source_attrs.without(
                Attributes::DIRECTORY | Attributes::REPARSE_POINT | Attributes::READONLY,
            ) & self.policy.clear_readonly_mask;
            self.set_attributes_negotiated(target, attrs)?;
        }

        if self.policy.preserve_dir_time {
            if let Some(modified) = source_info.and_then(|info| info.modified) {
                loop {
                    let Err(err) = self.fs.set_modified(tgt, modified) else {
                        break;
                    };
                    if self.dir_time_error(&target.name, &err)? == Recovery::Ignore {
                        break;
                    }
                }
            }
        }

        Ok(())
    }
}
