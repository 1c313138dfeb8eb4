//! File transfers: CopyFile and the copy half of MoveFile.

use std::io::{self, Read, Write};
use std::thread;
use std::time::{Duration, Instant};

use opscript_core::{Attributes, OpPath, Operation};
use tracing::debug;

use crate::decision::IgnoreDecision;
use crate::fs::EntryInfo;
use crate::observer::{ErrorCode, FileStamp, MessageId};
use crate::worker::{Halt, Recovery, Step, Worker, target_of};

/// Transfer buffer size.
pub const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Largest file a FAT32 volume can hold.
pub const FAT32_MAX_FILE_SIZE: u64 = 0xFFFF_FFFF;

/// What we learned about a transfer source before moving its content.
pub(crate) struct TransferSource {
    pub(crate) info: EntryInfo,
    /// Bytes to transfer (the link target's size for links).
    pub(crate) size: u64,
}

impl Worker<'_> {
    pub(crate) fn copy_file(&mut self, op: &Operation) -> Step {
        let target = target_of(op)?;
        let source = self.prepare_transfer(op, target)?;
        self.copy_contents(op, target, &source)
    }

    /// Checks shared by copy and move: name length, distinct paths, links,
    /// FAT32 limit, encryption, and the existing target.
    pub(crate) fn prepare_transfer(
        &mut self,
        op: &Operation,
        target: &OpPath,
    ) -> Step<TransferSource> {
        let src = op.source.io_path();
        let tgt = target.io_path();

        self.check_name_length(src, |s| &mut s.name_too_long_skip_all)?;
        self.check_name_length(tgt, |s| &mut s.target_name_too_long_skip_all)?;
        self.check_distinct(op, src, tgt)?;

        let info = self
            .io_retry(MessageId::CannotOpenSource, &op.source.name, |fs| {
                fs.symlink_metadata(src)
            })?
            .unwrap_or(EntryInfo {
                size: op.file_size,
                attrs: op.attrs,
                modified: None,
                is_dir: false,
                is_symlink: false,
            });

        let mut size = info.size;
        if info.is_symlink {
            size = self.link_target_size(op)?;
            self.confirm(
                |s| &mut s.confirm_copy_link_content_all,
                |s| &mut s.confirm_copy_link_content_skip_all,
                |o| {
                    o.ask_hidden_or_system_by_id(
                        MessageId::ConfirmCopyLinkContent,
                        &op.source.name,
                        MessageId::ActionCopyLinkContent,
                    )
                },
            )?;
        }

        if self.policy.target_is_fat32 && size > FAT32_MAX_FILE_SIZE {
            self.refuse(
                |s| &mut s.fat32_too_big_skip_all,
                MessageId::FileTooBigForFat32,
                &op.source.name,
                io::Error::from(io::ErrorKind::FileTooLarge),
            )?;
        }

        if info.attrs.contains(Attributes::ENCRYPTED) && !self.policy.target_supports_encryption {
            self.confirm(
                |s| &mut s.encryption_loss_all,
                |s| &mut s.encryption_loss_skip_all,
                |o| o.ask_encryption_loss(true, &op.source.name, false),
            )?;
        }

        self.negotiate_target(op, target, &info, size)?;
        Ok(TransferSource { info, size })
    }

    /// Refuse to transfer a file onto itself; opening the target would
    /// truncate the source.
    fn check_distinct(&mut self, op: &Operation, src: &str, tgt: &str) -> Step {
        while src == tgt || self.fs.is_same_file(src, tgt) {
            let err = io::Error::new(
                io::ErrorKind::InvalidInput,
                "source and target are the same file",
            );
            match self.file_error(MessageId::SameSourceAndTarget, &op.source.name, &err)? {
                Recovery::Retry => {}
                Recovery::Ignore => return Err(Halt::Skipped),
            }
        }
        Ok(())
    }

    /// Size of the file a link points to.
    fn link_target_size(&mut self, op: &Operation) -> Step<u64> {
        loop {
            match self.fs.metadata(op.source.io_path()) {
                Ok(info) => return Ok(info.size),
                Err(err) => {
                    if self.state.link_target_size_ignore_all {
                        return Ok(op.file_size);
                    }
                    match self.file_error(MessageId::LinkTargetSize, &op.source.name, &err)? {
                        Recovery::Retry => continue,
                        Recovery::Ignore => {
                            // One ignored size is as good as all of them.
                            self.state.link_target_size_ignore_all = true;
                            return Ok(op.file_size);
                        }
                    }
                }
            }
        }
    }

    /// Decide what happens to an existing target.
    fn negotiate_target(
        &mut self,
        op: &Operation,
        target: &OpPath,
        info: &EntryInfo,
        size: u64,
    ) -> Step {
        let tgt = target.io_path();

        let existing = loop {
            match self.fs.symlink_metadata(tgt) {
                Ok(existing) if existing.is_dir => {
                    let err = io::Error::new(
                        io::ErrorKind::AlreadyExists,
                        "a directory with this name already exists",
                    );
                    match self.file_error(MessageId::CannotCreateTarget, &target.name, &err)? {
                        Recovery::Retry => continue,
                        Recovery::Ignore => return Err(Halt::Skipped),
                    }
                }
                Ok(existing) => break existing,
                // Anything else is reported when the target is created.
                Err(_) => return Ok(()),
            }
        };

        if self.policy.overwrite_older {
            let target_is_older = match (existing.modified, info.modified) {
                (Some(existing), Some(source)) => existing < source,
                _ => true,
            };
            if !target_is_older {
                debug!(target = %target, "Target is not older than source, skipping");
                return Err(Halt::Skipped);
            }
        } else {
            let source_stamp = FileStamp {
                size,
                modified: info.modified,
            };
            let target_stamp = FileStamp {
                size: existing.size,
                modified: existing.modified,
            };
            self.confirm(
                |s| &mut s.overwrite_all,
                |s| &mut s.overwrite_skip_all,
                |o| {
                    o.ask_overwrite_by_id(&op.source.name, source_stamp, &target.name, target_stamp)
                },
            )?;
        }

        let protected = Attributes::READONLY | Attributes::HIDDEN | Attributes::SYSTEM;
        if existing.attrs.intersects(protected) {
            self.confirm(
                |s| &mut s.hidden_or_system_all,
                |s| &mut s.hidden_or_system_skip_all,
                |o| {
                    o.ask_hidden_or_system_by_id(
                        MessageId::ConfirmOverwriteProtected,
                        &target.name,
                        MessageId::ActionOverwrite,
                    )
                },
            )?;
            if let Err(err) = self.fs.set_attributes(tgt, existing.attrs.without(protected)) {
                debug!(target = %target, error = %err, "Could not clear target attributes");
            }
        }

        Ok(())
    }

    /// Write the data, streams and metadata of `source` to `target`.
    pub(crate) fn copy_contents(
        &mut self,
        op: &Operation,
        target: &OpPath,
        source: &TransferSource,
    ) -> Step {
        let streams = self.streams_to_copy(op)?;
        self.transfer(op, target, source.size)?;
        for stream in &streams {
            self.copy_stream(op, target, &source.info, stream)?;
        }
        self.copy_metadata(op, target, &source.info)
    }

    /// Alternate streams to carry over, after confirming any loss.
    fn streams_to_copy(&mut self, op: &Operation) -> Step<Vec<String>> {
        if self.policy.ignore_ads {
            return Ok(Vec::new());
        }
        let streams = match self.fs.alternate_streams(op.source.io_path()) {
            Ok(streams) => streams,
            Err(err) => {
                debug!(source = %op.source, error = %err, "Cannot list alternate streams");
                Vec::new()
            }
        };
        if streams.is_empty() || self.policy.target_supports_ads {
            return Ok(streams);
        }

        self.confirm(
            |s| &mut s.confirm_ads_loss_all,
            |s| &mut s.confirm_ads_loss_skip_all,
            |o| {
                o.ask_hidden_or_system_by_id(
                    MessageId::ConfirmAdsLoss,
                    &op.source.name,
                    MessageId::ActionDropStreams,
                )
            },
        )?;
        Ok(Vec::new())
    }

    /// Copy the main data stream.
    ///
    /// Progress is reported without suspending; a pause here would leave the
    /// target half written. A cancelled transfer removes its target. An
    /// ignored failure skips the operation, so a move keeps its source.
    fn transfer(&mut self, op: &Operation, target: &OpPath, size: u64) -> Step {
        let src = op.source.io_path();
        let tgt = target.io_path();
        let chunk = self
            .policy
            .speed_limit
            .filter(|limit| *limit > 0)
            .map_or(COPY_BUFFER_SIZE, |limit| (limit as usize).min(COPY_BUFFER_SIZE));
        let mut buf = vec![0u8; chunk];

        'attempt: loop {
            // An ignored open leaves any existing target as it was.
            let opened = self.io_retry(MessageId::CannotOpenSource, &op.source.name, |fs| {
                fs.open_read(src)
            })?;
            let Some(mut reader) = opened else {
                return Err(Halt::Skipped);
            };
            let created = self.io_retry(MessageId::CannotCreateTarget, &target.name, |fs| {
                fs.create_write(tgt)
            })?;
            let Some(mut writer) = created else {
                return Err(Halt::Skipped);
            };

            let started = Instant::now();
            let mut done = 0u64;

            loop {
                let read = match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(read) => read,
                    Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                    Err(err) => {
                        drop(writer);
                        self.bytes_transferred -= done;
                        match self.transfer_error(
                            MessageId::ReadError,
                            &op.source.name,
                            tgt,
                            &err,
                        )? {
                            Recovery::Retry => continue 'attempt,
                            Recovery::Ignore => return Err(Halt::Skipped),
                        }
                    }
                };

                if let Err(err) = writer.write_all(&buf[..read]) {
                    drop(writer);
                    self.bytes_transferred -= done;
                    match self.transfer_error(MessageId::WriteError, &target.name, tgt, &err)? {
                        Recovery::Retry => continue 'attempt,
                        Recovery::Ignore => return Err(Halt::Skipped),
                    }
                }

                done += read as u64;
                self.bytes_transferred += read as u64;
                self.report_transfer(done, size, op.weight);

                if self.observer.is_cancelled() {
                    drop(writer);
                    self.discard_partial(target);
                    return Err(Halt::Cancelled);
                }
                self.throttle(started, done);
            }

            if let Err(err) = writer.flush() {
                drop(writer);
                self.bytes_transferred -= done;
                match self.transfer_error(MessageId::WriteError, &target.name, tgt, &err)? {
                    Recovery::Retry => continue 'attempt,
                    Recovery::Ignore => return Err(Halt::Skipped),
                }
            }

            self.report_transfer(size, size, op.weight);
            return Ok(());
        }
    }

    /// Negotiate a failure inside a transfer.
    ///
    /// The half-written target is removed whatever the answer: a retry
    /// starts it over and anything else abandons it.
    fn transfer_error(
        &mut self,
        title: MessageId,
        path: &str,
        tgt: &str,
        err: &io::Error,
    ) -> Step<Recovery> {
        let recovery = self.file_error(title, path, err);
        if let Err(err) = self.fs.remove_file(tgt) {
            debug!(target = tgt, error = %err, "Could not remove partial target");
        }
        recovery
    }

    fn discard_partial(&mut self, target: &OpPath) {
        if let Err(err) = self.fs.remove_file(target.io_path()) {
            self.observer
                .notify_error_by_id(MessageId::CannotDelete, &target.name, ErrorCode::from(&err));
        }
    }

    /// Sleep long enough to keep the transfer under the speed limit.
    fn throttle(&self, started: Instant, done: u64) {
        let Some(limit) = self.policy.speed_limit.filter(|limit| *limit > 0) else {
            return;
        };
        let expected = Duration::from_secs_f64(done as f64 / f64::from(limit));
        let elapsed = started.elapsed();
        if expected > elapsed {
            thread::sleep(expected - elapsed);
        }
    }

    fn copy_stream(
        &mut self,
        op: &Operation,
        target: &OpPath,
        info: &EntryInfo,
        stream: &str,
    ) -> Step {
        let src = op.source.io_path();
        let tgt = target.io_path();

        if self.fs.stream_exists(tgt, stream) {
            let stamp = FileStamp {
                size: info.size,
                modified: info.modified,
            };
            let result = self.confirm(
                |s| &mut s.ads_overwrite_all,
                |s| &mut s.ads_overwrite_skip_all,
                |o| {
                    o.ask_ads_overwrite_by_id(
                        &format!("{}:{stream}", op.source.name),
                        stamp,
                        &format!("{}:{stream}", target.name),
                        stamp,
                    )
                },
            );
            match result {
                // Skipping a stream keeps the rest of the file.
                Err(Halt::Skipped) => return Ok(()),
                other => other?,
            }
        }

        let mut buf = vec![0u8; COPY_BUFFER_SIZE];
        'attempt: loop {
            let mut reader = match self.fs.open_stream_read(src, stream) {
                Ok(reader) => reader,
                Err(err) => match self.stream_open_error(&op.source.name, stream, &err)? {
                    Recovery::Retry => continue,
                    Recovery::Ignore => return Ok(()),
                },
            };
            let mut writer = match self.fs.create_stream_write(tgt, stream) {
                Ok(writer) => writer,
                Err(err) => match self.stream_open_error(&target.name, stream, &err)? {
                    Recovery::Retry => continue,
                    Recovery::Ignore => return Ok(()),
                },
            };

            loop {
                let read = match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(read) => read,
                    Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                    Err(err) => {
                        debug!(source = %op.source, stream, error = %err, "Stream read failed");
                        self.stream_read_error(&op.source.name, stream)?;
                        return Ok(());
                    }
                };
                if let Err(err) = writer.write_all(&buf[..read]) {
                    match self.stream_open_error(&target.name, stream, &err)? {
                        Recovery::Retry => continue 'attempt,
                        Recovery::Ignore => return Ok(()),
                    }
                }
                if self.observer.is_cancelled() {
                    return Err(Halt::Cancelled);
                }
            }

            if let Err(err) = writer.flush() {
                match self.stream_open_error(&target.name, stream, &err)? {
                    Recovery::Retry => continue 'attempt,
                    Recovery::Ignore => return Ok(()),
                }
            }
            return Ok(());
        }
    }

    fn stream_open_error(&mut self, file: &str, stream: &str, err: &io::Error) -> Step<Recovery> {
        let code = ErrorCode::from(err);
        self.retry_ignore(
            |s| &mut s.ads_open_skip_all,
            |s| &mut s.ads_open_ignore_all,
            |o| o.ask_ads_open_error_by_id(file, stream, code),
        )
    }

    /// Negotiate a stream read failure. `Ok` means drop the stream.
    fn stream_read_error(&mut self, file: &str, stream: &str) -> Step {
        if self.state.ads_read_ignore_all {
            return Ok(());
        }
        // Stream failures share one skip-all class.
        if self.state.ads_open_skip_all {
            return Err(Halt::Failed);
        }
        self.checkpoint()?;

        let decision = self.observer.ask_ads_read_error(file, stream);
        self.state.mark_interaction();

        match decision {
            IgnoreDecision::Ignore => Ok(()),
            IgnoreDecision::IgnoreAll => {
                self.state.ads_read_ignore_all = true;
                Ok(())
            }
            IgnoreDecision::Skip => Err(Halt::Failed),
            IgnoreDecision::SkipAll => {
                self.state.ads_open_skip_all = true;
                Err(Halt::Failed)
            }
            IgnoreDecision::Cancel => Err(Halt::Cancelled),
        }
    }

    /// Permissions, modification time and attributes of a copied file.
    fn copy_metadata(&mut self, op: &Operation, target: &OpPath, info: &EntryInfo) -> Step {
        let src = op.source.io_path();
        let tgt = target.io_path();

        if self.policy.copy_security {
            loop {
                let Err(err) = self.fs.copy_permissions(src, tgt) else {
                    break;
                };
                let code = ErrorCode::from(&err);
                let recovery = self.retry_ignore(
                    |s| &mut s.copy_perm_skip_all,
                    |s| &mut s.copy_perm_ignore_all,
                    |o| o.ask_copy_perm_error_by_id(&op.source.name, &target.name, code),
                )?;
                if recovery == Recovery::Ignore {
                    break;
                }
            }
        }

        if let Some(modified) = info.modified {
            if let Err(err) = self.fs.set_modified(tgt, modified) {
                debug!(target = %target, error = %err, "Could not preserve modification time");
            }
        }

        let mut attrs = info
            .attrs
            .without(Attributes::DIRECTORY | Attributes::REPARSE_POINT)
            & self.policy.clear_readonly_mask;
        if !self.policy.copy_attrs {
            attrs = attrs.without(Attributes::COMPRESSED | Attributes::ENCRYPTED);
        }
        self.set_attributes_negotiated(target, attrs)
    }

    pub(crate) fn set_attributes_negotiated(&mut self, target: &OpPath, attrs: Attributes) -> Step {
        let tgt = target.io_path();
        loop {
            let Err(err) = self.fs.set_attributes(tgt, attrs) else {
                return Ok(());
            };
            debug!(target = %target, error = %err, "Cannot set attributes");
            let current = self
                .fs
                .symlink_metadata(tgt)
                .map(|info| info.attrs)
                .unwrap_or(Attributes::NONE);
            let recovery = self.retry_ignore(
                |s| &mut s.set_attrs_skip_all,
                |s| &mut s.set_attrs_ignore_all,
                |o| o.ask_set_attrs_error(&target.name, attrs, current),
            )?;
            if recovery == Recovery::Ignore {
                return Ok(());
            }
        }
    }
}
