//! Script builder: turns a selection snapshot into an operation script.

use opscript_core::{
    Action, Attributes, BuildConfig, BuildError, BuildState, COPY_MIN_FILE_WEIGHT,
    CREATE_DIR_WEIGHT, ExecutionPolicy, OpPath, Opcode, Operation, OperationScript,
    SelectionSnapshot, SnapshotItem, apply_mask,
};
use tracing::{debug, warn};

/// Build the operation script for a Copy, Move or Delete snapshot.
///
/// Starts a new run, so `state` is reset. Directory items are not entered:
/// each yields one `CreateDir` (plus its delete for Move), so a caller that
/// wants contents copied lists them in the snapshot.
pub fn build(
    snapshot: &SelectionSnapshot,
    config: &BuildConfig,
    state: &mut BuildState,
) -> Result<OperationScript, BuildError> {
    build_into(OperationScript::new(), snapshot, config, state)
}

/// Like [`build`], appending into a caller-provided empty script.
pub fn build_into(
    mut script: OperationScript,
    snapshot: &SelectionSnapshot,
    config: &BuildConfig,
    state: &mut BuildState,
) -> Result<OperationScript, BuildError> {
    state.reset();

    let action = snapshot.action;
    if !matches!(action, Action::Copy | Action::Move | Action::Delete) {
        warn!(%action, "Action is not handled by the script builder");
        return Err(BuildError::UnsupportedAction { action });
    }

    script.policy = execution_policy(snapshot, config);
    script.is_copy = action == Action::Copy;
    script.is_copy_or_move = action.is_copy_or_move();

    let mut builder = ItemBuilder {
        snapshot,
        config,
        script,
    };
    for item in &snapshot.items {
        builder.add_item(item)?;
    }
    let mut script = builder.script;

    script.add_work_path(snapshot.source_path.clone());
    if script.is_copy_or_move {
        script.add_work_path(snapshot.target_path.clone());
    }

    debug!(
        %action,
        operations = script.len(),
        files = script.file_count,
        dirs = script.dir_count,
        total_weight = script.total_weight(),
        "Built operation script"
    );
    Ok(script)
}

/// Cross-cutting policy stamped onto every script.
fn execution_policy(snapshot: &SelectionSnapshot, config: &BuildConfig) -> ExecutionPolicy {
    let options = &snapshot.options;
    ExecutionPolicy {
        overwrite_older: options.overwrite_older,
        copy_security: options.copy_security,
        copy_attrs: options.copy_attrs,
        preserve_dir_time: options.preserve_dir_time,
        ignore_ads: options.ignore_ads,
        skip_empty_dirs: options.skip_empty_dirs,
        use_recycle_bin: options.use_recycle_bin,
        invert_recycle_bin: options.invert_recycle_bin,
        start_on_idle: options.start_on_idle,
        speed_limit: options.use_speed_limit.then_some(options.speed_limit),
        clear_readonly_mask: if config.clear_read_only {
            !Attributes::READONLY
        } else {
            Attributes(u32::MAX)
        },
        target_supports_ads: config.target_supports_ads,
        target_is_fat32: config.target_is_fat32,
        target_supports_encryption: config.target_supports_encryption,
        confirm_delete_hidden_file: config.confirm_delete_hidden_file,
        confirm_delete_hidden_dir: config.confirm_delete_hidden_dir,
        confirm_delete_nonempty_dir: config.confirm_delete_nonempty_dir,
        fast_dir_move: config.fast_dir_move,
    }
}

struct ItemBuilder<'a> {
    snapshot: &'a SelectionSnapshot,
    config: &'a BuildConfig,
    script: OperationScript,
}

impl ItemBuilder<'_> {
    fn add_item(&mut self, item: &SnapshotItem) -> Result<(), BuildError> {
        let source = self.source_path(item);

        match self.snapshot.action {
            Action::Delete => {
                let opcode = if !item.is_dir {
                    Opcode::DeleteFile
                } else if item.is_dir_link() {
                    Opcode::DeleteDirLink
                } else {
                    Opcode::DeleteDir
                };
                self.count(item);
                self.append(delete_op(opcode, source, item.attrs))
            }
            Action::Copy | Action::Move => {
                let target = self.target_path(item);
                self.count(item);

                if item.is_dir {
                    let create = Operation::new(
                        Opcode::CreateDir,
                        source.clone(),
                        item.attrs,
                        CREATE_DIR_WEIGHT,
                    )
                    .with_target(target);
                    self.append(create)?;

                    if self.snapshot.action == Action::Move {
                        let opcode = if item.is_dir_link() {
                            Opcode::DeleteDirLink
                        } else {
                            Opcode::DeleteDir
                        };
                        self.append(delete_op(opcode, source, item.attrs))?;
                    }
                    Ok(())
                } else {
                    let opcode = if self.snapshot.action == Action::Copy {
                        Opcode::CopyFile
                    } else {
                        Opcode::MoveFile
                    };
                    let weight = item.size.max(COPY_MIN_FILE_WEIGHT);
                    self.script.total_file_size += item.size;
                    let op = Operation::new(opcode, source, item.attrs, weight)
                        .with_target(target)
                        .with_file_size(item.size);
                    self.append(op)
                }
            }
            action => Err(BuildError::UnsupportedAction { action }),
        }
    }

    fn count(&mut self, item: &SnapshotItem) {
        if item.is_dir {
            self.script.dir_count += 1;
        } else {
            self.script.file_count += 1;
        }
    }

    fn append(&mut self, op: Operation) -> Result<(), BuildError> {
        if self.script.append(op) && self.script.is_good() {
            Ok(())
        } else {
            warn!(operations = self.script.len(), "Operation script exhausted");
            Err(BuildError::OutOfMemory)
        }
    }

    fn source_path(&self, item: &SnapshotItem) -> OpPath {
        let style = self.config.path_style;
        OpPath::new(
            style.join(&self.snapshot.source_path, &item.name),
            style.long_join(self.snapshot.source_wide(), item.wide_name()),
        )
    }

    fn target_path(&self, item: &SnapshotItem) -> OpPath {
        let style = self.config.path_style;
        let mask = &self.snapshot.mask;
        OpPath::new(
            style.join(&self.snapshot.target_path, &apply_mask(&item.name, mask)),
            style.long_join(
                self.snapshot.target_wide(),
                &apply_mask(item.wide_name(), mask),
            ),
        )
    }
}

fn delete_op(opcode: Opcode, source: OpPath, attrs: Attributes) -> Operation {
    let weight = opcode.fixed_weight().unwrap_or(COPY_MIN_FILE_WEIGHT);
    Operation::new(opcode, source, attrs, weight)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opscript_core::{DELETE_DIR_WEIGHT, PathStyle};

    fn windows() -> BuildConfig {
        BuildConfig::with_path_style(PathStyle::Windows)
    }

    #[test]
    fn test_clear_read_only_mask() {
        let snapshot = SelectionSnapshot::builder()
            .source_path(r"C:\S")
            .action(Action::Delete)
            .build()
            .unwrap();

        let mut config = windows();
        let policy = execution_policy(&snapshot, &config);
        assert_eq!(policy.clear_readonly_mask, Attributes(u32::MAX));

        config.clear_read_only = true;
        let policy = execution_policy(&snapshot, &config);
        assert!(!policy.clear_readonly_mask.contains(Attributes::READONLY));
        assert!(policy.clear_readonly_mask.contains(Attributes::ARCHIVE));
    }

    #[test]
    fn test_speed_limit_needs_enable() {
        let mut snapshot = SelectionSnapshot::builder()
            .source_path(r"C:\S")
            .action(Action::Delete)
            .build()
            .unwrap();
        snapshot.options.speed_limit = 4096;
        assert_eq!(execution_policy(&snapshot, &windows()).speed_limit, None);

        snapshot.options.use_speed_limit = true;
        assert_eq!(execution_policy(&snapshot, &windows()).speed_limit, Some(4096));
    }

    #[test]
    fn test_build_resets_state() {
        let snapshot = SelectionSnapshot::builder()
            .source_path(r"C:\S")
            .action(Action::Delete)
            .items(vec![SnapshotItem::dir("d")])
            .build()
            .unwrap();
        let mut state = BuildState::new();
        state.overwrite_skip_all = true;

        let script = build(&snapshot, &windows(), &mut state).unwrap();
        assert!(!state.overwrite_skip_all);
        assert_eq!(script.total_weight(), DELETE_DIR_WEIGHT);
    }
}
