use opscript_core::{
    Action, Attributes, BuildConfig, BuildError, BuildState, COPY_MIN_FILE_WEIGHT,
    CREATE_DIR_WEIGHT, DELETE_DIR_LINK_WEIGHT, DELETE_DIR_WEIGHT, DELETE_FILE_WEIGHT,
    LONG_PATH_THRESHOLD, Opcode, OperationScript, OperationStatus, PathStyle, SelectionSnapshot,
    SnapshotItem, has_long_prefix,
};
use opscript_ops::{build, build_into};

fn windows() -> BuildConfig {
    BuildConfig::with_path_style(PathStyle::Windows)
}

fn mixed_items() -> Vec<SnapshotItem> {
    vec![
        SnapshotItem::file("a.txt", 500),
        SnapshotItem::dir("sub"),
        SnapshotItem::file("big.bin", 10 * 1024 * 1024),
        SnapshotItem::dir("link").with_attrs(Attributes::DIRECTORY | Attributes::REPARSE_POINT),
        SnapshotItem::file("empty", 0),
    ]
}

fn snapshot(action: Action) -> SelectionSnapshot {
    let mut builder = SelectionSnapshot::builder();
    builder
        .source_path(r"C:\S")
        .action(action)
        .items(mixed_items());
    if action.is_copy_or_move() {
        builder.target_path(r"D:\T");
    }
    builder.build().unwrap()
}

#[test]
fn test_copy_single_file() {
    let snapshot = SelectionSnapshot::builder()
        .source_path(r"C:\S")
        .action(Action::Copy)
        .target_path(r"D:\T")
        .items(vec![SnapshotItem::file("a.txt", 500)])
        .build()
        .unwrap();

    let script = build(&snapshot, &windows(), &mut BuildState::new()).unwrap();

    assert_eq!(script.len(), 1);
    let op = &script.operations()[0];
    assert_eq!(op.opcode, Opcode::CopyFile);
    assert_eq!(op.weight, 500u64.max(COPY_MIN_FILE_WEIGHT));
    assert_eq!(op.file_size, 500);
    assert_eq!(op.source.name, r"C:\S\a.txt");
    assert_eq!(op.target.as_ref().unwrap().name, r"D:\T\a.txt");
    assert_eq!(op.status, OperationStatus::Pending);
    assert_eq!(script.total_file_size, 500);
    assert!(script.is_copy);
    assert!(script.is_copy_or_move);
}

#[test]
fn test_move_empty_directory() {
    let snapshot = SelectionSnapshot::builder()
        .source_path(r"C:\S")
        .action(Action::Move)
        .target_path(r"D:\T")
        .items(vec![SnapshotItem::dir("sub")])
        .build()
        .unwrap();

    let script = build(&snapshot, &windows(), &mut BuildState::new()).unwrap();
    let ops = script.operations();

    assert_eq!(ops.len(), 2);
    assert_eq!(ops[0].opcode, Opcode::CreateDir);
    assert_eq!(ops[0].source.name, r"C:\S\sub");
    assert_eq!(ops[0].target.as_ref().unwrap().name, r"D:\T\sub");
    assert_eq!(ops[0].weight, CREATE_DIR_WEIGHT);
    assert_eq!(ops[1].opcode, Opcode::DeleteDir);
    assert_eq!(ops[1].source.name, r"C:\S\sub");
    assert!(ops[1].target.is_none());
    assert!(!script.is_copy);
    assert!(script.is_copy_or_move);
}

#[test]
fn test_delete_directory_link() {
    let snapshot = SelectionSnapshot::builder()
        .source_path(r"C:\S")
        .action(Action::Delete)
        .items(vec![
            SnapshotItem::dir("j").with_attrs(Attributes::DIRECTORY | Attributes::REPARSE_POINT),
        ])
        .build()
        .unwrap();

    let script = build(&snapshot, &windows(), &mut BuildState::new()).unwrap();

    assert_eq!(script.len(), 1);
    assert_eq!(script.operations()[0].opcode, Opcode::DeleteDirLink);
    assert_eq!(script.operations()[0].weight, DELETE_DIR_LINK_WEIGHT);
    assert_eq!(script.dir_count, 1);
}

#[test]
fn test_change_attrs_is_rejected() {
    let snapshot = SelectionSnapshot::builder()
        .source_path(r"C:\S")
        .action(Action::ChangeAttrs)
        .items(mixed_items())
        .build()
        .unwrap();

    let err = build(&snapshot, &windows(), &mut BuildState::new()).unwrap_err();
    assert!(err.is_unsupported());
    assert!(matches!(
        err,
        BuildError::UnsupportedAction {
            action: Action::ChangeAttrs
        }
    ));
}

#[test]
fn test_other_actions_are_rejected() {
    for action in [
        Action::CountSize,
        Action::ChangeCase,
        Action::RecursiveConvert,
        Action::Convert,
    ] {
        let snapshot = SelectionSnapshot::builder()
            .source_path(r"C:\S")
            .action(action)
            .build()
            .unwrap();
        assert!(build(&snapshot, &windows(), &mut BuildState::new()).is_err());
    }
}

#[test]
fn test_build_is_deterministic() {
    for action in [Action::Copy, Action::Move, Action::Delete] {
        let snapshot = snapshot(action);
        let first = build(&snapshot, &windows(), &mut BuildState::new()).unwrap();
        let second = build(&snapshot, &windows(), &mut BuildState::new()).unwrap();

        assert_eq!(first.operations(), second.operations());
        assert_eq!(first.total_weight(), second.total_weight());
    }
}

#[test]
fn test_counts_are_conserved() {
    for action in [Action::Copy, Action::Move, Action::Delete] {
        let snapshot = snapshot(action);
        let script = build(&snapshot, &windows(), &mut BuildState::new()).unwrap();

        assert_eq!(script.file_count, snapshot.file_count());
        assert_eq!(script.dir_count, snapshot.dir_count());
    }
}

#[test]
fn test_weight_is_conserved() {
    for action in [Action::Copy, Action::Move, Action::Delete] {
        let script = build(&snapshot(action), &windows(), &mut BuildState::new()).unwrap();
        let sum: u64 = script.iter().map(|op| op.weight).sum();
        assert_eq!(script.total_weight(), sum);
    }
}

#[test]
fn test_delete_weights_are_fixed() {
    let script = build(&snapshot(Action::Delete), &windows(), &mut BuildState::new()).unwrap();
    let opcodes: Vec<_> = script.iter().map(|op| op.opcode).collect();

    assert_eq!(
        opcodes,
        vec![
            Opcode::DeleteFile,
            Opcode::DeleteDir,
            Opcode::DeleteFile,
            Opcode::DeleteDirLink,
            Opcode::DeleteFile,
        ]
    );
    assert_eq!(
        script.total_weight(),
        3 * DELETE_FILE_WEIGHT + DELETE_DIR_WEIGHT + DELETE_DIR_LINK_WEIGHT
    );
    assert_eq!(script.total_file_size, 0);
}

#[test]
fn test_move_creates_before_deleting() {
    let script = build(&snapshot(Action::Move), &windows(), &mut BuildState::new()).unwrap();
    let ops = script.operations();

    for (create_index, create) in ops.iter().enumerate() {
        if create.opcode != Opcode::CreateDir {
            continue;
        }
        let delete_index = ops
            .iter()
            .position(|op| op.opcode.is_delete() && op.source == create.source)
            .unwrap();
        assert!(create_index < delete_index);
    }
    assert_eq!(ops[1].opcode, Opcode::CreateDir);
    assert_eq!(ops[2].opcode, Opcode::DeleteDir);
    assert_eq!(ops[4].opcode, Opcode::CreateDir);
    assert_eq!(ops[5].opcode, Opcode::DeleteDirLink);
}

#[test]
fn test_file_weight_has_a_floor() {
    let script = build(&snapshot(Action::Copy), &windows(), &mut BuildState::new()).unwrap();
    let files: Vec<_> = script.iter().filter(|op| op.opcode == Opcode::CopyFile).collect();

    assert_eq!(files.len(), 3);
    assert_eq!(files[0].weight, COPY_MIN_FILE_WEIGHT);
    assert_eq!(files[1].weight, 10 * 1024 * 1024);
    assert_eq!(files[2].weight, COPY_MIN_FILE_WEIGHT);
    assert_eq!(script.total_file_size, 500 + 10 * 1024 * 1024);
}

#[test]
fn test_long_paths_get_prefix() {
    let long_dir = format!(r"C:\{}", "d".repeat(LONG_PATH_THRESHOLD));
    let snapshot = SelectionSnapshot::builder()
        .source_path(long_dir.clone())
        .action(Action::Copy)
        .target_path(r"D:\T")
        .items(vec![SnapshotItem::file("a.txt", 1)])
        .build()
        .unwrap();

    let script = build(&snapshot, &windows(), &mut BuildState::new()).unwrap();
    let op = &script.operations()[0];

    assert!(has_long_prefix(&op.source.wide));
    assert!(op.source.wide.ends_with(r"\a.txt"));
    assert!(!has_long_prefix(&op.source.name));
    assert!(!has_long_prefix(&op.target.as_ref().unwrap().wide));
    assert_eq!(op.source.io_path(), op.source.wide);
}

#[test]
fn test_mask_renames_targets() {
    let snapshot = SelectionSnapshot::builder()
        .source_path(r"C:\S")
        .action(Action::Copy)
        .target_path(r"D:\T")
        .mask("*.bak")
        .items(vec![SnapshotItem::file("report.txt", 10)])
        .build()
        .unwrap();

    let script = build(&snapshot, &windows(), &mut BuildState::new()).unwrap();
    let op = &script.operations()[0];

    assert_eq!(op.source.name, r"C:\S\report.txt");
    assert_eq!(op.target.as_ref().unwrap().name, r"D:\T\report.bak");
}

#[test]
fn test_wide_names_are_used_for_wide_paths() {
    let snapshot = SelectionSnapshot::builder()
        .source_path(r"C:\S")
        .action(Action::Delete)
        .items(vec![SnapshotItem::file("R~1.TXT", 10).with_wide_name("résumé.txt")])
        .build()
        .unwrap();

    let script = build(&snapshot, &windows(), &mut BuildState::new()).unwrap();
    let op = &script.operations()[0];

    assert_eq!(op.source.name, r"C:\S\R~1.TXT");
    assert_eq!(op.source.wide, r"C:\S\résumé.txt");
}

#[test]
fn test_work_paths_are_registered() {
    let script = build(&snapshot(Action::Copy), &windows(), &mut BuildState::new()).unwrap();
    assert_eq!(script.work_paths, vec![r"C:\S".to_string(), r"D:\T".to_string()]);

    let script = build(&snapshot(Action::Delete), &windows(), &mut BuildState::new()).unwrap();
    assert_eq!(script.work_paths, vec![r"C:\S".to_string()]);
}

#[test]
fn test_exhausted_script_fails_the_build() {
    let result = build_into(
        OperationScript::with_capacity_limit(2),
        &snapshot(Action::Copy),
        &windows(),
        &mut BuildState::new(),
    );

    assert!(matches!(result, Err(BuildError::OutOfMemory)));
}

#[test]
fn test_policy_comes_from_options_and_config() {
    let mut snapshot = snapshot(Action::Delete);
    snapshot.options.use_recycle_bin = true;
    snapshot.options.overwrite_older = true;

    let mut config = windows();
    config.confirm_delete_nonempty_dir = false;
    config.target_is_fat32 = true;

    let script = build(&snapshot, &config, &mut BuildState::new()).unwrap();

    assert!(script.policy.recycle());
    assert!(script.policy.overwrite_older);
    assert!(!script.policy.confirm_delete_nonempty_dir);
    assert!(script.policy.target_is_fat32);
}
