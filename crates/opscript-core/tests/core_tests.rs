use opscript_core::{
    Action, Attributes, BuildConfig, OpPath, Opcode, Operation, OperationScript, OperationStatus,
    PathStyle, SelectionSnapshot, SnapshotItem, apply_mask,
};

#[test]
fn test_snapshot_serialization_round_trip() {
    let snapshot = SelectionSnapshot::builder()
        .source_path(r"C:\S")
        .action(Action::Copy)
        .target_path(r"D:\T")
        .items(vec![
            SnapshotItem::file("a.txt", 500),
            SnapshotItem::dir("sub").with_dos_name("SUB"),
        ])
        .build()
        .unwrap();

    let json = serde_json::to_string(&snapshot).unwrap();
    let restored: SelectionSnapshot = serde_json::from_str(&json).unwrap();

    assert_eq!(restored, snapshot);
    assert_eq!(restored.items[1].dos_name.as_deref(), Some("SUB"));
}

#[test]
fn test_snapshot_is_independent_of_source_listing() {
    let mut listing = vec![SnapshotItem::file("a.txt", 1)];
    let snapshot = SelectionSnapshot::builder()
        .source_path("/s")
        .action(Action::Delete)
        .items(listing.clone())
        .build()
        .unwrap();

    listing.clear();
    listing.push(SnapshotItem::file("other", 2));

    assert_eq!(snapshot.items.len(), 1);
    assert_eq!(snapshot.items[0].name, "a.txt");
}

#[test]
fn test_minimal_snapshot_json() {
    let snapshot: SelectionSnapshot = serde_json::from_str(
        r#"{
            "source_path": "/s",
            "action": "move",
            "target_path": "/t",
            "items": [{ "name": "x", "is_dir": false, "size": 3 }]
        }"#,
    )
    .unwrap();

    assert_eq!(snapshot.action, Action::Move);
    assert_eq!(snapshot.mask, "*.*");
    assert_eq!(snapshot.items[0].attrs, Attributes::NONE);
}

#[test]
fn test_script_status_updates() {
    let mut script = OperationScript::new();
    let op = Operation::new(
        Opcode::CreateDir,
        OpPath::new("/s/d", "/s/d"),
        Attributes::DIRECTORY,
        Opcode::CreateDir.fixed_weight().unwrap(),
    )
    .with_target(OpPath::new("/t/d", "/t/d"));
    assert!(script.append(op));

    script.set_status(0, OperationStatus::Done);
    // Out of range is ignored.
    script.set_status(7, OperationStatus::Failed);

    assert_eq!(script.count_status(OperationStatus::Done), 1);
    assert_eq!(script.count_status(OperationStatus::Failed), 0);
}

#[test]
fn test_config_and_paths_work_together() {
    let config = BuildConfig::with_path_style(PathStyle::Windows);
    let long_dir = format!(r"C:\{}", "d".repeat(250));

    let wide = config.path_style.long_join(&long_dir, "a.txt");
    assert!(wide.starts_with(r"\\?\C:\"));
    assert!(wide.ends_with(r"\a.txt"));

    let short = config.path_style.long_join(r"C:\S", "a.txt");
    assert_eq!(short, r"C:\S\a.txt");
}

#[test]
fn test_mask_examples() {
    assert_eq!(apply_mask("report.txt", "*.bak"), "report.bak");
    assert_eq!(apply_mask("report.txt", "old_*.*"), "old_report.txt");
    assert_eq!(apply_mask("report.txt", "*."), "report");
}
