//! Selection snapshots: what the user selected and what they want done.

use chrono::{DateTime, Utc};
use compact_str::CompactString;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use crate::Attributes;

/// The action requested for a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Copy,
    Move,
    Delete,
    #[strum(to_string = "Count size")]
    CountSize,
    #[strum(to_string = "Change attributes")]
    ChangeAttrs,
    #[strum(to_string = "Change case")]
    ChangeCase,
    #[strum(to_string = "Recursive convert")]
    RecursiveConvert,
    Convert,
}

impl Action {
    /// Check if this action transfers items to a target directory.
    pub fn is_copy_or_move(self) -> bool {
        matches!(self, Self::Copy | Self::Move)
    }
}

/// One selected file or directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotItem {
    /// Name in the legacy (narrow) form.
    pub name: CompactString,
    /// Name in the wide form, when it differs from `name`.
    #[serde(default)]
    pub name_wide: Option<CompactString>,
    /// DOS 8.3 short name, if the volume has one.
    #[serde(default)]
    pub dos_name: Option<CompactString>,
    pub is_dir: bool,
    /// Size in bytes (0 for directories unless counted).
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub attrs: Attributes,
    #[serde(default)]
    pub last_write: Option<DateTime<Utc>>,
}

impl SnapshotItem {
    /// Create a file item.
    pub fn file(name: impl Into<CompactString>, size: u64) -> Self {
        Self {
            name: name.into(),
            name_wide: None,
            dos_name: None,
            is_dir: false,
            size,
            attrs: Attributes::ARCHIVE,
            last_write: None,
        }
    }

    /// Create a directory item.
    pub fn dir(name: impl Into<CompactString>) -> Self {
        Self {
            name: name.into(),
            name_wide: None,
            dos_name: None,
            is_dir: true,
            size: 0,
            attrs: Attributes::DIRECTORY,
            last_write: None,
        }
    }

    pub fn with_attrs(mut self, attrs: Attributes) -> Self {
        self.attrs = attrs;
        self
    }

    pub fn with_wide_name(mut self, name: impl Into<CompactString>) -> Self {
        self.name_wide = Some(name.into());
        self
    }

    pub fn with_dos_name(mut self, name: impl Into<CompactString>) -> Self {
        self.dos_name = Some(name.into());
        self
    }

    pub fn with_last_write(mut self, time: DateTime<Utc>) -> Self {
        self.last_write = Some(time);
        self
    }

    /// The wide name, falling back to the narrow one.
    pub fn wide_name(&self) -> &str {
        self.name_wide.as_deref().unwrap_or(&self.name)
    }

    /// Check if this item is a directory link (junction, symlink).
    pub fn is_dir_link(&self) -> bool {
        self.is_dir && self.attrs.is_reparse_point()
    }
}

/// Options chosen for the run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotOptions {
    /// Overwrite existing targets only when they are older than the source.
    pub overwrite_older: bool,
    /// Preserve security descriptors / permissions.
    pub copy_security: bool,
    /// Preserve archive, encrypted and compressed attributes.
    pub copy_attrs: bool,
    /// Preserve directory timestamps.
    pub preserve_dir_time: bool,
    /// Skip alternate data streams.
    pub ignore_ads: bool,
    /// Skip empty directories during copy.
    pub skip_empty_dirs: bool,
    /// Delete to the recycle bin.
    pub use_recycle_bin: bool,
    /// Invert the recycle bin setting for this run.
    pub invert_recycle_bin: bool,
    /// Start only when the system is idle.
    pub start_on_idle: bool,
    /// Enable the speed limit.
    pub use_speed_limit: bool,
    /// Speed limit in bytes per second.
    pub speed_limit: u32,
}

/// Attribute change payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttrChange {
    /// Bits kept (AND mask).
    pub attr_and: Attributes,
    /// Bits set (OR mask).
    pub attr_or: Attributes,
    pub sub_dirs: bool,
    pub change_compression: bool,
    pub change_encryption: bool,
}

/// Case change payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaseChange {
    /// Name format code.
    pub format: i32,
    /// Which part of the name to change.
    pub part: i32,
    pub sub_dirs: bool,
}

/// Byte conversion payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertTable {
    /// Byte mapping table (256 entries).
    pub table: Vec<u8>,
    /// End-of-file handling code.
    pub eof_type: i32,
}

impl Default for ConvertTable {
    fn default() -> Self {
        Self {
            table: (0..=u8::MAX).collect(),
            eof_type: 0,
        }
    }
}

/// Immutable capture of a selection plus the action to apply to it.
///
/// Once built, a snapshot does not refer back to whatever listing it was
/// taken from, so it can be queued and executed later.
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct SelectionSnapshot {
    /// Source directory (narrow form).
    pub source_path: String,

    /// Source directory (wide form).
    #[builder(default)]
    #[serde(default)]
    pub source_path_wide: Option<String>,

    pub action: Action,

    /// Selected items, in selection order.
    #[builder(default)]
    #[serde(default)]
    pub items: Vec<SnapshotItem>,

    /// Target directory (copy/move only).
    #[builder(default)]
    #[serde(default)]
    pub target_path: String,

    /// Target directory (wide form).
    #[builder(default)]
    #[serde(default)]
    pub target_path_wide: Option<String>,

    /// Target name mapping mask (copy/move only).
    #[builder(default = "\"*.*\".to_string()")]
    #[serde(default = "default_mask")]
    pub mask: String,

    #[builder(default)]
    #[serde(default)]
    pub options: SnapshotOptions,

    #[builder(default)]
    #[serde(default)]
    pub attr_change: AttrChange,

    #[builder(default)]
    #[serde(default)]
    pub case_change: CaseChange,

    #[builder(default)]
    #[serde(default)]
    pub convert: ConvertTable,
}

fn default_mask() -> String {
    "*.*".to_string()
}

impl SelectionSnapshotBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(action) = self.action {
            let target_missing = self.target_path.as_ref().is_none_or(|t| t.is_empty());
            if action.is_copy_or_move() && target_missing {
                return Err(format!("{action} requires a target path"));
            }
        }
        Ok(())
    }
}

impl SelectionSnapshot {
    /// Create a new snapshot builder.
    pub fn builder() -> SelectionSnapshotBuilder {
        SelectionSnapshotBuilder::default()
    }

    /// Source directory in wide form, falling back to the narrow one.
    pub fn source_wide(&self) -> &str {
        self.source_path_wide.as_deref().unwrap_or(&self.source_path)
    }

    /// Target directory in wide form, falling back to the narrow one.
    pub fn target_wide(&self) -> &str {
        self.target_path_wide.as_deref().unwrap_or(&self.target_path)
    }

    /// Number of selected files.
    pub fn file_count(&self) -> usize {
        self.items.iter().filter(|item| !item.is_dir).count()
    }

    /// Number of selected directories.
    pub fn dir_count(&self) -> usize {
        self.items.iter().filter(|item| item.is_dir).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let snapshot = SelectionSnapshot::builder()
            .source_path(r"C:\S")
            .action(Action::Delete)
            .build()
            .unwrap();

        assert_eq!(snapshot.mask, "*.*");
        assert!(snapshot.items.is_empty());
        assert!(!snapshot.options.use_recycle_bin);
        assert_eq!(snapshot.convert.table.len(), 256);
    }

    #[test]
    fn test_copy_requires_target() {
        let result = SelectionSnapshot::builder()
            .source_path(r"C:\S")
            .action(Action::Copy)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_counts() {
        let snapshot = SelectionSnapshot::builder()
            .source_path(r"C:\S")
            .action(Action::Delete)
            .items(vec![
                SnapshotItem::file("a.txt", 10),
                SnapshotItem::dir("sub"),
                SnapshotItem::file("b.txt", 20),
            ])
            .build()
            .unwrap();

        assert_eq!(snapshot.file_count(), 2);
        assert_eq!(snapshot.dir_count(), 1);
    }

    #[test]
    fn test_wide_name_fallback() {
        let plain = SnapshotItem::file("a.txt", 1);
        assert_eq!(plain.wide_name(), "a.txt");

        let wide = SnapshotItem::file("?.txt", 1).with_wide_name("ж.txt");
        assert_eq!(wide.wide_name(), "ж.txt");
    }

    #[test]
    fn test_dir_link_detection() {
        let link =
            SnapshotItem::dir("link").with_attrs(Attributes::DIRECTORY | Attributes::REPARSE_POINT);
        assert!(link.is_dir_link());
        assert!(!SnapshotItem::dir("plain").is_dir_link());
    }
}
