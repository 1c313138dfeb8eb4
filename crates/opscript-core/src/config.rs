//! Build configuration: facts about where we're running.

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::PathStyle;

/// Environment facts and confirmation policy used when turning a snapshot
/// into an operation script.
///
/// Orthogonal to [`SelectionSnapshot`](crate::SelectionSnapshot): the
/// snapshot says what the user asked for, the config describes the volumes
/// and the standing preferences of the host.
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[builder(setter(into))]
#[serde(default)]
pub struct BuildConfig {
    /// Source volume supports alternate data streams.
    #[builder(default = "false")]
    pub source_supports_ads: bool,

    /// Target volume supports alternate data streams.
    #[builder(default = "false")]
    pub target_supports_ads: bool,

    /// Target volume is FAT32 (4 GiB file size limit).
    #[builder(default = "false")]
    pub target_is_fat32: bool,

    /// Target volume can hold encrypted files.
    #[builder(default = "true")]
    pub target_supports_encryption: bool,

    /// Clear the read-only attribute on copied files.
    #[builder(default = "false")]
    pub clear_read_only: bool,

    /// Allow moving a whole directory with a single rename.
    #[builder(default = "true")]
    pub fast_dir_move: bool,

    /// Confirm deletion of hidden or system directories.
    #[builder(default = "true")]
    pub confirm_delete_hidden_dir: bool,

    /// Confirm deletion of non-empty directories.
    #[builder(default = "true")]
    pub confirm_delete_nonempty_dir: bool,

    /// Confirm deletion of hidden or system files.
    #[builder(default = "true")]
    pub confirm_delete_hidden_file: bool,

    /// Path conventions used when materializing operation paths.
    #[builder(default)]
    pub path_style: PathStyle,
}

impl BuildConfig {
    /// Create a new config builder.
    pub fn builder() -> BuildConfigBuilder {
        BuildConfigBuilder::default()
    }

    /// Config with default policy and the given path style.
    pub fn with_path_style(path_style: PathStyle) -> Self {
        Self {
            path_style,
            ..Self::default()
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            source_supports_ads: false,
            target_supports_ads: false,
            target_is_fat32: false,
            target_supports_encryption: true,
            clear_read_only: false,
            fast_dir_move: true,
            confirm_delete_hidden_dir: true,
            confirm_delete_nonempty_dir: true,
            confirm_delete_hidden_file: true,
            path_style: PathStyle::native(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = BuildConfig::builder()
            .target_is_fat32(true)
            .clear_read_only(true)
            .path_style(PathStyle::Windows)
            .build()
            .unwrap();

        assert!(config.target_is_fat32);
        assert!(config.clear_read_only);
        assert!(config.confirm_delete_nonempty_dir);
        assert_eq!(config.path_style, PathStyle::Windows);
    }

    #[test]
    fn test_builder_matches_default() {
        let built = BuildConfig::builder().build().unwrap();
        assert_eq!(built, BuildConfig::default());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: BuildConfig =
            serde_json::from_str(r#"{ "target_is_fat32": true, "path_style": "posix" }"#).unwrap();
        assert!(config.target_is_fat32);
        assert!(config.fast_dir_move);
        assert_eq!(config.path_style, PathStyle::Posix);
    }
}
