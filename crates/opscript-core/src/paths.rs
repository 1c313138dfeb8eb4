//! Path joining and long-path normalization.

use serde::{Deserialize, Serialize};

/// Combined path length at which Windows-style paths get the long-path prefix.
pub const LONG_PATH_THRESHOLD: usize = 240;

/// Longest path addressable even with the long-path prefix.
pub const MAX_LONG_PATH: usize = 32767;

const LONG_PREFIX: &str = r"\\?\";
const LONG_UNC_PREFIX: &str = r"\\?\UNC\";

/// Path conventions of the host the script is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathStyle {
    /// Backslash separators, `\\?\` long-path prefix.
    Windows,
    /// Forward slash separators, no length limit to work around.
    Posix,
}

impl PathStyle {
    /// The style of the host we are compiled for.
    pub const fn native() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else {
            Self::Posix
        }
    }

    /// Path separator for this style.
    pub const fn separator(self) -> char {
        match self {
            Self::Windows => '\\',
            Self::Posix => '/',
        }
    }

    /// Join a directory and a name, adding a separator only if one is missing.
    pub fn join(self, dir: &str, name: &str) -> String {
        let sep = self.separator();
        let need_sep = !dir.is_empty() && !dir.ends_with(sep);

        let mut full = String::with_capacity(dir.len() + usize::from(need_sep) + name.len());
        full.push_str(dir);
        if need_sep {
            full.push(sep);
        }
        full.push_str(name);
        full
    }

    /// Normalize a full path so it stays addressable past the platform limit.
    ///
    /// Windows paths at or over [`LONG_PATH_THRESHOLD`] get `\\?\` (or
    /// `\\?\UNC\` for `\\server\share` paths). Already prefixed paths and
    /// Posix paths are returned unchanged.
    pub fn long_path(self, path: &str) -> String {
        match self {
            Self::Posix => path.to_string(),
            Self::Windows => {
                if path.chars().count() < LONG_PATH_THRESHOLD || has_long_prefix(path) {
                    return path.to_string();
                }
                match path.strip_prefix(r"\\") {
                    Some(unc) => format!("{LONG_UNC_PREFIX}{unc}"),
                    None => format!("{LONG_PREFIX}{path}"),
                }
            }
        }
    }

    /// Join and normalize in one step.
    pub fn long_join(self, dir: &str, name: &str) -> String {
        self.long_path(&self.join(dir, name))
    }
}

impl Default for PathStyle {
    fn default() -> Self {
        Self::native()
    }
}

/// Check if a path already carries the `\\?\` prefix.
pub fn has_long_prefix(path: &str) -> bool {
    path.starts_with(LONG_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_adds_missing_separator() {
        assert_eq!(PathStyle::Windows.join(r"C:\S", "a.txt"), r"C:\S\a.txt");
        assert_eq!(PathStyle::Windows.join(r"C:\", "a.txt"), r"C:\a.txt");
        assert_eq!(PathStyle::Posix.join("/tmp", "a.txt"), "/tmp/a.txt");
        assert_eq!(PathStyle::Posix.join("", "a.txt"), "a.txt");
    }

    #[test]
    fn test_short_path_has_no_prefix() {
        let path = PathStyle::Windows.long_join(r"C:\Users\test", "file.txt");
        assert_eq!(path, r"C:\Users\test\file.txt");
    }

    #[test]
    fn test_long_path_gets_prefix() {
        let dir = format!(r"C:\{}", "a".repeat(LONG_PATH_THRESHOLD));
        let path = PathStyle::Windows.long_join(&dir, "file.txt");
        assert!(path.starts_with(r"\\?\C:\"));
        assert!(path.ends_with(r"\file.txt"));
    }

    #[test]
    fn test_long_unc_path_gets_unc_prefix() {
        let dir = format!(r"\\server\share\{}", "x".repeat(LONG_PATH_THRESHOLD));
        let path = PathStyle::Windows.long_join(&dir, "file.txt");
        assert!(path.starts_with(r"\\?\UNC\server\share\"));
    }

    #[test]
    fn test_prefix_is_not_doubled() {
        let dir = format!(r"\\?\C:\{}", "a".repeat(LONG_PATH_THRESHOLD));
        let path = PathStyle::Windows.long_path(&dir);
        assert_eq!(path, dir);
    }

    #[test]
    fn test_posix_never_prefixes() {
        let dir = format!("/{}", "a".repeat(LONG_PATH_THRESHOLD * 2));
        assert_eq!(PathStyle::Posix.long_path(&dir), dir);
    }
}
