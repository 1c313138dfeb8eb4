//! The file-system capability the worker runs against.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use opscript_core::Attributes;

/// What the worker needs to know about one directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryInfo {
    pub size: u64,
    pub attrs: Attributes,
    pub modified: Option<DateTime<Utc>>,
    pub is_dir: bool,
    pub is_symlink: bool,
}

/// File-system operations used while executing a script.
///
/// Paths are the long-path-safe forms stored in each operation.
pub trait FileSystem: Send + Sync {
    /// Metadata of the entry itself, not following links.
    fn symlink_metadata(&self, path: &str) -> io::Result<EntryInfo>;

    /// Metadata following links.
    fn metadata(&self, path: &str) -> io::Result<EntryInfo>;

    fn exists(&self, path: &str) -> bool {
        self.symlink_metadata(path).is_ok()
    }

    /// Whether both paths name the same existing file.
    fn is_same_file(&self, a: &str, b: &str) -> bool {
        a == b
    }

    fn set_attributes(&self, path: &str, attrs: Attributes) -> io::Result<()>;

    fn set_modified(&self, path: &str, time: DateTime<Utc>) -> io::Result<()>;

    fn copy_permissions(&self, source: &str, target: &str) -> io::Result<()>;

    fn remove_file(&self, path: &str) -> io::Result<()>;

    fn remove_dir(&self, path: &str) -> io::Result<()>;

    fn remove_dir_all(&self, path: &str) -> io::Result<()>;

    /// Remove a directory link without touching what it points to.
    fn remove_dir_link(&self, path: &str) -> io::Result<()>;

    fn move_to_trash(&self, path: &str) -> io::Result<()>;

    fn create_dir(&self, path: &str) -> io::Result<()>;

    fn rename(&self, from: &str, to: &str) -> io::Result<()>;

    fn open_read(&self, path: &str) -> io::Result<Box<dyn Read + Send>>;

    /// Create or truncate a file for writing.
    fn create_write(&self, path: &str) -> io::Result<Box<dyn Write + Send>>;

    fn read_dir_names(&self, path: &str) -> io::Result<Vec<String>>;

    /// Names of the alternate data streams of a file.
    fn alternate_streams(&self, _path: &str) -> io::Result<Vec<String>> {
        Ok(Vec::new())
    }

    fn open_stream_read(&self, _path: &str, _stream: &str) -> io::Result<Box<dyn Read + Send>> {
        Err(io::Error::from(io::ErrorKind::Unsupported))
    }

    fn create_stream_write(
        &self,
        _path: &str,
        _stream: &str,
    ) -> io::Result<Box<dyn Write + Send>> {
        Err(io::Error::from(io::ErrorKind::Unsupported))
    }

    fn stream_exists(&self, _path: &str, _stream: &str) -> bool {
        false
    }
}

/// [`FileSystem`] backed by `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdFileSystem;

impl StdFileSystem {
    pub fn new() -> Self {
        Self
    }
}

fn entry_info(path: &str, metadata: &fs::Metadata, is_symlink: bool) -> EntryInfo {
    EntryInfo {
        size: if metadata.is_dir() { 0 } else { metadata.len() },
        attrs: attributes_of(path, metadata, is_symlink),
        modified: metadata.modified().ok().map(DateTime::<Utc>::from),
        is_dir: metadata.is_dir(),
        is_symlink,
    }
}

#[cfg(windows)]
fn attributes_of(_path: &str, metadata: &fs::Metadata, _is_symlink: bool) -> Attributes {
    use std::os::windows::fs::MetadataExt;
    Attributes::from_bits(metadata.file_attributes())
}

#[cfg(not(windows))]
fn attributes_of(path: &str, metadata: &fs::Metadata, is_symlink: bool) -> Attributes {
    let mut attrs = Attributes::NONE;
    if metadata.permissions().readonly() {
        attrs = attrs | Attributes::READONLY;
    }
    if metadata.is_dir() {
        attrs = attrs | Attributes::DIRECTORY;
    } else {
        attrs = attrs | Attributes::ARCHIVE;
    }
    if is_symlink {
        attrs = attrs | Attributes::REPARSE_POINT;
    }
    let name = std::path::Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");
    if name.starts_with('.') {
        attrs = attrs | Attributes::HIDDEN;
    }
    attrs
}

#[cfg(unix)]
fn same_file(a: &str, b: &str) -> io::Result<bool> {
    use std::os::unix::fs::MetadataExt;
    let (a, b) = (fs::metadata(a)?, fs::metadata(b)?);
    Ok(a.dev() == b.dev() && a.ino() == b.ino())
}

#[cfg(not(unix))]
fn same_file(a: &str, b: &str) -> io::Result<bool> {
    Ok(fs::canonicalize(a)? == fs::canonicalize(b)?)
}

#[cfg(unix)]
fn apply_readonly(perms: &mut fs::Permissions, readonly: bool) {
    use std::os::unix::fs::PermissionsExt;
    let mode = perms.mode();
    let mode = if readonly { mode & !0o222 } else { mode | 0o200 };
    perms.set_mode(mode);
}

#[cfg(not(unix))]
fn apply_readonly(perms: &mut fs::Permissions, readonly: bool) {
    perms.set_readonly(readonly);
}

#[cfg(windows)]
fn stream_path(path: &str, stream: &str) -> String {
    format!("{path}:{stream}")
}

impl FileSystem for StdFileSystem {
    fn symlink_metadata(&self, path: &str) -> io::Result<EntryInfo> {
        let metadata = fs::symlink_metadata(path)?;
        let is_symlink = metadata.file_type().is_symlink();
        if is_symlink {
            // Report the link as a directory when it points at one.
            let is_dir = fs::metadata(path).map(|m| m.is_dir()).unwrap_or(false);
            let mut info = entry_info(path, &metadata, true);
            info.is_dir = is_dir;
            if is_dir {
                info.attrs = info.attrs.with(Attributes::DIRECTORY);
            }
            return Ok(info);
        }
        Ok(entry_info(path, &metadata, false))
    }

    fn metadata(&self, path: &str) -> io::Result<EntryInfo> {
        let metadata = fs::metadata(path)?;
        Ok(entry_info(path, &metadata, false))
    }

    fn is_same_file(&self, a: &str, b: &str) -> bool {
        same_file(a, b).unwrap_or(false)
    }

    fn set_attributes(&self, path: &str, attrs: Attributes) -> io::Result<()> {
        let mut perms = fs::metadata(path)?.permissions();
        let readonly = attrs.contains(Attributes::READONLY);
        if perms.readonly() == readonly {
            return Ok(());
        }
        apply_readonly(&mut perms, readonly);
        fs::set_permissions(path, perms)
    }

    fn set_modified(&self, path: &str, time: DateTime<Utc>) -> io::Result<()> {
        let time = SystemTime::from(time);

        #[cfg(windows)]
        let file = {
            use std::os::windows::fs::OpenOptionsExt;
            const FILE_FLAG_BACKUP_SEMANTICS: u32 = 0x0200_0000;
            fs::OpenOptions::new()
                .write(true)
                .custom_flags(FILE_FLAG_BACKUP_SEMANTICS)
                .open(path)?
        };
        #[cfg(not(windows))]
        let file = File::open(path)?;

        file.set_modified(time)
    }

    fn copy_permissions(&self, source: &str, target: &str) -> io::Result<()> {
        let perms = fs::metadata(source)?.permissions();
        fs::set_permissions(target, perms)
    }

    fn remove_file(&self, path: &str) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn remove_dir(&self, path: &str) -> io::Result<()> {
        fs::remove_dir(path)
    }

    fn remove_dir_all(&self, path: &str) -> io::Result<()> {
        fs::remove_dir_all(path)
    }

    fn remove_dir_link(&self, path: &str) -> io::Result<()> {
        // Directory symlinks and junctions are directories on Windows,
        // plain files everywhere else.
        if cfg!(windows) {
            fs::remove_dir(path)
        } else {
            fs::remove_file(path)
        }
    }

    fn move_to_trash(&self, path: &str) -> io::Result<()> {
        trash::delete(path).map_err(|e| io::Error::other(e.to_string()))
    }

    fn create_dir(&self, path: &str) -> io::Result<()> {
        fs::create_dir(path)
    }

    fn rename(&self, from: &str, to: &str) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn open_read(&self, path: &str) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(File::open(path)?))
    }

    fn create_write(&self, path: &str) -> io::Result<Box<dyn Write + Send>> {
        Ok(Box::new(File::create(path)?))
    }

    fn read_dir_names(&self, path: &str) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    #[cfg(windows)]
    fn open_stream_read(&self, path: &str, stream: &str) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(File::open(stream_path(path, stream))?))
    }

    #[cfg(windows)]
    fn create_stream_write(&self, path: &str, stream: &str) -> io::Result<Box<dyn Write + Send>> {
        Ok(Box::new(File::create(stream_path(path, stream))?))
    }

    #[cfg(windows)]
    fn stream_exists(&self, path: &str, stream: &str) -> bool {
        fs::metadata(stream_path(path, stream)).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn path_str(dir: &TempDir, name: &str) -> String {
        dir.path().join(name).to_string_lossy().into_owned()
    }

    #[test]
    fn test_metadata_of_file_and_dir() {
        let temp = TempDir::new().unwrap();
        let file = path_str(&temp, "a.txt");
        std::fs::write(&file, b"hello").unwrap();
        let dir = path_str(&temp, "sub");
        std::fs::create_dir(&dir).unwrap();

        let fs = StdFileSystem::new();
        let info = fs.symlink_metadata(&file).unwrap();
        assert_eq!(info.size, 5);
        assert!(!info.is_dir);
        assert!(info.modified.is_some());

        let info = fs.symlink_metadata(&dir).unwrap();
        assert!(info.is_dir);
        assert!(info.attrs.contains(Attributes::DIRECTORY));
    }

    #[test]
    fn test_readonly_round_trip() {
        let temp = TempDir::new().unwrap();
        let file = path_str(&temp, "ro.txt");
        std::fs::write(&file, b"x").unwrap();

        let fs = StdFileSystem::new();
        fs.set_attributes(&file, Attributes::READONLY).unwrap();
        assert!(fs.metadata(&file).unwrap().attrs.contains(Attributes::READONLY));

        fs.set_attributes(&file, Attributes::NONE).unwrap();
        assert!(!fs.metadata(&file).unwrap().attrs.contains(Attributes::READONLY));
    }

    #[test]
    fn test_set_modified() {
        let temp = TempDir::new().unwrap();
        let file = path_str(&temp, "t.txt");
        std::fs::write(&file, b"x").unwrap();

        let fs = StdFileSystem::new();
        let when = DateTime::<Utc>::from_timestamp(1_600_000_000, 0).unwrap();
        fs.set_modified(&file, when).unwrap();
        assert_eq!(fs.metadata(&file).unwrap().modified, Some(when));
    }

    #[test]
    fn test_read_dir_names_sorted() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("b"), b"").unwrap();
        std::fs::write(temp.path().join("a"), b"").unwrap();

        let fs = StdFileSystem::new();
        let names = fs.read_dir_names(&temp.path().to_string_lossy()).unwrap();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_same_file_through_another_path() {
        let temp = TempDir::new().unwrap();
        let file = path_str(&temp, "a.txt");
        std::fs::write(&file, b"x").unwrap();
        std::fs::create_dir(temp.path().join("sub")).unwrap();
        let detour = path_str(&temp, "sub/../a.txt");

        let fs = StdFileSystem::new();
        assert!(fs.is_same_file(&file, &detour));
        assert!(!fs.is_same_file(&file, &path_str(&temp, "missing.txt")));
    }

    #[test]
    fn test_no_streams_by_default() {
        let temp = TempDir::new().unwrap();
        let file = path_str(&temp, "a.txt");
        std::fs::write(&file, b"x").unwrap();

        let fs = StdFileSystem::new();
        assert!(fs.alternate_streams(&file).unwrap().is_empty());
    }
}
