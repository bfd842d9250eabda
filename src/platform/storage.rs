// TermSleuth - platform/storage.rs
//
// Hierarchical file-storage abstraction.
// The core layer only sees the `StorageProvider` trait, which keeps the
// enumerator and match engine testable without a real filesystem and lets
// other backends (network shares, archives) slot in later.
//
// `LocalStorage` is the std::fs implementation used by the CLI.

use std::fs;
use std::io::{self, Read};
use std::ops::Deref;
use std::path::{Path, PathBuf};

/// Kind of a directory child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// One child of a listed directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildEntry {
    pub name: String,
    pub kind: EntryKind,
    pub handle: PathBuf,
}

/// File contents returned by [`StorageProvider::read_bytes`].
///
/// Large files are memory-mapped so a multi-hundred-megabyte document does
/// not have to be copied onto the heap before extraction.
pub enum FileBytes {
    Owned(Vec<u8>),
    Mapped(memmap2::Mmap),
}

impl Deref for FileBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            FileBytes::Owned(v) => v,
            FileBytes::Mapped(m) => m,
        }
    }
}

impl std::fmt::Debug for FileBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            FileBytes::Owned(_) => "Owned",
            FileBytes::Mapped(_) => "Mapped",
        };
        write!(f, "FileBytes::{kind}({} bytes)", self.len())
    }
}

/// Storage operations the scan needs. Handles are paths; for local storage
/// they are absolute filesystem paths.
pub trait StorageProvider: Send + Sync {
    /// List the children of `dir` in the provider's native order.
    /// No ordering is guaranteed.
    fn list_children(&self, dir: &Path) -> io::Result<Vec<ChildEntry>>;

    /// True if `handle` refers to an existing directory.
    fn is_directory(&self, handle: &Path) -> io::Result<bool>;

    /// Read the full contents of a file.
    fn read_bytes(&self, file: &Path) -> io::Result<FileBytes>;

    /// Return the child directory `name` of `parent`, creating it if needed.
    fn ensure_directory(&self, parent: &Path, name: &str) -> io::Result<PathBuf>;

    /// Return a handle to file `name` in `dir`, creating it if needed.
    fn create_or_open_file(&self, dir: &Path, name: &str) -> io::Result<PathBuf>;

    /// Replace the contents of `file` with `bytes`.
    fn write_bytes(&self, file: &Path, bytes: &[u8]) -> io::Result<()>;
}

// =============================================================================
// Local filesystem
// =============================================================================

/// `StorageProvider` over the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    /// Files at or above this size are memory-mapped by `read_bytes`.
    pub large_file_threshold: u64,
}

impl Default for LocalStorage {
    fn default() -> Self {
        Self {
            large_file_threshold: crate::util::constants::DEFAULT_LARGE_FILE_THRESHOLD,
        }
    }
}

impl LocalStorage {
    pub fn new(large_file_threshold: u64) -> Self {
        Self {
            large_file_threshold,
        }
    }
}

/// Reject names that would escape the parent directory.
fn check_child_name(name: &str) -> io::Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid path component '{name}'"),
        ));
    }
    Ok(())
}

impl StorageProvider for LocalStorage {
    fn list_children(&self, dir: &Path) -> io::Result<Vec<ChildEntry>> {
        let mut children = Vec::new();
        for item in fs::read_dir(dir)? {
            let item = item?;
            // Symlinks are reported by file_type() as neither file nor dir
            // and are skipped, so links never cause cycles.
            let file_type = item.file_type()?;
            let kind = if file_type.is_dir() {
                EntryKind::Directory
            } else if file_type.is_file() {
                EntryKind::File
            } else {
                tracing::trace!(path = %item.path().display(), "Skipping non-regular entry");
                continue;
            };
            let name = match item.file_name().into_string() {
                Ok(n) => n,
                Err(raw) => {
                    tracing::debug!(name = ?raw, "Skipping non-UTF-8 name");
                    continue;
                }
            };
            children.push(ChildEntry {
                name,
                kind,
                handle: item.path(),
            });
        }
        Ok(children)
    }

    fn is_directory(&self, handle: &Path) -> io::Result<bool> {
        Ok(fs::metadata(handle)?.is_dir())
    }

    fn read_bytes(&self, file: &Path) -> io::Result<FileBytes> {
        let mut handle = fs::File::open(file)?;
        let size = handle.metadata()?.len();
        if size >= self.large_file_threshold && size > 0 {
            // SAFETY: the map is read-only and never outlives the scan of this
            // file. Concurrent external modification of the file could change
            // the mapped bytes; a scan tool reading already-written documents
            // accepts that risk.
            let map = unsafe { memmap2::Mmap::map(&handle)? };
            tracing::debug!(file = %file.display(), size, "Memory-mapped large file");
            return Ok(FileBytes::Mapped(map));
        }
        let mut buf = Vec::with_capacity(size as usize);
        handle.read_to_end(&mut buf)?;
        Ok(FileBytes::Owned(buf))
    }

    fn ensure_directory(&self, parent: &Path, name: &str) -> io::Result<PathBuf> {
        check_child_name(name)?;
        let path = parent.join(name);
        match fs::create_dir(&path) {
            Ok(()) => Ok(path),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && path.is_dir() => Ok(path),
            Err(e) => Err(e),
        }
    }

    fn create_or_open_file(&self, dir: &Path, name: &str) -> io::Result<PathBuf> {
        check_child_name(name)?;
        let path = dir.join(name);
        fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;
        Ok(path)
    }

    fn write_bytes(&self, file: &Path, bytes: &[u8]) -> io::Result<()> {
        fs::write(file, bytes)
    }
}
