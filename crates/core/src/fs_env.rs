//! Filesystem abstraction
//!
//! Every component that touches the actual filesystem does so through this
//! trait rather than calling `std::fs` directly. TransactFs uses it as the
//! "actual" layer it diffs against and commits into; production code gets a
//! real OS-backed implementation, tests get an in-memory one. This mirrors
//! the dependency-injection envelope the rest of the tool carries for the
//! command runner (see [`crate::command_runner`]).

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

/// Minimal file metadata needed by TransactFs and the privilege checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileMeta {
    pub mode: u32,
    pub is_dir: bool,
    pub len: u64,
}

/// Abstraction over a filesystem, real or in-memory.
///
/// Implementations are intentionally narrow: TransactFs only ever needs to
/// read a whole file, write a whole file, stat, remove, and check
/// writability — it never needs streaming I/O against the actual layer.
pub trait FileSystem: Send + Sync {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
    fn write(&self, path: &Path, contents: &[u8], mode: u32) -> io::Result<()>;
    fn chmod(&self, path: &Path, mode: u32) -> io::Result<()>;
    fn remove_file(&self, path: &Path) -> io::Result<()>;
    fn remove_dir_all(&self, path: &Path) -> io::Result<()>;
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
    fn create_dir_all(&self, path: &Path, mode: u32) -> io::Result<()>;
    fn metadata(&self, path: &Path) -> io::Result<FileMeta>;
    fn exists(&self, path: &Path) -> bool;

    /// True if `path` can be written by the current process. Used by the
    /// privilege checker: never inferred from path prefix, always a real
    /// probe against the actual filesystem.
    fn is_writable(&self, path: &Path) -> bool;
}

/// Production filesystem backed by real OS calls.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn write(&self, path: &Path, contents: &[u8], mode: u32) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = tmp_sibling(path);
        std::fs::write(&tmp, contents)?;
        set_unix_mode(&tmp, mode)?;
        std::fs::rename(&tmp, path)
    }

    fn chmod(&self, path: &Path, mode: u32) -> io::Result<()> {
        set_unix_mode(path, mode)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        match std::fs::remove_dir_all(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        if let Some(parent) = to.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::rename(from, to)
    }

    fn create_dir_all(&self, path: &Path, mode: u32) -> io::Result<()> {
        std::fs::create_dir_all(path)?;
        set_unix_mode(path, mode)
    }

    fn metadata(&self, path: &Path) -> io::Result<FileMeta> {
        let meta = std::fs::metadata(path)?;
        Ok(FileMeta {
            mode: unix_mode(&meta),
            is_dir: meta.is_dir(),
            len: meta.len(),
        })
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_writable(&self, path: &Path) -> bool {
        probe_writable(path)
    }
}

#[cfg(unix)]
fn set_unix_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_unix_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn unix_mode(meta: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn unix_mode(_meta: &std::fs::Metadata) -> u32 {
    0o644
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "tmp".to_string());
    let tmp_name = format!(".{file_name}.alca-tmp-{}", std::process::id());
    path.with_file_name(tmp_name)
}

/// Probe write access the same way the privilege checker does: by actually
/// attempting a write (to the path itself if it exists, to its parent
/// directory otherwise) rather than guessing from ownership bits, which can
/// be wrong under ACLs, containers, or exotic filesystems.
fn probe_writable(path: &Path) -> bool {
    if path.exists() {
        return std::fs::OpenOptions::new()
            .write(true)
            .open(path)
            .is_ok();
    }
    let probe_dir = path.parent().unwrap_or(Path::new("."));
    if !probe_dir.exists() {
        return false;
    }
    let probe_file = probe_dir.join(format!(".alca-write-probe-{}", std::process::id()));
    match std::fs::File::create(&probe_file) {
        Ok(_) => {
            let _ = std::fs::remove_file(&probe_file);
            true
        }
        Err(_) => false,
    }
}

/// In-memory filesystem for tests. Stores both file contents/mode and
/// directory markers so that `metadata`/`exists` behave sensibly for
/// directories created via `create_dir_all`.
#[derive(Debug, Default)]
pub struct InMemoryFileSystem {
    inner: parking_lot::Mutex<InMemoryState>,
}

#[derive(Debug, Default)]
struct InMemoryState {
    files: BTreeMap<PathBuf, (Vec<u8>, u32)>,
    dirs: std::collections::BTreeSet<PathBuf>,
    /// Paths that should report as not writable, simulating a permission
    /// boundary so privilege-grouping logic can be exercised in tests.
    unwritable: std::collections::BTreeSet<PathBuf>,
}

impl InMemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the filesystem with an existing file, as if it always existed.
    pub fn seed_file(&self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>, mode: u32) {
        let path = path.into();
        let mut state = self.inner.lock();
        if let Some(parent) = path.parent() {
            mark_parents(&mut state.dirs, parent);
        }
        state.files.insert(path, (contents.into(), mode));
    }

    /// Mark a path (file or directory) as not writable and its parent as
    /// writable, so the privilege checker's fallback-to-parent logic can be
    /// exercised deterministically.
    pub fn mark_unwritable(&self, path: impl Into<PathBuf>) {
        self.inner.lock().unwritable.insert(path.into());
    }
}

fn mark_parents(dirs: &mut std::collections::BTreeSet<PathBuf>, mut dir: &Path) {
    loop {
        dirs.insert(dir.to_path_buf());
        match dir.parent() {
            Some(parent) if parent != dir => dir = parent,
            _ => break,
        }
    }
}

impl FileSystem for InMemoryFileSystem {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        let state = self.inner.lock();
        state
            .files
            .get(path)
            .map(|(bytes, _)| bytes.clone())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "not found"))
    }

    fn write(&self, path: &Path, contents: &[u8], mode: u32) -> io::Result<()> {
        let mut state = self.inner.lock();
        if let Some(parent) = path.parent() {
            mark_parents(&mut state.dirs, parent);
        }
        state.files.insert(path.to_path_buf(), (contents.to_vec(), mode));
        Ok(())
    }

    fn chmod(&self, path: &Path, mode: u32) -> io::Result<()> {
        let mut state = self.inner.lock();
        match state.files.get_mut(path) {
            Some((_, m)) => {
                *m = mode;
                Ok(())
            }
            None => Err(io::Error::new(io::ErrorKind::NotFound, "not found")),
        }
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        self.inner.lock().files.remove(path);
        Ok(())
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        let mut state = self.inner.lock();
        state.files.retain(|p, _| !p.starts_with(path));
        state.dirs.retain(|p| !p.starts_with(path));
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        let mut state = self.inner.lock();
        if let Some(entry) = state.files.remove(from) {
            if let Some(parent) = to.parent() {
                mark_parents(&mut state.dirs, parent);
            }
            state.files.insert(to.to_path_buf(), entry);
            Ok(())
        } else {
            Err(io::Error::new(io::ErrorKind::NotFound, "not found"))
        }
    }

    fn create_dir_all(&self, path: &Path, _mode: u32) -> io::Result<()> {
        let mut state = self.inner.lock();
        mark_parents(&mut state.dirs, path);
        Ok(())
    }

    fn metadata(&self, path: &Path) -> io::Result<FileMeta> {
        let state = self.inner.lock();
        if let Some((bytes, mode)) = state.files.get(path) {
            return Ok(FileMeta {
                mode: *mode,
                is_dir: false,
                len: bytes.len() as u64,
            });
        }
        if state.dirs.contains(path) {
            return Ok(FileMeta {
                mode: 0o755,
                is_dir: true,
                len: 0,
            });
        }
        Err(io::Error::new(io::ErrorKind::NotFound, "not found"))
    }

    fn exists(&self, path: &Path) -> bool {
        let state = self.inner.lock();
        state.files.contains_key(path) || state.dirs.contains(path)
    }

    fn is_writable(&self, path: &Path) -> bool {
        let state = self.inner.lock();
        if state.unwritable.contains(path) {
            return false;
        }
        if let Some(parent) = path.parent() {
            if state.unwritable.contains(parent) {
                return false;
            }
        }
        true
    }
}
