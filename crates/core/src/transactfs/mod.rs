//! TransactFs: copy-on-write staged filesystem
//!
//! All writes land in an in-memory staged overlay first; reads consult
//! staged, then fall through to the actual filesystem. A commit computes
//! the minimal diff against actual and hands it to an executor, which is
//! the sole writer to actual (§4.1).

pub mod executor;
pub mod ops;
pub mod privilege;

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tracing::{debug, instrument};

use crate::errors::Result;
use crate::fs_env::FileSystem;
use crate::observability::transactfs_commit_span;
use crate::timed_span;

pub use executor::{Executor, InProcessExecutor, PrivilegedExecutor};
pub use ops::{FileOp, OpKind};

#[derive(Debug, Clone)]
struct StagedEntry {
    content: Vec<u8>,
    mode: u32,
}

#[derive(Default)]
struct Overlay {
    staged: BTreeMap<PathBuf, StagedEntry>,
    tombstones: BTreeSet<PathBuf>,
    /// Every path ever touched by a write/chmod/rename-target, tracked so
    /// `diff` knows which actual-filesystem paths to compare even when the
    /// staged content happens to equal what's already there.
    tracked: BTreeSet<PathBuf>,
}

/// The staged filesystem overlay, parameterized over the actual filesystem
/// implementation it diffs against and commits into.
pub struct TransactFs<F: FileSystem> {
    actual: F,
    overlay: RwLock<Overlay>,
}

impl<F: FileSystem> TransactFs<F> {
    pub fn new(actual: F) -> Self {
        Self {
            actual,
            overlay: RwLock::new(Overlay::default()),
        }
    }

    /// Read a path through the overlay: staged first, tombstone yields
    /// not-found regardless of actual, otherwise fall through to actual.
    pub fn read(&self, path: &Path) -> std::io::Result<Vec<u8>> {
        let overlay = self.overlay.read();
        if overlay.tombstones.contains(path) {
            return Err(std::io::Error::new(std::io::ErrorKind::NotFound, "tombstoned"));
        }
        if let Some(entry) = overlay.staged.get(path) {
            return Ok(entry.content.clone());
        }
        drop(overlay);
        self.actual.read(path)
    }

    /// Stat a path through the overlay, same precedence as `read`.
    pub fn stat(&self, path: &Path) -> std::io::Result<crate::fs_env::FileMeta> {
        let overlay = self.overlay.read();
        if overlay.tombstones.contains(path) {
            return Err(std::io::Error::new(std::io::ErrorKind::NotFound, "tombstoned"));
        }
        if let Some(entry) = overlay.staged.get(path) {
            return Ok(crate::fs_env::FileMeta {
                mode: entry.mode,
                is_dir: false,
                len: entry.content.len() as u64,
            });
        }
        drop(overlay);
        self.actual.metadata(path)
    }

    /// Write (create or update) a path in the staged overlay.
    pub fn write(&self, path: &Path, content: &[u8], mode: u32) -> Result<()> {
        let mut overlay = self.overlay.write();
        overlay.tombstones.remove(path);
        overlay.tracked.insert(path.to_path_buf());
        overlay.staged.insert(
            path.to_path_buf(),
            StagedEntry {
                content: content.to_vec(),
                mode,
            },
        );
        Ok(())
    }

    /// Change the mode of a path. If the path is only present in the actual
    /// filesystem, it is shadow-copied into staged first (copy-on-write).
    pub fn chmod(&self, path: &Path, mode: u32) -> Result<()> {
        let mut overlay = self.overlay.write();
        overlay.tombstones.remove(path);
        overlay.tracked.insert(path.to_path_buf());
        if let Some(entry) = overlay.staged.get_mut(path) {
            entry.mode = mode;
            return Ok(());
        }
        drop(overlay);
        let content = self.actual.read(path).unwrap_or_default();
        let mut overlay = self.overlay.write();
        overlay.staged.insert(path.to_path_buf(), StagedEntry { content, mode });
        Ok(())
    }

    /// Record a tombstone for `path`: further reads through this overlay
    /// fail not-found even if the path still exists in actual.
    pub fn remove(&self, path: &Path) -> Result<()> {
        let mut overlay = self.overlay.write();
        overlay.staged.remove(path);
        overlay.tracked.insert(path.to_path_buf());
        overlay.tombstones.insert(path.to_path_buf());
        Ok(())
    }

    /// Tombstone every tracked or actual path under `prefix`.
    pub fn remove_tree(&self, prefix: &Path) -> Result<()> {
        let mut overlay = self.overlay.write();
        let mut to_tombstone: Vec<PathBuf> = overlay
            .tracked
            .iter()
            .chain(overlay.staged.keys())
            .filter(|p| p.starts_with(prefix))
            .cloned()
            .collect();
        to_tombstone.push(prefix.to_path_buf());
        for path in to_tombstone {
            overlay.staged.remove(&path);
            overlay.tombstones.insert(path.clone());
            overlay.tracked.insert(path);
        }
        Ok(())
    }

    /// Rename a staged or actual path. The destination becomes a tracked
    /// staged entry; the source is tombstoned.
    pub fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let content = self.read(from)?;
        let mode = self.stat(from).map(|m| m.mode).unwrap_or(0o644);
        self.remove(from)?;
        self.write(to, &content, mode)?;
        Ok(())
    }

    /// Create a directory. Directories are not tracked as filesystem
    /// content (TransactFs only diffs files); this is a convenience used by
    /// callers that need a parent directory to exist with specific
    /// permissions on the actual filesystem after commit.
    pub fn mkdir_all(&self, path: &Path, mode: u32) -> Result<()> {
        self.actual.create_dir_all(path, mode)?;
        Ok(())
    }

    /// True iff a fresh diff yields any operations.
    pub fn needs_commit(&self) -> bool {
        !self.diff().is_empty()
    }

    /// Compute the minimal ordered list of operations to bring actual into
    /// agreement with staged, per the decision table in §4.1.
    pub fn diff(&self) -> Vec<FileOp> {
        let overlay = self.overlay.read();
        let mut ops = Vec::new();

        for path in &overlay.tombstones {
            if self.actual.exists(path) {
                ops.push(FileOp::delete(path.clone(), self.needs_privilege(path)));
            }
        }

        for path in &overlay.tracked {
            if overlay.tombstones.contains(path) {
                continue;
            }
            let Some(staged) = overlay.staged.get(path) else {
                continue;
            };
            let privileged = self.needs_privilege(path);
            if !self.actual.exists(path) {
                ops.push(FileOp::create(
                    path.clone(),
                    staged.content.clone(),
                    staged.mode,
                    privileged,
                ));
                continue;
            }
            let actual_content = self.actual.read(path).unwrap_or_default();
            if actual_content != staged.content {
                ops.push(FileOp::update(
                    path.clone(),
                    staged.content.clone(),
                    staged.mode,
                    privileged,
                ));
                continue;
            }
            let actual_mode = self.actual.metadata(path).map(|m| m.mode).unwrap_or(staged.mode);
            if actual_mode != staged.mode {
                ops.push(FileOp::chmod(path.clone(), staged.mode, privileged));
            }
        }

        ops
    }

    fn needs_privilege(&self, path: &Path) -> bool {
        !self.actual.is_writable(path)
    }

    /// Commit the current diff through `executor`. On success the staged
    /// layer and tombstone set are discarded atomically under the write
    /// lock. On error the staged state is left byte-for-byte unchanged.
    #[instrument(skip(self, executor))]
    pub async fn commit<E: Executor>(&self, executor: &E) -> Result<()> {
        let ops = self.diff();
        let timed = timed_span!(transactfs_commit_span(ops.len()));
        let result = async {
            if ops.is_empty() {
                debug!("nothing to commit");
                return Ok(());
            }
            executor.execute(&ops, &self.actual).await?;
            let mut overlay = self.overlay.write();
            overlay.staged.clear();
            overlay.tombstones.clear();
            overlay.tracked.clear();
            Ok(())
        }
        .await;
        timed.complete();
        result
    }

    /// Convenience for callers (tests, the state store in unprivileged
    /// contexts) that want an in-process, no-escalation commit.
    pub async fn commit_in_process(&self) -> Result<()> {
        self.commit(&InProcessExecutor).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs_env::InMemoryFileSystem;

    fn tfs() -> TransactFs<InMemoryFileSystem> {
        TransactFs::new(InMemoryFileSystem::new())
    }

    #[tokio::test]
    async fn test_copy_on_write_visibility() {
        let fs = InMemoryFileSystem::new();
        fs.seed_file("/etc/x", b"v1".to_vec(), 0o644);
        let tfs = TransactFs::new(fs);

        tfs.write(Path::new("/etc/x"), b"v2", 0o644).unwrap();
        assert_eq!(tfs.read(Path::new("/etc/x")).unwrap(), b"v2");
        assert_eq!(tfs.actual.read(Path::new("/etc/x")).unwrap(), b"v1");

        tfs.commit_in_process().await.unwrap();
        assert_eq!(tfs.actual.read(Path::new("/etc/x")).unwrap(), b"v2");
        assert!(!tfs.needs_commit());
    }

    #[test]
    fn test_tombstoned_read_fails_even_if_actual_exists() {
        let fs = InMemoryFileSystem::new();
        fs.seed_file("/a", b"x".to_vec(), 0o644);
        let tfs = TransactFs::new(fs);
        tfs.remove(Path::new("/a")).unwrap();
        assert!(tfs.read(Path::new("/a")).is_err());
    }

    #[tokio::test]
    async fn test_diff_is_empty_after_successful_commit() {
        let tfs = tfs();
        tfs.write(Path::new("/a"), b"x", 0o644).unwrap();
        assert!(tfs.needs_commit());
        tfs.commit_in_process().await.unwrap();
        assert_eq!(tfs.diff(), vec![]);
        assert!(!tfs.needs_commit());
    }

    #[tokio::test]
    async fn test_failed_commit_preserves_staged_state() {
        struct FailingExecutor;
        impl Executor for FailingExecutor {
            async fn execute(&self, _ops: &[FileOp], _fs: &dyn FileSystem) -> Result<()> {
                Err(crate::errors::AlcaError::external("test", "boom"))
            }
        }
        let tfs = tfs();
        tfs.write(Path::new("/a"), b"x", 0o644).unwrap();
        let before = tfs.diff();
        let result = tfs.commit(&FailingExecutor).await;
        assert!(result.is_err());
        assert_eq!(tfs.diff(), before);
    }

    #[test]
    fn test_chmod_only_diff_when_content_equal() {
        let fs = InMemoryFileSystem::new();
        fs.seed_file("/a", b"x".to_vec(), 0o644);
        let tfs = TransactFs::new(fs);
        tfs.chmod(Path::new("/a"), 0o600).unwrap();
        let ops = tfs.diff();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].kind, OpKind::Chmod);
        assert_eq!(ops[0].mode, 0o600);
    }

    #[test]
    fn test_privilege_bit_reflects_actual_writability() {
        let fs = InMemoryFileSystem::new();
        fs.create_dir_all(Path::new("/etc/alca"), 0o755).unwrap();
        fs.mark_unwritable(Path::new("/etc/alca"));
        let tfs = TransactFs::new(fs);
        tfs.write(Path::new("/etc/alca/rule"), b"x", 0o644).unwrap();
        let ops = tfs.diff();
        assert_eq!(ops.len(), 1);
        assert!(ops[0].needs_privilege);
    }
}
