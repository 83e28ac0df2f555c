//! Sync-conflict cache: stale-while-revalidate persistence
//!
//! `<project>/.alca/sync-conflicts-cache.json` is written by the background
//! refresher only, and read by the foreground command that wants an
//! immediate (possibly stale) banner before a long-running operation
//! (§4.5, §6). This bypasses TransactFs entirely — the cache lives in the
//! project directory, never a privileged location, so there is nothing to
//! batch into a privileged commit (§5).

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::fs_env::FileSystem;
use crate::state::STATE_DIR;

pub const SYNC_CACHE_FILE: &str = "sync-conflicts-cache.json";
pub const SYNC_CACHE_FILE_MODE: u32 = 0o644;

use super::ConflictInfo;

/// The on-disk document: an `updatedAt` timestamp plus the conflicts
/// observed as of that timestamp.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncConflictCache {
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
    pub conflicts: Vec<ConflictInfo>,
}

impl SyncConflictCache {
    pub fn cache_path(project_dir: &Path) -> PathBuf {
        project_dir.join(STATE_DIR).join(SYNC_CACHE_FILE)
    }

    /// Read the cache document. An absent file yields `Ok(None)`, matching
    /// the state store's "absent is fine, not an error" convention.
    pub fn load<F: FileSystem>(fs: &F, project_dir: &Path) -> Result<Option<Self>> {
        let path = Self::cache_path(project_dir);
        match fs.read(&path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write the cache document for `conflicts`, stamped with the current
    /// time. Writes go straight through `fs` (not TransactFs): production's
    /// `RealFileSystem::write` already stages to a temp sibling and renames,
    /// satisfying the "readers never see a partially-written file"
    /// ordering guarantee (§5).
    pub fn save<F: FileSystem>(fs: &F, project_dir: &Path, conflicts: Vec<ConflictInfo>) -> Result<Self> {
        let doc = Self {
            updated_at: Utc::now(),
            conflicts,
        };
        let path = Self::cache_path(project_dir);
        fs.create_dir_all(project_dir.join(STATE_DIR).as_path(), 0o755)?;
        let bytes = serde_json::to_vec_pretty(&doc)?;
        fs.write(&path, &bytes, SYNC_CACHE_FILE_MODE)?;
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs_env::InMemoryFileSystem;
    use crate::sync::ConflictState;

    fn conflict() -> ConflictInfo {
        ConflictInfo {
            path: "src/config.yaml".to_string(),
            local_state: ConflictState::Modified,
            container_state: ConflictState::Modified,
            detected_at: Utc::now(),
            session: "alca-p-0".to_string(),
        }
    }

    #[test]
    fn test_load_on_fresh_project_is_none() {
        let fs = InMemoryFileSystem::new();
        assert!(SyncConflictCache::load(&fs, Path::new("/proj")).unwrap().is_none());
    }

    #[test]
    fn test_round_trip_preserves_updated_at_and_conflicts() {
        let fs = InMemoryFileSystem::new();
        let dir = Path::new("/proj");
        let saved = SyncConflictCache::save(&fs, dir, vec![conflict()]).unwrap();
        let loaded = SyncConflictCache::load(&fs, dir).unwrap().unwrap();
        assert_eq!(loaded.updated_at, saved.updated_at);
        assert_eq!(loaded.conflicts, saved.conflicts);
    }

    #[test]
    fn test_save_with_zero_conflicts_yields_empty_list_not_absent() {
        let fs = InMemoryFileSystem::new();
        let dir = Path::new("/proj");
        SyncConflictCache::save(&fs, dir, vec![]).unwrap();
        let loaded = SyncConflictCache::load(&fs, dir).unwrap().unwrap();
        assert!(loaded.conflicts.is_empty());
    }
}
