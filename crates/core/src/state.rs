//! Project state persistence
//!
//! Each project's identity and last-applied configuration is persisted as
//! `<project>/.alca/state.json`, written through TransactFs so it
//! participates in the same commit batch as any other filesystem effect of
//! the command that touched it (§3, §4.2).

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::config::ProjectConfig;
use crate::container::ContainerIdentity;
use crate::errors::Result;
use crate::fs_env::FileSystem;
use crate::transactfs::TransactFs;

/// Directory under the project root that holds all Alcatraz state.
pub const STATE_DIR: &str = ".alca";
pub const STATE_FILE: &str = "state.json";

pub const STATE_FILE_MODE: u32 = 0o644;
pub const STATE_DIR_MODE: u32 = 0o755;

/// A project's persisted identity and last-applied configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectState {
    pub project_id: String,
    pub container_name: String,
    pub created_at: DateTime<Utc>,
    pub runtime: String,
    /// Configuration as applied to the last successful rebuild. Absent for
    /// freshly created state before any rebuild has happened.
    pub config: Option<ProjectConfig>,
}

impl ProjectState {
    /// Generate a fresh state for a project that has never been brought up
    /// before.
    pub fn new(runtime: impl Into<String>) -> Self {
        let project_id = Uuid::new_v4().to_string();
        let container_name = ContainerIdentity::container_name_for(&project_id);
        Self {
            project_id,
            container_name,
            created_at: Utc::now(),
            runtime: runtime.into(),
            config: None,
        }
    }

    pub fn state_path(project_dir: &Path) -> PathBuf {
        project_dir.join(STATE_DIR).join(STATE_FILE)
    }
}

/// Loads and saves [`ProjectState`] through a [`TransactFs`] overlay.
pub struct StateStore;

impl StateStore {
    /// Read the state document for a project. An absent file yields `Ok(None)`,
    /// not an error (§4.2).
    #[instrument(skip(tfs))]
    pub fn load<F: FileSystem>(
        tfs: &TransactFs<F>,
        project_dir: &Path,
    ) -> Result<Option<ProjectState>> {
        let path = ProjectState::state_path(project_dir);
        match tfs.read(&path) {
            Ok(bytes) => {
                let state = serde_json::from_slice(&bytes)?;
                Ok(Some(state))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Stage a write of the state document. Does not commit; the caller's
    /// TransactFs commit batches this with any other effects of the
    /// enclosing command.
    #[instrument(skip(tfs, state))]
    pub fn save<F: FileSystem>(
        tfs: &TransactFs<F>,
        project_dir: &Path,
        state: &ProjectState,
    ) -> Result<()> {
        let path = ProjectState::state_path(project_dir);
        let bytes = serde_json::to_vec_pretty(state)?;
        tfs.mkdir_all(&project_dir.join(STATE_DIR), STATE_DIR_MODE)?;
        tfs.write(&path, &bytes, STATE_FILE_MODE)?;
        debug!(project_id = %state.project_id, "staged project state write");
        Ok(())
    }

    /// Load the existing state, or create a fresh one, returning whether it
    /// is newly created. If the existing state's `runtime` differs from
    /// `current_runtime`, it is updated and the caller must still call
    /// [`Self::save`] to persist the change.
    #[instrument(skip(tfs))]
    pub fn load_or_create<F: FileSystem>(
        tfs: &TransactFs<F>,
        project_dir: &Path,
        current_runtime: &str,
    ) -> Result<(ProjectState, bool)> {
        match Self::load(tfs, project_dir)? {
            Some(mut state) => {
                let runtime_changed = state.runtime != current_runtime;
                if runtime_changed {
                    state.runtime = current_runtime.to_string();
                    Self::save(tfs, project_dir, &state)?;
                }
                Ok((state, false))
            }
            None => {
                let state = ProjectState::new(current_runtime);
                Self::save(tfs, project_dir, &state)?;
                Ok((state, true))
            }
        }
    }
}
