//! CLI-backed sync session client
//!
//! Shells out to a `mutagen`-compatible executable through a
//! [`CommandRunner`], mirroring [`crate::docker::CliRuntime`]'s shape: the
//! core never re-implements the sync algorithm (§1's Non-goal), it only
//! parses the daemon's own session listing.

use std::sync::Arc;

use serde::Deserialize;
use tracing::instrument;

use crate::command_runner::{Command, CommandRunner};
use crate::errors::{AlcaError, Result};

use super::{RawConflict, SessionDocument, SyncSessionClient};

/// One entry of `sync list --template '{{json .}}'`'s JSON array: a session
/// name plus its raw conflicts, already shaped like [`RawConflict`].
#[derive(Debug, Deserialize)]
struct SessionListEntry {
    name: String,
    #[serde(default)]
    conflicts: Vec<RawConflict>,
}

/// [`SyncSessionClient`] backed by an installed `mutagen`-compatible
/// executable (§4.5's sync daemon contract).
pub struct MutagenSyncClient<R: CommandRunner> {
    executable: String,
    runner: Arc<R>,
}

impl<R: CommandRunner> MutagenSyncClient<R> {
    pub fn new(executable: impl Into<String>, runner: Arc<R>) -> Self {
        Self {
            executable: executable.into(),
            runner,
        }
    }

    async fn list_all(&self) -> Result<Vec<SessionListEntry>> {
        let cmd = Command::new(&self.executable)
            .arg("sync")
            .arg("list")
            .arg("--template")
            .arg("{{json .}}");
        let output = self.runner.run(cmd).await?;
        if !output.success() {
            return Err(AlcaError::external("mutagen", output.stderr));
        }
        if output.stdout.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&output.stdout)
            .map_err(|e| AlcaError::external("mutagen", format!("malformed session list: {e}")))
    }
}

#[async_trait::async_trait]
impl<R: CommandRunner> SyncSessionClient for MutagenSyncClient<R> {
    #[instrument(skip(self))]
    async fn list_sessions(&self, name_prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .list_all()
            .await?
            .into_iter()
            .map(|entry| entry.name)
            .filter(|name| name.starts_with(name_prefix))
            .collect())
    }

    #[instrument(skip(self))]
    async fn list_session_json(&self, name: &str) -> Result<SessionDocument> {
        let conflicts = self
            .list_all()
            .await?
            .into_iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.conflicts)
            .unwrap_or_default();
        Ok(SessionDocument { conflicts })
    }

    #[instrument(skip(self))]
    async fn flush_session(&self, name: &str) -> Result<()> {
        let cmd = Command::new(&self.executable).arg("sync").arg("flush").arg(name);
        let output = self.runner.run(cmd).await?;
        if !output.success() {
            return Err(AlcaError::external("mutagen", output.stderr));
        }
        Ok(())
    }
}
