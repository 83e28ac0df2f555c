//! Sync client and conflict derivation
//!
//! The core never implements bidirectional file sync itself; it consults an
//! external sync daemon through [`SyncSessionClient`] and turns its raw
//! per-session conflict documents into the flat [`ConflictInfo`] list the
//! rest of the tool banners and resolves against (§4.5).

pub mod cache;
pub mod mutagen;
pub mod refresher;

pub use mutagen::MutagenSyncClient;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// One side's change to a path: its kind before and after the sync engine's
/// most recent observation. `None` means the session document omitted that
/// side entirely (e.g. a beta-only conflict with no alpha change).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEntry {
    pub path: String,
    pub old: Option<EntryKind>,
    pub new: Option<EntryKind>,
}

/// The kind of a path at one point in a change entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EntryKind {
    Nothing,
    Present { digest: Option<String> },
    Directory,
}

/// One conflict as reported by a sync session: every alpha (local) and beta
/// (container) change sharing a root, before being split per changed path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawConflict {
    pub root: String,
    pub alpha_changes: Vec<ChangeEntry>,
    pub beta_changes: Vec<ChangeEntry>,
}

/// The structured document returned by `list-session-json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDocument {
    pub conflicts: Vec<RawConflict>,
}

/// Per-path conflict state, derived independently for the local (alpha) and
/// container (beta) side of a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictState {
    Modified,
    Created,
    Deleted,
    Directory,
}

/// One changed path within a conflict, with both sides' derived state
/// (§3's `ConflictInfo` tuple).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictInfo {
    pub path: String,
    pub local_state: ConflictState,
    pub container_state: ConflictState,
    pub detected_at: DateTime<Utc>,
    /// Name of the sync session this conflict was reported under, so a
    /// resolution choice can flush the exact session that owns it (§4.5:
    /// "after each choice the corresponding sync session is flushed").
    pub session: String,
}

/// Abstraction over the external bidirectional sync daemon (§4.5, §9's
/// third DI-envelope interface alongside `FileSystem`/`CommandRunner`).
#[async_trait::async_trait]
pub trait SyncSessionClient: Send + Sync {
    /// Session names whose name starts with `name_prefix`.
    async fn list_sessions(&self, name_prefix: &str) -> Result<Vec<String>>;
    /// The structured conflict document for one session.
    async fn list_session_json(&self, name: &str) -> Result<SessionDocument>;
    /// Flush a session to accelerate convergence after a resolution choice.
    async fn flush_session(&self, name: &str) -> Result<()>;
}

/// The session-naming convention from §4.5: `"alca-" + project_id + "-"`.
/// Sessions not conforming to this prefix are outside this tool's purview
/// (§6's "external sessions... are ignored").
pub fn session_name_prefix(project_id: &str) -> String {
    format!("alca-{project_id}-")
}

/// Derive the side state from a single change entry's (old, new) pair.
/// Directory kind on either side wins outright; otherwise presence
/// transitions map to created/deleted, and present-to-present is treated as
/// modified (the session document's digest, when both sides carry one and
/// disagree, is the authoritative signal upstream — by the time a path is
/// reported as conflicting, a present/present pair always means the
/// content differs).
fn derive_side_state(old: Option<&EntryKind>, new: Option<&EntryKind>) -> ConflictState {
    if matches!(old, Some(EntryKind::Directory)) || matches!(new, Some(EntryKind::Directory)) {
        return ConflictState::Directory;
    }
    let old_present = matches!(old, Some(EntryKind::Present { .. }));
    let new_present = matches!(new, Some(EntryKind::Present { .. }));
    match (old_present, new_present) {
        (false, true) => ConflictState::Created,
        (true, false) => ConflictState::Deleted,
        _ => ConflictState::Modified,
    }
}

fn find_entry<'a>(changes: &'a [ChangeEntry], path: &str) -> Option<&'a ChangeEntry> {
    changes.iter().find(|c| c.path == path)
}

/// Emit one [`ConflictInfo`] per path touched by either side of `raw`
/// (§4.5's "for each conflict, emit one ConflictInfo per changed path").
pub fn derive_conflicts(raw: &RawConflict, detected_at: DateTime<Utc>, session: &str) -> Vec<ConflictInfo> {
    let mut paths: Vec<&str> = Vec::new();
    for change in raw.alpha_changes.iter().chain(raw.beta_changes.iter()) {
        if !paths.contains(&change.path.as_str()) {
            paths.push(&change.path);
        }
    }

    paths
        .into_iter()
        .map(|path| {
            let alpha = find_entry(&raw.alpha_changes, path);
            let beta = find_entry(&raw.beta_changes, path);
            ConflictInfo {
                path: path.to_string(),
                local_state: derive_side_state(
                    alpha.and_then(|c| c.old.as_ref()),
                    alpha.and_then(|c| c.new.as_ref()),
                ),
                container_state: derive_side_state(
                    beta.and_then(|c| c.old.as_ref()),
                    beta.and_then(|c| c.new.as_ref()),
                ),
                detected_at,
                session: session.to_string(),
            }
        })
        .collect()
}

/// List every session matching the project's prefix and aggregate their
/// conflicts. Session ordering across sessions is not guaranteed stable by
/// the daemon's contract (§9 open question), so callers should compare the
/// result with set-equality rather than list-order equality.
pub async fn aggregate_conflicts<C: SyncSessionClient>(
    client: &C,
    project_id: &str,
) -> Result<Vec<ConflictInfo>> {
    let prefix = session_name_prefix(project_id);
    let sessions = client.list_sessions(&prefix).await?;
    let now = Utc::now();
    let mut conflicts = Vec::new();
    for name in sessions {
        let doc = client.list_session_json(&name).await?;
        for raw in &doc.conflicts {
            conflicts.extend(derive_conflicts(raw, now, &name));
        }
    }
    Ok(conflicts)
}

/// Test/dev double for [`SyncSessionClient`]: a fixed map of session name to
/// document, recording every `flush_session` call.
#[derive(Debug, Default)]
pub struct MockSyncSessionClient {
    sessions: parking_lot::Mutex<std::collections::BTreeMap<String, SessionDocument>>,
    flushed: parking_lot::Mutex<Vec<String>>,
}

impl MockSyncSessionClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(self, name: impl Into<String>, doc: SessionDocument) -> Self {
        self.sessions.lock().insert(name.into(), doc);
        self
    }

    pub fn flushed(&self) -> Vec<String> {
        self.flushed.lock().clone()
    }
}

#[async_trait::async_trait]
impl SyncSessionClient for MockSyncSessionClient {
    async fn list_sessions(&self, name_prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .sessions
            .lock()
            .keys()
            .filter(|name| name.starts_with(name_prefix))
            .cloned()
            .collect())
    }

    async fn list_session_json(&self, name: &str) -> Result<SessionDocument> {
        Ok(self.sessions.lock().get(name).cloned().unwrap_or_default())
    }

    async fn flush_session(&self, name: &str) -> Result<()> {
        self.flushed.lock().push(name.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn present(digest: &str) -> EntryKind {
        EntryKind::Present {
            digest: Some(digest.to_string()),
        }
    }

    #[test]
    fn test_derive_created_when_alpha_had_nothing() {
        let raw = RawConflict {
            root: "r".to_string(),
            alpha_changes: vec![ChangeEntry {
                path: "a.txt".to_string(),
                old: Some(EntryKind::Nothing),
                new: Some(present("d1")),
            }],
            beta_changes: vec![],
        };
        let infos = derive_conflicts(&raw, Utc::now(), "alca-p-0");
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].local_state, ConflictState::Created);
        assert_eq!(infos[0].container_state, ConflictState::Modified);
    }

    #[test]
    fn test_derive_deleted_when_new_is_nothing() {
        let raw = RawConflict {
            root: "r".to_string(),
            alpha_changes: vec![],
            beta_changes: vec![ChangeEntry {
                path: "b.txt".to_string(),
                old: Some(present("d1")),
                new: Some(EntryKind::Nothing),
            }],
        };
        let infos = derive_conflicts(&raw, Utc::now(), "alca-p-0");
        assert_eq!(infos[0].container_state, ConflictState::Deleted);
    }

    #[test]
    fn test_derive_directory_kind_surfaces_on_either_side() {
        let raw = RawConflict {
            root: "r".to_string(),
            alpha_changes: vec![ChangeEntry {
                path: "dir/".to_string(),
                old: Some(EntryKind::Nothing),
                new: Some(EntryKind::Directory),
            }],
            beta_changes: vec![],
        };
        let infos = derive_conflicts(&raw, Utc::now(), "alca-p-0");
        assert_eq!(infos[0].local_state, ConflictState::Directory);
    }

    #[test]
    fn test_derive_one_conflict_info_per_changed_path() {
        let raw = RawConflict {
            root: "r".to_string(),
            alpha_changes: vec![
                ChangeEntry {
                    path: "a.txt".to_string(),
                    old: Some(present("d1")),
                    new: Some(present("d2")),
                },
                ChangeEntry {
                    path: "b.txt".to_string(),
                    old: Some(EntryKind::Nothing),
                    new: Some(present("d1")),
                },
            ],
            beta_changes: vec![ChangeEntry {
                path: "a.txt".to_string(),
                old: Some(present("d1")),
                new: Some(present("d3")),
            }],
        };
        let infos = derive_conflicts(&raw, Utc::now(), "alca-p-0");
        assert_eq!(infos.len(), 2);
        assert!(infos.iter().any(|c| c.path == "a.txt"));
        assert!(infos.iter().any(|c| c.path == "b.txt"));
    }

    #[tokio::test]
    async fn test_aggregate_conflicts_ignores_non_matching_sessions() {
        let client = MockSyncSessionClient::new()
            .with_session(
                "alca-proj1-0",
                SessionDocument {
                    conflicts: vec![RawConflict {
                        root: "/".to_string(),
                        alpha_changes: vec![ChangeEntry {
                            path: "x".to_string(),
                            old: Some(EntryKind::Nothing),
                            new: Some(present("d")),
                        }],
                        beta_changes: vec![],
                    }],
                },
            )
            .with_session("alca-proj2-0", SessionDocument::default())
            .with_session("unrelated-session", SessionDocument::default());

        let conflicts = aggregate_conflicts(&client, "proj1").await.unwrap();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].path, "x");
    }
}
