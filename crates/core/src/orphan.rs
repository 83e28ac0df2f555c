//! Orphan container detection and purge selection parsing
//!
//! A managed container becomes an orphan when its labels and the state file
//! they point at fall out of agreement (§3, §4.6). Detection only ever
//! reads; it never mutates, so it takes a plain [`FileSystem`] rather than
//! a [`crate::transactfs::TransactFs`] handle.

use std::path::Path;

use serde::Deserialize;

use crate::container::LABEL_PROJECT_ID;
use crate::errors::{AlcaError, Result};
use crate::fs_env::FileSystem;
use crate::state::ProjectState;

/// The minimal view of a labeled container orphan detection needs, as
/// discovered via `list-containers` plus a per-container label lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrphanCandidate {
    pub name: String,
    pub project_id: Option<String>,
    pub project_path: Option<String>,
}

/// Why a candidate was classified as an orphan. Variant order mirrors the
/// four predicates in §3/§4.6: the first predicate that matches supplies
/// the reason, so tests can assert the exact reason string (§8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrphanReason {
    NoProjectPathLabel,
    ProjectPathMissing,
    StateFileUnreadable,
    ProjectIdMismatch,
}

impl std::fmt::Display for OrphanReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NoProjectPathLabel => "no project path label",
            Self::ProjectPathMissing => "project path no longer exists",
            Self::StateFileUnreadable => "state file missing or unreadable",
            Self::ProjectIdMismatch => "project ID mismatch",
        };
        write!(f, "{s}")
    }
}

/// One orphan finding: the candidate plus the first predicate it matched.
#[derive(Debug, Clone)]
pub struct OrphanRecord {
    pub candidate: OrphanCandidate,
    pub reason: OrphanReason,
}

/// Only the field this module needs from the persisted state document,
/// read directly rather than through [`ProjectState`]'s full schema so a
/// state file that fails to parse is still classified, not an error.
#[derive(Debug, Deserialize)]
struct StateProjectIdOnly {
    project_id: String,
}

/// Classify one candidate against the four predicates, in order. Returns
/// `None` if the container is not an orphan.
pub fn classify<F: FileSystem>(candidate: &OrphanCandidate, fs: &F) -> Option<OrphanReason> {
    let Some(project_path) = candidate.project_path.as_ref().filter(|p| !p.is_empty()) else {
        return Some(OrphanReason::NoProjectPathLabel);
    };

    let project_dir = Path::new(project_path);
    if !fs.exists(project_dir) {
        return Some(OrphanReason::ProjectPathMissing);
    }

    let state_path = ProjectState::state_path(project_dir);
    let Ok(bytes) = fs.read(&state_path) else {
        return Some(OrphanReason::StateFileUnreadable);
    };
    let Ok(state) = serde_json::from_slice::<StateProjectIdOnly>(&bytes) else {
        return Some(OrphanReason::StateFileUnreadable);
    };

    if candidate.project_id.as_deref() != Some(state.project_id.as_str()) {
        return Some(OrphanReason::ProjectIdMismatch);
    }

    None
}

/// Classify every candidate, preserving enumeration order, keeping only the
/// orphans.
pub fn detect_orphans<F: FileSystem>(candidates: &[OrphanCandidate], fs: &F) -> Vec<OrphanRecord> {
    candidates
        .iter()
        .filter_map(|candidate| {
            classify(candidate, fs).map(|reason| OrphanRecord {
                candidate: candidate.clone(),
                reason,
            })
        })
        .collect()
}

/// The label used to discover every container this tool manages, for
/// callers building an [`OrphanCandidate`] list from the runtime adapter's
/// `list-containers` plus per-container label lookups.
pub const DISCOVERY_LABEL: &str = LABEL_PROJECT_ID;

/// Parse the comma-separated interactive selection from §4.6: empty means
/// "all"; 1-based indices outside `[1, n]` are rejected with an actionable
/// message; duplicates are ignored. Returns zero-based indices in
/// ascending, deduplicated order.
pub fn parse_selection(input: &str, n: usize) -> Result<Vec<usize>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok((0..n).collect());
    }

    let mut seen = std::collections::BTreeSet::new();
    for token in trimmed.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        let index: usize = token.parse().map_err(|_| {
            AlcaError::user_input(format!("'{token}' is not a valid selection number"))
        })?;
        if index < 1 || index > n {
            return Err(AlcaError::user_input(format!(
                "selection {index} is out of range (expected 1-{n})"
            )));
        }
        seen.insert(index - 1);
    }
    Ok(seen.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs_env::InMemoryFileSystem;

    fn candidate(name: &str, project_id: Option<&str>, project_path: Option<&str>) -> OrphanCandidate {
        OrphanCandidate {
            name: name.to_string(),
            project_id: project_id.map(str::to_string),
            project_path: project_path.map(str::to_string),
        }
    }

    #[test]
    fn test_no_project_path_label_wins_first() {
        let fs = InMemoryFileSystem::new();
        let reason = classify(&candidate("alca-aaa", Some("id1"), None), &fs);
        assert_eq!(reason, Some(OrphanReason::NoProjectPathLabel));
    }

    #[test]
    fn test_project_path_missing() {
        let fs = InMemoryFileSystem::new();
        let reason = classify(&candidate("alca-aaa", Some("id1"), Some("/gone")), &fs);
        assert_eq!(reason, Some(OrphanReason::ProjectPathMissing));
    }

    #[test]
    fn test_state_file_unreadable_when_absent() {
        let fs = InMemoryFileSystem::new();
        fs.create_dir_all(Path::new("/proj"), 0o755).unwrap();
        let reason = classify(&candidate("alca-aaa", Some("id1"), Some("/proj")), &fs);
        assert_eq!(reason, Some(OrphanReason::StateFileUnreadable));
    }

    #[test]
    fn test_project_id_mismatch() {
        let fs = InMemoryFileSystem::new();
        fs.seed_file(
            ProjectState::state_path(Path::new("/proj")),
            serde_json::to_vec(&serde_json::json!({"project_id": "other-id"})).unwrap(),
            0o644,
        );
        let reason = classify(&candidate("alca-aaa", Some("id1"), Some("/proj")), &fs);
        assert_eq!(reason, Some(OrphanReason::ProjectIdMismatch));
    }

    #[test]
    fn test_not_an_orphan_when_everything_agrees() {
        let fs = InMemoryFileSystem::new();
        fs.seed_file(
            ProjectState::state_path(Path::new("/proj")),
            serde_json::to_vec(&serde_json::json!({"project_id": "id1"})).unwrap(),
            0o644,
        );
        let reason = classify(&candidate("alca-aaa", Some("id1"), Some("/proj")), &fs);
        assert_eq!(reason, None);
    }

    #[test]
    fn test_enumeration_order_and_reasons_from_scenario_4() {
        let fs = InMemoryFileSystem::new();
        fs.seed_file(
            ProjectState::state_path(Path::new("/proj2")),
            serde_json::to_vec(&serde_json::json!({"project_id": "other"})).unwrap(),
            0o644,
        );
        let candidates = vec![
            candidate("alca-one", Some("id1"), None),
            candidate("alca-two", Some("id2"), Some("/proj2")),
        ];
        let orphans = detect_orphans(&candidates, &fs);
        assert_eq!(orphans.len(), 2);
        assert_eq!(orphans[0].reason.to_string(), "no project path label");
        assert_eq!(orphans[1].reason.to_string(), "project ID mismatch");
    }

    #[test]
    fn test_parse_selection_empty_means_all() {
        assert_eq!(parse_selection("", 3).unwrap(), vec![0, 1, 2]);
        assert_eq!(parse_selection("   ", 3).unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_parse_selection_dedupes_and_sorts() {
        assert_eq!(parse_selection("2,1,2", 2).unwrap(), vec![0, 1]);
    }

    #[test]
    fn test_parse_selection_rejects_out_of_range() {
        assert!(parse_selection("5", 2).is_err());
        assert!(parse_selection("0", 2).is_err());
    }
}
