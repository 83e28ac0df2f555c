//! Drift detection
//!
//! Compares a project's last-applied configuration against its current
//! configuration and produces a [`DriftRecord`] describing what changed
//! (§3, §4.2). A nil/empty record means no rebuild is required.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::config::ProjectConfig;
use crate::observability::drift_detect_span;
use crate::timed_span;

/// A field-by-field difference between a stored and a current configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DriftRecord {
    pub image: Option<(String, String)>,
    pub workdir: Option<(String, String)>,
    pub runtime: Option<(String, String)>,
    pub up_command: Option<(Option<String>, Option<String>)>,
    pub memory: Option<(Option<String>, Option<String>)>,
    pub cpus: Option<(Option<u32>, Option<u32>)>,
    pub mounts_changed: bool,
    pub envs_changed: bool,
}

impl DriftRecord {
    /// True if no field differs — no rebuild required.
    pub fn is_empty(&self) -> bool {
        *self == DriftRecord::default()
    }
}

/// Compute drift between `stored` (the configuration embedded in the
/// project's last-applied state, if any) and `current` (freshly loaded).
///
/// An absent `stored` configuration (first-ever state) yields no drift.
///
/// The destructuring of `current` below names every field of
/// [`ProjectConfig`] explicitly (no `..`): adding a field to `ProjectConfig`
/// without updating this function is a compile error, satisfying the
/// exhaustiveness requirement in §4.2/§9.
#[instrument(skip(stored, current))]
pub fn compute(stored: Option<&ProjectConfig>, current: &ProjectConfig) -> DriftRecord {
    let timed = timed_span!(drift_detect_span(""));
    let Some(stored) = stored else {
        timed.complete();
        return DriftRecord::default();
    };

    let ProjectConfig {
        image,
        workdir,
        runtime,
        up_command,
        enter_command: _current_enter_command,
        resources,
        mounts,
        env,
        network: _current_network,
    } = current;

    let mut drift = DriftRecord::default();

    if stored.image != *image {
        drift.image = Some((stored.image.clone(), image.clone()));
    }
    if stored.workdir != *workdir {
        drift.workdir = Some((stored.workdir.clone(), workdir.clone()));
    }
    if stored.runtime_preference_str() != runtime_preference_str(runtime) {
        drift.runtime = Some((
            stored.runtime_preference_str().to_string(),
            runtime_preference_str(runtime).to_string(),
        ));
    }
    if stored.up_command != *up_command {
        drift.up_command = Some((stored.up_command.clone(), up_command.clone()));
    }
    if stored.resources.memory != resources.memory {
        drift.memory = Some((stored.resources.memory.clone(), resources.memory.clone()));
    }
    if stored.resources.cpus != resources.cpus {
        drift.cpus = Some((stored.resources.cpus, resources.cpus));
    }
    if stored.mounts != *mounts {
        drift.mounts_changed = true;
    }
    if env_drift(&stored.env, env) {
        drift.envs_changed = true;
    }

    // enter_command and per-env override_on_enter are intentionally
    // excluded from drift: they don't affect the running container (§4.2).
    timed.complete();
    drift
}

fn runtime_preference_str(pref: &crate::config::RuntimePreference) -> &str {
    match pref {
        crate::config::RuntimePreference::Auto => "auto",
        crate::config::RuntimePreference::Named(name) => name.as_str(),
    }
}

/// True if the environment maps differ in a way that should flag drift:
/// structural drift (key-set differs) or value drift (same key, neither
/// side interpolated, literal values differ).
fn env_drift(
    stored: &std::collections::BTreeMap<String, crate::config::EnvEntry>,
    current: &std::collections::BTreeMap<String, crate::config::EnvEntry>,
) -> bool {
    let stored_keys: BTreeSet<_> = stored.keys().collect();
    let current_keys: BTreeSet<_> = current.keys().collect();
    if stored_keys != current_keys {
        return true;
    }
    for key in stored_keys {
        let old_entry = &stored[key];
        let new_entry = &current[key];
        if old_entry.is_interpolated() || new_entry.is_interpolated() {
            continue;
        }
        if old_entry.value != new_entry.value {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EnvEntry, ResourceLimits, RuntimePreference};
    use std::collections::BTreeMap;

    fn base_config() -> ProjectConfig {
        ProjectConfig {
            image: "ubuntu:24.04".to_string(),
            workdir: "/w".to_string(),
            runtime: RuntimePreference::Auto,
            up_command: Some("A".to_string()),
            enter_command: None,
            resources: ResourceLimits {
                memory: Some("4g".to_string()),
                cpus: Some(2),
            },
            mounts: vec![],
            env: BTreeMap::new(),
            network: None,
        }
    }

    #[test]
    fn test_drift_of_identical_config_is_empty() {
        let c = base_config();
        assert!(compute(Some(&c), &c).is_empty());
    }

    #[test]
    fn test_absent_stored_config_yields_no_drift() {
        let c = base_config();
        assert!(compute(None, &c).is_empty());
    }

    #[test]
    fn test_image_change_is_flagged_with_both_values() {
        let stored = base_config();
        let mut current = base_config();
        current.image = "ubuntu:22.04".to_string();
        let drift = compute(Some(&stored), &current);
        assert_eq!(
            drift.image,
            Some(("ubuntu:24.04".to_string(), "ubuntu:22.04".to_string()))
        );
        assert!(!drift.is_empty());
    }

    #[test]
    fn test_env_structural_drift_even_when_new_value_interpolated() {
        let stored = base_config();
        let mut current = base_config();
        current.up_command = Some("B".to_string());
        current.env.insert(
            "NEW".to_string(),
            EnvEntry {
                value: "${HOST}".to_string(),
                override_on_enter: true,
            },
        );
        let drift = compute(Some(&stored), &current);
        assert!(drift.envs_changed);
        assert_eq!(drift.up_command, Some((Some("A".to_string()), Some("B".to_string()))));
    }

    #[test]
    fn test_env_value_drift_ignored_when_interpolated() {
        let mut stored = base_config();
        stored.env.insert(
            "X".to_string(),
            EnvEntry {
                value: "${HOST}/a".to_string(),
                override_on_enter: true,
            },
        );
        let mut current = base_config();
        current.env.insert(
            "X".to_string(),
            EnvEntry {
                value: "${HOST}/b".to_string(),
                override_on_enter: true,
            },
        );
        let drift = compute(Some(&stored), &current);
        assert!(!drift.envs_changed);
    }

    #[test]
    fn test_env_value_drift_flagged_when_both_literal_and_differ() {
        let mut stored = base_config();
        stored.env.insert(
            "X".to_string(),
            EnvEntry {
                value: "a".to_string(),
                override_on_enter: true,
            },
        );
        let mut current = base_config();
        current.env.insert(
            "X".to_string(),
            EnvEntry {
                value: "b".to_string(),
                override_on_enter: true,
            },
        );
        let drift = compute(Some(&stored), &current);
        assert!(drift.envs_changed);
    }

    #[test]
    fn test_enter_command_and_override_on_enter_excluded_from_drift() {
        let stored = base_config();
        let mut current = base_config();
        current.enter_command = Some("different enter command".to_string());
        let drift = compute(Some(&stored), &current);
        assert!(drift.is_empty());
    }

    #[test]
    fn test_mounts_changed_is_a_boolean_flag_not_a_diff() {
        use crate::config::MountSpec;
        let stored = base_config();
        let mut current = base_config();
        current.mounts.push(MountSpec {
            host_path: "/host".to_string(),
            container_path: "/container".to_string(),
            read_only: false,
        });
        let drift = compute(Some(&stored), &current);
        assert!(drift.mounts_changed);
    }
}
