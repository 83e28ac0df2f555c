//! Project configuration (consumed, not owned)
//!
//! Alcatraz's own configuration format — the file a project author writes
//! to describe the image, workdir, resource limits, mounts, environment,
//! and network rules for their sandbox — is an external collaborator: this
//! module only defines the shape the core needs for drift detection and a
//! thin loader, not a schema validator or template expander.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{AlcaError, Result};

fn default_true() -> bool {
    true
}

/// A single environment variable entry with drift-relevant flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvEntry {
    pub value: String,
    /// Whether this entry's value is reapplied when entering an already
    /// running container (excluded from drift per spec §4.2).
    #[serde(default = "default_true")]
    pub override_on_enter: bool,
}

impl EnvEntry {
    /// True if the literal value contains `${…}`, meaning it resolves
    /// against the host environment at run time rather than at parse time.
    pub fn is_interpolated(&self) -> bool {
        self.value.contains("${") && self.value.contains('}')
    }
}

/// Resource limits applied to the container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Memory limit string as accepted by the runtime CLI (e.g. `"4g"`).
    pub memory: Option<String>,
    pub cpus: Option<u32>,
}

/// Runtime preference: either a specific runtime name or automatic
/// selection (§4.3).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimePreference {
    #[default]
    Auto,
    Named(String),
}

/// A declared bind mount from host to container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MountSpec {
    pub host_path: String,
    pub container_path: String,
    #[serde(default)]
    pub read_only: bool,
}

/// Network rules: presence of this section (even empty) triggers the host
/// firewall pipeline per §3.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkRules {
    /// LAN-access allow-list: host/CIDR entries the container may reach.
    #[serde(default)]
    pub lan_allow: Vec<String>,
}

/// The project configuration, as consumed by drift detection and the
/// runtime adapter. Every field here is either compared by the drift
/// detector or explicitly excluded — see [`crate::drift::compute`] for the
/// exhaustive destructuring that enforces this at compile time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub image: String,
    pub workdir: String,
    #[serde(default)]
    pub runtime: RuntimePreference,
    pub up_command: Option<String>,
    pub enter_command: Option<String>,
    #[serde(default)]
    pub resources: ResourceLimits,
    #[serde(default)]
    pub mounts: Vec<MountSpec>,
    #[serde(default)]
    pub env: BTreeMap<String, EnvEntry>,
    pub network: Option<NetworkRules>,
}

impl ProjectConfig {
    /// Runtime preference as a plain display string, for comparison and
    /// for persistence into `ProjectState::runtime`.
    pub fn runtime_preference_str(&self) -> &str {
        match &self.runtime {
            RuntimePreference::Auto => "auto",
            RuntimePreference::Named(name) => name.as_str(),
        }
    }
}

/// Loads [`ProjectConfig`] from a project's configuration file.
///
/// This is intentionally thin: no template expansion, no multi-file merge,
/// no schema generation — those remain out of scope per §1.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Conventional configuration file name under the project directory.
    pub const FILE_NAME: &'static str = "alca.toml";

    pub fn config_path(project_dir: &Path) -> PathBuf {
        project_dir.join(Self::FILE_NAME)
    }

    /// Load and parse the project configuration.
    pub fn load(project_dir: &Path) -> Result<ProjectConfig> {
        let path = Self::config_path(project_dir);
        debug!(path = %path.display(), "loading project configuration");
        let contents = std::fs::read_to_string(&path).map_err(|_| {
            AlcaError::user_input(format!(
                "no configuration found at {} (expected {})",
                path.display(),
                Self::FILE_NAME
            ))
        })?;
        toml::from_str(&contents).map_err(|e| {
            AlcaError::user_input(format!("malformed configuration at {}: {e}", path.display()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_entry_detects_interpolation() {
        let interpolated = EnvEntry {
            value: "${HOST}".to_string(),
            override_on_enter: true,
        };
        let literal = EnvEntry {
            value: "plain".to_string(),
            override_on_enter: true,
        };
        assert!(interpolated.is_interpolated());
        assert!(!literal.is_interpolated());
    }

    #[test]
    fn test_runtime_preference_default_is_auto() {
        let pref = RuntimePreference::default();
        assert_eq!(pref, RuntimePreference::Auto);
    }

    #[test]
    fn test_config_loader_reports_user_input_error_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = ConfigLoader::load(dir.path()).unwrap_err();
        assert!(matches!(err, AlcaError::UserInput { .. }));
    }

    #[test]
    fn test_config_loader_parses_minimal_toml() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("alca.toml"),
            r#"
            image = "ubuntu:24.04"
            workdir = "/w"
            "#,
        )
        .unwrap();
        let config = ConfigLoader::load(dir.path()).unwrap();
        assert_eq!(config.image, "ubuntu:24.04");
        assert_eq!(config.workdir, "/w");
        assert_eq!(config.runtime, RuntimePreference::Auto);
    }
}
