//! Runtime selection
//!
//! Decides which container CLI backs a project — `docker`, `podman`, or
//! automatic detection between the two — and produces a [`CliRuntime`]
//! bound to the chosen executable (§4.3).

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::command_runner::{Command, CommandRunner};
use crate::docker::CliRuntime;
use crate::errors::{AlcaError, Result};

/// Which container runtime a project is configured (or detected) to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeKind {
    Docker,
    Podman,
    /// Probe for an available CLI at resolution time, preferring Docker
    /// (§4.3: "deterministic first match").
    Auto,
}

impl RuntimeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Docker => "docker",
            Self::Podman => "podman",
            Self::Auto => "auto",
        }
    }

    fn executable(self) -> &'static str {
        match self {
            Self::Docker | Self::Auto => "docker",
            Self::Podman => "podman",
        }
    }

    fn display_name(self) -> &'static str {
        match self {
            Self::Docker | Self::Auto => "Docker",
            Self::Podman => "Podman",
        }
    }
}

impl std::str::FromStr for RuntimeKind {
    type Err = AlcaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "docker" => Ok(Self::Docker),
            "podman" => Ok(Self::Podman),
            "auto" => Ok(Self::Auto),
            other => Err(AlcaError::user_input(format!(
                "unknown runtime '{other}', expected docker, podman, or auto"
            ))),
        }
    }
}

impl std::fmt::Display for RuntimeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Resolves a [`RuntimeKind`] and [`CommandRunner`] into a bound
/// [`CliRuntime`], applying the precedence rule from §4.3: explicit CLI flag
/// over `alca.toml`'s `runtime` field over environment variable over the
/// `Auto` default.
pub struct RuntimeFactory;

impl RuntimeFactory {
    /// Environment variable override, consulted only when neither a CLI flag
    /// nor a configuration preference names a runtime.
    pub const ENV_VAR: &'static str = "ALCA_RUNTIME";

    /// Decide which [`RuntimeKind`] to use, given an optional CLI override
    /// and an optional configuration preference. CLI wins over config wins
    /// over `ALCA_RUNTIME` wins over `Auto`.
    pub fn detect_runtime(cli_override: Option<RuntimeKind>, config_preference: Option<RuntimeKind>) -> RuntimeKind {
        if let Some(kind) = cli_override {
            debug!(runtime = %kind, "runtime selected via CLI flag");
            return kind;
        }
        if let Some(kind) = config_preference {
            debug!(runtime = %kind, "runtime selected via project configuration");
            return kind;
        }
        if let Ok(value) = std::env::var(Self::ENV_VAR) {
            if let Ok(kind) = value.parse::<RuntimeKind>() {
                debug!(runtime = %kind, "runtime selected via ALCA_RUNTIME");
                return kind;
            }
        }
        RuntimeKind::Auto
    }

    /// Build the [`CliRuntime`] for `kind`, resolving `Auto` by probing
    /// `docker` then `podman` through `runner` and taking the first
    /// available one, falling back to Docker's name if neither responds (the
    /// subsequent `available()` check will then report the failure to the
    /// caller with an actionable message).
    #[instrument(skip(runner))]
    pub async fn create_runtime<R: CommandRunner>(kind: RuntimeKind, runner: Arc<R>) -> CliRuntime<R> {
        let resolved = match kind {
            RuntimeKind::Auto => Self::probe(runner.as_ref()).await,
            other => other,
        };
        CliRuntime::new(resolved.executable(), resolved.display_name(), runner)
    }

    async fn probe<R: CommandRunner>(runner: &R) -> RuntimeKind {
        for candidate in [RuntimeKind::Docker, RuntimeKind::Podman] {
            let cmd = Command::new(candidate.executable()).arg("version").arg("--format").arg("{{.Server.Version}}");
            if matches!(runner.run(cmd).await, Ok(output) if output.success()) {
                debug!(runtime = %candidate, "auto-detected available runtime");
                return candidate;
            }
        }
        debug!("no runtime responded to probing, defaulting to docker");
        RuntimeKind::Docker
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_runner::MockCommandRunner;

    #[test]
    fn test_from_str_is_case_insensitive() {
        assert_eq!("DOCKER".parse::<RuntimeKind>().unwrap(), RuntimeKind::Docker);
        assert_eq!("Podman".parse::<RuntimeKind>().unwrap(), RuntimeKind::Podman);
        assert_eq!("auto".parse::<RuntimeKind>().unwrap(), RuntimeKind::Auto);
    }

    #[test]
    fn test_from_str_rejects_unknown() {
        assert!("colima".parse::<RuntimeKind>().is_err());
    }

    #[test]
    fn test_detect_runtime_cli_flag_wins_over_everything() {
        let kind = RuntimeFactory::detect_runtime(Some(RuntimeKind::Podman), Some(RuntimeKind::Docker));
        assert_eq!(kind, RuntimeKind::Podman);
    }

    #[test]
    fn test_detect_runtime_config_wins_over_default() {
        let kind = RuntimeFactory::detect_runtime(None, Some(RuntimeKind::Podman));
        assert_eq!(kind, RuntimeKind::Podman);
    }

    #[test]
    fn test_detect_runtime_defaults_to_auto() {
        let kind = RuntimeFactory::detect_runtime(None, None);
        assert_eq!(kind, RuntimeKind::Auto);
    }

    #[tokio::test]
    async fn test_create_runtime_resolves_auto_to_first_available() {
        let runner = Arc::new(MockCommandRunner::new());
        runner.push_failure(127, "command not found"); // docker probe fails
        runner.push_success("4.9.0"); // podman probe succeeds
        let runtime = RuntimeFactory::create_runtime(RuntimeKind::Auto, runner).await;
        assert_eq!(runtime.name(), "Podman");
    }

    #[tokio::test]
    async fn test_create_runtime_named_skips_probing() {
        let runner = Arc::new(MockCommandRunner::new());
        let runtime = RuntimeFactory::create_runtime(RuntimeKind::Docker, runner.clone()).await;
        assert_eq!(runtime.name(), "Docker");
        assert!(runner.calls().is_empty());
    }
}
