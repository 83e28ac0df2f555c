//! Shared command orchestration context
//!
//! Assembles the production dependency-injection stack once per invocation
//! the way the teacher's command layer builds a fresh runtime client per
//! command rather than threading one shared client through every call site.

use std::path::PathBuf;
use std::sync::Arc;

use alca_core::command_runner::{Command, RealCommandRunner};
use alca_core::config::{ConfigLoader, ProjectConfig, RuntimePreference};
use alca_core::docker::CliRuntime;
use alca_core::errors::Result;
use alca_core::fs_env::RealFileSystem;
use alca_core::network::{NetworkHelper, PostCommitAction};
use alca_core::runtime::{RuntimeFactory, RuntimeKind};
use alca_core::state::{ProjectState, StateStore};
use alca_core::transactfs::{PrivilegedExecutor, TransactFs};
use tracing::warn;

/// Everything a command needs to talk to the filesystem, the runtime CLI,
/// and the host network helper, bound to the current project directory.
pub struct CommandContext {
    pub project_dir: PathBuf,
    pub tfs: Arc<TransactFs<RealFileSystem>>,
    pub runner: Arc<RealCommandRunner>,
}

impl CommandContext {
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
            tfs: Arc::new(TransactFs::new(RealFileSystem)),
            runner: Arc::new(RealCommandRunner),
        }
    }

    pub fn for_current_dir() -> anyhow::Result<Self> {
        Ok(Self::new(std::env::current_dir()?))
    }

    pub fn load_config(&self) -> Result<ProjectConfig> {
        ConfigLoader::load(&self.project_dir)
    }

    pub fn load_state(&self) -> Result<Option<ProjectState>> {
        StateStore::load(&self.tfs, &self.project_dir)
    }

    /// Resolve the runtime kind by the precedence in §4.3: CLI override,
    /// then the project's configured preference, then `ALCA_RUNTIME`, then
    /// auto-detection.
    pub fn resolve_runtime_kind(&self, cli_override: Option<RuntimeKind>, config: &ProjectConfig) -> RuntimeKind {
        let config_preference = match &config.runtime {
            RuntimePreference::Auto => None,
            RuntimePreference::Named(_) => config.runtime_preference_str().parse::<RuntimeKind>().ok(),
        };
        RuntimeFactory::detect_runtime(cli_override, config_preference)
    }

    pub async fn build_runtime(&self, kind: RuntimeKind) -> CliRuntime<RealCommandRunner> {
        RuntimeFactory::create_runtime(kind, self.runner.clone()).await
    }

    pub fn network_helper(&self) -> NetworkHelper<RealFileSystem, RealCommandRunner> {
        NetworkHelper::new(self.tfs.clone(), self.runner.clone())
    }

    /// Commit every staged filesystem effect of the current command through
    /// a single escalation per contiguous privileged run (§4.1, §4.7).
    pub async fn commit(&self) -> Result<()> {
        if !self.tfs.needs_commit() {
            return Ok(());
        }
        let executor = PrivilegedExecutor::new(self.runner.clone());
        self.tfs.commit(&executor).await
    }

    /// Run the reload side effect a network-rule change may require after
    /// the enclosing commit has landed (§4.4).
    pub async fn run_post_commit_action(&self, action: PostCommitAction) {
        if let PostCommitAction::ReloadRuleset { args } = action {
            let Some((program, rest)) = args.split_first() else {
                return;
            };
            let cmd = Command::new(program.clone()).args(rest.to_vec());
            if let Err(e) = self.runner.run(cmd).await {
                warn!(error = %e, "failed to reload firewall ruleset");
            }
        }
    }
}
