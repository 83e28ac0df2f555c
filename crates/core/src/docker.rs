//! Runtime CLI plumbing shared by Docker and Podman
//!
//! `CliRuntime` implements the capability set from §4.3 against any
//! container-CLI-compatible executable by shelling out through a
//! [`CommandRunner`]; Docker and Podman differ only in executable name and
//! display name (§9's "polymorphic runtime adapters" note).

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::command_runner::{Command, CommandRunner};
use crate::container::{ContainerIdentity, LABEL_PROJECT_ID, LABEL_PROJECT_PATH, LABEL_VERSION};
use crate::config::{MountSpec, ProjectConfig};
use crate::errors::{AlcaError, Result, StateKind};
use crate::state::ProjectState;

/// Observed run state of a container, as reported by `status` (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Running,
    Stopped,
    NotFound,
    Unknown,
}

/// Result of `status(project_state)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusInfo {
    pub state: RunState,
    pub id: Option<String>,
    pub name: Option<String>,
    pub image: Option<String>,
    pub started_at: Option<String>,
}

impl StatusInfo {
    fn not_found() -> Self {
        Self {
            state: RunState::NotFound,
            id: None,
            name: None,
            image: None,
            started_at: None,
        }
    }
}

/// Runtime CLI adapter over any `docker`-compatible executable. Shared
/// between the Docker and Podman variants; they're distinguished only by
/// `executable` and `display_name`.
pub struct CliRuntime<R: CommandRunner> {
    executable: String,
    display_name: &'static str,
    runner: Arc<R>,
}

impl<R: CommandRunner> CliRuntime<R> {
    pub fn new(executable: impl Into<String>, display_name: &'static str, runner: Arc<R>) -> Self {
        Self {
            executable: executable.into(),
            display_name,
            runner,
        }
    }

    pub fn name(&self) -> &'static str {
        self.display_name
    }

    /// True if the runtime's CLI executable responds to `version`.
    #[instrument(skip(self))]
    pub async fn available(&self) -> bool {
        let cmd = Command::new(&self.executable).arg("version").arg("--format").arg("{{.Server.Version}}");
        matches!(self.runner.run(cmd).await, Ok(output) if output.success())
    }

    fn label_filter(project_id: &str) -> String {
        format!("label={LABEL_PROJECT_ID}={project_id}")
    }

    /// Discover the container for `state` by its project-UUID label,
    /// falling back to the recorded container name so containers survive
    /// directory moves (§4.3).
    #[instrument(skip(self, state))]
    pub async fn status(&self, state: &ProjectState) -> Result<StatusInfo> {
        let by_label = self.find_by_label(&state.project_id).await?;
        let name = by_label.unwrap_or_else(|| state.container_name.clone());
        self.inspect(&name).await
    }

    async fn find_by_label(&self, project_id: &str) -> Result<Option<String>> {
        let cmd = Command::new(&self.executable)
            .arg("ps")
            .arg("-a")
            .arg("--filter")
            .arg(Self::label_filter(project_id))
            .arg("--format")
            .arg("{{.Names}}");
        let output = self.run_quiet(cmd).await?;
        Ok(output.lines().next().map(|s| s.trim().to_string()).filter(|s| !s.is_empty()))
    }

    async fn inspect(&self, name: &str) -> Result<StatusInfo> {
        let cmd = Command::new(&self.executable).arg("inspect").arg("--format").arg(
            "{{.State.Status}}|{{.Id}}|{{.Name}}|{{.Config.Image}}|{{.State.StartedAt}}",
        ).arg(name);
        let output = self.runner.run(cmd).await?;
        if !output.success() {
            return Ok(StatusInfo::not_found());
        }
        let line = output.stdout.lines().next().unwrap_or_default();
        let mut parts = line.splitn(5, '|');
        let status = parts.next().unwrap_or_default();
        let id = parts.next().map(|s| s.trim_start_matches('/').to_string());
        let name = parts.next().map(|s| s.trim_start_matches('/').to_string());
        let image = parts.next().map(|s| s.to_string());
        let started_at = parts.next().map(|s| s.to_string());
        let state = match status {
            "running" => RunState::Running,
            "exited" | "created" | "paused" => RunState::Stopped,
            _ => RunState::Unknown,
        };
        Ok(StatusInfo {
            state,
            id,
            name,
            image,
            started_at,
        })
    }

    /// Bring a project's container up: no-op if running, remove a stopped
    /// carcass, then `run -d` with labels/mounts/workdir/image, finally run
    /// the configured up-command if any (§4.3).
    #[instrument(skip(self, config, state))]
    pub async fn up(&self, config: &ProjectConfig, project_path: &str, state: &ProjectState) -> Result<()> {
        let status = self.status(state).await?;
        match status.state {
            RunState::Running => {
                debug!(container = %state.container_name, "already running, no-op");
                return Ok(());
            }
            RunState::Stopped => {
                self.remove_container(&state.container_name).await?;
            }
            RunState::NotFound | RunState::Unknown => {}
        }

        let identity = ContainerIdentity::new(state.project_id.clone());
        let mut cmd = Command::new(&self.executable)
            .arg("run")
            .arg("-d")
            .arg("--name")
            .arg(&identity.container_name)
            .arg("-w")
            .arg(&config.workdir);

        for (key, value) in identity.labels(project_path) {
            cmd = cmd.arg("--label").arg(format!("{key}={value}"));
        }
        for mount in &config.mounts {
            cmd = cmd.arg("-v").arg(mount_flag(mount));
        }
        cmd = cmd.arg(&config.image).arg("sleep").arg("infinity");

        let output = self.runner.run(cmd).await?;
        if !output.success() {
            return Err(AlcaError::external(
                self.display_name,
                format!("failed to create container: {}", output.stderr),
            ));
        }

        if let Some(up_command) = &config.up_command {
            self.exec(&identity.container_name, &shell_words_split(up_command)).await?;
        }
        Ok(())
    }

    /// Stop (tolerating "no such container") then remove.
    #[instrument(skip(self))]
    pub async fn down(&self, container_name: &str) -> Result<()> {
        let stop = self
            .runner
            .run(Command::new(&self.executable).arg("stop").arg(container_name))
            .await?;
        if !stop.success() && !stop.stderr.to_lowercase().contains("no such container") {
            return Err(AlcaError::external(self.display_name, stop.stderr));
        }
        self.remove_container(container_name).await
    }

    /// Invoke `run exec` with the provided argv, streaming stdio directly to
    /// the caller's terminal rather than buffering it until the process
    /// exits (spec.md §4.3/§6).
    #[instrument(skip(self, argv))]
    pub async fn exec(&self, container_name: &str, argv: &[String]) -> Result<crate::command_runner::CommandOutput> {
        let status = self
            .inspect(container_name)
            .await?;
        if status.state != RunState::Running {
            return Err(AlcaError::state(StateKind::NotRunning, container_name));
        }
        let cmd = Command::new(&self.executable)
            .arg("exec")
            .arg(container_name)
            .args(argv.to_vec());
        self.runner.run_streaming(cmd).await
    }

    /// `down` followed by `up`, preserving identity (§4.3).
    pub async fn reload(&self, config: &ProjectConfig, project_path: &str, state: &ProjectState) -> Result<()> {
        let _ = self.down(&state.container_name).await;
        self.up(config, project_path, state).await
    }

    /// Every container labeled with the project-UUID label across the host.
    #[instrument(skip(self))]
    pub async fn list_containers(&self) -> Result<Vec<String>> {
        let cmd = Command::new(&self.executable)
            .arg("ps")
            .arg("-a")
            .arg("--filter")
            .arg(format!("label={LABEL_PROJECT_ID}"))
            .arg("--format")
            .arg("{{.Names}}");
        let output = self.run_quiet(cmd).await?;
        Ok(output.lines().map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
    }

    /// Force-remove by name, tolerating "no such container".
    #[instrument(skip(self))]
    pub async fn remove_container(&self, name: &str) -> Result<()> {
        let output = self
            .runner
            .run(Command::new(&self.executable).arg("rm").arg("-f").arg(name))
            .await?;
        if !output.success() && !output.stderr.to_lowercase().contains("no such container") {
            return Err(AlcaError::external(self.display_name, output.stderr));
        }
        Ok(())
    }

    /// The container's IP address on the runtime's default bridge network.
    #[instrument(skip(self))]
    pub async fn get_container_ip(&self, name: &str) -> Result<Option<String>> {
        let cmd = Command::new(&self.executable).arg("inspect").arg("--format").arg(
            "{{range .NetworkSettings.Networks}}{{.IPAddress}}{{end}}",
        ).arg(name);
        let output = self.runner.run(cmd).await?;
        if !output.success() {
            return Ok(None);
        }
        let ip = output.stdout.trim();
        Ok(if ip.is_empty() { None } else { Some(ip.to_string()) })
    }

    /// Fetch an arbitrary project's label value for a named container, used
    /// by orphan detection to read the project-path label (§3, §4.6).
    #[instrument(skip(self))]
    pub async fn label_value(&self, name: &str, label: &str) -> Result<Option<String>> {
        let cmd = Command::new(&self.executable)
            .arg("inspect")
            .arg("--format")
            .arg(format!("{{{{index .Config.Labels \"{label}\"}}}}"))
            .arg(name);
        let output = self.runner.run(cmd).await?;
        if !output.success() {
            return Ok(None);
        }
        let value = output.stdout.trim();
        Ok(if value.is_empty() { None } else { Some(value.to_string()) })
    }

    async fn run_quiet(&self, cmd: Command) -> Result<String> {
        let output = self.runner.run(cmd).await?;
        if !output.success() {
            return Err(AlcaError::external(self.display_name, output.stderr));
        }
        Ok(output.stdout)
    }
}

fn mount_flag(mount: &MountSpec) -> String {
    if mount.read_only {
        format!("{}:{}:ro", mount.host_path, mount.container_path)
    } else {
        format!("{}:{}", mount.host_path, mount.container_path)
    }
}

fn shell_words_split(command: &str) -> Vec<String> {
    shell_words::split(command).unwrap_or_else(|_| vec![command.to_string()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_runner::MockCommandRunner;
    use chrono::Utc;

    fn state() -> ProjectState {
        ProjectState {
            project_id: "01234567-89ab-cdef-0000-000000000000".to_string(),
            container_name: "alca-0123456789ab".to_string(),
            created_at: Utc::now(),
            runtime: "docker".to_string(),
            config: None,
        }
    }

    #[tokio::test]
    async fn test_status_returns_not_found_when_inspect_fails() {
        let runner = Arc::new(MockCommandRunner::new());
        runner.push_success(""); // ps -a label lookup: empty
        runner.push_failure(1, "no such container");
        let runtime = CliRuntime::new("docker", "Docker", runner);
        let status = runtime.status(&state()).await.unwrap();
        assert_eq!(status.state, RunState::NotFound);
    }

    #[tokio::test]
    async fn test_status_parses_running_state() {
        let runner = Arc::new(MockCommandRunner::new());
        runner.push_success("alca-0123456789ab");
        runner.push_success("running|abc123|/alca-0123456789ab|ubuntu:24.04|2024-01-01T00:00:00Z");
        let runtime = CliRuntime::new("docker", "Docker", runner);
        let status = runtime.status(&state()).await.unwrap();
        assert_eq!(status.state, RunState::Running);
        assert_eq!(status.id.as_deref(), Some("abc123"));
        assert_eq!(status.image.as_deref(), Some("ubuntu:24.04"));
    }

    #[tokio::test]
    async fn test_down_tolerates_no_such_container() {
        let runner = Arc::new(MockCommandRunner::new());
        runner.push_failure(1, "Error: No such container: alca-0123456789ab");
        runner.push_success("");
        let runtime = CliRuntime::new("docker", "Docker", runner);
        runtime.down("alca-0123456789ab").await.unwrap();
    }

    #[tokio::test]
    async fn test_list_containers_filters_by_project_label() {
        let runner = Arc::new(MockCommandRunner::new());
        runner.push_success("alca-aaa\nalca-bbb\n");
        let runtime = CliRuntime::new("docker", "Docker", runner.clone());
        let names = runtime.list_containers().await.unwrap();
        assert_eq!(names, vec!["alca-aaa", "alca-bbb"]);
        assert!(runner.calls()[0].args.iter().any(|a| a.contains(LABEL_PROJECT_ID)));
    }

    #[tokio::test]
    async fn test_exec_streams_through_run_streaming_not_run() {
        let runner = Arc::new(MockCommandRunner::new());
        runner.push_success("running|abc|/alca-0123456789ab|ubuntu:24.04|2024-01-01T00:00:00Z");
        runner.push_streaming_status(0);
        let runtime = CliRuntime::new("docker", "Docker", runner.clone());
        let output = runtime
            .exec("alca-0123456789ab", &["echo".to_string(), "hi".to_string()])
            .await
            .unwrap();
        assert_eq!(output.status, 0);
        assert_eq!(runner.streaming_calls().len(), 1);
        assert!(runner.streaming_calls()[0].args.contains(&"exec".to_string()));
    }

    #[tokio::test]
    async fn test_exec_fails_when_not_running() {
        let runner = Arc::new(MockCommandRunner::new());
        runner.push_success("stopped|abc|/alca-0123456789ab|ubuntu:24.04|");
        let runtime = CliRuntime::new("docker", "Docker", runner);
        let err = runtime
            .exec("alca-0123456789ab", &["echo".to_string(), "hi".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, AlcaError::State { .. }));
    }
}
