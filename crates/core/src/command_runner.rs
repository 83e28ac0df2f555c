//! Subprocess execution abstraction
//!
//! Every place that shells out — the runtime adapter, the network helper,
//! the privileged executor — goes through this trait instead of calling
//! `std::process::Command` directly, so command orchestration can be tested
//! without actually invoking docker, pfctl, or sudo.

use std::collections::HashMap;
use std::path::Path;

use crate::errors::{AlcaError, Result};

/// Output of a completed command.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// A command to run: program, args, optional working directory and extra
/// environment variables. Kept as a plain struct (rather than a builder)
/// since every caller constructs the whole thing up front.
#[derive(Debug, Clone)]
pub struct Command {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<std::path::PathBuf>,
    pub env: HashMap<String, String>,
}

impl Command {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: HashMap::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// Abstraction over subprocess execution, real or mocked.
///
/// `run` executes unprivileged. `sudo_run_script` is the single entry point
/// for privileged execution: it never takes an arbitrary [`Command`] because
/// the whole point of batching privilege escalation is that exactly one
/// script, built from already-staged file operations, crosses the privilege
/// boundary per TransactFs commit (see [`crate::transactfs::privilege`]).
#[async_trait::async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: Command) -> Result<CommandOutput>;

    /// Run a command with its stdio connected directly to the caller's, so
    /// output reaches the terminal as the child produces it instead of being
    /// buffered until exit. Used by `exec` (§4.3/§6), where a long-running or
    /// interactive in-container command must stream. `stdout`/`stderr` on the
    /// returned [`CommandOutput`] are always empty since the bytes already
    /// went straight to the terminal; only `status` is meaningful.
    async fn run_streaming(&self, command: Command) -> Result<CommandOutput>;

    /// Run a shell script with elevated privileges. `script` is a complete,
    /// self-contained shell script (already base64-unwrapped where needed);
    /// `description` is a short human-readable label used only in prompts
    /// and logs, never parsed.
    async fn sudo_run_script(&self, script: &str, description: &str) -> Result<CommandOutput>;
}

/// Production command runner backed by `tokio::process::Command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealCommandRunner;

#[async_trait::async_trait]
impl CommandRunner for RealCommandRunner {
    async fn run(&self, command: Command) -> Result<CommandOutput> {
        let mut tokio_cmd = tokio::process::Command::new(&command.program);
        tokio_cmd.args(&command.args);
        if let Some(cwd) = &command.cwd {
            tokio_cmd.current_dir(cwd);
        }
        for (k, v) in &command.env {
            tokio_cmd.env(k, v);
        }
        let output = tokio_cmd.output().await.map_err(|e| {
            AlcaError::external(
                command.program.clone(),
                format!("failed to spawn {}: {e}", command.program),
            )
        })?;
        Ok(CommandOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    /// Spawns the child with inherited stdio (the default for
    /// `tokio::process::Command` when no `Stdio` is set), so its output
    /// streams directly to the terminal as it's produced, then waits for
    /// exit status without buffering anything in memory.
    async fn run_streaming(&self, command: Command) -> Result<CommandOutput> {
        let mut tokio_cmd = tokio::process::Command::new(&command.program);
        tokio_cmd.args(&command.args);
        if let Some(cwd) = &command.cwd {
            tokio_cmd.current_dir(cwd);
        }
        for (k, v) in &command.env {
            tokio_cmd.env(k, v);
        }
        let mut child = tokio_cmd.spawn().map_err(|e| {
            AlcaError::external(
                command.program.clone(),
                format!("failed to spawn {}: {e}", command.program),
            )
        })?;
        let status = child.wait().await.map_err(|e| {
            AlcaError::external(
                command.program.clone(),
                format!("failed to wait on {}: {e}", command.program),
            )
        })?;
        Ok(CommandOutput {
            status: status.code().unwrap_or(-1),
            stdout: String::new(),
            stderr: String::new(),
        })
    }

    async fn sudo_run_script(&self, script: &str, description: &str) -> Result<CommandOutput> {
        tracing::info!(description, "requesting privilege escalation");
        let mut tokio_cmd = tokio::process::Command::new("sudo");
        tokio_cmd.arg("-p").arg(format!("[alca] {description}: password for %u: "));
        tokio_cmd.arg("sh").arg("-c").arg(script);
        let output = tokio_cmd
            .output()
            .await
            .map_err(|e| AlcaError::external("sudo", format!("failed to spawn sudo: {e}")))?;
        Ok(CommandOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// A single recorded or expected invocation, used by [`MockCommandRunner`].
#[derive(Debug, Clone)]
pub struct RecordedCommand {
    pub program: String,
    pub args: Vec<String>,
}

/// Mock command runner for tests: returns canned [`CommandOutput`]s keyed by
/// program name in call order, and records every invocation for assertions.
#[derive(Debug, Default)]
pub struct MockCommandRunner {
    responses: parking_lot::Mutex<std::collections::VecDeque<Result<CommandOutput>>>,
    streaming_responses: parking_lot::Mutex<std::collections::VecDeque<Result<CommandOutput>>>,
    sudo_responses: parking_lot::Mutex<std::collections::VecDeque<Result<CommandOutput>>>,
    calls: parking_lot::Mutex<Vec<RecordedCommand>>,
    streaming_calls: parking_lot::Mutex<Vec<RecordedCommand>>,
    sudo_calls: parking_lot::Mutex<Vec<(String, String)>>,
}

impl MockCommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response for the next `run` call.
    pub fn push_success(&self, stdout: impl Into<String>) {
        self.responses.lock().push_back(Ok(CommandOutput {
            status: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }));
    }

    /// Queue a failing response for the next `run` call.
    pub fn push_failure(&self, status: i32, stderr: impl Into<String>) {
        self.responses.lock().push_back(Ok(CommandOutput {
            status,
            stdout: String::new(),
            stderr: stderr.into(),
        }));
    }

    /// Queue a response for the next `sudo_run_script` call.
    pub fn push_sudo_success(&self, stdout: impl Into<String>) {
        self.sudo_responses.lock().push_back(Ok(CommandOutput {
            status: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }));
    }

    /// Queue a response for the next `run_streaming` call. `stdout`/`stderr`
    /// are ignored in the returned output (real streaming never buffers
    /// them); only `status` matters.
    pub fn push_streaming_status(&self, status: i32) {
        self.streaming_responses.lock().push_back(Ok(CommandOutput {
            status,
            stdout: String::new(),
            stderr: String::new(),
        }));
    }

    pub fn calls(&self) -> Vec<RecordedCommand> {
        self.calls.lock().clone()
    }

    pub fn streaming_calls(&self) -> Vec<RecordedCommand> {
        self.streaming_calls.lock().clone()
    }

    pub fn sudo_calls(&self) -> Vec<(String, String)> {
        self.sudo_calls.lock().clone()
    }
}

#[async_trait::async_trait]
impl CommandRunner for MockCommandRunner {
    async fn run(&self, command: Command) -> Result<CommandOutput> {
        self.calls.lock().push(RecordedCommand {
            program: command.program.clone(),
            args: command.args.clone(),
        });
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(CommandOutput::default()))
    }

    async fn run_streaming(&self, command: Command) -> Result<CommandOutput> {
        self.streaming_calls.lock().push(RecordedCommand {
            program: command.program.clone(),
            args: command.args.clone(),
        });
        self.streaming_responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(CommandOutput::default()))
    }

    async fn sudo_run_script(&self, script: &str, description: &str) -> Result<CommandOutput> {
        self.sudo_calls
            .lock()
            .push((script.to_string(), description.to_string()));
        self.sudo_responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(CommandOutput::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_records_calls_in_order() {
        let runner = MockCommandRunner::new();
        runner.push_success("one");
        runner.push_success("two");
        let first = runner.run(Command::new("docker").arg("ps")).await.unwrap();
        let second = runner.run(Command::new("docker").arg("inspect")).await.unwrap();
        assert_eq!(first.stdout, "one");
        assert_eq!(second.stdout, "two");
        assert_eq!(runner.calls().len(), 2);
        assert_eq!(runner.calls()[1].args, vec!["inspect".to_string()]);
    }

    #[tokio::test]
    async fn test_mock_sudo_run_script_records_description() {
        let runner = MockCommandRunner::new();
        runner.push_sudo_success("ok");
        let output = runner
            .sudo_run_script("echo hi", "apply 3 file changes")
            .await
            .unwrap();
        assert!(output.success());
        assert_eq!(runner.sudo_calls()[0].1, "apply 3 file changes");
    }

    #[tokio::test]
    async fn test_mock_default_response_is_success_with_empty_output() {
        let runner = MockCommandRunner::new();
        let output = runner.run(Command::new("docker").arg("ps")).await.unwrap();
        assert!(output.success());
        assert_eq!(output.stdout, "");
    }
}
