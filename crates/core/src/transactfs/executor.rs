//! Executors: the sole writers of a TransactFs commit into the actual
//! filesystem (§4.1, §4.7).

use std::sync::Arc;

use tracing::debug;

use crate::command_runner::CommandRunner;
use crate::errors::Result;
use crate::fs_env::FileSystem;

use super::ops::{FileOp, OpKind};
use super::privilege::{group_by_privilege, render_script};

/// Applies a diff's operations to the actual filesystem. Implementations
/// must not call back into the `TransactFs` that produced the diff.
#[allow(async_fn_in_trait)]
pub trait Executor {
    async fn execute(&self, ops: &[FileOp], fs: &dyn FileSystem) -> Result<()>;
}

/// Applies every operation directly, with no privilege distinction. Used by
/// tests and by callers (like the state store) writing to locations that
/// are never privileged.
pub struct InProcessExecutor;

impl Executor for InProcessExecutor {
    async fn execute(&self, ops: &[FileOp], fs: &dyn FileSystem) -> Result<()> {
        apply_unprivileged(ops, fs)
    }
}

/// Applies unprivileged groups directly and routes each privileged group
/// through a single batched escalation via [`CommandRunner::sudo_run_script`].
pub struct PrivilegedExecutor<R: CommandRunner> {
    runner: Arc<R>,
}

impl<R: CommandRunner> PrivilegedExecutor<R> {
    pub fn new(runner: Arc<R>) -> Self {
        Self { runner }
    }
}

impl<R: CommandRunner> Executor for PrivilegedExecutor<R> {
    async fn execute(&self, ops: &[FileOp], fs: &dyn FileSystem) -> Result<()> {
        for (privileged, group) in group_by_privilege(ops) {
            if privileged {
                let script = render_script(&group);
                debug!(op_count = group.len(), "running privileged script");
                let output = self.runner.sudo_run_script(&script, &describe(&group)).await?;
                if !output.success() {
                    return Err(crate::errors::AlcaError::external(
                        "privilege-escalation",
                        format!("script failed (status {}): {}", output.status, output.stderr),
                    ));
                }
            } else {
                apply_unprivileged(&group, fs)?;
            }
        }
        Ok(())
    }
}

fn describe(group: &[FileOp]) -> String {
    format!("apply {} file change(s)", group.len())
}

fn apply_unprivileged(ops: &[FileOp], fs: &dyn FileSystem) -> Result<()> {
    for op in ops {
        match op.kind {
            OpKind::Create | OpKind::Update => {
                if let Some(parent) = op.path.parent() {
                    fs.create_dir_all(parent, 0o755)?;
                }
                fs.write(&op.path, op.content.as_deref().unwrap_or(&[]), op.mode)?;
            }
            OpKind::Chmod => {
                fs.chmod(&op.path, op.mode)?;
            }
            OpKind::Delete => {
                fs.remove_file(&op.path)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs_env::InMemoryFileSystem;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_in_process_executor_applies_create_and_delete() {
        let fs = InMemoryFileSystem::new();
        let ops = vec![
            FileOp::create(PathBuf::from("/a"), b"hi".to_vec(), 0o644, false),
            FileOp::delete(PathBuf::from("/b"), false),
        ];
        InProcessExecutor.execute(&ops, &fs).await.unwrap();
        assert_eq!(fs.read(&PathBuf::from("/a")).unwrap(), b"hi");
    }
}
