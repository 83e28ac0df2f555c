//! `init` command: scaffold a starting project configuration
//!
//! Deliberately thin (configuration is an external collaborator, not a
//! schema the tool validates): writes one opinionated default `alca.toml`,
//! refusing to overwrite an existing one.

use tracing::instrument;

use alca_core::config::ConfigLoader;
use alca_core::errors::{AlcaError, Result};

use crate::commands::context::CommandContext;

const TEMPLATE: &str = r#"image = "ubuntu:24.04"
workdir = "/workspace"
up_command = ""
enter_command = ""

[resources]
# memory = "4g"
# cpus = 2

[[mounts]]
host_path = "."
container_path = "/workspace"
read_only = false
"#;

#[instrument(skip(ctx))]
pub async fn execute(ctx: &CommandContext) -> Result<()> {
    let path = ConfigLoader::config_path(&ctx.project_dir);
    if ctx.tfs.read(&path).is_ok() {
        return Err(AlcaError::user_input(format!("{} already exists", path.display())));
    }
    ctx.tfs.write(&path, TEMPLATE.as_bytes(), 0o644)?;
    // the project directory is never a privileged location (§5), so an
    // in-process commit is always sufficient here.
    ctx.tfs.commit_in_process().await?;
    Ok(())
}
