//! `down` command: stop and remove a project's container, tearing down its
//! firewall rules if present (§4.3, §4.4).

use tracing::{info, instrument};

use alca_core::errors::Result;
use alca_core::runtime::RuntimeKind;

use crate::commands::context::CommandContext;

#[instrument(skip(ctx))]
pub async fn execute(ctx: &CommandContext, runtime_override: Option<RuntimeKind>) -> Result<()> {
    let Some(state) = ctx.load_state()? else {
        info!("no project state found, nothing to tear down");
        return Ok(());
    };

    let kind = runtime_override.unwrap_or_else(|| state.runtime.parse().unwrap_or(RuntimeKind::Auto));
    let runtime = ctx.build_runtime(kind).await;
    runtime.down(&state.container_name).await?;

    // Idempotent even when this project never configured networking: an
    // absent rule file simply yields no delete operation in the diff.
    let action = ctx.network_helper().teardown(&ctx.project_dir)?;
    ctx.commit().await?;
    ctx.run_post_commit_action(action).await;

    Ok(())
}
