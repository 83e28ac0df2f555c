//! `experimental reload` command: `down` then `up` a project's container
//! while preserving its identity (§4.3).

use tracing::instrument;

use alca_core::errors::{AlcaError, Result, StateKind};
use alca_core::runtime::RuntimeKind;

use crate::commands::context::CommandContext;

#[instrument(skip(ctx))]
pub async fn execute(ctx: &CommandContext, runtime_override: Option<RuntimeKind>) -> Result<()> {
    let Some(state) = ctx.load_state()? else {
        return Err(AlcaError::state(
            StateKind::StateNotFound,
            "no project state; run `alca up` first",
        ));
    };
    let config = ctx.load_config()?;
    let kind = runtime_override.unwrap_or_else(|| state.runtime.parse().unwrap_or(RuntimeKind::Auto));
    let runtime = ctx.build_runtime(kind).await;
    let project_path = ctx.project_dir.to_string_lossy().into_owned();
    runtime.reload(&config, &project_path, &state).await
}
