//! `status` command: report the project's container state as JSON (§4.3).

use tracing::instrument;

use alca_core::errors::{AlcaError, Result, StateKind};
use alca_core::io::Output;
use alca_core::runtime::RuntimeKind;

use crate::commands::context::CommandContext;

#[instrument(skip(ctx, out))]
pub async fn execute(ctx: &CommandContext, runtime_override: Option<RuntimeKind>, out: &mut Output) -> Result<()> {
    let Some(state) = ctx.load_state()? else {
        return Err(AlcaError::state(
            StateKind::StateNotFound,
            "no project state; run `alca up` first",
        ));
    };
    let kind = runtime_override.unwrap_or_else(|| state.runtime.parse().unwrap_or(RuntimeKind::Auto));
    let runtime = ctx.build_runtime(kind).await;
    let status = runtime.status(&state).await?;
    out.write_json(&status)?;
    Ok(())
}
