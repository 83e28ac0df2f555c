//! `list` command: enumerate every container this tool manages across the
//! host, regardless of project directory (§4.3).

use tracing::instrument;

use alca_core::errors::Result;
use alca_core::io::Output;
use alca_core::runtime::RuntimeKind;

use crate::commands::context::CommandContext;

#[instrument(skip(ctx, out))]
pub async fn execute(ctx: &CommandContext, runtime_override: Option<RuntimeKind>, out: &mut Output) -> Result<()> {
    let kind = runtime_override.unwrap_or(RuntimeKind::Auto);
    let runtime = ctx.build_runtime(kind).await;
    let names = runtime.list_containers().await?;
    out.write_json(&names)?;
    Ok(())
}
