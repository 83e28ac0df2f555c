//! `network-helper` command group: manage the host firewall helper's
//! installation lifecycle, independent of any single project (§4.4).

use tracing::{info, instrument};

use alca_core::errors::Result;
use alca_core::io::Output;

use crate::commands::context::CommandContext;

#[instrument(skip(ctx))]
pub async fn install(ctx: &CommandContext) -> Result<()> {
    let helper = ctx.network_helper();
    let changed = helper.install_helper()?;
    ctx.commit().await?;
    if changed {
        info!("network helper installed or updated");
    }
    Ok(())
}

#[instrument(skip(ctx))]
pub async fn uninstall(ctx: &CommandContext) -> Result<()> {
    let helper = ctx.network_helper();
    helper.uninstall_helper()?;
    ctx.commit().await?;
    Ok(())
}

#[instrument(skip(ctx, out))]
pub async fn status(ctx: &CommandContext, out: &mut Output) -> Result<()> {
    let helper = ctx.network_helper();
    let needs_update = helper.needs_update()?;
    out.write_json(&serde_json::json!({ "needs_update": needs_update }))?;
    Ok(())
}
