//! `run` command: execute a command inside the project's running container,
//! surfacing stale-then-fresh sync-conflict banners around it (§4.5, §5).

use std::sync::Arc;

use tracing::instrument;

use alca_core::errors::{AlcaError, Result, StateKind};
use alca_core::fs_env::RealFileSystem;
use alca_core::io::Output;
use alca_core::runtime::RuntimeKind;
use alca_core::sync::cache::SyncConflictCache;
use alca_core::sync::refresher::{self, DEFAULT_REFRESH_PERIOD};
use alca_core::sync::{ConflictInfo, MutagenSyncClient};

use crate::commands::context::CommandContext;

#[instrument(skip(ctx, argv, out))]
pub async fn execute(
    ctx: &CommandContext,
    argv: Vec<String>,
    runtime_override: Option<RuntimeKind>,
    out: &mut Output,
) -> Result<i32> {
    let Some(state) = ctx.load_state()? else {
        return Err(AlcaError::state(
            StateKind::StateNotFound,
            "no project state; run `alca up` first",
        ));
    };

    let stale = SyncConflictCache::load(&RealFileSystem, &ctx.project_dir)?;
    banner(out, "sync conflicts (stale)", stale.map(|c| c.conflicts).unwrap_or_default())?;

    let client = Arc::new(MutagenSyncClient::new("mutagen", ctx.runner.clone()));
    let handle = refresher::start(
        client,
        Arc::new(RealFileSystem),
        ctx.project_dir.clone(),
        state.project_id.clone(),
        DEFAULT_REFRESH_PERIOD,
    );

    let kind = runtime_override.unwrap_or_else(|| state.runtime.parse().unwrap_or(RuntimeKind::Auto));
    let runtime = ctx.build_runtime(kind).await;
    let result = runtime.exec(&state.container_name, &argv).await;

    let latest = handle.stop().await;
    banner(out, "sync conflicts (latest)", latest)?;

    // `exec` streams the child's stdio directly to this process's own, so
    // there's nothing buffered here to print: only the exit code to forward.
    Ok(result?.status)
}

fn banner(out: &mut Output, label: &str, conflicts: Vec<ConflictInfo>) -> Result<()> {
    if conflicts.is_empty() {
        return Ok(());
    }
    out.write_line(&format!("{label}: {} conflict(s)", conflicts.len()))?;
    for c in &conflicts {
        out.write_line(&format!(
            "  {} (local: {:?}, container: {:?})",
            c.path, c.local_state, c.container_state
        ))?;
    }
    Ok(())
}
