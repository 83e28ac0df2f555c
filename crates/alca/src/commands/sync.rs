//! `experimental sync` command group: inspect and interactively resolve
//! sync-daemon conflicts (§4.5).

use dialoguer::Select;
use tracing::{info, instrument, warn};

use alca_core::errors::{AlcaError, Result, StateKind};
use alca_core::io::Output;
use alca_core::runtime::RuntimeKind;
use alca_core::sync::{aggregate_conflicts, MutagenSyncClient, SyncSessionClient};

use crate::commands::context::CommandContext;

#[instrument(skip(ctx, out))]
pub async fn check(ctx: &CommandContext, template: bool, out: &mut Output) -> Result<()> {
    let Some(state) = ctx.load_state()? else {
        return Err(AlcaError::state(
            StateKind::StateNotFound,
            "no project state; run `alca up` first",
        ));
    };
    let client = MutagenSyncClient::new("mutagen", ctx.runner.clone());
    let conflicts = aggregate_conflicts(&client, &state.project_id).await?;

    if template {
        out.write_json(&conflicts)?;
        return Ok(());
    }

    if conflicts.is_empty() {
        out.write_line("no sync conflicts")?;
        return Ok(());
    }
    for c in &conflicts {
        out.write_line(&format!(
            "{}: local={:?} container={:?}",
            c.path, c.local_state, c.container_state
        ))?;
    }
    Ok(())
}

#[instrument(skip(ctx))]
pub async fn resolve(ctx: &CommandContext, runtime_override: Option<RuntimeKind>) -> Result<()> {
    let Some(state) = ctx.load_state()? else {
        return Err(AlcaError::state(
            StateKind::StateNotFound,
            "no project state; run `alca up` first",
        ));
    };
    let client = MutagenSyncClient::new("mutagen", ctx.runner.clone());
    let conflicts = aggregate_conflicts(&client, &state.project_id).await?;
    if conflicts.is_empty() {
        return Ok(());
    }

    let kind = runtime_override.unwrap_or_else(|| state.runtime.parse().unwrap_or(RuntimeKind::Auto));
    let runtime = ctx.build_runtime(kind).await;

    const OPTIONS: &[&str] = &["keep local", "keep container", "skip"];

    for conflict in &conflicts {
        let choice = Select::new()
            .with_prompt(format!("Conflict at {}", conflict.path))
            .items(OPTIONS)
            .default(2)
            .interact()
            .unwrap_or(2);

        let resolved = match choice {
            0 => {
                let cmd = vec!["rm".to_string(), "-f".to_string(), conflict.path.clone()];
                runtime.exec(&state.container_name, &cmd).await?;
                true
            }
            1 => {
                ctx.tfs.remove(&ctx.project_dir.join(&conflict.path))?;
                ctx.commit().await?;
                true
            }
            _ => {
                info!(path = %conflict.path, "skipped conflict");
                false
            }
        };

        // Flush the owning session right after its choice, not batched at
        // the end, so convergence starts as soon as each conflict is
        // resolved (§4.5).
        if resolved {
            if let Err(e) = client.flush_session(&conflict.session).await {
                warn!(session = %conflict.session, error = %e, "failed to flush sync session");
            }
        }
    }

    Ok(())
}
