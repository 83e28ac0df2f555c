//! `up` command: bring a project's container up, applying configuration
//! drift and (re)building the host firewall rules when the config declares
//! network access (§4.2, §4.3, §4.4).

use dialoguer::Confirm;
use tracing::{info, instrument};

use alca_core::drift::{self, DriftRecord};
use alca_core::errors::Result;
use alca_core::io::Output;
use alca_core::network::PostCommitAction;
use alca_core::runtime::RuntimeKind;
use alca_core::state::StateStore;

use crate::commands::context::CommandContext;

pub struct UpArgs {
    pub force: bool,
    pub quiet: bool,
    pub runtime_override: Option<RuntimeKind>,
}

#[instrument(skip(ctx, args, out))]
pub async fn execute(ctx: &CommandContext, args: UpArgs, out: &mut Output) -> Result<()> {
    let config = ctx.load_config()?;
    let kind = ctx.resolve_runtime_kind(args.runtime_override, &config);
    let (mut state, is_new) = StateStore::load_or_create(&ctx.tfs, &ctx.project_dir, kind.as_str())?;

    let drifted = drift::compute(state.config.as_ref(), &config);
    if !drifted.is_empty() {
        print_drift(out, &drifted)?;
        if !args.force {
            let proceed = Confirm::new()
                .with_prompt("Rebuild container with this configuration?")
                .default(false)
                .interact()
                .unwrap_or(false);
            if !proceed {
                info!("rebuild declined, leaving container untouched");
                return Ok(());
            }
        }
    }

    let runtime = ctx.build_runtime(kind).await;

    if !drifted.is_empty() {
        // Rebuilding with new configuration requires tearing the existing
        // container down first; `up` on its own only no-ops a running one
        // or removes a stopped carcass (§4.3).
        let _ = runtime.down(&state.container_name).await;
    }

    let project_path = ctx.project_dir.to_string_lossy().into_owned();

    let mut reload_action = PostCommitAction::None;
    if let Some(rules) = &config.network {
        reload_action = ctx.network_helper().setup(&ctx.project_dir, &rules.lan_allow).await?;
    }

    state.config = Some(config.clone());
    state.runtime = kind.as_str().to_string();
    StateStore::save(&ctx.tfs, &ctx.project_dir, &state)?;
    ctx.commit().await?;
    ctx.run_post_commit_action(reload_action).await;

    runtime.up(&config, &project_path, &state).await?;

    if !args.quiet {
        let status = runtime.status(&state).await?;
        out.write_json(&status)?;
    }

    if is_new {
        info!(project_id = %state.project_id, "project initialized");
    }

    Ok(())
}

fn print_drift(out: &mut Output, drift: &DriftRecord) -> Result<()> {
    out.write_json_pretty(drift)?;
    Ok(())
}
