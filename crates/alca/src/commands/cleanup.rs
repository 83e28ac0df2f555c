//! `cleanup` command: enumerate orphaned containers and remove the selected
//! ones (§4.6).

use std::io::{self, BufRead};

use console::style;
use tracing::{info, instrument, warn};

use alca_core::container::{LABEL_PROJECT_ID, LABEL_PROJECT_PATH};
use alca_core::errors::Result;
use alca_core::fs_env::RealFileSystem;
use alca_core::io::Output;
use alca_core::orphan::{self, OrphanCandidate};
use alca_core::runtime::RuntimeKind;

use crate::commands::context::CommandContext;

#[instrument(skip(ctx, out))]
pub async fn execute(ctx: &CommandContext, all: bool, runtime_override: Option<RuntimeKind>, out: &mut Output) -> Result<()> {
    let kind = runtime_override.unwrap_or(RuntimeKind::Auto);
    let runtime = ctx.build_runtime(kind).await;

    let names = runtime.list_containers().await?;
    let mut candidates = Vec::with_capacity(names.len());
    for name in names {
        let project_id = runtime.label_value(&name, LABEL_PROJECT_ID).await?;
        let project_path = runtime.label_value(&name, LABEL_PROJECT_PATH).await?;
        candidates.push(OrphanCandidate {
            name,
            project_id,
            project_path,
        });
    }

    let orphans = orphan::detect_orphans(&candidates, &RealFileSystem);
    if orphans.is_empty() {
        out.write_line("no orphaned containers found")?;
        return Ok(());
    }

    for (i, record) in orphans.iter().enumerate() {
        out.write_line(&format!(
            "{}. {} — {}",
            i + 1,
            record.candidate.name,
            style(record.reason.to_string()).red()
        ))?;
    }

    let selection = if all {
        (0..orphans.len()).collect::<Vec<_>>()
    } else {
        out.write_line("select containers to remove (comma-separated, blank for all):")?;
        out.flush()?;
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        orphan::parse_selection(&line, orphans.len())?
    };

    for index in selection {
        let record = &orphans[index];
        match runtime.remove_container(&record.candidate.name).await {
            Ok(()) => {
                info!(container = %record.candidate.name, "removed orphaned container");
                out.write_line(&format!("removed {}", record.candidate.name))?;
            }
            Err(e) => {
                warn!(container = %record.candidate.name, error = %e, "failed to remove orphaned container");
                out.write_line(&format!("failed to remove {}: {e}", record.candidate.name))?;
            }
        }
    }

    Ok(())
}
