//! Top-level CLI surface: `init`, `up`, `down`, `run`, `status`, `list`,
//! `cleanup`, and the `experimental`/`network-helper` subcommand groups.

use anyhow::Result;
use clap::{Parser, Subcommand};

use alca_core::io::Output;
use alca_core::runtime::RuntimeKind;

use crate::commands::context::CommandContext;
use crate::commands::{cleanup, down, init, list, network_helper, reload, run, status, sync, up};

#[derive(Parser, Debug)]
#[command(
    name = env!("CARGO_PKG_NAME"),
    version,
    about = "Sandbox lifecycle CLI for containerized agent workspaces"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Override runtime selection (docker, podman, auto); wins over
    /// configuration and `ALCA_RUNTIME`.
    #[arg(long, global = true)]
    pub runtime: Option<RuntimeKind>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scaffold a starting `alca.toml` in the current directory
    Init,
    /// Bring the project's container up, applying configuration drift
    Up {
        /// Skip the drift confirmation prompt and rebuild unconditionally
        #[arg(long)]
        force: bool,
        /// Suppress the final status report
        #[arg(long)]
        quiet: bool,
    },
    /// Stop and remove the project's container and firewall rules
    Down,
    /// Execute a command inside the project's container
    Run {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        argv: Vec<String>,
    },
    /// Report the project's container status as JSON
    Status,
    /// List every container this tool manages across the host
    List,
    /// Find and remove orphaned containers
    Cleanup {
        /// Remove every orphan found without prompting
        #[arg(long)]
        all: bool,
    },
    /// Experimental, unstable subcommands
    Experimental {
        #[command(subcommand)]
        command: ExperimentalCommand,
    },
    /// Manage the host firewall helper's installation
    NetworkHelper {
        #[command(subcommand)]
        command: NetworkHelperCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum ExperimentalCommand {
    /// Tear down and recreate the project's container, preserving identity
    Reload,
    /// Sync-daemon conflict inspection and resolution
    Sync {
        #[command(subcommand)]
        command: SyncCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum SyncCommand {
    /// Synchronously report current sync conflicts
    Check {
        /// Emit the raw conflict list as JSON instead of a human-readable report
        #[arg(long)]
        template: bool,
    },
    /// Interactively resolve sync conflicts one at a time
    Resolve,
}

#[derive(Subcommand, Debug)]
pub enum NetworkHelperCommand {
    Install,
    Uninstall,
    Status,
}

impl Cli {
    /// Dispatch to the selected subcommand, returning the process exit code:
    /// `run` forwards the in-container process's own exit status, every
    /// other command exits 0 on success.
    pub async fn dispatch(self) -> Result<i32> {
        let ctx = CommandContext::for_current_dir()?;
        let mut out = Output::stdout();
        let runtime_override = self.runtime;

        match self.command {
            Command::Init => {
                init::execute(&ctx).await?;
                Ok(0)
            }
            Command::Up { force, quiet } => {
                up::execute(
                    &ctx,
                    up::UpArgs {
                        force,
                        quiet,
                        runtime_override,
                    },
                    &mut out,
                )
                .await?;
                Ok(0)
            }
            Command::Down => {
                down::execute(&ctx, runtime_override).await?;
                Ok(0)
            }
            Command::Run { argv } => Ok(run::execute(&ctx, argv, runtime_override, &mut out).await?),
            Command::Status => {
                status::execute(&ctx, runtime_override, &mut out).await?;
                Ok(0)
            }
            Command::List => {
                list::execute(&ctx, runtime_override, &mut out).await?;
                Ok(0)
            }
            Command::Cleanup { all } => {
                cleanup::execute(&ctx, all, runtime_override, &mut out).await?;
                Ok(0)
            }
            Command::Experimental { command } => match command {
                ExperimentalCommand::Reload => {
                    reload::execute(&ctx, runtime_override).await?;
                    Ok(0)
                }
                ExperimentalCommand::Sync { command } => match command {
                    SyncCommand::Check { template } => {
                        sync::check(&ctx, template, &mut out).await?;
                        Ok(0)
                    }
                    SyncCommand::Resolve => {
                        sync::resolve(&ctx, runtime_override).await?;
                        Ok(0)
                    }
                },
            },
            Command::NetworkHelper { command } => match command {
                NetworkHelperCommand::Install => {
                    network_helper::install(&ctx).await?;
                    Ok(0)
                }
                NetworkHelperCommand::Uninstall => {
                    network_helper::uninstall(&ctx).await?;
                    Ok(0)
                }
                NetworkHelperCommand::Status => {
                    network_helper::status(&ctx, &mut out).await?;
                    Ok(0)
                }
            },
        }
    }
}
