//! Host network helper
//!
//! Enforces a project's LAN-access allow-list from outside any surface the
//! container or its VM can touch: a per-host firewall ruleset, reloaded by
//! a long-lived system daemon, written exclusively through [`TransactFs`] so
//! every change lands in one privileged commit batch (§4.4).

pub mod nftables;
pub mod pf;
pub mod subnet;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::command_runner::CommandRunner;
use crate::errors::Result;
use crate::fs_env::FileSystem;
use crate::observability::network_span;
use crate::timed_span;
use crate::platform::FirewallFamily;
use crate::transactfs::TransactFs;

use nftables::NftablesDriver;
use pf::PfDriver;
use subnet::SubnetProbe;

/// A post-commit action the caller must run once TransactFs has committed
/// the staged changes for this operation: on some platforms the watcher
/// daemon's triggering is not synchronous, so the ruleset must be reloaded
/// directly (§4.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostCommitAction {
    /// The daemon will pick up the change on its own; nothing further to do.
    None,
    /// Reload the ruleset directly, e.g. `pfctl -f /etc/pf.conf`.
    ReloadRuleset { args: Vec<String> },
}

/// Per-firewall-family rule rendering and path layout. Implemented by
/// [`pf::PfDriver`] and [`nftables::NftablesDriver`]; [`NetworkHelper`]
/// itself is agnostic to which family is in play.
pub(crate) trait FirewallDriver {
    fn daemon_config(&self) -> Vec<u8>;
    fn daemon_config_path(&self) -> PathBuf;
    fn main_config_path(&self) -> PathBuf;
    fn anchor_line(&self) -> &'static str;
    fn legacy_anchor_lines(&self) -> &'static [&'static str];
    fn shared_rules_path(&self) -> PathBuf;
    fn project_rule_path(&self, project_key: &str) -> PathBuf;
    /// A small manifest file listing active project keys, used in place of
    /// directory listing (TransactFs has no `read_dir`) to decide whether
    /// the shared rule file should be created or removed as project count
    /// crosses 0↔1 (§4.4).
    fn manifest_path(&self) -> PathBuf;
    fn render_shared_rules(&self, interfaces: &[String], subnet: &str) -> Vec<u8>;
    fn render_project_rules(&self, allow_list: &[String]) -> Vec<u8>;
    fn reload_args(&self) -> Vec<String>;
}

fn driver_for(family: FirewallFamily) -> Box<dyn FirewallDriver> {
    match family {
        FirewallFamily::PacketFilter => Box::new(PfDriver::new()),
        FirewallFamily::Nftables => Box::new(NftablesDriver::new()),
    }
}

/// Derive the manifest key for a project directory by substituting path
/// separators with dashes, per §4.4's per-project file naming convention.
pub fn project_key(project_dir: &Path) -> String {
    project_dir.to_string_lossy().replace(std::path::MAIN_SEPARATOR, "-")
}

fn read_manifest<F: FileSystem>(tfs: &TransactFs<F>, driver: &dyn FirewallDriver) -> Vec<String> {
    match tfs.read(&driver.manifest_path()) {
        Ok(bytes) => String::from_utf8_lossy(&bytes)
            .lines()
            .map(str::to_string)
            .filter(|l| !l.is_empty())
            .collect(),
        Err(_) => Vec::new(),
    }
}

fn write_manifest<F: FileSystem>(tfs: &TransactFs<F>, driver: &dyn FirewallDriver, keys: &[String]) -> Result<()> {
    let content = keys.join("\n");
    let content = if content.is_empty() { content } else { format!("{content}\n") };
    tfs.write(&driver.manifest_path(), content.as_bytes(), 0o644)?;
    Ok(())
}

/// Orchestrates the host firewall's install / setup / teardown / uninstall
/// lifecycle (§4.4), reading and writing exclusively through a
/// [`TransactFs`] handle and probing host/runtime network facts through a
/// [`CommandRunner`].
pub struct NetworkHelper<F: FileSystem, R: CommandRunner> {
    tfs: Arc<TransactFs<F>>,
    runner: Arc<R>,
    family: FirewallFamily,
}

impl<F: FileSystem, R: CommandRunner> NetworkHelper<F, R> {
    pub fn new(tfs: Arc<TransactFs<F>>, runner: Arc<R>) -> Self {
        Self {
            tfs,
            runner,
            family: FirewallFamily::detect(),
        }
    }

    /// Test-only constructor that pins the firewall family instead of
    /// detecting it from the host, so both drivers are exercised in CI
    /// regardless of which OS runs the test suite.
    #[cfg(test)]
    fn with_family(tfs: Arc<TransactFs<F>>, runner: Arc<R>, family: FirewallFamily) -> Self {
        Self { tfs, runner, family }
    }

    /// Idempotently stage the daemon config and anchor line. Returns `true`
    /// if anything changed (the caller should commit and then load the
    /// daemon); `false` means install was already a no-op.
    #[instrument(skip(self))]
    pub fn install_helper(&self) -> Result<bool> {
        let timed = timed_span!(network_span("install", "<host>"));
        let result = (|| {
            let driver = driver_for(self.family);
            let mut changed = false;

            let config_path = driver.daemon_config_path();
            let desired = driver.daemon_config();
            if self.tfs.read(&config_path).ok().as_deref() != Some(desired.as_slice()) {
                self.tfs.write(&config_path, &desired, 0o644)?;
                changed = true;
            }

            if self.migrate_anchor_if_needed(driver.as_ref())? {
                changed = true;
            }

            debug!(changed, family = %self.family, "install-helper evaluated");
            Ok(changed)
        })();
        timed.complete();
        result
    }

    /// True if the installed daemon config differs from the embedded
    /// current version, or the main firewall config still carries a legacy
    /// anchor form instead of the current one.
    pub fn needs_update(&self) -> Result<bool> {
        let driver = driver_for(self.family);
        if self.tfs.read(&driver.daemon_config_path()).ok().as_deref() != Some(driver.daemon_config().as_slice()) {
            return Ok(true);
        }
        Ok(!self.has_current_anchor(driver.as_ref()))
    }

    /// Probe the VM subnet and host interfaces, rewrite the shared rule file
    /// if the rendered content changed, write the per-project rule file, and
    /// record the project in the manifest. Returns the reload action the
    /// caller runs after the enclosing TransactFs commit succeeds.
    #[instrument(skip(self, lan_allow))]
    pub async fn setup(&self, project_dir: &Path, lan_allow: &[String]) -> Result<PostCommitAction> {
        let timed = timed_span!(network_span("setup", &project_dir.to_string_lossy()));
        let result = async {
            let driver = driver_for(self.family);
            let probe = SubnetProbe::probe(self.runner.as_ref()).await?;

            let shared_path = driver.shared_rules_path();
            let desired_shared = driver.render_shared_rules(&probe.interfaces, &probe.vm_subnet);
            if self.tfs.read(&shared_path).ok().as_deref() != Some(desired_shared.as_slice()) {
                self.tfs.write(&shared_path, &desired_shared, 0o644)?;
            }

            let key = project_key(project_dir);
            self.tfs.write(
                &driver.project_rule_path(&key),
                &driver.render_project_rules(lan_allow),
                0o644,
            )?;

            let mut manifest = read_manifest(&self.tfs, driver.as_ref());
            if !manifest.contains(&key) {
                manifest.push(key);
                write_manifest(&self.tfs, driver.as_ref(), &manifest)?;
            }

            Ok(PostCommitAction::ReloadRuleset {
                args: driver.reload_args(),
            })
        }
        .await;
        timed.complete();
        result
    }

    /// Delete the per-project rule file and drop it from the manifest; if
    /// no projects remain, delete the shared rule file too.
    #[instrument(skip(self))]
    pub fn teardown(&self, project_dir: &Path) -> Result<PostCommitAction> {
        let timed = timed_span!(network_span("teardown", &project_dir.to_string_lossy()));
        let result = (|| {
            let driver = driver_for(self.family);
            let key = project_key(project_dir);

            self.tfs.remove(&driver.project_rule_path(&key))?;

            let remaining: Vec<String> = read_manifest(&self.tfs, driver.as_ref())
                .into_iter()
                .filter(|k| k != &key)
                .collect();

            if remaining.is_empty() {
                self.tfs.remove(&driver.shared_rules_path())?;
                self.tfs.remove(&driver.manifest_path())?;
            } else {
                write_manifest(&self.tfs, driver.as_ref(), &remaining)?;
            }

            Ok(PostCommitAction::ReloadRuleset {
                args: driver.reload_args(),
            })
        })();
        timed.complete();
        result
    }

    /// Bootout the daemon, remove its config and the anchor line, flush the
    /// rules, remove the anchor directory's contents.
    pub fn uninstall_helper(&self) -> Result<()> {
        let driver = driver_for(self.family);
        self.tfs.remove(&driver.daemon_config_path())?;
        self.tfs.remove(&driver.shared_rules_path())?;
        self.tfs.remove(&driver.manifest_path())?;
        self.remove_anchor_line(driver.as_ref())?;
        Ok(())
    }

    fn has_current_anchor(&self, driver: &dyn FirewallDriver) -> bool {
        let Ok(bytes) = self.tfs.read(&driver.main_config_path()) else {
            return false;
        };
        String::from_utf8_lossy(&bytes)
            .lines()
            .any(|line| line.trim() == driver.anchor_line())
    }

    /// Write the current anchor line into the main firewall config, stripping
    /// any legacy anchor forms. Returns `true` if the file content changed.
    fn migrate_anchor_if_needed(&self, driver: &dyn FirewallDriver) -> Result<bool> {
        if self.has_current_anchor(driver) {
            return Ok(false);
        }
        let existing = self
            .tfs
            .read(&driver.main_config_path())
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .unwrap_or_default();
        let mut lines: Vec<&str> = existing
            .lines()
            .filter(|line| !driver.legacy_anchor_lines().contains(&line.trim()))
            .collect();
        lines.push(driver.anchor_line());
        let rendered = format!("{}\n", lines.join("\n"));
        self.tfs.write(&driver.main_config_path(), rendered.as_bytes(), 0o644)?;
        Ok(true)
    }

    fn remove_anchor_line(&self, driver: &dyn FirewallDriver) -> Result<()> {
        let Ok(bytes) = self.tfs.read(&driver.main_config_path()) else {
            return Ok(());
        };
        let content = String::from_utf8_lossy(&bytes);
        let kept: Vec<&str> = content.lines().filter(|line| line.trim() != driver.anchor_line()).collect();
        let rendered = if kept.is_empty() { String::new() } else { format!("{}\n", kept.join("\n")) };
        self.tfs.write(&driver.main_config_path(), rendered.as_bytes(), 0o644)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_runner::MockCommandRunner;
    use crate::fs_env::InMemoryFileSystem;

    fn helper(family: FirewallFamily) -> NetworkHelper<InMemoryFileSystem, MockCommandRunner> {
        let tfs = Arc::new(TransactFs::new(InMemoryFileSystem::new()));
        let runner = Arc::new(MockCommandRunner::new());
        NetworkHelper::with_family(tfs, runner, family)
    }

    #[test]
    fn test_project_key_substitutes_path_separators() {
        let key = project_key(Path::new("/Users/a/project"));
        assert_eq!(key, "-Users-a-project");
    }

    #[test]
    fn test_install_helper_is_idempotent() {
        let h = helper(FirewallFamily::Nftables);
        assert!(h.install_helper().unwrap());
        assert!(!h.install_helper().unwrap());
        assert!(!h.needs_update().unwrap());
    }

    #[test]
    fn test_install_helper_migrates_legacy_anchor() {
        let h = helper(FirewallFamily::PacketFilter);
        let driver = driver_for(h.family);
        h.tfs
            .write(&driver.main_config_path(), b"anchor \"alcatraz/*\"\n", 0o644)
            .unwrap();
        assert!(h.install_helper().unwrap());
        assert!(h.has_current_anchor(driver.as_ref()));
        let content = String::from_utf8(h.tfs.read(&driver.main_config_path()).unwrap()).unwrap();
        assert!(!content.contains("alcatraz/*"));
    }

    #[tokio::test]
    async fn test_setup_then_teardown_removes_shared_file_when_last_project_leaves() {
        let h = helper(FirewallFamily::Nftables);
        h.runner.push_success("en0\n");
        h.runner.push_success("172.17.0.0/16");
        let project = Path::new("/work/proj");

        let action = h.setup(project, &["github.com".to_string()]).await.unwrap();
        assert!(matches!(action, PostCommitAction::ReloadRuleset { .. }));
        let driver = driver_for(h.family);
        assert!(h.tfs.read(&driver.shared_rules_path()).is_ok());

        h.teardown(project).unwrap();
        assert!(h.tfs.read(&driver.shared_rules_path()).is_err());
        assert!(h.tfs.read(&driver.manifest_path()).is_err());
    }

    #[tokio::test]
    async fn test_shared_rules_survive_teardown_of_one_of_two_projects() {
        let h = helper(FirewallFamily::PacketFilter);
        h.runner.push_success("en0\n");
        h.runner.push_success("192.168.65.0/24");
        h.setup(Path::new("/work/a"), &[]).await.unwrap();
        h.runner.push_success("en0\n");
        h.runner.push_success("192.168.65.0/24");
        h.setup(Path::new("/work/b"), &[]).await.unwrap();

        h.teardown(Path::new("/work/a")).unwrap();
        let driver = driver_for(h.family);
        assert!(h.tfs.read(&driver.shared_rules_path()).is_ok());
        let manifest = read_manifest(&h.tfs, driver.as_ref());
        assert_eq!(manifest, vec!["-work-b".to_string()]);
    }
}
