//! Host platform detection for the network helper
//!
//! The network helper enforces LAN-access rules with a different firewall
//! family per host: a packet-filter anchor tree reloaded by a file-watching
//! daemon on one platform, an nftables ruleset reloaded by a systemd-style
//! unit on the other. This module is the single place that decides which
//! family a given host uses.

use tracing::instrument;

/// The firewall family the network helper targets on this host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirewallFamily {
    /// BSD-derived packet filter (pf), reloaded by a launchd-style watcher.
    PacketFilter,
    /// Linux nftables, reloaded by a systemd-style unit.
    Nftables,
}

impl FirewallFamily {
    /// Detect the firewall family for the current host.
    #[instrument]
    pub fn detect() -> Self {
        if cfg!(target_os = "macos") {
            FirewallFamily::PacketFilter
        } else {
            // Linux and any other unix-like fallback use nftables; Alcatraz
            // does not support Windows hosts for the network helper.
            FirewallFamily::Nftables
        }
    }

    /// Directory name under the system anchor/ruleset location, e.g.
    /// `/etc/pf.anchors/alca/` or `/etc/nftables.d/alca/`.
    pub fn anchor_dir_name(self) -> &'static str {
        "alca"
    }

    /// Display name used in log messages and error text.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PacketFilter => "pf",
            Self::Nftables => "nftables",
        }
    }
}

impl std::fmt::Display for FirewallFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
