//! nftables firewall driver, for Linux hosts.

use std::path::PathBuf;

use super::FirewallDriver;

const ANCHOR_DIR: &str = "/etc/nftables.d/alca";
const UNIT_NAME: &str = "alca-nftwatcher";

pub(crate) struct NftablesDriver;

impl NftablesDriver {
    pub fn new() -> Self {
        Self
    }
}

impl FirewallDriver for NftablesDriver {
    fn daemon_config(&self) -> Vec<u8> {
        format!(
            "[Unit]\n\
             Description=Reload nftables rules when {ANCHOR_DIR} changes\n\
             \n\
             [Path]\n\
             PathModified={ANCHOR_DIR}\n\
             Unit={UNIT_NAME}.service\n\
             \n\
             [Install]\n\
             WantedBy=multi-user.target\n"
        )
        .into_bytes()
    }

    fn daemon_config_path(&self) -> PathBuf {
        PathBuf::from(format!("/etc/systemd/system/{UNIT_NAME}.path"))
    }

    fn main_config_path(&self) -> PathBuf {
        PathBuf::from("/etc/nftables.conf")
    }

    fn anchor_line(&self) -> &'static str {
        "include \"/etc/nftables.d/alca/*.nft\""
    }

    fn legacy_anchor_lines(&self) -> &'static [&'static str] {
        &["include \"/etc/nftables.d/alcatraz/*.nft\""]
    }

    fn shared_rules_path(&self) -> PathBuf {
        PathBuf::from(format!("{ANCHOR_DIR}/_shared.nft"))
    }

    fn project_rule_path(&self, project_key: &str) -> PathBuf {
        PathBuf::from(format!("{ANCHOR_DIR}/{project_key}.nft"))
    }

    fn manifest_path(&self) -> PathBuf {
        PathBuf::from(format!("{ANCHOR_DIR}/.projects"))
    }

    fn render_shared_rules(&self, interfaces: &[String], subnet: &str) -> Vec<u8> {
        let mut out = String::from("table inet alca_shared {\n  chain postrouting {\n    type nat hook postrouting priority 100;\n");
        for iface in interfaces {
            out.push_str(&format!("    ip saddr {subnet} oifname \"{iface}\" masquerade\n"));
        }
        out.push_str("  }\n}\n");
        out.into_bytes()
    }

    fn render_project_rules(&self, allow_list: &[String]) -> Vec<u8> {
        let mut out = String::from("table inet alca_project {\n  chain forward {\n    type filter hook forward priority 0; policy drop;\n");
        for dest in allow_list {
            out.push_str(&format!("    ip daddr {dest} accept\n"));
        }
        out.push_str("  }\n}\n");
        out.into_bytes()
    }

    fn reload_args(&self) -> Vec<String> {
        vec!["-f".to_string(), "/etc/nftables.conf".to_string()]
    }
}
