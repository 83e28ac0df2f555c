//! pf (BSD packet filter) firewall driver, for macOS hosts.

use std::path::PathBuf;

use super::FirewallDriver;

const ANCHOR_DIR: &str = "/etc/pf.anchors/alca";
const DAEMON_LABEL: &str = "com.alca.pfwatcher";

pub(crate) struct PfDriver;

impl PfDriver {
    pub fn new() -> Self {
        Self
    }
}

impl FirewallDriver for PfDriver {
    fn daemon_config(&self) -> Vec<u8> {
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <!DOCTYPE plist PUBLIC \"-//Apple//DTD PLIST 1.0//EN\" \"http://www.apple.com/DTDs/PropertyList-1.0.dtd\">\n\
             <plist version=\"1.0\">\n\
             <dict>\n\
             \t<key>Label</key>\n\
             \t<string>{DAEMON_LABEL}</string>\n\
             \t<key>WatchPaths</key>\n\
             \t<array>\n\
             \t\t<string>{ANCHOR_DIR}</string>\n\
             \t</array>\n\
             \t<key>ProgramArguments</key>\n\
             \t<array>\n\
             \t\t<string>/sbin/pfctl</string>\n\
             \t\t<string>-f</string>\n\
             \t\t<string>/etc/pf.conf</string>\n\
             \t</array>\n\
             \t<key>RunAtLoad</key>\n\
             \t<true/>\n\
             </dict>\n\
             </plist>\n"
        )
        .into_bytes()
    }

    fn daemon_config_path(&self) -> PathBuf {
        PathBuf::from(format!("/Library/LaunchDaemons/{DAEMON_LABEL}.plist"))
    }

    fn main_config_path(&self) -> PathBuf {
        PathBuf::from("/etc/pf.conf")
    }

    fn anchor_line(&self) -> &'static str {
        "anchor \"alca/*\""
    }

    fn legacy_anchor_lines(&self) -> &'static [&'static str] {
        &["anchor \"alcatraz/*\""]
    }

    fn shared_rules_path(&self) -> PathBuf {
        PathBuf::from(format!("{ANCHOR_DIR}/_shared"))
    }

    fn project_rule_path(&self, project_key: &str) -> PathBuf {
        PathBuf::from(format!("{ANCHOR_DIR}/{project_key}"))
    }

    fn manifest_path(&self) -> PathBuf {
        PathBuf::from(format!("{ANCHOR_DIR}/.projects"))
    }

    fn render_shared_rules(&self, interfaces: &[String], subnet: &str) -> Vec<u8> {
        let mut out = String::new();
        for iface in interfaces {
            out.push_str(&format!("nat on {iface} from {subnet} to any -> ({iface})\n"));
        }
        out.into_bytes()
    }

    fn render_project_rules(&self, allow_list: &[String]) -> Vec<u8> {
        let mut out = String::new();
        for dest in allow_list {
            out.push_str(&format!("pass out quick proto {{ tcp udp }} to {dest}\n"));
        }
        out.push_str("block drop out quick\n");
        out.into_bytes()
    }

    fn reload_args(&self) -> Vec<String> {
        vec!["-f".to_string(), "/etc/pf.conf".to_string()]
    }
}
