//! Host interface and VM subnet probing
//!
//! Shells out through a [`CommandRunner`] to discover the physical host
//! interfaces and the subnet the container runtime's bridge network uses,
//! so the network helper can render NAT/forwarding rules without
//! hardcoding a platform-specific interface list (§4.4).

use crate::command_runner::{Command, CommandRunner};
use crate::errors::{AlcaError, Result};

/// Fallback subnet used when the runtime's bridge network cannot be probed.
pub const DEFAULT_VM_SUBNET: &str = "192.168.65.0/24";

/// Result of probing the host for interfaces and the VM subnet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubnetProbe {
    pub interfaces: Vec<String>,
    pub vm_subnet: String,
}

impl SubnetProbe {
    /// Probe the host's physical interfaces (loopback excluded) and the
    /// runtime's default bridge subnet. A failed subnet probe falls back to
    /// [`DEFAULT_VM_SUBNET`] rather than aborting setup.
    pub async fn probe<R: CommandRunner>(runner: &R) -> Result<Self> {
        let interfaces = Self::probe_interfaces(runner).await?;
        let vm_subnet = Self::probe_vm_subnet(runner)
            .await
            .unwrap_or_else(|_| DEFAULT_VM_SUBNET.to_string());
        Ok(Self { interfaces, vm_subnet })
    }

    async fn probe_interfaces<R: CommandRunner>(runner: &R) -> Result<Vec<String>> {
        let output = runner.run(Command::new("ifconfig").arg("-l")).await?;
        if !output.success() {
            return Err(AlcaError::external(
                "network-helper",
                format!("failed to enumerate host interfaces: {}", output.stderr),
            ));
        }
        Ok(output
            .stdout
            .split_whitespace()
            .map(str::to_string)
            .filter(|name| !name.starts_with("lo"))
            .collect())
    }

    async fn probe_vm_subnet<R: CommandRunner>(runner: &R) -> Result<String> {
        let cmd = Command::new("docker")
            .arg("network")
            .arg("inspect")
            .arg("bridge")
            .arg("--format")
            .arg("{{range .IPAM.Config}}{{.Subnet}}{{end}}");
        let output = runner.run(cmd).await?;
        if !output.success() {
            return Err(AlcaError::external(
                "network-helper",
                format!("failed to probe runtime bridge subnet: {}", output.stderr),
            ));
        }
        let subnet = output.stdout.trim();
        if subnet.is_empty() {
            return Err(AlcaError::external("network-helper", "runtime reported no bridge subnet"));
        }
        Ok(subnet.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_runner::MockCommandRunner;

    #[tokio::test]
    async fn test_probe_interfaces_excludes_loopback() {
        let runner = MockCommandRunner::new();
        runner.push_success("lo0 en0 en1\n");
        runner.push_success("172.17.0.0/16");
        let probe = SubnetProbe::probe(&runner).await.unwrap();
        assert_eq!(probe.interfaces, vec!["en0".to_string(), "en1".to_string()]);
        assert_eq!(probe.vm_subnet, "172.17.0.0/16");
    }

    #[tokio::test]
    async fn test_probe_falls_back_to_default_subnet_on_failure() {
        let runner = MockCommandRunner::new();
        runner.push_success("en0\n");
        runner.push_failure(1, "network bridge not found");
        let probe = SubnetProbe::probe(&runner).await.unwrap();
        assert_eq!(probe.vm_subnet, DEFAULT_VM_SUBNET);
    }
}
