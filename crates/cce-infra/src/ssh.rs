use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::types::SshTarget;
use crate::{Error, RemoteShell, Result};

const SSHPASS: &str = "sshpass";

/// Password-authenticated SSH through the `sshpass` wrapper.
///
/// Host-key checking is disabled: targets are freshly created instances
/// whose keys are unknown.
pub struct SshPassShell {
    program: String,
    connect_timeout_secs: u32,
}

impl Default for SshPassShell {
    fn default() -> Self {
        Self {
            program: SSHPASS.into(),
            connect_timeout_secs: 30,
        }
    }
}

impl SshPassShell {
    pub fn new(program: impl Into<String>, connect_timeout_secs: u32) -> Self {
        Self {
            program: program.into(),
            connect_timeout_secs,
        }
    }

    /// Arguments passed to `sshpass`. The password travels in `SSHPASS`.
    fn args(&self, target: &SshTarget, remote: &[&str]) -> Vec<String> {
        let mut args = vec![
            "-e".to_string(),
            "ssh".into(),
            "-o".into(),
            "StrictHostKeyChecking=no".into(),
            "-o".into(),
            "UserKnownHostsFile=/dev/null".into(),
            "-o".into(),
            format!("ConnectTimeout={}", self.connect_timeout_secs),
            "-q".into(),
            format!("{}@{}", target.user, target.host),
        ];
        args.extend(remote.iter().map(|s| s.to_string()));
        args
    }

    async fn run(&self, target: &SshTarget, remote: &[&str]) -> Result<String> {
        info!(user = %target.user, host = %target.host, "running remote command");

        let output = Command::new(&self.program)
            .args(self.args(target, remote))
            .env("SSHPASS", &target.password)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| Error::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            return Err(Error::Remote {
                host: target.host.clone(),
                exit_code: output.status.code().unwrap_or(-1),
                output: combined.trim().to_string(),
            });
        }

        debug!(host = %target.host, bytes = combined.len(), "remote command finished");
        Ok(combined.trim().to_string())
    }
}

#[async_trait]
impl RemoteShell for SshPassShell {
    async fn run_script(&self, target: &SshTarget, script: &str) -> Result<String> {
        self.run(target, &["bash", "-c", script]).await
    }

    async fn run_command(&self, target: &SshTarget, command: &str) -> Result<String> {
        self.run(target, &[command]).await
    }
}
