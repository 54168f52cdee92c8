//! Service pre-check run before loading: make sure the document-store server
//! is up on its host by running a start command over SSH.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::process::Command;
use tracing::{debug, info};

use landing_core::config::RemoteShellConfig;

pub struct SshServiceCheck {
    program: String,
    destination: String,
    port: u16,
    key_path: Option<PathBuf>,
    command: String,
    timeout: Duration,
}

impl SshServiceCheck {
    const DEFAULT_TIMEOUT_SECS: u64 = 60;

    /// `None` when no SSH host is configured.
    pub fn from_config(config: &RemoteShellConfig) -> Option<Self> {
        Some(Self {
            program: "ssh".to_string(),
            destination: config.destination()?,
            port: config.port,
            key_path: config.key_path.clone(),
            command: config.start_command.clone(),
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
        })
    }

    fn ssh_args(&self) -> Vec<String> {
        let mut args = vec![
            "-p".to_string(),
            self.port.to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
        ];
        if let Some(key) = &self.key_path {
            args.push("-i".to_string());
            args.push(key.display().to_string());
        }
        args.push(self.destination.clone());
        args.push(self.command.clone());
        args
    }

    pub async fn run(&self) -> Result<()> {
        info!(destination = %self.destination, "Ensuring document store service is running");
        let args = self.ssh_args();
        debug!(?args, "ssh");

        let child = Command::new(&self.program)
            .args(&args)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn {}", self.program))?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.context("ssh did not complete")?,
            // Dropping the future drops the child, which kills it.
            Err(_) => bail!("ssh to {} timed out after {:?}", self.destination, self.timeout),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "remote start command exited with {}: {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            );
        }
        info!(destination = %self.destination, "Document store service is running");
        Ok(())
    }
}
