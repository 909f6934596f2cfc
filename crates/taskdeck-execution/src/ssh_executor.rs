//! Remote executor that drives the actuator host over ssh.
//!
//! Each instruction becomes one invocation of the form
//! `ssh [extra args] [-i identity] <destination> "<remote command> <instruction>"`.
//! The child is killed if the call is dropped (task cancelled) or times out.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use taskdeck_core::config::SshConfig;
use taskdeck_core::error::{Result, TaskdeckError};
use taskdeck_core::executor::{ExecutionOutcome, RemoteExecutor};
use taskdeck_core::intent::DeviceInstruction;
use tokio::process::Command;
use tokio::time::timeout;

pub struct SshExecutor {
    program: String,
    destination: String,
    identity_file: Option<PathBuf>,
    extra_args: Vec<String>,
    remote_command: String,
    timeout: Duration,
}

impl SshExecutor {
    pub fn new(config: &SshConfig) -> Self {
        Self {
            program: config.program.clone(),
            destination: config.destination.clone(),
            identity_file: config.identity_file.clone(),
            extra_args: config.extra_args.clone(),
            remote_command: config.remote_command.clone(),
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
        }
    }

    /// Arguments passed to the ssh program for `instruction`.
    pub fn args(&self, instruction: DeviceInstruction) -> Vec<String> {
        let mut args = self.extra_args.clone();
        if let Some(identity) = &self.identity_file {
            args.push("-i".to_string());
            args.push(identity.display().to_string());
        }
        args.push(self.destination.clone());
        args.push(format!("{} {}", self.remote_command, instruction));
        args
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    async fn execute(&self, instruction: DeviceInstruction) -> Result<ExecutionOutcome> {
        let mut cmd = Command::new(&self.program);
        cmd.args(self.args(instruction))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(
            destination = %self.destination,
            %instruction,
            "running remote instruction"
        );

        let child = cmd.spawn().map_err(|e| {
            TaskdeckError::executor(format!("failed to spawn '{}': {}", self.program, e))
        })?;

        let output = match timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| {
                TaskdeckError::executor(format!("failed to wait for '{}': {}", self.program, e))
            })?,
            Err(_) => {
                return Err(TaskdeckError::executor(format!(
                    "'{}' timed out after {}s",
                    instruction,
                    self.timeout.as_secs()
                )));
            }
        };

        if output.status.success() {
            tracing::debug!(%instruction, "remote instruction succeeded");
            return Ok(ExecutionOutcome::Succeeded);
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let reason = if stderr.is_empty() {
            format!("remote command exited with {}", output.status)
        } else {
            stderr
        };
        tracing::warn!(%instruction, reason = %reason, "remote instruction failed");
        Ok(ExecutionOutcome::Failed { reason })
    }

    fn name(&self) -> &str {
        "ssh"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SshConfig {
        SshConfig {
            identity_file: Some(PathBuf::from("/keys/id_rsa")),
            ..SshConfig::default()
        }
    }

    #[test]
    fn test_args_layout() {
        let executor = SshExecutor::new(&config());
        assert_eq!(
            executor.args(DeviceInstruction::MouseUp),
            vec![
                "-o",
                "BatchMode=yes",
                "-i",
                "/keys/id_rsa",
                "pi@raspberrypi.local",
                "sudo /tmp/hid_executor.sh mouse_up",
            ]
        );
    }

    #[test]
    fn test_args_without_identity() {
        let executor = SshExecutor::new(&SshConfig {
            identity_file: None,
            extra_args: Vec::new(),
            ..SshConfig::default()
        });
        assert_eq!(
            executor.args(DeviceInstruction::Click),
            vec!["pi@raspberrypi.local", "sudo /tmp/hid_executor.sh click"]
        );
    }

    /// Runs `script` through `sh -c`; destination and remote command land in
    /// `$1` and `$2`.
    #[cfg(unix)]
    fn shell(script: &str, timeout_secs: u64) -> SshExecutor {
        SshExecutor::new(&SshConfig {
            program: "sh".to_string(),
            destination: "device".to_string(),
            identity_file: None,
            extra_args: vec!["-c".to_string(), script.to_string(), "sh".to_string()],
            remote_command: "hid".to_string(),
            timeout_secs,
        })
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_zero_exit_succeeds() {
        let executor = shell(r#"test "$2" = "hid click""#, 5);
        let outcome = executor.execute(DeviceInstruction::Click).await.unwrap();
        assert!(outcome.is_success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_reports_stderr() {
        let executor = shell(r#"echo "no such device for $2" >&2; exit 3"#, 5);
        let outcome = executor.execute(DeviceInstruction::Type).await.unwrap();
        assert_eq!(outcome, ExecutionOutcome::failed("no such device for hid type"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_is_executor_error() {
        let executor = shell("sleep 5", 1);
        let err = executor.execute(DeviceInstruction::Click).await.unwrap_err();
        assert!(err.is_executor());
    }

    #[tokio::test]
    async fn test_missing_program_is_executor_error() {
        let executor = SshExecutor::new(&SshConfig {
            program: "/nonexistent/taskdeck-ssh".to_string(),
            ..SshConfig::default()
        });
        let err = executor.execute(DeviceInstruction::Click).await.unwrap_err();
        assert!(err.is_executor());
    }
}
