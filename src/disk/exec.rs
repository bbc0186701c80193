// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{OciError, Result};

const COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// What a finished host command left behind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    pub fn ok(stdout: &str) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    pub fn failed(code: i32, stderr: &str) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` to completion. Spawn failures, including a missing
    /// executable, surface as `OciError::Io`.
    async fn run(&self, program: &str, args: Vec<String>) -> Result<CommandOutput>;
}

/// Runs commands on the host with a fixed timeout.
#[derive(Debug, Clone, Default)]
pub struct HostCommandRunner;

#[async_trait]
impl CommandRunner for HostCommandRunner {
    async fn run(&self, program: &str, args: Vec<String>) -> Result<CommandOutput> {
        debug!("Running {} {}", program, args.join(" "));
        let output = tokio::time::timeout(COMMAND_TIMEOUT, Command::new(program).args(&args).output())
            .await
            .map_err(|_| {
                warn!("{} timed out after {:?}", program, COMMAND_TIMEOUT);
                OciError::DeadlineExceeded
            })??;
        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// Run a command and fail unless it exits zero.
pub async fn run_checked(
    runner: &dyn CommandRunner,
    program: &str,
    args: &[&str],
) -> Result<CommandOutput> {
    let output = runner
        .run(program, args.iter().map(|a| a.to_string()).collect())
        .await?;
    if output.success() {
        Ok(output)
    } else {
        Err(OciError::fatal(format!(
            "{} exited with {:?}: {}",
            program,
            output.code,
            output.stderr.trim()
        )))
    }
}

/// True for the spawn error of an executable that is not installed.
pub fn is_not_installed(err: &OciError) -> bool {
    matches!(err.root(), OciError::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
}
