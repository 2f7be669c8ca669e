use std::process::{Command, Stdio};

use anyhow::{Context, Result};
use tracing::debug;

use deploy_platform::command::{CommandExecutor, CommandResult};

use crate::status;

/// Spawns real local processes and captures their output.
pub struct ProcessExecutor;

impl ProcessExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ProcessExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandExecutor for ProcessExecutor {
    fn execute(&self, argv: &[String]) -> Result<CommandResult> {
        let (program, args) = argv.split_first().context("empty command line")?;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        // Keep console tools like psexec from flashing a window
        #[cfg(target_os = "windows")]
        {
            use std::os::windows::process::CommandExt;
            const CREATE_NO_WINDOW: u32 = 0x0800_0000;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }

        debug!("spawning {} with {} args", program, args.len());
        let output = cmd
            .output()
            .with_context(|| format!("failed to run {}", program))?;

        Ok(CommandResult {
            // No code means the process was killed by a signal
            code: output.status.code().unwrap_or(status::LOCAL_ERROR),
            stdout: Some(String::from_utf8_lossy(&output.stdout).into_owned()),
            stderr: Some(String::from_utf8_lossy(&output.stderr).into_owned()),
        })
    }
}
