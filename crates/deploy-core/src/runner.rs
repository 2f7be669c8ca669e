//! Runs commands on the target host through a PsExec-style remote execution tool.
//!
//! The tool is invoked as `<tool> -accepteula <tool options> \\<host> <command> <args>`.
//! Its location is fixed when the runner is built; a missing tool is reported as
//! status 2 without spawning anything.

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{debug, error, info, warn};

use deploy_platform::command::{CommandExecutor, CommandResult};

use crate::status;

/// A command to run on the remote host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteCommand {
    /// Executable path or name as seen from the remote machine
    pub program: String,
    pub args: Vec<String>,
    /// Options for the execution tool itself (e.g. `-s`, `-i`)
    pub tool_options: Vec<String>,
    /// Echo the captured output once the command finishes
    pub verbose: bool,
}

impl RemoteCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn tool_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tool_options.extend(options.into_iter().map(Into::into));
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Program followed by its arguments.
    pub fn command_line(&self) -> Vec<String> {
        let mut line = Vec::with_capacity(self.args.len() + 1);
        line.push(self.program.clone());
        line.extend(self.args.iter().cloned());
        line
    }
}

pub struct RemoteRunner {
    host: String,
    tool_path: PathBuf,
    executor: Box<dyn CommandExecutor>,
}

impl RemoteRunner {
    pub fn new(
        host: impl Into<String>,
        tool_dir: &Path,
        tool_name: &str,
        executor: Box<dyn CommandExecutor>,
    ) -> Self {
        Self {
            host: host.into(),
            tool_path: tool_dir.join(tool_name),
            executor,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// `\\host`, the form the execution tool expects.
    pub fn host_qualifier(&self) -> String {
        format!(r"\\{}", self.host)
    }

    /// Run a command on the remote host and wait for it to finish.
    pub fn run(&self, command: &RemoteCommand) -> Result<CommandResult> {
        self.run_composed(&command.command_line(), &command.tool_options, command.verbose)
    }

    /// Like [`run`](Self::run), for a command line that is already assembled.
    pub fn run_composed(
        &self,
        command_line: &[String],
        tool_options: &[String],
        verbose: bool,
    ) -> Result<CommandResult> {
        if !self.tool_path.exists() {
            error!(
                "*** missing remote execution tool: {} ***",
                self.tool_path.display()
            );
            return Ok(CommandResult::from_code(status::TOOL_MISSING));
        }

        let mut argv = Vec::with_capacity(3 + tool_options.len() + command_line.len());
        argv.push(self.tool_path.to_string_lossy().into_owned());
        argv.push("-accepteula".to_string());
        argv.extend(tool_options.iter().cloned());
        argv.push(self.host_qualifier());
        argv.extend(command_line.iter().cloned());

        info!("running on {}: {}", self.host, command_line.join(" "));
        self.dispatch(&argv, verbose)
    }

    /// Run a fully resolved local command line, without the execution tool.
    pub fn run_local(&self, argv: &[String], verbose: bool) -> Result<CommandResult> {
        info!("running locally: {}", argv.join(" "));
        self.dispatch(argv, verbose)
    }

    fn dispatch(&self, argv: &[String], verbose: bool) -> Result<CommandResult> {
        let result = self.executor.execute(argv)?;
        debug!("command exited with code {}", result.code);
        if verbose {
            echo_output(&result);
        }
        Ok(result)
    }
}

fn echo_output(result: &CommandResult) {
    if let Some(out) = result.stdout.as_deref().map(str::trim_end) {
        if !out.is_empty() {
            info!("{}", out);
        }
    }
    if let Some(err) = result.stderr.as_deref().map(str::trim_end) {
        if !err.is_empty() {
            warn!("{}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingExecutor;

    fn runner_with_tool(dir: &Path, exec: &RecordingExecutor) -> RemoteRunner {
        std::fs::write(dir.join("psexec.exe"), b"MZ").unwrap();
        RemoteRunner::new("ws-042", dir, "psexec.exe", Box::new(exec.clone()))
    }

    #[test]
    fn test_missing_tool_returns_2_without_spawning() {
        let dir = tempfile::tempdir().unwrap();
        let exec = RecordingExecutor::new();
        let runner = RemoteRunner::new("ws-042", dir.path(), "psexec.exe", Box::new(exec.clone()));

        let result = runner
            .run(&RemoteCommand::new("msiexec.exe").args(["/x", "{GUID}"]))
            .unwrap();
        assert_eq!(result.code, status::TOOL_MISSING);
        assert!(exec.calls().is_empty());

        let composed = runner
            .run_composed(&["cmd".to_string()], &[], false)
            .unwrap();
        assert_eq!(composed.code, status::TOOL_MISSING);
        assert!(exec.calls().is_empty());
    }

    #[test]
    fn test_argv_layout() {
        let dir = tempfile::tempdir().unwrap();
        let exec = RecordingExecutor::new();
        let runner = runner_with_tool(dir.path(), &exec);

        let cmd = RemoteCommand::new("msiexec.exe")
            .args(["/x", "{GUID}", "/qn"])
            .tool_options(["-s", "-i"]);
        runner.run(&cmd).unwrap();

        let calls = exec.calls();
        assert_eq!(calls.len(), 1);
        let tool = dir.path().join("psexec.exe").to_string_lossy().into_owned();
        assert_eq!(
            calls[0],
            vec![
                tool.as_str(),
                "-accepteula",
                "-s",
                "-i",
                r"\\ws-042",
                "msiexec.exe",
                "/x",
                "{GUID}",
                "/qn"
            ]
        );
    }

    #[test]
    fn test_exit_code_passes_through() {
        let dir = tempfile::tempdir().unwrap();
        let exec = RecordingExecutor::with_responses(vec![CommandResult {
            code: 1603,
            stdout: Some("fatal error during installation".into()),
            stderr: None,
        }]);
        let runner = runner_with_tool(dir.path(), &exec);

        let result = runner
            .run(&RemoteCommand::new("msiexec.exe").verbose(true))
            .unwrap();
        assert_eq!(result.code, 1603);
        assert_eq!(
            result.stdout.as_deref(),
            Some("fatal error during installation")
        );
    }

    #[test]
    fn test_composed_command_line() {
        let dir = tempfile::tempdir().unwrap();
        let exec = RecordingExecutor::new();
        let runner = runner_with_tool(dir.path(), &exec);

        let line = vec!["cmd".to_string(), "/c".to_string(), "ver".to_string()];
        runner.run_composed(&line, &["-h".to_string()], false).unwrap();

        let call = &exec.calls()[0];
        assert_eq!(&call[1..], ["-accepteula", "-h", r"\\ws-042", "cmd", "/c", "ver"]);
    }

    #[test]
    fn test_local_command_skips_tool() {
        let dir = tempfile::tempdir().unwrap();
        let exec = RecordingExecutor::new();
        // No tool on disk: local commands must still run
        let runner = RemoteRunner::new("ws-042", dir.path(), "psexec.exe", Box::new(exec.clone()));

        let argv = vec![r"\\ws-042\c$\tools\setup.exe".to_string(), "/S".to_string()];
        let result = runner.run_local(&argv, false).unwrap();
        assert_eq!(result.code, 0);
        assert_eq!(exec.calls(), vec![argv]);
    }
}
