use anyhow::Result;

/// Exit status and captured output of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandResult {
    pub code: i32,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
}

impl CommandResult {
    /// A result carrying only a status code (nothing was captured).
    pub fn from_code(code: i32) -> Self {
        Self {
            code,
            stdout: None,
            stderr: None,
        }
    }

    pub fn success(&self) -> bool {
        self.code == 0
    }
}

pub trait CommandExecutor: Send + Sync {
    /// Spawn `argv[0]` with the remaining elements as its arguments and block
    /// until it exits.
    fn execute(&self, argv: &[String]) -> Result<CommandResult>;
}
