use std::io::Write;

use anyhow::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Install,
    Uninstall,
}

impl Operation {
    fn in_progress(self) -> &'static str {
        match self {
            Operation::Install => "Installing",
            Operation::Uninstall => "Uninstalling",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Operation::Install => "Install",
            Operation::Uninstall => "Uninstall",
        }
    }
}

/// Print `Installing <name>`, run `op`, then overwrite the line with
/// `Install <name>: <code>`. The status code of `op` is returned unchanged.
pub fn with_status<W, F>(out: &mut W, op: Operation, name: &str, run: F) -> Result<i32>
where
    W: Write,
    F: FnOnce() -> Result<i32>,
{
    write!(out, "{} {}", op.in_progress(), name)?;
    out.flush()?;

    let result = run();
    match &result {
        Ok(code) => writeln!(out, "\r{} {}: {}", op.label(), name, code)?,
        Err(_) => writeln!(out, "\r{} {}: error", op.label(), name)?,
    }
    out.flush()?;
    result
}
