use std::path::Path;

use anyhow::Result;

pub trait ShortcutWriter: Send + Sync {
    /// Write a shell link at `link_path` that opens `target` and borrows its icon.
    fn create(&self, link_path: &Path, target: &Path) -> Result<()>;
}
