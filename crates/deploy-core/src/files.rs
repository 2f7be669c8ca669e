//! Local file helpers used around installs: copying files and icons into place,
//! creating `.lnk` shortcuts and removing `.url` shortcuts by their target.
//!
//! These never return errors. I/O failures are logged and reported as
//! [`status::LOCAL_ERROR`] so an install script can keep going.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use deploy_platform::shortcut::ShortcutWriter;

use crate::status;

/// Copy `source` into `dest_dir` (created as needed) and return the new path.
pub(crate) fn copy_into(source: &Path, dest_dir: &Path) -> io::Result<PathBuf> {
    let name = source.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} has no file name", source.display()),
        )
    })?;
    fs::create_dir_all(dest_dir)?;
    let dest = dest_dir.join(name);
    fs::copy(source, &dest)?;
    Ok(dest)
}

/// Run a fallible local step, turning I/O errors into [`status::LOCAL_ERROR`].
pub(crate) fn guarded(what: &str, step: impl FnOnce() -> io::Result<i32>) -> i32 {
    match step() {
        Ok(code) => code,
        Err(e) => {
            error!("{} failed: {}", what, e);
            status::LOCAL_ERROR
        }
    }
}

pub struct FileOps {
    source_dir: PathBuf,
    shortcuts: Box<dyn ShortcutWriter>,
}

impl FileOps {
    pub fn new(source_dir: impl Into<PathBuf>, shortcuts: Box<dyn ShortcutWriter>) -> Self {
        Self {
            source_dir: source_dir.into(),
            shortcuts,
        }
    }

    /// Copy `source_dir/source_name` into `dest_dir`.
    pub fn copy_file(&self, source_name: &str, dest_dir: &Path) -> i32 {
        let source = self.source_dir.join(source_name);
        if !source.exists() {
            warn!("source file {} not found", source.display());
            return status::PRECONDITION_MISSING;
        }

        guarded("copy", || {
            let dest = copy_into(&source, dest_dir)?;
            if dest.exists() {
                info!("copied {} to {}", source.display(), dest_dir.display());
                Ok(status::SUCCESS)
            } else {
                Ok(status::FAILURE)
            }
        })
    }

    /// Copy an icon file from `source_dir` into an existing profile directory.
    pub fn copy_icon(&self, profile_dir: &Path, icon_name: &str) -> i32 {
        if !profile_dir.exists() {
            warn!("profile directory {} not found", profile_dir.display());
            return status::PRECONDITION_MISSING;
        }

        let source = self.source_dir.join(icon_name);
        guarded("icon copy", || {
            let dest = copy_into(&source, profile_dir)?;
            Ok(if dest.exists() {
                status::SUCCESS
            } else {
                status::FAILURE
            })
        })
    }

    /// Create `profile_dir/<name>.lnk` pointing at `target`.
    pub fn add_shortcut(&self, profile_dir: &Path, name: &str, target: &Path) -> i32 {
        if !profile_dir.exists() {
            warn!("profile directory {} not found", profile_dir.display());
            return status::PRECONDITION_MISSING;
        }

        let link = profile_dir.join(format!("{}.lnk", name));
        match self.shortcuts.create(&link, target) {
            Ok(()) => status::SUCCESS,
            Err(e) => {
                error!("failed to create shortcut {}: {:#}", link.display(), e);
                status::LOCAL_ERROR
            }
        }
    }

    /// Delete every `.url` file in `profile_dir` whose content mentions `url`.
    ///
    /// Returns [`status::PRECONDITION_MISSING`] when nothing matched.
    pub fn remove_url_shortcuts(&self, profile_dir: &Path, url: &str) -> i32 {
        if !profile_dir.is_dir() {
            return status::PRECONDITION_MISSING;
        }

        guarded("url shortcut cleanup", || {
            let mut matches = Vec::new();
            for entry in fs::read_dir(profile_dir)? {
                let path = entry?.path();
                let is_url = path.extension().map(|e| e == "url").unwrap_or(false);
                if !path.is_file() || !is_url {
                    continue;
                }
                let content = fs::read(&path)?;
                if String::from_utf8_lossy(&content).contains(url) {
                    matches.push(path);
                }
            }

            if matches.is_empty() {
                return Ok(status::PRECONDITION_MISSING);
            }
            for path in &matches {
                fs::remove_file(path)?;
                info!("removed {}", path.display());
            }
            Ok(status::SUCCESS)
        })
    }
}
