//! Silent install/uninstall operations: MSI, EXE and registry packages are
//! staged from the local source directory into a destination directory
//! (usually an admin share such as `\\host\c$\Temp`) and then run on the
//! remote host through the [`RemoteRunner`].

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{error, info, warn};

use crate::files::copy_into;
use crate::runner::{RemoteCommand, RemoteRunner};
use crate::status;

const UNZIP_EXE: &str = "unzip.exe";
const UNZIP_DLL: &str = "unzip32.dll";

/// Rewrite `\\host\c$\...` into the path the remote machine sees (`C:\...`).
pub fn admin_share_to_local(path: &str, host: &str) -> String {
    let prefix = format!(r"\\{}\c$", host);
    match path.get(..prefix.len()) {
        Some(head) if head.eq_ignore_ascii_case(&prefix) => {
            format!("C:{}", &path[prefix.len()..])
        }
        _ => path.to_string(),
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

pub struct Installer {
    runner: RemoteRunner,
    source_dir: PathBuf,
    verbose: bool,
}

impl Installer {
    pub fn new(runner: RemoteRunner, source_dir: impl Into<PathBuf>, verbose: bool) -> Self {
        Self {
            runner,
            source_dir: source_dir.into(),
            verbose,
        }
    }

    /// Copy `source_dir/name` into `dest_dir`. On failure the status code to
    /// report is returned as the error.
    fn stage(&self, name: &str, dest_dir: &Path) -> Result<PathBuf, i32> {
        let source = self.source_dir.join(name);
        if !source.exists() {
            warn!("source file {} not found", source.display());
            return Err(status::FAILURE);
        }
        match copy_into(&source, dest_dir) {
            Ok(dest) => {
                info!("staged {} in {}", name, dest_dir.display());
                Ok(dest)
            }
            Err(e) => {
                error!("failed to copy {} to {}: {}", name, dest_dir.display(), e);
                Err(status::LOCAL_ERROR)
            }
        }
    }

    fn run(&self, command: RemoteCommand) -> Result<i32> {
        let result = self.runner.run(&command.verbose(self.verbose))?;
        Ok(result.code)
    }

    /// `msiexec /x <product code> /qn /norestart`
    pub fn uninstall_msi(&self, product_code: &str) -> Result<i32> {
        self.run(
            RemoteCommand::new("msiexec.exe")
                .args(["/x", product_code, "/qn", "/norestart"])
                .tool_options(["-s", "-i"]),
        )
    }

    /// Run an uninstaller already present on the remote machine.
    pub fn uninstall_exe(&self, command_line: &[String]) -> Result<i32> {
        let Some((program, args)) = command_line.split_first() else {
            warn!("empty uninstall command");
            return Ok(status::FAILURE);
        };
        self.run(
            RemoteCommand::new(program.as_str())
                .args(args.iter().cloned())
                .tool_options(["-s"]),
        )
    }

    /// Install an MSI from `dest_dir`, staging it there first when `copy` is set.
    pub fn install_msi(
        &self,
        dest_dir: &Path,
        name: &str,
        msi_params: &[String],
        tool_options: &[String],
        copy: bool,
    ) -> Result<i32> {
        if copy {
            if let Err(code) = self.stage(name, dest_dir) {
                return Ok(code);
            }
        }

        let package = dest_dir.join(name);
        if !package.exists() {
            warn!("package {} not found", package.display());
            return Ok(status::FAILURE);
        }

        self.run(
            RemoteCommand::new("msiexec.exe")
                .args(["/i".to_string(), path_arg(&package)])
                .args(["/qn", "/norestart"])
                .args(msi_params.iter().cloned())
                .tool_options(["-s"])
                .tool_options(tool_options.iter().cloned()),
        )
    }

    /// Stage an MSI together with the files it needs (transforms, cab files,
    /// answer files) and install it with exactly `msi_params`.
    pub fn install_msi_with_files(
        &self,
        dest_dir: &Path,
        name: &str,
        extra_files: &[String],
        msi_params: &[String],
    ) -> Result<i32> {
        let package = match self.stage(name, dest_dir) {
            Ok(path) => path,
            Err(code) => return Ok(code),
        };

        let mut complete = true;
        for file in extra_files {
            if self.stage(file, dest_dir).is_err() || !dest_dir.join(file).exists() {
                warn!("companion file {} missing", file);
                complete = false;
            }
        }

        if !package.exists() || !complete {
            return Ok(status::FAILURE);
        }

        self.run(
            RemoteCommand::new("msiexec.exe")
                .args(["/i".to_string(), path_arg(&package)])
                .args(msi_params.iter().cloned())
                .tool_options(["-s"]),
        )
    }

    /// Stage a `.reg` file and import it silently with regedit.
    pub fn apply_reg(&self, dest_dir: &Path, name: &str) -> Result<i32> {
        let reg = match self.stage(name, dest_dir) {
            Ok(path) => path,
            Err(code) => return Ok(code),
        };
        if !reg.exists() {
            return Ok(status::FAILURE);
        }

        self.run(
            RemoteCommand::new("regedit.exe")
                .args(["/s".to_string(), path_arg(&reg)])
                .tool_options(["-s"]),
        )
    }

    /// Run a setup executable from `dest_dir`, staging it there first when `copy` is set.
    pub fn install_exe(
        &self,
        dest_dir: &Path,
        name: &str,
        params: &[String],
        copy: bool,
    ) -> Result<i32> {
        if copy {
            if let Err(code) = self.stage(name, dest_dir) {
                return Ok(code);
            }
        }

        let exe = dest_dir.join(name);
        if !exe.exists() {
            warn!("installer {} not found", exe.display());
            return Ok(status::FAILURE);
        }
        self.run(RemoteCommand::new(path_arg(&exe)).args(params.iter().cloned()))
    }

    /// Stage an uninstaller executable and run it.
    pub fn uninstall_exe_copy(&self, dest_dir: &Path, name: &str, params: &[String]) -> Result<i32> {
        let exe = match self.stage(name, dest_dir) {
            Ok(path) => path,
            Err(code) => return Ok(code),
        };
        if !exe.exists() {
            return Ok(status::FAILURE);
        }
        self.run(RemoteCommand::new(path_arg(&exe)).args(params.iter().cloned()))
    }

    /// Stage the bundled unzip tool and an archive in `dest_dir`, then extract
    /// the archive there on the remote machine.
    pub fn unzip(&self, dest_dir: &Path, archive: &Path) -> Result<i32> {
        let unzip_exe = match self.stage(UNZIP_EXE, dest_dir) {
            Ok(path) => path,
            Err(_) => return Ok(status::FAILURE),
        };
        if self.stage(UNZIP_DLL, dest_dir).is_err() {
            return Ok(status::FAILURE);
        }
        let archive = match copy_into(archive, dest_dir) {
            Ok(path) => path,
            Err(e) => {
                error!("failed to copy {}: {}", archive.display(), e);
                return Ok(status::FAILURE);
            }
        };
        info!("staged unzip tool and {}", archive.display());

        let host = self.runner.host();
        let local = |p: &Path| admin_share_to_local(&path_arg(p), host);

        let command = RemoteCommand::new(local(&unzip_exe))
            .args(["-o".to_string(), "-q".to_string(), local(&archive)])
            .args(["-d".to_string(), local(dest_dir)])
            .verbose(true);
        Ok(self.runner.run(&command)?.code)
    }
}
