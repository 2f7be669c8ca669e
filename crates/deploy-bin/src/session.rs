//! Resolves configuration once at startup and builds the components every
//! subcommand works with. All of them target the same host.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use deploy_core::config::DeployConfig;
use deploy_core::files::FileOps;
use deploy_core::installer::Installer;
use deploy_core::process::ProcessExecutor;
use deploy_core::reconciler::{ReconcilePolicy, ServiceReconciler};
use deploy_core::runner::RemoteRunner;
use deploy_core::sc::ScServiceControl;
use deploy_platform::service::ServiceControl;
use deploy_windows::service::ScmServiceControl;
use deploy_windows::shortcut::ComShortcutWriter;

/// Which service control facility to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Backend {
    /// Remote Service Control Manager API (Windows only)
    Scm,
    /// `sc.exe \\host ...`
    Sc,
}

pub struct Session {
    pub host: String,
    pub tool_dir: PathBuf,
    pub source_dir: PathBuf,
    pub config: DeployConfig,
}

impl Session {
    /// Fill in whatever the config left open: the host defaults to this
    /// machine, tool and source directories to the executable's directory.
    pub fn resolve(config: DeployConfig) -> Result<Self> {
        let host = match &config.host {
            Some(host) => host.clone(),
            None => hostname::get()
                .context("failed to read local hostname")?
                .to_string_lossy()
                .into_owned(),
        };

        let exe_dir = executable_dir()?;
        let tool_dir = config.tool_dir.clone().unwrap_or_else(|| exe_dir.clone());
        let source_dir = config.source_dir.clone().unwrap_or(exe_dir);

        info!(
            "target host {} (tool dir {}, source dir {})",
            host,
            tool_dir.display(),
            source_dir.display()
        );

        Ok(Self {
            host,
            tool_dir,
            source_dir,
            config,
        })
    }

    pub fn runner(&self) -> RemoteRunner {
        RemoteRunner::new(
            self.host.clone(),
            &self.tool_dir,
            &self.config.tool_name,
            Box::new(ProcessExecutor::new()),
        )
    }

    pub fn installer(&self) -> Installer {
        Installer::new(self.runner(), self.source_dir.clone(), self.config.verbose)
    }

    pub fn file_ops(&self) -> FileOps {
        FileOps::new(self.source_dir.clone(), Box::new(ComShortcutWriter::new()))
    }

    pub fn reconciler(&self, backend: Backend) -> ServiceReconciler {
        let control: Box<dyn ServiceControl> = match backend {
            Backend::Scm => Box::new(ScmServiceControl::new(self.host.clone())),
            Backend::Sc => Box::new(ScServiceControl::new(
                self.host.clone(),
                Box::new(ProcessExecutor::new()),
            )),
        };
        ServiceReconciler::new(control, ReconcilePolicy::from(&self.config))
    }
}

fn executable_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("failed to get current exe path")?;
    exe.parent()
        .map(Path::to_path_buf)
        .context("current exe path has no parent directory")
}
