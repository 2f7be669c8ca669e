use std::io::{self, IsTerminal};
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use deploy_core::config::{DeployConfig, PostStartCheck};
use deploy_core::display::{with_status, Operation};
use deploy_core::runner::RemoteCommand;
use deploy_core::status;

mod session;

use session::{Backend, Session};

#[derive(Parser, Debug)]
#[command(name = "remote-deploy")]
#[command(about = "Silent installs and service control on remote Windows machines")]
#[command(version)]
struct Cli {
    /// Target machine (default: config file, then this machine)
    #[arg(long, env = "DEPLOY_HOST", global = true)]
    host: Option<String>,

    /// Path to config file
    #[arg(long, env = "DEPLOY_CONFIG_PATH", global = true)]
    config_path: Option<PathBuf>,

    /// Directory holding the remote execution tool (default: next to this binary)
    #[arg(long, env = "DEPLOY_TOOL_DIR", global = true)]
    tool_dir: Option<PathBuf>,

    /// Directory holding packages and helper files (default: next to this binary)
    #[arg(long, env = "DEPLOY_SOURCE_DIR", global = true)]
    source_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "DEPLOY_LOG_LEVEL", global = true)]
    log_level: String,

    /// Show output of remote commands
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a program on the target host
    Run {
        /// Option for the execution tool (repeatable)
        #[arg(long = "tool-option", allow_hyphen_values = true)]
        tool_options: Vec<String>,
        program: String,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Run a fully resolved command locally (no execution tool)
    RunLocal {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        argv: Vec<String>,
    },
    /// Stage an MSI in DEST_DIR and install it silently
    InstallMsi {
        dest_dir: PathBuf,
        name: String,
        /// Extra msiexec argument (repeatable)
        #[arg(long = "msi-param", allow_hyphen_values = true)]
        msi_params: Vec<String>,
        /// Extra execution tool option (repeatable)
        #[arg(long = "tool-option", allow_hyphen_values = true)]
        tool_options: Vec<String>,
        /// Install a package already present in DEST_DIR
        #[arg(long)]
        no_copy: bool,
    },
    /// Stage an MSI with companion files and install it
    InstallMsiWithFiles {
        dest_dir: PathBuf,
        name: String,
        /// File to stage next to the MSI (repeatable)
        #[arg(long = "extra-file")]
        extra_files: Vec<String>,
        /// msiexec argument (repeatable)
        #[arg(long = "msi-param", allow_hyphen_values = true)]
        msi_params: Vec<String>,
    },
    /// Uninstall an MSI product by product code
    UninstallMsi {
        product_code: String,
        /// Name shown in the status line
        #[arg(long)]
        name: Option<String>,
    },
    /// Run an uninstaller already on the target host
    UninstallExe {
        /// Name shown in the status line
        #[arg(long)]
        name: Option<String>,
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// Stage a setup executable in DEST_DIR and run it
    InstallExe {
        dest_dir: PathBuf,
        name: String,
        /// Run an executable already present in DEST_DIR
        #[arg(long)]
        no_copy: bool,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        params: Vec<String>,
    },
    /// Stage an uninstaller in DEST_DIR and run it
    UninstallExeCopy {
        dest_dir: PathBuf,
        name: String,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        params: Vec<String>,
    },
    /// Stage a .reg file in DEST_DIR and import it
    ApplyReg { dest_dir: PathBuf, name: String },
    /// Copy a file from the source directory
    CopyFile { source_name: String, dest_dir: PathBuf },
    /// Copy an icon file into a profile directory
    CopyIcon { profile_dir: PathBuf, icon_name: String },
    /// Create a .lnk shortcut in a profile directory
    AddShortcut {
        profile_dir: PathBuf,
        name: String,
        target: PathBuf,
    },
    /// Delete .url shortcuts whose content contains URL
    RemoveUrlShortcuts { profile_dir: PathBuf, url: String },
    /// Extract an archive on the target host with the bundled unzip tool
    Unzip { dest_dir: PathBuf, archive: PathBuf },
    /// Query or change a service on the target host
    Service {
        #[arg(long, value_enum, default_value_t = Backend::Scm)]
        backend: Backend,

        /// Retry budget (default: config file)
        #[arg(long)]
        retries: Option<i32>,

        /// Judge a start by the state read before the start command
        #[arg(long)]
        stale_check: bool,

        #[command(subcommand)]
        action: ServiceAction,
    },
}

#[derive(Subcommand, Debug)]
enum ServiceAction {
    Query {
        name: String,
    },
    Start {
        name: String,
        /// Stop the service first if it is running
        #[arg(long)]
        restart: bool,
    },
    Stop {
        name: String,
    },
    Restart {
        name: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; stdout carries the status lines
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    log_subscriber(env_filter, io::stderr, io::stderr().is_terminal()).init();

    let config = load_config(&cli)?;
    let session = Session::resolve(config)?;

    let code = dispatch(cli.command, session)?;
    info!("finished: {} ({})", code, status::describe(code));
    std::process::exit(code);
}

fn log_subscriber<W>(
    env_filter: EnvFilter,
    writer: W,
    ansi: bool,
) -> impl tracing::Subscriber + Send + Sync + 'static
where
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_ansi(ansi)
        .with_writer(writer)
        .finish()
}

fn load_config(cli: &Cli) -> Result<DeployConfig> {
    let config_path = cli
        .config_path
        .clone()
        .unwrap_or_else(DeployConfig::default_path);

    let mut config = if config_path.exists() {
        info!("loading config from {}", config_path.display());
        DeployConfig::load(&config_path)?
    } else {
        DeployConfig::default()
    };

    // CLI args override config file
    if let Some(host) = &cli.host {
        config.host = Some(host.clone());
    }
    if let Some(dir) = &cli.tool_dir {
        config.tool_dir = Some(dir.clone());
    }
    if let Some(dir) = &cli.source_dir {
        config.source_dir = Some(dir.clone());
    }
    if cli.verbose {
        config.verbose = true;
    }
    if let Commands::Service {
        retries,
        stale_check,
        ..
    } = &cli.command
    {
        if let Some(retries) = retries {
            config.retry_times = *retries;
        }
        if *stale_check {
            config.post_start_check = PostStartCheck::Stale;
        }
    }

    Ok(config)
}

fn dispatch(command: Commands, session: Session) -> Result<i32> {
    let mut out = io::stdout();
    let verbose = session.config.verbose;

    match command {
        Commands::Run {
            tool_options,
            program,
            args,
        } => {
            let cmd = RemoteCommand::new(program)
                .args(args)
                .tool_options(tool_options)
                .verbose(verbose);
            Ok(session.runner().run(&cmd)?.code)
        }
        Commands::RunLocal { argv } => Ok(session.runner().run_local(&argv, verbose)?.code),
        Commands::InstallMsi {
            dest_dir,
            name,
            msi_params,
            tool_options,
            no_copy,
        } => {
            let installer = session.installer();
            with_status(&mut out, Operation::Install, &name, || {
                installer.install_msi(&dest_dir, &name, &msi_params, &tool_options, !no_copy)
            })
        }
        Commands::InstallMsiWithFiles {
            dest_dir,
            name,
            extra_files,
            msi_params,
        } => {
            let installer = session.installer();
            with_status(&mut out, Operation::Install, &name, || {
                installer.install_msi_with_files(&dest_dir, &name, &extra_files, &msi_params)
            })
        }
        Commands::UninstallMsi { product_code, name } => {
            let installer = session.installer();
            let label = name.unwrap_or_else(|| product_code.clone());
            with_status(&mut out, Operation::Uninstall, &label, || {
                installer.uninstall_msi(&product_code)
            })
        }
        Commands::UninstallExe { name, command } => {
            let installer = session.installer();
            let label = name.unwrap_or_else(|| command[0].clone());
            with_status(&mut out, Operation::Uninstall, &label, || {
                installer.uninstall_exe(&command)
            })
        }
        Commands::InstallExe {
            dest_dir,
            name,
            no_copy,
            params,
        } => {
            let installer = session.installer();
            with_status(&mut out, Operation::Install, &name, || {
                installer.install_exe(&dest_dir, &name, &params, !no_copy)
            })
        }
        Commands::UninstallExeCopy {
            dest_dir,
            name,
            params,
        } => {
            let installer = session.installer();
            with_status(&mut out, Operation::Uninstall, &name, || {
                installer.uninstall_exe_copy(&dest_dir, &name, &params)
            })
        }
        Commands::ApplyReg { dest_dir, name } => {
            let installer = session.installer();
            with_status(&mut out, Operation::Install, &name, || {
                installer.apply_reg(&dest_dir, &name)
            })
        }
        Commands::CopyFile {
            source_name,
            dest_dir,
        } => Ok(session.file_ops().copy_file(&source_name, &dest_dir)),
        Commands::CopyIcon {
            profile_dir,
            icon_name,
        } => Ok(session.file_ops().copy_icon(&profile_dir, &icon_name)),
        Commands::AddShortcut {
            profile_dir,
            name,
            target,
        } => Ok(session.file_ops().add_shortcut(&profile_dir, &name, &target)),
        Commands::RemoveUrlShortcuts { profile_dir, url } => {
            Ok(session.file_ops().remove_url_shortcuts(&profile_dir, &url))
        }
        Commands::Unzip { dest_dir, archive } => session.installer().unzip(&dest_dir, &archive),
        Commands::Service {
            backend, action, ..
        } => {
            let reconciler = session.reconciler(backend);
            match action {
                ServiceAction::Query { name } => {
                    let state = reconciler.query(&name)?;
                    println!("{} on {}: {} ({})", name, session.host, state, state.code());
                    Ok(status::SUCCESS)
                }
                ServiceAction::Start { name, restart } => reconciler.start(&name, restart),
                ServiceAction::Stop { name } => reconciler.stop(&name),
                ServiceAction::Restart { name } => reconciler.restart(&name),
            }
        }
    }
}
