use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Which state the start routine inspects right after issuing the start command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostStartCheck {
    /// Query the service again after the start command
    #[default]
    Fresh,
    /// Reuse the state read before the start command was issued
    Stale,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Target machine (hostname or address, no leading `\\`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Directory holding the remote execution tool
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_dir: Option<PathBuf>,

    /// File name of the remote execution tool inside `tool_dir`
    #[serde(default = "default_tool_name")]
    pub tool_name: String,

    /// Directory holding installers, registry files, icons and unzip binaries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_dir: Option<PathBuf>,

    /// Retry budget for service start/stop
    #[serde(default = "default_retry_times")]
    pub retry_times: i32,

    /// Pause between a successful stop and the follow-up start of a restart
    #[serde(default = "default_restart_settle")]
    pub restart_settle_ms: u64,

    /// Pause while a service reports START_PENDING/STOP_PENDING
    #[serde(default = "default_pending_wait")]
    pub pending_wait_ms: u64,

    #[serde(default)]
    pub post_start_check: PostStartCheck,

    /// Echo captured output of remote commands
    #[serde(default)]
    pub verbose: bool,
}

fn default_tool_name() -> String {
    "psexec.exe".to_string()
}
fn default_retry_times() -> i32 {
    3
}
fn default_restart_settle() -> u64 {
    1000
}
fn default_pending_wait() -> u64 {
    5000
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            host: None,
            tool_dir: None,
            tool_name: default_tool_name(),
            source_dir: None,
            retry_times: default_retry_times(),
            restart_settle_ms: default_restart_settle(),
            pending_wait_ms: default_pending_wait(),
            post_start_check: PostStartCheck::default(),
            verbose: false,
        }
    }
}

impl DeployConfig {
    /// Default config file path for this platform
    pub fn default_path() -> PathBuf {
        if let Some(dirs) = directories::ProjectDirs::from("com", "remote-deploy", "remote-deploy") {
            dirs.config_dir().join("config.json")
        } else {
            PathBuf::from("remote-deploy.json")
        }
    }

    /// Load config from a file path
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;
        let config: Self =
            serde_json::from_str(&data).with_context(|| "failed to parse config JSON")?;
        Ok(config)
    }

    /// Save config to a file path
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create config dir {}", parent.display()))?;
        }
        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(path, data)
            .with_context(|| format!("failed to write config to {}", path.display()))?;
        Ok(())
    }

    pub fn restart_settle(&self) -> Duration {
        Duration::from_millis(self.restart_settle_ms)
    }

    pub fn pending_wait(&self) -> Duration {
        Duration::from_millis(self.pending_wait_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_take_defaults() {
        let config: DeployConfig = serde_json::from_str(r#"{"host":"ws-042"}"#).unwrap();
        assert_eq!(config.host.as_deref(), Some("ws-042"));
        assert_eq!(config.tool_name, "psexec.exe");
        assert_eq!(config.retry_times, 3);
        assert_eq!(config.pending_wait(), Duration::from_secs(5));
        assert_eq!(config.restart_settle(), Duration::from_secs(1));
        assert_eq!(config.post_start_check, PostStartCheck::Fresh);
        assert!(!config.verbose);
    }

    #[test]
    fn test_post_start_check_is_snake_case() {
        let config: DeployConfig =
            serde_json::from_str(r#"{"post_start_check":"stale"}"#).unwrap();
        assert_eq!(config.post_start_check, PostStartCheck::Stale);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = DeployConfig {
            host: Some("lab-pc".into()),
            tool_dir: Some(PathBuf::from(r"C:\tools")),
            retry_times: 5,
            ..DeployConfig::default()
        };
        config.save(&path).unwrap();

        let loaded = DeployConfig::load(&path).unwrap();
        assert_eq!(loaded.host.as_deref(), Some("lab-pc"));
        assert_eq!(loaded.tool_dir, Some(PathBuf::from(r"C:\tools")));
        assert_eq!(loaded.retry_times, 5);
        assert!(loaded.source_dir.is_none());
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(DeployConfig::load(&dir.path().join("absent.json")).is_err());
    }
}
