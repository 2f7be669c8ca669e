//! Test doubles for the platform traits. Each fake shares its call log through
//! an `Arc` so a test can keep a handle after boxing the fake.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Result;

use deploy_platform::command::{CommandExecutor, CommandResult};
use deploy_platform::service::{ServiceControl, ServiceState};
use deploy_platform::shortcut::ShortcutWriter;

/// Records every argv and answers with queued results (exit 0 once drained).
#[derive(Clone, Default)]
pub struct RecordingExecutor {
    pub calls: Arc<Mutex<Vec<Vec<String>>>>,
    responses: Arc<Mutex<VecDeque<CommandResult>>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_responses(responses: Vec<CommandResult>) -> Self {
        Self {
            calls: Arc::default(),
            responses: Arc::new(Mutex::new(responses.into())),
        }
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

impl CommandExecutor for RecordingExecutor {
    fn execute(&self, argv: &[String]) -> Result<CommandResult> {
        self.calls.lock().unwrap().push(argv.to_vec());
        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCall {
    Query,
    Start,
    Stop,
}

/// Serves service states in order; the last state repeats forever.
#[derive(Clone)]
pub struct ScriptedServiceControl {
    pub calls: Arc<Mutex<Vec<ControlCall>>>,
    states: Arc<Mutex<VecDeque<ServiceState>>>,
    fail_queries: bool,
}

impl ScriptedServiceControl {
    pub fn new(states: &[ServiceState]) -> Self {
        assert!(!states.is_empty(), "script needs at least one state");
        Self {
            calls: Arc::default(),
            states: Arc::new(Mutex::new(states.iter().copied().collect())),
            fail_queries: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_queries: true,
            ..Self::new(&[ServiceState::Stopped])
        }
    }

    pub fn calls(&self) -> Vec<ControlCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, kind: ControlCall) -> usize {
        self.calls().into_iter().filter(|c| *c == kind).count()
    }
}

impl ServiceControl for ScriptedServiceControl {
    fn host(&self) -> &str {
        "test-host"
    }

    fn query(&self, _service: &str) -> Result<ServiceState> {
        self.calls.lock().unwrap().push(ControlCall::Query);
        if self.fail_queries {
            anyhow::bail!("RPC server is unavailable");
        }
        let mut states = self.states.lock().unwrap();
        if states.len() > 1 {
            Ok(states.pop_front().unwrap())
        } else {
            Ok(*states.front().unwrap())
        }
    }

    fn start(&self, _service: &str) -> Result<()> {
        self.calls.lock().unwrap().push(ControlCall::Start);
        Ok(())
    }

    fn stop(&self, _service: &str) -> Result<()> {
        self.calls.lock().unwrap().push(ControlCall::Stop);
        Ok(())
    }
}

/// Writes a small marker file instead of a real shell link.
#[derive(Clone, Default)]
pub struct RecordingShortcuts {
    pub created: Arc<Mutex<Vec<(PathBuf, PathBuf)>>>,
    pub fail: bool,
}

impl ShortcutWriter for RecordingShortcuts {
    fn create(&self, link_path: &Path, target: &Path) -> Result<()> {
        if self.fail {
            anyhow::bail!("COM is not available");
        }
        std::fs::write(link_path, target.to_string_lossy().as_bytes())?;
        self.created
            .lock()
            .unwrap()
            .push((link_path.to_path_buf(), target.to_path_buf()));
        Ok(())
    }
}
