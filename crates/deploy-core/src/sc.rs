//! Service control through `sc.exe \\host <verb> <service>`, for machines where
//! opening the remote SCM directly is not an option.

use anyhow::{Context, Result};
use thiserror::Error;
use tracing::{debug, info};

use deploy_platform::command::{CommandExecutor, CommandResult};
use deploy_platform::service::{ServiceControl, ServiceState, ServiceStateError};

/// `ERROR_SERVICE_NOT_ACTIVE`: sc.exe's exit code when stopping a stopped service
const SERVICE_NOT_ACTIVE: i32 = 1062;

#[derive(Debug, Error)]
pub enum ScQueryError {
    #[error("no STATE line in sc.exe output")]
    MissingState,
    #[error("invalid state value in sc.exe output: {0:?}")]
    InvalidCode(String),
    #[error(transparent)]
    State(#[from] ServiceStateError),
}

/// Extract the state from `sc query` output (`STATE : 4  RUNNING`).
pub fn parse_sc_state(output: &str) -> Result<ServiceState, ScQueryError> {
    let line = output
        .lines()
        .map(str::trim)
        .find(|l| l.starts_with("STATE"))
        .ok_or(ScQueryError::MissingState)?;

    let value = line
        .split_once(':')
        .map(|(_, v)| v.trim())
        .ok_or(ScQueryError::MissingState)?;
    let code = value.split_whitespace().next().unwrap_or_default();
    let code: u32 = code
        .parse()
        .map_err(|_| ScQueryError::InvalidCode(value.to_string()))?;

    Ok(ServiceState::try_from(code)?)
}

pub struct ScServiceControl {
    host: String,
    executor: Box<dyn CommandExecutor>,
}

impl ScServiceControl {
    pub fn new(host: impl Into<String>, executor: Box<dyn CommandExecutor>) -> Self {
        Self {
            host: host.into(),
            executor,
        }
    }

    fn sc(&self, verb: &str, service: &str) -> Result<CommandResult> {
        let argv = vec![
            "sc.exe".to_string(),
            format!(r"\\{}", self.host),
            verb.to_string(),
            service.to_string(),
        ];
        self.executor
            .execute(&argv)
            .with_context(|| format!("failed to run sc.exe {}", verb))
    }
}

// sc.exe reports its errors on stdout
fn failure_text(result: &CommandResult) -> String {
    let out = result.stdout.as_deref().unwrap_or_default().trim();
    if out.is_empty() {
        result.stderr.as_deref().unwrap_or_default().trim().to_string()
    } else {
        out.to_string()
    }
}

impl ServiceControl for ScServiceControl {
    fn host(&self) -> &str {
        &self.host
    }

    fn query(&self, service: &str) -> Result<ServiceState> {
        let result = self.sc("query", service)?;
        if !result.success() {
            anyhow::bail!(
                "sc.exe query {} on {} failed ({}): {}",
                service,
                self.host,
                result.code,
                failure_text(&result)
            );
        }
        let state = parse_sc_state(result.stdout.as_deref().unwrap_or_default())
            .with_context(|| format!("failed to read state of {} on {}", service, self.host))?;
        debug!("service {} on {} is {}", service, self.host, state);
        Ok(state)
    }

    fn start(&self, service: &str) -> Result<()> {
        info!("starting service {} on {}", service, self.host);
        let result = self.sc("start", service)?;
        if !result.success() {
            anyhow::bail!(
                "sc.exe start {} on {} failed ({}): {}",
                service,
                self.host,
                result.code,
                failure_text(&result)
            );
        }
        Ok(())
    }

    fn stop(&self, service: &str) -> Result<()> {
        info!("stopping service {} on {}", service, self.host);
        let result = self.sc("stop", service)?;
        // Not an error if already stopped
        if !result.success() && result.code != SERVICE_NOT_ACTIVE {
            anyhow::bail!(
                "sc.exe stop {} on {} failed ({}): {}",
                service,
                self.host,
                result.code,
                failure_text(&result)
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::config::DeployConfig;
    use crate::reconciler::{ReconcilePolicy, ServiceReconciler};
    use crate::status;
    use crate::testing::RecordingExecutor;

    const QUERY_RUNNING: &str = "
SERVICE_NAME: Spooler
        TYPE               : 110  WIN32_OWN_PROCESS  (interactive)
        STATE              : 4  RUNNING
                                (STOPPABLE, NOT_PAUSABLE, IGNORES_SHUTDOWN)
        WIN32_EXIT_CODE    : 0  (0x0)
        SERVICE_EXIT_CODE  : 0  (0x0)
        CHECKPOINT         : 0x0
        WAIT_HINT          : 0x0
";

    fn output(code: i32, stdout: &str) -> CommandResult {
        CommandResult {
            code,
            stdout: Some(stdout.to_string()),
            stderr: Some(String::new()),
        }
    }

    #[test]
    fn test_parse_running() {
        assert_eq!(parse_sc_state(QUERY_RUNNING).unwrap(), ServiceState::Running);
    }

    #[test]
    fn test_parse_start_pending() {
        let text = "SERVICE_NAME: x\n        STATE              : 2  START_PENDING\n";
        assert_eq!(parse_sc_state(text).unwrap(), ServiceState::StartPending);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            parse_sc_state("[SC] OpenService FAILED 1060"),
            Err(ScQueryError::MissingState)
        ));
        assert!(matches!(
            parse_sc_state("STATE : X RUNNING"),
            Err(ScQueryError::InvalidCode(_))
        ));
        assert!(matches!(
            parse_sc_state("STATE : 9 WEIRD"),
            Err(ScQueryError::State(_))
        ));
    }

    #[test]
    fn test_query_builds_host_qualified_command() {
        let exec = RecordingExecutor::with_responses(vec![output(0, QUERY_RUNNING)]);
        let control = ScServiceControl::new("ws-042", Box::new(exec.clone()));

        assert_eq!(control.query("Spooler").unwrap(), ServiceState::Running);
        assert_eq!(
            exec.calls(),
            vec![vec!["sc.exe", r"\\ws-042", "query", "Spooler"]]
        );
    }

    #[test]
    fn test_query_failure_is_an_error() {
        let exec = RecordingExecutor::with_responses(vec![output(
            1060,
            "[SC] EnumQueryServicesStatus:OpenService FAILED 1060",
        )]);
        let control = ScServiceControl::new("ws-042", Box::new(exec));
        let err = control.query("Nope").unwrap_err();
        assert!(format!("{:#}", err).contains("1060"));
    }

    #[derive(Clone, Default)]
    struct LogBuf(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_reconciled_start_logs_control_call_once() {
        let exec = RecordingExecutor::with_responses(vec![
            output(0, "SERVICE_NAME: Spooler\n        STATE              : 1  STOPPED\n"),
            output(0, ""),
            output(0, QUERY_RUNNING),
        ]);
        let control = ScServiceControl::new("ws-042", Box::new(exec.clone()));
        let policy = ReconcilePolicy::from(&DeployConfig::default());
        let reconciler = ServiceReconciler::new(Box::new(control), policy).with_sleeper(|_| {});

        let logs = LogBuf::default();
        let sink = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || sink.clone())
            .finish();
        let code =
            tracing::subscriber::with_default(subscriber, || reconciler.start("Spooler", false))
                .unwrap();

        assert_eq!(code, status::SUCCESS);
        assert_eq!(exec.calls().len(), 3);
        let text = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert_eq!(text.matches("starting service Spooler on ws-042").count(), 1);
    }

    #[test]
    fn test_stop_tolerates_not_active() {
        let exec = RecordingExecutor::with_responses(vec![output(SERVICE_NOT_ACTIVE, "")]);
        let control = ScServiceControl::new("ws-042", Box::new(exec));
        assert!(control.stop("Spooler").is_ok());
    }

    #[test]
    fn test_start_failure_is_an_error() {
        let exec = RecordingExecutor::with_responses(vec![output(5, "Access is denied.")]);
        let control = ScServiceControl::new("ws-042", Box::new(exec));
        assert!(control.start("Spooler").is_err());
    }
}
