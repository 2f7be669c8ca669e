use std::fmt;

use anyhow::Result;
use thiserror::Error;

/// Service status as reported by the Windows Service Control Manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Stopped,
    StartPending,
    StopPending,
    Running,
    ContinuePending,
    PausePending,
    Paused,
}

#[derive(Debug, Error)]
pub enum ServiceStateError {
    #[error("unknown service state code: {0}")]
    UnknownCode(u32),
}

impl ServiceState {
    /// Raw SCM status code (`SERVICE_STOPPED` = 1 ... `SERVICE_PAUSED` = 7).
    pub fn code(self) -> u32 {
        match self {
            ServiceState::Stopped => 1,
            ServiceState::StartPending => 2,
            ServiceState::StopPending => 3,
            ServiceState::Running => 4,
            ServiceState::ContinuePending => 5,
            ServiceState::PausePending => 6,
            ServiceState::Paused => 7,
        }
    }

    /// True for the two states a start/stop request is expected to pass through.
    pub fn is_start_stop_pending(self) -> bool {
        matches!(self, ServiceState::StartPending | ServiceState::StopPending)
    }
}

impl TryFrom<u32> for ServiceState {
    type Error = ServiceStateError;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(ServiceState::Stopped),
            2 => Ok(ServiceState::StartPending),
            3 => Ok(ServiceState::StopPending),
            4 => Ok(ServiceState::Running),
            5 => Ok(ServiceState::ContinuePending),
            6 => Ok(ServiceState::PausePending),
            7 => Ok(ServiceState::Paused),
            other => Err(ServiceStateError::UnknownCode(other)),
        }
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServiceState::Stopped => "STOPPED",
            ServiceState::StartPending => "START_PENDING",
            ServiceState::StopPending => "STOP_PENDING",
            ServiceState::Running => "RUNNING",
            ServiceState::ContinuePending => "CONTINUE_PENDING",
            ServiceState::PausePending => "PAUSE_PENDING",
            ServiceState::Paused => "PAUSED",
        };
        f.write_str(name)
    }
}

/// Query and change the state of services on one remote host.
pub trait ServiceControl: Send + Sync {
    /// Host every call is addressed to
    fn host(&self) -> &str;

    /// Read the current state of a service
    fn query(&self, service: &str) -> Result<ServiceState>;

    /// Ask the SCM to start a service (does not wait for it to come up)
    fn start(&self, service: &str) -> Result<()>;

    /// Ask the SCM to stop a service (does not wait for it to go down)
    fn stop(&self, service: &str) -> Result<()>;
}
