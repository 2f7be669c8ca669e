//! Remote Service Control Manager (SCM) access: query/start/stop a service on another host.

use anyhow::Result;
#[cfg(target_os = "windows")]
use anyhow::Context;
#[cfg(target_os = "windows")]
use tracing::{debug, info};

use deploy_platform::service::{ServiceControl, ServiceState};

#[cfg(target_os = "windows")]
use windows_service::{
    service::{Service, ServiceAccess},
    service_manager::{ServiceManager, ServiceManagerAccess},
};

pub struct ScmServiceControl {
    /// Remote machine name, without the leading `\\`
    host: String,
}

impl ScmServiceControl {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }
}

#[cfg(target_os = "windows")]
impl ScmServiceControl {
    fn open(&self, service: &str, access: ServiceAccess) -> Result<Service> {
        let manager = ServiceManager::remote_computer(
            &self.host,
            None::<&str>,
            ServiceManagerAccess::CONNECT,
        )
        .with_context(|| format!("failed to connect to the service manager on {}", self.host))?;

        manager
            .open_service(service, access)
            .with_context(|| format!("failed to open service {} on {}", service, self.host))
    }
}

#[cfg(target_os = "windows")]
fn map_state(state: windows_service::service::ServiceState) -> ServiceState {
    use windows_service::service::ServiceState as Scm;

    match state {
        Scm::Stopped => ServiceState::Stopped,
        Scm::StartPending => ServiceState::StartPending,
        Scm::StopPending => ServiceState::StopPending,
        Scm::Running => ServiceState::Running,
        Scm::ContinuePending => ServiceState::ContinuePending,
        Scm::PausePending => ServiceState::PausePending,
        Scm::Paused => ServiceState::Paused,
    }
}

#[cfg(target_os = "windows")]
impl ServiceControl for ScmServiceControl {
    fn host(&self) -> &str {
        &self.host
    }

    fn query(&self, service: &str) -> Result<ServiceState> {
        let status = self
            .open(service, ServiceAccess::QUERY_STATUS)?
            .query_status()
            .with_context(|| format!("failed to query service {} on {}", service, self.host))?;
        let state = map_state(status.current_state);
        debug!("service {} on {} is {}", service, self.host, state);
        Ok(state)
    }

    fn start(&self, service: &str) -> Result<()> {
        info!("starting service {} on {}", service, self.host);
        self.open(service, ServiceAccess::START)?
            .start::<&str>(&[])
            .with_context(|| format!("failed to start service {} on {}", service, self.host))
    }

    fn stop(&self, service: &str) -> Result<()> {
        info!("stopping service {} on {}", service, self.host);
        self.open(service, ServiceAccess::STOP)?
            .stop()
            .with_context(|| format!("failed to stop service {} on {}", service, self.host))?;
        Ok(())
    }
}

#[cfg(not(target_os = "windows"))]
impl ServiceControl for ScmServiceControl {
    fn host(&self) -> &str {
        &self.host
    }

    fn query(&self, _service: &str) -> Result<ServiceState> {
        anyhow::bail!("the SCM backend is only supported on Windows (use --backend sc)");
    }

    fn start(&self, _service: &str) -> Result<()> {
        anyhow::bail!("the SCM backend is only supported on Windows (use --backend sc)");
    }

    fn stop(&self, _service: &str) -> Result<()> {
        anyhow::bail!("the SCM backend is only supported on Windows (use --backend sc)");
    }
}
