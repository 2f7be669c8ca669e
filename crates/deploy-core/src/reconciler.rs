//! Drives a remote service towards RUNNING or STOPPED with a bounded retry budget.
//!
//! Every attempt queries the service fresh. START_PENDING/STOP_PENDING after a
//! control command waits and retries without spending budget; any other
//! unexpected state spends one unit. A transitional state (anything but RUNNING
//! or STOPPED) spends budget unconditionally, so one extra attempt happens at a
//! budget of zero; an attempt entered below zero gives up with
//! [`status::RETRY_EXHAUSTED`].

use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info, warn};

use deploy_platform::service::{ServiceControl, ServiceState};

use crate::config::{DeployConfig, PostStartCheck};
use crate::status;

#[derive(Debug, Clone)]
pub struct ReconcilePolicy {
    pub retry_times: i32,
    pub restart_settle: Duration,
    pub pending_wait: Duration,
    pub post_start_check: PostStartCheck,
}

impl From<&DeployConfig> for ReconcilePolicy {
    fn from(config: &DeployConfig) -> Self {
        Self {
            retry_times: config.retry_times,
            restart_settle: config.restart_settle(),
            pending_wait: config.pending_wait(),
            post_start_check: config.post_start_check,
        }
    }
}

type Sleeper = Box<dyn Fn(Duration) + Send + Sync>;

pub struct ServiceReconciler {
    control: Box<dyn ServiceControl>,
    policy: ReconcilePolicy,
    sleep: Sleeper,
}

impl ServiceReconciler {
    pub fn new(control: Box<dyn ServiceControl>, policy: ReconcilePolicy) -> Self {
        Self {
            control,
            policy,
            sleep: Box::new(std::thread::sleep),
        }
    }

    /// Replace the blocking sleep used between polls.
    pub fn with_sleeper(mut self, sleep: impl Fn(Duration) + Send + Sync + 'static) -> Self {
        self.sleep = Box::new(sleep);
        self
    }

    pub fn query(&self, service: &str) -> Result<ServiceState> {
        self.control.query(service)
    }

    /// Start a service with the configured budget; `restart` stops it first if running.
    pub fn start(&self, service: &str, restart: bool) -> Result<i32> {
        self.start_with_budget(service, self.policy.retry_times, restart)
    }

    pub fn restart(&self, service: &str) -> Result<i32> {
        self.start(service, true)
    }

    pub fn stop(&self, service: &str) -> Result<i32> {
        self.stop_with_budget(service, self.policy.retry_times)
    }

    pub fn start_with_budget(&self, service: &str, retry_times: i32, restart: bool) -> Result<i32> {
        let host = self.control.host();
        let mut retries = retry_times;
        let mut restart = restart;

        loop {
            let state = self.control.query(service)?;
            debug!("{} on {}: {} ({} retries left)", service, host, state, retries);

            match state {
                ServiceState::Running if !restart => return Ok(status::SUCCESS),
                ServiceState::Running => {
                    info!("restarting service {} on {}", service, host);
                    let stopped = self.stop_with_budget(service, self.policy.retry_times)?;
                    if self.control.query(service)? != ServiceState::Stopped {
                        warn!(
                            "service {} on {} did not stop (code {}), not starting it again",
                            service, host, stopped
                        );
                        return Ok(status::RETRY_EXHAUSTED);
                    }
                    (self.sleep)(self.policy.restart_settle);
                    restart = false;
                }
                ServiceState::Stopped => {
                    self.control.start(service)?;

                    let observed = match self.policy.post_start_check {
                        PostStartCheck::Fresh => self.control.query(service)?,
                        PostStartCheck::Stale => state,
                    };

                    if observed == ServiceState::Running {
                        return Ok(status::SUCCESS);
                    } else if observed.is_start_stop_pending() {
                        (self.sleep)(self.policy.pending_wait);
                    } else if retries > 0 {
                        info!("retrying...");
                        retries -= 1;
                    } else {
                        warn!("service {} on {} did not start", service, host);
                        return Ok(status::RETRY_EXHAUSTED);
                    }
                }
                _ => {
                    if retries < 0 {
                        warn!("service {} on {} stuck in {}", service, host, state);
                        return Ok(status::RETRY_EXHAUSTED);
                    }
                    retries -= 1;
                }
            }
        }
    }

    pub fn stop_with_budget(&self, service: &str, retry_times: i32) -> Result<i32> {
        let host = self.control.host();
        let mut retries = retry_times;

        loop {
            let state = self.control.query(service)?;
            debug!("{} on {}: {} ({} retries left)", service, host, state, retries);

            match state {
                ServiceState::Running => {
                    self.control.stop(service)?;

                    let observed = self.control.query(service)?;
                    if observed == ServiceState::Stopped {
                        return Ok(status::SUCCESS);
                    } else if observed.is_start_stop_pending() {
                        (self.sleep)(self.policy.pending_wait);
                    } else if retries > 0 {
                        info!("retrying...");
                        retries -= 1;
                    } else {
                        warn!("service {} on {} did not stop", service, host);
                        return Ok(status::RETRY_EXHAUSTED);
                    }
                }
                ServiceState::Stopped => {
                    info!("service {} on {} stopped", service, host);
                    return Ok(status::SUCCESS);
                }
                _ => {
                    if retries < 0 {
                        warn!("service {} on {} stuck in {}", service, host, state);
                        return Ok(status::RETRY_EXHAUSTED);
                    }
                    retries -= 1;
                }
            }
        }
    }
}
