//! Waits for a scaled deployment to report enough available replicas.
//!
//! The wait is a small state machine: every poll reads the deployment once
//! and [`next_step`] decides whether the app is ready, whether to poll again
//! after `interval`, or whether the deadline has passed. Time comes from a
//! [`Clock`] so tests can run the loop without sleeping.
use super::app::App;
use super::cluster::Cluster;
use super::unidle_error::UnidleError;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(120);

#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    async fn sleep(&self, duration: Duration);
}

pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Replicas {
    pub desired: i32,
    pub available: i32,
}

impl Replicas {
    pub fn observe(deployment: &Deployment) -> Self {
        // The API server defaults an unset spec.replicas to 1.
        let desired = deployment
            .spec
            .as_ref()
            .and_then(|s| s.replicas)
            .unwrap_or(1);
        let available = deployment
            .status
            .as_ref()
            .and_then(|s| s.available_replicas)
            .unwrap_or(0);
        Replicas { desired, available }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStep {
    Ready,
    PollAgain,
    TimedOut,
}

pub fn next_step(observed: Replicas, elapsed: Duration, deadline: Duration) -> WaitStep {
    if observed.available >= observed.desired {
        WaitStep::Ready
    } else if elapsed >= deadline {
        WaitStep::TimedOut
    } else {
        WaitStep::PollAgain
    }
}

pub struct ReadinessWaiter<'a> {
    pub clock: &'a dyn Clock,
    pub interval: Duration,
    pub deadline: Duration,
}

impl ReadinessWaiter<'_> {
    /// Polls the deployment until it is ready. Never mutates anything.
    pub async fn wait_for_ready(
        &self,
        cluster: &dyn Cluster,
        app: &App,
        cancel: &CancellationToken,
    ) -> Result<(), UnidleError> {
        let started = self.clock.now();
        let mut polls = 0u32;
        loop {
            polls += 1;
            let deployment = cluster
                .get_workload(&app.namespace, &app.name)
                .await
                .map_err(UnidleError::mutation("read deployment status"))?
                .ok_or_else(|| {
                    UnidleError::NotFound(format!("Deployment {} disappeared", app.key()))
                })?;

            let observed = Replicas::observe(&deployment);
            let elapsed = self.clock.now().saturating_duration_since(started);
            match next_step(observed, elapsed, self.deadline) {
                WaitStep::Ready => {
                    log::info!(
                        "Deployment {} ready ({}/{}) after {} polls",
                        app.key(),
                        observed.available,
                        observed.desired,
                        polls
                    );
                    return Ok(());
                }
                WaitStep::TimedOut => {
                    return Err(UnidleError::Timeout { waited: elapsed });
                }
                WaitStep::PollAgain => {
                    log::debug!(
                        "Deployment {} not ready ({}/{})",
                        app.key(),
                        observed.available,
                        observed.desired
                    );
                }
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(UnidleError::Cancelled),
                _ = self.clock.sleep(self.interval) => {}
            }
        }
    }
}
