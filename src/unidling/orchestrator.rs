use super::app::App;
use super::cluster::Cluster;
use super::metadata::remove_idled_metadata;
use super::progress::ProgressSink;
use super::readiness::{Clock, ReadinessWaiter, DEFAULT_POLL_INTERVAL, DEFAULT_READY_TIMEOUT};
use super::redirector::redirect_service;
use super::scaler::{set_replicas, DEFAULT_REPLICAS};
use super::single_flight::SingleFlight;
use super::unidle_error::UnidleError;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_UNIDLE_KEY_LABEL: &str = "host";

#[derive(Debug, Clone)]
pub struct UnidleSettings {
    pub unidle_key_label: String,
    pub replicas: i32,
    pub poll_interval: Duration,
    pub ready_timeout: Duration,
}

impl Default for UnidleSettings {
    fn default() -> Self {
        Self {
            unidle_key_label: DEFAULT_UNIDLE_KEY_LABEL.to_string(),
            replicas: DEFAULT_REPLICAS,
            poll_interval: DEFAULT_POLL_INTERVAL,
            ready_timeout: DEFAULT_READY_TIMEOUT,
        }
    }
}

/// Where a single unidle got to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnidleState {
    Started,
    Located,
    Scaled,
    Ready,
    Cleaned,
    Redirected,
    Done,
    Failed,
}

/// Everything an unidle needs, built once at startup and shared by all
/// requests.
pub struct Unidler {
    cluster: Arc<dyn Cluster>,
    clock: Arc<dyn Clock>,
    settings: UnidleSettings,
    flights: SingleFlight,
}

impl Unidler {
    pub fn new(cluster: Arc<dyn Cluster>, clock: Arc<dyn Clock>, settings: UnidleSettings) -> Self {
        Self {
            cluster,
            clock,
            settings,
            flights: SingleFlight::new(),
        }
    }

    /// Unidles the app serving `host`, reporting each step to `sink`.
    ///
    /// Ends with exactly one terminal event: `success` once the service is
    /// redirected, or `error` with the first failure. Completed steps are not
    /// rolled back.
    pub async fn run(
        &self,
        host: &str,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> UnidleState {
        let mut state = UnidleState::Started;
        match self.unidle(host, sink, cancel, &mut state).await {
            Ok(()) => {
                transition(host, &mut state, UnidleState::Done);
                sink.success().await;
                state
            }
            Err(err) => {
                match err {
                    UnidleError::NotFound(_)
                    | UnidleError::Ambiguous { .. }
                    | UnidleError::MissingHost
                    | UnidleError::Cancelled => log::warn!(
                        "Unidling {} failed after {:?} [{}]: {}",
                        host,
                        state,
                        err.kind(),
                        err
                    ),
                    _ => log::error!(
                        "Unidling {} failed after {:?} [{}]: {}",
                        host,
                        state,
                        err.kind(),
                        err
                    ),
                }
                transition(host, &mut state, UnidleState::Failed);
                sink.error(&err).await;
                state
            }
        }
    }

    async fn unidle(
        &self,
        host: &str,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
        state: &mut UnidleState,
    ) -> Result<(), UnidleError> {
        if host.is_empty() {
            return Err(UnidleError::MissingHost);
        }
        let cluster = self.cluster.as_ref();

        let app = App::locate(cluster, &self.settings.unidle_key_label, host).await?;
        log::info!(
            "Host {} is routed by ingress {}",
            app.host,
            app.ingress.metadata.name.as_deref().unwrap_or_default()
        );
        transition(host, state, UnidleState::Located);

        let key = app.key();
        let _flight = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(UnidleError::Cancelled),
            flight = self.flights.acquire(&key) => flight,
        };
        sink.message(&format!("App {} found. Unidling it...", key)).await;

        ensure_live(cancel)?;
        set_replicas(cluster, &app, self.settings.replicas).await?;
        transition(host, state, UnidleState::Scaled);
        sink.message("Replicas restored. Starting app. This could take a few minutes...")
            .await;

        ensure_live(cancel)?;
        let waiter = ReadinessWaiter {
            clock: self.clock.as_ref(),
            interval: self.settings.poll_interval,
            deadline: self.settings.ready_timeout,
        };
        waiter.wait_for_ready(cluster, &app, cancel).await?;
        transition(host, state, UnidleState::Ready);
        sink.message("App ready. Removing idled metadata...").await;

        ensure_live(cancel)?;
        remove_idled_metadata(cluster, &app).await?;
        transition(host, state, UnidleState::Cleaned);
        sink.message("Redirecting app...").await;

        ensure_live(cancel)?;
        redirect_service(cluster, &app).await?;
        transition(host, state, UnidleState::Redirected);
        Ok(())
    }
}

fn ensure_live(cancel: &CancellationToken) -> Result<(), UnidleError> {
    if cancel.is_cancelled() {
        Err(UnidleError::Cancelled)
    } else {
        Ok(())
    }
}

fn transition(host: &str, state: &mut UnidleState, next: UnidleState) {
    log::info!("[Unidle] host={} {:?} => {:?}", host, state, next);
    *state = next;
}
