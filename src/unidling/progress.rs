//! Progress reporting for a running unidle.
use super::unidle_error::UnidleError;
use actix_web::web::Bytes;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

pub const SUCCESS_DATA: &str = "Ready";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Message(String),
    Error(String),
    Success,
}

impl ProgressEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ProgressEvent::Message(_) => "message",
            ProgressEvent::Error(_) => "error",
            ProgressEvent::Success => "success",
        }
    }

    pub fn data(&self) -> &str {
        match self {
            ProgressEvent::Message(text) | ProgressEvent::Error(text) => text.as_str(),
            ProgressEvent::Success => SUCCESS_DATA,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProgressEvent::Message(_))
    }

    /// Server-sent event framing: `event: <name>\ndata: <text>\n\n`.
    pub fn to_sse(&self) -> String {
        let mut out = format!("event: {}\n", self.name());
        for line in self.data().lines() {
            out.push_str("data: ");
            out.push_str(line);
            out.push('\n');
        }
        if self.data().is_empty() {
            out.push_str("data: \n");
        }
        out.push('\n');
        out
    }
}

/// Where the orchestrator reports progress.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn send(&self, event: ProgressEvent);

    async fn message(&self, text: &str) {
        self.send(ProgressEvent::Message(text.to_string())).await
    }

    async fn error(&self, err: &UnidleError) {
        self.send(ProgressEvent::Error(err.to_string())).await
    }

    async fn success(&self) {
        self.send(ProgressEvent::Success).await
    }
}

/// Sink feeding an HTTP response body. Events after the first terminal
/// event are dropped.
pub struct ChannelSink {
    tx: mpsc::Sender<Bytes>,
    finished: AtomicBool,
}

pub fn channel(buffer: usize) -> (ChannelSink, mpsc::Receiver<Bytes>) {
    let (tx, rx) = mpsc::channel(buffer);
    (
        ChannelSink {
            tx,
            finished: AtomicBool::new(false),
        },
        rx,
    )
}

impl ChannelSink {
    /// Resolves once the receiving side (the client connection) is gone.
    pub fn closed(&self) -> impl std::future::Future<Output = ()> + Send + 'static {
        let tx = self.tx.clone();
        async move { tx.closed().await }
    }
}

#[async_trait]
impl ProgressSink for ChannelSink {
    async fn send(&self, event: ProgressEvent) {
        if self.finished.load(Ordering::SeqCst) {
            log::warn!("Dropping {} event after stream end", event.name());
            return;
        }
        if event.is_terminal() {
            self.finished.store(true, Ordering::SeqCst);
        }
        if self.tx.send(Bytes::from(event.to_sse())).await.is_err() {
            log::debug!("Client went away, {} event not delivered", event.name());
        }
    }
}
