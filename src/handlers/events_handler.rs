// Streams the progress of an unidle to the browser as server-sent events
use crate::unidling::orchestrator::Unidler;
use crate::unidling::progress;
use actix_web::{http::header, rt, web, HttpRequest, HttpResponse};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

const EVENT_BUFFER: usize = 16;

/// The app's host as the client asked for it, without any port.
pub fn request_host(req: &HttpRequest) -> String {
    let raw = req
        .headers()
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .or_else(|| req.uri().host())
        .unwrap_or_default()
        .trim();
    match raw.rsplit_once(':') {
        Some((host, port)) if !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()) => {
            host.to_string()
        }
        _ => raw.to_string(),
    }
}

pub async fn handle_events(req: HttpRequest, unidler: web::Data<Unidler>) -> HttpResponse {
    let host = request_host(&req);
    log::info!("Unidle requested for host '{}'", host);

    let (sink, rx) = progress::channel(EVENT_BUFFER);
    let cancel = CancellationToken::new();

    // A dropped response body means the client went away.
    let watcher = {
        let closed = sink.closed();
        let cancel = cancel.clone();
        let host = host.clone();
        rt::spawn(async move {
            closed.await;
            log::info!("Client for '{}' disconnected, cancelling unidle", host);
            cancel.cancel();
        })
    };

    rt::spawn(async move {
        unidler.run(&host, &sink, &cancel).await;
        watcher.abort();
        // dropping the sink ends the response
    });

    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .insert_header((header::CONNECTION, "keep-alive"))
        .streaming(ReceiverStream::new(rx).map(Ok::<_, actix_web::Error>))
}
