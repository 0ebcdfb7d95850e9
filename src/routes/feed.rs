use crate::{feed::FeedSession, state::AppState};
use actix_web::{get, web, HttpResponse};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

#[derive(Debug, Deserialize)]
pub struct FeedParams {
    pub channel: Option<String>,
}

/// GET /api/v1/feed?channel=…
///
/// Long-lived SSE stream of new posts for a channel. The session task owns
/// all delivery; dropping the response body (client disconnect) closes the
/// channel and the task tears itself down.
#[get("/api/v1/feed")]
pub async fn feed_stream(
    state: web::Data<AppState>,
    query: web::Query<FeedParams>,
) -> HttpResponse {
    let channel = query
        .into_inner()
        .channel
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| "general".to_string());

    let (tx, rx) = mpsc::channel(32);
    let session = FeedSession::new(
        channel,
        state.store.clone(),
        state.log.clone(),
        state.pubsub.clone(),
        state.config.timing.clone(),
    );
    tokio::spawn(session.run(tx));

    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache, no-transform"))
        .insert_header(("X-Accel-Buffering", "no"))
        .streaming(ReceiverStream::new(rx))
}
