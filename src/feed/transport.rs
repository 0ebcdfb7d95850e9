//! Ordered transport fallback for live delivery.
//!
//! Pub/sub gives the lowest latency but is an optional backend feature;
//! polling the durable log works unconditionally at up to one poll interval
//! of latency. The local bus is not a variant here: it supplements whichever
//! primary path is active, so same-process writers reach same-process
//! readers immediately (the session's dedup set suppresses the echo).

use crate::feed::pubsub::FeedPubSub;
use futures::stream::BoxStream;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

pub enum ActiveTransport {
    PubSub(BoxStream<'static, Vec<u8>>),
    Polling(Interval),
}

pub fn polling_ticker(period: Duration) -> Interval {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Probes the fallback chain in order: a failed subscribe call selects
/// polling. The degradation is logged, never surfaced to the client.
pub async fn probe(
    pubsub: &Arc<dyn FeedPubSub>,
    channel: &str,
    cancel: CancellationToken,
    poll_period: Duration,
) -> ActiveTransport {
    match pubsub.subscribe(channel, cancel).await {
        Ok(stream) => {
            tracing::debug!(%channel, "pub/sub subscription active");
            ActiveTransport::PubSub(stream)
        }
        Err(e) => {
            tracing::warn!(%channel, error=%e, "pub/sub unavailable; falling back to log polling");
            ActiveTransport::Polling(polling_ticker(poll_period))
        }
    }
}
