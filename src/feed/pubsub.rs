//! Low-latency broadcast path over the backend's pub/sub topics.
//!
//! Pub/sub is an optional backend feature and is best-effort end to end:
//! publish failures must never fail ingestion, and a subscribe failure just
//! moves the session down the fallback chain.

use crate::error::AppError;
use crate::ipfs::IpfsClient;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures_util::StreamExt;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;

pub fn topic_for_channel(channel: &str) -> String {
    format!("feed:{channel}")
}

#[async_trait]
pub trait FeedPubSub: Send + Sync {
    /// Fire-and-forget broadcast of a raw post payload.
    async fn publish(&self, channel: &str, payload: &[u8]) -> Result<(), AppError>;

    /// Opens an infinite, non-restartable stream of raw payloads for a
    /// channel. The stream ends when the token is cancelled or the
    /// underlying connection fails; a synchronous error means pub/sub is
    /// unavailable and the caller should fall back.
    async fn subscribe(
        &self,
        channel: &str,
        cancel: CancellationToken,
    ) -> Result<BoxStream<'static, Vec<u8>>, AppError>;
}

pub struct IpfsFeedPubSub {
    ipfs: IpfsClient,
}

impl IpfsFeedPubSub {
    pub fn new(ipfs: IpfsClient) -> Self {
        Self { ipfs }
    }
}

#[async_trait]
impl FeedPubSub for IpfsFeedPubSub {
    async fn publish(&self, channel: &str, payload: &[u8]) -> Result<(), AppError> {
        self.ipfs
            .pubsub_pub(&topic_for_channel(channel), payload.to_vec())
            .await
            .map_err(|e| AppError::BackendUnreachable(e.to_string()))
    }

    async fn subscribe(
        &self,
        channel: &str,
        cancel: CancellationToken,
    ) -> Result<BoxStream<'static, Vec<u8>>, AppError> {
        let rx = self
            .ipfs
            .pubsub_sub(&topic_for_channel(channel), cancel)
            .await
            .map_err(|e| AppError::BackendUnreachable(e.to_string()))?;
        Ok(UnboundedReceiverStream::new(rx).boxed())
    }
}
