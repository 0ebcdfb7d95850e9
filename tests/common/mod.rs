//! In-memory stand-ins for the storage backend, shared by the integration
//! tests. They mirror the backend contracts: the log is a per-channel map
//! of name-sorted immutable entries, pub/sub is a topic fan-out that can be
//! disabled or killed, and the content store assigns content-derived ids.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use channel_feed_service::config::{Config, FeedTiming};
use channel_feed_service::error::AppError;
use channel_feed_service::feed::{
    entry_name, ChannelLog, ContentStore, FeedPubSub, PostStore, StoredContent,
};
use channel_feed_service::models::post::Post;
use channel_feed_service::state::AppState;
use futures::stream::BoxStream;
use futures_util::StreamExt;
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::{self, unbounded_channel, UnboundedSender};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;

pub fn make_post(cid: &str, channel: &str, timestamp: i64, content: &str) -> Post {
    Post {
        author: "alice".into(),
        channel: channel.into(),
        content: content.into(),
        timestamp,
        cid: cid.into(),
        attachment_id: None,
    }
}

pub fn test_timing(poll_ms: u64, heartbeat_ms: u64, session_ms: u64) -> FeedTiming {
    FeedTiming {
        poll_interval: Duration::from_millis(poll_ms),
        heartbeat_interval: Duration::from_millis(heartbeat_ms),
        session_max: Duration::from_millis(session_ms),
        reconnect_retry_ms: 250,
    }
}

pub fn test_config() -> Config {
    Config {
        port: 0,
        ipfs_api_url: "http://127.0.0.1:5001".into(),
        ipfs_gateway_url: "http://127.0.0.1:8080".into(),
        feed_root: "/feeds".into(),
        channel_cap: 200,
        max_upload_bytes: 1024,
        timing: test_timing(10, 5_000, 500),
    }
}

pub fn test_state(
    log: Arc<MemoryLog>,
    pubsub: Arc<MemoryPubSub>,
    content: Arc<MemoryContent>,
) -> AppState {
    AppState {
        config: Arc::new(test_config()),
        store: PostStore::new(200),
        log,
        pubsub,
        content,
    }
}

// ---------------------------------------------------------------------------
// Durable log fake

#[derive(Default)]
pub struct MemoryLog {
    entries: Mutex<HashMap<String, BTreeMap<String, Vec<u8>>>>,
    unreachable: AtomicBool,
}

impl MemoryLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_unreachable(&self, down: bool) {
        self.unreachable.store(down, Ordering::SeqCst);
    }

    /// Writes an entry with arbitrary (possibly corrupt) bytes under the
    /// name the given post would get.
    pub fn append_raw(&self, channel: &str, post: &Post, body: Vec<u8>) {
        self.entries
            .lock()
            .unwrap()
            .entry(channel.to_string())
            .or_default()
            .insert(entry_name(post), body);
    }

    fn check_reachable(&self) -> Result<(), AppError> {
        if self.unreachable.load(Ordering::SeqCst) {
            Err(AppError::BackendUnreachable("memory log offline".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ChannelLog for MemoryLog {
    async fn append(&self, channel: &str, post: &Post) -> Result<(), AppError> {
        self.check_reachable()?;
        let body = post.to_json()?.into_bytes();
        self.entries
            .lock()
            .unwrap()
            .entry(channel.to_string())
            .or_default()
            .insert(entry_name(post), body);
        Ok(())
    }

    async fn list(&self, channel: &str) -> Result<Vec<String>, AppError> {
        self.check_reachable()?;
        Ok(self
            .entries
            .lock()
            .unwrap()
            .get(channel)
            .map(|dir| dir.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn read(&self, channel: &str, entry: &str) -> Result<Vec<u8>, AppError> {
        self.check_reachable()?;
        self.entries
            .lock()
            .unwrap()
            .get(channel)
            .and_then(|dir| dir.get(entry).cloned())
            .ok_or(AppError::NotFound)
    }
}

// ---------------------------------------------------------------------------
// Pub/sub fake

pub struct MemoryPubSub {
    enabled: bool,
    subscribers: Mutex<HashMap<String, Vec<UnboundedSender<Vec<u8>>>>>,
}

impl MemoryPubSub {
    pub fn new(enabled: bool) -> Arc<Self> {
        Arc::new(Self {
            enabled,
            subscribers: Mutex::new(HashMap::new()),
        })
    }

    /// Simulates the backend dropping every open subscription connection.
    pub fn kill_subscribers(&self, channel: &str) {
        self.subscribers.lock().unwrap().remove(channel);
    }

    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.subscribers
            .lock()
            .unwrap()
            .get(channel)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl FeedPubSub for MemoryPubSub {
    async fn publish(&self, channel: &str, payload: &[u8]) -> Result<(), AppError> {
        if !self.enabled {
            return Err(AppError::BackendUnreachable("pubsub disabled".into()));
        }
        if let Some(subs) = self.subscribers.lock().unwrap().get_mut(channel) {
            subs.retain(|tx| tx.send(payload.to_vec()).is_ok());
        }
        Ok(())
    }

    async fn subscribe(
        &self,
        channel: &str,
        cancel: CancellationToken,
    ) -> Result<BoxStream<'static, Vec<u8>>, AppError> {
        if !self.enabled {
            return Err(AppError::BackendUnreachable("pubsub disabled".into()));
        }
        let (tx, mut feed_rx) = unbounded_channel();
        self.subscribers
            .lock()
            .unwrap()
            .entry(channel.to_string())
            .or_default()
            .push(tx);

        // Forwarder mimics the real adapter: the stream ends on cancellation
        // or when the backend side (the sender above) goes away.
        let (out_tx, out_rx) = unbounded_channel();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    msg = feed_rx.recv() => match msg {
                        Some(payload) => {
                            if out_tx.send(payload).is_err() {
                                break;
                            }
                        }
                        None => break,
                    },
                }
            }
        });
        Ok(UnboundedReceiverStream::new(out_rx).boxed())
    }
}

// ---------------------------------------------------------------------------
// Content store fake

#[derive(Default)]
pub struct MemoryContent {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryContent {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn blob_count(&self) -> usize {
        self.blobs.lock().unwrap().len()
    }
}

#[async_trait]
impl ContentStore for MemoryContent {
    async fn upload(&self, _filename: &str, data: Vec<u8>) -> Result<StoredContent, AppError> {
        // Content-derived id: identical bytes yield the same cid.
        let mut hasher = DefaultHasher::new();
        data.hash(&mut hasher);
        let cid = format!("bafk{:016x}", hasher.finish());
        let size = data.len().to_string();
        self.blobs.lock().unwrap().insert(cid.clone(), data);
        Ok(StoredContent { cid, size })
    }

    async fn fetch(&self, cid: &str) -> Result<(Bytes, Option<String>), AppError> {
        self.blobs
            .lock()
            .unwrap()
            .get(cid)
            .map(|b| (Bytes::from(b.clone()), None))
            .ok_or(AppError::NotFound)
    }
}

// ---------------------------------------------------------------------------
// SSE stream helpers

#[derive(Debug, PartialEq)]
pub enum Frame {
    Data(Post),
    KeepAlive,
    Retry(u64),
}

/// Drains the session output for `window`, returning parsed SSE frames and
/// whether the stream closed within the window.
pub async fn collect_frames(
    rx: &mut mpsc::Receiver<channel_feed_service::feed::session::SseFrame>,
    window: Duration,
) -> (Vec<Frame>, bool) {
    let mut raw = String::new();
    let mut closed = false;
    let deadline = tokio::time::Instant::now() + window;
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            break;
        }
        match tokio::time::timeout(remaining, rx.recv()).await {
            Ok(Some(Ok(bytes))) => raw.push_str(std::str::from_utf8(&bytes).unwrap()),
            Ok(Some(Err(_))) | Ok(None) => {
                closed = true;
                break;
            }
            Err(_) => break,
        }
    }
    (parse_frames(&raw), closed)
}

pub fn parse_frames(raw: &str) -> Vec<Frame> {
    raw.split("\n\n")
        .filter(|chunk| !chunk.is_empty())
        .map(|chunk| {
            if let Some(json) = chunk.strip_prefix("data: ") {
                Frame::Data(Post::from_json(json.as_bytes()).unwrap())
            } else if let Some(ms) = chunk.strip_prefix("retry: ") {
                Frame::Retry(ms.parse().unwrap())
            } else if chunk.starts_with(':') {
                Frame::KeepAlive
            } else {
                panic!("unrecognized SSE frame: {chunk:?}");
            }
        })
        .collect()
}

pub fn data_cids(frames: &[Frame]) -> Vec<String> {
    frames
        .iter()
        .filter_map(|f| match f {
            Frame::Data(p) => Some(p.cid.clone()),
            _ => None,
        })
        .collect()
}

pub fn retry_count(frames: &[Frame]) -> usize {
    frames
        .iter()
        .filter(|f| matches!(f, Frame::Retry(_)))
        .count()
}
