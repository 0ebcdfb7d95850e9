//! Per-client streaming session: turns the selected transport into an SSE
//! push stream with heartbeats, exactly-once delivery and a bounded
//! lifetime.

use crate::config::FeedTiming;
use crate::error::AppError;
use crate::feed::log::{cid_from_entry_name, ChannelLog};
use crate::feed::pubsub::FeedPubSub;
use crate::feed::store::PostStore;
use crate::feed::transport::{self, ActiveTransport};
use crate::models::post::Post;
use bytes::Bytes;
use futures_util::StreamExt;
use std::collections::HashSet;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc::Sender;
use tokio_util::sync::CancellationToken;

/// Frames pushed into the HTTP response body.
pub type SseFrame = Result<Bytes, Infallible>;

enum Step {
    Continue,
    /// Max session duration reached: close gracefully with a reconnect hint.
    Expired,
    /// The reader went away; nothing left to deliver to.
    ClientGone,
    /// The pub/sub stream ended without the session cancelling it.
    Degrade,
}

pub struct FeedSession {
    channel: String,
    store: PostStore,
    log: Arc<dyn ChannelLog>,
    pubsub: Arc<dyn FeedPubSub>,
    timing: FeedTiming,
}

impl FeedSession {
    pub fn new(
        channel: String,
        store: PostStore,
        log: Arc<dyn ChannelLog>,
        pubsub: Arc<dyn FeedPubSub>,
        timing: FeedTiming,
    ) -> Self {
        Self {
            channel,
            store,
            log,
            pubsub,
            timing,
        }
    }

    /// Drives the session until the client disconnects or the session
    /// duration expires. All delivery funnels through one sequential loop,
    /// so no two sources can interleave writes to the output stream.
    pub async fn run(self, tx: Sender<SseFrame>) {
        let cancel = CancellationToken::new();
        let (observer_id, mut local_rx) = self.store.subscribe(&self.channel);

        // The live stream must not repeat history the client already fetched:
        // everything currently in the log counts as delivered.
        let mut seen: HashSet<String> = HashSet::new();
        match self.log.list(&self.channel).await {
            Ok(names) => {
                for name in &names {
                    if let Some(cid) = cid_from_entry_name(name) {
                        seen.insert(cid.to_string());
                    }
                }
            }
            Err(e) => {
                tracing::warn!(channel=%self.channel, error=%e,
                    "log snapshot failed; stream may repeat fetched history");
            }
        }

        let mut transport = transport::probe(
            &self.pubsub,
            &self.channel,
            cancel.clone(),
            self.timing.poll_interval,
        )
        .await;

        let mut heartbeat = tokio::time::interval(self.timing.heartbeat_interval);
        heartbeat.tick().await; // the immediate first tick is not a heartbeat
        let deadline = tokio::time::sleep(self.timing.session_max);
        tokio::pin!(deadline);

        loop {
            let step = match &mut transport {
                ActiveTransport::PubSub(stream) => tokio::select! {
                    _ = tx.closed() => Step::ClientGone,
                    _ = &mut deadline => Step::Expired,
                    _ = heartbeat.tick() => self.emit_heartbeat(&tx).await,
                    local = local_rx.recv() => match local {
                        Some(post) => self.deliver(&tx, &mut seen, post).await,
                        None => Step::ClientGone,
                    },
                    msg = stream.next() => match msg {
                        Some(raw) => self.on_pubsub_payload(&tx, &mut seen, &raw).await,
                        None => Step::Degrade,
                    },
                },
                ActiveTransport::Polling(ticker) => tokio::select! {
                    _ = tx.closed() => Step::ClientGone,
                    _ = &mut deadline => Step::Expired,
                    _ = heartbeat.tick() => self.emit_heartbeat(&tx).await,
                    local = local_rx.recv() => match local {
                        Some(post) => self.deliver(&tx, &mut seen, post).await,
                        None => Step::ClientGone,
                    },
                    _ = ticker.tick() => self.poll_log(&tx, &mut seen).await,
                },
            };

            match step {
                Step::Continue => {}
                Step::Degrade => {
                    tracing::warn!(channel=%self.channel,
                        "pub/sub subscription ended; degrading to log polling");
                    transport =
                        ActiveTransport::Polling(transport::polling_ticker(self.timing.poll_interval));
                }
                Step::Expired => {
                    let frame = format!("retry: {}\n\n", self.timing.reconnect_retry_ms);
                    let _ = tx.send(Ok(Bytes::from(frame))).await;
                    break;
                }
                Step::ClientGone => break,
            }
        }

        // No leaked subscriptions or observers past this point.
        cancel.cancel();
        self.store.remove_observer(&self.channel, observer_id);
        tracing::debug!(channel=%self.channel, "feed session closed");
    }

    async fn emit_heartbeat(&self, tx: &Sender<SseFrame>) -> Step {
        if tx
            .send(Ok(Bytes::from_static(b": keep-alive\n\n")))
            .await
            .is_err()
        {
            Step::ClientGone
        } else {
            Step::Continue
        }
    }

    /// The exactly-once gate: every transport path funnels through here.
    /// First transport to claim a CID wins; no re-ordering afterwards.
    async fn deliver(&self, tx: &Sender<SseFrame>, seen: &mut HashSet<String>, post: Post) -> Step {
        if !seen.insert(post.cid.clone()) {
            return Step::Continue;
        }
        let json = match post.to_json() {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(channel=%self.channel, cid=%post.cid, error=%e,
                    "skipping unserializable post");
                return Step::Continue;
            }
        };
        if tx
            .send(Ok(Bytes::from(format!("data: {json}\n\n"))))
            .await
            .is_err()
        {
            Step::ClientGone
        } else {
            Step::Continue
        }
    }

    async fn on_pubsub_payload(
        &self,
        tx: &Sender<SseFrame>,
        seen: &mut HashSet<String>,
        raw: &[u8],
    ) -> Step {
        let post = match Post::from_json(raw) {
            Ok(post) if post.channel == self.channel => post,
            Ok(post) => {
                tracing::debug!(channel=%self.channel, got=%post.channel,
                    "ignoring pub/sub post for another channel");
                return Step::Continue;
            }
            Err(e) => {
                tracing::warn!(channel=%self.channel, error=%e,
                    "skipping unparseable pub/sub message");
                return Step::Continue;
            }
        };
        // Keep this instance's cache warm; the store dedups and the echo on
        // our own local receiver is suppressed by the session's seen set.
        self.store.add(post.clone());
        self.deliver(tx, seen, post).await
    }

    async fn poll_log(&self, tx: &Sender<SseFrame>, seen: &mut HashSet<String>) -> Step {
        let names = match self.log.list(&self.channel).await {
            Ok(names) => names,
            Err(e) => {
                // Transient by policy: polling never terminates the session.
                tracing::debug!(channel=%self.channel, error=%e,
                    "log poll failed; retrying next tick");
                return Step::Continue;
            }
        };
        for name in names {
            let Some(cid) = cid_from_entry_name(&name) else {
                continue;
            };
            if seen.contains(cid) {
                continue;
            }
            let post = if let Some(post) = self.store.get(cid) {
                post
            } else {
                match self.log.read(&self.channel, &name).await {
                    Ok(bytes) => match Post::from_json(&bytes) {
                        Ok(post) => post,
                        Err(e) => {
                            tracing::warn!(channel=%self.channel, entry=%name, error=%e,
                                "unparseable log entry; skipping permanently");
                            seen.insert(cid.to_string());
                            continue;
                        }
                    },
                    Err(AppError::NotFound) => {
                        tracing::warn!(channel=%self.channel, entry=%name,
                            "log entry vanished between list and read");
                        seen.insert(cid.to_string());
                        continue;
                    }
                    Err(e) => {
                        tracing::warn!(channel=%self.channel, entry=%name, error=%e,
                            "log entry unreadable; will retry");
                        continue;
                    }
                }
            };
            if let Step::ClientGone = self.deliver(tx, seen, post).await {
                return Step::ClientGone;
            }
        }
        Step::Continue
    }
}
