use crate::models::post::Post;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

/// Unique identifier for a registered feed observer.
///
/// Each live session gets one when it registers, so it can be removed
/// precisely when the session ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(Uuid);

impl ObserverId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

struct Observer {
    id: ObserverId,
    sender: UnboundedSender<Post>,
}

struct StoreInner {
    /// Dedup index; doubles as the CID → post lookup for warm history reads.
    by_cid: HashMap<String, Post>,
    /// Per-channel posts, ascending by timestamp (ties in arrival order).
    channels: HashMap<String, Vec<Post>>,
    observers: HashMap<String, Vec<Observer>>,
}

/// In-process cache of recently seen posts, deduplicated by CID and fanned
/// out to local observers on insert. One instance per server process,
/// constructed at startup and injected; it is a cache, not a source of
/// truth — the durable log is.
#[derive(Clone)]
pub struct PostStore {
    cap: usize,
    inner: Arc<Mutex<StoreInner>>,
}

impl PostStore {
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            inner: Arc::new(Mutex::new(StoreInner {
                by_cid: HashMap::new(),
                channels: HashMap::new(),
                observers: HashMap::new(),
            })),
        }
    }

    /// Idempotent insert. Returns false without side effects when the CID is
    /// already present; otherwise stores the post and notifies every
    /// observer of its channel on this call stack. A dead observer is
    /// dropped without affecting delivery to the rest.
    pub fn add(&self, post: Post) -> bool {
        let mut inner = self.inner.lock().expect("post store lock poisoned");

        if inner.by_cid.contains_key(&post.cid) {
            return false;
        }
        inner.by_cid.insert(post.cid.clone(), post.clone());

        let cap = self.cap;
        let posts = inner.channels.entry(post.channel.clone()).or_default();
        // Equal timestamps keep arrival order: insert after existing equals.
        let at = posts.partition_point(|p| p.timestamp <= post.timestamp);
        posts.insert(at, post.clone());
        let evicted = if posts.len() > cap {
            Some(posts.remove(0))
        } else {
            None
        };
        if let Some(old) = evicted {
            // Retention window: a CID that falls out of the cache may be
            // re-added later; the log's name-unique entries make that safe.
            inner.by_cid.remove(&old.cid);
        }

        if let Some(observers) = inner.observers.get_mut(&post.channel) {
            observers.retain(|o| o.sender.send(post.clone()).is_ok());
            if observers.is_empty() {
                inner.observers.remove(&post.channel);
            }
        }
        true
    }

    pub fn contains(&self, cid: &str) -> bool {
        self.inner
            .lock()
            .expect("post store lock poisoned")
            .by_cid
            .contains_key(cid)
    }

    pub fn get(&self, cid: &str) -> Option<Post> {
        self.inner
            .lock()
            .expect("post store lock poisoned")
            .by_cid
            .get(cid)
            .cloned()
    }

    /// Cached view of a channel: at most `cap` posts, ascending by timestamp.
    pub fn get_by_channel(&self, channel: &str) -> Vec<Post> {
        self.inner
            .lock()
            .expect("post store lock poisoned")
            .channels
            .get(channel)
            .cloned()
            .unwrap_or_default()
    }

    /// Registers a live observer for a channel. The receiver sees every post
    /// added for that channel until `remove_observer` is called.
    pub fn subscribe(&self, channel: &str) -> (ObserverId, UnboundedReceiver<Post>) {
        let (tx, rx) = unbounded_channel();
        let id = ObserverId::new();
        let mut inner = self.inner.lock().expect("post store lock poisoned");
        inner
            .observers
            .entry(channel.to_string())
            .or_default()
            .push(Observer { id, sender: tx });
        (id, rx)
    }

    /// Deregisters an observer. Must be called when a session ends so the
    /// registry does not accumulate dead senders.
    pub fn remove_observer(&self, channel: &str, id: ObserverId) {
        let mut inner = self.inner.lock().expect("post store lock poisoned");
        if let Some(observers) = inner.observers.get_mut(channel) {
            observers.retain(|o| o.id != id);
            if observers.is_empty() {
                inner.observers.remove(channel);
            }
        }
    }

    pub fn observer_count(&self, channel: &str) -> usize {
        self.inner
            .lock()
            .expect("post store lock poisoned")
            .observers
            .get(channel)
            .map(Vec::len)
            .unwrap_or(0)
    }
}
