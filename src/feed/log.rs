//! Append-only per-channel log over the backend's shared MFS namespace.
//!
//! Each post becomes one immutable entry at `<root>/<channel>/<name>`,
//! where the name embeds the zero-padded millisecond timestamp and the CID
//! so that sorting names yields delivery order and concurrent producers
//! can never collide on a name.

use crate::error::AppError;
use crate::ipfs::{IpfsClient, IpfsError};
use crate::models::post::Post;
use async_trait::async_trait;

/// Entry name for a post: lexicographic order equals timestamp order while
/// timestamps fit in 13 digits (until the year 2286).
pub fn entry_name(post: &Post) -> String {
    format!("{:013}-{}.json", post.timestamp, post.cid)
}

/// Extracts the CID embedded in an entry name; None for foreign files.
pub fn cid_from_entry_name(name: &str) -> Option<&str> {
    let stem = name.strip_suffix(".json")?;
    let (ts, cid) = stem.split_once('-')?;
    if ts.len() != 13 || !ts.bytes().all(|b| b.is_ascii_digit()) || cid.is_empty() {
        return None;
    }
    Some(cid)
}

#[async_trait]
pub trait ChannelLog: Send + Sync {
    /// Writes one immutable entry. Safe to call concurrently from multiple
    /// producers; entry names are unique per post.
    async fn append(&self, channel: &str, post: &Post) -> Result<(), AppError>;

    /// Entry names in delivery order. A channel that has no entries yet
    /// yields an empty list; only an unreachable backend is an error.
    async fn list(&self, channel: &str) -> Result<Vec<String>, AppError>;

    /// Raw content of one entry.
    async fn read(&self, channel: &str, entry: &str) -> Result<Vec<u8>, AppError>;
}

pub struct IpfsChannelLog {
    ipfs: IpfsClient,
    root: String,
}

impl IpfsChannelLog {
    pub fn new(ipfs: IpfsClient, root: String) -> Self {
        Self {
            ipfs,
            root: root.trim_end_matches('/').to_string(),
        }
    }

    fn channel_dir(&self, channel: &str) -> String {
        format!("{}/{}", self.root, channel)
    }
}

#[async_trait]
impl ChannelLog for IpfsChannelLog {
    async fn append(&self, channel: &str, post: &Post) -> Result<(), AppError> {
        let path = format!("{}/{}", self.channel_dir(channel), entry_name(post));
        let body = post.to_json()?;
        self.ipfs
            .files_write(&path, body.into_bytes())
            .await
            .map_err(|e| AppError::BackendUnreachable(e.to_string()))
    }

    async fn list(&self, channel: &str) -> Result<Vec<String>, AppError> {
        match self.ipfs.files_ls(&self.channel_dir(channel)).await {
            Ok(mut names) => {
                names.sort();
                Ok(names)
            }
            // The channel directory is created lazily by the first append.
            Err(IpfsError::NotFound(_)) => Ok(Vec::new()),
            Err(e) => Err(AppError::BackendUnreachable(e.to_string())),
        }
    }

    async fn read(&self, channel: &str, entry: &str) -> Result<Vec<u8>, AppError> {
        let path = format!("{}/{}", self.channel_dir(channel), entry);
        self.ipfs.files_read(&path).await.map_err(AppError::from)
    }
}
