use crate::error::AppError;
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// An immutable post as stored in the durable log and fanned out to readers.
///
/// `cid` is assigned by the storage backend exactly once, when the canonical
/// form of the post is uploaded; a post is never mutated afterwards —
/// corrections are new posts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Post {
    pub author: String,
    pub channel: String,
    #[serde(default)]
    pub content: String,
    /// Producer-assigned creation time, milliseconds since the epoch.
    pub timestamp: i64,
    pub cid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_id: Option<String>,
}

impl Post {
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// A validated post that has not been uploaded yet (no CID).
#[derive(Debug, Clone, Serialize)]
pub struct PostDraft {
    pub author: String,
    pub channel: String,
    pub content: String,
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment_id: Option<String>,
}

impl PostDraft {
    /// The canonical bytes uploaded to the backend. The CID is derived from
    /// this form, so it deliberately excludes the `cid` field itself.
    pub fn canonical_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn into_post(self, cid: String) -> Post {
        Post {
            author: self.author,
            channel: self.channel,
            content: self.content,
            timestamp: self.timestamp,
            cid,
            attachment_id: self.attachment_id,
        }
    }
}

/// Ingress request body.
#[derive(Debug, Deserialize)]
pub struct NewPost {
    pub author: String,
    pub channel: String,
    #[serde(default)]
    pub content: String,
    pub attachment_id: Option<String>,
}

impl NewPost {
    /// Validates the request and stamps the creation timestamp.
    pub fn into_draft(self) -> Result<PostDraft, AppError> {
        let author = self.author.trim().to_string();
        let channel = self.channel.trim().to_string();
        let content = self.content.trim().to_string();
        let attachment_id = self
            .attachment_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        if author.is_empty() {
            return Err(AppError::BadRequest("author is required".into()));
        }
        if channel.is_empty() {
            return Err(AppError::BadRequest("channel is required".into()));
        }
        // The channel name becomes a single MFS path segment and a pub/sub
        // topic suffix.
        if channel.contains('/') || channel.chars().any(char::is_whitespace) {
            return Err(AppError::BadRequest(
                "channel must not contain slashes or whitespace".into(),
            ));
        }
        if content.is_empty() && attachment_id.is_none() {
            return Err(AppError::BadRequest(
                "post needs content or an attachment".into(),
            ));
        }

        Ok(PostDraft {
            author,
            channel,
            content,
            timestamp: Utc::now().timestamp_millis(),
            attachment_id,
        })
    }
}
