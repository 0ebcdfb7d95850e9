//! Thin client for the Kubo HTTP RPC API and gateway.
//!
//! Only the four capabilities the service consumes are wrapped: content
//! upload (`/api/v0/add`), the MFS files API backing the durable log,
//! pub/sub, and gateway reads. No retries here; callers decide.

use crate::ipfs::multibase;
use bytes::Bytes;
use futures_util::StreamExt;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum IpfsError {
    #[error("ipfs request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("ipfs api error (http {status}): {message}")]
    Api { status: u16, message: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid payload: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddResponse {
    #[serde(rename = "Hash")]
    pub hash: String,
    #[serde(rename = "Size")]
    pub size: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(rename = "Message")]
    message: String,
}

#[derive(Debug, Deserialize)]
struct FilesEntry {
    #[serde(rename = "Name")]
    name: String,
}

#[derive(Debug, Deserialize)]
struct FilesLsResponse {
    #[serde(rename = "Entries")]
    entries: Option<Vec<FilesEntry>>,
}

#[derive(Debug, Deserialize)]
struct PubsubMessage {
    data: String,
}

#[derive(Clone)]
pub struct IpfsClient {
    http: reqwest::Client,
    api_base: String,
    gateway_base: String,
}

impl IpfsClient {
    pub fn new(http: reqwest::Client, api_url: &str, gateway_url: &str) -> Self {
        Self {
            http,
            api_base: api_url.trim_end_matches('/').to_string(),
            gateway_base: gateway_url.trim_end_matches('/').to_string(),
        }
    }

    fn api(&self, path: &str) -> String {
        format!("{}/api/v0/{}", self.api_base, path)
    }

    /// Reads a Kubo error body and classifies it. The files API reports a
    /// missing path as an HTTP 500 whose message contains "does not exist";
    /// callers rely on that being distinguishable from the node being down.
    async fn api_error(resp: reqwest::Response) -> IpfsError {
        let status = resp.status().as_u16();
        let message = match resp.json::<ApiErrorBody>().await {
            Ok(body) => body.message,
            Err(_) => "unreadable error body".to_string(),
        };
        if message.contains("does not exist") {
            IpfsError::NotFound(message)
        } else {
            IpfsError::Api { status, message }
        }
    }

    /// Uploads bytes; the returned hash is the content identifier. Two
    /// uploads of identical bytes yield the same CID.
    pub async fn add_bytes(&self, filename: &str, data: Vec<u8>) -> Result<AddResponse, IpfsError> {
        let form = Form::new().part("file", Part::bytes(data).file_name(filename.to_string()));
        let resp = self
            .http
            .post(self.api("add"))
            .query(&[("cid-version", "1")])
            .multipart(form)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Self::api_error(resp).await);
        }
        Ok(resp.json::<AddResponse>().await?)
    }

    pub async fn files_write(&self, path: &str, data: Vec<u8>) -> Result<(), IpfsError> {
        let form = Form::new().part("file", Part::bytes(data));
        let resp = self
            .http
            .post(self.api("files/write"))
            .query(&[
                ("arg", path),
                ("create", "true"),
                ("parents", "true"),
                ("truncate", "true"),
            ])
            .multipart(form)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Self::api_error(resp).await);
        }
        Ok(())
    }

    /// Lists entry names in an MFS directory. A missing directory surfaces
    /// as `IpfsError::NotFound`, not as an empty listing.
    pub async fn files_ls(&self, path: &str) -> Result<Vec<String>, IpfsError> {
        let resp = self
            .http
            .post(self.api("files/ls"))
            .query(&[("arg", path)])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Self::api_error(resp).await);
        }
        let body = resp.json::<FilesLsResponse>().await?;
        Ok(body
            .entries
            .unwrap_or_default()
            .into_iter()
            .map(|e| e.name)
            .collect())
    }

    pub async fn files_read(&self, path: &str) -> Result<Vec<u8>, IpfsError> {
        let resp = self
            .http
            .post(self.api("files/read"))
            .query(&[("arg", path)])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Self::api_error(resp).await);
        }
        Ok(resp.bytes().await?.to_vec())
    }

    pub async fn pubsub_pub(&self, topic: &str, payload: Vec<u8>) -> Result<(), IpfsError> {
        let form = Form::new().part("file", Part::bytes(payload));
        let resp = self
            .http
            .post(self.api("pubsub/pub"))
            .query(&[("arg", multibase::encode(topic.as_bytes()))])
            .multipart(form)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Self::api_error(resp).await);
        }
        Ok(())
    }

    /// Subscribes to a topic. The returned receiver yields decoded message
    /// payloads until the token is cancelled or the node drops the
    /// connection; a synchronous error here means pub/sub is unavailable
    /// (e.g. not enabled on the node).
    pub async fn pubsub_sub(
        &self,
        topic: &str,
        cancel: CancellationToken,
    ) -> Result<UnboundedReceiver<Vec<u8>>, IpfsError> {
        let resp = self
            .http
            .post(self.api("pubsub/sub"))
            .query(&[("arg", multibase::encode(topic.as_bytes()))])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Self::api_error(resp).await);
        }

        let (tx, rx) = unbounded_channel();
        let topic = topic.to_string();
        tokio::spawn(async move {
            let mut body = Box::pin(resp.bytes_stream());
            // Messages arrive as newline-delimited JSON; a message can span
            // chunk boundaries, so buffer until a full line is available.
            let mut buf: Vec<u8> = Vec::new();
            loop {
                let chunk = tokio::select! {
                    _ = cancel.cancelled() => break,
                    chunk = body.next() => chunk,
                };
                let chunk = match chunk {
                    Some(Ok(bytes)) => bytes,
                    Some(Err(e)) => {
                        tracing::warn!(%topic, error=%e, "pub/sub stream read failed");
                        break;
                    }
                    None => break,
                };
                buf.extend_from_slice(&chunk);
                while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                    let line: Vec<u8> = buf.drain(..=pos).collect();
                    match decode_pubsub_line(&line) {
                        Ok(Some(payload)) => {
                            if tx.send(payload).is_err() {
                                return;
                            }
                        }
                        Ok(None) => {}
                        Err(e) => {
                            tracing::warn!(%topic, error=%e, "skipping undecodable pub/sub message");
                        }
                    }
                }
            }
        });

        Ok(rx)
    }

    /// Fetches content bytes (and content type, if the gateway reports one)
    /// for a CID via the gateway.
    pub async fn gateway_get(&self, cid: &str) -> Result<(Bytes, Option<String>), IpfsError> {
        let resp = self
            .http
            .get(format!("{}/ipfs/{}", self.gateway_base, cid))
            .send()
            .await?;
        if resp.status().as_u16() == 404 {
            return Err(IpfsError::NotFound(format!("no content for cid {cid}")));
        }
        if !resp.status().is_success() {
            return Err(IpfsError::Api {
                status: resp.status().as_u16(),
                message: "gateway error".into(),
            });
        }
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Ok((resp.bytes().await?, content_type))
    }
}

fn decode_pubsub_line(line: &[u8]) -> Result<Option<Vec<u8>>, String> {
    let mut trimmed = line;
    while let Some(rest) = trimmed
        .strip_suffix(b"\n")
        .or_else(|| trimmed.strip_suffix(b"\r"))
    {
        trimmed = rest;
    }
    if trimmed.is_empty() {
        return Ok(None);
    }
    let msg: PubsubMessage =
        serde_json::from_slice(trimmed).map_err(|e| format!("bad message json: {e}"))?;
    multibase::decode(&msg.data).map(Some)
}
