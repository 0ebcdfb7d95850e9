use dotenvy::dotenv;
use std::env;
use std::time::Duration;

/// Delivery timing knobs shared by every feed session.
#[derive(Debug, Clone)]
pub struct FeedTiming {
    /// Durable-log poll cadence when pub/sub is unavailable.
    pub poll_interval: Duration,
    /// Keep-alive comment cadence on the SSE stream.
    pub heartbeat_interval: Duration,
    /// Sessions close gracefully after this long and tell the client to reconnect.
    pub session_max: Duration,
    /// SSE `retry:` value sent with the graceful close.
    pub reconnect_retry_ms: u64,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub ipfs_api_url: String,
    pub ipfs_gateway_url: String,
    /// MFS directory under which per-channel logs live.
    pub feed_root: String,
    /// Posts retained per channel in the in-process store.
    pub channel_cap: usize,
    pub max_upload_bytes: usize,
    pub timing: FeedTiming,
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn trim_base(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

/// Kubo convention: the gateway lives on the API host with port 5001 swapped
/// for 8080. Only used when IPFS_GATEWAY_URL is not set explicitly.
fn derive_gateway_url(api_url: &str) -> String {
    api_url.replace(":5001", ":8080")
}

impl Config {
    pub fn from_env() -> Result<Self, crate::error::AppError> {
        dotenv().ok();

        let port = env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3000);

        let ipfs_api_url = trim_base(
            &env::var("IPFS_API_URL").unwrap_or_else(|_| "http://127.0.0.1:5001".into()),
        );
        let ipfs_gateway_url = trim_base(
            &env::var("IPFS_GATEWAY_URL").unwrap_or_else(|_| derive_gateway_url(&ipfs_api_url)),
        );

        let feed_root = env::var("FEED_ROOT").unwrap_or_else(|_| "/feeds".into());
        if !feed_root.starts_with('/') {
            return Err(crate::error::AppError::Config(
                "FEED_ROOT must be an absolute MFS path".into(),
            ));
        }

        let channel_cap = env_u64("CHANNEL_CAP", 200) as usize;
        let max_upload_bytes = env_u64("MAX_UPLOAD_BYTES", 10 * 1024 * 1024) as usize;

        let timing = FeedTiming {
            poll_interval: Duration::from_millis(env_u64("POLL_INTERVAL_MS", 2_000)),
            heartbeat_interval: Duration::from_millis(env_u64("HEARTBEAT_INTERVAL_MS", 15_000)),
            session_max: Duration::from_millis(env_u64("SESSION_MAX_MS", 50_000)),
            reconnect_retry_ms: env_u64("RECONNECT_RETRY_MS", 250),
        };

        Ok(Self {
            port,
            ipfs_api_url,
            ipfs_gateway_url,
            feed_root: trim_base(&feed_root),
            channel_cap,
            max_upload_bytes,
            timing,
        })
    }
}
