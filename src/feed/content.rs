//! Content upload/fetch seam over the backend's content-addressed store.

use crate::error::AppError;
use crate::ipfs::IpfsClient;
use async_trait::async_trait;
use bytes::Bytes;

#[derive(Debug, Clone)]
pub struct StoredContent {
    pub cid: String,
    pub size: String,
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Uploads bytes and returns the backend-assigned content identifier.
    async fn upload(&self, filename: &str, data: Vec<u8>) -> Result<StoredContent, AppError>;

    /// Fetches content bytes (and content type when known) for a CID.
    async fn fetch(&self, cid: &str) -> Result<(Bytes, Option<String>), AppError>;
}

pub struct IpfsContentStore {
    ipfs: IpfsClient,
}

impl IpfsContentStore {
    pub fn new(ipfs: IpfsClient) -> Self {
        Self { ipfs }
    }
}

#[async_trait]
impl ContentStore for IpfsContentStore {
    async fn upload(&self, filename: &str, data: Vec<u8>) -> Result<StoredContent, AppError> {
        let added = self
            .ipfs
            .add_bytes(filename, data)
            .await
            .map_err(|e| AppError::BackendUnreachable(e.to_string()))?;
        Ok(StoredContent {
            cid: added.hash,
            size: added.size,
        })
    }

    async fn fetch(&self, cid: &str) -> Result<(Bytes, Option<String>), AppError> {
        self.ipfs.gateway_get(cid).await.map_err(AppError::from)
    }
}
