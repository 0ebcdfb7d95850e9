use crate::ipfs::IpfsError;
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("server start failure: {0}")]
    StartServer(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("payload too large (limit {limit} bytes)")]
    PayloadTooLarge { limit: usize },

    #[error("not found")]
    NotFound,

    #[error("storage backend unreachable: {0}")]
    BackendUnreachable(String),

    #[error("internal server error")]
    Internal,
}

impl AppError {
    /// Returns HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::BadRequest(_) => 400,
            AppError::NotFound => 404,
            AppError::PayloadTooLarge { .. } => 413,
            AppError::BackendUnreachable(_) => 502,
            AppError::Config(_) | AppError::StartServer(_) | AppError::Internal => 500,
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let status = StatusCode::from_u16(self.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        HttpResponse::build(status).json(serde_json::json!({ "error": self.to_string() }))
    }
}

impl From<IpfsError> for AppError {
    fn from(e: IpfsError) -> Self {
        match e {
            IpfsError::NotFound(_) => AppError::NotFound,
            other => AppError::BackendUnreachable(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        tracing::error!(error=%e, "json serialization failure");
        AppError::Internal
    }
}
