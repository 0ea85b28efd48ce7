use axum::{http::StatusCode, response::IntoResponse};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// 429, or 403 — Discogs reuses 403 for throttling, so we retry it
    /// the same way rather than treating it as an auth failure.
    #[error("Rate limited (HTTP {status})")]
    RateLimited { status: u16 },

    #[error("Upstream returned HTTP {status} for {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Seller not found on Discogs: {0}")]
    SellerNotFound(String),

    #[error("Seller already monitored: {0}")]
    SellerExists(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// A seller's inventory fetch died partway through; a checkpoint was
    /// saved so the next scan can resume. Recoverable at the scan level.
    #[error("Inventory fetch for {username} incomplete after page {last_completed_page}")]
    InventoryIncomplete {
        username: String,
        last_completed_page: u32,
    },
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// True for failures worth retrying: rate-limit responses (429/403)
    /// and connection-level transport errors. Everything else — 404s,
    /// unexpected statuses, validation, parse failures — retrying won't fix.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::RateLimited { .. } => true,
            AppError::Http(e) => !e.is_builder() && !e.is_decode(),
            _ => false,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::NotFound(_) | AppError::SellerNotFound(_) => StatusCode::NOT_FOUND,
            AppError::SellerExists(_) => StatusCode::CONFLICT,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::RateLimited { .. } => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}
