//! Business workflows behind the HTTP handlers.

pub mod admin_service;
pub mod order_service;
pub mod product_service;

use crate::assets::AssetError;
use thiserror::Error;

pub use admin_service::AdminService;
pub use order_service::OrderService;
pub use product_service::ProductService;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Asset(#[from] AssetError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error("password hashing failed: {0}")]
    Hash(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Trim a required text input; `None` when missing or blank.
pub(crate) fn required(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
