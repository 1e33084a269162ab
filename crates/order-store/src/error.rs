use common::OrderId;
use thiserror::Error;

/// Errors that can occur when interacting with the order store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The referenced order does not exist.
    #[error("order {0} not found")]
    NotFound(OrderId),

    /// A database error occurred.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A stored status value could not be decoded.
    #[error("unknown order status in storage: {0}")]
    InvalidStatus(String),
}

/// Result type for order store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
