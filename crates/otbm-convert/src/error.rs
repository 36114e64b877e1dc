//! Table loading errors.

use thiserror::Error;

/// Failure to build converter configuration.
///
/// Problems with the map being converted are never errors of this type; they
/// end up in [`crate::ConversionResult`].
#[derive(Debug, Error)]
pub enum ConvertError {
    /// A table maps two ids onto one, so it cannot be reversed.
    #[error("invalid item id table for client {client}: {reason}")]
    InvalidTable { client: u32, reason: String },

    /// JSON error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
