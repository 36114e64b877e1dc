//! Map load/save error types.

use thiserror::Error;

/// Map error type.
#[derive(Debug, Error)]
pub enum MapError {
    /// Framing, payload or version error from the node codec.
    #[error(transparent)]
    Codec(#[from] otbm_io::OtbmError),

    /// A known node type where the tree does not allow it.
    #[error("unexpected {found} node inside {parent}")]
    UnexpectedNode { parent: &'static str, found: u8 },

    /// The stream has no root or no map-data node.
    #[error("missing root or map-data node")]
    MissingRoot,

    /// A required header attribute was absent.
    #[error("root node lacks the {0} attribute")]
    MissingAttribute(&'static str),

    /// Item-type table could not be built.
    #[error("invalid item table: {0}")]
    InvalidItemTable(String),

    /// JSON error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error opening or creating a map file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for map operations.
pub type MapResult<T> = Result<T, MapError>;
