//! Codec error types.

use thiserror::Error;

/// Error raised by the node codec.
///
/// `MalformedStream` and `CorruptData` are always fatal for the parse in
/// progress: the reader poisons itself and every later call returns
/// [`OtbmError::Poisoned`].
#[derive(Debug, Error)]
pub enum OtbmError {
    /// A structural marker was missing or unexpected, or the node stack underflowed.
    #[error("malformed stream at offset {offset}: {reason}")]
    MalformedStream { offset: u64, reason: String },

    /// An attribute length disagreed with its primitive, or a raw read came up short.
    #[error("corrupt data at offset {offset}: {reason}")]
    CorruptData { offset: u64, reason: String },

    /// Format or client version outside the known range.
    #[error("unsupported version: {0}")]
    UnsupportedVersion(String),

    /// The item factory refused to instantiate an item id.
    #[error("unknown item id {0}")]
    UnknownItem(u16),

    /// Attribute payload does not fit the 16-bit length field.
    #[error("attribute payload too large: {len} > 65535 bytes")]
    PayloadTooLarge { len: usize },

    /// Attribute id collides with a structural byte.
    #[error("attribute id {0:#04x} collides with a structural marker")]
    ReservedAttributeId(u8),

    /// The codec already failed; the stream position is undefined.
    #[error("stream poisoned by an earlier {0:?} failure")]
    Poisoned(StreamStatus),

    /// Host I/O failure other than a short read.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Sticky health of a node reader or writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamStatus {
    #[default]
    Ok,
    MalformedStream,
    CorruptData,
    IoFailure,
}

/// Result type for codec operations.
pub type OtbmResult<T> = Result<T, OtbmError>;

impl OtbmError {
    /// The sticky status this error leaves behind.
    #[must_use]
    pub const fn status(&self) -> StreamStatus {
        match self {
            Self::MalformedStream { .. } => StreamStatus::MalformedStream,
            Self::CorruptData { .. } | Self::UnknownItem(_) => StreamStatus::CorruptData,
            Self::Poisoned(status) => *status,
            Self::Io(_) => StreamStatus::IoFailure,
            Self::UnsupportedVersion(_)
            | Self::PayloadTooLarge { .. }
            | Self::ReservedAttributeId(_) => StreamStatus::Ok,
        }
    }

    /// Whether the error leaves the stream unusable.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(self.status(), StreamStatus::Ok)
    }
}
