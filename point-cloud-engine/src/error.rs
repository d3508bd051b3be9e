//! Error types for the decode engine.

/// Result alias used across the engine.
pub type Result<T> = std::result::Result<T, DecodeError>;

/// Decode failure taxonomy.
///
/// Terminal failures carry messages that let a caller distinguish a
/// bad file from a cancelled decode from an unsupported format
/// variant, so an embedding UI can retry, re-prompt, or explain.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// Bad signature or unparsable header. Fatal, no partial result.
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    /// PCD schema missing one of the x/y/z position fields.
    #[error("missing required fields: {0}")]
    MissingRequiredFields(String),

    /// LZF back-reference or payload bounds violation mid-stream.
    #[error("corrupt stream: {0}")]
    CorruptStream(String),

    /// Declared format variant the decoder does not know how to read.
    #[error("unsupported variant: {0}")]
    Unsupported(String),

    /// Caller abort. Sessions terminate silently on this, without a
    /// terminal error event.
    #[error("decode cancelled")]
    Cancelled,

    /// Underlying source I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
