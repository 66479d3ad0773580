//! Error types for derivation pipeline stages.

/// A channel decompression error.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelDecompressionError {
    /// The channel body is empty.
    #[error("Empty channel body")]
    Empty,
    /// The version byte does not name a known codec.
    #[error("Unsupported channel version: {0}")]
    UnsupportedVersion(u8),
    /// A brotli channel was read before Fjord activation.
    #[error("Brotli channel before Fjord")]
    BrotliBeforeFjord,
    /// The zlib stream could not be inflated.
    #[error("zlib: {0}")]
    Zlib(String),
    /// The brotli stream could not be decompressed.
    #[error("brotli: {0}")]
    Brotli(String),
}
