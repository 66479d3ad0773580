//! Error types for the derivation pipeline.

mod attributes;
pub use attributes::BuilderError;

mod stages;
pub use stages::ChannelDecompressionError;

mod pipeline;
pub use pipeline::{PipelineEncodingError, PipelineError, PipelineErrorKind, ResetError};

mod sources;
pub use sources::{BlobDecodingError, BlobProviderError};
