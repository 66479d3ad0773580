//! Contains stages pertaining to the processing of [Batch]es.
//!
//! Sitting after the [ChannelReader] stage, the [BatchStream] and [BatchProvider] stages are
//! responsible for validating and ordering the [Batch]es. The [BatchStream] stage is responsible
//! for streaming [SingleBatch]es from [SpanBatch]es, while the [BatchProvider] stage selects the
//! [BatchQueue] before Holocene and the [BatchValidator] after, handing ordered [SingleBatch]es
//! to the [AttributesQueue] stage.
//!
//! [Batch]: crate::batch::Batch
//! [SingleBatch]: crate::batch::SingleBatch
//! [SpanBatch]: crate::batch::SpanBatch
//! [ChannelReader]: crate::stages::ChannelReader
//! [AttributesQueue]: crate::stages::AttributesQueue

use crate::{
    batch::Batch,
    types::{BlockInfo, L2BlockInfo, PipelineResult},
};
use async_trait::async_trait;

mod batch_stream;
pub use batch_stream::{BatchStream, BatchStreamProvider};

mod batch_queue;
pub use batch_queue::BatchQueue;

mod batch_validator;
pub use batch_validator::BatchValidator;

mod batch_provider;
pub use batch_provider::{ActiveBatchStage, BatchProvider};

/// Provides [Batch]es for the [BatchQueue] and [BatchValidator] stages.
#[async_trait]
pub trait NextBatchProvider {
    /// Returns the next [Batch] in the [BatchStream] stage, if the stage is not complete.
    /// If the stage is complete and the batch has been consumed, an [PipelineError::Eof] error is
    /// returned.
    ///
    /// [PipelineError::Eof]: crate::errors::PipelineError::Eof
    async fn next_batch(
        &mut self,
        parent: L2BlockInfo,
        l1_origins: &[BlockInfo],
    ) -> PipelineResult<Batch>;

    /// Returns the number of [SingleBatch]es that are currently buffered in the [BatchStream]
    /// from a [SpanBatch].
    ///
    /// [SpanBatch]: crate::batch::SpanBatch
    /// [SingleBatch]: crate::batch::SingleBatch
    fn span_buffer_size(&self) -> usize;

    /// Allows the stage to flush the buffer in the [BatchStream]
    /// if an invalid single batch is found. Pre-holocene hardfork, this will be a no-op.
    fn flush(&mut self);
}
