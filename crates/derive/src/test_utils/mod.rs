//! Test utilities for `mako-derive`.

use crate::types::{BlockInfo, Signal};

#[macro_use]
mod macros;

mod pipeline;
pub use pipeline::{new_test_pipeline, step_to_attributes, TestNextAttributes, TestPipeline};

mod l1_chain;
pub use l1_chain::{
    batcher_tx, channel_frames, l1_block_hash, l2_block_hash, l2_child, TestL1Chain,
};

mod attributes_queue;
pub use attributes_queue::{TestAttributesBuilder, TestAttributesProvider};

mod batch_stream;
pub use batch_stream::TestBatchStreamProvider;

mod next_batch;
pub use next_batch::TestNextBatchProvider;

mod next_frame;
pub use next_frame::TestNextFrameProvider;

mod channel_reader;
pub use channel_reader::{
    brotli_compress_batches, channel_body, compress_batches, TestChannelReaderProvider,
};

mod frame_queue;
pub use frame_queue::TestFrameQueueProvider;

mod frames;
pub use frames::{encode_frames, FrameQueueAsserter, FrameQueueBuilder};

mod l1_retrieval;
pub use l1_retrieval::{TestDAP, TestL1RetrievalProvider};

mod blob_provider;
pub use blob_provider::TestBlobProvider;

mod chain_providers;
pub use chain_providers::{TestChainProvider, TestL2ChainProvider, TestProviderError};

mod tracing;
pub use tracing::{CollectingLayer, TraceStorage};

/// Returns the L1 origin a reset-like signal rebuilds from.
pub(crate) const fn signal_origin(signal: &Signal) -> Option<BlockInfo> {
    match signal {
        Signal::Reset(reset) => Some(reset.l1_origin),
        Signal::Activation(activation) => Some(activation.l1_origin),
        Signal::FlushChannel | Signal::L1Finalized(_) => None,
    }
}
