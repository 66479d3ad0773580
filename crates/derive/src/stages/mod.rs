//! This module contains each stage of the derivation pipeline, and offers a high-level API to functionally
//! apply each stage's output as an input to the next stage, until finally arriving at the produced execution
//! payloads.
//!
//! **Stages:**
//! 1. L1 Traversal
//! 2. L1 Retrieval
//! 3. Frame Queue
//! 4. Channel Provider (Channel Bank, or Channel Assembler after Holocene)
//! 5. Channel Reader (Batch Decoding)
//! 6. Batch Stream (Holocene span batch expansion)
//! 7. Batch Provider (Batch Queue, or Batch Validator after Holocene)
//! 8. Payload Attributes Derivation

mod l1_traversal;
pub use l1_traversal::L1Traversal;

mod l1_retrieval;
pub use l1_retrieval::{L1Retrieval, L1RetrievalProvider};

mod frame_queue;
pub use frame_queue::{FrameQueue, FrameQueueProvider};

mod channel;
pub use channel::{
    ActiveChannelStage, ChannelAssembler, ChannelBank, ChannelProvider, ChannelReader,
    ChannelReaderProvider, NextFrameProvider,
};

mod batch;
pub use batch::{
    ActiveBatchStage, BatchProvider, BatchQueue, BatchStream, BatchStreamProvider, BatchValidator,
    NextBatchProvider,
};

mod attributes_queue;
pub use attributes_queue::{AttributesProvider, AttributesQueue};
