#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(any(test, feature = "test-utils")), warn(unused_crate_dependencies))]

/// Re-export commonly used types and traits.
pub mod prelude {
    pub use crate::{
        attributes::StatefulAttributesBuilder,
        batch::{Batch, SingleBatch, SpanBatch},
        errors::{PipelineError, PipelineErrorKind, ResetError},
        pipeline::{DerivationPipeline, PipelineBuilder},
        sources::EthereumDataSource,
        traits::{
            BlobProvider, ChainProvider, DataAvailabilityProvider, L2ChainProvider,
            OriginProvider, Pipeline, SignalReceiver,
        },
        types::{
            ActivationSignal, AttributesWithParent, BlockInfo, L2BlockInfo, PayloadAttributes,
            PipelineResult, ResetSignal, RollupConfig, Signal, StepResult, SystemConfig,
        },
    };
}

pub mod attributes;
pub mod batch;
pub mod errors;
pub mod params;
pub mod pipeline;
pub mod sources;
pub mod stages;
pub mod traits;
pub mod types;

#[cfg(feature = "metrics")]
pub mod metrics;

mod macros;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
