//! Module containing the derivation pipeline.

mod builder;
pub use builder::{AttributesQueueStage, PipelineBuilder};

mod core;
pub use core::DerivationPipeline;

#[cfg(test)]
mod scenarios;
