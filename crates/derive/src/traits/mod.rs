//! This module contains all of the traits describing functionality of portions of the derivation
//! pipeline.

mod pipeline;
pub use pipeline::Pipeline;

mod attributes;
pub use attributes::{AttributesBuilder, NextAttributes};

mod data_sources;
pub use data_sources::DataAvailabilityProvider;

mod providers;
pub use providers::{BlobProvider, ChainProvider, L2ChainProvider};

mod stages;
pub use stages::{OriginAdvancer, OriginProvider, SignalReceiver};
