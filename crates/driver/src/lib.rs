#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

#[macro_use]
extern crate tracing;

mod core;
pub use core::{Driver, DriverStep};

mod config;
pub use config::DriverConfig;

mod heads;
pub use heads::{ForkchoiceState, L2ChainHeads, SafetyLabel};

mod errors;
pub use errors::{
    DriverError, DriverResult, EngineError, EngineErrorClass, EngineErrorKind, UnsafePayloadError,
};

mod engine;
pub use engine::{EngineController, ExecutionPayload};

mod sync;
pub use sync::{find_l2_heads, MAX_REORG_SEQ_WINDOWS};

mod finality;
pub use finality::{FinalityData, Finalizer, FINALITY_LOOKBACK};

mod payloads;
pub use payloads::{UnsafePayloadQueue, DEFAULT_MAX_UNSAFE_PAYLOADS_BYTES};

mod memory;
pub use memory::InMemoryEngine;
