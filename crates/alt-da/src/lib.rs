#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(any(test, feature = "test-utils")), warn(unused_crate_dependencies))]

pub mod challenge;
pub mod errors;
pub mod traits;

mod commitment;
pub use commitment::{Commitment, CommitmentType, MAX_INPUT_SIZE, TX_DATA_VERSION_1};

mod state;
pub use state::{AltDaState, Challenge, ChallengeStatus, TrackedCommitment};

mod manager;
pub use manager::AltDaManager;

mod storage;
pub use storage::InMemoryDaStorage;

mod source;
pub use source::AltDaDataSource;

pub use traits::{AltDaInputFetcher, DaStorage, FinalizedHeadSignal};

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

#[cfg(test)]
mod scenarios;
