//! The data source module.
//!
//! Data sources are data providers for the derivation pipeline. They implement the
//! [DataAvailabilityProvider] trait, yielding the batcher payloads of a given L1 [BlockInfo].
//!
//! [DataAvailabilityProvider]: crate::traits::DataAvailabilityProvider
//! [BlockInfo]: crate::types::BlockInfo

mod ethereum;
pub use ethereum::EthereumDataSource;

mod blobs;
pub use blobs::BlobSource;

mod calldata;
pub use calldata::CalldataSource;
