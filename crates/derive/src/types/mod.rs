//! This module contains all of the types used within the derivation pipeline.

mod block;
pub use block::{BlockInfo, L2BlockInfo};

mod rollup_config;
pub use rollup_config::{AltDaConfig, ChainGenesis, RollupConfig, GRANITE_CHANNEL_TIMEOUT};

mod system_config;
pub use system_config::{SystemConfig, SystemConfigUpdateError, SystemConfigUpdateType};

mod signals;
pub use signals::{ActivationSignal, ResetSignal, Signal};

mod results;
pub use results::{PipelineResult, StepResult};

mod attributes;
pub use attributes::{AttributesWithParent, PayloadAttributes};

mod l1_info;
pub use l1_info::{L1BlockInfoBedrock, L1BlockInfoEcotone, L1BlockInfoTx, L1InfoDecodingError};

mod deposits;
pub use deposits::{
    decode_deposit, encode_deposit, DepositError, DepositEvent, DepositSourceDomain,
    DepositSourceDomainIdentifier, L1InfoDepositSource, UpgradeDepositSource, UserDepositSource,
};

mod transaction;
pub use transaction::{L1Transaction, BLOB_TX_TYPE};

mod frame;
pub use frame::{ChannelId, Frame, FrameDecodingError};

mod channel;
pub use channel::{Channel, ChannelError};

mod blob;
pub use blob::{
    BlobData, BlobSidecar, IndexedBlobHash, BLOB_ENCODING_ROUNDS, BLOB_ENCODING_VERSION,
    BLOB_MAX_DATA_SIZE,
};
