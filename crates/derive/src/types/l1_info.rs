//! This module contains the [L1BlockInfoTx] type, and various encoding / decoding methods for it.

use super::{
    encode_deposit, DepositSourceDomain, L1InfoDepositSource, RollupConfig, SystemConfig,
};
use crate::params::{
    BEDROCK_SYSTEM_TX_GAS, DEPOSIT_TX_TYPE, L1_BLOCK_ADDRESS, L1_INFO_DEPOSITOR_ADDRESS,
    REGOLITH_SYSTEM_TX_GAS,
};
use alloy_consensus::Header;
use alloy_eips::BlockNumHash;
use alloy_primitives::{Address, Bytes, TxKind, B256, U256};
use alloy_rlp::Decodable;
use op_alloy_consensus::TxDeposit;

/// The version byte of an Ecotone encoded L1 fee scalar.
const L1_SCALAR_ECOTONE: u8 = 1;
/// The length of an L1 info transaction in Bedrock.
const L1_INFO_TX_LEN_BEDROCK: usize = 4 + 32 * 8;
/// The length of an L1 info transaction in Ecotone.
const L1_INFO_TX_LEN_ECOTONE: usize = 4 + 32 * 5;
/// `keccak256("setL1BlockValues(uint64,uint64,uint256,bytes32,uint64,bytes32,uint256,uint256)")[:4]`
const L1_INFO_TX_SELECTOR_BEDROCK: [u8; 4] = [0x01, 0x5d, 0x8e, 0xb9];
/// `keccak256("setL1BlockValuesEcotone()")[:4]`
const L1_INFO_TX_SELECTOR_ECOTONE: [u8; 4] = [0x44, 0x0a, 0x5e, 0x20];

/// An error decoding L1 info calldata.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum L1InfoDecodingError {
    /// The calldata has the wrong length for its selector.
    #[error("Invalid calldata length {0} for L1 info transaction")]
    InvalidLength(usize),
    /// The selector is unknown.
    #[error("Invalid L1 info transaction selector")]
    InvalidSelector,
    /// The transaction is not an RLP encoded deposit.
    #[error("Invalid L1 info deposit envelope")]
    InvalidDeposit,
}

/// The L1 block information transaction: the first transaction of every L2 block.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum L1BlockInfoTx {
    /// A Bedrock L1 info transaction
    Bedrock(L1BlockInfoBedrock),
    /// An Ecotone L1 info transaction
    Ecotone(L1BlockInfoEcotone),
}

/// Represents the fields within a Bedrock L1 block info transaction.
///
/// Bedrock Binary Format
// +---------+--------------------------+
// | Bytes   | Field                    |
// +---------+--------------------------+
// | 4       | Function signature       |
// | 32      | Number                   |
// | 32      | Time                     |
// | 32      | BaseFee                  |
// | 32      | BlockHash                |
// | 32      | SequenceNumber           |
// | 32      | BatcherHash              |
// | 32      | L1FeeOverhead            |
// | 32      | L1FeeScalar              |
// +---------+--------------------------+
#[derive(Debug, Clone, Hash, Eq, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct L1BlockInfoBedrock {
    /// The current L1 origin block number
    pub number: u64,
    /// The current L1 origin block's timestamp
    pub time: u64,
    /// The current L1 origin block's basefee
    pub base_fee: u64,
    /// The current L1 origin block's hash
    pub block_hash: B256,
    /// The current sequence number
    pub sequence_number: u64,
    /// The address of the batch submitter
    pub batcher_address: Address,
    /// The fee overhead for L1 data
    pub l1_fee_overhead: U256,
    /// The fee scalar for L1 data
    pub l1_fee_scalar: U256,
}

/// Represents the fields within an Ecotone L1 block info transaction.
///
/// Ecotone Binary Format
/// +---------+--------------------------+
/// | Bytes   | Field                    |
/// +---------+--------------------------+
/// | 4       | Function signature       |
/// | 4       | BaseFeeScalar            |
/// | 4       | BlobBaseFeeScalar        |
/// | 8       | SequenceNumber           |
/// | 8       | Timestamp                |
/// | 8       | L1BlockNumber            |
/// | 32      | BaseFee                  |
/// | 32      | BlobBaseFee              |
/// | 32      | BlockHash                |
/// | 32      | BatcherHash              |
/// +---------+--------------------------+
#[derive(Debug, Clone, Hash, Eq, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct L1BlockInfoEcotone {
    /// The current L1 origin block number
    pub number: u64,
    /// The current L1 origin block's timestamp
    pub time: u64,
    /// The current L1 origin block's basefee
    pub base_fee: u64,
    /// The current L1 origin block's hash
    pub block_hash: B256,
    /// The current sequence number
    pub sequence_number: u64,
    /// The address of the batch submitter
    pub batcher_address: Address,
    /// The current blob base fee on L1
    pub blob_base_fee: u128,
    /// The fee scalar for L1 blobspace data
    pub blob_base_fee_scalar: u32,
    /// The fee scalar for L1 data
    pub base_fee_scalar: u32,
}

impl L1BlockInfoTx {
    /// Creates a new [L1BlockInfoTx] from the given information.
    ///
    /// `l1_hash` is the hash of `l1_header`, as known to the caller from the epoch.
    pub fn try_new(
        rollup_config: &RollupConfig,
        system_config: &SystemConfig,
        sequence_number: u64,
        l1_header: &Header,
        l1_hash: B256,
        l2_block_time: u64,
    ) -> Self {
        // In the first block of Ecotone, the L1Block contract has not been upgraded yet due to the
        // upgrade transactions being placed after the L1 info transaction. Because of this,
        // for the first block of Ecotone, we send a Bedrock style L1 block info transaction
        if rollup_config.is_ecotone_active(l2_block_time) &&
            !rollup_config.is_first_ecotone_block(l2_block_time)
        {
            let scalar = system_config.scalar.to_be_bytes::<32>();
            let blob_base_fee_scalar = if scalar[0] == L1_SCALAR_ECOTONE {
                u32::from_be_bytes([scalar[24], scalar[25], scalar[26], scalar[27]])
            } else {
                0
            };
            let base_fee_scalar = u32::from_be_bytes([scalar[28], scalar[29], scalar[30], scalar[31]]);
            Self::Ecotone(L1BlockInfoEcotone {
                number: l1_header.number,
                time: l1_header.timestamp,
                base_fee: l1_header.base_fee_per_gas.unwrap_or(0) as u64,
                block_hash: l1_hash,
                sequence_number,
                batcher_address: system_config.batcher_address,
                blob_base_fee: l1_header.blob_fee().unwrap_or(1),
                blob_base_fee_scalar,
                base_fee_scalar,
            })
        } else {
            Self::Bedrock(L1BlockInfoBedrock {
                number: l1_header.number,
                time: l1_header.timestamp,
                base_fee: l1_header.base_fee_per_gas.unwrap_or(0) as u64,
                block_hash: l1_hash,
                sequence_number,
                batcher_address: system_config.batcher_address,
                l1_fee_overhead: system_config.overhead,
                l1_fee_scalar: system_config.scalar,
            })
        }
    }

    /// Creates a new [L1BlockInfoTx] and returns it together with its EIP-2718 encoded deposit
    /// transaction.
    pub fn try_new_with_deposit_tx(
        rollup_config: &RollupConfig,
        system_config: &SystemConfig,
        sequence_number: u64,
        l1_header: &Header,
        l1_hash: B256,
        l2_block_time: u64,
    ) -> (Self, Bytes) {
        let l1_info = Self::try_new(
            rollup_config,
            system_config,
            sequence_number,
            l1_header,
            l1_hash,
            l2_block_time,
        );

        let source = DepositSourceDomain::L1Info(L1InfoDepositSource {
            l1_block_hash: l1_hash,
            seq_number: sequence_number,
        });

        let mut deposit_tx = TxDeposit {
            source_hash: source.source_hash(),
            from: L1_INFO_DEPOSITOR_ADDRESS,
            to: TxKind::Call(L1_BLOCK_ADDRESS),
            mint: None,
            value: U256::ZERO,
            gas_limit: BEDROCK_SYSTEM_TX_GAS,
            is_system_transaction: true,
            input: l1_info.encode_calldata(),
        };

        // With the regolith hardfork, system transactions were deprecated, and we allocate
        // a constant amount of gas for special transactions like L1 block info.
        if rollup_config.is_regolith_active(l2_block_time) {
            deposit_tx.is_system_transaction = false;
            deposit_tx.gas_limit = REGOLITH_SYSTEM_TX_GAS;
        }

        (l1_info, encode_deposit(&deposit_tx))
    }

    /// Decodes the [L1BlockInfoTx] from its calldata.
    pub fn decode_calldata(r: &[u8]) -> Result<Self, L1InfoDecodingError> {
        if r.len() < 4 {
            return Err(L1InfoDecodingError::InvalidLength(r.len()));
        }
        match [r[0], r[1], r[2], r[3]] {
            L1_INFO_TX_SELECTOR_BEDROCK => {
                L1BlockInfoBedrock::decode_calldata(r).map(Self::Bedrock)
            }
            L1_INFO_TX_SELECTOR_ECOTONE => {
                L1BlockInfoEcotone::decode_calldata(r).map(Self::Ecotone)
            }
            _ => Err(L1InfoDecodingError::InvalidSelector),
        }
    }

    /// Decodes the [L1BlockInfoTx] from the EIP-2718 encoded deposit transaction that opens
    /// every L2 block.
    pub fn decode_deposit_tx(tx: &[u8]) -> Result<Self, L1InfoDecodingError> {
        let Some((&DEPOSIT_TX_TYPE, mut body)) = tx.split_first() else {
            return Err(L1InfoDecodingError::InvalidDeposit);
        };
        let deposit =
            TxDeposit::decode(&mut body).map_err(|_| L1InfoDecodingError::InvalidDeposit)?;
        Self::decode_calldata(&deposit.input)
    }

    /// Encodes the [L1BlockInfoTx] object into Ethereum transaction calldata.
    pub fn encode_calldata(&self) -> Bytes {
        match self {
            Self::Bedrock(bedrock_tx) => bedrock_tx.encode_calldata(),
            Self::Ecotone(ecotone_tx) => ecotone_tx.encode_calldata(),
        }
    }

    /// Returns the L1 [BlockNumHash] for the info transaction.
    pub const fn id(&self) -> BlockNumHash {
        match self {
            Self::Ecotone(L1BlockInfoEcotone { number, block_hash, .. }) |
            Self::Bedrock(L1BlockInfoBedrock { number, block_hash, .. }) => {
                BlockNumHash { number: *number, hash: *block_hash }
            }
        }
    }

    /// Returns the batcher address for the info transaction
    pub const fn batcher_address(&self) -> Address {
        match self {
            Self::Bedrock(L1BlockInfoBedrock { batcher_address, .. }) |
            Self::Ecotone(L1BlockInfoEcotone { batcher_address, .. }) => *batcher_address,
        }
    }

    /// Returns the sequence number for the info transaction
    pub const fn sequence_number(&self) -> u64 {
        match self {
            Self::Bedrock(L1BlockInfoBedrock { sequence_number, .. }) |
            Self::Ecotone(L1BlockInfoEcotone { sequence_number, .. }) => *sequence_number,
        }
    }

    /// Recovers the [SystemConfig] an L2 block was built with from its info transaction.
    ///
    /// The gas limit is not part of the info transaction and is taken from the block. Ecotone
    /// scalars are packed back into a version 1 scalar word.
    pub fn system_config(&self, gas_limit: u64) -> SystemConfig {
        match self {
            Self::Bedrock(info) => SystemConfig {
                batcher_address: info.batcher_address,
                overhead: info.l1_fee_overhead,
                scalar: info.l1_fee_scalar,
                gas_limit,
                ..Default::default()
            },
            Self::Ecotone(info) => {
                let mut scalar = [0u8; 32];
                scalar[0] = L1_SCALAR_ECOTONE;
                scalar[24..28].copy_from_slice(&info.blob_base_fee_scalar.to_be_bytes());
                scalar[28..32].copy_from_slice(&info.base_fee_scalar.to_be_bytes());
                SystemConfig {
                    batcher_address: info.batcher_address,
                    overhead: U256::ZERO,
                    scalar: U256::from_be_bytes(scalar),
                    gas_limit,
                    base_fee_scalar: Some(info.base_fee_scalar as u64),
                    blob_base_fee_scalar: Some(info.blob_base_fee_scalar as u64),
                    ..Default::default()
                }
            }
        }
    }
}

/// Reads the big-endian `u64` stored in the last 8 bytes of a 32 byte word ending at `end`.
fn word_u64(r: &[u8], end: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&r[end - 8..end]);
    u64::from_be_bytes(buf)
}

impl L1BlockInfoBedrock {
    /// Encodes the [L1BlockInfoBedrock] object into Ethereum transaction calldata.
    pub fn encode_calldata(&self) -> Bytes {
        let mut buf = Vec::with_capacity(L1_INFO_TX_LEN_BEDROCK);
        buf.extend_from_slice(L1_INFO_TX_SELECTOR_BEDROCK.as_ref());
        buf.extend_from_slice(U256::from(self.number).to_be_bytes::<32>().as_slice());
        buf.extend_from_slice(U256::from(self.time).to_be_bytes::<32>().as_slice());
        buf.extend_from_slice(U256::from(self.base_fee).to_be_bytes::<32>().as_slice());
        buf.extend_from_slice(self.block_hash.as_slice());
        buf.extend_from_slice(U256::from(self.sequence_number).to_be_bytes::<32>().as_slice());
        buf.extend_from_slice(self.batcher_address.into_word().as_slice());
        buf.extend_from_slice(self.l1_fee_overhead.to_be_bytes::<32>().as_slice());
        buf.extend_from_slice(self.l1_fee_scalar.to_be_bytes::<32>().as_slice());
        buf.into()
    }

    /// Decodes the [L1BlockInfoBedrock] object from ethereum transaction calldata.
    pub fn decode_calldata(r: &[u8]) -> Result<Self, L1InfoDecodingError> {
        if r.len() != L1_INFO_TX_LEN_BEDROCK {
            return Err(L1InfoDecodingError::InvalidLength(r.len()));
        }

        Ok(Self {
            number: word_u64(r, 36),
            time: word_u64(r, 68),
            base_fee: word_u64(r, 100),
            block_hash: B256::from_slice(&r[100..132]),
            sequence_number: word_u64(r, 164),
            batcher_address: Address::from_slice(&r[176..196]),
            l1_fee_overhead: U256::from_be_slice(&r[196..228]),
            l1_fee_scalar: U256::from_be_slice(&r[228..260]),
        })
    }
}

impl L1BlockInfoEcotone {
    /// Encodes the [L1BlockInfoEcotone] object into Ethereum transaction calldata.
    pub fn encode_calldata(&self) -> Bytes {
        let mut buf = Vec::with_capacity(L1_INFO_TX_LEN_ECOTONE);
        buf.extend_from_slice(L1_INFO_TX_SELECTOR_ECOTONE.as_ref());
        buf.extend_from_slice(self.base_fee_scalar.to_be_bytes().as_ref());
        buf.extend_from_slice(self.blob_base_fee_scalar.to_be_bytes().as_ref());
        buf.extend_from_slice(self.sequence_number.to_be_bytes().as_ref());
        buf.extend_from_slice(self.time.to_be_bytes().as_ref());
        buf.extend_from_slice(self.number.to_be_bytes().as_ref());
        buf.extend_from_slice(U256::from(self.base_fee).to_be_bytes::<32>().as_ref());
        buf.extend_from_slice(U256::from(self.blob_base_fee).to_be_bytes::<32>().as_ref());
        buf.extend_from_slice(self.block_hash.as_ref());
        buf.extend_from_slice(self.batcher_address.into_word().as_ref());
        buf.into()
    }

    /// Decodes the [L1BlockInfoEcotone] object from ethereum transaction calldata.
    pub fn decode_calldata(r: &[u8]) -> Result<Self, L1InfoDecodingError> {
        if r.len() != L1_INFO_TX_LEN_ECOTONE {
            return Err(L1InfoDecodingError::InvalidLength(r.len()));
        }

        let base_fee_scalar = u32::from_be_bytes([r[4], r[5], r[6], r[7]]);
        let blob_base_fee_scalar = u32::from_be_bytes([r[8], r[9], r[10], r[11]]);
        let mut blob_base_fee = [0u8; 16];
        blob_base_fee.copy_from_slice(&r[84..100]);

        Ok(Self {
            number: word_u64(r, 36),
            time: word_u64(r, 28),
            base_fee: word_u64(r, 68),
            block_hash: B256::from_slice(&r[100..132]),
            sequence_number: word_u64(r, 20),
            batcher_address: Address::from_slice(&r[144..164]),
            blob_base_fee: u128::from_be_bytes(blob_base_fee),
            blob_base_fee_scalar,
            base_fee_scalar,
        })
    }
}
