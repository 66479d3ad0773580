//! This module contains the [SystemConfig] type.

use crate::params::{CONFIG_UPDATE_EVENT_VERSION_0, CONFIG_UPDATE_TOPIC};
use alloy_consensus::Receipt;
use alloy_primitives::{Address, Log, U256};
use alloy_sol_types::{sol, SolType};

use super::RollupConfig;

/// Optimism system config contract values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct SystemConfig {
    /// Batcher address
    #[cfg_attr(feature = "serde", serde(rename = "batcherAddr"))]
    pub batcher_address: Address,
    /// Fee overhead value
    pub overhead: U256,
    /// Fee scalar value
    pub scalar: U256,
    /// Gas limit value
    pub gas_limit: u64,
    /// Base fee scalar value
    #[cfg_attr(feature = "serde", serde(default))]
    pub base_fee_scalar: Option<u64>,
    /// Blob base fee scalar value
    #[cfg_attr(feature = "serde", serde(default))]
    pub blob_base_fee_scalar: Option<u64>,
    /// EIP-1559 denominator
    #[cfg_attr(feature = "serde", serde(default))]
    pub eip1559_denominator: Option<u32>,
    /// EIP-1559 elasticity
    #[cfg_attr(feature = "serde", serde(default))]
    pub eip1559_elasticity: Option<u32>,
}

/// Represents type of update to the system config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum SystemConfigUpdateType {
    /// Batcher update type
    Batcher = 0,
    /// Gas config update type
    GasConfig = 1,
    /// Gas limit update type
    GasLimit = 2,
    /// Unsafe block signer update type
    UnsafeBlockSigner = 3,
    /// EIP-1559 parameters update type
    Eip1559 = 4,
}

impl TryFrom<u64> for SystemConfigUpdateType {
    type Error = SystemConfigUpdateError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Batcher),
            1 => Ok(Self::GasConfig),
            2 => Ok(Self::GasLimit),
            3 => Ok(Self::UnsafeBlockSigner),
            4 => Ok(Self::Eip1559),
            _ => Err(SystemConfigUpdateError::InvalidUpdateType(value)),
        }
    }
}

/// An error applying a `ConfigUpdate` log to the [SystemConfig].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SystemConfigUpdateError {
    /// The log does not carry the three expected topics.
    #[error("Invalid config update log: expected 3 topics, got {0}")]
    InvalidTopicCount(usize),
    /// The log has an unsupported version.
    #[error("Invalid config update log: unsupported version {0}")]
    UnsupportedVersion(U256),
    /// The update type is not known.
    #[error("Invalid config update log: unknown update type {0}")]
    InvalidUpdateType(u64),
    /// The log body has the wrong length.
    #[error("Invalid config update log: invalid data length {0}")]
    InvalidDataLength(usize),
    /// The ABI pointer of the log body is not 32.
    #[error("Invalid config update log: invalid data pointer")]
    InvalidDataPointer,
    /// The ABI length of the log body does not match the update type.
    #[error("Invalid config update log: invalid payload length")]
    InvalidPayloadLength,
    /// A value in the log body could not be ABI decoded.
    #[error("Invalid config update log: failed to decode {0}")]
    Decode(&'static str),
}

impl SystemConfig {
    /// Filters all L1 receipts to find config updates and applies the config updates.
    ///
    /// Receipts of failed transactions are skipped. `l1_time` selects the gas config rules: once
    /// Ecotone is active at the L1 timestamp the scalar is stored in its versioned encoding.
    pub fn update_with_receipts(
        &mut self,
        receipts: &[Receipt],
        rollup_config: &RollupConfig,
        l1_time: u64,
    ) -> Result<(), SystemConfigUpdateError> {
        for receipt in receipts {
            if !receipt.status.coerce_status() {
                continue;
            }

            receipt.logs.iter().try_for_each(|log| {
                let topics = log.topics();
                if log.address == rollup_config.l1_system_config_address &&
                    !topics.is_empty() &&
                    topics[0] == CONFIG_UPDATE_TOPIC
                {
                    self.process_config_update_log(log, rollup_config, l1_time)?;
                }
                Ok::<(), SystemConfigUpdateError>(())
            })?;
        }
        Ok(())
    }

    /// Returns the EIP-1559 parameters as the 8 byte `denominator || elasticity` encoding used in
    /// payload attributes, if both are set.
    pub fn eip_1559_params(&self) -> Option<alloy_primitives::B64> {
        let denominator = self.eip1559_denominator?;
        let elasticity = self.eip1559_elasticity?;
        let mut params = [0u8; 8];
        params[..4].copy_from_slice(&denominator.to_be_bytes());
        params[4..].copy_from_slice(&elasticity.to_be_bytes());
        Some(params.into())
    }

    /// Decodes an EVM log entry emitted by the system config contract and applies it as a
    /// [SystemConfig] change.
    ///
    /// Parse log data for:
    ///
    /// ```text
    /// event ConfigUpdate(
    ///    uint256 indexed version,
    ///    UpdateType indexed updateType,
    ///    bytes data
    /// );
    /// ```
    fn process_config_update_log(
        &mut self,
        log: &Log,
        rollup_config: &RollupConfig,
        l1_time: u64,
    ) -> Result<(), SystemConfigUpdateError> {
        let topics = log.topics();
        if topics.len() != 3 {
            return Err(SystemConfigUpdateError::InvalidTopicCount(topics.len()));
        }

        let version = topics[1];
        if version != CONFIG_UPDATE_EVENT_VERSION_0 {
            return Err(SystemConfigUpdateError::UnsupportedVersion(U256::from_be_bytes(version.0)));
        }

        let update_type = <sol!(uint64)>::abi_decode(topics[2].as_slice(), true)
            .map_err(|_| SystemConfigUpdateError::Decode("update type"))?;
        let log_data = log.data.data.as_ref();

        match SystemConfigUpdateType::try_from(update_type)? {
            SystemConfigUpdateType::Batcher => {
                let body = Self::checked_body(log_data, 96, 32)?;
                let batcher_address = <sol!(address)>::abi_decode(body, true)
                    .map_err(|_| SystemConfigUpdateError::Decode("batcher address"))?;
                self.batcher_address = batcher_address;
            }
            SystemConfigUpdateType::GasConfig => {
                let body = Self::checked_body(log_data, 128, 64)?;
                let overhead = <sol!(uint256)>::abi_decode(&body[..32], true)
                    .map_err(|_| SystemConfigUpdateError::Decode("overhead"))?;
                let scalar = <sol!(uint256)>::abi_decode(&body[32..], true)
                    .map_err(|_| SystemConfigUpdateError::Decode("scalar"))?;

                if rollup_config.is_ecotone_active(l1_time) {
                    let encoded: [u8; 32] = scalar.to_be_bytes();
                    if RollupConfig::check_ecotone_l1_system_config_scalar(encoded).is_err() {
                        // Invalid scalars are ignored, the previous values are retained.
                        return Ok(());
                    }

                    let (blob_base_fee_scalar, base_fee_scalar) = match encoded[0] {
                        0 => (0, u32::from_be_bytes([encoded[28], encoded[29], encoded[30], encoded[31]])),
                        _ => (
                            u32::from_be_bytes([encoded[24], encoded[25], encoded[26], encoded[27]]),
                            u32::from_be_bytes([encoded[28], encoded[29], encoded[30], encoded[31]]),
                        ),
                    };
                    self.scalar = scalar;
                    self.overhead = U256::ZERO;
                    self.base_fee_scalar = Some(base_fee_scalar as u64);
                    self.blob_base_fee_scalar = Some(blob_base_fee_scalar as u64);
                } else {
                    self.scalar = scalar;
                    self.overhead = overhead;
                }
            }
            SystemConfigUpdateType::GasLimit => {
                let body = Self::checked_body(log_data, 96, 32)?;
                let gas_limit = <sol!(uint64)>::abi_decode(body, true)
                    .map_err(|_| SystemConfigUpdateError::Decode("gas limit"))?;
                self.gas_limit = gas_limit;
            }
            SystemConfigUpdateType::UnsafeBlockSigner => {
                // Ignored in derivation
            }
            SystemConfigUpdateType::Eip1559 => {
                let body = Self::checked_body(log_data, 96, 32)?;
                let params = <sol!(uint64)>::abi_decode(body, true)
                    .map_err(|_| SystemConfigUpdateError::Decode("eip-1559 params"))?;
                self.eip1559_denominator = Some((params >> 32) as u32);
                self.eip1559_elasticity = Some(params as u32);
            }
        }

        Ok(())
    }

    /// Validates the `(pointer, length)` ABI header of a `bytes` log body and returns the payload.
    fn checked_body(
        data: &[u8],
        total_len: usize,
        payload_len: u64,
    ) -> Result<&[u8], SystemConfigUpdateError> {
        if data.len() != total_len {
            return Err(SystemConfigUpdateError::InvalidDataLength(data.len()));
        }
        let pointer = <sol!(uint64)>::abi_decode(&data[0..32], true)
            .map_err(|_| SystemConfigUpdateError::InvalidDataPointer)?;
        if pointer != 32 {
            return Err(SystemConfigUpdateError::InvalidDataPointer);
        }
        let length = <sol!(uint64)>::abi_decode(&data[32..64], true)
            .map_err(|_| SystemConfigUpdateError::InvalidPayloadLength)?;
        if length != payload_len {
            return Err(SystemConfigUpdateError::InvalidPayloadLength);
        }
        Ok(&data[64..])
    }
}
