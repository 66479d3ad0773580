//! Protocol constants shared by the derivation stages.

use alloy_primitives::{address, b256, Address, B256};

/// The sequencer fee vault address; the suggested fee recipient of every derived block.
pub const SEQUENCER_FEE_VAULT_ADDRESS: Address =
    address!("4200000000000000000000000000000000000011");

/// The L1 block attributes predeploy on L2.
pub const L1_BLOCK_ADDRESS: Address = address!("4200000000000000000000000000000000000015");

/// The depositor account of the L1 info transaction.
pub const L1_INFO_DEPOSITOR_ADDRESS: Address =
    address!("deaddeaddeaddeaddeaddeaddeaddeaddead0001");

/// The EIP-2718 type of a deposit transaction.
pub const DEPOSIT_TX_TYPE: u8 = 0x7E;

/// Gas allotted to system deposits after Regolith.
pub const REGOLITH_SYSTEM_TX_GAS: u64 = 1_000_000;

/// Gas allotted to the L1 info deposit before Regolith.
pub const BEDROCK_SYSTEM_TX_GAS: u64 = 150_000_000;

/// The only supported derivation version byte of batcher transaction payloads.
pub const DERIVATION_VERSION_0: u8 = 0;

/// The length of a channel id.
pub const CHANNEL_ID_LENGTH: usize = 16;

/// The maximum size of a single frame's data.
pub const MAX_FRAME_LEN: usize = 1_000_000;

/// Fixed per-frame overhead used when accounting for channel sizes.
pub const FRAME_OVERHEAD: usize = 200;

/// The maximum aggregate size of all channels held by the channel bank.
pub const MAX_CHANNEL_BANK_SIZE: usize = 100_000_000;

/// The maximum size of a decompressed channel body before Fjord.
pub const MAX_RLP_BYTES_PER_CHANNEL_BEDROCK: u64 = 10_000_000;

/// The maximum size of a decompressed channel body after Fjord.
pub const MAX_RLP_BYTES_PER_CHANNEL_FJORD: u64 = 100_000_000;

/// The maximum sequencer drift after Fjord, in seconds.
pub const MAX_SEQUENCER_DRIFT_FJORD: u64 = 1800;

/// Upper bound on the element count and the byte size of any single span batch field.
pub const MAX_SPAN_BATCH_ELEMENT_COUNT: u64 = 10_000_000;

/// Channel versions: the first byte of a decompressed channel body selects its codec.
pub const ZLIB_DEFLATE_COMPRESSION_METHOD: u8 = 8;

/// Reserved zlib compression method.
pub const ZLIB_RESERVED_COMPRESSION_METHOD: u8 = 15;

/// Brotli channel version byte, valid after Fjord.
pub const CHANNEL_VERSION_BROTLI: u8 = 1;

/// `keccak256("TransactionDeposited(address,address,uint256,bytes)")`
pub const DEPOSIT_EVENT_ABI_HASH: B256 =
    b256!("b3813568d9991fc951961fcb4c784893574240a28925604d09fc577c55bb7c32");

/// The only accepted deposit event version.
pub const DEPOSIT_EVENT_VERSION_0: B256 = B256::ZERO;

/// `keccak256("ConfigUpdate(uint256,uint8,bytes)")`
pub const CONFIG_UPDATE_TOPIC: B256 =
    b256!("1d2b0bda21d56b8bd12d4f94ebacffdfb35f5e226f84b461103bb8beab6353be");

/// The only accepted config update event version.
pub const CONFIG_UPDATE_EVENT_VERSION_0: B256 = B256::ZERO;
