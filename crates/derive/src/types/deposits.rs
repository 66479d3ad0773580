//! Contains deposit transaction types and helper methods.

use crate::params::{DEPOSIT_EVENT_ABI_HASH, DEPOSIT_EVENT_VERSION_0, DEPOSIT_TX_TYPE};
use alloy_primitives::{keccak256, Address, Bytes, Log, LogData, TxKind, B256, U256};
use alloy_rlp::Encodable;
use op_alloy_consensus::TxDeposit;

/// Minimum length of version 0 opaque data: mint, value, gas and the creation flag.
const OPAQUE_DATA_MIN_LEN: usize = 32 + 32 + 8 + 1;

/// An error decoding a deposit log.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DepositError {
    /// Unexpected number of deposit event log topics.
    #[error("Unexpected number of deposit event log topics: {0}")]
    UnexpectedTopicsLen(usize),
    /// Invalid deposit event selector.
    #[error("Invalid deposit event selector: {1}, expected {0}")]
    InvalidSelector(B256, B256),
    /// Incomplete opaqueData slice header (incomplete length).
    #[error("Incomplete opaqueData slice header (incomplete length): {0}")]
    IncompleteOpaqueData(usize),
    /// The log data is not aligned to 32 bytes.
    #[error("Unaligned log data, expected multiple of 32 bytes, got: {0}")]
    UnalignedData(usize),
    /// The opaque data offset is not 32.
    #[error("Invalid opaque data content offset: {0}")]
    InvalidOpaqueDataOffset(Bytes),
    /// The opaque data length word does not fit a u64.
    #[error("Invalid opaque data content length: {0}")]
    InvalidOpaqueDataLength(Bytes),
    /// The opaque data length exceeds the log data length.
    #[error("Specified opaque data length {0} exceeds the deposit log event data length {1}")]
    OpaqueDataOverflow(usize, usize),
    /// The opaque data padding exceeds 31 bytes.
    #[error("Opaque data with padding exceeds the specified data length: {0} > {1}")]
    PaddedOpaqueDataOverflow(usize, usize),
    /// Only version 0 deposits are supported.
    #[error("Invalid deposit version: {0}")]
    InvalidVersion(B256),
    /// The opaque data is too short for a version 0 deposit.
    #[error("Unexpected opaque data length: {0}")]
    UnexpectedOpaqueDataLen(usize),
    /// The mint value does not fit a u128.
    #[error("Failed to decode the u128 deposit mint value: {0}")]
    MintDecode(Bytes),
}

/// Source domain identifiers for deposit transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u64)]
pub enum DepositSourceDomainIdentifier {
    /// A user deposit source.
    User = 0,
    /// A L1 info deposit source.
    L1Info = 1,
    /// An upgrade deposit source.
    Upgrade = 2,
}

/// Source domains for deposit transactions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DepositSourceDomain {
    /// A user deposit source.
    User(UserDepositSource),
    /// A L1 info deposit source.
    L1Info(L1InfoDepositSource),
    /// An upgrade deposit source.
    Upgrade(UpgradeDepositSource),
}

impl DepositSourceDomain {
    /// Returns the source hash.
    pub fn source_hash(&self) -> B256 {
        match self {
            Self::User(ds) => ds.source_hash(),
            Self::L1Info(ds) => ds.source_hash(),
            Self::Upgrade(ds) => ds.source_hash(),
        }
    }
}

/// `keccak256(left_pad_u64(domain) || inner)`
fn domain_hash(domain: DepositSourceDomainIdentifier, inner: B256) -> B256 {
    let mut domain_input = [0u8; 32 * 2];
    domain_input[24..32].copy_from_slice(&(domain as u64).to_be_bytes());
    domain_input[32..].copy_from_slice(inner.as_slice());
    keccak256(domain_input)
}

/// `keccak256(block_hash || left_pad_u64(index))`
fn block_index_hash(block_hash: B256, index: u64) -> B256 {
    let mut input = [0u8; 32 * 2];
    input[..32].copy_from_slice(block_hash.as_slice());
    input[56..].copy_from_slice(&index.to_be_bytes());
    keccak256(input)
}

/// A deposit transaction source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserDepositSource {
    /// The L1 block hash.
    pub l1_block_hash: B256,
    /// The log index.
    pub log_index: u64,
}

impl UserDepositSource {
    /// Creates a new [UserDepositSource].
    pub const fn new(l1_block_hash: B256, log_index: u64) -> Self {
        Self { l1_block_hash, log_index }
    }

    /// Returns the source hash.
    pub fn source_hash(&self) -> B256 {
        domain_hash(
            DepositSourceDomainIdentifier::User,
            block_index_hash(self.l1_block_hash, self.log_index),
        )
    }
}

/// A L1 info deposit transaction source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct L1InfoDepositSource {
    /// The L1 block hash.
    pub l1_block_hash: B256,
    /// The sequence number.
    pub seq_number: u64,
}

impl L1InfoDepositSource {
    /// Creates a new [L1InfoDepositSource].
    pub const fn new(l1_block_hash: B256, seq_number: u64) -> Self {
        Self { l1_block_hash, seq_number }
    }

    /// Returns the source hash.
    pub fn source_hash(&self) -> B256 {
        domain_hash(
            DepositSourceDomainIdentifier::L1Info,
            block_index_hash(self.l1_block_hash, self.seq_number),
        )
    }
}

/// An upgrade deposit transaction source.
/// This implements the translation of upgrade-tx identity information to a deposit source-hash,
/// which makes the deposit uniquely identifiable.
/// System-upgrade transactions have their own domain for source-hashes,
/// to not conflict with user-deposits or deposited L1 information.
/// The intent identifies the upgrade-tx uniquely, in a human-readable way.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UpgradeDepositSource {
    /// The intent.
    pub intent: String,
}

impl UpgradeDepositSource {
    /// Creates a new [UpgradeDepositSource].
    pub fn new(intent: impl Into<String>) -> Self {
        Self { intent: intent.into() }
    }

    /// Returns the source hash.
    pub fn source_hash(&self) -> B256 {
        domain_hash(DepositSourceDomainIdentifier::Upgrade, keccak256(self.intent.as_bytes()))
    }
}

/// A `TransactionDeposited` event emitted by the L1 deposit contract.
///
/// ```solidity
/// event TransactionDeposited(address indexed from, address indexed to, uint256 indexed version, bytes opaqueData);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DepositEvent {
    /// The (aliased) L1 sender.
    pub from: Address,
    /// The L2 recipient. Ignored by the deposit transaction when `is_creation` is set.
    pub to: Address,
    /// The ETH minted on L2.
    pub mint: u128,
    /// The value sent to the recipient.
    pub value: U256,
    /// The L2 gas limit.
    pub gas_limit: u64,
    /// Whether the deposit creates a contract.
    pub is_creation: bool,
    /// The call data.
    pub data: Bytes,
}

impl DepositEvent {
    /// Decodes a version 0 `TransactionDeposited` log.
    pub fn from_log(log: &Log) -> Result<Self, DepositError> {
        let topics = log.data.topics();
        if topics.len() != 4 {
            return Err(DepositError::UnexpectedTopicsLen(topics.len()));
        }
        if topics[0] != DEPOSIT_EVENT_ABI_HASH {
            return Err(DepositError::InvalidSelector(DEPOSIT_EVENT_ABI_HASH, topics[0]));
        }
        let data = log.data.data.as_ref();
        if data.len() < 64 {
            return Err(DepositError::IncompleteOpaqueData(data.len()));
        }
        if data.len() % 32 != 0 {
            return Err(DepositError::UnalignedData(data.len()));
        }

        let from = Address::from_slice(&topics[1].as_slice()[12..]);
        let to = Address::from_slice(&topics[2].as_slice()[12..]);
        let version = topics[3];

        // Solidity serializes the event's Data field as follows:
        //
        // ```solidity
        // abi.encode(abi.encodPacked(uint256 mint, uint256 value, uint64 gasLimit, uint8 isCreation, bytes data))
        // ```
        //
        // ------------------------------------------------------------
        // | offset | 256 byte content                                |
        // ------------------------------------------------------------
        // | 0      | [0; 24] . {U64 big endian, hex encoded offset}  |
        // ------------------------------------------------------------
        // | 32     | [0; 24] . {U64 big endian, hex encoded length}  |
        // ------------------------------------------------------------
        let offset = U256::from_be_slice(&data[0..32]);
        if offset != U256::from(32) {
            return Err(DepositError::InvalidOpaqueDataOffset(Bytes::copy_from_slice(
                &data[24..32],
            )));
        }

        let length = U256::from_be_slice(&data[32..64]);
        let opaque_content_len: usize = length.try_into().map_err(|_| {
            DepositError::InvalidOpaqueDataLength(Bytes::copy_from_slice(&data[32..64]))
        })?;
        let available = data.len() - 64;
        if opaque_content_len > available {
            return Err(DepositError::OpaqueDataOverflow(opaque_content_len, available));
        }
        // The opaque data is tightly packed, then padded to 32 bytes by the EVM.
        if available - opaque_content_len >= 32 {
            return Err(DepositError::PaddedOpaqueDataOverflow(available, opaque_content_len));
        }

        if version != DEPOSIT_EVENT_VERSION_0 {
            return Err(DepositError::InvalidVersion(version));
        }

        Self::unmarshal_version0(from, to, &data[64..64 + opaque_content_len])
    }

    /// Unmarshals the version 0 opaque data of a deposit.
    fn unmarshal_version0(from: Address, to: Address, data: &[u8]) -> Result<Self, DepositError> {
        if data.len() < OPAQUE_DATA_MIN_LEN {
            return Err(DepositError::UnexpectedOpaqueDataLen(data.len()));
        }

        // uint256 mint, which must fit a u128.
        if data[..16].iter().any(|b| *b != 0) {
            return Err(DepositError::MintDecode(Bytes::copy_from_slice(&data[..32])));
        }
        let mut raw_mint = [0u8; 16];
        raw_mint.copy_from_slice(&data[16..32]);
        let mint = u128::from_be_bytes(raw_mint);

        let value = U256::from_be_slice(&data[32..64]);

        let mut raw_gas = [0u8; 8];
        raw_gas.copy_from_slice(&data[64..72]);
        let gas_limit = u64::from_be_bytes(raw_gas);

        let is_creation = data[72] != 0;
        let data = Bytes::copy_from_slice(&data[OPAQUE_DATA_MIN_LEN..]);

        Ok(Self { from, to, mint, value, gas_limit, is_creation, data })
    }

    /// Encodes the event as the log the deposit contract at `address` emits.
    pub fn to_log(&self, address: Address) -> Log {
        let mut opaque = Vec::with_capacity(OPAQUE_DATA_MIN_LEN + self.data.len());
        opaque.extend_from_slice(&U256::from(self.mint).to_be_bytes::<32>());
        opaque.extend_from_slice(&self.value.to_be_bytes::<32>());
        opaque.extend_from_slice(&self.gas_limit.to_be_bytes());
        opaque.push(self.is_creation as u8);
        opaque.extend_from_slice(&self.data);

        let padded_len = opaque.len().div_ceil(32) * 32;
        let mut data = Vec::with_capacity(64 + padded_len);
        data.extend_from_slice(&U256::from(32).to_be_bytes::<32>());
        data.extend_from_slice(&U256::from(opaque.len()).to_be_bytes::<32>());
        data.extend_from_slice(&opaque);
        data.resize(64 + padded_len, 0);

        Log {
            address,
            data: LogData::new_unchecked(
                vec![
                    DEPOSIT_EVENT_ABI_HASH,
                    self.from.into_word(),
                    self.to.into_word(),
                    DEPOSIT_EVENT_VERSION_0,
                ],
                data.into(),
            ),
        }
    }

    /// Builds the deposit transaction for this event with the given source hash.
    pub fn into_deposit_tx(self, source_hash: B256) -> TxDeposit {
        TxDeposit {
            source_hash,
            from: self.from,
            to: if self.is_creation { TxKind::Create } else { TxKind::Call(self.to) },
            // Zero mint is represented as none to skip the minting code.
            mint: (self.mint != 0).then_some(self.mint),
            value: self.value,
            gas_limit: self.gas_limit,
            is_system_transaction: false,
            input: self.data,
        }
    }
}

/// Encodes a deposit transaction as its EIP-2718 envelope: `0x7E || rlp(tx)`.
pub fn encode_deposit(tx: &TxDeposit) -> Bytes {
    let mut buf = Vec::with_capacity(1 + tx.length());
    buf.push(DEPOSIT_TX_TYPE);
    tx.encode(&mut buf);
    buf.into()
}

/// Derives the EIP-2718 encoded user deposit transaction from a deposit log emitted in the L1
/// block with hash `block_hash` at log index `index`.
pub fn decode_deposit(block_hash: B256, index: usize, log: &Log) -> Result<Bytes, DepositError> {
    let event = DepositEvent::from_log(log)?;
    let source = UserDepositSource::new(block_hash, index as u64);
    Ok(encode_deposit(&event.into_deposit_tx(source.source_hash())))
}
