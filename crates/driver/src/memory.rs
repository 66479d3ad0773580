//! An in-memory execution engine.

use crate::{
    EngineController, EngineError, ExecutionPayload, ForkchoiceState, L2ChainHeads, SafetyLabel,
};
use alloy_primitives::{keccak256, Bytes, B256, B64};
use async_trait::async_trait;
use hashbrown::HashMap;
use mako_derive::{
    params::DEPOSIT_TX_TYPE,
    traits::L2ChainProvider,
    types::{
        AttributesWithParent, BlockInfo, L1BlockInfoTx, L2BlockInfo, RollupConfig, SystemConfig,
    },
};
use spin::Mutex;
use std::sync::Arc;

/// An execution engine keeping its L2 chain in memory.
///
/// Blocks are not executed: a block is sealed from its transactions, and its hash commits to the
/// parent hash, number, timestamp and transactions. Clones share the same chain, so one clone
/// can drive the engine while another serves the pipeline as its [L2ChainProvider].
#[derive(Debug, Clone)]
pub struct InMemoryEngine {
    state: Arc<Mutex<EngineState>>,
}

#[derive(Debug)]
struct EngineState {
    genesis_number: u64,
    /// Canonical block hashes, indexed by number past genesis.
    canonical: Vec<B256>,
    blocks: HashMap<B256, StoredBlock>,
    heads: L2ChainHeads,
}

#[derive(Debug, Clone)]
struct StoredBlock {
    info: L2BlockInfo,
    transactions: Vec<Bytes>,
    system_config: SystemConfig,
}

impl InMemoryEngine {
    /// Creates an engine holding only the genesis block of the rollup.
    pub fn new(rollup_config: &RollupConfig) -> Self {
        let genesis = &rollup_config.genesis;
        let info = L2BlockInfo {
            block_info: BlockInfo {
                hash: genesis.l2.hash,
                number: genesis.l2.number,
                parent_hash: B256::ZERO,
                timestamp: genesis.l2_time,
            },
            l1_origin: genesis.l1,
            seq_num: 0,
        };
        let block = StoredBlock {
            info,
            transactions: Vec::new(),
            system_config: genesis.system_config.unwrap_or_default(),
        };
        let mut blocks = HashMap::new();
        blocks.insert(genesis.l2.hash, block);
        let state = EngineState {
            genesis_number: genesis.l2.number,
            canonical: vec![genesis.l2.hash],
            blocks,
            heads: L2ChainHeads::new_unified(info),
        };
        Self { state: Arc::new(Mutex::new(state)) }
    }

    /// Returns the heads of the engine.
    pub fn heads(&self) -> L2ChainHeads {
        self.state.lock().heads
    }

    /// Returns the canonical block with the given number.
    pub fn canonical_block(&self, number: u64) -> Option<L2BlockInfo> {
        self.state.lock().canonical(number).map(|b| b.info)
    }

    /// Returns the transactions of the canonical block with the given number.
    pub fn canonical_transactions(&self, number: u64) -> Option<Vec<Bytes>> {
        self.state.lock().canonical(number).map(|b| b.transactions.clone())
    }
}

impl EngineState {
    fn canonical(&self, number: u64) -> Option<&StoredBlock> {
        let index = number.checked_sub(self.genesis_number)?;
        let hash = self.canonical.get(usize::try_from(index).ok()?)?;
        self.blocks.get(hash)
    }

    fn canonical_tip(&self) -> Option<&StoredBlock> {
        self.canonical.last().and_then(|hash| self.blocks.get(hash))
    }

    /// Makes `block` canonical, dropping every canonical block at or above its number.
    fn insert_canonical(&mut self, block: StoredBlock) {
        let index = (block.info.block_info.number - self.genesis_number) as usize;
        self.canonical.truncate(index);
        self.canonical.push(block.info.block_info.hash);
        self.blocks.insert(block.info.block_info.hash, block);
    }

    fn known(&self, hash: B256) -> Result<L2BlockInfo, EngineError> {
        self.blocks.get(&hash).map(|b| b.info).ok_or(EngineError::UnknownHash(hash))
    }
}

/// Rejects transactions that are not EIP-2718 envelopes or legacy RLP lists.
fn validate_transactions(transactions: &[Bytes]) -> Result<(), EngineError> {
    for (i, tx) in transactions.iter().enumerate() {
        match tx.first().copied() {
            Some(0x01..=0x04 | DEPOSIT_TX_TYPE) => {}
            Some(b) if b >= 0xc0 => {}
            _ => return Err(EngineError::InvalidTransaction(i)),
        }
    }
    Ok(())
}

/// Seals a block on top of `parent`, reading its L1 origin and system config from the leading
/// L1 info deposit.
fn seal_block(
    parent: &StoredBlock,
    block_hash: Option<B256>,
    timestamp: u64,
    transactions: Vec<Bytes>,
    gas_limit: Option<u64>,
    eip_1559_params: Option<B64>,
) -> Result<StoredBlock, EngineError> {
    validate_transactions(&transactions)?;
    let info_tx = transactions
        .first()
        .ok_or_else(|| EngineError::InvalidL1Info("empty block".to_string()))?;
    let l1_info = L1BlockInfoTx::decode_deposit_tx(info_tx)
        .map_err(|e| EngineError::InvalidL1Info(e.to_string()))?;

    let number = parent.info.block_info.number + 1;
    let parent_hash = parent.info.block_info.hash;
    let hash = block_hash.unwrap_or_else(|| {
        let mut preimage = Vec::with_capacity(48 + 32 * transactions.len());
        preimage.extend_from_slice(parent_hash.as_slice());
        preimage.extend_from_slice(&number.to_be_bytes());
        preimage.extend_from_slice(&timestamp.to_be_bytes());
        for tx in &transactions {
            preimage.extend_from_slice(keccak256(tx).as_slice());
        }
        keccak256(preimage)
    });

    let mut system_config =
        l1_info.system_config(gas_limit.unwrap_or(parent.system_config.gas_limit));
    match eip_1559_params {
        Some(params) => {
            system_config.eip1559_denominator =
                Some(u32::from_be_bytes([params[0], params[1], params[2], params[3]]));
            system_config.eip1559_elasticity =
                Some(u32::from_be_bytes([params[4], params[5], params[6], params[7]]));
        }
        None => {
            system_config.eip1559_denominator = parent.system_config.eip1559_denominator;
            system_config.eip1559_elasticity = parent.system_config.eip1559_elasticity;
        }
    }

    Ok(StoredBlock {
        info: L2BlockInfo {
            block_info: BlockInfo { hash, number, parent_hash, timestamp },
            l1_origin: l1_info.id(),
            seq_num: l1_info.sequence_number(),
        },
        transactions,
        system_config,
    })
}

#[async_trait]
impl EngineController for InMemoryEngine {
    type Error = EngineError;

    async fn block_by_label(&mut self, label: SafetyLabel) -> Result<L2BlockInfo, Self::Error> {
        Ok(*self.state.lock().heads.head(label))
    }

    async fn block_by_hash(&mut self, hash: B256) -> Result<L2BlockInfo, Self::Error> {
        self.state.lock().known(hash)
    }

    async fn execute_attributes(
        &mut self,
        attributes: &AttributesWithParent,
    ) -> Result<L2BlockInfo, Self::Error> {
        let mut state = self.state.lock();
        let parent_id = attributes.parent.block_info;
        let parent = state.blocks.get(&parent_id.hash).cloned().ok_or(
            EngineError::UnknownParent { number: parent_id.number + 1, parent_hash: parent_id.hash },
        )?;

        let payload = &attributes.attributes;
        if let Some(existing) = state.canonical(parent_id.number + 1) {
            if existing.info.block_info.parent_hash == parent_id.hash &&
                existing.info.block_info.timestamp == payload.timestamp &&
                existing.transactions == payload.transactions
            {
                let info = existing.info;
                debug!(target: "engine", "Consolidated unsafe block #{}", info.block_info.number);
                state.heads.advance_safe(info);
                return Ok(info);
            }
        }

        let block = seal_block(
            &parent,
            None,
            payload.timestamp,
            payload.transactions.clone(),
            payload.gas_limit,
            payload.eip_1559_params,
        )?;
        let info = block.info;
        if state.heads.unsafe_.block_info.number > parent_id.number {
            warn!(
                target: "engine",
                "Derived block #{} replaces the unsafe chain up to #{}",
                info.block_info.number,
                state.heads.unsafe_.block_info.number
            );
        }
        state.insert_canonical(block);
        state.heads.unsafe_ = info;
        state.heads.safe = info;
        Ok(info)
    }

    async fn insert_unsafe_payload(
        &mut self,
        payload: &ExecutionPayload,
    ) -> Result<L2BlockInfo, Self::Error> {
        let mut state = self.state.lock();
        let tip = state
            .canonical_tip()
            .filter(|tip| tip.info.block_info.hash == payload.parent_hash)
            .cloned()
            .ok_or(EngineError::UnknownParent {
                number: payload.block_number,
                parent_hash: payload.parent_hash,
            })?;

        let block = seal_block(
            &tip,
            Some(payload.block_hash),
            payload.timestamp,
            payload.transactions.clone(),
            Some(payload.gas_limit),
            None,
        )?;
        let info = block.info;
        state.insert_canonical(block);
        state.heads.unsafe_ = info;
        Ok(info)
    }

    async fn forkchoice_updated(&mut self, fcs: ForkchoiceState) -> Result<(), Self::Error> {
        let mut state = self.state.lock();
        let heads = L2ChainHeads {
            unsafe_: state.known(fcs.head_block_hash)?,
            safe: state.known(fcs.safe_block_hash)?,
            finalized: state.known(fcs.finalized_block_hash)?,
        };
        state.heads = heads;
        Ok(())
    }
}

#[async_trait]
impl L2ChainProvider for InMemoryEngine {
    type Error = EngineError;

    async fn l2_block_info_by_number(&mut self, number: u64) -> Result<L2BlockInfo, Self::Error> {
        self.canonical_block(number).ok_or(EngineError::BlockNotFound(number))
    }

    async fn transactions_by_number(&mut self, number: u64) -> Result<Vec<Bytes>, Self::Error> {
        self.canonical_transactions(number).ok_or(EngineError::BlockNotFound(number))
    }

    async fn system_config_by_number(
        &mut self,
        number: u64,
        _: Arc<RollupConfig>,
    ) -> Result<SystemConfig, Self::Error> {
        self.state
            .lock()
            .canonical(number)
            .map(|b| b.system_config)
            .ok_or(EngineError::BlockNotFound(number))
    }
}
