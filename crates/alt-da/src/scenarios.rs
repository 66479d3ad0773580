//! End-to-end derivation through the alt-DA data source.

use crate::{
    challenge::ChallengeEvent, AltDaDataSource, AltDaManager, ChallengeStatus, InMemoryDaStorage,
    MAX_INPUT_SIZE,
};
use alloy_consensus::Receipt;
use alloy_eips::BlockNumHash;
use alloy_primitives::{address, Address, Bytes, B256, U256};
use hashbrown::HashMap;
use mako_derive::{
    attributes::StatefulAttributesBuilder,
    batch::{Batch, SingleBatch},
    errors::{PipelineErrorKind, ResetError},
    pipeline::{AttributesQueueStage, DerivationPipeline, PipelineBuilder},
    sources::EthereumDataSource,
    test_utils::{
        batcher_tx, channel_frames, compress_batches, encode_frames, l1_block_hash, l2_block_hash,
        l2_child, step_to_attributes, TestBlobProvider, TestChainProvider, TestL1Chain, TestL2ChainProvider,
    },
    traits::{OriginProvider, Pipeline, SignalReceiver},
    types::{
        AltDaConfig, AttributesWithParent, BlockInfo, ChainGenesis, L2BlockInfo, ResetSignal,
        RollupConfig, StepResult, SystemConfig,
    },
};
use std::sync::Arc;

const BATCHER: Address = address!("b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0");
const INBOX: Address = address!("ff00000000000000000000000000000000000010");
const CHALLENGER: Address = address!("0000000000000000000000000000000000000da0");
const L2_GENESIS_TIME: u64 = 4;
const MAX_STEPS: usize = 4096;

type AltDaPipeline = DerivationPipeline<
    AttributesQueueStage<
        AltDaDataSource<
            TestChainProvider,
            AltDaManager<InMemoryDaStorage>,
            EthereumDataSource<TestChainProvider, TestBlobProvider>,
        >,
        TestChainProvider,
        TestL2ChainProvider,
        StatefulAttributesBuilder<TestChainProvider, TestL2ChainProvider>,
    >,
    TestL2ChainProvider,
>;

fn system_config() -> SystemConfig {
    SystemConfig {
        batcher_address: BATCHER,
        overhead: U256::from(188),
        scalar: U256::from(684_000),
        gas_limit: 30_000_000,
        ..Default::default()
    }
}

fn rollup_config(seq_window_size: u64) -> RollupConfig {
    RollupConfig {
        genesis: ChainGenesis {
            l1: BlockNumHash { number: 1, hash: l1_block_hash(1) },
            l2: BlockNumHash { number: 0, hash: l2_block_hash(0) },
            l2_time: L2_GENESIS_TIME,
            system_config: Some(system_config()),
        },
        block_time: 2,
        max_sequencer_drift: 600,
        seq_window_size,
        channel_timeout: 30,
        granite_channel_timeout: 50,
        l2_chain_id: 10,
        batch_inbox_address: INBOX,
        alt_da: Some(AltDaConfig {
            da_challenge_address: CHALLENGER,
            da_commitment_type: 0,
            da_challenge_window: 20,
            da_resolve_window: 80,
        }),
        ..Default::default()
    }
}

fn genesis_l2_head(l1: &TestL1Chain) -> L2BlockInfo {
    L2BlockInfo {
        block_info: BlockInfo {
            hash: l2_block_hash(0),
            number: 0,
            parent_hash: B256::ZERO,
            timestamp: L2_GENESIS_TIME,
        },
        l1_origin: l1.blocks[0].id(),
        seq_num: 0,
    }
}

fn reset_signal(l1: &TestL1Chain) -> ResetSignal {
    ResetSignal {
        l2_safe_head: genesis_l2_head(l1),
        l1_origin: l1.blocks[0],
        system_config: Some(system_config()),
    }
}

async fn new_pipeline(
    cfg: RollupConfig,
    l1: &TestL1Chain,
    storage: InMemoryDaStorage,
) -> AltDaPipeline {
    let cfg = Arc::new(cfg);
    let configs: HashMap<u64, SystemConfig> = (0..64).map(|n| (n, system_config())).collect();
    let l2 = TestL2ChainProvider::new(vec![genesis_l2_head(l1)], configs);

    let alt_da_config = cfg.alt_da.unwrap_or_default();
    let manager = AltDaManager::new(&alt_da_config, storage).unwrap();
    let calldata = EthereumDataSource::new(l1.provider.clone(), TestBlobProvider::default(), &cfg);
    let dap = AltDaDataSource::new(l1.provider.clone(), manager, calldata);
    let builder = StatefulAttributesBuilder::new(cfg.clone(), l2.clone(), l1.provider.clone());
    let mut pipeline = PipelineBuilder::new()
        .rollup_config(cfg)
        .origin(l1.blocks[0])
        .dap_source(dap)
        .builder(builder)
        .l2_chain_provider(l2)
        .chain_provider(l1.provider.clone())
        .build()
        .expect("complete pipeline");
    pipeline.signal(reset_signal(l1).signal()).await.unwrap();
    pipeline
}

/// Frames of a single channel carrying one batch on top of the L2 block `parent`.
fn batch_frames(parent: u64, epoch: BlockInfo, timestamp: u64, tx: Bytes) -> Bytes {
    let batch = SingleBatch {
        parent_hash: l2_block_hash(parent),
        epoch_num: epoch.number,
        epoch_hash: epoch.hash,
        timestamp,
        transactions: vec![tx],
    };
    let body = compress_batches(&[Batch::Single(batch)]);
    encode_frames(&channel_frames([parent as u8 + 1; 16], &body, 1))
}

/// Steps until the next attributes, an error other than a temporary one, or the step limit.
async fn step_until_error(
    pipeline: &mut AltDaPipeline,
    mut cursor: L2BlockInfo,
) -> (Vec<AttributesWithParent>, PipelineErrorKind) {
    let mut derived = Vec::new();
    for _ in 0..MAX_STEPS {
        match pipeline.step(cursor).await {
            StepResult::PreparedAttributes | StepResult::AttributesInFlight => {
                if let Some(attributes) = pipeline.confirm_received() {
                    cursor = l2_child(&cursor, &attributes.attributes);
                    derived.push(attributes);
                }
            }
            StepResult::AdvancedOrigin => {}
            StepResult::StepFailed(err) if matches!(err, PipelineErrorKind::Temporary(_)) => {}
            StepResult::StepFailed(err) | StepResult::OriginAdvanceErr(err) => {
                return (derived, err)
            }
        }
    }
    panic!("pipeline did not settle within {MAX_STEPS} steps");
}

#[tokio::test]
async fn test_oversize_input_is_skipped() {
    let mut l1 = TestL1Chain::new(1, 2);

    let epoch = BlockInfo { number: 2, hash: l1_block_hash(2), ..Default::default() };
    let mut storage = InMemoryDaStorage::default();
    let oversize = storage.insert(Bytes::from(vec![0xAB; MAX_INPUT_SIZE + 1]));
    let user_tx = Bytes::from_static(&[0x02, 0xDA]);
    let valid = storage.insert(batch_frames(0, epoch, L2_GENESIS_TIME + 2, user_tx.clone()));
    l1.push(
        4,
        vec![
            batcher_tx(BATCHER, INBOX, oversize.tx_data()),
            batcher_tx(BATCHER, INBOX, valid.tx_data()),
        ],
        vec![],
    );

    let mut pipeline = new_pipeline(rollup_config(10), &l1, storage).await;
    let (derived, err) = step_until_error(&mut pipeline, genesis_l2_head(&l1)).await;

    assert!(err.is_eof(), "unexpected error: {err}");
    assert_eq!(derived.len(), 1);
    assert_eq!(derived[0].attributes.transactions.len(), 2);
    assert_eq!(derived[0].attributes.transactions[1], user_tx);
}

#[tokio::test]
async fn test_expired_challenge_causes_reset() {
    // L1 blocks are 12 seconds apart, so a batch of epoch 1 stays valid across the chain.
    let mut l1 = TestL1Chain::new(1, 2);
    for n in 2..=4 {
        l1.push_empty(12 * n);
    }

    let mut storage = InMemoryDaStorage::default();
    let user_tx = Bytes::from_static(&[0x02, 0x07]);
    let commitment = storage.insert(batch_frames(0, l1.blocks[0], L2_GENESIS_TIME + 2, user_tx));
    let included = l1.push(60, vec![batcher_tx(BATCHER, INBOX, commitment.tx_data())], vec![]);
    assert_eq!(included.number, 5);

    for n in 6..=14 {
        l1.push_empty(12 * n);
    }
    let event = ChallengeEvent {
        block_number: included.number,
        commitment: commitment.clone(),
        status: ChallengeStatus::Active,
    };
    let receipt = Receipt { status: true.into(), logs: vec![event.to_log(CHALLENGER)], ..Default::default() };
    let challenged = l1.push(12 * 15, vec![], vec![receipt]);
    assert_eq!(challenged.number, 15);
    for n in 16..=96 {
        l1.push_empty(12 * n);
    }

    // The sequencing window never forces empty batches here.
    let mut pipeline = new_pipeline(rollup_config(1_000), &l1, storage).await;
    let safe_head = genesis_l2_head(&l1);
    let attributes = step_to_attributes(&mut pipeline, safe_head).await.unwrap();
    assert_eq!(attributes.parent, safe_head);
    let cursor = l2_child(&safe_head, &attributes.attributes);

    // The challenge raised in block 15 can be resolved until block 95.
    let (derived, err) = step_until_error(&mut pipeline, cursor).await;
    assert!(derived.is_empty());
    assert_eq!(err, ResetError::NewExpiredChallenge.reset());
    assert_eq!(pipeline.origin().map(|o| o.number), Some(95));

    // After the reset the expired commitment is skipped, so nothing is derived from it again.
    pipeline.signal(reset_signal(&l1).signal()).await.unwrap();
    let (derived, err) = step_until_error(&mut pipeline, safe_head).await;
    assert!(err.is_eof(), "unexpected error: {err}");
    assert!(derived.is_empty());
}
