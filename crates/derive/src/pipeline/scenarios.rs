//! End-to-end derivation over the assembled pipeline and an in-memory L1 chain.

use crate::{
    attributes::StatefulAttributesBuilder,
    batch::{Batch, SingleBatch, SpanBatch},
    pipeline::{AttributesQueueStage, DerivationPipeline, PipelineBuilder},
    sources::EthereumDataSource,
    test_utils::{
        batcher_tx, channel_frames, compress_batches, encode_frames, l1_block_hash, l2_block_hash,
        l2_child, step_to_attributes, TestBlobProvider, TestChainProvider, TestL1Chain,
        TestL2ChainProvider,
    },
    traits::SignalReceiver,
    types::{
        decode_deposit, AttributesWithParent, BlockInfo, ChainGenesis, ChannelId, DepositEvent,
        Frame, L1BlockInfoTx, L1Transaction, L2BlockInfo, ResetSignal, RollupConfig, SystemConfig,
    },
};
use alloy_consensus::Receipt;
use alloy_eips::BlockNumHash;
use alloy_primitives::{address, Address, Bytes, B256, U256};
use hashbrown::HashMap;
use std::sync::Arc;

const BATCHER: Address = address!("b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0");
const INBOX: Address = address!("ff00000000000000000000000000000000000010");
const DEPOSIT_CONTRACT: Address = address!("dead00000000000000000000000000000000d3f0");

/// The L2 genesis timestamp. The L1 genesis origin is block 1.
const L2_GENESIS_TIME: u64 = 4;

type ScenarioPipeline = DerivationPipeline<
    AttributesQueueStage<
        EthereumDataSource<TestChainProvider, TestBlobProvider>,
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

fn rollup_config() -> RollupConfig {
    RollupConfig {
        genesis: ChainGenesis {
            l1: BlockNumHash { number: 1, hash: l1_block_hash(1) },
            l2: BlockNumHash { number: 0, hash: l2_block_hash(0) },
            l2_time: L2_GENESIS_TIME,
            system_config: Some(system_config()),
        },
        block_time: 2,
        max_sequencer_drift: 600,
        seq_window_size: 10,
        channel_timeout: 30,
        granite_channel_timeout: 50,
        l2_chain_id: 10,
        batch_inbox_address: INBOX,
        deposit_contract_address: DEPOSIT_CONTRACT,
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

/// Builds the pipeline over `l1` and resets it onto the L2 genesis.
async fn new_pipeline(cfg: RollupConfig, l1: &TestL1Chain) -> (ScenarioPipeline, L2BlockInfo) {
    let cfg = Arc::new(cfg);
    let safe_head = genesis_l2_head(l1);
    let origin = l1.blocks[0];
    let configs: HashMap<u64, SystemConfig> = (0..64).map(|n| (n, system_config())).collect();
    let l2 = TestL2ChainProvider::new(vec![safe_head], configs);

    let dap = EthereumDataSource::new(l1.provider.clone(), TestBlobProvider::default(), &cfg);
    let builder = StatefulAttributesBuilder::new(cfg.clone(), l2.clone(), l1.provider.clone());
    let mut pipeline = PipelineBuilder::new()
        .rollup_config(cfg)
        .origin(origin)
        .dap_source(dap)
        .builder(builder)
        .l2_chain_provider(l2)
        .chain_provider(l1.provider.clone())
        .build()
        .expect("complete pipeline");

    let reset = ResetSignal {
        l2_safe_head: safe_head,
        l1_origin: origin,
        system_config: Some(system_config()),
    };
    pipeline.signal(reset.signal()).await.unwrap();
    (pipeline, safe_head)
}

/// Steps the pipeline until the L1 chain runs dry, sealing every prepared block.
async fn derive_all(
    pipeline: &mut ScenarioPipeline,
    mut cursor: L2BlockInfo,
) -> Vec<AttributesWithParent> {
    let mut derived = Vec::new();
    loop {
        match step_to_attributes(pipeline, cursor).await {
            Ok(attributes) => {
                cursor = l2_child(&cursor, &attributes.attributes);
                derived.push(attributes);
            }
            Err(err) => {
                assert!(err.is_eof(), "unexpected pipeline error: {err}");
                return derived;
            }
        }
    }
}

fn single_batch(epoch: BlockInfo, timestamp: u64, transactions: Vec<Bytes>) -> SingleBatch {
    SingleBatch { parent_hash: B256::ZERO, epoch_num: epoch.number, epoch_hash: epoch.hash, timestamp, transactions }
}

/// A calldata batcher transaction carrying the frames.
fn frames_tx(frames: &[Frame]) -> L1Transaction {
    batcher_tx(BATCHER, INBOX, encode_frames(frames))
}

/// A single frame channel carrying the batches.
fn channel_tx(id: ChannelId, batches: &[Batch]) -> L1Transaction {
    frames_tx(&channel_frames(id, &compress_batches(batches), 1))
}

/// The L1 info deposit expected for an L2 block at `timestamp` in epoch `epoch`.
fn l1_info_tx(
    cfg: &RollupConfig,
    l1: &TestL1Chain,
    epoch: u64,
    seq: u64,
    timestamp: u64,
) -> Bytes {
    let header = l1.header(epoch).unwrap();
    let hash = l1.block(epoch).unwrap().hash;
    L1BlockInfoTx::try_new_with_deposit_tx(cfg, &system_config(), seq, &header, hash, timestamp).1
}

#[tokio::test]
async fn test_singular_batch_round_trip() {
    let cfg = rollup_config();
    let mut l1 = TestL1Chain::new(1, 2);
    let epoch = BlockInfo { number: 2, hash: l1_block_hash(2), ..Default::default() };
    let user_tx = Bytes::from_static(&[0xDE, 0xAD, 0xBE, 0xEF]);
    let batch = SingleBatch {
        parent_hash: l2_block_hash(0),
        ..single_batch(epoch, L2_GENESIS_TIME + 2, vec![user_tx.clone()])
    };
    l1.push(4, vec![channel_tx([1; 16], &[Batch::Single(batch)])], vec![]);

    let (mut pipeline, safe_head) = new_pipeline(cfg.clone(), &l1).await;
    let derived = derive_all(&mut pipeline, safe_head).await;

    assert_eq!(derived.len(), 1);
    let attributes = &derived[0].attributes;
    assert_eq!(derived[0].parent, safe_head);
    assert_eq!(attributes.timestamp, L2_GENESIS_TIME + 2);
    assert_eq!(
        attributes.transactions,
        vec![l1_info_tx(&cfg, &l1, 2, 0, L2_GENESIS_TIME + 2), user_tx]
    );
    assert_eq!(attributes.gas_limit, Some(system_config().gas_limit));
    assert!(attributes.no_tx_pool);
    assert!(derived[0].is_last_in_span);
}

#[tokio::test]
async fn test_epoch_advance_with_deposit() {
    let cfg = rollup_config();
    let mut l1 = TestL1Chain::new(1, 2);

    let b = BlockInfo { number: 2, hash: l1_block_hash(2), ..Default::default() };
    let first = SingleBatch {
        parent_hash: l2_block_hash(0),
        ..single_batch(b, 6, vec![Bytes::from_static(&[0x02, 0x01])])
    };
    l1.push(4, vec![channel_tx([1; 16], &[Batch::Single(first)])], vec![]);

    let deposit = DepositEvent {
        from: address!("1111111111111111111111111111111111111111"),
        to: address!("2222222222222222222222222222222222222222"),
        mint: 100,
        value: U256::from(50),
        gas_limit: 100_000,
        is_creation: false,
        data: Bytes::new(),
    };
    let log = deposit.to_log(DEPOSIT_CONTRACT);
    let receipt = Receipt { status: true.into(), logs: vec![log.clone()], ..Default::default() };
    let c = BlockInfo { number: 3, hash: l1_block_hash(3), ..Default::default() };
    let batch_tx = Bytes::from_static(&[0x02, 0x02]);
    let second = SingleBatch {
        parent_hash: l2_block_hash(1),
        ..single_batch(c, 8, vec![batch_tx.clone()])
    };
    l1.push(6, vec![channel_tx([2; 16], &[Batch::Single(second)])], vec![receipt]);

    let (mut pipeline, safe_head) = new_pipeline(cfg.clone(), &l1).await;
    let derived = derive_all(&mut pipeline, safe_head).await;

    assert_eq!(derived.len(), 2);
    let user_deposit = decode_deposit(c.hash, 0, &log).unwrap();
    assert_eq!(
        derived[1].attributes.transactions,
        vec![l1_info_tx(&cfg, &l1, 3, 0, 8), user_deposit, batch_tx]
    );
    assert_eq!(derived[1].attributes.deposit_count(), 2);
    assert_eq!(derived[1].parent.l1_origin.number, 2);
}

/// Channel `A` is split over three frames sent out of order around the single frame channel
/// `B`, all in one batcher transaction of L1 block 2.
fn interleaved_channels(l1: &mut TestL1Chain) -> (Bytes, Bytes) {
    let epoch = BlockInfo { number: 2, hash: l1_block_hash(2), ..Default::default() };
    let tx_a = Bytes::from_static(&[0x02, 0xAA]);
    let tx_b = Bytes::from_static(&[0x02, 0xBB]);

    // B carries the first L2 block, A the second.
    let batch_b = SingleBatch { parent_hash: l2_block_hash(0), ..single_batch(epoch, 6, vec![tx_b.clone()]) };
    let batch_a = SingleBatch { parent_hash: l2_block_hash(1), ..single_batch(epoch, 8, vec![tx_a.clone()]) };
    let frames_a = channel_frames([0xA; 16], &compress_batches(&[Batch::Single(batch_a)]), 3);
    let frames_b = channel_frames([0xB; 16], &compress_batches(&[Batch::Single(batch_b)]), 1);
    assert_eq!(frames_a.len(), 3);

    let frames =
        [frames_a[1].clone(), frames_b[0].clone(), frames_a[0].clone(), frames_a[2].clone()];
    l1.push(4, vec![frames_tx(&frames)], vec![]);
    (tx_a, tx_b)
}

#[tokio::test]
async fn test_out_of_order_frames_pre_holocene() {
    let cfg = RollupConfig { canyon_time: Some(0), ..rollup_config() };
    let mut l1 = TestL1Chain::new(1, 2);
    let (tx_a, tx_b) = interleaved_channels(&mut l1);

    let (mut pipeline, safe_head) = new_pipeline(cfg, &l1).await;
    let derived = derive_all(&mut pipeline, safe_head).await;

    assert_eq!(derived.len(), 2);
    assert_eq!(derived[0].attributes.transactions[1], tx_b);
    assert_eq!(derived[1].attributes.transactions[1], tx_a);
}

#[tokio::test]
async fn test_out_of_order_frames_discarded_after_holocene() {
    let cfg = RollupConfig { holocene_time: Some(0), ..rollup_config() };
    let mut l1 = TestL1Chain::new(1, 2);
    let (_, tx_b) = interleaved_channels(&mut l1);

    let (mut pipeline, safe_head) = new_pipeline(cfg, &l1).await;
    let derived = derive_all(&mut pipeline, safe_head).await;

    assert_eq!(derived.len(), 1);
    assert_eq!(derived[0].attributes.transactions.len(), 2);
    assert_eq!(derived[0].attributes.transactions[1], tx_b);
}

#[tokio::test]
async fn test_sequencing_window_empty_batches() {
    let cfg = RollupConfig { seq_window_size: 2, ..rollup_config() };
    // L1 blocks 1..=7, four seconds apart; no batcher data at all.
    let mut l1 = TestL1Chain::new(1, 4);
    for number in 2..=7u64 {
        l1.push_empty(4 * number);
    }

    let (mut pipeline, safe_head) = new_pipeline(cfg.clone(), &l1).await;
    let derived = derive_all(&mut pipeline, safe_head).await;

    // (epoch, sequence number) of every L2 block until the window of block 7 is exhausted.
    let expected = [(1, 1), (2, 0), (2, 1), (3, 0), (3, 1), (4, 0), (4, 1), (5, 0), (5, 1)];
    assert_eq!(derived.len(), expected.len());
    for (i, (attributes, (epoch, seq))) in derived.iter().zip(expected).enumerate() {
        let timestamp = L2_GENESIS_TIME + 2 * (i as u64 + 1);
        assert_eq!(attributes.attributes.timestamp, timestamp);
        assert_eq!(
            attributes.attributes.transactions,
            vec![l1_info_tx(&cfg, &l1, epoch, seq, timestamp)]
        );
    }
}

#[tokio::test]
async fn test_span_batch_across_epoch_change() {
    let cfg = RollupConfig { delta_time: Some(0), ..rollup_config() };
    let mut l1 = TestL1Chain::new(1, 2);
    let a = l1.blocks[0];
    let b = BlockInfo { number: 2, hash: l1_block_hash(2), ..Default::default() };

    let mut span = SpanBatch {
        genesis_timestamp: L2_GENESIS_TIME,
        chain_id: cfg.l2_chain_id,
        ..Default::default()
    };
    // The genesis block is the first block of epoch 1, so the span continues it at sequence 1.
    let elements = [(a, 6, 1), (a, 8, 2), (b, 10, 0)];
    for (i, (epoch, timestamp, seq)) in elements.into_iter().enumerate() {
        let mut batch = single_batch(epoch, timestamp, vec![]);
        if i == 0 {
            batch.parent_hash = l2_block_hash(0);
        }
        span.append_singular_batch(batch, seq).unwrap();
    }
    l1.push(10, vec![channel_tx([5; 16], &[Batch::Span(span)])], vec![]);

    let (mut pipeline, safe_head) = new_pipeline(cfg.clone(), &l1).await;
    let derived = derive_all(&mut pipeline, safe_head).await;

    assert_eq!(derived.len(), 3);
    let infos: Vec<L1BlockInfoTx> = derived
        .iter()
        .map(|d| L1BlockInfoTx::decode_deposit_tx(&d.attributes.transactions[0]).unwrap())
        .collect();
    assert_eq!(infos.iter().map(|i| i.sequence_number()).collect::<Vec<_>>(), vec![1, 2, 0]);
    assert_eq!(infos.iter().map(|i| i.id().number).collect::<Vec<_>>(), vec![1, 1, 2]);
    for (attributes, (epoch, timestamp, seq)) in derived.iter().zip(elements) {
        assert_eq!(attributes.attributes.timestamp, timestamp);
        assert_eq!(
            attributes.attributes.transactions,
            vec![l1_info_tx(&cfg, &l1, epoch.number, seq, timestamp)]
        );
    }
    assert!(!derived[0].is_last_in_span);
    assert!(!derived[1].is_last_in_span);
    assert!(derived[2].is_last_in_span);
}
