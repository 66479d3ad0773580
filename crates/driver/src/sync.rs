//! Finds the L2 heads derivation restarts from after a reset.

use crate::{DriverError, DriverResult, EngineController, L2ChainHeads, SafetyLabel};
use alloy_eips::BlockNumHash;
use mako_derive::{
    traits::ChainProvider,
    types::{L2BlockInfo, RollupConfig},
};

/// The number of sequencing windows the walk back may cover before the reorg is deemed too deep.
pub const MAX_REORG_SEQ_WINDOWS: u64 = 5;

/// Walks the L2 chain back from the engine's unsafe head and returns the heads to restart
/// derivation from.
///
/// - The unsafe head is the highest block whose L1 origin is still canonical.
/// - The safe head is the first block at or below the engine's safe head that starts an epoch
///   at least a sequencing window behind the highest canonical origin. The walk stops early at
///   the finalized head and at genesis.
/// - The finalized head is kept.
pub async fn find_l2_heads<L1, E>(
    cfg: &RollupConfig,
    l1: &mut L1,
    engine: &mut E,
) -> DriverResult<L2ChainHeads, E::Error>
where
    L1: ChainProvider + Send,
    E: EngineController + Send,
{
    let finalized =
        engine.block_by_label(SafetyLabel::Finalized).await.map_err(DriverError::Engine)?;
    let safe = engine.block_by_label(SafetyLabel::Safe).await.map_err(DriverError::Engine)?;
    let prev_unsafe =
        engine.block_by_label(SafetyLabel::Unsafe).await.map_err(DriverError::Engine)?;

    let mut unsafe_head: Option<L2BlockInfo> = None;
    let mut highest_canonical: Option<L2BlockInfo> = None;
    let mut n = prev_unsafe;

    loop {
        if is_canonical(l1, n.l1_origin).await {
            if unsafe_head.is_none() {
                debug!(target: "driver", "Found unsafe head #{} with canonical L1 origin", n.block_info.number);
                unsafe_head = Some(n);
            }
            if highest_canonical.is_none() {
                highest_canonical = Some(n);
            }
        } else {
            // Every block above an L2 block with a reorged origin is invalid too.
            unsafe_head = None;
            highest_canonical = None;
        }

        if n.block_info.number == finalized.block_info.number {
            if n.block_info.hash != finalized.block_info.hash {
                return Err(DriverError::FinalizedMismatch {
                    number: n.block_info.number,
                    expected: finalized.block_info.hash,
                    got: n.block_info.hash,
                });
            }
            info!(target: "driver", "Hit the finalized L2 head #{}", n.block_info.number);
            return Ok(L2ChainHeads { unsafe_: unsafe_head.unwrap_or(n), safe: n, finalized });
        }

        if n.l1_origin.number + MAX_REORG_SEQ_WINDOWS * cfg.seq_window_size <
            prev_unsafe.l1_origin.number
        {
            return Err(DriverError::ReorgTooDeep {
                unsafe_origin: prev_unsafe.l1_origin.number,
                reached: n.l1_origin.number,
            });
        }

        if let Some(highest) = highest_canonical {
            if n.block_info.number <= safe.block_info.number &&
                n.l1_origin.number + cfg.seq_window_size < highest.l1_origin.number &&
                n.seq_num == 0
            {
                info!(target: "driver", "Found safe head #{} a sequencing window deep", n.block_info.number);
                return Ok(L2ChainHeads { unsafe_: unsafe_head.unwrap_or(n), safe: n, finalized });
            }
        }

        if n.block_info.number == cfg.genesis.l2.number {
            if n.block_info.hash != cfg.genesis.l2.hash {
                return Err(DriverError::GenesisMismatch {
                    expected: cfg.genesis.l2.hash,
                    got: n.block_info.hash,
                });
            }
            info!(target: "driver", "Walked back to L2 genesis");
            return Ok(L2ChainHeads { unsafe_: unsafe_head.unwrap_or(n), safe: n, finalized });
        }

        let parent =
            engine.block_by_hash(n.block_info.parent_hash).await.map_err(DriverError::Engine)?;
        if parent.block_info.number + 1 != n.block_info.number {
            return Err(DriverError::BrokenL2Chain {
                number: n.block_info.number,
                parent_hash: n.block_info.parent_hash,
            });
        }
        n = parent;
    }
}

/// Returns true if the L1 chain holds `origin`.
///
/// A missing block counts as not canonical: the L2 block is ahead of the L1 view.
async fn is_canonical<L1: ChainProvider + Send>(l1: &mut L1, origin: BlockNumHash) -> bool {
    match l1.block_info_by_number(origin.number).await {
        Ok(block) => block.hash == origin.hash,
        Err(e) => {
            debug!(target: "driver", "L1 origin #{} unavailable: {e}", origin.number);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EngineError, ExecutionPayload, ForkchoiceState};
    use alloy_primitives::B256;
    use async_trait::async_trait;
    use hashbrown::HashMap;
    use mako_derive::{
        test_utils::{l1_block_hash, l2_block_hash, TestL1Chain},
        types::{AttributesWithParent, BlockInfo, ChainGenesis},
    };

    /// A chain of L2 blocks, each with its L1 origin, served by label and hash.
    #[derive(Debug, Default)]
    struct WalkEngine {
        blocks: HashMap<B256, L2BlockInfo>,
        heads: Option<L2ChainHeads>,
    }

    impl WalkEngine {
        /// Builds blocks `0..=tip`, where block `n` has origin `origin(n)` and sequence number
        /// `seq(n)`.
        fn new(tip: u64, origin: impl Fn(u64) -> BlockNumHash, seq: impl Fn(u64) -> u64) -> Self {
            let mut blocks = HashMap::new();
            let mut chain = Vec::new();
            for n in 0..=tip {
                let block = L2BlockInfo {
                    block_info: BlockInfo {
                        hash: l2_block_hash(n),
                        number: n,
                        parent_hash: if n == 0 { B256::ZERO } else { l2_block_hash(n - 1) },
                        timestamp: 2 * n,
                    },
                    l1_origin: origin(n),
                    seq_num: seq(n),
                };
                blocks.insert(block.block_info.hash, block);
                chain.push(block);
            }
            Self { blocks, heads: Some(L2ChainHeads::new_unified(chain[0])) }
                .with_heads(chain[tip as usize], chain[tip as usize], chain[0])
        }

        fn with_heads(mut self, unsafe_: L2BlockInfo, safe: L2BlockInfo, finalized: L2BlockInfo) -> Self {
            self.heads = Some(L2ChainHeads { unsafe_, safe, finalized });
            self
        }

        fn block(&self, n: u64) -> L2BlockInfo {
            self.blocks[&l2_block_hash(n)]
        }
    }

    #[async_trait]
    impl EngineController for WalkEngine {
        type Error = EngineError;

        async fn block_by_label(&mut self, label: SafetyLabel) -> Result<L2BlockInfo, EngineError> {
            self.heads.map(|h| *h.head(label)).ok_or(EngineError::BlockNotFound(0))
        }

        async fn block_by_hash(&mut self, hash: B256) -> Result<L2BlockInfo, EngineError> {
            self.blocks.get(&hash).copied().ok_or(EngineError::UnknownHash(hash))
        }

        async fn execute_attributes(
            &mut self,
            _: &AttributesWithParent,
        ) -> Result<L2BlockInfo, EngineError> {
            unimplemented!()
        }

        async fn insert_unsafe_payload(
            &mut self,
            _: &ExecutionPayload,
        ) -> Result<L2BlockInfo, EngineError> {
            unimplemented!()
        }

        async fn forkchoice_updated(&mut self, _: ForkchoiceState) -> Result<(), EngineError> {
            Ok(())
        }
    }

    fn rollup_config(seq_window_size: u64) -> RollupConfig {
        RollupConfig {
            genesis: ChainGenesis {
                l1: BlockNumHash { number: 0, hash: l1_block_hash(0) },
                l2: BlockNumHash { number: 0, hash: l2_block_hash(0) },
                ..Default::default()
            },
            block_time: 2,
            seq_window_size,
            ..Default::default()
        }
    }

    /// An L1 chain `0..=tip` with 12 second blocks.
    fn l1_chain(tip: u64) -> TestL1Chain {
        let mut chain = TestL1Chain::new(0, 0);
        for n in 1..=tip {
            chain.push_empty(12 * n);
        }
        chain
    }

    fn origin(number: u64) -> BlockNumHash {
        BlockNumHash { number, hash: l1_block_hash(number) }
    }

    #[tokio::test]
    async fn test_walks_back_a_sequencing_window() {
        // L2 block n has L1 origin n / 2 and starts an epoch on even numbers.
        let mut engine = WalkEngine::new(40, |n| origin(n / 2), |n| n % 2);
        let mut l1 = l1_chain(20);
        let cfg = rollup_config(4);

        let heads = find_l2_heads(&cfg, &mut l1.provider, &mut engine).await.unwrap();
        assert_eq!(heads.unsafe_, engine.block(40));
        // The highest origin is 20; the first epoch start with origin + 4 < 20 is origin 15.
        assert_eq!(heads.safe, engine.block(30));
        assert_eq!(heads.finalized, engine.block(0));
    }

    #[tokio::test]
    async fn test_unsafe_head_drops_reorged_origins() {
        let mut engine = WalkEngine::new(40, |n| origin(n / 2), |n| n % 2);
        // The L1 chain only reaches block 17: L2 blocks from 36 on are ahead of it.
        let mut l1 = l1_chain(17);
        let cfg = rollup_config(4);

        let heads = find_l2_heads(&cfg, &mut l1.provider, &mut engine).await.unwrap();
        assert_eq!(heads.unsafe_, engine.block(35));
        assert_eq!(heads.safe, engine.block(24));
    }

    #[tokio::test]
    async fn test_stops_at_finalized_head() {
        let engine = WalkEngine::new(40, |n| origin(n / 2), |n| n % 2);
        let (unsafe_, finalized) = (engine.block(40), engine.block(36));
        let mut engine = engine.with_heads(unsafe_, unsafe_, finalized);
        let mut l1 = l1_chain(20);

        let heads = find_l2_heads(&rollup_config(4), &mut l1.provider, &mut engine).await.unwrap();
        assert_eq!(heads.safe, finalized);
        assert_eq!(heads.finalized, finalized);
        assert_eq!(heads.unsafe_, unsafe_);
    }

    #[tokio::test]
    async fn test_stops_at_genesis() {
        let mut engine = WalkEngine::new(6, |n| origin(n / 2), |n| n % 2);
        let mut l1 = l1_chain(3);

        let heads = find_l2_heads(&rollup_config(10), &mut l1.provider, &mut engine).await.unwrap();
        assert_eq!(heads.safe, engine.block(0));
        assert_eq!(heads.unsafe_, engine.block(6));
    }

    #[tokio::test]
    async fn test_finalized_mismatch() {
        let engine = WalkEngine::new(10, |n| origin(n / 2), |n| n % 2);
        let unsafe_ = engine.block(10);
        let bogus = L2BlockInfo {
            block_info: BlockInfo { hash: B256::repeat_byte(0xEE), ..engine.block(8).block_info },
            ..engine.block(8)
        };
        let mut engine = engine.with_heads(unsafe_, unsafe_, bogus);
        let mut l1 = l1_chain(5);

        let err = find_l2_heads(&rollup_config(4), &mut l1.provider, &mut engine).await.unwrap_err();
        assert!(matches!(err, DriverError::FinalizedMismatch { number: 8, .. }));
    }

    #[tokio::test]
    async fn test_reorg_too_deep() {
        // Origins reach 100, but L1 only knows blocks up to 2.
        let mut engine = WalkEngine::new(50, |n| origin(2 * n), |_| 0);
        let mut l1 = l1_chain(2);

        let err = find_l2_heads(&rollup_config(4), &mut l1.provider, &mut engine).await.unwrap_err();
        assert!(matches!(err, DriverError::ReorgTooDeep { unsafe_origin: 100, .. }));
    }
}
