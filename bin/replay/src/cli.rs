//! Module for the CLI.

use crate::{
    fixture::Fixture,
    providers::{FixtureBlobProvider, FixtureL1Provider},
};
use alloy_primitives::Bytes;
use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Parser};
use mako_alt_da::{AltDaDataSource, AltDaManager, InMemoryDaStorage};
use mako_derive::{
    attributes::StatefulAttributesBuilder,
    pipeline::{AttributesQueueStage, DerivationPipeline, PipelineBuilder},
    sources::EthereumDataSource,
    traits::{ChainProvider, DataAvailabilityProvider, Pipeline},
    types::{BlockInfo, L2BlockInfo, RollupConfig},
};
use mako_driver::{Driver, DriverConfig, InMemoryEngine};
use serde::Serialize;
use std::{fmt::Debug, path::PathBuf, sync::Arc};
use tracing::{info, Level};

/// The pipeline the replay drives, over the data source `D`.
type ReplayPipeline<D> = DerivationPipeline<
    AttributesQueueStage<
        D,
        FixtureL1Provider,
        InMemoryEngine,
        StatefulAttributesBuilder<FixtureL1Provider, InMemoryEngine>,
    >,
    InMemoryEngine,
>;

/// Replays a recorded L1 chain through the derivation pipeline.
#[derive(Parser, Clone, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// The rollup config, as JSON.
    #[clap(long, env = "MAKO_ROLLUP_CONFIG")]
    pub rollup_config: PathBuf,
    /// The recorded L1 chain, as JSON.
    #[clap(long, env = "MAKO_FIXTURE")]
    pub fixture: PathBuf,
    /// The L2 block number to derive up to. Derivation stops early once the fixture is exhausted.
    #[clap(long, default_value_t = u64::MAX)]
    pub target: u64,
    /// The driver config, as JSON. Missing fields take their defaults.
    #[clap(long, env = "MAKO_DRIVER_CONFIG")]
    pub driver_config: Option<PathBuf>,
    /// Treat the last L1 block of the fixture as finalized once derivation stops.
    #[clap(long)]
    pub finalize_tip: bool,
    /// Verbosity level (0-4)
    #[arg(long, short, help = "Verbosity level (0 [error] - 4 [trace])", action = ArgAction::Count)]
    pub v: u8,
}

/// A derived L2 block, as printed by the replay.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DerivedBlock {
    #[serde(flatten)]
    block: L2BlockInfo,
    transactions: Vec<Bytes>,
}

impl Cli {
    /// Initializes telemetry for the application.
    pub fn init_telemetry(self) -> Result<Self> {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(match self.v {
                0 => Level::ERROR,
                1 => Level::WARN,
                2 => Level::INFO,
                3 => Level::DEBUG,
                _ => Level::TRACE,
            })
            .finish();
        tracing::subscriber::set_global_default(subscriber).map_err(|e| anyhow!(e))?;
        Ok(self)
    }

    /// Loads the inputs and runs the replay.
    pub async fn run(&self) -> Result<()> {
        let raw = std::fs::read_to_string(&self.rollup_config)
            .with_context(|| format!("reading rollup config {}", self.rollup_config.display()))?;
        let rollup_config: RollupConfig =
            serde_json::from_str(&raw).context("parsing rollup config")?;
        let driver_config = match &self.driver_config {
            Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)
                .context("parsing driver config")?,
            None => DriverConfig::default(),
        };
        let fixture = Fixture::from_file(&self.fixture)?;
        info!(
            target: "replay",
            "Loaded {} L1 blocks and {} alt-DA inputs",
            fixture.l1_blocks.len(),
            fixture.da_inputs.len()
        );

        let blocks = self.replay(Arc::new(rollup_config), driver_config, Arc::new(fixture)).await?;
        for block in blocks {
            println!("{}", serde_json::to_string(&block)?);
        }
        Ok(())
    }

    /// Derives the L2 chain from the fixture and returns the derived blocks.
    async fn replay(
        &self,
        cfg: Arc<RollupConfig>,
        driver_config: DriverConfig,
        fixture: Arc<Fixture>,
    ) -> Result<Vec<DerivedBlock>> {
        let l1 = FixtureL1Provider::new(fixture.clone());
        let engine = InMemoryEngine::new(&cfg);
        let calldata = EthereumDataSource::new(
            l1.clone(),
            FixtureBlobProvider::new(fixture.clone()),
            &cfg,
        );

        let finalized =
            if self.finalize_tip { fixture.l1_blocks.last().map(|b| b.info) } else { None };
        match &cfg.alt_da {
            Some(alt_da) => {
                let mut storage = InMemoryDaStorage::default();
                for input in &fixture.da_inputs {
                    storage.insert(input.clone());
                }
                let manager = AltDaManager::new(alt_da, storage)?;
                let dap = AltDaDataSource::new(l1.clone(), manager, calldata);
                let pipeline = build_pipeline(cfg.clone(), dap, l1.clone(), engine.clone()).await?;
                self.derive(cfg, driver_config, pipeline, engine, l1, finalized).await
            }
            None => {
                let pipeline =
                    build_pipeline(cfg.clone(), calldata, l1.clone(), engine.clone()).await?;
                self.derive(cfg, driver_config, pipeline, engine, l1, finalized).await
            }
        }
    }

    async fn derive<P>(
        &self,
        cfg: Arc<RollupConfig>,
        driver_config: DriverConfig,
        pipeline: P,
        engine: InMemoryEngine,
        l1: FixtureL1Provider,
        finalized: Option<BlockInfo>,
    ) -> Result<Vec<DerivedBlock>>
    where
        P: Pipeline + Send + Debug,
    {
        let heads = engine.heads();
        let genesis = heads.safe.block_info.number;
        let mut driver = Driver::new(cfg, driver_config, pipeline, engine.clone(), l1, heads);

        let safe = driver.advance_to_target(self.target).await?;
        if let Some(tip) = finalized {
            driver.on_l1_finalized(tip).await?;
            info!(
                target: "replay",
                "L1 block #{} finalized L2 block #{}",
                tip.number,
                driver.heads().finalized.block_info.number
            );
        }

        (genesis + 1..=safe.block_info.number)
            .map(|number| {
                let block = engine
                    .canonical_block(number)
                    .ok_or_else(|| anyhow!("derived block #{number} missing from the engine"))?;
                let transactions = engine.canonical_transactions(number).unwrap_or_default();
                Ok(DerivedBlock { block, transactions })
            })
            .collect()
    }
}

/// Assembles the pipeline over the data source, starting at the L1 genesis of the rollup.
async fn build_pipeline<D>(
    cfg: Arc<RollupConfig>,
    dap: D,
    mut l1: FixtureL1Provider,
    engine: InMemoryEngine,
) -> Result<ReplayPipeline<D>>
where
    D: DataAvailabilityProvider + Send + Sync + Debug,
{
    let origin = l1
        .block_info_by_number(cfg.genesis.l1.number)
        .await
        .context("the fixture does not hold the L1 genesis of the rollup")?;
    let builder = StatefulAttributesBuilder::new(cfg.clone(), engine.clone(), l1.clone());
    PipelineBuilder::new()
        .rollup_config(cfg)
        .origin(origin)
        .dap_source(dap)
        .builder(builder)
        .l2_chain_provider(engine)
        .chain_provider(l1)
        .build()
        .ok_or_else(|| anyhow!("incomplete pipeline"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::FixtureBlock;
    use alloy_eips::BlockNumHash;
    use alloy_primitives::{address, B256, U256};
    use mako_derive::{
        test_utils::{l1_block_hash, l2_block_hash},
        types::{ChainGenesis, SystemConfig},
    };

    fn rollup_config() -> RollupConfig {
        RollupConfig {
            genesis: ChainGenesis {
                l1: BlockNumHash { number: 1, hash: l1_block_hash(1) },
                l2: BlockNumHash { number: 0, hash: l2_block_hash(0) },
                l2_time: 4,
                system_config: Some(SystemConfig {
                    batcher_address: address!("b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0"),
                    overhead: U256::from(188),
                    scalar: U256::from(684_000),
                    gas_limit: 30_000_000,
                    ..Default::default()
                }),
            },
            block_time: 2,
            max_sequencer_drift: 600,
            seq_window_size: 2,
            channel_timeout: 30,
            l2_chain_id: 10,
            batch_inbox_address: address!("ff00000000000000000000000000000000000010"),
            ..Default::default()
        }
    }

    /// Empty L1 blocks `1..=tip`, 12 seconds apart.
    fn fixture(tip: u64) -> Fixture {
        let l1_blocks = (1..=tip)
            .map(|number| FixtureBlock {
                info: BlockInfo {
                    hash: l1_block_hash(number),
                    number,
                    parent_hash: if number == 1 { B256::ZERO } else { l1_block_hash(number - 1) },
                    timestamp: 2 + 12 * (number - 1),
                },
                base_fee_per_gas: Some(7),
                ..Default::default()
            })
            .collect();
        Fixture { l1_blocks, da_inputs: Vec::new() }
    }

    fn cli(target: u64) -> Cli {
        Cli {
            rollup_config: PathBuf::new(),
            fixture: PathBuf::new(),
            target,
            driver_config: None,
            finalize_tip: true,
            v: 0,
        }
    }

    #[tokio::test]
    async fn test_replay_derives_to_target() {
        let blocks = cli(3)
            .replay(Arc::new(rollup_config()), DriverConfig::default(), Arc::new(fixture(6)))
            .await
            .unwrap();

        assert_eq!(blocks.len(), 3);
        for (i, derived) in blocks.iter().enumerate() {
            assert_eq!(derived.block.block_info.number, i as u64 + 1);
            assert_eq!(derived.block.block_info.timestamp, 4 + 2 * (i as u64 + 1));
            assert_eq!(derived.transactions.len(), 1);
        }
        let line = serde_json::to_string(&blocks[0]).unwrap();
        assert!(line.contains("\"transactions\""));
    }

    #[tokio::test]
    async fn test_replay_stops_at_fixture_end() {
        // The sequencing window of the genesis epoch never expires.
        let blocks = cli(u64::MAX)
            .replay(Arc::new(rollup_config()), DriverConfig::default(), Arc::new(fixture(2)))
            .await
            .unwrap();
        assert!(blocks.is_empty());
    }
}
