//! The [StatefulAttributesBuilder] and it's default implementation.

use crate::{
    errors::{BuilderError, PipelineEncodingError, PipelineError, PipelineErrorKind, ResetError},
    params::{DEPOSIT_EVENT_ABI_HASH, SEQUENCER_FEE_VAULT_ADDRESS},
    traits::{AttributesBuilder, ChainProvider, L2ChainProvider},
    types::{decode_deposit, L1BlockInfoTx, L2BlockInfo, PayloadAttributes, PipelineResult, RollupConfig},
};
use alloy_consensus::{Header, Receipt};
use alloy_eips::BlockNumHash;
use alloy_primitives::{Address, Bytes, B256};
use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};
use tracing::debug;

/// A stateful implementation of the [AttributesBuilder].
#[derive(Debug, Default)]
pub struct StatefulAttributesBuilder<L1P, L2P>
where
    L1P: ChainProvider + Debug,
    L2P: L2ChainProvider + Debug,
{
    /// The rollup config.
    rollup_cfg: Arc<RollupConfig>,
    /// The system config fetcher.
    config_fetcher: L2P,
    /// The L1 receipts fetcher.
    receipts_fetcher: L1P,
}

impl<L1P, L2P> StatefulAttributesBuilder<L1P, L2P>
where
    L1P: ChainProvider + Debug,
    L2P: L2ChainProvider + Debug,
{
    /// Create a new [StatefulAttributesBuilder] with the given epoch.
    pub const fn new(rcfg: Arc<RollupConfig>, sys_cfg_fetcher: L2P, receipts: L1P) -> Self {
        Self { rollup_cfg: rcfg, config_fetcher: sys_cfg_fetcher, receipts_fetcher: receipts }
    }
}

#[async_trait]
impl<L1P, L2P> AttributesBuilder for StatefulAttributesBuilder<L1P, L2P>
where
    L1P: ChainProvider + Debug + Send,
    L2P: L2ChainProvider + Debug + Send,
{
    async fn prepare_payload_attributes(
        &mut self,
        l2_parent: L2BlockInfo,
        epoch: BlockNumHash,
    ) -> PipelineResult<PayloadAttributes> {
        let l1_header: Header;
        let deposit_transactions: Vec<Bytes>;
        let mut sys_config = self
            .config_fetcher
            .system_config_by_number(l2_parent.block_info.number, self.rollup_cfg.clone())
            .await
            .map_err(Into::into)?;

        // If the L1 origin changed in this block, then we are in the first block of the epoch.
        // In this case we need to fetch all transaction receipts from the L1 origin block so
        // we can scan for user deposits.
        let sequence_number = if l2_parent.l1_origin.number != epoch.number {
            let header =
                self.receipts_fetcher.header_by_hash(epoch.hash).await.map_err(Into::into)?;
            if l2_parent.l1_origin.hash != header.parent_hash {
                return Err(PipelineErrorKind::Reset(ResetError::AttributesBuilder(
                    BuilderError::BlockMismatchEpochReset(
                        epoch,
                        l2_parent.l1_origin,
                        header.parent_hash,
                    ),
                )));
            }
            let receipts =
                self.receipts_fetcher.receipts_by_hash(epoch.hash).await.map_err(Into::into)?;
            sys_config
                .update_with_receipts(&receipts, &self.rollup_cfg, header.timestamp)
                .map_err(|e| PipelineError::SystemConfigUpdate(e).crit())?;
            deposit_transactions =
                derive_deposits(epoch.hash, &receipts, self.rollup_cfg.deposit_contract_address)
                    .map_err(|e| PipelineError::BadEncoding(e).crit())?;
            l1_header = header;
            0
        } else {
            if l2_parent.l1_origin.hash != epoch.hash {
                return Err(PipelineErrorKind::Reset(ResetError::AttributesBuilder(
                    BuilderError::BlockMismatch(epoch, l2_parent.l1_origin),
                )));
            }

            l1_header =
                self.receipts_fetcher.header_by_hash(epoch.hash).await.map_err(Into::into)?;
            deposit_transactions = Vec::new();
            l2_parent.seq_num + 1
        };

        // Sanity check the L1 origin was correctly selected to maintain the time invariant
        // between L1 and L2.
        let next_l2_time = l2_parent.block_info.timestamp + self.rollup_cfg.block_time;
        if next_l2_time < l1_header.timestamp {
            return Err(PipelineErrorKind::Reset(ResetError::AttributesBuilder(
                BuilderError::BrokenTimeInvariant(
                    l2_parent.l1_origin,
                    next_l2_time,
                    epoch,
                    l1_header.timestamp,
                ),
            )));
        }

        let (_, l1_info_tx) = L1BlockInfoTx::try_new_with_deposit_tx(
            &self.rollup_cfg,
            &sys_config,
            sequence_number,
            &l1_header,
            epoch.hash,
            next_l2_time,
        );

        let mut txs = Vec::with_capacity(1 + deposit_transactions.len());
        txs.push(l1_info_tx);
        txs.extend(deposit_transactions);
        debug!(
            target: "attributes_builder",
            "Prepared {} deposit transactions for L2 block at {next_l2_time} (sequence number {sequence_number})",
            txs.len()
        );

        let withdrawals = self.rollup_cfg.is_canyon_active(next_l2_time).then(Vec::new);
        let parent_beacon_block_root = self
            .rollup_cfg
            .is_ecotone_active(next_l2_time)
            .then(|| l1_header.parent_beacon_block_root.unwrap_or_default());
        let eip_1559_params = self
            .rollup_cfg
            .is_holocene_active(next_l2_time)
            .then(|| sys_config.eip_1559_params().unwrap_or_default());

        Ok(PayloadAttributes {
            timestamp: next_l2_time,
            prev_randao: l1_header.mix_hash,
            suggested_fee_recipient: SEQUENCER_FEE_VAULT_ADDRESS,
            withdrawals,
            parent_beacon_block_root,
            transactions: txs,
            no_tx_pool: true,
            gas_limit: Some(sys_config.gas_limit),
            eip_1559_params,
        })
    }
}

/// Derive deposits for transaction receipts.
///
/// Successful deposits must be emitted by the deposit contract and have the correct event
/// signature. So the receipt address must equal the specified deposit contract and the first topic
/// must be the [DEPOSIT_EVENT_ABI_HASH]. The source hash of each deposit commits to the index of
/// its log within the whole block.
pub fn derive_deposits(
    block_hash: B256,
    receipts: &[Receipt],
    deposit_contract: Address,
) -> Result<Vec<Bytes>, PipelineEncodingError> {
    let mut deposits = Vec::new();
    let mut log_index = 0;
    for receipt in receipts {
        let success = receipt.status.coerce_status();
        for log in &receipt.logs {
            let index = log_index;
            log_index += 1;
            if !success ||
                log.address != deposit_contract ||
                log.topics().first() != Some(&DEPOSIT_EVENT_ABI_HASH)
            {
                continue;
            }
            deposits.push(decode_deposit(block_hash, index, log)?);
        }
    }
    Ok(deposits)
}
