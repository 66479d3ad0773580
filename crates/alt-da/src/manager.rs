//! Contains the [AltDaManager], the stateful [AltDaInputFetcher] backed by a [DaStorage].

use crate::{
    challenge::{decode_resolved_input, ChallengeEvent, CHALLENGE_STATUS_EVENT_ABI_HASH},
    errors::{AltDaError, CommitmentError, DaStorageError},
    traits::{AltDaInputFetcher, DaStorage, FinalizedHeadSignal},
    AltDaState, ChallengeStatus, Commitment, CommitmentType,
};
use alloy_eips::BlockNumHash;
use alloy_primitives::{Address, Bytes, Log};
use async_trait::async_trait;
use core::fmt;
use mako_derive::{
    traits::ChainProvider,
    types::{AltDaConfig, BlockInfo, L1Transaction, SystemConfig},
};
use tracing::{debug, error, info, warn};

/// Tracks alt-DA commitments and challenges along the L1 chain and resolves commitments
/// through the DA storage.
///
/// The manager follows two origins. The challenge origin is the last L1 block whose challenge
/// events were synced; it runs ahead of the pipeline while a challenged input is missing. The
/// commitment origin follows the pipeline and expires commitments.
pub struct AltDaManager<S: DaStorage> {
    storage: S,
    state: AltDaState,
    challenge_address: Address,
    commitment_type: CommitmentType,
    challenge_window: u64,
    challenge_origin: BlockNumHash,
    commitment_origin: BlockNumHash,
    finalized_head: BlockInfo,
    l1_finalized_head: BlockInfo,
    /// Set when expiring commitments requires a reorg, so the following reset keeps the
    /// challenges.
    resetting: bool,
    finalized_head_signal: Option<FinalizedHeadSignal>,
}

impl<S: DaStorage> fmt::Debug for AltDaManager<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AltDaManager")
            .field("state", &self.state)
            .field("commitment_type", &self.commitment_type)
            .field("challenge_origin", &self.challenge_origin)
            .field("commitment_origin", &self.commitment_origin)
            .field("finalized_head", &self.finalized_head)
            .field("resetting", &self.resetting)
            .finish_non_exhaustive()
    }
}

impl<S: DaStorage> AltDaManager<S> {
    /// Creates a manager for the given alt-DA configuration.
    pub fn new(cfg: &AltDaConfig, storage: S) -> Result<Self, CommitmentError> {
        Ok(Self {
            storage,
            state: AltDaState::new(cfg.da_challenge_window, cfg.da_resolve_window),
            challenge_address: cfg.da_challenge_address,
            commitment_type: CommitmentType::try_from(cfg.da_commitment_type)?,
            challenge_window: cfg.da_challenge_window,
            challenge_origin: BlockNumHash::default(),
            commitment_origin: BlockNumHash::default(),
            finalized_head: BlockInfo::default(),
            l1_finalized_head: BlockInfo::default(),
            resetting: false,
            finalized_head_signal: None,
        })
    }

    /// Returns the commitment and challenge state.
    pub const fn state(&self) -> &AltDaState {
        &self.state
    }

    /// Returns the last L1 block whose challenge events were synced.
    pub const fn challenge_origin(&self) -> BlockNumHash {
        self.challenge_origin
    }

    /// Returns the last L1 block up to which commitments were expired.
    pub const fn commitment_origin(&self) -> BlockNumHash {
        self.commitment_origin
    }

    /// Returns the alt-DA finalized head.
    pub const fn finalized_head(&self) -> BlockInfo {
        self.finalized_head
    }

    /// Moves the origins back to `base`. A reset raised by an expired challenge keeps the
    /// challenges and only drops the commitments.
    pub fn reset(&mut self, base: BlockInfo) {
        if self.resetting {
            self.resetting = false;
            self.commitment_origin = base.id();
            self.state.clear_commitments();
        } else {
            self.challenge_origin = base.id();
            self.commitment_origin = base.id();
            self.state.reset();
        }
        debug!(target: "alt_da", "Reset to L1 block #{}", base.number);
    }

    /// Prunes the state up to the finalized L1 block and signals the alt-DA finalized head.
    pub fn finalize(&mut self, l1_finalized: BlockInfo) {
        self.l1_finalized_head = l1_finalized;
        self.state.prune(l1_finalized.id());
        self.finalized_head = self.state.last_pruned_commitment();
        info!(
            target: "alt_da",
            "L1 finalized #{}, alt-DA finalized #{}",
            l1_finalized.number,
            self.finalized_head.number
        );
        match &self.finalized_head_signal {
            Some(signal) => signal(self.finalized_head),
            None => warn!(target: "alt_da", "Finalized head signal handler not set"),
        }
    }

    /// Sets the callback receiving the alt-DA finalized head.
    pub fn on_finalized_head_signal(&mut self, callback: FinalizedHeadSignal) {
        self.finalized_head_signal = Some(callback);
    }

    /// Syncs the next L1 block past the challenge origin. Used while a challenged input is
    /// missing and the pipeline is stalled on it.
    async fn look_ahead<CP>(&mut self, l1: &mut CP) -> Result<(), AltDaError>
    where
        CP: ChainProvider + Send,
    {
        let next = l1
            .block_info_by_number(self.challenge_origin.number + 1)
            .await
            .map_err(|e| AltDaError::Provider(e.to_string()))?;
        self.advance_challenge_origin(l1, next.id()).await
    }

    async fn advance_challenge_origin<CP>(
        &mut self,
        l1: &mut CP,
        block: BlockNumHash,
    ) -> Result<(), AltDaError>
    where
        CP: ChainProvider + Send,
    {
        if block.number <= self.challenge_origin.number {
            return Ok(());
        }
        self.load_challenge_events(l1, block).await?;
        self.state.expire_challenges(block);
        self.challenge_origin = block;
        info!(target: "alt_da", "Processed challenge origin #{}", block.number);
        Ok(())
    }

    fn advance_commitment_origin(&mut self, block: BlockNumHash) -> Result<(), AltDaError> {
        if block.number <= self.commitment_origin.number {
            return Ok(());
        }
        if let Err(e) = self.state.expire_commitments(block) {
            self.resetting = true;
            return Err(e);
        }
        self.commitment_origin = block;
        debug!(
            target: "alt_da",
            "Processed commitment origin #{}, finalized #{}, l1 finalized #{}",
            block.number,
            self.finalized_head.number,
            self.l1_finalized_head.number
        );
        Ok(())
    }

    /// With nothing tracked, the finalized head trails the L1 finalized head by the challenge
    /// window.
    async fn update_finalized_from_l1<CP>(&mut self, l1: &mut CP) -> Result<(), AltDaError>
    where
        CP: ChainProvider + Send,
    {
        if self.l1_finalized_head.number < self.challenge_window {
            return Ok(());
        }
        self.finalized_head = l1
            .block_info_by_number(self.l1_finalized_head.number - self.challenge_window)
            .await
            .map_err(|e| AltDaError::Provider(e.to_string()))?;
        Ok(())
    }

    async fn load_challenge_events<CP>(
        &mut self,
        l1: &mut CP,
        block: BlockNumHash,
    ) -> Result<(), AltDaError>
    where
        CP: ChainProvider + Send,
    {
        // Generic commitments cannot be challenged.
        if self.commitment_type == CommitmentType::Generic {
            return Ok(());
        }

        let receipts =
            l1.receipts_by_hash(block.hash).await.map_err(|e| AltDaError::Provider(e.to_string()))?;
        let logs: Vec<(usize, Log)> = receipts
            .into_iter()
            .enumerate()
            .filter(|(_, receipt)| receipt.status.coerce_status())
            .flat_map(|(i, receipt)| receipt.logs.into_iter().map(move |log| (i, log)))
            .filter(|(_, log)| {
                log.address == self.challenge_address &&
                    log.data.topics().first() == Some(&CHALLENGE_STATUS_EVENT_ABI_HASH)
            })
            .collect();
        if logs.is_empty() {
            return Ok(());
        }
        debug!(target: "alt_da", "Loading {} challenge events of block #{}", logs.len(), block.number);

        let mut transactions: Option<Vec<L1Transaction>> = None;
        for (tx_index, log) in logs {
            let event = match ChallengeEvent::decode(&log) {
                Ok(event) => event,
                Err(e) => {
                    error!(target: "alt_da", "Failed to decode challenge event in block #{}, tx {tx_index}: {e}", block.number);
                    continue;
                }
            };
            match event.status {
                ChallengeStatus::Active => {
                    info!(target: "alt_da", "New active challenge on {} in block #{}", event.commitment, block.number);
                    self.state.create_challenge(event.commitment, block, event.block_number);
                }
                ChallengeStatus::Resolved => {
                    if transactions.is_none() {
                        let (_, txs) = l1
                            .block_info_and_transactions_by_hash(block.hash)
                            .await
                            .map_err(|e| AltDaError::Provider(e.to_string()))?;
                        transactions = Some(txs);
                    }
                    let Some(tx) = transactions.as_ref().and_then(|txs| txs.get(tx_index)) else {
                        error!(target: "alt_da", "No transaction {tx_index} for receipt in block #{}", block.number);
                        continue;
                    };
                    let input = match self.resolved_input(&event.commitment, &tx.input) {
                        Ok(input) => input,
                        Err(e) => {
                            error!(target: "alt_da", "Invalid resolution in block #{}, tx {tx_index}: {e}", block.number);
                            continue;
                        }
                    };
                    info!(target: "alt_da", "Challenge on {} resolved in block #{}", event.commitment, block.number);
                    if let Err(e) =
                        self.state.resolve_challenge(&event.commitment, event.block_number, input)
                    {
                        error!(target: "alt_da", "Failed to resolve challenge: {e}");
                    }
                }
                status => {
                    warn!(target: "alt_da", "Skipping challenge event with status {status:?} in block #{}", block.number);
                }
            }
        }
        Ok(())
    }

    /// Decodes and verifies the input published by a resolving transaction.
    fn resolved_input(
        &self,
        commitment: &Commitment,
        calldata: &[u8],
    ) -> Result<Option<Bytes>, AltDaError> {
        if self.commitment_type != CommitmentType::Keccak256 {
            return Ok(None);
        }
        let input = decode_resolved_input(calldata)
            .map_err(|e| AltDaError::InvalidChallenge(e.to_string()))?;
        commitment.verify(&input).map_err(|e| AltDaError::InvalidChallenge(e.to_string()))?;
        Ok(Some(input))
    }
}

#[async_trait]
impl<CP, S> AltDaInputFetcher<CP> for AltDaManager<S>
where
    CP: ChainProvider + Send,
    S: DaStorage + Send,
{
    async fn get_input(
        &mut self,
        l1: &mut CP,
        commitment: Commitment,
        block: BlockInfo,
    ) -> Result<Bytes, AltDaError> {
        // Commitments of another kind are skipped like expired ones.
        if commitment.commitment_type() != self.commitment_type {
            warn!(target: "alt_da", "Unexpected commitment type {:?}, expected {:?}", commitment.commitment_type(), self.commitment_type);
            return Err(AltDaError::ExpiredChallenge);
        }

        let status = self.state.challenge_status(&commitment, block.number);
        if status == ChallengeStatus::Expired {
            return Err(AltDaError::ExpiredChallenge);
        }
        self.state.track_commitment(commitment.clone(), block);
        debug!(target: "alt_da", "Getting input for {commitment}, status {status:?}");

        match self.storage.get_input(&commitment).await {
            Ok(data) => Ok(data),
            Err(DaStorageError::NotFound) => {
                warn!(target: "alt_da", "Input for {commitment} not found, status {status:?}, block #{}", block.number);
                match status {
                    ChallengeStatus::Uninitialized => {
                        if self.challenge_origin.number > block.number + self.challenge_window {
                            return Err(AltDaError::MissingPastWindow);
                        }
                        self.look_ahead(l1).await?;
                        Err(AltDaError::PendingChallenge)
                    }
                    ChallengeStatus::Active => {
                        self.look_ahead(l1).await?;
                        Err(AltDaError::PendingChallenge)
                    }
                    ChallengeStatus::Resolved => self
                        .state
                        .challenge(&commitment, block.number)
                        .and_then(|c| c.input.clone())
                        .ok_or(AltDaError::MissingPastWindow),
                    ChallengeStatus::Expired => Err(AltDaError::ExpiredChallenge),
                }
            }
            Err(e) => {
                error!(target: "alt_da", "Failed to get input for {commitment}: {e}");
                Err(e.into())
            }
        }
    }

    async fn advance_l1_origin(
        &mut self,
        l1: &mut CP,
        block: BlockNumHash,
    ) -> Result<(), AltDaError> {
        self.advance_challenge_origin(l1, block).await?;
        self.advance_commitment_origin(block)?;
        if self.state.no_commitments() {
            self.update_finalized_from_l1(l1).await?;
        }
        Ok(())
    }

    async fn reset(&mut self, base: BlockInfo, _cfg: SystemConfig) -> Result<(), AltDaError> {
        AltDaManager::reset(self, base);
        Ok(())
    }

    async fn finalize(&mut self, l1_finalized: BlockInfo) -> Result<(), AltDaError> {
        AltDaManager::finalize(self, l1_finalized);
        Ok(())
    }

    fn on_finalized_head_signal(&mut self, callback: FinalizedHeadSignal) {
        AltDaManager::on_finalized_head_signal(self, callback);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{challenge::encode_resolve_call, InMemoryDaStorage};
    use alloy_consensus::Receipt;
    use alloy_primitives::{address, B256};
    use mako_derive::test_utils::{batcher_tx, TestL1Chain};
    use std::sync::{Arc, Mutex};

    const CHALLENGER: Address = address!("0000000000000000000000000000000000000da0");

    fn cfg() -> AltDaConfig {
        AltDaConfig {
            da_challenge_address: CHALLENGER,
            da_commitment_type: 0,
            da_challenge_window: 10,
            da_resolve_window: 20,
        }
    }

    fn manager(storage: InMemoryDaStorage) -> AltDaManager<InMemoryDaStorage> {
        AltDaManager::new(&cfg(), storage).unwrap()
    }

    fn challenge_receipt(commitment: &Commitment, block_number: u64, status: ChallengeStatus) -> Receipt {
        let event = ChallengeEvent { block_number, commitment: commitment.clone(), status };
        Receipt { status: true.into(), logs: vec![event.to_log(CHALLENGER)], ..Default::default() }
    }

    /// Builds a chain of empty blocks `1..=tip`.
    fn chain(tip: u64) -> TestL1Chain {
        let mut chain = TestL1Chain::new(1, 2);
        for n in 2..=tip {
            chain.push_empty(2 * n);
        }
        chain
    }

    #[test]
    fn test_new_rejects_unknown_commitment_type() {
        let cfg = AltDaConfig { da_commitment_type: 4, ..cfg() };
        assert!(AltDaManager::new(&cfg, InMemoryDaStorage::default()).is_err());
    }

    #[tokio::test]
    async fn test_get_input_from_storage() {
        let mut storage = InMemoryDaStorage::default();
        let commitment = storage.insert(Bytes::from_static(b"batch"));
        let mut l1 = chain(3);
        let mut manager = manager(storage);

        let block = l1.block(2).unwrap();
        let data = manager.get_input(&mut l1.provider, commitment, block).await.unwrap();
        assert_eq!(data, Bytes::from_static(b"batch"));
        assert_eq!(manager.state().commitments_len(), 1);
    }

    #[tokio::test]
    async fn test_get_input_wrong_type_is_skipped() {
        let mut l1 = chain(1);
        let mut manager = manager(InMemoryDaStorage::default());
        let generic = Commitment::Generic(Bytes::from_static(b"id"));
        let err = manager.get_input(&mut l1.provider, generic, l1.blocks[0]).await.unwrap_err();
        assert_eq!(err, AltDaError::ExpiredChallenge);
    }

    #[tokio::test]
    async fn test_missing_input_looks_ahead() {
        let mut l1 = chain(3);
        let mut manager = manager(InMemoryDaStorage::default());
        let block = l1.block(1).unwrap();
        manager.reset(block);

        let commitment = Commitment::keccak256(b"missing");
        let err = manager.get_input(&mut l1.provider, commitment.clone(), block).await.unwrap_err();
        assert_eq!(err, AltDaError::PendingChallenge);
        assert_eq!(manager.challenge_origin().number, 2);

        // Retrying does not track the commitment twice.
        let err = manager.get_input(&mut l1.provider, commitment, block).await.unwrap_err();
        assert_eq!(err, AltDaError::PendingChallenge);
        assert_eq!(manager.challenge_origin().number, 3);
        assert_eq!(manager.state().commitments_len(), 1);
    }

    #[tokio::test]
    async fn test_missing_input_past_window() {
        let mut l1 = chain(14);
        let mut manager = manager(InMemoryDaStorage::default());
        let base = l1.block(1).unwrap();
        manager.reset(base);
        let tip = l1.tip().unwrap();
        manager.advance_l1_origin(&mut l1.provider, tip.id()).await.unwrap();

        let commitment = Commitment::keccak256(b"missing");
        let block = l1.block(2).unwrap();
        let err = manager.get_input(&mut l1.provider, commitment, block).await.unwrap_err();
        assert_eq!(err, AltDaError::MissingPastWindow);
    }

    #[tokio::test]
    async fn test_resolved_challenge_serves_input() {
        let input = Bytes::from_static(b"published on L1");
        let commitment = Commitment::keccak256(&input);

        let mut l1 = TestL1Chain::new(1, 2);
        let challenged =
            l1.push(4, vec![], vec![challenge_receipt(&commitment, 1, ChallengeStatus::Active)]);
        let resolve = batcher_tx(
            Address::ZERO,
            CHALLENGER,
            encode_resolve_call(1, &commitment, input.clone()),
        );
        let resolved = l1.push(
            6,
            vec![resolve],
            vec![challenge_receipt(&commitment, 1, ChallengeStatus::Resolved)],
        );

        let mut manager = manager(InMemoryDaStorage::default());
        manager.reset(l1.blocks[0]);
        manager.advance_l1_origin(&mut l1.provider, challenged.id()).await.unwrap();
        assert_eq!(manager.state().challenge_status(&commitment, 1), ChallengeStatus::Active);
        manager.advance_l1_origin(&mut l1.provider, resolved.id()).await.unwrap();
        assert_eq!(manager.state().challenge_status(&commitment, 1), ChallengeStatus::Resolved);

        let data = manager.get_input(&mut l1.provider, commitment, l1.blocks[0]).await.unwrap();
        assert_eq!(data, input);
    }

    #[tokio::test]
    async fn test_resolution_with_wrong_input_is_ignored() {
        let commitment = Commitment::keccak256(b"expected");
        let mut l1 = TestL1Chain::new(1, 2);
        let challenged =
            l1.push(4, vec![], vec![challenge_receipt(&commitment, 1, ChallengeStatus::Active)]);
        let resolve = batcher_tx(
            Address::ZERO,
            CHALLENGER,
            encode_resolve_call(1, &commitment, Bytes::from_static(b"forged")),
        );
        let resolved = l1.push(
            6,
            vec![resolve],
            vec![challenge_receipt(&commitment, 1, ChallengeStatus::Resolved)],
        );

        let mut manager = manager(InMemoryDaStorage::default());
        manager.reset(l1.blocks[0]);
        manager.advance_l1_origin(&mut l1.provider, challenged.id()).await.unwrap();
        manager.advance_l1_origin(&mut l1.provider, resolved.id()).await.unwrap();
        assert_eq!(manager.state().challenge_status(&commitment, 1), ChallengeStatus::Active);
    }

    #[tokio::test]
    async fn test_failed_receipts_are_ignored() {
        let commitment = Commitment::keccak256(b"a");
        let mut receipt = challenge_receipt(&commitment, 1, ChallengeStatus::Active);
        receipt.status = false.into();
        let mut l1 = TestL1Chain::new(1, 2);
        let block = l1.push(4, vec![], vec![receipt]);

        let mut manager = manager(InMemoryDaStorage::default());
        manager.reset(l1.blocks[0]);
        manager.advance_l1_origin(&mut l1.provider, block.id()).await.unwrap();
        assert_eq!(manager.state().challenge_status(&commitment, 1), ChallengeStatus::Uninitialized);
    }

    #[tokio::test]
    async fn test_expired_challenge_keeps_state_across_reset() {
        let mut storage = InMemoryDaStorage::default();
        let commitment = storage.insert(Bytes::from_static(b"batch"));
        let mut l1 = TestL1Chain::new(1, 2);
        let included = l1.push_empty(4);
        let challenged =
            l1.push(6, vec![], vec![challenge_receipt(&commitment, 2, ChallengeStatus::Active)]);
        for n in 4..=23 {
            l1.push_empty(2 * n);
        }

        let mut manager = manager(storage);
        manager.reset(l1.blocks[0]);
        manager.advance_l1_origin(&mut l1.provider, included.id()).await.unwrap();
        manager.get_input(&mut l1.provider, commitment.clone(), included).await.unwrap();
        manager.advance_l1_origin(&mut l1.provider, challenged.id()).await.unwrap();

        // The challenge raised in block 3 can be resolved until block 23.
        let before = l1.block(22).unwrap();
        manager.advance_l1_origin(&mut l1.provider, before.id()).await.unwrap();
        let expiry = l1.block(23).unwrap();
        let err = manager.advance_l1_origin(&mut l1.provider, expiry.id()).await.unwrap_err();
        assert_eq!(err, AltDaError::ReorgRequired);
        assert_eq!(manager.state().challenge_status(&commitment, 2), ChallengeStatus::Expired);

        manager.reset(l1.blocks[0]);
        assert_eq!(manager.challenge_origin(), expiry.id());
        assert_eq!(manager.commitment_origin(), l1.blocks[0].id());
        let err = manager.get_input(&mut l1.provider, commitment, included).await.unwrap_err();
        assert_eq!(err, AltDaError::ExpiredChallenge);

        // A regular reset wipes the challenges.
        manager.reset(l1.blocks[0]);
        assert_eq!(manager.challenge_origin(), l1.blocks[0].id());
        assert!(manager.state().no_commitments());
    }

    #[tokio::test]
    async fn test_finalize_signals_pruned_head() {
        let mut storage = InMemoryDaStorage::default();
        let commitment = storage.insert(Bytes::from_static(b"batch"));
        let mut l1 = chain(14);
        let included = l1.block(2).unwrap();

        let mut manager = manager(storage);
        let signalled = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&signalled);
        manager.on_finalized_head_signal(Box::new(move |head| {
            if let Ok(mut heads) = sink.lock() {
                heads.push(head);
            }
        }));

        manager.reset(l1.blocks[0]);
        manager.get_input(&mut l1.provider, commitment, included).await.unwrap();
        let expiry = l1.block(12).unwrap();
        manager.advance_l1_origin(&mut l1.provider, expiry.id()).await.unwrap();
        assert_eq!(manager.state().commitments_len(), 0);

        manager.finalize(expiry);
        assert_eq!(manager.finalized_head(), included);
        assert_eq!(signalled.lock().unwrap().as_slice(), &[included]);
        assert!(manager.state().no_commitments());

        // Without commitments the finalized head trails the L1 finalized head.
        let tip = l1.tip().unwrap();
        manager.finalize(tip);
        manager.advance_l1_origin(&mut l1.provider, tip.id()).await.unwrap();
        assert_eq!(manager.finalized_head(), l1.block(4).unwrap());
        assert_ne!(manager.finalized_head().hash, B256::ZERO);
    }
}
