//! Tracks commitments and the challenges raised against them.

use crate::{errors::AltDaError, Commitment};
use alloy_eips::BlockNumHash;
use alloy_primitives::Bytes;
use hashbrown::HashMap;
use mako_derive::types::BlockInfo;
use std::collections::VecDeque;
use tracing::debug;

/// The status of a challenge, as emitted by the `DataAvailabilityChallenge` contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ChallengeStatus {
    /// No challenge was raised.
    Uninitialized = 0,
    /// The challenge can still be resolved.
    Active = 1,
    /// The input was published on L1.
    Resolved = 2,
    /// The resolve window ended without a resolution.
    Expired = 3,
}

impl TryFrom<u8> for ChallengeStatus {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Uninitialized),
            1 => Ok(Self::Active),
            2 => Ok(Self::Resolved),
            3 => Ok(Self::Expired),
            other => Err(other),
        }
    }
}

/// A commitment read from a batcher transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedCommitment {
    /// The commitment.
    pub data: Commitment,
    /// The L1 block including the commitment.
    pub inclusion_block: BlockInfo,
    /// The last L1 block in which the commitment can be challenged.
    pub challenge_window_end: u64,
}

/// A challenge against a commitment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    /// The challenged commitment.
    pub commitment: Commitment,
    /// The number of the L1 block including the commitment.
    pub commitment_block_number: u64,
    /// The last L1 block in which the challenge can be resolved.
    pub resolve_window_end: u64,
    /// The input published by the resolution.
    pub input: Option<Bytes>,
    /// The status of the challenge.
    pub status: ChallengeStatus,
}

type ChallengeKey = (Commitment, u64);

/// The commitment and challenge state of the alt-DA manager.
///
/// Commitments and challenges are kept in inclusion order. Both move to an expired queue once
/// their window ends and are pruned when the expired entry is behind the finalized L1 head.
#[derive(Debug, Clone, Default)]
pub struct AltDaState {
    commitments: VecDeque<TrackedCommitment>,
    expired_commitments: VecDeque<TrackedCommitment>,
    challenges: VecDeque<ChallengeKey>,
    expired_challenges: VecDeque<ChallengeKey>,
    challenges_map: HashMap<ChallengeKey, Challenge>,
    last_pruned_commitment: BlockInfo,
    challenge_window: u64,
    resolve_window: u64,
}

impl AltDaState {
    /// Creates an empty state for the given windows.
    pub fn new(challenge_window: u64, resolve_window: u64) -> Self {
        Self { challenge_window, resolve_window, ..Default::default() }
    }

    /// Returns true if nothing is tracked.
    pub fn no_commitments(&self) -> bool {
        self.challenges.is_empty() &&
            self.expired_challenges.is_empty() &&
            self.commitments.is_empty() &&
            self.expired_commitments.is_empty()
    }

    /// Drops all commitments, keeping the challenges.
    pub fn clear_commitments(&mut self) {
        self.commitments.clear();
        self.expired_commitments.clear();
    }

    /// Drops all commitments and challenges.
    pub fn reset(&mut self) {
        self.clear_commitments();
        self.challenges.clear();
        self.expired_challenges.clear();
        self.challenges_map.clear();
    }

    /// Returns the inclusion block of the last pruned commitment.
    pub const fn last_pruned_commitment(&self) -> BlockInfo {
        self.last_pruned_commitment
    }

    /// Returns the number of commitments that have not expired.
    pub fn commitments_len(&self) -> usize {
        self.commitments.len()
    }

    /// Starts tracking a commitment included in `inclusion_block`.
    ///
    /// Tracking the most recent commitment again is a no-op.
    pub fn track_commitment(&mut self, data: Commitment, inclusion_block: BlockInfo) {
        if self
            .commitments
            .back()
            .is_some_and(|c| c.data == data && c.inclusion_block == inclusion_block)
        {
            return;
        }
        let challenge_window_end = inclusion_block.number + self.challenge_window;
        debug!(target: "alt_da", "Tracking commitment {data} included in block {}", inclusion_block.number);
        self.commitments.push_back(TrackedCommitment { data, inclusion_block, challenge_window_end });
    }

    /// Records a challenge raised in `challenge_block` against the commitment included in
    /// block `commitment_block_number`.
    pub fn create_challenge(
        &mut self,
        commitment: Commitment,
        challenge_block: BlockNumHash,
        commitment_block_number: u64,
    ) {
        let key = (commitment.clone(), commitment_block_number);
        let challenge = Challenge {
            commitment,
            commitment_block_number,
            resolve_window_end: challenge_block.number + self.resolve_window,
            input: None,
            status: ChallengeStatus::Active,
        };
        self.challenges.push_back(key.clone());
        self.challenges_map.insert(key, challenge);
    }

    /// Marks the challenge against the commitment as resolved with the published input.
    pub fn resolve_challenge(
        &mut self,
        commitment: &Commitment,
        commitment_block_number: u64,
        input: Option<Bytes>,
    ) -> Result<(), AltDaError> {
        let challenge = self
            .challenges_map
            .get_mut(&(commitment.clone(), commitment_block_number))
            .ok_or_else(|| AltDaError::InvalidChallenge(format!("untracked challenge on {commitment}")))?;
        challenge.input = input;
        challenge.status = ChallengeStatus::Resolved;
        Ok(())
    }

    /// Returns the challenge against the commitment, if any.
    pub fn challenge(&self, commitment: &Commitment, commitment_block_number: u64) -> Option<&Challenge> {
        self.challenges_map.get(&(commitment.clone(), commitment_block_number))
    }

    /// Returns the challenge status of the commitment.
    pub fn challenge_status(
        &self,
        commitment: &Commitment,
        commitment_block_number: u64,
    ) -> ChallengeStatus {
        self.challenge(commitment, commitment_block_number)
            .map_or(ChallengeStatus::Uninitialized, |c| c.status)
    }

    /// Expires every challenge whose resolve window ended at `origin`.
    pub fn expire_challenges(&mut self, origin: BlockNumHash) {
        while let Some(key) = self.challenges.front() {
            let Some(challenge) = self.challenges_map.get_mut(key) else {
                self.challenges.pop_front();
                continue;
            };
            if challenge.resolve_window_end > origin.number {
                break;
            }
            if challenge.status == ChallengeStatus::Active {
                debug!(target: "alt_da", "Challenge on {} expired at block {}", challenge.commitment, origin.number);
                challenge.status = ChallengeStatus::Expired;
            }
            if let Some(key) = self.challenges.pop_front() {
                self.expired_challenges.push_back(key);
            }
        }
    }

    /// Expires every commitment whose challenge window, or resolve window when challenged,
    /// ended at `origin`.
    ///
    /// Returns [AltDaError::ReorgRequired] if an expired commitment had an unresolved challenge:
    /// its data was derived and must be rolled back.
    pub fn expire_commitments(&mut self, origin: BlockNumHash) -> Result<(), AltDaError> {
        let mut result = Ok(());
        while let Some(commitment) = self.commitments.front() {
            let challenge = self.challenge(&commitment.data, commitment.inclusion_block.number);
            let expires_at = challenge.map_or(commitment.challenge_window_end, |c| c.resolve_window_end);
            if expires_at > origin.number {
                break;
            }
            if challenge.is_some_and(|c| c.status != ChallengeStatus::Resolved) {
                result = Err(AltDaError::ReorgRequired);
            }
            debug!(target: "alt_da", "Expiring commitment {} at block {}", commitment.data, origin.number);
            if let Some(commitment) = self.commitments.pop_front() {
                self.expired_commitments.push_back(commitment);
            }
        }
        result
    }

    /// Drops expired commitments and challenges that are no longer reachable from `origin`.
    pub fn prune(&mut self, origin: BlockNumHash) {
        self.prune_commitments(origin);
        self.prune_challenges(origin);
    }

    fn prune_commitments(&mut self, origin: BlockNumHash) {
        while let Some(commitment) = self.expired_commitments.front() {
            let expires_at = self
                .challenge(&commitment.data, commitment.inclusion_block.number)
                .map_or(commitment.challenge_window_end, |c| c.resolve_window_end);
            if expires_at > origin.number {
                break;
            }
            if let Some(commitment) = self.expired_commitments.pop_front() {
                self.last_pruned_commitment = commitment.inclusion_block;
            }
        }
    }

    fn prune_challenges(&mut self, origin: BlockNumHash) {
        while let Some(key) = self.expired_challenges.front() {
            let ended = self.challenges_map.get(key).map_or(0, |c| c.resolve_window_end);
            if ended > origin.number {
                break;
            }
            if let Some(key) = self.expired_challenges.pop_front() {
                self.challenges_map.remove(&key);
            }
        }
    }
}
