//! A byte-bounded queue of payloads received ahead of derivation.

use crate::{ExecutionPayload, UnsafePayloadError};
use alloy_primitives::B256;
use hashbrown::HashSet;
use std::collections::BTreeMap;

/// The default byte budget of the [UnsafePayloadQueue]: 500 MiB.
pub const DEFAULT_MAX_UNSAFE_PAYLOADS_BYTES: u64 = 500 * 1024 * 1024;

/// Unsafe payloads ordered by block number.
///
/// Once the accounted size exceeds the budget the lowest-numbered payloads are evicted first.
#[derive(Debug, Clone)]
pub struct UnsafePayloadQueue {
    payloads: BTreeMap<(u64, B256), ExecutionPayload>,
    hashes: HashSet<B256>,
    size: u64,
    max_size: u64,
}

impl UnsafePayloadQueue {
    /// Creates an empty queue with the given byte budget.
    pub fn new(max_size: u64) -> Self {
        Self { payloads: BTreeMap::new(), hashes: HashSet::new(), size: 0, max_size }
    }

    /// Queues the payload, evicting the oldest payloads while over budget.
    pub fn push(&mut self, payload: ExecutionPayload) -> Result<(), UnsafePayloadError> {
        if self.hashes.contains(&payload.block_hash) {
            return Err(UnsafePayloadError::Duplicate(payload.block_hash));
        }
        let size = payload.mem_size();
        if size > self.max_size {
            return Err(UnsafePayloadError::TooLarge { size, max: self.max_size });
        }

        self.size += size;
        self.hashes.insert(payload.block_hash);
        self.payloads.insert((payload.block_number, payload.block_hash), payload);

        while self.size > self.max_size {
            let Some(evicted) = self.pop() else { break };
            debug!(
                target: "driver",
                "Evicted unsafe payload #{} over the {} byte budget",
                evicted.block_number,
                self.max_size
            );
        }
        Ok(())
    }

    /// Returns the lowest-numbered payload.
    pub fn peek(&self) -> Option<&ExecutionPayload> {
        self.payloads.first_key_value().map(|(_, payload)| payload)
    }

    /// Removes and returns the lowest-numbered payload.
    pub fn pop(&mut self) -> Option<ExecutionPayload> {
        let (_, payload) = self.payloads.pop_first()?;
        self.hashes.remove(&payload.block_hash);
        self.size -= payload.mem_size();
        Some(payload)
    }

    /// Returns the number of queued payloads.
    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    /// Returns true if no payload is queued.
    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }

    /// Returns the accounted size of the queued payloads.
    pub const fn mem_size(&self) -> u64 {
        self.size
    }
}

impl Default for UnsafePayloadQueue {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_UNSAFE_PAYLOADS_BYTES)
    }
}
