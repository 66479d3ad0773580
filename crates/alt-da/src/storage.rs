//! An in-memory [DaStorage].

use crate::{errors::DaStorageError, traits::DaStorage, Commitment};
use alloy_primitives::Bytes;
use async_trait::async_trait;
use hashbrown::HashMap;

/// A [DaStorage] holding its inputs in memory, keyed by commitment.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDaStorage {
    inputs: HashMap<Commitment, Bytes>,
}

impl InMemoryDaStorage {
    /// Stores `input` under its keccak256 commitment and returns the commitment.
    pub fn insert(&mut self, input: Bytes) -> Commitment {
        let commitment = Commitment::keccak256(&input);
        self.inputs.insert(commitment.clone(), input);
        commitment
    }

    /// Stores `input` under an arbitrary commitment.
    pub fn insert_with_commitment(&mut self, commitment: Commitment, input: Bytes) {
        self.inputs.insert(commitment, input);
    }

    /// Drops the input stored under the commitment.
    pub fn remove(&mut self, commitment: &Commitment) -> Option<Bytes> {
        self.inputs.remove(commitment)
    }
}

#[async_trait]
impl DaStorage for InMemoryDaStorage {
    async fn get_input(&mut self, commitment: &Commitment) -> Result<Bytes, DaStorageError> {
        self.inputs.get(commitment).cloned().ok_or(DaStorageError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_storage() {
        let mut storage = InMemoryDaStorage::default();
        let commitment = storage.insert(Bytes::from_static(b"input"));
        assert_eq!(storage.get_input(&commitment).await, Ok(Bytes::from_static(b"input")));

        storage.remove(&commitment);
        assert_eq!(storage.get_input(&commitment).await, Err(DaStorageError::NotFound));
    }
}
