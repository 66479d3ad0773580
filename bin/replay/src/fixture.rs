//! The recorded L1 chain a replay runs over.

use alloy_consensus::{Header, Receipt};
use alloy_eips::eip4844::Blob;
use alloy_primitives::{Bytes, FixedBytes, B256};
use anyhow::{Context, Result};
use mako_derive::types::{BlockInfo, L1Transaction};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A recorded L1 chain, with the alt-DA inputs its commitments point to.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fixture {
    /// The L1 blocks, in ascending order.
    pub l1_blocks: Vec<FixtureBlock>,
    /// The inputs of the alt-DA server.
    #[serde(default)]
    pub da_inputs: Vec<Bytes>,
}

/// An L1 block of the [Fixture].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureBlock {
    /// The block reference.
    #[serde(flatten)]
    pub info: BlockInfo,
    /// The base fee of the block.
    #[serde(default)]
    pub base_fee_per_gas: Option<u64>,
    /// The excess blob gas of the block, after Cancun.
    #[serde(default)]
    pub excess_blob_gas: Option<u64>,
    /// The randao mix of the block.
    #[serde(default)]
    pub mix_hash: B256,
    /// The transactions of the block.
    #[serde(default)]
    pub transactions: Vec<L1Transaction>,
    /// The receipts of the block, in transaction order.
    #[serde(default)]
    pub receipts: Vec<Receipt>,
    /// The blobs carried by the block.
    #[serde(default)]
    pub blobs: Vec<FixtureBlob>,
}

impl FixtureBlock {
    /// Returns the header the attributes builder reads the L1 info from.
    pub fn header(&self) -> Header {
        Header {
            parent_hash: self.info.parent_hash,
            number: self.info.number,
            timestamp: self.info.timestamp,
            base_fee_per_gas: self.base_fee_per_gas,
            excess_blob_gas: self.excess_blob_gas,
            mix_hash: self.mix_hash,
            ..Default::default()
        }
    }
}

/// A blob sidecar of a [FixtureBlock].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureBlob {
    /// The index of the blob within the block.
    pub index: u64,
    /// The blob.
    pub blob: Box<Blob>,
    /// The KZG commitment of the blob.
    pub kzg_commitment: FixedBytes<48>,
    /// The KZG proof of the blob.
    #[serde(default)]
    pub kzg_proof: FixedBytes<48>,
}

impl Fixture {
    /// Reads a fixture from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading fixture {}", path.display()))?;
        let fixture: Self = serde_json::from_str(&raw)
            .with_context(|| format!("parsing fixture {}", path.display()))?;
        Ok(fixture)
    }

    /// Returns the block with the given number.
    pub fn block_by_number(&self, number: u64) -> Option<&FixtureBlock> {
        self.l1_blocks.iter().find(|b| b.info.number == number)
    }

    /// Returns the block with the given hash.
    pub fn block_by_hash(&self, hash: B256) -> Option<&FixtureBlock> {
        self.l1_blocks.iter().find(|b| b.info.hash == hash)
    }
}
