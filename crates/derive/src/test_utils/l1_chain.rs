//! An in-memory L1 chain and batcher helpers for end-to-end pipeline tests.

use crate::{
    test_utils::TestChainProvider,
    types::{BlockInfo, ChannelId, Frame, L1Transaction, L2BlockInfo, PayloadAttributes},
};
use alloy_consensus::{Header, Receipt};
use alloy_primitives::{keccak256, Address, Bytes, B256};

/// Returns the hash of the mock L1 block with the given number.
pub fn l1_block_hash(number: u64) -> B256 {
    keccak256(number.to_be_bytes())
}

/// Returns the hash of the mock L2 block with the given number.
pub fn l2_block_hash(number: u64) -> B256 {
    keccak256([b"l2".as_slice(), &number.to_be_bytes()].concat())
}

/// A linear L1 chain backed by a [TestChainProvider].
///
/// Every block is inserted with its header, receipts and transactions, so the traversal, the
/// data sources and the attributes builder can all read it.
#[derive(Debug, Clone, Default)]
pub struct TestL1Chain {
    /// The provider serving the chain.
    pub provider: TestChainProvider,
    /// The blocks of the chain, in order.
    pub blocks: Vec<BlockInfo>,
}

impl TestL1Chain {
    /// Creates a chain starting at the given block.
    pub fn new(number: u64, timestamp: u64) -> Self {
        let mut chain = Self::default();
        let first =
            BlockInfo { hash: l1_block_hash(number), number, parent_hash: B256::ZERO, timestamp };
        chain.insert(first, Vec::new(), Vec::new());
        chain
    }

    /// Returns the block with the given number.
    pub fn block(&self, number: u64) -> Option<BlockInfo> {
        self.blocks.iter().find(|b| b.number == number).copied()
    }

    /// Returns the header of the block with the given number.
    pub fn header(&self, number: u64) -> Option<Header> {
        let hash = self.block(number)?.hash;
        self.provider.headers.iter().find(|(h, _)| *h == hash).map(|(_, header)| header.clone())
    }

    /// Returns the last block of the chain.
    pub fn tip(&self) -> Option<BlockInfo> {
        self.blocks.last().copied()
    }

    /// Appends a block with the given transactions and receipts.
    pub fn push(
        &mut self,
        timestamp: u64,
        transactions: Vec<L1Transaction>,
        receipts: Vec<Receipt>,
    ) -> BlockInfo {
        let (number, parent_hash) =
            self.tip().map_or((0, B256::ZERO), |parent| (parent.number + 1, parent.hash));
        let block = BlockInfo { hash: l1_block_hash(number), number, parent_hash, timestamp };
        self.insert(block, transactions, receipts);
        block
    }

    /// Appends an empty block.
    pub fn push_empty(&mut self, timestamp: u64) -> BlockInfo {
        self.push(timestamp, Vec::new(), Vec::new())
    }

    fn insert(&mut self, block: BlockInfo, transactions: Vec<L1Transaction>, receipts: Vec<Receipt>) {
        self.provider.insert_block_with_transactions(block.number, block, transactions);
        self.provider.insert_receipts(block.hash, receipts);
        self.provider.insert_header(
            block.hash,
            Header {
                number: block.number,
                timestamp: block.timestamp,
                parent_hash: block.parent_hash,
                ..Default::default()
            },
        );
        self.blocks.push(block);
    }
}

/// Builds a calldata transaction from `from` to `inbox`.
pub fn batcher_tx(from: Address, inbox: Address, input: Bytes) -> L1Transaction {
    L1Transaction {
        hash: keccak256(&input),
        tx_type: 2,
        from,
        to: Some(inbox),
        input,
        blob_versioned_hashes: Vec::new(),
    }
}

/// Splits a channel body over `count` frames of channel `id`; the last frame closes the channel.
pub fn channel_frames(id: ChannelId, body: &[u8], count: usize) -> Vec<Frame> {
    let size = body.len().div_ceil(count.max(1)).max(1);
    let mut chunks: Vec<&[u8]> = body.chunks(size).collect();
    if chunks.is_empty() {
        chunks.push(&[]);
    }
    let last = chunks.len().saturating_sub(1);
    chunks
        .into_iter()
        .enumerate()
        .map(|(i, data)| Frame { id, number: i as u16, data: data.to_vec(), is_last: i == last })
        .collect()
}

/// Returns the L2 block sealed from `attributes` on top of `parent`.
pub fn l2_child(parent: &L2BlockInfo, attributes: &PayloadAttributes) -> L2BlockInfo {
    let number = parent.block_info.number + 1;
    let block = BlockInfo {
        hash: l2_block_hash(number),
        number,
        parent_hash: parent.block_info.hash,
        timestamp: attributes.timestamp,
    };
    L2BlockInfo::from_payload(block, attributes).expect("attributes open with an L1 info deposit")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::ChainProvider;

    #[tokio::test]
    async fn test_chain_links_blocks() {
        let mut chain = TestL1Chain::new(1, 2);
        let next = chain.push_empty(4);
        assert_eq!(next.number, 2);
        assert_eq!(next.parent_hash, l1_block_hash(1));

        let mut provider = chain.provider.clone();
        assert_eq!(provider.block_info_by_number(2).await.unwrap(), next);
        assert_eq!(provider.header_by_hash(next.hash).await.unwrap().timestamp, 4);
        assert!(provider.receipts_by_hash(next.hash).await.unwrap().is_empty());
        assert_eq!(chain.header(1).unwrap().number, 1);
    }

    #[test]
    fn test_channel_frames_cover_body() {
        let body = (0..10u8).collect::<Vec<_>>();
        let frames = channel_frames([7; 16], &body, 3);
        assert_eq!(frames.len(), 3);
        assert!(frames[2].is_last && !frames[1].is_last);
        let joined: Vec<u8> = frames.iter().flat_map(|f| f.data.clone()).collect();
        assert_eq!(joined, body);

        let single = channel_frames([7; 16], &[], 1);
        assert_eq!(single.len(), 1);
        assert!(single[0].is_last);
    }
}
