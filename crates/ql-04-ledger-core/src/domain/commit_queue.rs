//! Signed blocks waiting for their turn to commit.
//!
//! Signing completes in any order; commits happen strictly by sequence.

use shared_types::Block;
use std::collections::BTreeMap;

#[derive(Debug)]
pub struct CommitQueue {
    next: u64,
    ready: BTreeMap<u64, Block>,
}

impl CommitQueue {
    /// `next` is the committed chain length.
    pub fn new(next: u64) -> Self {
        Self {
            next,
            ready: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, block: Block) {
        self.ready.insert(block.sequence(), block);
    }

    /// The block that may commit now, if it has been signed.
    pub fn peek_next(&self) -> Option<&Block> {
        self.ready.get(&self.next)
    }

    /// Drop the block at `next` after a successful commit.
    pub fn advance(&mut self) -> Option<Block> {
        let block = self.ready.remove(&self.next)?;
        self.next += 1;
        Some(block)
    }

    pub fn next_sequence(&self) -> u64 {
        self.next
    }

    /// Signed blocks held back by an earlier gap.
    pub fn waiting(&self) -> usize {
        self.ready.len()
    }
}
