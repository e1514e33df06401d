//! Per-block lifecycle tracking for blocks that are not yet committed.

use shared_types::BlockState;
use std::collections::BTreeMap;
use tracing::{debug, warn};

#[derive(Debug, Default)]
pub struct BlockStates {
    live: BTreeMap<u64, BlockState>,
}

impl BlockStates {
    /// Record a transition. Committed blocks leave the table.
    pub fn transition(&mut self, sequence: u64, next: BlockState) {
        let current = self.live.get(&sequence).copied().unwrap_or(BlockState::Buffering);
        if !current.can_transition_to(next) {
            warn!(
                "[ql-04] Unexpected transition for block #{}: {:?} -> {:?}",
                sequence, current, next
            );
        } else {
            debug!("[ql-04] Block #{}: {:?} -> {:?}", sequence, current, next);
        }
        if next.is_terminal() {
            self.live.remove(&sequence);
        } else {
            self.live.insert(sequence, next);
        }
    }

    /// Set a state without validation (recovery after restart).
    pub fn restore(&mut self, sequence: u64, state: BlockState) {
        self.live.insert(sequence, state);
    }

    /// Forget a block whose seal never completed.
    pub fn discard(&mut self, sequence: u64) {
        self.live.remove(&sequence);
    }

    pub fn get(&self, sequence: u64) -> Option<BlockState> {
        self.live.get(&sequence).copied()
    }
}
