//! # Committed Record Cursor
//!
//! Walks committed blocks from a starting sequence and yields their records
//! in order. When it catches up with the head it parks on the head watch
//! channel; it finishes once the ledger has closed and everything committed
//! has been yielded.

use crate::error::QueryError;
use ql_02_block_storage::BlockStorageApi;
use ql_04_ledger_core::CommittedHead;
use shared_types::Record;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::watch;

pub struct RecordCursor {
    store: Arc<dyn BlockStorageApi>,
    head: watch::Receiver<CommittedHead>,
    next_sequence: u64,
    ready: VecDeque<Record>,
    finished: bool,
}

impl RecordCursor {
    pub fn new(
        store: Arc<dyn BlockStorageApi>,
        head: watch::Receiver<CommittedHead>,
        since: u64,
    ) -> Self {
        Self {
            store,
            head,
            next_sequence: since,
            ready: VecDeque::new(),
            finished: false,
        }
    }

    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Next committed record, waiting for the head to advance if needed.
    /// `None` once the ledger closed and the cursor drained, or after an
    /// error was returned.
    pub async fn next(&mut self) -> Option<Result<Record, QueryError>> {
        loop {
            if let Some(record) = self.ready.pop_front() {
                return Some(Ok(record));
            }
            if self.finished {
                return None;
            }

            let head = *self.head.borrow_and_update();
            if self.next_sequence < head.length {
                match self.store.read_block(self.next_sequence) {
                    Ok(block) => {
                        self.ready.extend(block.records);
                        self.next_sequence += 1;
                    }
                    Err(e) => {
                        self.finished = true;
                        return Some(Err(e.into()));
                    }
                }
                continue;
            }

            if head.closed {
                self.finished = true;
                continue;
            }
            // Ledger dropped without closing; nothing more can commit.
            if self.head.changed().await.is_err() {
                self.finished = true;
            }
        }
    }
}
