//! # Query Service

use crate::domain::cursor::RecordCursor;
use crate::error::{QueryError, Result};
use crate::ports::{QueryApi, RecordStream};
use futures::StreamExt;
use ql_02_block_storage::{BlockStorageApi, StorageError};
use ql_04_ledger_core::CommittedHead;
use shared_types::{Block, Record};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

pub struct QueryService {
    store: Arc<dyn BlockStorageApi>,
    head: watch::Receiver<CommittedHead>,
}

impl QueryService {
    /// `head` comes from `LedgerApi::subscribe_head`.
    pub fn new(store: Arc<dyn BlockStorageApi>, head: watch::Receiver<CommittedHead>) -> Self {
        Self { store, head }
    }

    fn visible(&self, sequence: u64) -> bool {
        sequence < self.committed_length()
    }
}

impl QueryApi for QueryService {
    fn get_record(&self, id: &str) -> Result<Record> {
        let not_found = || QueryError::RecordNotFound { id: id.to_string() };
        let sequence = self.store.locate_record(id)?.ok_or_else(not_found)?;
        if !self.visible(sequence) {
            return Err(not_found());
        }
        let block = self.store.read_block(sequence)?;
        match block.records.into_iter().find(|r| r.id() == id) {
            Some(record) => Ok(record),
            None => {
                warn!(id, sequence, "[ql-06] Record index points at a block without the record");
                Err(QueryError::IndexInconsistent {
                    id: id.to_string(),
                    sequence,
                })
            }
        }
    }

    fn get_block(&self, sequence: u64) -> Result<Block> {
        if !self.visible(sequence) {
            return Err(QueryError::BlockNotFound { sequence });
        }
        self.store.read_block(sequence).map_err(|e| match e {
            StorageError::BlockNotFound { sequence } => QueryError::BlockNotFound { sequence },
            other => other.into(),
        })
    }

    fn records_in_range(&self, from: u64, to: u64) -> Result<Vec<Record>> {
        if from > to {
            return Err(QueryError::InvalidRange { from, to });
        }
        let length = self.committed_length();
        if from >= length {
            return Ok(Vec::new());
        }
        let to = to.min(length - 1);
        let blocks = self.store.read_block_range(from, to)?;
        debug!(from, to, blocks = blocks.len(), "[ql-06] Range export");
        Ok(blocks.into_iter().flat_map(|b| b.records).collect())
    }

    fn stream_records(&self, since: u64) -> RecordStream {
        let cursor = RecordCursor::new(self.store.clone(), self.head.clone(), since);
        futures::stream::unfold(cursor, |mut cursor| async move {
            cursor.next().await.map(|item| (item, cursor))
        })
        .boxed()
    }

    fn committed_length(&self) -> u64 {
        self.head.borrow().length
    }
}
