//! Open buffer of accepted records awaiting a block.

use shared_types::Record;
use std::collections::VecDeque;

/// Rejected append: taking the records would pass the hard limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferFull {
    pub requested: usize,
    pub buffered: usize,
    pub limit: usize,
}

#[derive(Debug)]
pub struct RecordBuffer {
    records: VecDeque<Record>,
    limit: usize,
}

impl RecordBuffer {
    pub fn new(limit: usize) -> Self {
        Self {
            records: VecDeque::new(),
            limit,
        }
    }

    /// Append all records or none. Returns the new buffered count.
    pub fn push_all(&mut self, records: Vec<Record>) -> Result<usize, BufferFull> {
        if self.records.len() + records.len() > self.limit {
            return Err(BufferFull {
                requested: records.len(),
                buffered: self.records.len(),
                limit: self.limit,
            });
        }
        self.records.extend(records);
        Ok(self.records.len())
    }

    /// Remove up to `n` records in arrival order.
    pub fn take(&mut self, n: usize) -> Vec<Record> {
        let n = n.min(self.records.len());
        self.records.drain(..n).collect()
    }

    /// Put records back at the front after a failed seal.
    pub fn restore_front(&mut self, records: Vec<Record>) {
        for record in records.into_iter().rev() {
            self.records.push_front(record);
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}
