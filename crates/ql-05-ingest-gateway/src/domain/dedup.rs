//! # Deduplication Index
//!
//! Record ids this ledger instance has accepted or is accepting. A submission
//! reserves its id before the append and only keeps it once the ledger took
//! the record; a dropped or failed submission releases it again.
//!
//! Only an accepted id is a duplicate. A second submission that finds the id
//! reserved waits for the first to settle and then tries again, so a failed
//! first attempt never swallows the second.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use shared_types::RecordId;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupState {
    /// A submission for this id is in flight.
    Reserved,
    /// Buffered, sealed or committed.
    Accepted,
}

#[derive(Debug)]
enum Slot {
    /// Closes when the owning reservation is kept or released.
    Reserved(watch::Receiver<()>),
    Accepted,
}

/// Outcome of trying to claim an id.
#[derive(Debug)]
pub enum Claim<'a> {
    /// The id is ours until the reservation is kept or dropped.
    Reserved(Reservation<'a>),
    /// Already accepted.
    Duplicate,
    /// Another submission holds the id; wait on this and claim again.
    InFlight(Settled),
}

/// Resolves once an in-flight reservation is kept or released.
#[derive(Debug)]
pub struct Settled(watch::Receiver<()>);

impl Settled {
    pub async fn wait(mut self) {
        // Only ever closes; the sender never sends.
        let _ = self.0.changed().await;
    }
}

#[derive(Debug, Default)]
pub struct DedupIndex {
    ids: DashMap<RecordId, Slot>,
}

impl DedupIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `id` for a submission.
    pub fn reserve(&self, id: &str) -> Claim<'_> {
        match self.ids.entry(id.to_string()) {
            Entry::Occupied(slot) => match slot.get() {
                Slot::Accepted => Claim::Duplicate,
                Slot::Reserved(settled) => Claim::InFlight(Settled(settled.clone())),
            },
            Entry::Vacant(slot) => {
                let (settled_tx, settled_rx) = watch::channel(());
                slot.insert(Slot::Reserved(settled_rx));
                Claim::Reserved(Reservation {
                    index: self,
                    id: id.to_string(),
                    kept: false,
                    _settled: settled_tx,
                })
            }
        }
    }

    /// Mark ids found in storage at startup.
    pub fn extend_accepted<I: IntoIterator<Item = RecordId>>(&self, ids: I) -> usize {
        let mut added = 0;
        for id in ids {
            if self.ids.insert(id, Slot::Accepted).is_none() {
                added += 1;
            }
        }
        added
    }

    pub fn state(&self, id: &str) -> Option<DedupState> {
        self.ids.get(id).map(|entry| match entry.value() {
            Slot::Reserved(_) => DedupState::Reserved,
            Slot::Accepted => DedupState::Accepted,
        })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// RAII claim on an id. Released on drop unless `keep` was called.
///
/// Waiters are woken when `_settled` drops, after the slot has been updated.
#[derive(Debug)]
pub struct Reservation<'a> {
    index: &'a DedupIndex,
    id: RecordId,
    kept: bool,
    _settled: watch::Sender<()>,
}

impl Reservation<'_> {
    /// The ledger accepted the record; the id stays taken.
    pub fn keep(mut self) {
        self.index.ids.insert(self.id.clone(), Slot::Accepted);
        self.kept = true;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.kept {
            self.index
                .ids
                .remove_if(&self.id, |_, slot| matches!(slot, Slot::Reserved(_)));
        }
    }
}
