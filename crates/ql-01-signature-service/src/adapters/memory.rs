//! In-memory identity repository for tests and single-process deployments.

use crate::ports::outbound::{IdentityRepository, RepositoryError};
use parking_lot::RwLock;
use shared_types::{Identity, IdentityId};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct InMemoryIdentityRepository {
    identities: RwLock<HashMap<IdentityId, Identity>>,
}

impl InMemoryIdentityRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentityRepository for InMemoryIdentityRepository {
    fn get(&self, id: &IdentityId) -> Result<Option<Identity>, RepositoryError> {
        Ok(self.identities.read().get(id).cloned())
    }

    fn put(&self, identity: &Identity) -> Result<(), RepositoryError> {
        self.identities
            .write()
            .insert(identity.id.clone(), identity.clone());
        Ok(())
    }

    fn list(&self) -> Result<Vec<Identity>, RepositoryError> {
        let mut all: Vec<Identity> = self.identities.read().values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }
}
