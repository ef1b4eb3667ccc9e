use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use tracing::instrument;
use uuid::Uuid;

use super::ClientStore;
use crate::error::{StoreError, StoreResult};
use crate::models::Client;

/// In-memory client store.
///
/// The lock is held for a single map access only, never across two calls.
#[derive(Debug, Default)]
pub struct MemoryClientStore {
    clients: RwLock<HashMap<Uuid, Client>>,
}

impl MemoryClientStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ClientStore for MemoryClientStore {
    #[instrument(skip_all, fields(client_id = %client.id()))]
    async fn insert_client(&self, client: &Client) -> StoreResult<()> {
        let mut clients = self.clients.write().unwrap_or_else(PoisonError::into_inner);

        match clients.entry(client.id()) {
            Entry::Occupied(_) => Err(StoreError::Conflict(client.id())),
            Entry::Vacant(slot) => {
                slot.insert(client.clone());
                Ok(())
            }
        }
    }

    async fn get_client(&self, id: Uuid) -> StoreResult<Client> {
        let clients = self.clients.read().unwrap_or_else(PoisonError::into_inner);

        clients.get(&id).cloned().ok_or(StoreError::NotFound(id))
    }

    #[instrument(skip_all, fields(client_id = %client.id(), version = client.version()))]
    async fn update_client(&self, client: &mut Client) -> StoreResult<()> {
        let mut clients = self.clients.write().unwrap_or_else(PoisonError::into_inner);

        let stored = clients
            .get_mut(&client.id())
            .filter(|stored| stored.kind().discriminator() == client.kind().discriminator())
            .ok_or(StoreError::NotFound(client.id()))?;

        if stored.version() != client.version() {
            return Err(StoreError::Conflict(client.id()));
        }

        client.set_version(client.version() + 1);
        *stored = client.clone();
        Ok(())
    }

    async fn list_clients(&self) -> StoreResult<Vec<Client>> {
        let clients = self.clients.read().unwrap_or_else(PoisonError::into_inner);

        Ok(clients.values().cloned().collect())
    }

    #[instrument(skip(self))]
    async fn delete_client(&self, id: Uuid) -> StoreResult<Client> {
        let mut clients = self.clients.write().unwrap_or_else(PoisonError::into_inner);

        clients.remove(&id).ok_or(StoreError::NotFound(id))
    }
}
