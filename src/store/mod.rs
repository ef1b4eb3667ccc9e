//! Client persistence boundary.
//!
//! `ClientStore` is implemented by an in-memory map and by Postgres. Both
//! backends own the canonical copy of every client: callers always get an
//! owned `Client` back and must write changes through `update_client`.

pub mod memory;
pub mod postgres;

pub use memory::MemoryClientStore;
pub use postgres::PgClientStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::models::{Client, ClientKind};

#[async_trait]
pub trait ClientStore: Send + Sync {
    /// Persists a new client of any variant. Fails with `Conflict` if the id
    /// is already taken.
    async fn insert_client(&self, client: &Client) -> StoreResult<()>;

    /// Loads a client as its concrete variant.
    async fn get_client(&self, id: Uuid) -> StoreResult<Client>;

    /// Writes balance and transaction history back for the record matching
    /// both the client's id and its variant.
    ///
    /// The stored version must equal `client.version()`; on success the
    /// stored version and `client`'s version are both incremented. A missing
    /// record (or a variant mismatch) is `NotFound`, a stale version is
    /// `Conflict`. Neither failure modifies the store.
    async fn update_client(&self, client: &mut Client) -> StoreResult<()>;

    async fn list_clients(&self) -> StoreResult<Vec<Client>>;

    /// Removes a client and returns what was stored.
    async fn delete_client(&self, id: Uuid) -> StoreResult<Client>;

    /// Schema setup. No-op unless the backend needs one.
    async fn init_tables(&self) -> StoreResult<()> {
        Ok(())
    }

    /// Connection teardown. No-op unless the backend holds connections.
    async fn close(&self) {}

    async fn create_personal_client(&self, client: &Client) -> StoreResult<()> {
        expect_variant(client, ClientKind::PERSONAL)?;
        self.insert_client(client).await
    }

    async fn create_corporate_client(&self, client: &Client) -> StoreResult<()> {
        expect_variant(client, ClientKind::CORPORATE)?;
        self.insert_client(client).await
    }
}

fn expect_variant(client: &Client, expected: &'static str) -> StoreResult<()> {
    let found = client.kind().discriminator();
    if found != expected {
        return Err(StoreError::VariantMismatch { expected, found });
    }
    Ok(())
}
