use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::{AccountError, ServiceError, StoreError};
use crate::models::{check_money_scale, Client, Transaction};
use crate::store::ClientStore;

/// Attempts for a read-modify-write before a version conflict is surfaced.
const MAX_UPDATE_ATTEMPTS: usize = 3;

/// Client use cases on top of an injected store.
#[derive(Clone)]
pub struct ClientService {
    store: Arc<dyn ClientStore>,
}

impl ClientService {
    pub fn new(store: Arc<dyn ClientStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self, name, cpf))]
    pub async fn create_personal(
        &self,
        name: String,
        cpf: String,
        initial_balance: Decimal,
    ) -> Result<Client, ServiceError> {
        check_initial_balance(initial_balance)?;
        let client = Client::new_personal(name, cpf, initial_balance);
        self.store.create_personal_client(&client).await?;

        info!(client_id = %client.id(), "personal client created");
        Ok(client)
    }

    #[instrument(skip(self, name, cnpj))]
    pub async fn create_corporate(
        &self,
        name: String,
        cnpj: String,
        initial_balance: Decimal,
    ) -> Result<Client, ServiceError> {
        check_initial_balance(initial_balance)?;
        let client = Client::new_corporate(name, cnpj, initial_balance);
        self.store.create_corporate_client(&client).await?;

        info!(client_id = %client.id(), "corporate client created");
        Ok(client)
    }

    pub async fn get(&self, id: Uuid) -> Result<Client, ServiceError> {
        Ok(self.store.get_client(id).await?)
    }

    pub async fn list(&self) -> Result<Vec<Client>, ServiceError> {
        Ok(self.store.list_clients().await?)
    }

    pub async fn statement(&self, id: Uuid) -> Result<Vec<Transaction>, ServiceError> {
        let client = self.store.get_client(id).await?;
        Ok(client.statement().to_vec())
    }

    #[instrument(skip(self))]
    pub async fn withdraw(&self, id: Uuid, amount: Decimal) -> Result<Client, ServiceError> {
        self.apply(id, |client| client.withdraw(amount)).await
    }

    #[instrument(skip(self))]
    pub async fn deposit(&self, id: Uuid, amount: Decimal) -> Result<Client, ServiceError> {
        self.apply(id, |client| client.deposit(amount)).await
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<Client, ServiceError> {
        let client = self.store.delete_client(id).await?;

        info!("client deleted");
        Ok(client)
    }

    /// Fetches the client, applies `operation` and writes it back, starting
    /// over from a fresh read when another writer got there first.
    async fn apply<F>(&self, id: Uuid, operation: F) -> Result<Client, ServiceError>
    where
        F: Fn(&mut Client) -> Result<(), AccountError>,
    {
        let mut attempt = 1;
        loop {
            let mut client = self.store.get_client(id).await?;

            if let Err(error) = operation(&mut client) {
                warn!(%error, "operation rejected");
                return Err(error.into());
            }

            match self.store.update_client(&mut client).await {
                Ok(()) => {
                    info!(balance = %client.balance(), "balance updated");
                    return Ok(client);
                }
                Err(StoreError::Conflict(_)) if attempt < MAX_UPDATE_ATTEMPTS => {
                    warn!(attempt, "concurrent update detected, retrying");
                    attempt += 1;
                }
                Err(error) => return Err(error.into()),
            }
        }
    }
}

fn check_initial_balance(amount: Decimal) -> Result<(), AccountError> {
    if amount < Decimal::ZERO {
        return Err(AccountError::InvalidAmount);
    }
    check_money_scale(amount)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::error::StoreResult;
    use crate::store::MemoryClientStore;

    /// Wraps the in-memory store and fails the first `conflicts` updates.
    struct ContendedStore {
        inner: MemoryClientStore,
        conflicts: AtomicUsize,
        updates: AtomicUsize,
    }

    impl ContendedStore {
        fn new(conflicts: usize) -> Self {
            Self {
                inner: MemoryClientStore::new(),
                conflicts: AtomicUsize::new(conflicts),
                updates: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ClientStore for ContendedStore {
        async fn insert_client(&self, client: &Client) -> StoreResult<()> {
            self.inner.insert_client(client).await
        }

        async fn get_client(&self, id: Uuid) -> StoreResult<Client> {
            self.inner.get_client(id).await
        }

        async fn update_client(&self, client: &mut Client) -> StoreResult<()> {
            self.updates.fetch_add(1, Ordering::SeqCst);
            let remaining = self.conflicts.load(Ordering::SeqCst);
            if remaining > 0 {
                self.conflicts.store(remaining - 1, Ordering::SeqCst);
                return Err(StoreError::Conflict(client.id()));
            }
            self.inner.update_client(client).await
        }

        async fn list_clients(&self) -> StoreResult<Vec<Client>> {
            self.inner.list_clients().await
        }

        async fn delete_client(&self, id: Uuid) -> StoreResult<Client> {
            self.inner.delete_client(id).await
        }
    }

    #[tokio::test]
    async fn withdraw_persists_the_new_balance() {
        let service = ClientService::new(Arc::new(MemoryClientStore::new()));
        let client = service
            .create_personal("John Doe".into(), "123.456.789-00".into(), dec!(2000))
            .await
            .unwrap();

        let updated = service.withdraw(client.id(), dec!(500)).await.unwrap();
        assert_eq!(updated.balance(), dec!(1500));

        let stored = service.get(client.id()).await.unwrap();
        assert_eq!(stored.balance(), dec!(1500));
        assert_eq!(service.statement(client.id()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rejected_withdraw_leaves_store_untouched() {
        let service = ClientService::new(Arc::new(MemoryClientStore::new()));
        let client = service
            .create_corporate("ACME Corp".into(), "12.345.678/0001-00".into(), dec!(10000))
            .await
            .unwrap();

        let result = service.withdraw(client.id(), dec!(6000)).await;
        assert!(matches!(
            result,
            Err(ServiceError::Account(AccountError::WithdrawLimitExceeded { .. }))
        ));

        let stored = service.get(client.id()).await.unwrap();
        assert_eq!(stored, client);
    }

    #[tokio::test]
    async fn unknown_client_is_not_found() {
        let service = ClientService::new(Arc::new(MemoryClientStore::new()));

        assert!(matches!(
            service.withdraw(Uuid::new_v4(), dec!(1)).await,
            Err(ServiceError::Store(StoreError::NotFound(_)))
        ));
    }

    #[tokio::test]
    async fn negative_initial_balance_is_rejected() {
        let service = ClientService::new(Arc::new(MemoryClientStore::new()));

        assert!(matches!(
            service
                .create_personal("John Doe".into(), "123.456.789-00".into(), dec!(-1))
                .await,
            Err(ServiceError::Account(AccountError::InvalidAmount))
        ));
        assert!(service.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sub_cent_initial_balance_is_rejected() {
        let service = ClientService::new(Arc::new(MemoryClientStore::new()));

        assert!(matches!(
            service
                .create_corporate("ACME Corp".into(), "12.345.678/0001-00".into(), dec!(10.005))
                .await,
            Err(ServiceError::Account(AccountError::InvalidAmount))
        ));
        assert!(service.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn conflicts_are_retried() {
        let store = Arc::new(ContendedStore::new(2));
        let service = ClientService::new(store.clone());
        let client = service
            .create_personal("John Doe".into(), "123.456.789-00".into(), dec!(2000))
            .await
            .unwrap();

        let updated = service.withdraw(client.id(), dec!(100)).await.unwrap();

        assert_eq!(updated.balance(), dec!(1900));
        assert_eq!(updated.statement().len(), 1);
        assert_eq!(store.updates.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn persistent_conflict_is_surfaced() {
        let store = Arc::new(ContendedStore::new(usize::MAX));
        let service = ClientService::new(store.clone());
        let client = service
            .create_personal("John Doe".into(), "123.456.789-00".into(), dec!(2000))
            .await
            .unwrap();

        assert!(matches!(
            service.withdraw(client.id(), dec!(100)).await,
            Err(ServiceError::Store(StoreError::Conflict(_)))
        ));
        assert_eq!(store.updates.load(Ordering::SeqCst), MAX_UPDATE_ATTEMPTS);
        assert_eq!(service.get(client.id()).await.unwrap().balance(), dec!(2000));
    }

    #[tokio::test]
    async fn concurrent_withdrawals_do_not_lose_updates() {
        let service = ClientService::new(Arc::new(MemoryClientStore::new()));
        let client = service
            .create_corporate("ACME Corp".into(), "12.345.678/0001-00".into(), dec!(10000))
            .await
            .unwrap();

        let tasks: Vec<_> = (0..2)
            .map(|_| {
                let service = service.clone();
                let id = client.id();
                tokio::spawn(async move { service.withdraw(id, dec!(1000)).await })
            })
            .collect();

        let mut succeeded = 0;
        for task in tasks {
            if task.await.unwrap().is_ok() {
                succeeded += 1;
            }
        }

        let stored = service.get(client.id()).await.unwrap();
        assert_eq!(stored.statement().len(), succeeded);
        assert_eq!(stored.balance(), dec!(10000) - dec!(1000) * Decimal::from(succeeded));
    }
}
