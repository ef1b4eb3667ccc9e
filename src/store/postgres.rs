//! Postgres-backed client store.
//!
//! One `clients` row per client. The variant lives in `client_type` and only
//! the matching national-id column is filled; the transaction history is a
//! JSONB array in insertion order.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use sqlx::{FromRow, PgPool};
use tracing::instrument;
use uuid::Uuid;

use super::ClientStore;
use crate::error::{StoreError, StoreResult};
use crate::models::{Client, ClientKind, Transaction};

const SELECT_CLIENT: &str =
    "SELECT id, name, balance, client_type, cpf, cnpj, transactions, version FROM clients";

#[derive(FromRow)]
struct ClientRow {
    id: Uuid,
    name: String,
    balance: Decimal,
    client_type: String,
    cpf: Option<String>,
    cnpj: Option<String>,
    transactions: Option<JsonValue>,
    version: i64,
}

impl TryFrom<ClientRow> for Client {
    type Error = StoreError;

    fn try_from(row: ClientRow) -> Result<Self, Self::Error> {
        let kind = match row.client_type.as_str() {
            ClientKind::PERSONAL => ClientKind::Personal {
                cpf: row.cpf.unwrap_or_default(),
            },
            ClientKind::CORPORATE => ClientKind::Corporate {
                cnpj: row.cnpj.unwrap_or_default(),
            },
            _ => return Err(StoreError::UnknownClientType(row.client_type)),
        };

        let transactions: Vec<Transaction> = match row.transactions {
            Some(json) => serde_json::from_value(json)?,
            None => Vec::new(),
        };

        Ok(Client::restore(
            row.id,
            row.name,
            row.balance,
            kind,
            transactions,
            row.version,
        ))
    }
}

#[derive(Debug, Clone)]
pub struct PgClientStore {
    pool: PgPool,
}

impl PgClientStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ClientStore for PgClientStore {
    #[instrument(skip_all, fields(client_id = %client.id()), err)]
    async fn insert_client(&self, client: &Client) -> StoreResult<()> {
        let transactions = serde_json::to_value(client.statement())?;
        let (cpf, cnpj) = match client.kind() {
            ClientKind::Personal { cpf } => (Some(cpf.as_str()), None),
            ClientKind::Corporate { cnpj } => (None, Some(cnpj.as_str())),
        };

        sqlx::query(
            "INSERT INTO clients (id, name, balance, client_type, cpf, cnpj, transactions, version)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(client.id())
        .bind(client.name())
        .bind(client.balance())
        .bind(client.kind().discriminator())
        .bind(cpf)
        .bind(cnpj)
        .bind(transactions)
        .bind(client.version())
        .execute(&self.pool)
        .await
        .map_err(|error| match error {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                StoreError::Conflict(client.id())
            }
            other => StoreError::Backend(other),
        })?;

        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn get_client(&self, id: Uuid) -> StoreResult<Client> {
        let row = sqlx::query_as::<_, ClientRow>(&format!("{SELECT_CLIENT} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound(id))?;

        Client::try_from(row)
    }

    #[instrument(skip_all, fields(client_id = %client.id(), version = client.version()), err)]
    async fn update_client(&self, client: &mut Client) -> StoreResult<()> {
        let transactions = serde_json::to_value(client.statement())?;
        let client_type = client.kind().discriminator();

        let result = sqlx::query(
            "UPDATE clients
             SET balance = $1, transactions = $2, version = version + 1
             WHERE id = $3 AND client_type = $4 AND version = $5",
        )
        .bind(client.balance())
        .bind(transactions)
        .bind(client.id())
        .bind(client_type)
        .bind(client.version())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let exists: bool = sqlx::query_scalar(
                "SELECT EXISTS (SELECT 1 FROM clients WHERE id = $1 AND client_type = $2)",
            )
            .bind(client.id())
            .bind(client_type)
            .fetch_one(&self.pool)
            .await?;

            return Err(if exists {
                StoreError::Conflict(client.id())
            } else {
                StoreError::NotFound(client.id())
            });
        }

        client.set_version(client.version() + 1);
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn list_clients(&self) -> StoreResult<Vec<Client>> {
        let rows = sqlx::query_as::<_, ClientRow>(&format!("{SELECT_CLIENT} ORDER BY name, id"))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Client::try_from).collect()
    }

    #[instrument(skip(self), err)]
    async fn delete_client(&self, id: Uuid) -> StoreResult<Client> {
        let row = sqlx::query_as::<_, ClientRow>(
            "DELETE FROM clients WHERE id = $1
             RETURNING id, name, balance, client_type, cpf, cnpj, transactions, version",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound(id))?;

        Client::try_from(row)
    }

    async fn init_tables(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|error| StoreError::Backend(error.into()))?;

        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn row(client_type: &str, transactions: Option<JsonValue>) -> ClientRow {
        ClientRow {
            id: Uuid::new_v4(),
            name: "John Doe".to_string(),
            balance: dec!(1500.00),
            client_type: client_type.to_string(),
            cpf: Some("123.456.789-00".to_string()),
            cnpj: None,
            transactions,
            version: 3,
        }
    }

    #[test]
    fn personal_row_becomes_personal_client() {
        let client = Client::try_from(row("personal", None)).unwrap();

        assert_eq!(
            client.kind(),
            &ClientKind::Personal {
                cpf: "123.456.789-00".to_string()
            }
        );
        assert_eq!(client.balance(), dec!(1500));
        assert_eq!(client.version(), 3);
        assert!(client.statement().is_empty());
    }

    #[test]
    fn unknown_discriminator_is_rejected() {
        assert!(matches!(
            Client::try_from(row("premium", None)),
            Err(StoreError::UnknownClientType(kind)) if kind == "premium"
        ));
    }

    #[test]
    fn malformed_history_is_a_serialization_error() {
        let history = json!([{ "id": "not-a-uuid", "amount": 1 }]);

        assert!(matches!(
            Client::try_from(row("personal", Some(history))),
            Err(StoreError::Serialization(_))
        ));
    }

    #[test]
    fn history_keeps_its_order() {
        let mut source = Client::new_personal("John Doe", "123.456.789-00", dec!(1000));
        source.withdraw(dec!(1)).unwrap();
        source.withdraw(dec!(2)).unwrap();
        source.deposit(dec!(3)).unwrap();
        let history = serde_json::to_value(source.statement()).unwrap();

        let client = Client::try_from(row("personal", Some(history))).unwrap();
        assert_eq!(client.statement(), source.statement());
    }
}
