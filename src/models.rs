use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AccountError;

pub const PERSONAL_WITHDRAW_LIMIT: Decimal = Decimal::from_parts(1000, 0, 0, false, 0);
pub const CORPORATE_WITHDRAW_LIMIT: Decimal = Decimal::from_parts(5000, 0, 0, false, 0);

/// Money carries at most cents; the relational backend stores `NUMERIC(15, 2)`.
pub const MONEY_SCALE: u32 = 2;

const WITHDRAWAL_DESCRIPTION: &str = "Cash withdrawal";
const DEPOSIT_DESCRIPTION: &str = "Cash deposit";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Withdrawal,
    Deposit,
}

/// A ledger entry. Never modified after it is appended to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Fails with `InvalidAmount` when `amount` has sub-cent digits.
pub fn check_money_scale(amount: Decimal) -> Result<(), AccountError> {
    if amount.normalize().scale() > MONEY_SCALE {
        return Err(AccountError::InvalidAmount);
    }
    Ok(())
}

fn check_positive_amount(amount: Decimal) -> Result<(), AccountError> {
    if amount <= Decimal::ZERO {
        return Err(AccountError::InvalidAmount);
    }
    check_money_scale(amount)
}

impl Transaction {
    fn new(amount: Decimal, kind: TransactionKind, description: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            amount,
            kind,
            description: description.to_string(),
            created_at: Utc::now(),
        }
    }
}

/// Variant-specific part of a client. The serialized `type` tag doubles as the
/// persisted discriminator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientKind {
    Personal { cpf: String },
    Corporate { cnpj: String },
}

impl ClientKind {
    pub const PERSONAL: &'static str = "personal";
    pub const CORPORATE: &'static str = "corporate";

    pub fn discriminator(&self) -> &'static str {
        match self {
            ClientKind::Personal { .. } => Self::PERSONAL,
            ClientKind::Corporate { .. } => Self::CORPORATE,
        }
    }

    pub fn national_id(&self) -> &str {
        match self {
            ClientKind::Personal { cpf } => cpf,
            ClientKind::Corporate { cnpj } => cnpj,
        }
    }

    pub fn withdraw_limit(&self) -> Decimal {
        match self {
            ClientKind::Personal { .. } => PERSONAL_WITHDRAW_LIMIT,
            ClientKind::Corporate { .. } => CORPORATE_WITHDRAW_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    id: Uuid,
    name: String,
    balance: Decimal,
    #[serde(flatten)]
    kind: ClientKind,
    transactions: Vec<Transaction>,
    version: i64,
}

impl Client {
    pub fn new_personal(
        name: impl Into<String>,
        cpf: impl Into<String>,
        initial_balance: Decimal,
    ) -> Self {
        let kind = ClientKind::Personal { cpf: cpf.into() };
        Self::new(name.into(), kind, initial_balance)
    }

    pub fn new_corporate(
        name: impl Into<String>,
        cnpj: impl Into<String>,
        initial_balance: Decimal,
    ) -> Self {
        let kind = ClientKind::Corporate { cnpj: cnpj.into() };
        Self::new(name.into(), kind, initial_balance)
    }

    fn new(name: String, kind: ClientKind, initial_balance: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            balance: initial_balance,
            kind,
            transactions: Vec::new(),
            version: 0,
        }
    }

    /// Rebuilds a client from persisted state.
    pub fn restore(
        id: Uuid,
        name: String,
        balance: Decimal,
        kind: ClientKind,
        transactions: Vec<Transaction>,
        version: i64,
    ) -> Self {
        Self {
            id,
            name,
            balance,
            kind,
            transactions,
            version,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &ClientKind {
        &self.kind
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    pub fn withdraw_limit(&self) -> Decimal {
        self.kind.withdraw_limit()
    }

    /// Chronological transaction history.
    pub fn statement(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub(crate) fn set_version(&mut self, version: i64) {
        self.version = version;
    }

    /// Withdraws `amount`. Checks run in a fixed order: amount, then limit,
    /// then funds, so an over-limit request never reports insufficient funds.
    /// Amounts must be positive with at most two decimal places.
    pub fn withdraw(&mut self, amount: Decimal) -> Result<(), AccountError> {
        check_positive_amount(amount)?;

        let limit = self.withdraw_limit();
        if amount > limit {
            return Err(AccountError::WithdrawLimitExceeded { limit });
        }

        if amount > self.balance {
            return Err(AccountError::InsufficientFunds {
                balance: self.balance,
            });
        }

        self.balance -= amount;
        self.transactions.push(Transaction::new(
            amount,
            TransactionKind::Withdrawal,
            WITHDRAWAL_DESCRIPTION,
        ));

        Ok(())
    }

    pub fn deposit(&mut self, amount: Decimal) -> Result<(), AccountError> {
        check_positive_amount(amount)?;

        self.balance += amount;
        self.transactions.push(Transaction::new(
            amount,
            TransactionKind::Deposit,
            DEPOSIT_DESCRIPTION,
        ));

        Ok(())
    }
}

/// Body of the client creation endpoints. `cpf` and `cnpj` are accepted as
/// aliases of `national_id`.
#[derive(Debug, Deserialize)]
pub struct CreateClientRequest {
    pub name: String,
    #[serde(alias = "cpf", alias = "cnpj")]
    pub national_id: String,
    pub initial_balance: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct AmountRequest {
    pub amount: Decimal,
}
