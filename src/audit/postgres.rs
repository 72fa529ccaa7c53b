//! PostgreSQL audit store.

use super::AuditStore;
use crate::error::BankingError;
use crate::models::{
    AccountId, Page, TransactionRecord, TransactionStatus, TransactionType, TransactionView, User,
};
use crate::Result;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::info;
use uuid::Uuid;

pub struct PgAuditStore {
    pool: PgPool,
    schema_ready: Arc<OnceCell<()>>,
}

impl PgAuditStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            schema_ready: Arc::new(OnceCell::new()),
        }
    }

    /// Build a lazily connecting pool. Nothing touches the network until the
    /// first query.
    pub fn connect_lazy(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect_lazy(url)
            .map_err(|e| BankingError::Database(format!("Failed to configure pool: {}", e)))?;

        info!(max_connections, "Audit store backend: postgres");
        Ok(Self::new(pool))
    }

    /// Create tables and indexes once per process.
    pub async fn ensure_schema(&self) -> Result<()> {
        let pool = &self.pool;

        self.schema_ready
            .get_or_try_init(|| async {
                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS users (
                      id UUID PRIMARY KEY,
                      email TEXT NOT NULL UNIQUE,
                      credential_hash TEXT NOT NULL,
                      display_name TEXT NOT NULL,
                      account_id BIGINT NOT NULL UNIQUE,
                      created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                    );
                    "#,
                )
                .execute(pool)
                .await?;

                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS transactions (
                      id UUID PRIMARY KEY,
                      seq BIGSERIAL,
                      user_id UUID NOT NULL REFERENCES users(id),
                      recipient_user_id UUID REFERENCES users(id),
                      type TEXT NOT NULL,
                      amount BIGINT NOT NULL,
                      status TEXT NOT NULL,
                      debit_account_id BIGINT NOT NULL,
                      credit_account_id BIGINT NOT NULL,
                      transfer_id TEXT NOT NULL UNIQUE,
                      description TEXT NOT NULL DEFAULT '',
                      created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                    );
                    "#,
                )
                .execute(pool)
                .await?;

                sqlx::query(
                    r#"
                    CREATE INDEX IF NOT EXISTS idx_transactions_user_time
                    ON transactions (user_id, created_at DESC);
                    "#,
                )
                .execute(pool)
                .await?;

                sqlx::query(
                    r#"
                    CREATE INDEX IF NOT EXISTS idx_transactions_recipient_time
                    ON transactions (recipient_user_id, created_at DESC);
                    "#,
                )
                .execute(pool)
                .await?;

                Ok::<(), sqlx::Error>(())
            })
            .await
            .map_err(|e| {
                BankingError::Database(format!("Failed to initialize audit schema: {}", e))
            })?;

        Ok(())
    }
}

fn db_error(context: &str, e: sqlx::Error) -> BankingError {
    BankingError::Database(format!("{}: {}", context, e))
}

fn account_to_db(account_id: AccountId) -> Result<i64> {
    i64::try_from(account_id).map_err(|_| {
        BankingError::Validation(format!("account id {} is out of range", account_id))
    })
}

/// Debit and credit columns of a record; range failures are write failures.
fn record_accounts(record: &TransactionRecord) -> Result<(i64, i64)> {
    let to_audit = |e: BankingError| BankingError::AuditWrite(e.to_string());
    Ok((
        account_to_db(record.debit_account_id).map_err(to_audit)?,
        account_to_db(record.credit_account_id).map_err(to_audit)?,
    ))
}

fn account_from_db(value: i64) -> Result<AccountId> {
    u64::try_from(value)
        .map_err(|_| BankingError::Database(format!("negative account id {} in store", value)))
}

fn user_from_row(row: &PgRow) -> Result<User> {
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        credential_hash: row.try_get("credential_hash")?,
        display_name: row.try_get("display_name")?,
        account_id: account_from_db(row.try_get("account_id")?)?,
        created_at: row.try_get("created_at")?,
    })
}

fn record_from_row(row: &PgRow) -> Result<TransactionRecord> {
    let kind: String = row.try_get("type")?;
    let status: String = row.try_get("status")?;

    Ok(TransactionRecord {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        recipient_user_id: row.try_get("recipient_user_id")?,
        kind: TransactionType::parse(&kind)
            .ok_or_else(|| BankingError::Database(format!("unknown transaction type '{}'", kind)))?,
        amount: row.try_get("amount")?,
        status: TransactionStatus::parse(&status).ok_or_else(|| {
            BankingError::Database(format!("unknown transaction status '{}'", status))
        })?,
        debit_account_id: account_from_db(row.try_get("debit_account_id")?)?,
        credit_account_id: account_from_db(row.try_get("credit_account_id")?)?,
        transfer_id: row.try_get("transfer_id")?,
        description: row.try_get("description")?,
        created_at: row.try_get("created_at")?,
    })
}

const RECORD_COLUMNS: &str = "t.id, t.user_id, t.recipient_user_id, t.type, t.amount, t.status, \
     t.debit_account_id, t.credit_account_id, t.transfer_id, t.description, t.created_at";

#[async_trait::async_trait]
impl AuditStore for PgAuditStore {
    async fn insert_user(&self, user: &User) -> Result<()> {
        self.ensure_schema().await?;

        sqlx::query(
            r#"
            INSERT INTO users (id, email, credential_hash, display_name, account_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.credential_hash)
        .bind(&user.display_name)
        .bind(account_to_db(user.account_id)?)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to insert user", e))?;

        Ok(())
    }

    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>> {
        self.ensure_schema().await?;

        let row = sqlx::query(
            "SELECT id, email, credential_hash, display_name, account_id, created_at \
             FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to load user", e))?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.ensure_schema().await?;

        let row = sqlx::query(
            "SELECT id, email, credential_hash, display_name, account_id, created_at \
             FROM users WHERE email = $1",
        )
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to load user by email", e))?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_user_by_account(&self, account_id: AccountId) -> Result<Option<User>> {
        self.ensure_schema().await?;

        let row = sqlx::query(
            "SELECT id, email, credential_hash, display_name, account_id, created_at \
             FROM users WHERE account_id = $1",
        )
        .bind(account_to_db(account_id)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to load user by account", e))?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn record_transaction(&self, record: &TransactionRecord) -> Result<()> {
        self.ensure_schema()
            .await
            .map_err(|e| BankingError::AuditWrite(e.to_string()))?;
        let (debit_account_id, credit_account_id) = record_accounts(record)?;

        sqlx::query(
            r#"
            INSERT INTO transactions (
              id, user_id, recipient_user_id, type, amount, status,
              debit_account_id, credit_account_id, transfer_id, description, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(record.id)
        .bind(record.user_id)
        .bind(record.recipient_user_id)
        .bind(record.kind.as_str())
        .bind(record.amount)
        .bind(record.status.as_str())
        .bind(debit_account_id)
        .bind(credit_account_id)
        .bind(&record.transfer_id)
        .bind(&record.description)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| BankingError::AuditWrite(format!("Failed to insert transaction: {}", e)))?;

        Ok(())
    }

    async fn history(&self, user_id: Uuid, page: Page) -> Result<Vec<TransactionView>> {
        self.ensure_schema().await?;

        let sql = format!(
            "SELECT {}, r.email AS recipient_email, r.display_name AS recipient_name \
             FROM transactions t \
             LEFT JOIN users r ON r.id = t.recipient_user_id \
             WHERE t.user_id = $1 OR t.recipient_user_id = $1 \
             ORDER BY t.created_at DESC, t.seq DESC \
             LIMIT $2 OFFSET $3",
            RECORD_COLUMNS
        );

        let rows = sqlx::query(&sql)
            .bind(user_id)
            .bind(page.limit as i64)
            .bind(page.offset() as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to load history", e))?;

        rows.iter()
            .map(|row| {
                let record = record_from_row(row)?;
                let mut view = TransactionView::new(record, None);
                view.recipient_email = row.try_get("recipient_email")?;
                view.recipient_name = row.try_get("recipient_name")?;
                Ok(view)
            })
            .collect()
    }

    async fn count_history(&self, user_id: Uuid) -> Result<u64> {
        self.ensure_schema().await?;

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM transactions WHERE user_id = $1 OR recipient_user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to count history", e))?;

        Ok(count.max(0) as u64)
    }

    async fn find_by_transfer_id(&self, transfer_id: &str) -> Result<Option<TransactionRecord>> {
        self.ensure_schema().await?;

        let sql = format!(
            "SELECT {} FROM transactions t WHERE t.transfer_id = $1",
            RECORD_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(transfer_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to load transaction", e))?;

        row.as_ref().map(record_from_row).transpose()
    }
}
