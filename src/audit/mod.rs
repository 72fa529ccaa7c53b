//! Audit store
//!
//! Relational mirror of committed ledger transfers plus the user directory.
//! The ledger stays authoritative: a transfer may have committed even when its
//! record is missing here.

pub mod memory;
pub mod postgres;

pub use memory::InMemoryAuditStore;
pub use postgres::PgAuditStore;

use crate::models::{AccountId, Page, TransactionRecord, TransactionView, User};
use crate::Result;
use uuid::Uuid;

#[async_trait::async_trait]
pub trait AuditStore: Send + Sync {
    async fn insert_user(&self, user: &User) -> Result<()>;

    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Reverse lookup used to link transfer recipients.
    async fn find_user_by_account(&self, account_id: AccountId) -> Result<Option<User>>;

    /// Failures surface as `BankingError::AuditWrite`.
    async fn record_transaction(&self, record: &TransactionRecord) -> Result<()>;

    /// Rows where the user is initiator or recipient, newest first.
    async fn history(&self, user_id: Uuid, page: Page) -> Result<Vec<TransactionView>>;

    async fn count_history(&self, user_id: Uuid) -> Result<u64>;

    async fn find_by_transfer_id(&self, transfer_id: &str) -> Result<Option<TransactionRecord>>;
}
