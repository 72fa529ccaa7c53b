//! In-memory audit store for development and tests.

use super::AuditStore;
use crate::error::BankingError;
use crate::models::{AccountId, Page, TransactionRecord, TransactionView, User};
use crate::Result;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    /// Insertion order; later entries win ties on `created_at`.
    transactions: Vec<TransactionRecord>,
}

#[derive(Default)]
pub struct InMemoryAuditStore {
    tables: RwLock<Tables>,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn involves(record: &TransactionRecord, user_id: Uuid) -> bool {
    record.user_id == user_id || record.recipient_user_id == Some(user_id)
}

#[async_trait::async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn insert_user(&self, user: &User) -> Result<()> {
        let mut tables = self.tables.write().await;

        let duplicate = tables
            .users
            .values()
            .any(|u| u.id == user.id || u.email == user.email || u.account_id == user.account_id);
        if duplicate {
            return Err(BankingError::Database(format!(
                "user {} conflicts with an existing user",
                user.id
            )));
        }

        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>> {
        Ok(self.tables.read().await.users.get(&user_id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = email.trim();
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_account(&self, account_id: AccountId) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.account_id == account_id)
            .cloned())
    }

    async fn record_transaction(&self, record: &TransactionRecord) -> Result<()> {
        let mut tables = self.tables.write().await;

        if tables
            .transactions
            .iter()
            .any(|r| r.id == record.id || r.transfer_id == record.transfer_id)
        {
            return Err(BankingError::AuditWrite(format!(
                "duplicate record for transfer {}",
                record.transfer_id
            )));
        }

        tables.transactions.push(record.clone());
        Ok(())
    }

    async fn history(&self, user_id: Uuid, page: Page) -> Result<Vec<TransactionView>> {
        let tables = self.tables.read().await;

        let mut matching: Vec<(usize, &TransactionRecord)> = tables
            .transactions
            .iter()
            .enumerate()
            .filter(|(_, r)| involves(r, user_id))
            .collect();
        matching.sort_by(|(ia, a), (ib, b)| b.created_at.cmp(&a.created_at).then(ib.cmp(ia)));

        Ok(matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit as usize)
            .map(|(_, record)| {
                let recipient = record
                    .recipient_user_id
                    .and_then(|id| tables.users.get(&id));
                TransactionView::new(record.clone(), recipient)
            })
            .collect())
    }

    async fn count_history(&self, user_id: Uuid) -> Result<u64> {
        let tables = self.tables.read().await;
        Ok(tables
            .transactions
            .iter()
            .filter(|r| involves(r, user_id))
            .count() as u64)
    }

    async fn find_by_transfer_id(&self, transfer_id: &str) -> Result<Option<TransactionRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .transactions
            .iter()
            .find(|r| r.transfer_id == transfer_id)
            .cloned())
    }
}
