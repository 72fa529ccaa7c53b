//! Ledger client used by the transaction service.

use super::http::HttpLedger;
use super::resolve::resolve_address;
use super::types::{
    Account, AccountFlags, CreateAccountResult, CreateTransferResult, Transfer, TransferError,
};
use super::{Ledger, LEDGER_ID, SYSTEM_ACCOUNT_CODE, SYSTEM_ACCOUNT_ID, USER_ACCOUNT_CODE};
use crate::error::BankingError;
use crate::models::AccountId;
use crate::retry::RetryPolicy;
use crate::Result;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Outcome of a single-transfer submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Applied,
    /// The id was already committed; nothing moved this time.
    AlreadyApplied,
}

#[derive(Clone)]
pub struct LedgerClient {
    backend: Arc<dyn Ledger>,
}

impl LedgerClient {
    pub fn new(backend: Arc<dyn Ledger>) -> Self {
        Self { backend }
    }

    /// Resolve `address`, reach the gateway and make sure the system account
    /// exists. Exhausting `connect_policy` is fatal.
    pub async fn connect(
        address: &str,
        resolve_policy: &RetryPolicy,
        connect_policy: &RetryPolicy,
    ) -> Result<Self> {
        info!(address, "Connecting to ledger");
        let resolved = resolve_address(address, resolve_policy).await;
        let client = Self::new(Arc::new(HttpLedger::new(&resolved)?));

        connect_policy
            .run("ledger connect", |_| client.ensure_system_account())
            .await
            .map_err(|e| {
                error!(address, resolved = %resolved, error = %e, "Ledger unreachable");
                BankingError::LedgerUnavailable(format!(
                    "could not reach ledger at {} after {} attempts: {}",
                    resolved, connect_policy.max_attempts, e
                ))
            })?;

        info!(resolved = %resolved, "Ledger client initialized");
        Ok(client)
    }

    pub fn system_account_id(&self) -> u128 {
        SYSTEM_ACCOUNT_ID
    }

    /// Create the bank system account. An existing one counts as success.
    pub async fn ensure_system_account(&self) -> Result<()> {
        let account = Account::new(
            SYSTEM_ACCOUNT_ID,
            LEDGER_ID,
            SYSTEM_ACCOUNT_CODE,
            AccountFlags::NONE,
        );
        let errors = self.backend.create_accounts(&[account]).await?;

        match errors.first() {
            None => {
                info!("System account created");
                Ok(())
            }
            Some(e) if e.result == CreateAccountResult::Exists => {
                info!("System account already exists");
                Ok(())
            }
            Some(e) => Err(BankingError::LedgerRejected(format!(
                "failed to create system account: {}",
                e.result
            ))),
        }
    }

    /// Create a user account that may never go below zero.
    pub async fn create_account(&self, account_id: AccountId) -> Result<()> {
        let account = Account::new(
            account_id as u128,
            LEDGER_ID,
            USER_ACCOUNT_CODE,
            AccountFlags::DEBITS_MUST_NOT_EXCEED_CREDITS,
        );
        let errors = self.backend.create_accounts(&[account]).await?;

        if let Some(e) = errors.first() {
            return Err(BankingError::LedgerRejected(format!(
                "failed to create account {}: {}",
                account_id, e.result
            )));
        }

        info!(account_id, "Created ledger account");
        Ok(())
    }

    pub async fn get_balance(&self, account_id: AccountId) -> Result<i64> {
        let accounts = self.backend.lookup_accounts(&[account_id as u128]).await?;
        let account = accounts
            .first()
            .ok_or_else(|| BankingError::NotFound(format!("account {} not found", account_id)))?;

        let balance = account.balance().ok_or_else(|| {
            BankingError::LedgerRejected(format!("balance of account {} overflows", account_id))
        })?;

        i64::try_from(balance).map_err(|_| {
            BankingError::LedgerRejected(format!(
                "balance of account {} is outside the supported range",
                account_id
            ))
        })
    }

    pub async fn account_exists(&self, account_id: AccountId) -> Result<bool> {
        let accounts = self.backend.lookup_accounts(&[account_id as u128]).await?;
        Ok(!accounts.is_empty())
    }

    /// Submit a batch; the returned vector holds the failed items only.
    pub async fn create_transfers(&self, transfers: &[Transfer]) -> Result<Vec<TransferError>> {
        self.backend.create_transfers(transfers).await
    }

    /// Submit one transfer. Resubmitting an identical, already committed
    /// transfer succeeds with [`Submission::AlreadyApplied`].
    pub async fn submit_transfer(&self, transfer: Transfer) -> Result<Submission> {
        let errors = self.create_transfers(&[transfer]).await?;
        match errors.into_iter().next() {
            None => Ok(Submission::Applied),
            Some(e) if e.result == CreateTransferResult::Exists => Ok(Submission::AlreadyApplied),
            Some(e) => {
                warn!(
                    transfer_id = %transfer.hex_id(),
                    result = %e.result,
                    "Ledger rejected transfer"
                );
                Err(e.into_banking_error())
            }
        }
    }

    pub async fn lookup_accounts(&self, ids: &[AccountId]) -> Result<Vec<Account>> {
        let ids: Vec<u128> = ids.iter().map(|id| *id as u128).collect();
        self.backend.lookup_accounts(&ids).await
    }
}
