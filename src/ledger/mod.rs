//! Ledger adapter
//!
//! The ledger is the source of truth for balances. It is reached through the
//! [`Ledger`] trait: batch calls that return per-item result codes for the
//! items that failed only. An empty result vector means every item was applied.

pub mod client;
pub mod http;
pub mod memory;
pub mod resolve;
pub mod types;

pub use client::{LedgerClient, Submission};
pub use http::HttpLedger;
pub use memory::InMemoryLedger;
pub use resolve::{resolve_address, DEFAULT_LEDGER_PORT};
pub use types::{
    Account, AccountError, AccountFlags, CreateAccountResult, CreateTransferResult, Transfer,
    TransferCode, TransferError,
};

use crate::Result;

/// The single currency ledger every account and transfer lives on.
pub const LEDGER_ID: u32 = 1;

/// Bank-side account used as the counterparty for deposits and withdrawals.
pub const SYSTEM_ACCOUNT_ID: u128 = 1;
pub const SYSTEM_ACCOUNT_CODE: u16 = 999;
pub const USER_ACCOUNT_CODE: u16 = 1;

/// Ledger backend.
///
/// `Err` is reserved for transport failures; business rejections come back as
/// result codes in the `Ok` vector.
#[async_trait::async_trait]
pub trait Ledger: Send + Sync {
    async fn create_accounts(&self, accounts: &[Account]) -> Result<Vec<AccountError>>;

    async fn create_transfers(&self, transfers: &[Transfer]) -> Result<Vec<TransferError>>;

    /// Accounts that exist among `ids`. Unknown ids are omitted.
    async fn lookup_accounts(&self, ids: &[u128]) -> Result<Vec<Account>>;
}
