//! In-process ledger used for development and tests.
//!
//! Items in a batch are applied independently, in order. A failing item does
//! not affect the others.

use super::types::{
    Account, AccountError, AccountFlags, CreateAccountResult, CreateTransferResult, Transfer,
    TransferError,
};
use super::Ledger;
use crate::Result;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct State {
    accounts: HashMap<u128, Account>,
    transfers: HashMap<u128, Transfer>,
}

#[derive(Default)]
pub struct InMemoryLedger {
    state: RwLock<State>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn transfer_count(&self) -> usize {
        self.state.read().await.transfers.len()
    }
}

fn validate_account(state: &State, account: &Account) -> Option<CreateAccountResult> {
    if account.id == 0 {
        return Some(CreateAccountResult::IdMustNotBeZero);
    }
    if account.ledger == 0 {
        return Some(CreateAccountResult::LedgerMustNotBeZero);
    }
    if account.code == 0 {
        return Some(CreateAccountResult::CodeMustNotBeZero);
    }

    let existing = state.accounts.get(&account.id)?;
    Some(if existing.flags != account.flags {
        CreateAccountResult::ExistsWithDifferentFlags
    } else if existing.ledger != account.ledger {
        CreateAccountResult::ExistsWithDifferentLedger
    } else if existing.code != account.code {
        CreateAccountResult::ExistsWithDifferentCode
    } else {
        CreateAccountResult::Exists
    })
}

fn apply_transfer(state: &mut State, transfer: &Transfer) -> Option<CreateTransferResult> {
    if transfer.id == 0 {
        return Some(CreateTransferResult::IdMustNotBeZero);
    }
    if transfer.debit_account_id == transfer.credit_account_id {
        return Some(CreateTransferResult::AccountsMustBeDifferent);
    }

    if let Some(existing) = state.transfers.get(&transfer.id) {
        return Some(if existing == transfer {
            CreateTransferResult::Exists
        } else {
            CreateTransferResult::ExistsWithDifferentFields
        });
    }

    if transfer.amount == 0 {
        return Some(CreateTransferResult::AmountMustNotBeZero);
    }

    let Some(debit) = state.accounts.get(&transfer.debit_account_id).copied() else {
        return Some(CreateTransferResult::DebitAccountNotFound);
    };
    let Some(credit) = state.accounts.get(&transfer.credit_account_id).copied() else {
        return Some(CreateTransferResult::CreditAccountNotFound);
    };
    if debit.ledger != credit.ledger || debit.ledger != transfer.ledger {
        return Some(CreateTransferResult::AccountsMustHaveTheSameLedger);
    }

    let Some(debits_after) = debit.debits_posted.checked_add(transfer.amount) else {
        return Some(CreateTransferResult::OverflowsDebits);
    };
    let Some(credits_after) = credit.credits_posted.checked_add(transfer.amount) else {
        return Some(CreateTransferResult::OverflowsCredits);
    };

    if debit.flags.contains(AccountFlags::DEBITS_MUST_NOT_EXCEED_CREDITS)
        && debits_after > debit.credits_posted
    {
        return Some(CreateTransferResult::ExceedsCredits);
    }

    if let Some(account) = state.accounts.get_mut(&transfer.debit_account_id) {
        account.debits_posted = debits_after;
    }
    if let Some(account) = state.accounts.get_mut(&transfer.credit_account_id) {
        account.credits_posted = credits_after;
    }
    state.transfers.insert(transfer.id, *transfer);

    None
}

#[async_trait::async_trait]
impl Ledger for InMemoryLedger {
    async fn create_accounts(&self, accounts: &[Account]) -> Result<Vec<AccountError>> {
        let mut state = self.state.write().await;
        let mut errors = Vec::new();

        for (index, account) in accounts.iter().enumerate() {
            match validate_account(&state, account) {
                Some(result) => errors.push(AccountError {
                    index: index as u32,
                    result,
                }),
                None => {
                    let mut fresh = *account;
                    fresh.debits_posted = 0;
                    fresh.credits_posted = 0;
                    state.accounts.insert(fresh.id, fresh);
                }
            }
        }

        Ok(errors)
    }

    async fn create_transfers(&self, transfers: &[Transfer]) -> Result<Vec<TransferError>> {
        let mut state = self.state.write().await;
        let mut errors = Vec::new();

        for (index, transfer) in transfers.iter().enumerate() {
            if let Some(result) = apply_transfer(&mut state, transfer) {
                errors.push(TransferError {
                    index: index as u32,
                    result,
                });
            }
        }

        Ok(errors)
    }

    async fn lookup_accounts(&self, ids: &[u128]) -> Result<Vec<Account>> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.accounts.get(id).copied())
            .collect())
    }
}
