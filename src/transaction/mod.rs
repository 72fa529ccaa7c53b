//! Transaction orchestration
//!
//! Coordinates the ledger and the audit store for every money movement:
//!
//! 1. Validate the request and resolve the accounts involved
//! 2. Commit a single transfer to the ledger (irrevocable)
//! 3. Mirror it into the audit store on a best-effort basis
//!
//! A failure in step 3 never turns a committed transfer into an error for the
//! caller. It is logged with everything needed to backfill the record.
//!
//! The `*_with_key` variants take the ledger transfer id from the caller, so a
//! repeated request commits once and returns the original receipt.

use crate::audit::AuditStore;
use crate::error::BankingError;
use crate::ledger::{LedgerClient, Submission, Transfer, TransferCode, LEDGER_ID};
use crate::models::{
    format_cents, AccountId, Page, Receipt, TransactionRecord, TransactionStatus, TransactionType,
    TransactionView, User,
};
use crate::Result;
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

pub struct TransactionService {
    ledger: Arc<LedgerClient>,
    audit: Arc<dyn AuditStore>,
}

/// One resolved money movement, ready to be committed.
struct Movement {
    kind: TransactionType,
    user: User,
    recipient: Option<User>,
    debit_account_id: AccountId,
    credit_account_id: AccountId,
    amount: i64,
    description: String,
}

impl TransactionService {
    pub fn new(ledger: Arc<LedgerClient>, audit: Arc<dyn AuditStore>) -> Self {
        Self { ledger, audit }
    }

    fn system_account(&self) -> AccountId {
        self.ledger.system_account_id() as AccountId
    }

    async fn load_user(&self, user_id: Uuid) -> Result<User> {
        self.audit
            .find_user(user_id)
            .await?
            .ok_or_else(|| BankingError::NotFound("user not found".to_string()))
    }

    fn require_positive(amount: i64, what: &str) -> Result<()> {
        if amount <= 0 {
            return Err(BankingError::Validation(format!(
                "{} amount must be positive",
                what
            )));
        }
        Ok(())
    }

    async fn preflight_balance(&self, user: &User, amount: i64) -> Result<()> {
        let balance = self.ledger.get_balance(user.account_id).await?;
        if balance < amount {
            return Err(BankingError::InsufficientFunds(format!(
                "insufficient funds: balance is {}, requested {}",
                format_cents(balance),
                format_cents(amount)
            )));
        }
        Ok(())
    }

    /// Register a user: fresh ledger account first, then the directory entry.
    pub async fn open_account(
        &self,
        email: &str,
        display_name: &str,
        credential_hash: &str,
    ) -> Result<User> {
        let email = email.trim();
        let display_name = display_name.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(BankingError::Validation("a valid email is required".to_string()));
        }
        if display_name.is_empty() {
            return Err(BankingError::Validation("display name is required".to_string()));
        }

        let account_id = generate_account_id();
        self.ledger.create_account(account_id).await?;

        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            credential_hash: credential_hash.to_string(),
            display_name: display_name.to_string(),
            account_id,
            created_at: Utc::now(),
        };

        if let Err(e) = self.audit.insert_user(&user).await {
            warn!(
                account_id,
                email = %user.email,
                error = %e,
                "Ledger account created but user insert failed; account left unowned"
            );
            return Err(e);
        }

        info!(user_id = %user.id, account_id, "Account opened");
        Ok(user)
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.audit.find_user_by_email(email).await
    }

    pub async fn get_balance(&self, user_id: Uuid) -> Result<i64> {
        let user = self.load_user(user_id).await?;
        self.ledger.get_balance(user.account_id).await
    }

    pub async fn deposit(&self, user_id: Uuid, amount: i64) -> Result<Receipt> {
        self.deposit_with_key(user_id, amount, None).await
    }

    /// Deposit whose ledger transfer id is `idempotency_key` when given.
    /// Repeating the call with the same key moves the money once.
    pub async fn deposit_with_key(
        &self,
        user_id: Uuid,
        amount: i64,
        idempotency_key: Option<u128>,
    ) -> Result<Receipt> {
        Self::require_positive(amount, "deposit")?;
        let user = self.load_user(user_id).await?;
        if let Some(receipt) = self.find_replay(&user, idempotency_key).await {
            return Ok(receipt);
        }

        let movement = Movement {
            kind: TransactionType::Deposit,
            debit_account_id: self.system_account(),
            credit_account_id: user.account_id,
            description: format!("Deposit of {}", format_cents(amount)),
            user,
            recipient: None,
            amount,
        };
        self.commit(movement, idempotency_key).await
    }

    pub async fn withdraw(&self, user_id: Uuid, amount: i64) -> Result<Receipt> {
        self.withdraw_with_key(user_id, amount, None).await
    }

    pub async fn withdraw_with_key(
        &self,
        user_id: Uuid,
        amount: i64,
        idempotency_key: Option<u128>,
    ) -> Result<Receipt> {
        Self::require_positive(amount, "withdrawal")?;
        let user = self.load_user(user_id).await?;
        if let Some(receipt) = self.find_replay(&user, idempotency_key).await {
            return Ok(receipt);
        }
        self.preflight_balance(&user, amount).await?;

        let movement = Movement {
            kind: TransactionType::Withdraw,
            debit_account_id: user.account_id,
            credit_account_id: self.system_account(),
            description: format!("Withdrawal of {}", format_cents(amount)),
            user,
            recipient: None,
            amount,
        };
        self.commit(movement, idempotency_key).await
    }

    pub async fn transfer(
        &self,
        from_user_id: Uuid,
        to_account_id: AccountId,
        amount: i64,
    ) -> Result<Receipt> {
        self.transfer_with_key(from_user_id, to_account_id, amount, None)
            .await
    }

    pub async fn transfer_with_key(
        &self,
        from_user_id: Uuid,
        to_account_id: AccountId,
        amount: i64,
        idempotency_key: Option<u128>,
    ) -> Result<Receipt> {
        Self::require_positive(amount, "transfer")?;
        let sender = self.load_user(from_user_id).await?;
        if let Some(receipt) = self.find_replay(&sender, idempotency_key).await {
            return Ok(receipt);
        }

        if to_account_id == sender.account_id {
            return Err(BankingError::Validation(
                "cannot transfer to your own account".to_string(),
            ));
        }
        if to_account_id as u128 == self.ledger.system_account_id()
            || !self.ledger.account_exists(to_account_id).await?
        {
            return Err(BankingError::NotFound(
                "destination account not found".to_string(),
            ));
        }

        self.preflight_balance(&sender, amount).await?;

        let recipient = match self.audit.find_user_by_account(to_account_id).await {
            Ok(found) => found,
            Err(e) => {
                warn!(to_account_id, error = %e, "Recipient lookup failed, recording without link");
                None
            }
        };

        let movement = Movement {
            kind: TransactionType::Transfer,
            debit_account_id: sender.account_id,
            credit_account_id: to_account_id,
            description: format!(
                "Transfer of {} to account {}",
                format_cents(amount),
                to_account_id
            ),
            user: sender,
            recipient,
            amount,
        };
        self.commit(movement, idempotency_key).await
    }

    /// Page and limit are clamped rather than rejected.
    pub async fn get_history(
        &self,
        user_id: Uuid,
        page: i64,
        limit: i64,
    ) -> Result<Vec<TransactionView>> {
        let user = self.load_user(user_id).await?;
        let page = Page::clamped(page, limit);
        self.audit.history(user.id, page).await
    }

    pub async fn history_count(&self, user_id: Uuid) -> Result<u64> {
        let user = self.load_user(user_id).await?;
        self.audit.count_history(user.id).await
    }

    /// Receipt of a movement this user already committed under `key`.
    async fn find_replay(&self, user: &User, key: Option<u128>) -> Option<Receipt> {
        let transfer_id = format!("{:032x}", key?);
        match self.audit.find_by_transfer_id(&transfer_id).await {
            Ok(Some(record)) if record.user_id == user.id => {
                info!(
                    transfer_id = %transfer_id,
                    user_id = %user.id,
                    "Replayed request, returning original receipt"
                );
                Some(Receipt::from(&record))
            }
            Ok(_) => None,
            Err(e) => {
                warn!(
                    transfer_id = %transfer_id,
                    error = %e,
                    "Replay lookup failed, relying on ledger idempotency"
                );
                None
            }
        }
    }

    /// Commit under `transfer_id`, or a fresh id when none is given.
    async fn commit(&self, movement: Movement, transfer_id: Option<u128>) -> Result<Receipt> {
        let transfer = Transfer {
            id: transfer_id.unwrap_or_else(|| Uuid::new_v4().as_u128()),
            debit_account_id: movement.debit_account_id as u128,
            credit_account_id: movement.credit_account_id as u128,
            amount: movement.amount as u128,
            ledger: LEDGER_ID,
            code: match movement.kind {
                TransactionType::Deposit => TransferCode::Deposit,
                TransactionType::Withdraw => TransferCode::Withdraw,
                TransactionType::Transfer => TransferCode::Transfer,
            }
            .as_u16(),
        };
        let transfer_id = transfer.hex_id();

        let receipt = Receipt {
            transfer_id: transfer_id.clone(),
            kind: movement.kind,
            amount: movement.amount,
            debit_account_id: movement.debit_account_id,
            credit_account_id: movement.credit_account_id,
        };

        if self.ledger.submit_transfer(transfer).await? == Submission::AlreadyApplied {
            info!(
                transfer_id = %transfer_id,
                user_id = %movement.user.id,
                "Transfer already committed, not recording again"
            );
            return Ok(receipt);
        }

        let record = TransactionRecord {
            id: Uuid::new_v4(),
            user_id: movement.user.id,
            recipient_user_id: movement.recipient.as_ref().map(|r| r.id),
            kind: movement.kind,
            amount: movement.amount,
            status: TransactionStatus::Completed,
            debit_account_id: movement.debit_account_id,
            credit_account_id: movement.credit_account_id,
            transfer_id: transfer_id.clone(),
            description: movement.description,
            created_at: Utc::now(),
        };

        if let Err(e) = self.audit.record_transaction(&record).await {
            error!(
                transfer_id = %transfer_id,
                user_id = %movement.user.id,
                kind = %movement.kind,
                amount = movement.amount,
                debit_account_id = movement.debit_account_id,
                credit_account_id = movement.credit_account_id,
                error = %e,
                "Transfer committed to ledger but audit record failed"
            );
        }

        info!(
            transfer_id = %transfer_id,
            user_id = %movement.user.id,
            kind = %movement.kind,
            amount = movement.amount,
            "Transaction completed"
        );

        Ok(receipt)
    }
}

/// Microsecond timestamp plus a random suffix below one million.
///
/// Stays well inside `i64` and never collides with the system account.
pub fn generate_account_id() -> AccountId {
    let micros = Utc::now().timestamp_micros().max(0) as u64;
    let jitter = (Uuid::new_v4().as_u128() % 1_000_000) as u64;
    micros.saturating_add(jitter).max(2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::InMemoryAuditStore;
    use crate::ledger::{
        Account, AccountError, CreateTransferResult, InMemoryLedger, Ledger, TransferError,
    };

    async fn create_test_service() -> TransactionService {
        let ledger = LedgerClient::new(Arc::new(InMemoryLedger::new()));
        ledger.ensure_system_account().await.unwrap();
        TransactionService::new(Arc::new(ledger), Arc::new(InMemoryAuditStore::new()))
    }

    async fn create_test_user(service: &TransactionService, name: &str) -> User {
        service
            .open_account(&format!("{}@example.com", name), name, "hash")
            .await
            .unwrap()
    }

    /// Audit store whose writes always fail.
    struct BrokenAuditStore(InMemoryAuditStore);

    #[async_trait::async_trait]
    impl AuditStore for BrokenAuditStore {
        async fn insert_user(&self, user: &User) -> Result<()> {
            self.0.insert_user(user).await
        }
        async fn find_user(&self, user_id: Uuid) -> Result<Option<User>> {
            self.0.find_user(user_id).await
        }
        async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
            self.0.find_user_by_email(email).await
        }
        async fn find_user_by_account(&self, account_id: AccountId) -> Result<Option<User>> {
            self.0.find_user_by_account(account_id).await
        }
        async fn record_transaction(&self, _record: &TransactionRecord) -> Result<()> {
            Err(BankingError::AuditWrite("connection refused".to_string()))
        }
        async fn history(&self, user_id: Uuid, page: Page) -> Result<Vec<TransactionView>> {
            self.0.history(user_id, page).await
        }
        async fn count_history(&self, user_id: Uuid) -> Result<u64> {
            self.0.count_history(user_id).await
        }
        async fn find_by_transfer_id(&self, id: &str) -> Result<Option<TransactionRecord>> {
            self.0.find_by_transfer_id(id).await
        }
    }

    /// Ledger that reports every transfer as overdrawing, as if a concurrent
    /// debit landed between the pre-flight check and the commit.
    struct OverdrawnLedger(InMemoryLedger);

    #[async_trait::async_trait]
    impl Ledger for OverdrawnLedger {
        async fn create_accounts(&self, accounts: &[Account]) -> Result<Vec<AccountError>> {
            self.0.create_accounts(accounts).await
        }
        async fn create_transfers(&self, transfers: &[Transfer]) -> Result<Vec<TransferError>> {
            Ok((0..transfers.len() as u32)
                .map(|index| TransferError {
                    index,
                    result: CreateTransferResult::ExceedsCredits,
                })
                .collect())
        }
        async fn lookup_accounts(&self, ids: &[u128]) -> Result<Vec<Account>> {
            let mut accounts = self.0.lookup_accounts(ids).await?;
            for account in &mut accounts {
                account.credits_posted = 1_000_000;
            }
            Ok(accounts)
        }
    }

    #[tokio::test]
    async fn test_deposit_withdraw_round_trip() {
        let service = create_test_service().await;
        let alice = create_test_user(&service, "alice").await;

        service.deposit(alice.id, 10_050).await.unwrap();
        assert_eq!(service.get_balance(alice.id).await.unwrap(), 10_050);

        let receipt = service.withdraw(alice.id, 3_000).await.unwrap();
        assert_eq!(receipt.kind, TransactionType::Withdraw);
        assert_eq!(receipt.transfer_id.len(), 32);
        assert_eq!(service.get_balance(alice.id).await.unwrap(), 7_050);

        let history = service.get_history(alice.id, 1, 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].record.kind, TransactionType::Withdraw);
        assert_eq!(history[0].amount_formatted, "$30.00");
        assert_eq!(history[1].record.amount, 10_050);
    }

    #[tokio::test]
    async fn test_non_positive_amounts_are_rejected() {
        let service = create_test_service().await;
        let alice = create_test_user(&service, "alice").await;

        for amount in [0, -5] {
            assert!(matches!(
                service.deposit(alice.id, amount).await,
                Err(BankingError::Validation(_))
            ));
            assert!(matches!(
                service.withdraw(alice.id, amount).await,
                Err(BankingError::Validation(_))
            ));
        }
        assert_eq!(service.history_count(alice.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_insufficient_funds_leaves_balance_untouched() {
        let service = create_test_service().await;
        let alice = create_test_user(&service, "alice").await;
        service.deposit(alice.id, 100).await.unwrap();

        let err = service.withdraw(alice.id, 200).await.unwrap_err();
        assert!(matches!(err, BankingError::InsufficientFunds(_)));
        assert_eq!(
            err.user_message(),
            "insufficient funds: balance is $1.00, requested $2.00"
        );
        assert_eq!(service.get_balance(alice.id).await.unwrap(), 100);
        assert_eq!(service.history_count(alice.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unknown_destination_is_not_found() {
        let service = create_test_service().await;
        let alice = create_test_user(&service, "alice").await;
        service.deposit(alice.id, 5_000).await.unwrap();

        let err = service.transfer(alice.id, 999_999, 100).await.unwrap_err();
        assert!(matches!(err, BankingError::NotFound(_)));

        let err = service.transfer(alice.id, 1, 100).await.unwrap_err();
        assert!(matches!(err, BankingError::NotFound(_)));

        let err = service
            .transfer(alice.id, alice.account_id, 100)
            .await
            .unwrap_err();
        assert!(matches!(err, BankingError::Validation(_)));

        assert_eq!(service.get_balance(alice.id).await.unwrap(), 5_000);
    }

    #[tokio::test]
    async fn test_transfer_between_users() {
        let service = create_test_service().await;
        let alice = create_test_user(&service, "alice").await;
        let bob = create_test_user(&service, "bob").await;

        service.deposit(alice.id, 10_000).await.unwrap();
        service.transfer(alice.id, bob.account_id, 2_500).await.unwrap();

        assert_eq!(service.get_balance(alice.id).await.unwrap(), 7_500);
        assert_eq!(service.get_balance(bob.id).await.unwrap(), 2_500);

        let alice_history = service.get_history(alice.id, 1, 10).await.unwrap();
        assert_eq!(alice_history.len(), 2);
        assert_eq!(alice_history[0].record.kind, TransactionType::Transfer);
        assert_eq!(alice_history[0].record.recipient_user_id, Some(bob.id));

        let bob_history = service.get_history(bob.id, 1, 10).await.unwrap();
        assert_eq!(bob_history.len(), 1);
        assert_eq!(bob_history[0].record.user_id, alice.id);
        assert_eq!(bob_history[0].record.recipient_user_id, Some(bob.id));
        assert_eq!(bob_history[0].recipient_email.as_deref(), Some("bob@example.com"));

        let err = service
            .transfer(bob.id, alice.account_id, 2_501)
            .await
            .unwrap_err();
        assert!(matches!(err, BankingError::InsufficientFunds(_)));
    }

    #[tokio::test]
    async fn test_same_key_commits_once() {
        let service = create_test_service().await;
        let alice = create_test_user(&service, "alice").await;
        service.deposit(alice.id, 10_000).await.unwrap();

        let key = Some(0xfeed_u128);
        let first = service.withdraw_with_key(alice.id, 5_000, key).await.unwrap();
        let second = service.withdraw_with_key(alice.id, 5_000, key).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.transfer_id, format!("{:032x}", 0xfeed_u128));
        assert_eq!(service.get_balance(alice.id).await.unwrap(), 5_000);
        assert_eq!(service.history_count(alice.id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_same_key_without_audit_record_relies_on_ledger() {
        let ledger = LedgerClient::new(Arc::new(InMemoryLedger::new()));
        ledger.ensure_system_account().await.unwrap();
        let service = TransactionService::new(
            Arc::new(ledger),
            Arc::new(BrokenAuditStore(InMemoryAuditStore::new())),
        );
        let alice = create_test_user(&service, "alice").await;

        let key = Some(42_u128);
        service.deposit_with_key(alice.id, 2_500, key).await.unwrap();
        let replay = service.deposit_with_key(alice.id, 2_500, key).await.unwrap();

        assert_eq!(replay.amount, 2_500);
        assert_eq!(service.get_balance(alice.id).await.unwrap(), 2_500);
    }

    #[tokio::test]
    async fn test_history_pages_are_contiguous() {
        let service = create_test_service().await;
        let alice = create_test_user(&service, "alice").await;
        for cents in 1..=25 {
            service.deposit(alice.id, cents).await.unwrap();
        }

        let all = service.get_history(alice.id, 1, 100).await.unwrap();
        assert_eq!(all.len(), 25);
        let amounts: Vec<i64> = all.iter().map(|v| v.record.amount).collect();
        assert_eq!(amounts, (1..=25).rev().collect::<Vec<i64>>());

        let first = service.get_history(alice.id, 1, 10).await.unwrap();
        let second = service.get_history(alice.id, 2, 10).await.unwrap();
        assert_eq!(first.len(), 10);
        assert_eq!(second.len(), 10);

        let first_ids: Vec<Uuid> = first.iter().map(|v| v.record.id).collect();
        let second_ids: Vec<Uuid> = second.iter().map(|v| v.record.id).collect();
        assert!(first_ids.iter().all(|id| !second_ids.contains(id)));

        let paged: Vec<Uuid> = first_ids.into_iter().chain(second_ids).collect();
        let expected: Vec<Uuid> = all.iter().take(20).map(|v| v.record.id).collect();
        assert_eq!(paged, expected);
    }

    #[tokio::test]
    async fn test_history_pagination_is_clamped() {
        let service = create_test_service().await;
        let alice = create_test_user(&service, "alice").await;
        for cents in 1..=12 {
            service.deposit(alice.id, cents).await.unwrap();
        }

        assert_eq!(service.get_history(alice.id, 0, 0).await.unwrap().len(), 10);
        assert_eq!(service.get_history(alice.id, 2, 500).await.unwrap().len(), 2);
        assert_eq!(service.get_history(alice.id, 1, 5).await.unwrap().len(), 5);

        let last = service.get_history(alice.id, 3, 5).await.unwrap();
        assert_eq!(last.len(), 2);
        assert_eq!(last[1].record.amount, 1);
        assert_eq!(service.history_count(alice.id).await.unwrap(), 12);
    }

    #[tokio::test]
    async fn test_deposit_withdraw_transfer_scenario() {
        let service = create_test_service().await;
        let a = create_test_user(&service, "a").await;
        let b = create_test_user(&service, "b").await;

        service.deposit(a.id, 10_000).await.unwrap();
        assert_eq!(service.get_balance(a.id).await.unwrap(), 10_000);

        service.withdraw(a.id, 3_000).await.unwrap();
        assert_eq!(service.get_balance(a.id).await.unwrap(), 7_000);
        let withdrawals: Vec<TransactionView> = service
            .get_history(a.id, 1, 100)
            .await
            .unwrap()
            .into_iter()
            .filter(|v| v.record.kind == TransactionType::Withdraw)
            .collect();
        assert_eq!(withdrawals.len(), 1);
        assert_eq!(withdrawals[0].record.amount, 3_000);

        let b_before = service.get_balance(b.id).await.unwrap();
        service.transfer(a.id, b.account_id, 2_000).await.unwrap();
        assert_eq!(service.get_balance(a.id).await.unwrap(), 5_000);
        assert_eq!(service.get_balance(b.id).await.unwrap(), b_before + 2_000);

        let latest = &service.get_history(a.id, 1, 1).await.unwrap()[0];
        assert_eq!(latest.record.kind, TransactionType::Transfer);
        assert_eq!(latest.record.user_id, a.id);
        assert_eq!(latest.record.recipient_user_id, Some(b.id));
        assert_eq!(latest.recipient_name.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_audit_failure_still_reports_success() {
        let ledger = LedgerClient::new(Arc::new(InMemoryLedger::new()));
        ledger.ensure_system_account().await.unwrap();
        let service = TransactionService::new(
            Arc::new(ledger),
            Arc::new(BrokenAuditStore(InMemoryAuditStore::new())),
        );
        let alice = create_test_user(&service, "alice").await;

        let receipt = service.deposit(alice.id, 4_200).await.unwrap();
        assert_eq!(receipt.amount, 4_200);
        assert_eq!(service.get_balance(alice.id).await.unwrap(), 4_200);
        assert_eq!(service.history_count(alice.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_ledger_check_is_final_after_preflight() {
        let ledger = LedgerClient::new(Arc::new(OverdrawnLedger(InMemoryLedger::new())));
        ledger.ensure_system_account().await.unwrap();
        let service =
            TransactionService::new(Arc::new(ledger), Arc::new(InMemoryAuditStore::new()));
        let alice = create_test_user(&service, "alice").await;

        let err = service.withdraw(alice.id, 500).await.unwrap_err();
        assert!(matches!(err, BankingError::InsufficientFunds(_)));
        assert_eq!(service.history_count(alice.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_registered_user_is_found_by_email() {
        let service = create_test_service().await;
        let alice = create_test_user(&service, "alice").await;

        let found = service.find_user_by_email("alice@example.com").await.unwrap();
        assert_eq!(found.map(|u| u.account_id), Some(alice.account_id));
        assert!(service
            .find_user_by_email("nobody@example.com")
            .await
            .unwrap()
            .is_none());

        let err = service
            .open_account("alice@example.com", "Alice again", "hash")
            .await
            .unwrap_err();
        assert!(matches!(err, BankingError::Database(_)));
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let service = create_test_service().await;
        let err = service.deposit(Uuid::new_v4(), 100).await.unwrap_err();
        assert!(matches!(err, BankingError::NotFound(_)));
    }

    #[test]
    fn test_generated_account_ids_fit_bigint() {
        let id = generate_account_id();
        assert!(id > 1);
        assert!(id <= i64::MAX as u64);
    }
}
