//! Core data models for the banking orchestrator

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Ledger account identifier as seen by the rest of the system.
///
/// Kept within `i64` range so it fits a Postgres BIGINT column.
pub type AccountId = u64;

//
// ================= Enums =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Deposit,
    Withdraw,
    Transfer,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "deposit",
            TransactionType::Withdraw => "withdraw",
            TransactionType::Transfer => "transfer",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "deposit" => Some(TransactionType::Deposit),
            "withdraw" => Some(TransactionType::Withdraw),
            "transfer" => Some(TransactionType::Transfer),
            _ => None,
        }
    }
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(TransactionStatus::Pending),
            "completed" => Some(TransactionStatus::Completed),
            "failed" => Some(TransactionStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// ================= User =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub credential_hash: String,
    pub display_name: String,
    pub account_id: AccountId,
    pub created_at: DateTime<Utc>,
}

//
// ================= Audit =================
//

/// Audit mirror of one committed ledger transfer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransactionRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub recipient_user_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    /// Minor units
    pub amount: i64,
    pub status: TransactionStatus,
    pub debit_account_id: AccountId,
    pub credit_account_id: AccountId,
    /// Ledger transfer id, 32 lowercase hex chars
    pub transfer_id: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// History entry handed back to callers, enriched with the recipient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransactionView {
    #[serde(flatten)]
    pub record: TransactionRecord,
    pub amount_formatted: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_name: Option<String>,
}

impl TransactionView {
    pub fn new(record: TransactionRecord, recipient: Option<&User>) -> Self {
        Self {
            amount_formatted: format_cents(record.amount),
            recipient_email: recipient.map(|u| u.email.clone()),
            recipient_name: recipient.map(|u| u.display_name.clone()),
            record,
        }
    }
}

/// Result of a committed money movement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Receipt {
    pub transfer_id: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub amount: i64,
    pub debit_account_id: AccountId,
    pub credit_account_id: AccountId,
}

impl From<&TransactionRecord> for Receipt {
    fn from(record: &TransactionRecord) -> Self {
        Self {
            transfer_id: record.transfer_id.clone(),
            kind: record.kind,
            amount: record.amount,
            debit_account_id: record.debit_account_id,
            credit_account_id: record.credit_account_id,
        }
    }
}

//
// ================= Pagination =================
//

pub const DEFAULT_PAGE_LIMIT: u32 = 10;
pub const MAX_PAGE_LIMIT: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
}

impl Page {
    /// Out-of-range values fall back to defaults instead of failing.
    pub fn clamped(page: i64, limit: i64) -> Self {
        let page = if page < 1 || page > u32::MAX as i64 { 1 } else { page as u32 };
        let limit = if limit < 1 || limit > MAX_PAGE_LIMIT as i64 {
            DEFAULT_PAGE_LIMIT
        } else {
            limit as u32
        };
        Self { page, limit }
    }

    pub fn offset(&self) -> u64 {
        (self.page as u64 - 1) * self.limit as u64
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

//
// ================= Money =================
//

/// Render minor units as dollars, e.g. 12345 -> "$123.45".
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}${}.{:02}", sign, abs / 100, abs % 100)
}

/// Parse a decimal dollar string into minor units.
///
/// Accepts an optional leading `$`. Digits past the second decimal are
/// truncated. Returns `None` for anything that is not a plain non-negative
/// decimal or that overflows `i64`.
pub fn dollars_to_cents(text: &str) -> Option<i64> {
    let text = text.trim();
    let text = text.strip_prefix('$').unwrap_or(text).trim();
    if text.is_empty() {
        return None;
    }

    let (whole, fraction) = match text.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (text, ""),
    };

    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let whole: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let mut cents_digits: String = fraction.chars().take(2).collect();
    while cents_digits.len() < 2 {
        cents_digits.push('0');
    }
    let cents: i64 = cents_digits.parse().ok()?;

    whole.checked_mul(100)?.checked_add(cents)
}
