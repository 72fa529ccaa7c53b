//! Ledger wire types and per-item result codes

use crate::error::BankingError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Account flag bitset.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct AccountFlags(pub u16);

impl AccountFlags {
    pub const NONE: AccountFlags = AccountFlags(0);
    pub const DEBITS_MUST_NOT_EXCEED_CREDITS: AccountFlags = AccountFlags(1 << 1);

    pub fn contains(self, other: AccountFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    #[serde(with = "decimal")]
    pub id: u128,
    pub ledger: u32,
    pub code: u16,
    pub flags: AccountFlags,
    #[serde(with = "decimal", default)]
    pub debits_posted: u128,
    #[serde(with = "decimal", default)]
    pub credits_posted: u128,
}

impl Account {
    pub fn new(id: u128, ledger: u32, code: u16, flags: AccountFlags) -> Self {
        Self {
            id,
            ledger,
            code,
            flags,
            debits_posted: 0,
            credits_posted: 0,
        }
    }

    /// credits_posted - debits_posted, or `None` if either side does not fit `i128`.
    pub fn balance(&self) -> Option<i128> {
        let credits = i128::try_from(self.credits_posted).ok()?;
        let debits = i128::try_from(self.debits_posted).ok()?;
        credits.checked_sub(debits)
    }
}

/// Transfer codes used on the single currency ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum TransferCode {
    Deposit = 1,
    Withdraw = 2,
    Transfer = 3,
}

impl TransferCode {
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transfer {
    #[serde(with = "decimal")]
    pub id: u128,
    #[serde(with = "decimal")]
    pub debit_account_id: u128,
    #[serde(with = "decimal")]
    pub credit_account_id: u128,
    #[serde(with = "decimal")]
    pub amount: u128,
    pub ledger: u32,
    pub code: u16,
}

impl Transfer {
    /// Lowercase 32-char hex rendering used by the audit log.
    pub fn hex_id(&self) -> String {
        format!("{:032x}", self.id)
    }
}

//
// ================= Result codes =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CreateAccountResult {
    Exists,
    ExistsWithDifferentFlags,
    ExistsWithDifferentCode,
    ExistsWithDifferentLedger,
    IdMustNotBeZero,
    LedgerMustNotBeZero,
    CodeMustNotBeZero,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CreateTransferResult {
    Exists,
    ExistsWithDifferentFields,
    IdMustNotBeZero,
    AccountsMustBeDifferent,
    AmountMustNotBeZero,
    DebitAccountNotFound,
    CreditAccountNotFound,
    AccountsMustHaveTheSameLedger,
    ExceedsCredits,
    OverflowsDebits,
    OverflowsCredits,
}

impl fmt::Display for CreateAccountResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl fmt::Display for CreateTransferResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Failure for the account at `index` of a create batch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountError {
    pub index: u32,
    pub result: CreateAccountResult,
}

/// Failure for the transfer at `index` of a create batch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransferError {
    pub index: u32,
    pub result: CreateTransferResult,
}

impl TransferError {
    pub fn into_banking_error(self) -> BankingError {
        match self.result {
            CreateTransferResult::ExceedsCredits => {
                BankingError::InsufficientFunds("insufficient funds".to_string())
            }
            CreateTransferResult::DebitAccountNotFound => {
                BankingError::NotFound("source account not found".to_string())
            }
            CreateTransferResult::CreditAccountNotFound => {
                BankingError::NotFound("destination account not found".to_string())
            }
            other => BankingError::LedgerRejected(format!(
                "transfer at index {} failed: {}",
                self.index, other
            )),
        }
    }
}

/// u128 fields travel as decimal strings; JSON numbers lose precision past 2^53.
mod decimal {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Text(String),
            Number(u64),
        }

        match Wire::deserialize(deserializer)? {
            Wire::Text(text) => text.parse().map_err(de::Error::custom),
            Wire::Number(n) => Ok(n as u128),
        }
    }
}
