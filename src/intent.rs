//! Intent parser
//!
//! Deterministic, regex-based reading of banking requests. Used when no
//! completion service is configured. Families are checked in a fixed order and
//! the first match wins:
//! - Balance: "what's my balance", "how much money do I have"
//! - Deposit: "deposit $50", "put 20 into my account"
//! - Withdraw: "withdraw 30", "cash out 10"
//! - Transfer: "send $25 to account 12345"
//! - History: "show my history", "last 5 transactions"

use crate::error::BankingError;
use crate::models::{dollars_to_cents, AccountId, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
use crate::tools::ToolCall;
use crate::Result;
use lazy_static::lazy_static;
use regex::Regex;
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Balance,
    Deposit,
    Withdraw,
    Transfer,
    History,
    Unknown,
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().map(|p| Regex::new(p).unwrap()).collect()
}

lazy_static! {
    static ref FAMILIES: Vec<(Intent, Vec<Regex>)> = vec![
        (
            Intent::Balance,
            compile(&[
                r"(?i)(what'?s?\s+my|show\s+my|check\s+my|get\s+my)?\s*balance",
                r"(?i)how\s+much\s+(money|funds|cash)(\s+do\s+i\s+have)?",
                r"(?i)account\s+balance",
            ]),
        ),
        (
            Intent::Deposit,
            compile(&[
                r"(?i)deposit\s+",
                r"(?i)add\s+.*\s+(to\s+my\s+account|to\s+account)",
                r"(?i)put\s+.*\s+(in|into)\s+(my\s+)?account",
            ]),
        ),
        (
            Intent::Withdraw,
            compile(&[
                r"(?i)withdraw\s+",
                r"(?i)(take\s+out|remove)\s+",
                r"(?i)cash\s+out\s+",
            ]),
        ),
        (
            Intent::Transfer,
            compile(&[
                r"(?i)transfer\s+.*\s+to\s+",
                r"(?i)send\s+.*\s+to\s+(account\s+)?",
                r"(?i)pay\s+.*\s+to\s+",
            ]),
        ),
        (
            Intent::History,
            compile(&[
                r"(?i)(show|get|view)\s+(my\s+)?(transaction\s+)?histor(y|ies)",
                r"(?i)(last|recent)\s+\d*\s*transactions?",
                r"(?i)transaction\s+(list|log)",
                r"(?i)my\s+transactions?",
            ]),
        ),
    ];
    static ref AMOUNT: Regex = Regex::new(r"\$?\s*(\d+(?:\.\d{1,2})?)").unwrap();
    static ref DESTINATION: Regex =
        Regex::new(r"(?i)\b(?:to|account)\s+(?:account\s+)?#?(\d+)").unwrap();
    static ref LIMIT: Regex = Regex::new(r"(?i)\b(?:last|recent)\s+(\d+)").unwrap();
}

/// Result of parsing one message. Zero means "not given".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedIntent {
    pub intent: Intent,
    /// Minor units
    pub amount: i64,
    pub to_account_id: AccountId,
    pub limit: u32,
}

pub fn parse_intent(message: &str) -> ParsedIntent {
    let message = message.trim();
    let intent = detect_intent(message);

    let mut parsed = ParsedIntent {
        intent,
        amount: 0,
        to_account_id: 0,
        limit: 0,
    };

    match intent {
        Intent::Deposit | Intent::Withdraw => {
            parsed.amount = extract_amount(message, None);
        }
        Intent::Transfer => {
            let destination = extract_destination(message);
            if let Some((account_id, _)) = &destination {
                parsed.to_account_id = *account_id;
            }
            parsed.amount = extract_amount(message, destination.map(|(_, span)| span));
        }
        Intent::History => {
            parsed.limit = extract_limit(message).unwrap_or(DEFAULT_PAGE_LIMIT);
        }
        Intent::Balance | Intent::Unknown => {}
    }

    parsed
}

fn detect_intent(message: &str) -> Intent {
    FAMILIES
        .iter()
        .find(|(_, patterns)| patterns.iter().any(|p| p.is_match(message)))
        .map(|(intent, _)| *intent)
        .unwrap_or(Intent::Unknown)
}

/// First amount in the message, skipping the destination account number.
fn extract_amount(message: &str, skip: Option<Range<usize>>) -> i64 {
    AMOUNT
        .captures_iter(message)
        .filter_map(|caps| caps.get(1))
        .find(|m| match &skip {
            Some(span) => m.start() >= span.end || m.end() <= span.start,
            None => true,
        })
        .and_then(|m| dollars_to_cents(m.as_str()))
        .unwrap_or(0)
}

fn extract_destination(message: &str) -> Option<(AccountId, Range<usize>)> {
    let caps = DESTINATION.captures(message)?;
    let digits = caps.get(1)?;
    let account_id = digits.as_str().parse().ok()?;
    Some((account_id, digits.range()))
}

/// Digit runs too long for `u64` still cap at the page maximum.
fn extract_limit(message: &str) -> Option<u32> {
    let caps = LIMIT.captures(message)?;
    let digits = caps.get(1)?.as_str().trim_start_matches('0');
    if digits.is_empty() {
        return None;
    }
    let limit = digits.parse::<u64>().unwrap_or(u64::MAX);
    Some(limit.min(MAX_PAGE_LIMIT as u64) as u32)
}

impl ParsedIntent {
    pub fn validate(&self) -> Result<()> {
        match self.intent {
            Intent::Deposit | Intent::Withdraw if self.amount <= 0 => Err(BankingError::Validation(
                "please specify a valid amount (e.g., '$100' or '50.25')".to_string(),
            )),
            Intent::Transfer if self.amount <= 0 => Err(BankingError::Validation(
                "please specify a valid transfer amount".to_string(),
            )),
            Intent::Transfer if self.to_account_id == 0 => Err(BankingError::Validation(
                "please specify the destination account ID (e.g., 'to account 12345')"
                    .to_string(),
            )),
            Intent::Unknown => Err(BankingError::Validation(
                "I didn't understand that request. You can check your balance, deposit, \
                 withdraw, transfer to an account, or view your transaction history."
                    .to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Validate and map onto the typed tool call the registry executes.
    pub fn into_tool_call(self) -> Result<ToolCall> {
        self.validate()?;

        Ok(match self.intent {
            Intent::Balance => ToolCall::GetBalance,
            Intent::History => ToolCall::GetHistory { limit: self.limit },
            Intent::Deposit => ToolCall::Deposit {
                amount: self.amount,
            },
            Intent::Withdraw => ToolCall::Withdraw {
                amount: self.amount,
            },
            Intent::Transfer => ToolCall::Transfer {
                amount: self.amount,
                to_account_id: self.to_account_id,
            },
            Intent::Unknown => {
                return Err(BankingError::Validation(
                    "I didn't understand that request".to_string(),
                ))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_family_has_patterns() {
        assert_eq!(FAMILIES.len(), 5);
        assert!(FAMILIES.iter().all(|(_, patterns)| !patterns.is_empty()));
    }

    #[test]
    fn test_balance_phrases() {
        for text in [
            "What's my balance?",
            "how much money do I have",
            "check my account balance",
        ] {
            assert_eq!(parse_intent(text).intent, Intent::Balance, "{}", text);
        }
    }

    #[test]
    fn test_deposit_amounts_in_minor_units() {
        let parsed = parse_intent("Deposit $100.50 please");
        assert_eq!(parsed.intent, Intent::Deposit);
        assert_eq!(parsed.amount, 10_050);

        let parsed = parse_intent("put 0.29 into my account");
        assert_eq!(parsed.intent, Intent::Deposit);
        assert_eq!(parsed.amount, 29);
    }

    #[test]
    fn test_withdraw() {
        let parsed = parse_intent("withdraw 30");
        assert_eq!(parsed.intent, Intent::Withdraw);
        assert_eq!(parsed.amount, 3_000);

        let parsed = parse_intent("cash out 12.5");
        assert_eq!(parsed.intent, Intent::Withdraw);
        assert_eq!(parsed.amount, 1_250);
    }

    #[test]
    fn test_transfer_destination_and_amount() {
        let parsed = parse_intent("send $25 to account 12345");
        assert_eq!(parsed.intent, Intent::Transfer);
        assert_eq!(parsed.amount, 2_500);
        assert_eq!(parsed.to_account_id, 12_345);

        let parsed = parse_intent("transfer funds to account 777, amount $40");
        assert_eq!(parsed.intent, Intent::Transfer);
        assert_eq!(parsed.to_account_id, 777);
        assert_eq!(parsed.amount, 4_000);
    }

    #[test]
    fn test_history_limit() {
        assert_eq!(parse_intent("show my history").limit, 10);
        assert_eq!(parse_intent("last 5 transactions").limit, 5);
        assert_eq!(parse_intent("my recent 500 transactions").limit, 100);
        assert_eq!(parse_intent("last 99999999999 transactions").limit, 100);
        assert_eq!(parse_intent("last 000 transactions").limit, 10);
    }

    #[test]
    fn test_validation_names_missing_field() {
        let err = parse_intent("deposit some money").validate().unwrap_err();
        assert!(err.to_string().contains("valid amount"));

        let err = parse_intent("send 20 to bob").validate().unwrap_err();
        assert!(err.to_string().contains("destination account"));

        let err = parse_intent("tell me a joke").validate().unwrap_err();
        assert!(err.to_string().contains("didn't understand"));
    }

    #[test]
    fn test_into_tool_call() {
        assert_eq!(
            parse_intent("send $25 to account 12345").into_tool_call().unwrap(),
            ToolCall::Transfer {
                amount: 2_500,
                to_account_id: 12_345
            }
        );
        assert_eq!(
            parse_intent("what's my balance").into_tool_call().unwrap(),
            ToolCall::GetBalance
        );
        assert!(parse_intent("withdraw").into_tool_call().is_err());
    }
}
