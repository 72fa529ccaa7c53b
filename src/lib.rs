//! Banking Orchestrator
//!
//! A conversational banking core that:
//! - Moves money on an external double-entry ledger (the source of truth)
//! - Records every committed movement in an audit store, best effort
//! - Exposes banking operations as tools to a chat completion model
//! - Requires an explicit, token-bound confirmation before any money moves
//! - Falls back to deterministic intent parsing when no model is configured
//!
//! FLOW:
//! MESSAGE → TOOL CALL → CONFIRM? → LEDGER COMMIT → AUDIT RECORD → REPLY

pub mod audit;
pub mod completion;
pub mod config;
pub mod conversational;
pub mod error;
pub mod intent;
pub mod ledger;
pub mod models;
pub mod retry;
pub mod tools;
pub mod transaction;

pub use error::{BankingError, Result};

// Re-export common types
pub use models::*;
pub use conversational::{ChatResponse, ChatService};
pub use transaction::TransactionService;
