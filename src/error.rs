//! Error types for the banking orchestrator

use std::fmt;
use thiserror::Error;

/// Result type alias for banking operations
pub type Result<T> = std::result::Result<T, BankingError>;

/// Sanitized failure classes of the completion service.
///
/// Raw provider bodies are logged where they are received and never carried
/// in this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiErrorKind {
    RateLimited,
    Auth,
    BadRequest,
    Unavailable,
    InvalidResponse,
    Status(u16),
}

impl fmt::Display for AiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AiErrorKind::RateLimited => {
                write!(f, "AI service temporarily busy, please try again in a moment")
            }
            AiErrorKind::Auth => write!(f, "AI service authentication error"),
            AiErrorKind::BadRequest => write!(f, "invalid request format"),
            AiErrorKind::Unavailable => write!(f, "AI service temporarily unavailable"),
            AiErrorKind::InvalidResponse => write!(f, "AI service returned an unreadable response"),
            AiErrorKind::Status(code) => write!(f, "AI service error (status {})", code),
        }
    }
}

#[derive(Error, Debug)]
pub enum BankingError {

    // =============================
    // User-facing
    // =============================

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InsufficientFunds(String),

    #[error("Tool '{0}' not found")]
    ToolNotFound(String),

    #[error("Invalid tool input: {0}")]
    InvalidToolInput(String),

    #[error("Confirmation rejected: {0}")]
    Confirmation(String),

    #[error("{0}")]
    Upstream(AiErrorKind),

    // =============================
    // Infrastructure
    // =============================

    #[error("Ledger unavailable: {0}")]
    LedgerUnavailable(String),

    #[error("Ledger rejected the request: {0}")]
    LedgerRejected(String),

    #[error("Audit write failed: {0}")]
    AuditWrite(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("SQL error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Message shown for infrastructure failures; the detail stays in the logs.
pub const GENERIC_FAILURE: &str =
    "Something went wrong while processing your request. Please try again later.";

impl BankingError {
    /// Whether the error text may be shown to an end user verbatim.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            BankingError::Validation(_)
                | BankingError::NotFound(_)
                | BankingError::InsufficientFunds(_)
                | BankingError::ToolNotFound(_)
                | BankingError::InvalidToolInput(_)
                | BankingError::Confirmation(_)
                | BankingError::Upstream(_)
        )
    }

    /// Transport-level failures a caller may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BankingError::LedgerUnavailable(_)
                | BankingError::Http(_)
                | BankingError::Upstream(AiErrorKind::RateLimited)
                | BankingError::Upstream(AiErrorKind::Unavailable)
        )
    }

    pub fn user_message(&self) -> String {
        if self.is_user_facing() {
            self.to_string()
        } else {
            GENERIC_FAILURE.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_business_errors_surface_verbatim() {
        let err = BankingError::InsufficientFunds(
            "insufficient funds: balance is 100, requested 200".to_string(),
        );
        assert_eq!(
            err.user_message(),
            "insufficient funds: balance is 100, requested 200"
        );
    }

    #[test]
    fn test_infrastructure_errors_are_sanitized() {
        let err = BankingError::Database("connection reset by peer at 10.0.0.4".to_string());
        assert_eq!(err.user_message(), GENERIC_FAILURE);

        let err = BankingError::LedgerUnavailable("timeout".to_string());
        assert!(err.is_retryable());
        assert_eq!(err.user_message(), GENERIC_FAILURE);
    }

    #[test]
    fn test_upstream_errors_carry_only_the_kind() {
        let err = BankingError::Upstream(AiErrorKind::RateLimited);
        assert_eq!(
            err.user_message(),
            "AI service temporarily busy, please try again in a moment"
        );
        assert_eq!(
            BankingError::Upstream(AiErrorKind::Status(502)).to_string(),
            "AI service error (status 502)"
        );
    }
}
