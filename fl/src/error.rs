//! Ledger error types

use thiserror::Error;

/// Errors surfaced by ledger store implementations
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Ledger API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Malformed ledger data: {0}")]
    Malformed(String),

    #[error("Student not found: {0}")]
    StudentNotFound(String),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
