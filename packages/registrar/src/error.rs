//! Registrar error taxonomy
//!
//! Configuration-load failures (`Configuration`, `DuplicateConfig`) abort the
//! whole run before any chain contact. Everything else aborts only the intent
//! being registered; its lock is left untouched so the next run retries it.

use helix_chain::{ChainError, SafeError};
use thiserror::Error;

/// Decimal amount conversion failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AmountError {
    #[error("invalid decimal amount {value:?}")]
    Malformed { value: String },

    #[error("amount {value} carries {digits} fractional digits but the token has {decimals} decimals")]
    TooPrecise {
        value: String,
        digits: usize,
        decimals: u8,
    },

    #[error("amount {value} overflows 256 bits")]
    Overflow { value: String },

    #[error("{field} value {value} does not fit uint{bits}")]
    OutOfRange {
        field: &'static str,
        value: String,
        bits: usize,
    },
}

/// Bridge info index failures
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("no indexer endpoint serves chain {chain}")]
    NoEndpoint { chain: String },

    #[error("index request to {endpoint} failed: {source}")]
    Http {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("index {endpoint} returned HTTP {status}")]
    Status { endpoint: String, status: u16 },

    #[error("malformed index response from {endpoint}: {reason}")]
    Malformed { endpoint: String, reason: String },
}

/// Failure of one registration (or of loading the run configuration)
#[derive(Debug, Error)]
pub enum RegisterError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("bridge {name} is declared more than once")]
    DuplicateConfig { name: String },

    #[error("unidentified chain: {chain}")]
    UnresolvedChain { chain: String },

    #[error("unresolved token {symbol} on {chain}: {reason}")]
    UnresolvedToken {
        chain: String,
        symbol: String,
        reason: String,
    },

    #[error("invalid {field}: {source}")]
    InvalidAmount {
        field: &'static str,
        #[source]
        source: AmountError,
    },

    #[error("bridge info query failed: {0}")]
    IndexQueryFailed(#[from] IndexError),

    #[error("chain request failed: {0}")]
    Network(#[from] ChainError),

    #[error("safe proposal failed: {0}")]
    Proposal(#[from] SafeError),

    #[error("lock file {path}: {reason}")]
    Lock { path: String, reason: String },
}

impl RegisterError {
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration(reason.into())
    }

    pub fn amount(field: &'static str) -> impl FnOnce(AmountError) -> Self {
        move |source| Self::InvalidAmount { field, source }
    }
}
