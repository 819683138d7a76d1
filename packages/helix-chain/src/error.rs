//! Error types for chain access and Safe proposals

use thiserror::Error;

/// Errors raised while talking to an EVM node.
#[derive(Debug, Error)]
pub enum ChainError {
    /// The RPC endpoint could not be parsed as a URL.
    #[error("invalid RPC URL: {url}")]
    InvalidRpcUrl { url: String },

    /// The signing key could not be parsed.
    #[error("invalid private key: {reason}")]
    InvalidKey { reason: String },

    /// Transport or node-level failure.
    #[error("rpc error on {endpoint}: {reason}")]
    Rpc { endpoint: String, reason: String },

    /// The call returned data that does not match the expected ABI.
    #[error("failed to decode {method} result: {reason}")]
    Decode { method: &'static str, reason: String },

    /// The transaction was mined but reverted.
    #[error("transaction {tx_hash} reverted")]
    Reverted { tx_hash: String },
}

/// Errors raised by the multi-signature proposal backend.
#[derive(Debug, Error)]
pub enum SafeError {
    /// Underlying chain access failed (nonce / chain id reads).
    #[error(transparent)]
    Chain(#[from] ChainError),

    /// The proposal batch carried no transactions.
    #[error("empty proposal batch for safe {safe}")]
    EmptyBatch { safe: String },

    /// The Safe Transaction Service URL is invalid.
    #[error("invalid safe service URL: {url}")]
    InvalidServiceUrl { url: String },

    /// Signing the Safe transaction hash failed.
    #[error("failed to sign safe transaction: {reason}")]
    Signing { reason: String },

    /// The Safe Transaction Service rejected or failed the request.
    #[error("safe service {endpoint} returned {status}: {body}")]
    Service {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// HTTP transport failure.
    #[error("safe service request failed: {0}")]
    Http(#[from] reqwest::Error),
}
