//! Helix-Chain: Shared EVM Access Library for the Helix Relayer Registrar
//!
//! This crate provides the chain-facing half of the registrar:
//!
//! - **EVM Module** - `ChainClient` capability (chain id, read-only calls, signed sends),
//!   contract bindings for the three LnBridge protocols, ERC20 helpers, local signer
//! - **Safe Module** - Multi-signature proposal backend (Safe Transaction Service client,
//!   EIP-712 Safe transaction hashing, MultiSend batching)
//! - **Hash** - sha256 content hashes
//! - **Redact** - Secret redaction for keys and RPC URLs in logs
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! helix-chain = { path = "../helix-chain" }
//! ```

pub mod error;
pub mod evm;
pub mod hash;
pub mod redact;
pub mod safe;

pub use error::{ChainError, SafeError};
pub use evm::{ChainClient, EvmRpcClient, EvmSigner, OutgoingCall, TxOutcome};
pub use hash::sha256_hex;
pub use redact::{mask_url, Redacted};
pub use safe::{
    MultisigBackend, ProposalBatch, ProposalReceipt, ProposedTransaction, SafePin,
    SafeTransactionService,
};
