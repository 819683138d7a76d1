//! Multi-signature proposal support
//!
//! A `ProposalBatch` is an ordered list of calls that must execute atomically
//! from a Safe wallet. The registrar never executes Safe transactions; it
//! proposes them to the Safe Transaction Service where co-signers confirm.
//!
//! ## Submodules
//!
//! - `multisend` - Packing several calls into one `MultiSendCallOnly` delegate call
//! - `service` - `SafeTransactionService`, the HTTP + RPC backed `MultisigBackend`

pub mod multisend;
pub mod service;

use alloy::primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use serde::Deserialize;

use crate::error::SafeError;

pub use multisend::{encode_multisend, MULTI_SEND_CALL_ONLY};
pub use service::{build_safe_transaction, safe_tx_hash, SafeTransactionService};

/// Safe operation type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SafeOperation {
    Call = 0,
    DelegateCall = 1,
}

/// One call inside a proposal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposedTransaction {
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
}

/// Calls proposed atomically to one Safe on one chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalBatch {
    pub chain_code: String,
    pub safe_address: Address,
    pub sender_address: Address,
    pub transactions: Vec<ProposedTransaction>,
}

/// Result of an accepted proposal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalReceipt {
    pub chain_id: u64,
    pub safe_address: Address,
    pub safe_tx_hash: B256,
    pub nonce: u64,
}

/// Per-chain gas pins merged into every Safe transaction created for that chain.
///
/// Some chains' Safe deployments need explicit `baseGas` / `gasPrice` values for
/// the relayed execution to be priced correctly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SafePin {
    #[serde(default)]
    pub safe_tx_gas: Option<u64>,
    #[serde(default)]
    pub base_gas: Option<u64>,
    #[serde(default)]
    pub gas_price: Option<u64>,
    #[serde(default)]
    pub gas_token: Option<Address>,
    #[serde(default)]
    pub refund_receiver: Option<Address>,
}

/// Multi-signature wallet backend for one (chain, safe) pair
#[async_trait]
pub trait MultisigBackend: Send + Sync {
    /// Chain id the Safe lives on
    async fn chain_id(&self) -> Result<u64, SafeError>;

    /// Next nonce according to the Safe contract
    async fn nonce(&self) -> Result<u64, SafeError>;

    /// Create, sign and propose `batch` as a single Safe transaction at `nonce`
    async fn propose(&self, batch: &ProposalBatch, nonce: u64) -> Result<ProposalReceipt, SafeError>;
}
