//! MultiSend batching
//!
//! Each inner call is packed as
//! `operation (1) || to (20) || value (32) || dataLength (32) || data`
//! and the concatenation is passed to `multiSend(bytes)`.

use alloy::{
    primitives::{address, Address, Bytes, U256},
    sol_types::SolCall,
};

use crate::evm::contracts::MultiSendCallOnly;
use crate::safe::{ProposedTransaction, SafeOperation};

/// Canonical `MultiSendCallOnly` v1.3.0 deployment
pub const MULTI_SEND_CALL_ONLY: Address = address!("40a2accbd92bca938b02010e17a5b8929b49130d");

/// Pack calls into `multiSend(bytes)` calldata
pub fn encode_multisend(transactions: &[ProposedTransaction]) -> Bytes {
    let mut packed = Vec::new();
    for tx in transactions {
        packed.push(SafeOperation::Call as u8);
        packed.extend_from_slice(tx.to.as_slice());
        packed.extend_from_slice(&tx.value.to_be_bytes::<32>());
        packed.extend_from_slice(&U256::from(tx.data.len()).to_be_bytes::<32>());
        packed.extend_from_slice(&tx.data);
    }

    MultiSendCallOnly::multiSendCall {
        transactions: packed.into(),
    }
    .abi_encode()
    .into()
}
