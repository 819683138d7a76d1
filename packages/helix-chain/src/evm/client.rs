//! EVM RPC Client
//!
//! `ChainClient` is the capability surface the registrar needs from a node:
//! read the chain id, run a read-only call, and submit a signed transaction.
//! `EvmRpcClient` implements it over alloy HTTP providers; every method takes the
//! RPC endpoint so one client serves both sides of a bridge.
//!
//! # Transaction Building
//!
//! Sends use `ProviderBuilder::with_recommended_fillers()` so nonce, gas limit and
//! EIP-1559 fees are populated by the node, and wait for the receipt before
//! returning. Callers submit sequentially, one pending transaction at a time.

use std::fmt::Display;

use alloy::{
    primitives::{Address, Bytes, B256, U256},
    providers::{Provider, ProviderBuilder},
    rpc::types::TransactionRequest,
};
use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::ChainError;
use crate::evm::signer::EvmSigner;
use crate::redact::mask_url;

/// A contract call ready to be signed and sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingCall {
    pub to: Address,
    pub data: Bytes,
    /// Native value attached to the call
    pub value: U256,
}

/// Summary of a mined transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutcome {
    pub tx_hash: B256,
    pub block_number: Option<u64>,
}

/// Blockchain node capability used by the registrar
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Chain id reported by the node
    async fn chain_id(&self, rpc_url: &str) -> Result<u64, ChainError>;

    /// `eth_call` against `to` with raw calldata
    async fn call(&self, rpc_url: &str, to: Address, data: Bytes) -> Result<Bytes, ChainError>;

    /// Sign, send and wait for the receipt. A reverted receipt is an error.
    async fn send(&self, rpc_url: &str, call: &OutgoingCall) -> Result<TxOutcome, ChainError>;

    /// Address of the signing key
    fn sender(&self) -> Address;
}

/// alloy-backed `ChainClient`
#[derive(Debug, Clone)]
pub struct EvmRpcClient {
    signer: EvmSigner,
}

impl EvmRpcClient {
    pub fn new(signer: EvmSigner) -> Self {
        info!(address = %signer.address(), "Created EVM client with signer");
        Self { signer }
    }

    pub fn signer(&self) -> &EvmSigner {
        &self.signer
    }
}

fn rpc_error(rpc_url: &str, e: impl Display) -> ChainError {
    ChainError::Rpc {
        endpoint: mask_url(rpc_url),
        reason: e.to_string(),
    }
}

fn invalid_url(rpc_url: &str) -> ChainError {
    ChainError::InvalidRpcUrl {
        url: mask_url(rpc_url),
    }
}

#[async_trait]
impl ChainClient for EvmRpcClient {
    async fn chain_id(&self, rpc_url: &str) -> Result<u64, ChainError> {
        let provider = ProviderBuilder::new().on_http(rpc_url.parse().map_err(|_| invalid_url(rpc_url))?);
        provider
            .get_chain_id()
            .await
            .map_err(|e| rpc_error(rpc_url, e))
    }

    async fn call(&self, rpc_url: &str, to: Address, data: Bytes) -> Result<Bytes, ChainError> {
        let provider = ProviderBuilder::new().on_http(rpc_url.parse().map_err(|_| invalid_url(rpc_url))?);
        let tx = TransactionRequest::default().to(to).input(data.into());
        provider.call(&tx).await.map_err(|e| rpc_error(rpc_url, e))
    }

    async fn send(&self, rpc_url: &str, call: &OutgoingCall) -> Result<TxOutcome, ChainError> {
        let provider = ProviderBuilder::new()
            .with_recommended_fillers()
            .wallet(self.signer.wallet())
            .on_http(rpc_url.parse().map_err(|_| invalid_url(rpc_url))?);

        let mut tx = TransactionRequest::default()
            .to(call.to)
            .input(call.data.clone().into());
        if !call.value.is_zero() {
            tx = tx.value(call.value);
        }

        debug!(
            endpoint = %mask_url(rpc_url),
            to = %call.to,
            value = %call.value,
            "Sending transaction"
        );

        let pending = provider
            .send_transaction(tx)
            .await
            .map_err(|e| rpc_error(rpc_url, e))?;
        let tx_hash = *pending.tx_hash();
        info!(tx_hash = %tx_hash, "Transaction sent");

        let receipt = pending
            .get_receipt()
            .await
            .map_err(|e| rpc_error(rpc_url, e))?;

        if !receipt.status() {
            return Err(ChainError::Reverted {
                tx_hash: format!("0x{:x}", tx_hash),
            });
        }

        Ok(TxOutcome {
            tx_hash,
            block_number: receipt.block_number,
        })
    }

    fn sender(&self) -> Address {
        self.signer.address()
    }
}
