//! Safe Transaction Service backend
//!
//! Reads the Safe nonce and chain id through a `ChainClient`, builds the Safe
//! transaction (plain call for one entry, `MultiSendCallOnly` delegate call for
//! several), signs the EIP-712 digest with the operator key and posts it to
//! `{service}/api/v1/safes/{safe}/multisig-transactions/`.
//!
//! Assumes Safe contracts >= 1.3.0 (chain id is part of the EIP-712 domain).

use std::sync::Arc;
use std::time::Duration;

use alloy::{
    primitives::{Address, Bytes, B256, U256},
    sol_types::{Eip712Domain, SolCall, SolStruct},
};
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info};
use url::Url;

use crate::error::{ChainError, SafeError};
use crate::evm::client::ChainClient;
use crate::evm::contracts::{GnosisSafe, SafeTx};
use crate::evm::signer::EvmSigner;
use crate::redact::mask_url;
use crate::safe::{
    encode_multisend, MultisigBackend, ProposalBatch, ProposalReceipt, SafeOperation, SafePin,
    MULTI_SEND_CALL_ONLY,
};

/// Build the Safe transaction for a batch at `nonce`
pub fn build_safe_transaction(
    batch: &ProposalBatch,
    nonce: u64,
    pin: &SafePin,
    multisend: Address,
) -> Result<SafeTx, SafeError> {
    let (to, value, data, operation) = match batch.transactions.as_slice() {
        [] => {
            return Err(SafeError::EmptyBatch {
                safe: batch.safe_address.to_string(),
            })
        }
        [single] => (
            single.to,
            single.value,
            single.data.clone(),
            SafeOperation::Call,
        ),
        many => (
            multisend,
            U256::ZERO,
            encode_multisend(many),
            SafeOperation::DelegateCall,
        ),
    };

    Ok(SafeTx {
        to,
        value,
        data,
        operation: operation as u8,
        safeTxGas: U256::from(pin.safe_tx_gas.unwrap_or(0)),
        baseGas: U256::from(pin.base_gas.unwrap_or(0)),
        gasPrice: U256::from(pin.gas_price.unwrap_or(0)),
        gasToken: pin.gas_token.unwrap_or(Address::ZERO),
        refundReceiver: pin.refund_receiver.unwrap_or(Address::ZERO),
        nonce: U256::from(nonce),
    })
}

/// EIP-712 digest the Safe owners sign
pub fn safe_tx_hash(tx: &SafeTx, chain_id: u64, safe: Address) -> B256 {
    let domain = Eip712Domain::new(None, None, Some(U256::from(chain_id)), Some(safe), None);
    tx.eip712_signing_hash(&domain)
}

/// Request body of the multisig-transactions endpoint
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProposeTransactionBody {
    to: String,
    value: String,
    data: Option<String>,
    operation: u8,
    safe_tx_gas: String,
    base_gas: String,
    gas_price: String,
    gas_token: String,
    refund_receiver: String,
    nonce: u64,
    contract_transaction_hash: String,
    sender: String,
    signature: String,
    origin: Option<String>,
}

impl ProposeTransactionBody {
    fn new(tx: &SafeTx, hash: B256, sender: Address, signature: &Bytes) -> Self {
        Self {
            to: tx.to.to_checksum(None),
            value: tx.value.to_string(),
            data: (!tx.data.is_empty()).then(|| format!("0x{}", hex::encode(&tx.data))),
            operation: tx.operation,
            safe_tx_gas: tx.safeTxGas.to_string(),
            base_gas: tx.baseGas.to_string(),
            gas_price: tx.gasPrice.to_string(),
            gas_token: tx.gasToken.to_checksum(None),
            refund_receiver: tx.refundReceiver.to_checksum(None),
            nonce: tx.nonce.saturating_to::<u64>(),
            contract_transaction_hash: format!("0x{:x}", hash),
            sender: sender.to_checksum(None),
            signature: format!("0x{}", hex::encode(signature)),
            origin: Some("helix-registrar".to_string()),
        }
    }
}

/// Safe Transaction Service client for one Safe on one chain
pub struct SafeTransactionService {
    http: reqwest::Client,
    service_url: String,
    rpc_url: String,
    safe: Address,
    chain: Arc<dyn ChainClient>,
    signer: EvmSigner,
    pin: SafePin,
    multisend: Address,
}

impl SafeTransactionService {
    /// Create a client for `safe`, proposing through `service_url` and reading
    /// chain state through `rpc_url`.
    pub fn new(
        service_url: &str,
        rpc_url: &str,
        safe: Address,
        chain: Arc<dyn ChainClient>,
        signer: EvmSigner,
    ) -> Result<Self, SafeError> {
        let parsed = Url::parse(service_url).map_err(|_| SafeError::InvalidServiceUrl {
            url: mask_url(service_url),
        })?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        info!(
            safe = %safe,
            service = %mask_url(service_url),
            "Initialized safe transaction service"
        );

        Ok(Self {
            http,
            service_url: parsed.as_str().trim_end_matches('/').to_string(),
            rpc_url: rpc_url.to_string(),
            safe,
            chain,
            signer,
            pin: SafePin::default(),
            multisend: MULTI_SEND_CALL_ONLY,
        })
    }

    /// Apply per-chain gas pins
    pub fn with_pin(mut self, pin: SafePin) -> Self {
        self.pin = pin;
        self
    }

    /// Override the MultiSendCallOnly deployment
    pub fn with_multisend(mut self, multisend: Address) -> Self {
        self.multisend = multisend;
        self
    }

    fn proposal_endpoint(&self) -> String {
        format!(
            "{}/api/v1/safes/{}/multisig-transactions/",
            self.service_url,
            self.safe.to_checksum(None)
        )
    }
}

#[async_trait]
impl MultisigBackend for SafeTransactionService {
    async fn chain_id(&self) -> Result<u64, SafeError> {
        Ok(self.chain.chain_id(&self.rpc_url).await?)
    }

    async fn nonce(&self) -> Result<u64, SafeError> {
        let data = GnosisSafe::nonceCall {}.abi_encode();
        let raw = self.chain.call(&self.rpc_url, self.safe, data.into()).await?;
        let decoded = GnosisSafe::nonceCall::abi_decode_returns(&raw, true).map_err(|e| {
            ChainError::Decode {
                method: "nonce()",
                reason: e.to_string(),
            }
        })?;
        u64::try_from(decoded._0).map_err(|e| {
            SafeError::Chain(ChainError::Decode {
                method: "nonce()",
                reason: e.to_string(),
            })
        })
    }

    async fn propose(&self, batch: &ProposalBatch, nonce: u64) -> Result<ProposalReceipt, SafeError> {
        let chain_id = self.chain_id().await?;
        let tx = build_safe_transaction(batch, nonce, &self.pin, self.multisend)?;
        let hash = safe_tx_hash(&tx, chain_id, self.safe);
        let signature = self
            .signer
            .sign_hash(&hash)
            .map_err(|e| SafeError::Signing {
                reason: e.to_string(),
            })?;

        let body = ProposeTransactionBody::new(&tx, hash, batch.sender_address, &signature);
        let endpoint = self.proposal_endpoint();
        debug!(
            safe = %self.safe,
            nonce = nonce,
            safe_tx_hash = %hash,
            calls = batch.transactions.len(),
            "Proposing safe transaction"
        );

        let response = self.http.post(&endpoint).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SafeError::Service {
                endpoint: mask_url(&endpoint),
                status: status.as_u16(),
                body: text,
            });
        }

        Ok(ProposalReceipt {
            chain_id,
            safe_address: self.safe,
            safe_tx_hash: hash,
            nonce,
        })
    }
}
