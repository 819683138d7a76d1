//! Safe proposal submission
//!
//! Steps are grouped by chain into one `ProposalBatch` each, keeping plan
//! order inside a batch. Each batch is proposed at `max(cached, remote)` nonce
//! and the cache moves to `nonce + 1` only once the service accepted it.

use std::sync::Arc;

use alloy::primitives::Address;
use async_trait::async_trait;
use helix_chain::{
    ChainClient, EvmSigner, MultisigBackend, ProposalBatch, ProposalReceipt, ProposedTransaction,
    SafeTransactionService,
};
use tracing::{debug, info};

use super::{BackendFactory, ProposalSession, SafeTarget};
use crate::context::ChainContext;
use crate::definition::Definition;
use crate::error::RegisterError;
use crate::intent::{ChainSide, SafeAddressing};
use crate::planner::CallPlan;

fn safe_target(
    side: ChainSide,
    ctx: &ChainContext,
    safe: &SafeAddressing,
) -> Result<SafeTarget, RegisterError> {
    let chain = ctx.chain(side);
    let address = safe.safe_for(side).ok_or_else(|| {
        RegisterError::configuration(format!(
            "no safe wallet address for {side} chain {}",
            chain.code
        ))
    })?;
    let service_url = safe.service_url_for(side).ok_or_else(|| {
        RegisterError::configuration(format!(
            "no safe transaction service url for {side} chain {}",
            chain.code
        ))
    })?;

    Ok(SafeTarget {
        chain_code: chain.code.clone(),
        chain_id: chain.id,
        rpc_url: chain.rpc_url.clone(),
        service_url: service_url.to_string(),
        safe: address,
        multisend: chain.multisend,
    })
}

/// Propose the plan as one Safe transaction per touched chain
pub async fn dispatch_proposal(
    plan: &CallPlan,
    ctx: &ChainContext,
    safe: &SafeAddressing,
    sender: Address,
    session: &mut ProposalSession,
) -> Result<Vec<ProposalReceipt>, RegisterError> {
    // validate addressing for every chain before proposing anything
    let targets = plan
        .sides()
        .into_iter()
        .map(|side| safe_target(side, ctx, safe).map(|t| (side, t)))
        .collect::<Result<Vec<_>, _>>()?;

    let mut receipts = Vec::with_capacity(targets.len());
    for (side, target) in targets {
        let batch = ProposalBatch {
            chain_code: target.chain_code.clone(),
            safe_address: target.safe,
            sender_address: sender,
            transactions: plan
                .steps_on(side)
                .map(|s| ProposedTransaction {
                    to: s.target_contract,
                    value: s.native_value,
                    data: s.call.calldata(),
                })
                .collect(),
        };

        let backend = session.backend(&target).await?;
        let chain_id = backend.chain_id().await?;
        let remote = backend.nonce().await?;
        let nonce = session.nonces.reserve(chain_id, target.safe, remote);
        debug!(
            chain = %target.chain_code,
            safe = %target.safe,
            remote_nonce = remote,
            nonce = nonce,
            calls = batch.transactions.len(),
            value = %plan.native_value_on(side),
            "Proposing batch"
        );

        let receipt = backend.propose(&batch, nonce).await?;
        session.nonces.advance(chain_id, target.safe, nonce);
        info!(
            chain = %target.chain_code,
            safe = %target.safe,
            nonce = nonce,
            safe_tx_hash = %receipt.safe_tx_hash,
            "Proposed transaction to safe"
        );
        receipts.push(receipt);
    }

    Ok(receipts)
}

/// Connects `SafeTransactionService` backends with per-chain gas pins
pub struct SafeServiceFactory {
    chain: Arc<dyn ChainClient>,
    signer: EvmSigner,
    definition: Arc<Definition>,
}

impl SafeServiceFactory {
    pub fn new(chain: Arc<dyn ChainClient>, signer: EvmSigner, definition: Arc<Definition>) -> Self {
        Self {
            chain,
            signer,
            definition,
        }
    }
}

#[async_trait]
impl BackendFactory for SafeServiceFactory {
    async fn connect(&self, target: &SafeTarget) -> Result<Arc<dyn MultisigBackend>, RegisterError> {
        let mut service = SafeTransactionService::new(
            &target.service_url,
            &target.rpc_url,
            target.safe,
            self.chain.clone(),
            self.signer.clone(),
        )?
        .with_pin(self.definition.safe_pin(target.chain_id));
        if let Some(multisend) = target.multisend {
            service = service.with_multisend(multisend);
        }
        info!(chain = %target.chain_code, chain_id = target.chain_id, safe = %target.safe, "Init safe");
        Ok(Arc::new(service))
    }
}
