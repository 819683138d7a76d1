//! Direct submission with the operator key

use alloy::primitives::B256;
use helix_chain::{ChainClient, OutgoingCall};
use tracing::{debug, info};

use crate::context::ChainContext;
use crate::error::RegisterError;
use crate::intent::ChainSide;
use crate::planner::CallPlan;

/// A mined plan step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectReceipt {
    pub side: ChainSide,
    pub signature: &'static str,
    pub tx_hash: B256,
}

/// Send every step in plan order, each waiting for its receipt.
///
/// The first failure stops the plan; already mined steps are not rolled back.
pub async fn dispatch_direct(
    plan: &CallPlan,
    ctx: &ChainContext,
    client: &dyn ChainClient,
) -> Result<Vec<DirectReceipt>, RegisterError> {
    let mut receipts = Vec::with_capacity(plan.steps.len());

    for (i, step) in plan.steps.iter().enumerate() {
        let chain = ctx.chain(step.side);
        let call = OutgoingCall {
            to: step.target_contract,
            data: step.call.calldata(),
            value: step.native_value,
        };

        debug!(
            chain = %chain.code,
            step = i,
            to = %call.to,
            function = step.call.signature(),
            approval = step.is_approval(),
            calldata = %call.data,
            value = %call.value,
            "Submitting call"
        );

        let outcome = client.send(&chain.rpc_url, &call).await?;
        info!(
            chain = %chain.code,
            function = step.call.signature(),
            tx_hash = %outcome.tx_hash,
            block = ?outcome.block_number,
            "Transaction confirmed"
        );

        receipts.push(DirectReceipt {
            side: step.side,
            signature: step.call.signature(),
            tx_hash: outcome.tx_hash,
        });
    }

    Ok(receipts)
}
