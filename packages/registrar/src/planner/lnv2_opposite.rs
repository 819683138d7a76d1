//! lnv2-opposite: fee and margin are set together on the source chain.
//!
//! approve -> updateProviderFeeAndMargin(margin delta), with the delta attached
//! as value when the source token is native.

use alloy::primitives::U256;
use helix_chain::evm::LnOppositeBridge;

use super::{
    approval_step, narrow_rate, native_value, to_u112, CallPlan, CallStep, ContractCall,
    RegistrationPlanner, ScaledAmounts,
};
use crate::context::ChainContext;
use crate::error::RegisterError;
use crate::intent::{BridgeType, ChainSide, RegistrationIntent};

pub struct Lnv2OppositePlanner;

impl RegistrationPlanner for Lnv2OppositePlanner {
    fn bridge_type(&self) -> BridgeType {
        BridgeType::Lnv2Opposite
    }

    fn plan(
        &self,
        intent: &RegistrationIntent,
        ctx: &ChainContext,
        existing_margin: U256,
    ) -> Result<CallPlan, RegisterError> {
        let side = ChainSide::Source;
        let contract = ctx.contract(side)?;
        let amounts = ScaledAmounts::compute(intent, ctx, existing_margin)?;

        // a withdrawal surfaces as zero margin here
        let margin = amounts.margin.deposit_amount();

        let mut steps = Vec::with_capacity(2);
        steps.extend(approval_step(ctx, side, contract, amounts.approve));
        steps.push(
            CallStep::new(
                side,
                contract,
                ContractCall::UpdateProviderFeeAndMargin(
                    LnOppositeBridge::updateProviderFeeAndMarginCall {
                        remoteChainId: U256::from(ctx.target_chain.id),
                        sourceToken: ctx.source_token.address,
                        targetToken: ctx.target_token.address,
                        margin: to_u112(margin, "deposit")?,
                        baseFee: amounts.base_fee,
                        liquidityFeeRate: narrow_rate(amounts.fee_rate, 16)?,
                    },
                ),
            )
            .with_value(native_value(ctx, side, margin)),
        );

        Ok(CallPlan {
            bridge_type: BridgeType::Lnv2Opposite,
            steps,
            margin: amounts.margin,
        })
    }
}
