//! lnv3: everything happens on the source chain.
//!
//! approve -> registerLnProvider -> depositPenaltyReserve

use alloy::primitives::U256;
use helix_chain::evm::LnBridgeV3;

use super::{
    approval_step, narrow_rate, native_value, scale, to_u112, CallPlan, CallStep, ContractCall,
    MarginAdjustment, RegistrationPlanner, ScaledAmounts,
};
use crate::context::ChainContext;
use crate::error::RegisterError;
use crate::intent::{BridgeType, ChainSide, RegistrationIntent};

pub struct Lnv3Planner;

impl RegistrationPlanner for Lnv3Planner {
    fn bridge_type(&self) -> BridgeType {
        BridgeType::Lnv3
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

        let limit = intent.transfer_limit.as_ref().ok_or_else(|| {
            RegisterError::configuration(format!(
                "{} requires transfer_limit",
                intent.identity_name()
            ))
        })?;
        let transfer_limit = to_u112(
            scale(limit, ctx.source_token.decimals, "transfer_limit")?,
            "transfer_limit",
        )?;

        let mut steps = Vec::with_capacity(3);
        steps.extend(approval_step(ctx, side, contract, amounts.approve));
        steps.push(CallStep::new(
            side,
            contract,
            ContractCall::RegisterLnProvider(LnBridgeV3::registerLnProviderCall {
                remoteChainId: U256::from(ctx.target_chain.id),
                sourceToken: ctx.source_token.address,
                targetToken: ctx.target_token.address,
                baseFee: amounts.base_fee,
                liquidityFeeRate: narrow_rate(amounts.fee_rate, 16)?,
                transferLimit: transfer_limit,
            }),
        ));

        match amounts.margin {
            MarginAdjustment::Deposit { amount } => steps.push(
                CallStep::new(
                    side,
                    contract,
                    ContractCall::DepositPenaltyReserve(LnBridgeV3::depositPenaltyReserveCall {
                        sourceToken: ctx.source_token.address,
                        amount,
                    }),
                )
                .with_value(native_value(ctx, side, amount)),
            ),
            MarginAdjustment::WithinDust { .. } | MarginAdjustment::WithdrawUnsupported { .. } => {}
        }

        Ok(CallPlan {
            bridge_type: BridgeType::Lnv3,
            steps,
            margin: amounts.margin,
        })
    }
}
