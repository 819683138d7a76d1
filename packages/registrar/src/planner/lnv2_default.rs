//! lnv2-default: margin lives on the target chain, fees on the source chain.
//!
//! target: approve -> depositProviderMargin
//! source: setProviderFee

use alloy::primitives::U256;
use helix_chain::evm::LnDefaultBridge;

use super::{
    approval_step, narrow_rate, native_value, CallPlan, CallStep, ContractCall, MarginAdjustment,
    RegistrationPlanner, ScaledAmounts,
};
use crate::context::ChainContext;
use crate::error::RegisterError;
use crate::intent::{BridgeType, ChainSide, RegistrationIntent};

pub struct Lnv2DefaultPlanner;

impl RegistrationPlanner for Lnv2DefaultPlanner {
    fn bridge_type(&self) -> BridgeType {
        BridgeType::Lnv2Default
    }

    fn plan(
        &self,
        intent: &RegistrationIntent,
        ctx: &ChainContext,
        existing_margin: U256,
    ) -> Result<CallPlan, RegisterError> {
        let source_contract = ctx.contract(ChainSide::Source)?;
        let target_contract = ctx.contract(ChainSide::Target)?;
        let amounts = ScaledAmounts::compute(intent, ctx, existing_margin)?;

        let mut steps = Vec::with_capacity(3);
        steps.extend(approval_step(
            ctx,
            ChainSide::Target,
            target_contract,
            amounts.approve,
        ));
        match amounts.margin {
            MarginAdjustment::Deposit { amount } => {
                steps.push(
                    CallStep::new(
                        ChainSide::Target,
                        target_contract,
                        ContractCall::DepositProviderMargin(
                            LnDefaultBridge::depositProviderMarginCall {
                                remoteChainId: U256::from(ctx.source_chain.id),
                                sourceToken: ctx.source_token.address,
                                targetToken: ctx.target_token.address,
                                margin: amount,
                            },
                        ),
                    )
                    .with_value(native_value(ctx, ChainSide::Target, amount)),
                );
            }
            MarginAdjustment::WithinDust { .. } | MarginAdjustment::WithdrawUnsupported { .. } => {}
        }

        steps.push(CallStep::new(
            ChainSide::Source,
            source_contract,
            ContractCall::SetProviderFee(LnDefaultBridge::setProviderFeeCall {
                remoteChainId: U256::from(ctx.target_chain.id),
                sourceToken: ctx.source_token.address,
                targetToken: ctx.target_token.address,
                baseFee: amounts.base_fee,
                liquidityFeeRate: narrow_rate(amounts.fee_rate, 8)?,
            }),
        ));

        Ok(CallPlan {
            bridge_type: BridgeType::Lnv2Default,
            steps,
            margin: amounts.margin,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::fixtures::{self, TARGET_TOKEN};
    use crate::planner::U112;

    #[test]
    fn test_two_chain_plan() {
        let intent = fixtures::intent(BridgeType::Lnv2Default, "150");
        // margin is denominated in the 18-decimal target token
        let ctx = fixtures::context(BridgeType::Lnv2Default, 6, 18);
        let existing = U256::from(100u64) * U256::from(10u64).pow(U256::from(18u8));
        let plan = Lnv2DefaultPlanner.plan(&intent, &ctx, existing).unwrap();

        assert_eq!(plan.sides(), vec![ChainSide::Target, ChainSide::Source]);

        let target: Vec<_> = plan.steps_on(ChainSide::Target).collect();
        assert_eq!(target.len(), 2);
        assert_eq!(target[0].target_contract, TARGET_TOKEN);
        match &target[0].call {
            ContractCall::Approve(c) => {
                assert_eq!(c.amount, U256::from(1000u64) * U256::from(10u64).pow(U256::from(18u8)))
            }
            other => panic!("unexpected call {other:?}"),
        }
        match &target[1].call {
            ContractCall::DepositProviderMargin(c) => {
                assert_eq!(c.remoteChainId, U256::from(42161u64));
                assert_eq!(c.margin, U256::from(50u64) * U256::from(10u64).pow(U256::from(18u8)));
            }
            other => panic!("unexpected call {other:?}"),
        }

        let source: Vec<_> = plan.steps_on(ChainSide::Source).collect();
        assert_eq!(source.len(), 1);
        match &source[0].call {
            ContractCall::SetProviderFee(c) => {
                assert_eq!(c.remoteChainId, U256::from(59144u64));
                // fee in 6-decimal source units
                assert_eq!(c.baseFee, U112::from(100_000u64));
                assert_eq!(c.liquidityFeeRate, 1u8);
            }
            other => panic!("unexpected call {other:?}"),
        }
    }

    #[test]
    fn test_no_deposit_keeps_approval_and_fee() {
        let intent = fixtures::intent(BridgeType::Lnv2Default, "90");
        let ctx = fixtures::context(BridgeType::Lnv2Default, 6, 0);
        let plan = Lnv2DefaultPlanner
            .plan(&intent, &ctx, U256::from(200u64))
            .unwrap();

        assert_eq!(plan.sides(), vec![ChainSide::Target, ChainSide::Source]);
        assert!(plan.steps_on(ChainSide::Target).all(|s| s.is_approval()));
        assert_eq!(
            plan.margin,
            MarginAdjustment::WithdrawUnsupported {
                excess: U256::from(110u64)
            }
        );
    }

    #[test]
    fn test_deny_listed_approval_omitted() {
        let intent = fixtures::intent(BridgeType::Lnv2Default, "10");
        let mut ctx = fixtures::context(BridgeType::Lnv2Default, 6, 6);
        ctx.target_token.approval_required = false;
        let plan = Lnv2DefaultPlanner.plan(&intent, &ctx, U256::ZERO).unwrap();
        assert!(!plan.steps.iter().any(|s| s.is_approval()));
        assert_eq!(plan.steps.len(), 2);
    }

    #[test]
    fn test_fee_rate_must_fit_uint8() {
        let mut intent = fixtures::intent(BridgeType::Lnv2Default, "1");
        intent.liquidity_fee_rate = "0.3".into();
        let ctx = fixtures::context(BridgeType::Lnv2Default, 6, 6);
        assert!(matches!(
            Lnv2DefaultPlanner.plan(&intent, &ctx, U256::ZERO),
            Err(RegisterError::InvalidAmount {
                field: "liquidity_fee_rate",
                ..
            })
        ));
    }
}
