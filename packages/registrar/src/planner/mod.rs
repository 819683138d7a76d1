//! Registration planners
//!
//! One `RegistrationPlanner` per bridge protocol turns an intent, its resolved
//! chain context and the margin already deposited into an ordered `CallPlan`.
//! Scaling and margin reconciliation are shared; the variants only differ in
//! which calls they emit, on which chain, and in what order.
//!
//! ## Variants
//!
//! - `lnv3` - approve, `registerLnProvider`, `depositPenaltyReserve` on the source chain
//! - `lnv2_default` - approve + `depositProviderMargin` on the target chain,
//!   `setProviderFee` on the source chain
//! - `lnv2_opposite` - approve + `updateProviderFeeAndMargin` on the source chain

mod lnv2_default;
mod lnv2_opposite;
mod lnv3;

pub use lnv2_default::Lnv2DefaultPlanner;
pub use lnv2_opposite::Lnv2OppositePlanner;
pub use lnv3::Lnv3Planner;

use std::fmt;

use alloy::primitives::{Address, Bytes, Uint, I256, U256};
use alloy::sol_types::SolCall;
use helix_chain::evm::{LnBridgeV3, LnDefaultBridge, LnOppositeBridge, ERC20};

use crate::amount::{absolute_value, scale_rate, to_fixed_point};
use crate::context::ChainContext;
use crate::de::DecimalString;
use crate::error::{AmountError, RegisterError};
use crate::intent::{BridgeType, ChainSide, RegistrationIntent};

/// Margin differences at or below this many base units are not reconciled
pub const DUST_THRESHOLD: u64 = 10;

pub type U112 = Uint<112, 2>;

/// ABI call emitted by a planner
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractCall {
    Approve(ERC20::approveCall),
    RegisterLnProvider(LnBridgeV3::registerLnProviderCall),
    DepositPenaltyReserve(LnBridgeV3::depositPenaltyReserveCall),
    SetProviderFee(LnDefaultBridge::setProviderFeeCall),
    DepositProviderMargin(LnDefaultBridge::depositProviderMarginCall),
    UpdateProviderFeeAndMargin(LnOppositeBridge::updateProviderFeeAndMarginCall),
}

impl ContractCall {
    pub fn signature(&self) -> &'static str {
        match self {
            Self::Approve(_) => ERC20::approveCall::SIGNATURE,
            Self::RegisterLnProvider(_) => LnBridgeV3::registerLnProviderCall::SIGNATURE,
            Self::DepositPenaltyReserve(_) => LnBridgeV3::depositPenaltyReserveCall::SIGNATURE,
            Self::SetProviderFee(_) => LnDefaultBridge::setProviderFeeCall::SIGNATURE,
            Self::DepositProviderMargin(_) => LnDefaultBridge::depositProviderMarginCall::SIGNATURE,
            Self::UpdateProviderFeeAndMargin(_) => {
                LnOppositeBridge::updateProviderFeeAndMarginCall::SIGNATURE
            }
        }
    }

    pub fn selector(&self) -> [u8; 4] {
        match self {
            Self::Approve(_) => ERC20::approveCall::SELECTOR,
            Self::RegisterLnProvider(_) => LnBridgeV3::registerLnProviderCall::SELECTOR,
            Self::DepositPenaltyReserve(_) => LnBridgeV3::depositPenaltyReserveCall::SELECTOR,
            Self::SetProviderFee(_) => LnDefaultBridge::setProviderFeeCall::SELECTOR,
            Self::DepositProviderMargin(_) => LnDefaultBridge::depositProviderMarginCall::SELECTOR,
            Self::UpdateProviderFeeAndMargin(_) => {
                LnOppositeBridge::updateProviderFeeAndMarginCall::SELECTOR
            }
        }
    }

    pub fn calldata(&self) -> Bytes {
        match self {
            Self::Approve(c) => c.abi_encode(),
            Self::RegisterLnProvider(c) => c.abi_encode(),
            Self::DepositPenaltyReserve(c) => c.abi_encode(),
            Self::SetProviderFee(c) => c.abi_encode(),
            Self::DepositProviderMargin(c) => c.abi_encode(),
            Self::UpdateProviderFeeAndMargin(c) => c.abi_encode(),
        }
        .into()
    }
}

/// One call of a plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallStep {
    pub side: ChainSide,
    pub target_contract: Address,
    pub call: ContractCall,
    /// Native value attached to the transaction
    pub native_value: U256,
}

impl CallStep {
    pub fn new(side: ChainSide, target_contract: Address, call: ContractCall) -> Self {
        Self {
            side,
            target_contract,
            call,
            native_value: U256::ZERO,
        }
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.native_value = value;
        self
    }

    pub fn is_approval(&self) -> bool {
        matches!(self.call, ContractCall::Approve(_))
    }
}

/// What the planner decided about the relayer margin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarginAdjustment {
    /// Deposit `amount` more
    Deposit { amount: U256 },
    /// Declared and deposited margin differ by at most the dust threshold
    WithinDust { delta: I256 },
    /// More is deposited than declared; withdrawals are never planned
    WithdrawUnsupported { excess: U256 },
}

impl MarginAdjustment {
    /// Amount a deposit step must carry, zero otherwise
    pub fn deposit_amount(&self) -> U256 {
        match self {
            Self::Deposit { amount } => *amount,
            _ => U256::ZERO,
        }
    }
}

impl fmt::Display for MarginAdjustment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deposit { amount } => write!(f, "deposit {amount}"),
            Self::WithinDust { delta } => write!(f, "unchanged (delta {delta} within dust)"),
            Self::WithdrawUnsupported { excess } => {
                write!(f, "withdraw of {excess} required but not supported")
            }
        }
    }
}

/// Reconcile the declared margin against what is already deposited
pub fn margin_adjustment(desired: U256, existing: U256) -> Result<MarginAdjustment, AmountError> {
    let signed = |v: U256| {
        I256::try_from(v).map_err(|_| AmountError::Overflow {
            value: v.to_string(),
        })
    };
    let delta = signed(desired)? - signed(existing)?;
    let magnitude = absolute_value(delta);

    Ok(if magnitude <= U256::from(DUST_THRESHOLD) {
        MarginAdjustment::WithinDust { delta }
    } else if delta.is_positive() {
        MarginAdjustment::Deposit { amount: magnitude }
    } else {
        MarginAdjustment::WithdrawUnsupported { excess: magnitude }
    })
}

/// Ordered calls for one intent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallPlan {
    pub bridge_type: BridgeType,
    pub steps: Vec<CallStep>,
    pub margin: MarginAdjustment,
}

impl CallPlan {
    /// Chains touched by the plan, in order of first use
    pub fn sides(&self) -> Vec<ChainSide> {
        let mut sides = Vec::new();
        for step in &self.steps {
            if !sides.contains(&step.side) {
                sides.push(step.side);
            }
        }
        sides
    }

    pub fn steps_on(&self, side: ChainSide) -> impl Iterator<Item = &CallStep> {
        self.steps.iter().filter(move |s| s.side == side)
    }

    pub fn native_value_on(&self, side: ChainSide) -> U256 {
        self.steps_on(side)
            .fold(U256::ZERO, |acc, s| acc + s.native_value)
    }
}

/// Plans the calls that reconcile one intent with chain state
pub trait RegistrationPlanner: Send + Sync {
    fn bridge_type(&self) -> BridgeType;

    fn plan(
        &self,
        intent: &RegistrationIntent,
        ctx: &ChainContext,
        existing_margin: U256,
    ) -> Result<CallPlan, RegisterError>;
}

/// Planner for a bridge type
pub fn planner_for(bridge: BridgeType) -> Box<dyn RegistrationPlanner> {
    match bridge {
        BridgeType::Lnv3 => Box::new(Lnv3Planner),
        BridgeType::Lnv2Default => Box::new(Lnv2DefaultPlanner),
        BridgeType::Lnv2Opposite => Box::new(Lnv2OppositePlanner),
    }
}

/// Amounts shared by every variant, already in token base units
#[derive(Debug, Clone)]
pub(crate) struct ScaledAmounts {
    pub base_fee: U112,
    pub fee_rate: u64,
    pub approve: U256,
    pub margin: MarginAdjustment,
}

impl ScaledAmounts {
    /// Fees use the source token decimals; approval and deposit use the token
    /// on the chain where the margin is held.
    pub fn compute(
        intent: &RegistrationIntent,
        ctx: &ChainContext,
        existing_margin: U256,
    ) -> Result<Self, RegisterError> {
        let fee_decimals = ctx.source_token.decimals;
        let margin_decimals = ctx.token(intent.bridge_type.margin_side()).decimals;

        let base_fee = scale(&intent.base_fee, fee_decimals, "base_fee")?;
        let fee_rate =
            scale_rate(intent.liquidity_fee_rate.as_str()).map_err(RegisterError::amount("liquidity_fee_rate"))?;
        let approve = scale(&intent.approve, margin_decimals, "approve")?;
        let deposit = scale(&intent.deposit, margin_decimals, "deposit")?;
        let margin =
            margin_adjustment(deposit, existing_margin).map_err(RegisterError::amount("deposit"))?;

        Ok(Self {
            base_fee: to_u112(base_fee, "base_fee")?,
            fee_rate,
            approve,
            margin,
        })
    }
}

pub(crate) fn scale(
    value: &DecimalString,
    decimals: u8,
    field: &'static str,
) -> Result<U256, RegisterError> {
    to_fixed_point(value.as_str(), decimals).map_err(RegisterError::amount(field))
}

pub(crate) fn to_u112(value: U256, field: &'static str) -> Result<U112, RegisterError> {
    if value.bit_len() > 112 {
        return Err(RegisterError::amount(field)(AmountError::OutOfRange {
            field,
            value: value.to_string(),
            bits: 112,
        }));
    }
    Ok(U112::from(value))
}

pub(crate) fn narrow_rate<T: TryFrom<u64>>(rate: u64, bits: usize) -> Result<T, RegisterError> {
    T::try_from(rate).map_err(|_| {
        RegisterError::amount("liquidity_fee_rate")(AmountError::OutOfRange {
            field: "liquidity_fee_rate",
            value: rate.to_string(),
            bits,
        })
    })
}

/// Approval of `amount` for the bridge contract, unless the token needs none
pub(crate) fn approval_step(
    ctx: &ChainContext,
    side: ChainSide,
    spender: Address,
    amount: U256,
) -> Option<CallStep> {
    let token = ctx.token(side);
    token.approval_required.then(|| {
        CallStep::new(
            side,
            token.address,
            ContractCall::Approve(ERC20::approveCall { spender, amount }),
        )
    })
}

/// Native value for a margin transfer of `amount` on `side`
pub(crate) fn native_value(ctx: &ChainContext, side: ChainSide, amount: U256) -> U256 {
    if ctx.token(side).is_native {
        amount
    } else {
        U256::ZERO
    }
}
