//! Chain context resolution
//!
//! Turns an intent's chain codes and token addresses into everything the
//! planners need: numeric chain ids, RPC endpoints, token decimals, native
//! flags, approval requirements and the relayer address. Both chains and both
//! tokens must resolve before anything is planned.

use alloy::primitives::Address;
use helix_chain::evm::token_decimals;
use helix_chain::{mask_url, ChainClient};
use tracing::{debug, warn};

use crate::definition::{Definition, TokenKind, NATIVE_DECIMALS};
use crate::error::RegisterError;
use crate::intent::{BridgeType, ChainSide, RegistrationIntent};

/// One resolved chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainEndpoint {
    pub code: String,
    pub id: u64,
    pub rpc_url: String,
    pub native_symbol: String,
    /// Bridge contract for the intent's protocol on this chain, if known
    pub contract: Option<Address>,
    pub multisend: Option<Address>,
}

/// One resolved token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedToken {
    pub address: Address,
    pub decimals: u8,
    pub is_native: bool,
    /// False for native assets and deny-listed (symbol, chain) pairs
    pub approval_required: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainContext {
    pub bridge_type: BridgeType,
    pub source_chain: ChainEndpoint,
    pub target_chain: ChainEndpoint,
    pub source_token: ResolvedToken,
    pub target_token: ResolvedToken,
    pub relayer_address: Address,
}

impl ChainContext {
    pub fn chain(&self, side: ChainSide) -> &ChainEndpoint {
        match side {
            ChainSide::Source => &self.source_chain,
            ChainSide::Target => &self.target_chain,
        }
    }

    pub fn token(&self, side: ChainSide) -> &ResolvedToken {
        match side {
            ChainSide::Source => &self.source_token,
            ChainSide::Target => &self.target_token,
        }
    }

    /// Bridge contract on `side`; required by every call on that chain
    pub fn contract(&self, side: ChainSide) -> Result<Address, RegisterError> {
        let chain = self.chain(side);
        chain.contract.ok_or_else(|| {
            RegisterError::configuration(format!(
                "no {} contract for chain {}",
                self.bridge_type, chain.code
            ))
        })
    }
}

async fn resolve_chain(
    code: &str,
    intent: &RegistrationIntent,
    definition: &Definition,
    client: &dyn ChainClient,
) -> Result<ChainEndpoint, RegisterError> {
    let def = definition
        .chain(code)
        .ok_or_else(|| RegisterError::UnresolvedChain {
            chain: code.to_string(),
        })?;

    let id = client.chain_id(&def.rpc).await?;
    if let Some(expected) = def.id {
        if expected != id {
            return Err(RegisterError::configuration(format!(
                "chain {code} is defined with id {expected} but {} reports {id}",
                mask_url(&def.rpc)
            )));
        }
    }

    Ok(ChainEndpoint {
        code: code.to_string(),
        id,
        rpc_url: def.rpc.clone(),
        native_symbol: def.native.clone().unwrap_or_default(),
        contract: intent
            .contract
            .or_else(|| definition.bridge_contract(code, intent.bridge_type)),
        multisend: def.multisend,
    })
}

async fn resolve_token(
    chain: &ChainEndpoint,
    symbol: &str,
    address: Address,
    definition: &Definition,
    client: &dyn ChainClient,
) -> Result<ResolvedToken, RegisterError> {
    let def = definition.token(&chain.code, symbol);
    let is_native = match def {
        Some(d) => d.kind == TokenKind::Native,
        None => address == Address::ZERO,
    };
    let static_decimals = def.and_then(|d| d.decimals);

    let decimals = if is_native {
        static_decimals.unwrap_or(NATIVE_DECIMALS)
    } else {
        match token_decimals(client, &chain.rpc_url, address).await {
            Ok(d) => d,
            Err(e) => {
                warn!(
                    chain = %chain.code,
                    token = %address,
                    error = %e,
                    "Can not query decimals from contract, using static definition"
                );
                static_decimals.ok_or_else(|| RegisterError::UnresolvedToken {
                    chain: chain.code.clone(),
                    symbol: symbol.to_string(),
                    reason: format!("decimals() failed and no static decimals defined: {e}"),
                })?
            }
        }
    };

    Ok(ResolvedToken {
        address,
        decimals,
        is_native,
        approval_required: !is_native && !definition.is_approve_disabled(symbol, chain.id),
    })
}

/// Resolve the chain context of `intent`
pub async fn resolve_context(
    intent: &RegistrationIntent,
    definition: &Definition,
    client: &dyn ChainClient,
) -> Result<ChainContext, RegisterError> {
    let source_chain = resolve_chain(&intent.direction.source, intent, definition, client).await?;
    let target_chain = resolve_chain(&intent.direction.target, intent, definition, client).await?;

    let source_token = resolve_token(
        &source_chain,
        &intent.symbol,
        intent.source_token_address,
        definition,
        client,
    )
    .await?;
    let target_token = resolve_token(
        &target_chain,
        &intent.symbol,
        intent.target_token_address,
        definition,
        client,
    )
    .await?;

    let relayer_address = intent.safe.relayer().unwrap_or_else(|| client.sender());

    debug!(
        source = %source_chain.code,
        source_id = source_chain.id,
        target = %target_chain.code,
        target_id = target_chain.id,
        source_decimals = source_token.decimals,
        target_decimals = target_token.decimals,
        relayer = %relayer_address,
        "Resolved chain context"
    );

    Ok(ChainContext {
        bridge_type: intent.bridge_type,
        source_chain,
        target_chain,
        source_token,
        target_token,
        relayer_address,
    })
}
