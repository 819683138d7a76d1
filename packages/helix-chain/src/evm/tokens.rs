//! ERC20 Token Helpers

use alloy::{primitives::Address, sol_types::SolCall};

use crate::error::ChainError;
use crate::evm::client::ChainClient;
use crate::evm::contracts::ERC20;

/// Query `decimals()` of an ERC20 token
pub async fn token_decimals(
    client: &dyn ChainClient,
    rpc_url: &str,
    token: Address,
) -> Result<u8, ChainError> {
    let data = ERC20::decimalsCall {}.abi_encode();
    let raw = client.call(rpc_url, token, data.into()).await?;
    let decoded =
        ERC20::decimalsCall::abi_decode_returns(&raw, true).map_err(|e| ChainError::Decode {
            method: "decimals()",
            reason: e.to_string(),
        })?;
    Ok(decoded._0)
}
