//! Static chain and token definitions (`definition.yml`)
//!
//! ```yaml
//! chains:
//!   arbitrum:
//!     id: 42161
//!     rpc: https://arb1.arbitrum.io/rpc
//!     native: ETH
//!     contracts:
//!       lnv3: "0xbA5D580B18b6436411562981e02c8A9aA1776D10"
//! tokens:
//!   arbitrum:
//!     usdt: { address: "0xFd086bC7CD5C481DCC9C85ebE478A1C0b69FCbb9", decimals: 6 }
//!     eth: { address: 0x0000000000000000000000000000000000000000, decimals: 18, type: native }
//! disable_approve:
//!   - { symbol: eth, chain_id: 42161 }
//! indexer:
//!   mainnet: { endpoint: https://apollo.helixbridge.app/graphql, chains: [arbitrum, linea] }
//! safepin:
//!   "5000": { base_gas: 50000, gas_price: 1000000000 }
//! ```
//!
//! Chain codes and token symbols are matched case-insensitively.

use std::collections::HashMap;
use std::path::Path;

use alloy::primitives::Address;
use helix_chain::SafePin;
use serde::Deserialize;

use crate::de;
use crate::error::RegisterError;
use crate::intent::BridgeType;

/// Decimals assumed for a chain's native asset when the definition omits them
pub const NATIVE_DECIMALS: u8 = 18;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Definition {
    #[serde(default)]
    pub chains: HashMap<String, ChainDefinition>,
    #[serde(default)]
    pub tokens: HashMap<String, HashMap<String, TokenDefinition>>,
    #[serde(default)]
    pub disable_approve: Vec<ApprovalExemption>,
    #[serde(default)]
    pub indexer: HashMap<String, IndexerDefinition>,
    /// Safe gas pins keyed by numeric chain id
    #[serde(default)]
    pub safepin: HashMap<String, SafePin>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainDefinition {
    #[serde(default)]
    pub id: Option<u64>,
    pub rpc: String,
    #[serde(default)]
    pub native: Option<String>,
    #[serde(default)]
    pub contracts: BridgeContracts,
    /// MultiSendCallOnly deployment, when not at the canonical address
    #[serde(default, deserialize_with = "de::option_address")]
    pub multisend: Option<Address>,
}

/// Protocol contracts deployed on one chain
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BridgeContracts {
    #[serde(default, deserialize_with = "de::option_address")]
    pub lnv3: Option<Address>,
    #[serde(default, alias = "lnv2-default", deserialize_with = "de::option_address")]
    pub lnv2_default: Option<Address>,
    #[serde(default, alias = "lnv2-opposite", deserialize_with = "de::option_address")]
    pub lnv2_opposite: Option<Address>,
}

impl BridgeContracts {
    pub fn get(&self, bridge: BridgeType) -> Option<Address> {
        match bridge {
            BridgeType::Lnv3 => self.lnv3,
            BridgeType::Lnv2Default => self.lnv2_default,
            BridgeType::Lnv2Opposite => self.lnv2_opposite,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    #[default]
    Erc20,
    Native,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenDefinition {
    #[serde(deserialize_with = "de::address")]
    pub address: Address,
    #[serde(default)]
    pub decimals: Option<u8>,
    #[serde(default, rename = "type")]
    pub kind: TokenKind,
}

/// A (symbol, chain) pair whose token needs no allowance
#[derive(Debug, Clone, Deserialize)]
pub struct ApprovalExemption {
    pub symbol: String,
    pub chain_id: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexerDefinition {
    pub endpoint: String,
    #[serde(default)]
    pub chains: Vec<String>,
}

impl Definition {
    /// Load a definition file
    pub fn load(path: &Path) -> Result<Self, RegisterError> {
        if !path.exists() {
            return Err(RegisterError::configuration(format!(
                "definition file {} not found",
                path.display()
            )));
        }

        let raw = config::Config::builder()
            .add_source(config::File::from(path).format(config::FileFormat::Yaml))
            .build()
            .map_err(|e| {
                RegisterError::configuration(format!("failed to read {}: {e}", path.display()))
            })?;

        raw.try_deserialize().map_err(|e| {
            RegisterError::configuration(format!("invalid definition {}: {e}", path.display()))
        })
    }

    pub fn chain(&self, code: &str) -> Option<&ChainDefinition> {
        self.chains
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(code))
            .map(|(_, v)| v)
    }

    pub fn token(&self, chain: &str, symbol: &str) -> Option<&TokenDefinition> {
        self.tokens
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(chain))
            .and_then(|(_, tokens)| {
                tokens
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(symbol))
                    .map(|(_, v)| v)
            })
    }

    /// Whether `symbol` on `chain_id` is on the approval deny-list
    pub fn is_approve_disabled(&self, symbol: &str, chain_id: u64) -> bool {
        self.disable_approve
            .iter()
            .any(|e| e.chain_id == chain_id && e.symbol.eq_ignore_ascii_case(symbol))
    }

    /// Indexer endpoint serving `chain`
    pub fn indexer_endpoint(&self, chain: &str) -> Option<&str> {
        let mut names: Vec<&String> = self.indexer.keys().collect();
        names.sort();
        names.into_iter().find_map(|name| {
            let def = &self.indexer[name];
            def.chains
                .iter()
                .any(|c| c.eq_ignore_ascii_case(chain))
                .then_some(def.endpoint.as_str())
        })
    }

    pub fn safe_pin(&self, chain_id: u64) -> SafePin {
        self.safepin
            .get(&chain_id.to_string())
            .cloned()
            .unwrap_or_default()
    }

    pub fn bridge_contract(&self, chain: &str, bridge: BridgeType) -> Option<Address> {
        self.chain(chain).and_then(|c| c.contracts.get(bridge))
    }
}
