//! Registration intents and group files
//!
//! A group file `bridges.<group>.yml` lists the bridge legs to register:
//!
//! ```yaml
//! registers:
//!   - type: lnv3
//!     symbol: usdt
//!     bridge: arbitrum->linea
//!     source_token_address: "0xFd086bC7CD5C481DCC9C85ebE478A1C0b69FCbb9"
//!     target_token_address: "0xA219439258ca9da29E9Cc4cE5596924745e12B93"
//!     base_fee: 0.1
//!     liquidity_fee_rate: 0.001
//!     transfer_limit: 100000
//!     approve: 1000000
//!     deposit: 100
//!   - include: linea-usdc.yml
//! ```
//!
//! The declared field spelling of every entry is kept next to the typed view;
//! it is what the idempotency lock hashes and persists.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::de::{self, DecimalString};
use crate::error::RegisterError;

/// Bridge protocol variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BridgeType {
    #[serde(rename = "lnv3")]
    Lnv3,
    #[serde(rename = "lnv2-default")]
    Lnv2Default,
    #[serde(rename = "lnv2-opposite")]
    Lnv2Opposite,
}

impl BridgeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lnv3 => "lnv3",
            Self::Lnv2Default => "lnv2-default",
            Self::Lnv2Opposite => "lnv2-opposite",
        }
    }

    /// Chain holding the relayer margin
    pub fn margin_side(&self) -> ChainSide {
        match self {
            Self::Lnv2Default => ChainSide::Target,
            Self::Lnv3 | Self::Lnv2Opposite => ChainSide::Source,
        }
    }

    /// Protocol version tag used by the bridge info index
    pub fn index_version(&self) -> &'static str {
        match self {
            Self::Lnv3 => "lnv3",
            Self::Lnv2Default | Self::Lnv2Opposite => "lnv2",
        }
    }
}

impl fmt::Display for BridgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BridgeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lnv3" => Ok(Self::Lnv3),
            "lnv2-default" => Ok(Self::Lnv2Default),
            "lnv2-opposite" => Ok(Self::Lnv2Opposite),
            other => Err(format!("unknown bridge type {other:?}")),
        }
    }
}

/// `source->target` chain codes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub struct BridgeDirection {
    pub source: String,
    pub target: String,
}

impl FromStr for BridgeDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (source, target) = s
            .split_once("->")
            .ok_or_else(|| format!("bridge {s:?} is not of the form source->target"))?;
        let (source, target) = (source.trim(), target.trim());
        if source.is_empty() || target.is_empty() || target.contains("->") {
            return Err(format!("bridge {s:?} is not of the form source->target"));
        }
        Ok(Self {
            source: source.to_ascii_lowercase(),
            target: target.to_ascii_lowercase(),
        })
    }
}

impl TryFrom<String> for BridgeDirection {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl fmt::Display for BridgeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.source, self.target)
    }
}

/// Which side of a bridge a call or setting belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainSide {
    Source,
    Target,
}

impl fmt::Display for ChainSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => f.write_str("source"),
            Self::Target => f.write_str("target"),
        }
    }
}

/// Multi-signature wallet addressing of an intent
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SafeAddressing {
    #[serde(default, alias = "safeWalletAddress", deserialize_with = "de::option_address")]
    pub safe_wallet_address: Option<Address>,
    #[serde(
        default,
        alias = "sourceSafeWalletAddress",
        deserialize_with = "de::option_address"
    )]
    pub source_safe_wallet_address: Option<Address>,
    #[serde(
        default,
        alias = "targetSafeWalletAddress",
        deserialize_with = "de::option_address"
    )]
    pub target_safe_wallet_address: Option<Address>,
    #[serde(default, alias = "sourceSafeWalletUrl")]
    pub source_safe_wallet_url: Option<String>,
    #[serde(default, alias = "targetSafeWalletUrl")]
    pub target_safe_wallet_url: Option<String>,
}

impl SafeAddressing {
    /// Any Safe address present selects proposal dispatch
    pub fn is_configured(&self) -> bool {
        self.safe_wallet_address.is_some()
            || self.source_safe_wallet_address.is_some()
            || self.target_safe_wallet_address.is_some()
    }

    pub fn safe_for(&self, side: ChainSide) -> Option<Address> {
        match side {
            ChainSide::Source => self.safe_wallet_address.or(self.source_safe_wallet_address),
            ChainSide::Target => self.safe_wallet_address.or(self.target_safe_wallet_address),
        }
    }

    pub fn service_url_for(&self, side: ChainSide) -> Option<&str> {
        match side {
            ChainSide::Source => self.source_safe_wallet_url.as_deref(),
            ChainSide::Target => self.target_safe_wallet_url.as_deref(),
        }
    }

    /// Address registered as relayer when the intent is Safe-owned
    pub fn relayer(&self) -> Option<Address> {
        self.safe_wallet_address.or(self.source_safe_wallet_address)
    }
}

#[derive(Debug, Deserialize)]
struct IntentFields {
    #[serde(rename = "type")]
    bridge_type: BridgeType,
    symbol: String,
    bridge: BridgeDirection,
    #[serde(alias = "sourceTokenAddress", deserialize_with = "de::address")]
    source_token_address: Address,
    #[serde(alias = "targetTokenAddress", deserialize_with = "de::address")]
    target_token_address: Address,
    #[serde(default, deserialize_with = "de::option_address")]
    contract: Option<Address>,
    #[serde(alias = "baseFee")]
    base_fee: DecimalString,
    #[serde(alias = "liquidityFeeRate")]
    liquidity_fee_rate: DecimalString,
    #[serde(default, alias = "transferLimit")]
    transfer_limit: Option<DecimalString>,
    approve: DecimalString,
    deposit: DecimalString,
    #[serde(flatten)]
    safe: SafeAddressing,
}

/// One bridge leg to register, immutable once loaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationIntent {
    pub bridge_type: BridgeType,
    pub symbol: String,
    pub direction: BridgeDirection,
    pub source_token_address: Address,
    pub target_token_address: Address,
    pub contract: Option<Address>,
    pub base_fee: DecimalString,
    pub liquidity_fee_rate: DecimalString,
    pub transfer_limit: Option<DecimalString>,
    pub approve: DecimalString,
    pub deposit: DecimalString,
    pub safe: SafeAddressing,
    raw: BTreeMap<String, Value>,
}

impl RegistrationIntent {
    /// Parse one `registers` entry
    pub fn from_value(value: Value) -> Result<Self, RegisterError> {
        let raw: BTreeMap<String, Value> = match &value {
            Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            other => {
                return Err(RegisterError::configuration(format!(
                    "register entry must be a mapping, got {other}"
                )))
            }
        };

        let f: IntentFields = serde_json::from_value(value).map_err(|e| {
            let label = raw
                .get("symbol")
                .map(|s| s.to_string())
                .unwrap_or_else(|| "<unnamed>".to_string());
            RegisterError::configuration(format!("invalid register entry {label}: {e}"))
        })?;

        Ok(Self {
            bridge_type: f.bridge_type,
            symbol: f.symbol.trim().to_ascii_lowercase(),
            direction: f.bridge,
            source_token_address: f.source_token_address,
            target_token_address: f.target_token_address,
            contract: f.contract,
            base_fee: f.base_fee,
            liquidity_fee_rate: f.liquidity_fee_rate,
            transfer_limit: f.transfer_limit,
            approve: f.approve,
            deposit: f.deposit,
            safe: f.safe,
            raw,
        })
    }

    /// `{type}__{symbol}__{source}_{target}`, the lock file key
    pub fn identity_name(&self) -> String {
        format!(
            "{}__{}__{}_{}",
            self.bridge_type, self.symbol, self.direction.source, self.direction.target
        )
    }

    /// Entry fields exactly as declared, sorted by key
    pub fn raw_fields(&self) -> &BTreeMap<String, Value> {
        &self.raw
    }

    pub fn to_payload(&self) -> Value {
        Value::Object(self.raw.clone().into_iter().collect())
    }
}

#[derive(Debug, Deserialize)]
struct GroupFile {
    #[serde(default)]
    registers: Vec<Value>,
}

fn read_group_file(path: &Path) -> Result<Vec<Value>, RegisterError> {
    let raw = config::Config::builder()
        .add_source(config::File::from(path).format(config::FileFormat::Yaml))
        .build()
        .map_err(|e| RegisterError::configuration(format!("failed to read {}: {e}", path.display())))?;
    let file: GroupFile = raw.try_deserialize().map_err(|e| {
        RegisterError::configuration(format!("invalid register file {}: {e}", path.display()))
    })?;
    Ok(file.registers)
}

/// Resolve an include path: as given, then relative to the datadir, then
/// under `<datadir>/includes/<group>/`.
fn resolve_include(datadir: &Path, group: &str, include: &str) -> Option<PathBuf> {
    [
        PathBuf::from(include),
        datadir.join(include),
        datadir.join("includes").join(group).join(include),
    ]
    .into_iter()
    .find(|p| p.is_file())
}

fn include_target(entry: &Value) -> Result<Option<&str>, RegisterError> {
    let Some(map) = entry.as_object() else {
        return Ok(None);
    };
    let Some(include) = map.get("include") else {
        return Ok(None);
    };
    if map.len() > 1 {
        return Err(RegisterError::configuration(
            "an include entry must not carry other fields",
        ));
    }
    include
        .as_str()
        .map(Some)
        .ok_or_else(|| RegisterError::configuration("include must be a file path"))
}

/// Path of a group file inside the datadir
pub fn group_path(datadir: &Path, group: &str) -> PathBuf {
    datadir.join(format!("bridges.{group}.yml"))
}

/// Load every intent of a group, expanding includes.
///
/// Fails as a whole when a file is missing or an identity name repeats.
pub fn load_group(datadir: &Path, group: &str) -> Result<Vec<RegistrationIntent>, RegisterError> {
    let path = group_path(datadir, group);
    if !path.is_file() {
        return Err(RegisterError::configuration(format!(
            "register group file {} not found",
            path.display()
        )));
    }

    let mut entries = Vec::new();
    for entry in read_group_file(&path)? {
        match include_target(&entry)? {
            None => entries.push(entry),
            Some(include) => {
                let resolved = resolve_include(datadir, group, include).ok_or_else(|| {
                    RegisterError::configuration(format!("include file {include} not found"))
                })?;
                debug!(group = group, include = %resolved.display(), "Expanding include");
                for nested in read_group_file(&resolved)? {
                    if include_target(&nested)?.is_some() {
                        return Err(RegisterError::configuration(format!(
                            "nested include in {}",
                            resolved.display()
                        )));
                    }
                    entries.push(nested);
                }
            }
        }
    }

    let mut seen = HashSet::new();
    let mut intents = Vec::with_capacity(entries.len());
    for entry in entries {
        let intent = RegistrationIntent::from_value(entry)?;
        let name = intent.identity_name();
        if !seen.insert(name.clone()) {
            return Err(RegisterError::DuplicateConfig { name });
        }
        intents.push(intent);
    }
    Ok(intents)
}
