//! Bridge info index
//!
//! The Helix indexer records each relayer's registered margin. The registrar
//! reads it to deposit only the difference between the declared and the
//! already-deposited margin.

use std::time::Duration;

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use helix_chain::mask_url;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::definition::Definition;
use crate::error::IndexError;
use crate::intent::BridgeType;

const QUERY: &str = r#"query queryLnBridgeRelayInfos(
  $fromChain: String,
  $toChain: String,
  $relayer: String,
  $row: Int,
  $page: Int,
  $version: String
) {
  queryLnBridgeRelayInfos(
    fromChain: $fromChain
    toChain: $toChain
    relayer: $relayer
    row: $row
    page: $page
    version: $version
  ) {
    records {
      bridge
      relayer
      sendToken
      margin
    }
  }
}"#;

/// Records fetched per query
const PAGE_ROWS: u32 = 100;

/// Lookup of previously recorded relayer margin
#[async_trait]
pub trait MarginIndex: Send + Sync {
    /// Margin of the first record matching bridge and token, if any
    async fn lookup_margin(
        &self,
        bridge: BridgeType,
        source_token: Address,
        source_chain: &str,
        target_chain: &str,
        relayer: Address,
    ) -> Result<Option<U256>, IndexError>;
}

/// One relay info record
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayRecord {
    pub bridge: String,
    #[serde(default)]
    pub relayer: Option<String>,
    pub send_token: String,
    #[serde(default)]
    pub margin: Option<Value>,
}

fn lower_hex(address: Address) -> String {
    format!("0x{}", hex::encode(address.as_slice()))
}

fn parse_margin(value: &Value) -> Option<U256> {
    match value {
        Value::String(s) => s.trim().parse::<U256>().ok(),
        Value::Number(n) => n.as_u64().map(U256::from),
        Value::Null => Some(U256::ZERO),
        _ => None,
    }
}

/// First record for `bridge` and `source_token`, compared case-insensitively
pub fn find_margin(
    records: &[RelayRecord],
    bridge: BridgeType,
    source_token: Address,
) -> Result<Option<U256>, String> {
    let token = lower_hex(source_token);
    let Some(record) = records
        .iter()
        .find(|r| r.bridge == bridge.as_str() && r.send_token.eq_ignore_ascii_case(&token))
    else {
        return Ok(None);
    };

    match &record.margin {
        None => Ok(Some(U256::ZERO)),
        Some(v) => parse_margin(v)
            .map(Some)
            .ok_or_else(|| format!("unparseable margin {v}")),
    }
}

/// GraphQL client for the Helix indexer
pub struct HelixIndexer {
    http: reqwest::Client,
    definition: Definition,
}

impl HelixIndexer {
    pub fn new(definition: Definition, timeout: Duration) -> Result<Self, IndexError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IndexError::Http {
                endpoint: String::new(),
                source: e,
            })?;
        Ok(Self { http, definition })
    }
}

#[async_trait]
impl MarginIndex for HelixIndexer {
    async fn lookup_margin(
        &self,
        bridge: BridgeType,
        source_token: Address,
        source_chain: &str,
        target_chain: &str,
        relayer: Address,
    ) -> Result<Option<U256>, IndexError> {
        let endpoint = self
            .definition
            .indexer_endpoint(target_chain)
            .ok_or_else(|| IndexError::NoEndpoint {
                chain: target_chain.to_string(),
            })?;
        let masked = mask_url(endpoint);

        let body = json!({
            "operationName": "queryLnBridgeRelayInfos",
            "query": QUERY,
            "variables": {
                "page": 0,
                "row": PAGE_ROWS,
                "fromChain": source_chain,
                "toChain": target_chain,
                "relayer": lower_hex(relayer),
                "version": bridge.index_version(),
            }
        });

        debug!(
            endpoint = %masked,
            bridge = %bridge,
            from = source_chain,
            to = target_chain,
            "Querying bridge relay info"
        );

        let response = self
            .http
            .post(endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| IndexError::Http {
                endpoint: masked.clone(),
                source: e,
            })?;
        if !response.status().is_success() {
            return Err(IndexError::Status {
                endpoint: masked,
                status: response.status().as_u16(),
            });
        }

        let payload: Value = response.json().await.map_err(|e| IndexError::Http {
            endpoint: masked.clone(),
            source: e,
        })?;
        let records = records_from_response(&payload).map_err(|reason| IndexError::Malformed {
            endpoint: masked.clone(),
            reason,
        })?;

        find_margin(&records, bridge, source_token).map_err(|reason| IndexError::Malformed {
            endpoint: masked,
            reason,
        })
    }
}

/// Extract `data.queryLnBridgeRelayInfos.records` from a GraphQL response
pub fn records_from_response(payload: &Value) -> Result<Vec<RelayRecord>, String> {
    if let Some(errors) = payload.get("errors").filter(|e| !e.is_null()) {
        return Err(format!("graphql errors: {errors}"));
    }
    let records = payload
        .pointer("/data/queryLnBridgeRelayInfos/records")
        .ok_or_else(|| "missing data.queryLnBridgeRelayInfos.records".to_string())?;
    if records.is_null() {
        return Ok(Vec::new());
    }
    serde_json::from_value(records.clone()).map_err(|e| e.to_string())
}
