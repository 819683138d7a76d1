//! End-to-end registration flow against in-memory chain, index and Safe fakes
//!
//! Run with: cargo test -p registrar --test registration_flow

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use helix_chain::evm::{LnBridgeV3, LnDefaultBridge, LnOppositeBridge, ERC20};
use helix_chain::{
    ChainClient, ChainError, MultisigBackend, OutgoingCall, ProposalBatch, ProposalReceipt,
    SafeError, TxOutcome,
};
use serde_json::{json, Value};

use registrar::definition::{
    ApprovalExemption, BridgeContracts, ChainDefinition, Definition, IndexerDefinition,
    TokenDefinition, TokenKind,
};
use registrar::dispatch::{BackendFactory, SafeTarget};
use registrar::error::{IndexError, RegisterError};
use registrar::index::MarginIndex;
use registrar::intent::{BridgeType, RegistrationIntent};
use registrar::lock::LockStore;
use registrar::{Outcome, Registrar, RunSummary};

// ============================================================================
// Fakes
// ============================================================================

const ARB_RPC: &str = "http://arbitrum.test";
const LINEA_RPC: &str = "http://linea.test";
const CONTRACT: Address = Address::new([0xcc; 20]);
const USDT_ARB: Address = Address::new([0x11; 20]);
const USDT_LINEA: Address = Address::new([0x22; 20]);
const SAFE: Address = Address::new([0x5a; 20]);
const OPERATOR: Address = Address::new([0x0e; 20]);

fn pow10(n: u8) -> U256 {
    U256::from(10u8).pow(U256::from(n))
}

#[derive(Default)]
struct FakeChain {
    /// token -> decimals; a missing token makes `decimals()` fail
    decimals: HashMap<Address, u8>,
    sent: Mutex<Vec<(String, OutgoingCall)>>,
    fail_send_at: Option<usize>,
}

impl FakeChain {
    fn sent(&self) -> Vec<(String, OutgoingCall)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChainClient for FakeChain {
    async fn chain_id(&self, rpc_url: &str) -> Result<u64, ChainError> {
        match rpc_url {
            ARB_RPC => Ok(42161),
            LINEA_RPC => Ok(59144),
            other => Err(ChainError::Rpc {
                endpoint: other.to_string(),
                reason: "unknown endpoint".into(),
            }),
        }
    }

    async fn call(&self, _rpc_url: &str, to: Address, data: Bytes) -> Result<Bytes, ChainError> {
        assert_eq!(&data[..4], &ERC20::decimalsCall::SELECTOR);
        match self.decimals.get(&to) {
            Some(d) => Ok(Bytes::from(U256::from(*d).to_be_bytes::<32>().to_vec())),
            None => Err(ChainError::Rpc {
                endpoint: "fake".into(),
                reason: "execution reverted".into(),
            }),
        }
    }

    async fn send(&self, rpc_url: &str, call: &OutgoingCall) -> Result<TxOutcome, ChainError> {
        let mut sent = self.sent.lock().unwrap();
        if self.fail_send_at == Some(sent.len()) {
            return Err(ChainError::Reverted {
                tx_hash: "0xdead".into(),
            });
        }
        sent.push((rpc_url.to_string(), call.clone()));
        Ok(TxOutcome {
            tx_hash: B256::with_last_byte(sent.len() as u8),
            block_number: Some(sent.len() as u64),
        })
    }

    fn sender(&self) -> Address {
        OPERATOR
    }
}

#[derive(Default)]
struct FakeIndex {
    margin: Option<U256>,
    fail: bool,
    queries: AtomicUsize,
    last_relayer: Mutex<Option<Address>>,
}

#[async_trait]
impl MarginIndex for FakeIndex {
    async fn lookup_margin(
        &self,
        _bridge: BridgeType,
        _source_token: Address,
        _source_chain: &str,
        _target_chain: &str,
        relayer: Address,
    ) -> Result<Option<U256>, IndexError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        *self.last_relayer.lock().unwrap() = Some(relayer);
        if self.fail {
            return Err(IndexError::Status {
                endpoint: "http://index.test".into(),
                status: 502,
            });
        }
        Ok(self.margin)
    }
}

type Proposals = Arc<Mutex<Vec<(u64, ProposalBatch, u64)>>>;

struct FakeSafe {
    chain_id: u64,
    remote_nonce: u64,
    proposals: Proposals,
    reject_chain: Arc<Mutex<Option<u64>>>,
}

#[async_trait]
impl MultisigBackend for FakeSafe {
    async fn chain_id(&self) -> Result<u64, SafeError> {
        Ok(self.chain_id)
    }

    async fn nonce(&self) -> Result<u64, SafeError> {
        Ok(self.remote_nonce)
    }

    async fn propose(&self, batch: &ProposalBatch, nonce: u64) -> Result<ProposalReceipt, SafeError> {
        if *self.reject_chain.lock().unwrap() == Some(self.chain_id) {
            return Err(SafeError::Service {
                endpoint: "https://safe.test".into(),
                status: 503,
                body: "unavailable".into(),
            });
        }
        self.proposals
            .lock()
            .unwrap()
            .push((self.chain_id, batch.clone(), nonce));
        Ok(ProposalReceipt {
            chain_id: self.chain_id,
            safe_address: batch.safe_address,
            safe_tx_hash: B256::with_last_byte(nonce as u8),
            nonce,
        })
    }
}

#[derive(Default)]
struct FakeFactory {
    remote_nonce: u64,
    proposals: Proposals,
    connects: AtomicUsize,
    /// proposals on this chain id are refused by the service
    reject_chain: Arc<Mutex<Option<u64>>>,
}

#[async_trait]
impl BackendFactory for FakeFactory {
    async fn connect(&self, target: &SafeTarget) -> Result<Arc<dyn MultisigBackend>, RegisterError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FakeSafe {
            chain_id: target.chain_id,
            remote_nonce: self.remote_nonce,
            proposals: self.proposals.clone(),
            reject_chain: self.reject_chain.clone(),
        }))
    }
}

// ============================================================================
// Fixtures
// ============================================================================

fn definition() -> Definition {
    let chain = |rpc: &str, id: u64| ChainDefinition {
        id: Some(id),
        rpc: rpc.to_string(),
        native: Some("ETH".into()),
        contracts: BridgeContracts {
            lnv3: Some(CONTRACT),
            lnv2_default: Some(CONTRACT),
            lnv2_opposite: Some(CONTRACT),
        },
        multisend: None,
    };
    let token = |address: Address, decimals: Option<u8>| TokenDefinition {
        address,
        decimals,
        kind: TokenKind::Erc20,
    };

    let mut def = Definition::default();
    def.chains.insert("arbitrum".into(), chain(ARB_RPC, 42161));
    def.chains.insert("linea".into(), chain(LINEA_RPC, 59144));
    def.tokens.insert(
        "arbitrum".into(),
        HashMap::from([
            ("usdt".to_string(), token(USDT_ARB, Some(6))),
            (
                "eth".to_string(),
                TokenDefinition {
                    address: Address::ZERO,
                    decimals: Some(18),
                    kind: TokenKind::Native,
                },
            ),
        ]),
    );
    def.tokens.insert(
        "linea".into(),
        HashMap::from([("usdt".to_string(), token(USDT_LINEA, None))]),
    );
    def.indexer.insert(
        "mainnet".into(),
        IndexerDefinition {
            endpoint: "http://index.test".into(),
            chains: vec!["arbitrum".into(), "linea".into()],
        },
    );
    def
}

fn lnv3_entry() -> Value {
    json!({
        "type": "lnv3",
        "symbol": "usdt",
        "bridge": "arbitrum->linea",
        "source_token_address": USDT_ARB.to_string(),
        "target_token_address": USDT_LINEA.to_string(),
        "base_fee": "0.1",
        "liquidity_fee_rate": "0.001",
        "transfer_limit": "100000",
        "approve": "1000000",
        "deposit": "150"
    })
}

fn intent(entry: Value) -> RegistrationIntent {
    RegistrationIntent::from_value(entry).unwrap()
}

struct Harness {
    chain: Arc<FakeChain>,
    index: Arc<FakeIndex>,
    factory: Arc<FakeFactory>,
    locks: LockStore,
    registrar: Registrar,
    _dir: tempfile::TempDir,
}

fn harness_with(definition: Definition, chain: FakeChain, index: FakeIndex, factory: FakeFactory) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let chain = Arc::new(chain);
    let index = Arc::new(index);
    let factory = Arc::new(factory);
    let locks = LockStore::new(dir.path().join("lock"));
    let registrar = Registrar::new(
        Arc::new(definition),
        chain.clone(),
        index.clone(),
        factory.clone(),
        locks.clone(),
    );
    Harness {
        chain,
        index,
        factory,
        locks,
        registrar,
        _dir: dir,
    }
}

fn erc20_chain() -> FakeChain {
    FakeChain {
        decimals: HashMap::from([(USDT_ARB, 6), (USDT_LINEA, 18)]),
        ..Default::default()
    }
}

fn harness() -> Harness {
    harness_with(definition(), erc20_chain(), FakeIndex::default(), FakeFactory::default())
}

// ============================================================================
// Direct dispatch
// ============================================================================

#[tokio::test]
async fn test_lnv3_direct_registration() {
    let mut h = harness_with(
        definition(),
        erc20_chain(),
        FakeIndex {
            margin: Some(U256::from(100u64) * pow10(6)),
            ..Default::default()
        },
        FakeFactory::default(),
    );
    let intent = intent(lnv3_entry());

    let outcome = h.registrar.register(&intent).await.unwrap();
    assert!(matches!(outcome, Outcome::Registered(ref r) if r.len() == 3));

    let sent = h.chain.sent();
    assert!(sent.iter().all(|(rpc, _)| rpc == ARB_RPC));

    let approve = ERC20::approveCall::abi_decode(&sent[0].1.data, true).unwrap();
    assert_eq!(sent[0].1.to, USDT_ARB);
    assert_eq!(approve.spender, CONTRACT);
    assert_eq!(approve.amount, U256::from(1_000_000u64) * pow10(6));

    let register = LnBridgeV3::registerLnProviderCall::abi_decode(&sent[1].1.data, true).unwrap();
    assert_eq!(register.remoteChainId, U256::from(59144u64));
    assert_eq!(register.liquidityFeeRate, 1);

    // 150 declared, 100 already deposited
    let deposit = LnBridgeV3::depositPenaltyReserveCall::abi_decode(&sent[2].1.data, true).unwrap();
    assert_eq!(deposit.amount, U256::from(50u64) * pow10(6));
    assert_eq!(sent[2].1.value, U256::ZERO);

    assert_eq!(*h.index.last_relayer.lock().unwrap(), Some(OPERATOR));
    assert!(h.locks.path_for(&intent.identity_name()).exists());
}

#[tokio::test]
async fn test_unchanged_intent_dispatches_once() {
    let mut h = harness();
    let intent = intent(lnv3_entry());

    h.registrar.register(&intent).await.unwrap();
    let sends = h.chain.sent().len();
    let queries = h.index.queries.load(Ordering::SeqCst);

    let second = h.registrar.register(&intent).await.unwrap();
    assert_eq!(second, Outcome::Skipped);
    assert_eq!(h.chain.sent().len(), sends);
    // the lock is checked before any network access
    assert_eq!(h.index.queries.load(Ordering::SeqCst), queries);
}

#[tokio::test]
async fn test_changed_intent_registers_again() {
    let mut h = harness();
    h.registrar.register(&intent(lnv3_entry())).await.unwrap();

    let mut changed = lnv3_entry();
    changed["base_fee"] = json!("0.2");
    let outcome = h.registrar.register(&intent(changed)).await.unwrap();
    assert!(matches!(outcome, Outcome::Registered(_)));
}

#[tokio::test]
async fn test_send_failure_leaves_intent_unlocked() {
    let mut h = harness_with(
        definition(),
        FakeChain {
            fail_send_at: Some(1),
            ..erc20_chain()
        },
        FakeIndex::default(),
        FakeFactory::default(),
    );
    let intent = intent(lnv3_entry());

    let err = h.registrar.register(&intent).await.unwrap_err();
    assert!(matches!(err, RegisterError::Network(ChainError::Reverted { .. })));
    // the approval went out, nothing after it
    assert_eq!(h.chain.sent().len(), 1);
    assert!(!h.locks.path_for(&intent.identity_name()).exists());
}

#[tokio::test]
async fn test_dust_margin_sends_no_deposit() {
    let mut h = harness_with(
        definition(),
        erc20_chain(),
        FakeIndex {
            margin: Some(U256::from(150u64) * pow10(6) - U256::from(10u8)),
            ..Default::default()
        },
        FakeFactory::default(),
    );
    h.registrar.register(&intent(lnv3_entry())).await.unwrap();
    let selectors: Vec<[u8; 4]> = h
        .chain
        .sent()
        .iter()
        .map(|(_, c)| c.data[..4].try_into().unwrap())
        .collect();
    assert!(!selectors.contains(&LnBridgeV3::depositPenaltyReserveCall::SELECTOR));
    assert_eq!(selectors.len(), 2);
}

#[tokio::test]
async fn test_index_failure_aborts_intent() {
    let mut h = harness_with(
        definition(),
        erc20_chain(),
        FakeIndex {
            fail: true,
            ..Default::default()
        },
        FakeFactory::default(),
    );
    let err = h.registrar.register(&intent(lnv3_entry())).await.unwrap_err();
    assert!(matches!(err, RegisterError::IndexQueryFailed(_)));
    assert!(h.chain.sent().is_empty());
}

// ============================================================================
// Context resolution
// ============================================================================

#[tokio::test]
async fn test_decimals_fall_back_to_definition() {
    // USDT on arbitrum has no on-chain answer but a static 6
    let h = harness_with(
        definition(),
        FakeChain {
            decimals: HashMap::from([(USDT_LINEA, 6)]),
            ..Default::default()
        },
        FakeIndex::default(),
        FakeFactory::default(),
    );
    let prepared = h.registrar.prepare(&intent(lnv3_entry())).await.unwrap();
    assert_eq!(prepared.context.source_token.decimals, 6);
    assert_eq!(prepared.context.target_token.decimals, 6);
}

#[tokio::test]
async fn test_unresolved_decimals() {
    // linea USDT has no static decimals to fall back on
    let mut h = harness_with(
        definition(),
        FakeChain::default(),
        FakeIndex::default(),
        FakeFactory::default(),
    );
    let mut entry = lnv3_entry();
    entry["bridge"] = json!("linea->arbitrum");
    entry["source_token_address"] = json!(USDT_LINEA.to_string());
    entry["target_token_address"] = json!(USDT_ARB.to_string());

    let err = h.registrar.register(&intent(entry)).await.unwrap_err();
    assert!(matches!(err, RegisterError::UnresolvedToken { ref chain, .. } if chain == "linea"));
    assert!(h.chain.sent().is_empty());
    assert_eq!(h.index.queries.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unknown_chain() {
    let mut h = harness();
    let mut entry = lnv3_entry();
    entry["bridge"] = json!("arbitrum->moonbeam");
    let err = h.registrar.register(&intent(entry)).await.unwrap_err();
    assert!(matches!(err, RegisterError::UnresolvedChain { ref chain } if chain == "moonbeam"));
}

#[tokio::test]
async fn test_deny_listed_approval_is_skipped() {
    let mut def = definition();
    def.disable_approve.push(ApprovalExemption {
        symbol: "USDT".into(),
        chain_id: 42161,
    });
    let mut h = harness_with(def, erc20_chain(), FakeIndex::default(), FakeFactory::default());

    let mut entry = lnv3_entry();
    entry["type"] = json!("lnv2-opposite");
    h.registrar.register(&intent(entry)).await.unwrap();

    let sent = h.chain.sent();
    assert_eq!(sent.len(), 1);
    let call = LnOppositeBridge::updateProviderFeeAndMarginCall::abi_decode(&sent[0].1.data, true).unwrap();
    assert_eq!(call.margin.to::<u64>(), 150_000_000);
}

#[tokio::test]
async fn test_native_margin_attached_as_value() {
    let mut h = harness();
    let entry = json!({
        "type": "lnv2-opposite",
        "symbol": "eth",
        "bridge": "arbitrum->linea",
        "source_token_address": 0,
        "target_token_address": 0,
        "base_fee": "0.001",
        "liquidity_fee_rate": "0.0005",
        "approve": 0,
        "deposit": "0.5"
    });
    h.registrar.register(&intent(entry)).await.unwrap();

    let sent = h.chain.sent();
    assert_eq!(sent.len(), 1, "no approval for a native asset");
    assert_eq!(sent[0].1.value, U256::from(5u8) * pow10(17));
}

// ============================================================================
// Proposal dispatch
// ============================================================================

fn safe_fields(entry: &mut Value) {
    entry["safe_wallet_address"] = json!(SAFE.to_string());
    entry["source_safe_wallet_url"] = json!("https://safe-arbitrum.test");
    entry["target_safe_wallet_url"] = json!("https://safe-linea.test");
}

#[tokio::test]
async fn test_lnv2_default_proposes_per_chain() {
    let mut h = harness_with(
        definition(),
        erc20_chain(),
        FakeIndex::default(),
        FakeFactory {
            remote_nonce: 7,
            ..Default::default()
        },
    );
    let mut entry = lnv3_entry();
    entry["type"] = json!("lnv2-default");
    safe_fields(&mut entry);
    let intent = intent(entry);

    let outcome = h.registrar.register(&intent).await.unwrap();
    assert!(matches!(outcome, Outcome::Proposed(ref r) if r.len() == 2));
    assert!(h.chain.sent().is_empty());
    assert_eq!(*h.index.last_relayer.lock().unwrap(), Some(SAFE));

    let proposals = h.factory.proposals.lock().unwrap().clone();
    let (target_chain, target_batch, nonce) = &proposals[0];
    assert_eq!(*target_chain, 59144);
    assert_eq!(*nonce, 7);
    assert_eq!(target_batch.sender_address, OPERATOR);
    assert_eq!(target_batch.transactions.len(), 2);
    assert_eq!(&target_batch.transactions[0].data[..4], &ERC20::approveCall::SELECTOR);
    let margin =
        LnDefaultBridge::depositProviderMarginCall::abi_decode(&target_batch.transactions[1].data, true).unwrap();
    // margin uses the 18-decimal target token
    assert_eq!(margin.margin, U256::from(150u64) * pow10(18));
    assert_eq!(margin.remoteChainId, U256::from(42161u64));

    let (source_chain, source_batch, _) = &proposals[1];
    assert_eq!(*source_chain, 42161);
    assert_eq!(source_batch.transactions.len(), 1);
    let fee = LnDefaultBridge::setProviderFeeCall::abi_decode(&source_batch.transactions[0].data, true).unwrap();
    assert_eq!(fee.baseFee.to::<u64>(), 100_000);
}

#[tokio::test]
async fn test_nonce_cache_survives_stale_remote() {
    // the remote keeps reporting 3 while proposals pile up
    let mut h = harness_with(
        definition(),
        erc20_chain(),
        FakeIndex::default(),
        FakeFactory {
            remote_nonce: 3,
            ..Default::default()
        },
    );

    let mut summary = RunSummary::default();
    let intents: Vec<_> = ["usdt", "usdc", "dai"]
        .iter()
        .map(|symbol| {
            let mut entry = lnv3_entry();
            entry["symbol"] = json!(symbol);
            safe_fields(&mut entry);
            intent(entry)
        })
        .collect();
    h.registrar.run_group("mainnet", &intents, &mut summary).await;

    assert!(summary.is_success(), "{:?}", summary.failed);
    assert_eq!(summary.proposed, 3);
    let nonces: Vec<u64> = h
        .factory
        .proposals
        .lock()
        .unwrap()
        .iter()
        .map(|(_, _, n)| *n)
        .collect();
    assert_eq!(nonces, vec![3, 4, 5]);
    assert_eq!(h.registrar.proposals().nonces.cached(42161, SAFE), Some(6));
    // one backend per (chain, safe)
    assert_eq!(h.factory.connects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_rejected_proposal_keeps_nonce_and_lock() {
    let mut h = harness_with(
        definition(),
        erc20_chain(),
        FakeIndex::default(),
        FakeFactory {
            remote_nonce: 7,
            reject_chain: Arc::new(Mutex::new(Some(42161))),
            ..Default::default()
        },
    );
    let mut entry = lnv3_entry();
    entry["type"] = json!("lnv2-default");
    safe_fields(&mut entry);
    let intent = intent(entry);

    // target batch goes through, source batch is refused
    let err = h.registrar.register(&intent).await.unwrap_err();
    assert!(matches!(err, RegisterError::Proposal(SafeError::Service { status: 503, .. })));
    assert_eq!(h.registrar.proposals().nonces.cached(59144, SAFE), Some(8));
    assert_eq!(h.registrar.proposals().nonces.cached(42161, SAFE), None);
    assert!(!h.locks.path_for(&intent.identity_name()).exists());
    assert_eq!(h.factory.proposals.lock().unwrap().len(), 1);

    // the service recovers; the next run proposes the whole intent again
    *h.factory.reject_chain.lock().unwrap() = None;
    let outcome = h.registrar.register(&intent).await.unwrap();
    assert!(matches!(outcome, Outcome::Proposed(ref r) if r.len() == 2));

    let nonces: Vec<(u64, u64)> = h
        .factory
        .proposals
        .lock()
        .unwrap()
        .iter()
        .map(|(chain, _, n)| (*chain, *n))
        .collect();
    assert_eq!(nonces, vec![(59144, 7), (59144, 8), (42161, 7)]);
    assert_eq!(h.registrar.proposals().nonces.cached(42161, SAFE), Some(8));
    assert!(h.locks.path_for(&intent.identity_name()).exists());
}

#[tokio::test]
async fn test_incomplete_safe_config_fails_before_proposing() {
    let mut h = harness();
    let mut entry = lnv3_entry();
    entry["type"] = json!("lnv2-default");
    entry["safe_wallet_address"] = json!(SAFE.to_string());
    entry["source_safe_wallet_url"] = json!("https://safe-arbitrum.test");

    let err = h.registrar.register(&intent(entry)).await.unwrap_err();
    assert!(matches!(err, RegisterError::Configuration(_)));
    assert!(h.factory.proposals.lock().unwrap().is_empty());
    assert!(h.chain.sent().is_empty());
}

// ============================================================================
// Run summary
// ============================================================================

#[tokio::test]
async fn test_run_group_records_each_outcome() {
    let mut h = harness();
    let good = intent(lnv3_entry());
    let mut bad_entry = lnv3_entry();
    bad_entry["symbol"] = json!("usdc");
    bad_entry["bridge"] = json!("arbitrum->nowhere");
    let bad = intent(bad_entry);

    let mut summary = RunSummary::default();
    h.registrar
        .run_group("mainnet", &[good.clone(), bad, good], &mut summary)
        .await;

    assert_eq!(summary.registered, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].0, "lnv3__usdc__arbitrum_nowhere");
    assert!(!summary.is_success());
    assert_eq!(
        summary.to_string(),
        "registered: 1, proposed: 0, skipped: 1, failed: 1"
    );
}
