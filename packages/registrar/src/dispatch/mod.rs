//! Call plan dispatch
//!
//! A plan is either sent directly with the operator key (`direct`) or turned
//! into one Safe proposal per chain (`proposal`). The mode follows the intent:
//! any Safe address selects proposals.
//!
//! The proposal path keeps two pieces of run-scoped state, both owned by
//! `ProposalSession` and passed in explicitly: the per-Safe nonce cache and
//! the connected Safe backends. Intents run sequentially, so neither needs a
//! lock.

mod direct;
mod proposal;

pub use direct::{dispatch_direct, DirectReceipt};
pub use proposal::{dispatch_proposal, SafeServiceFactory};

use std::collections::HashMap;
use std::sync::Arc;

use alloy::primitives::Address;
use async_trait::async_trait;
use helix_chain::MultisigBackend;

use crate::error::RegisterError;

/// How an intent's plan is submitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    Direct,
    Proposal,
}

/// Process-local next nonce per Safe, keyed by (chain id, Safe address)
#[derive(Debug, Default)]
pub struct NonceCache {
    next: HashMap<(u64, Address), u64>,
}

impl NonceCache {
    /// Nonce to propose with: never below the remote value, never reusing one
    /// this run already consumed
    pub fn reserve(&self, chain_id: u64, safe: Address, remote: u64) -> u64 {
        match self.next.get(&(chain_id, safe)) {
            Some(&cached) => cached.max(remote),
            None => remote,
        }
    }

    /// Record a successful proposal at `used`
    pub fn advance(&mut self, chain_id: u64, safe: Address, used: u64) {
        self.next.insert((chain_id, safe), used + 1);
    }

    pub fn cached(&self, chain_id: u64, safe: Address) -> Option<u64> {
        self.next.get(&(chain_id, safe)).copied()
    }
}

/// Where a Safe lives and how to reach its transaction service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeTarget {
    pub chain_code: String,
    pub chain_id: u64,
    pub rpc_url: String,
    pub service_url: String,
    pub safe: Address,
    pub multisend: Option<Address>,
}

/// Connects multisig backends
#[async_trait]
pub trait BackendFactory: Send + Sync {
    async fn connect(&self, target: &SafeTarget) -> Result<Arc<dyn MultisigBackend>, RegisterError>;
}

/// Run-scoped proposal state
pub struct ProposalSession {
    factory: Arc<dyn BackendFactory>,
    backends: HashMap<(String, Address), Arc<dyn MultisigBackend>>,
    pub nonces: NonceCache,
}

impl ProposalSession {
    pub fn new(factory: Arc<dyn BackendFactory>) -> Self {
        Self {
            factory,
            backends: HashMap::new(),
            nonces: NonceCache::default(),
        }
    }

    /// Backend for `target`, connecting on first use
    pub async fn backend(
        &mut self,
        target: &SafeTarget,
    ) -> Result<Arc<dyn MultisigBackend>, RegisterError> {
        let key = (target.chain_code.clone(), target.safe);
        if let Some(backend) = self.backends.get(&key) {
            return Ok(backend.clone());
        }
        let backend = self.factory.connect(target).await?;
        self.backends.insert(key, backend.clone());
        Ok(backend)
    }
}
