//! Registration pipeline
//!
//! For every intent, strictly one after another:
//!
//! 1. hash the intent and consult the lock; an unchanged intent stops here
//! 2. resolve the chain context (chain ids, decimals, relayer)
//! 3. read the already deposited margin from the bridge info index
//! 4. plan the calls for the bridge variant
//! 5. dispatch directly or as Safe proposals
//! 6. write the lock
//!
//! Any failure leaves the lock untouched so the next run starts over.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use alloy::primitives::U256;
use helix_chain::{ChainClient, ProposalReceipt};
use tracing::{error, info, warn};

use crate::context::{resolve_context, ChainContext};
use crate::definition::Definition;
use crate::dispatch::{
    dispatch_direct, dispatch_proposal, BackendFactory, DirectReceipt, DispatchMode,
    ProposalSession,
};
use crate::error::RegisterError;
use crate::index::MarginIndex;
use crate::intent::{load_group, RegistrationIntent};
use crate::lock::{hash_intent, LockStore};
use crate::planner::{planner_for, CallPlan, MarginAdjustment};

/// Result of one successful registration attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Lock hit, nothing sent
    Skipped,
    Registered(Vec<DirectReceipt>),
    Proposed(Vec<ProposalReceipt>),
}

/// Everything known about an intent before dispatch
#[derive(Debug, Clone)]
pub struct PreparedPlan {
    pub context: ChainContext,
    pub existing_margin: U256,
    pub plan: CallPlan,
}

/// Counts over a whole run
#[derive(Debug, Default)]
pub struct RunSummary {
    pub registered: usize,
    pub proposed: usize,
    pub skipped: usize,
    pub failed: Vec<(String, String)>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    fn record(&mut self, name: String, result: &Result<Outcome, RegisterError>) {
        match result {
            Ok(Outcome::Skipped) => self.skipped += 1,
            Ok(Outcome::Registered(_)) => self.registered += 1,
            Ok(Outcome::Proposed(_)) => self.proposed += 1,
            Err(e) => self.failed.push((name, e.to_string())),
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "registered: {}, proposed: {}, skipped: {}, failed: {}",
            self.registered,
            self.proposed,
            self.skipped,
            self.failed.len()
        )
    }
}

/// Dispatch mode selected by the intent's Safe addressing
pub fn dispatch_mode(intent: &RegistrationIntent) -> DispatchMode {
    if intent.safe.is_configured() {
        DispatchMode::Proposal
    } else {
        DispatchMode::Direct
    }
}

/// Load every requested group before anything is registered
pub fn load_groups(
    datadir: &Path,
    groups: &[String],
) -> Result<Vec<(String, Vec<RegistrationIntent>)>, RegisterError> {
    groups
        .iter()
        .map(|group| load_group(datadir, group).map(|intents| (group.clone(), intents)))
        .collect()
}

/// Orchestrates registrations for one run
pub struct Registrar {
    definition: Arc<Definition>,
    chain: Arc<dyn ChainClient>,
    index: Arc<dyn MarginIndex>,
    locks: LockStore,
    proposals: ProposalSession,
}

impl Registrar {
    pub fn new(
        definition: Arc<Definition>,
        chain: Arc<dyn ChainClient>,
        index: Arc<dyn MarginIndex>,
        backends: Arc<dyn BackendFactory>,
        locks: LockStore,
    ) -> Self {
        Self {
            definition,
            chain,
            index,
            locks,
            proposals: ProposalSession::new(backends),
        }
    }

    pub fn proposals(&self) -> &ProposalSession {
        &self.proposals
    }

    /// Resolve, query and plan without sending anything
    pub async fn prepare(&self, intent: &RegistrationIntent) -> Result<PreparedPlan, RegisterError> {
        let context = resolve_context(intent, &self.definition, self.chain.as_ref()).await?;

        let existing_margin = self
            .index
            .lookup_margin(
                intent.bridge_type,
                context.source_token.address,
                &context.source_chain.code,
                &context.target_chain.code,
                context.relayer_address,
            )
            .await?
            .unwrap_or(U256::ZERO);

        let plan = planner_for(intent.bridge_type).plan(intent, &context, existing_margin)?;
        if let MarginAdjustment::WithdrawUnsupported { excess } = plan.margin {
            warn!(
                bridge = %intent.identity_name(),
                excess = %excess,
                "Declared deposit is below the deposited margin; no withdrawal planned"
            );
        }

        Ok(PreparedPlan {
            context,
            existing_margin,
            plan,
        })
    }

    /// Register one intent
    pub async fn register(&mut self, intent: &RegistrationIntent) -> Result<Outcome, RegisterError> {
        let name = intent.identity_name();
        let hash = hash_intent(intent);
        if self.locks.check(&name, &hash)? {
            info!(bridge = %name, "The bridge already registered, skipped");
            return Ok(Outcome::Skipped);
        }

        let prepared = self.prepare(intent).await?;
        let outcome = match dispatch_mode(intent) {
            DispatchMode::Direct => Outcome::Registered(
                dispatch_direct(&prepared.plan, &prepared.context, self.chain.as_ref()).await?,
            ),
            DispatchMode::Proposal => Outcome::Proposed(
                dispatch_proposal(
                    &prepared.plan,
                    &prepared.context,
                    &intent.safe,
                    self.chain.sender(),
                    &mut self.proposals,
                )
                .await?,
            ),
        };

        self.locks.commit(&name, &hash, intent.to_payload())?;
        match &outcome {
            Outcome::Proposed(_) => info!(bridge = %name, "The bridge proposed"),
            _ => info!(bridge = %name, "The bridge registered"),
        }
        Ok(outcome)
    }

    /// Register a group's intents in order, recording each result
    pub async fn run_group(
        &mut self,
        group: &str,
        intents: &[RegistrationIntent],
        summary: &mut RunSummary,
    ) {
        info!(group = group, count = intents.len(), "Registering group");
        for intent in intents {
            let name = intent.identity_name();
            info!(
                "==> start register [{}] [{}] {}",
                intent.bridge_type, intent.symbol, intent.direction
            );
            let result = self.register(intent).await;
            if let Err(e) = &result {
                error!(bridge = %name, error = %e, "Registration failed");
            }
            summary.record(name, &result);
        }
    }
}
