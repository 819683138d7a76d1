//! Helix Relayer Registrar - Library interface
//!
//! Registers LnBridge relayer parameters (fees, margin, transfer limits,
//! approvals) from declarative YAML groups. Every bridge leg is planned against
//! live chain and indexer state, submitted directly or as Safe proposals, and
//! locked by content hash so unchanged legs are skipped on the next run.
//!
//! Re-exports internal modules for use in integration tests.

pub mod amount;
pub mod config;
pub mod context;
pub mod de;
pub mod definition;
pub mod dispatch;
pub mod error;
pub mod index;
pub mod intent;
pub mod lock;
pub mod pipeline;
pub mod planner;

pub use config::Config;
pub use definition::Definition;
pub use error::{AmountError, IndexError, RegisterError};
pub use intent::{BridgeType, RegistrationIntent};
pub use pipeline::{Outcome, Registrar, RunSummary};
