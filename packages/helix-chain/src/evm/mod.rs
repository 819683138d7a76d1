//! EVM Chain Support Module
//!
//! ## Submodules
//!
//! - `client` - `ChainClient` capability and its alloy JSON-RPC implementation
//! - `contracts` - LnBridge / ERC20 / Safe bindings using alloy sol! macro
//! - `signer` - Local private-key signer
//! - `tokens` - ERC20 read helpers

pub mod client;
pub mod contracts;
pub mod signer;
pub mod tokens;

pub use client::{ChainClient, EvmRpcClient, OutgoingCall, TxOutcome};
pub use contracts::{LnDefaultBridge, LnOppositeBridge, LnBridgeV3, ERC20};
pub use signer::{address_from_key, EvmSigner};
pub use tokens::token_decimals;
