//! Contract ABI definitions for relayer registration
//!
//! Uses alloy's sol! macro to generate typed call structs. Calls are encoded
//! locally and either sent directly or wrapped into Safe proposals, so no
//! `#[sol(rpc)]` instances are generated.
//!
//! ## Bridge protocols
//! - `LnBridgeV3` - lnv3: provider registration and penalty reserve on the source chain
//! - `LnDefaultBridge` - lnv2-default: fee on the source chain, margin on the target chain
//! - `LnOppositeBridge` - lnv2-opposite: fee and margin in a single source-chain call

#![allow(clippy::too_many_arguments)]

use alloy::sol;

sol! {
    /// Minimal ERC20 surface used during registration
    #[derive(Debug, PartialEq, Eq)]
    contract ERC20 {
        function decimals() external view returns (uint8);
        function approve(address spender, uint256 amount) external returns (bool);
    }

    /// LnBridge v3 (lnv3)
    #[derive(Debug, PartialEq, Eq)]
    contract LnBridgeV3 {
        /// Register or update the provider's fee schedule for a token pair
        function registerLnProvider(
            uint256 remoteChainId,
            address sourceToken,
            address targetToken,
            uint112 baseFee,
            uint16 liquidityFeeRate,
            uint112 transferLimit
        ) external;

        /// Top up the penalty reserve backing the provider
        function depositPenaltyReserve(address sourceToken, uint256 amount) external payable;
    }

    /// LnBridge v2 default direction (lnv2-default)
    #[derive(Debug, PartialEq, Eq)]
    contract LnDefaultBridge {
        /// Source chain: set provider fee
        function setProviderFee(
            uint256 remoteChainId,
            address sourceToken,
            address targetToken,
            uint112 baseFee,
            uint8 liquidityFeeRate
        ) external;

        /// Target chain: deposit provider margin
        function depositProviderMargin(
            uint256 remoteChainId,
            address sourceToken,
            address targetToken,
            uint256 margin
        ) external payable;
    }

    /// LnBridge v2 opposite direction (lnv2-opposite)
    #[derive(Debug, PartialEq, Eq)]
    contract LnOppositeBridge {
        /// Source chain: set fee and add margin in one call
        function updateProviderFeeAndMargin(
            uint256 remoteChainId,
            address sourceToken,
            address targetToken,
            uint112 margin,
            uint112 baseFee,
            uint16 liquidityFeeRate
        ) external payable;
    }

    /// Safe (>= 1.3.0) read surface
    #[derive(Debug, PartialEq, Eq)]
    contract GnosisSafe {
        function nonce() external view returns (uint256);
    }

    /// MultiSendCallOnly, used to batch several calls into one Safe transaction
    #[derive(Debug, PartialEq, Eq)]
    contract MultiSendCallOnly {
        function multiSend(bytes memory transactions) external payable;
    }

    /// EIP-712 Safe transaction payload
    #[derive(Debug, PartialEq, Eq)]
    struct SafeTx {
        address to;
        uint256 value;
        bytes data;
        uint8 operation;
        uint256 safeTxGas;
        uint256 baseGas;
        uint256 gasPrice;
        address gasToken;
        address refundReceiver;
        uint256 nonce;
    }
}
