//! EVM Signing Module
//!
//! Wraps alloy's `PrivateKeySigner`. The same key signs direct transactions
//! (through `EthereumWallet`) and Safe transaction hashes (raw ECDSA over the
//! EIP-712 digest).

use alloy::{
    network::EthereumWallet,
    primitives::{Address, Bytes, B256},
    signers::{local::PrivateKeySigner, SignerSync},
};

use crate::error::ChainError;

/// Local private-key signer
#[derive(Clone)]
pub struct EvmSigner {
    signer: PrivateKeySigner,
    address: Address,
}

impl std::fmt::Debug for EvmSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvmSigner")
            .field("address", &self.address)
            .field("key", &"<redacted>")
            .finish()
    }
}

impl EvmSigner {
    /// Parse a hex private key (with or without 0x prefix)
    pub fn from_private_key(private_key: &str) -> Result<Self, ChainError> {
        let signer = private_key
            .trim()
            .parse::<PrivateKeySigner>()
            .map_err(|e| ChainError::InvalidKey {
                reason: e.to_string(),
            })?;
        let address = signer.address();
        Ok(Self { signer, address })
    }

    /// Get the signer's address
    pub fn address(&self) -> Address {
        self.address
    }

    /// Wallet for alloy providers
    pub fn wallet(&self) -> EthereumWallet {
        EthereumWallet::from(self.signer.clone())
    }

    /// Sign a 32-byte digest, returning `r || s || v` with `v` in {27, 28}
    pub fn sign_hash(&self, hash: &B256) -> Result<Bytes, ChainError> {
        let signature = self
            .signer
            .sign_hash_sync(hash)
            .map_err(|e| ChainError::InvalidKey {
                reason: e.to_string(),
            })?;
        Ok(Bytes::from(signature.as_bytes().to_vec()))
    }
}

/// Derive the address controlled by a private key
pub fn address_from_key(private_key: &str) -> Result<Address, ChainError> {
    EvmSigner::from_private_key(private_key).map(|s| s.address())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    const ANVIL_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_address_from_key() {
        assert_eq!(
            address_from_key(ANVIL_KEY).unwrap(),
            address!("f39fd6e51aad88f6f4ce6ab8827279cfffb92266")
        );
        // prefix is optional
        assert_eq!(
            address_from_key(ANVIL_KEY.trim_start_matches("0x")).unwrap(),
            address!("f39fd6e51aad88f6f4ce6ab8827279cfffb92266")
        );
    }

    #[test]
    fn test_invalid_key() {
        assert!(matches!(
            EvmSigner::from_private_key("0x1234"),
            Err(ChainError::InvalidKey { .. })
        ));
    }

    #[test]
    fn test_sign_hash_electrum_v() {
        let signer = EvmSigner::from_private_key(ANVIL_KEY).unwrap();
        let sig = signer.sign_hash(&B256::repeat_byte(0x11)).unwrap();
        assert_eq!(sig.len(), 65);
        assert!(sig[64] == 27 || sig[64] == 28);
    }

    #[test]
    fn test_debug_hides_key() {
        let signer = EvmSigner::from_private_key(ANVIL_KEY).unwrap();
        let rendered = format!("{:?}", signer);
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("ac0974bec39a17e3"));
    }
}
