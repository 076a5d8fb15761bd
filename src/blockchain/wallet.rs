//! Signing accounts and transaction signing.
//!
//! # Security
//! - The controller key is loaded ONLY from an environment variable
//! - Keys are never logged or serialized; `Debug` shows the address only

use alloy::eips::eip2718::Encodable2718;
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, Bytes, TxHash};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;

use crate::error::{RelayError, RelayResult};

/// Environment variable holding the controller's private key.
pub const CONTROLLER_KEY_ENV_VAR: &str = "POLL_RELAY_CONTROLLER_KEY";

/// A signed transaction ready for broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    /// Hash of the signed payload; identifies this attempt.
    pub hash: TxHash,
    /// EIP-2718 encoded bytes.
    pub raw: Bytes,
}

/// A keypair able to sign transactions for one chain.
#[derive(Clone)]
pub struct Wallet {
    signer: PrivateKeySigner,
    wallet: EthereumWallet,
    /// Chain ID for EIP-155 replay protection.
    chain_id: u64,
}

impl Wallet {
    /// Create a wallet from a hex-encoded private key string.
    ///
    /// # Arguments
    /// * `private_key_hex` - Hex string (with or without 0x prefix)
    /// * `chain_id` - Chain ID for transaction signing
    pub fn from_private_key(private_key_hex: &str, chain_id: u64) -> RelayResult<Self> {
        let key_hex = private_key_hex
            .trim()
            .strip_prefix("0x")
            .unwrap_or(private_key_hex.trim());

        let signer: PrivateKeySigner = key_hex
            .parse()
            .map_err(|e| RelayError::Wallet(format!("Invalid private key format: {}", e)))?;

        tracing::info!(
            address = %signer.address(),
            chain_id = chain_id,
            "Wallet initialized"
        );

        Ok(Self::from_signer(signer, chain_id))
    }

    /// Load the controller wallet from `POLL_RELAY_CONTROLLER_KEY`.
    pub fn from_env(chain_id: u64) -> RelayResult<Self> {
        let private_key = std::env::var(CONTROLLER_KEY_ENV_VAR).map_err(|_| {
            RelayError::Config(format!(
                "Environment variable {} not set",
                CONTROLLER_KEY_ENV_VAR
            ))
        })?;

        Self::from_private_key(&private_key, chain_id)
    }

    pub(crate) fn from_signer(signer: PrivateKeySigner, chain_id: u64) -> Self {
        let wallet = EthereumWallet::from(signer.clone());
        Self {
            signer,
            wallet,
            chain_id,
        }
    }

    /// Get the wallet's address.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Get the chain ID this wallet is configured for.
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Sign a fully specified transaction request.
    ///
    /// Sender and chain ID are filled in from the wallet; nonce, gas and
    /// fee fields must already be set.
    pub async fn sign_transaction(&self, tx: TransactionRequest) -> RelayResult<SignedTransaction> {
        let tx = tx.with_from(self.address()).with_chain_id(self.chain_id);
        let envelope = tx
            .build(&self.wallet)
            .await
            .map_err(|e| RelayError::Wallet(format!("Signing failed: {}", e)))?;

        Ok(SignedTransaction {
            hash: *envelope.tx_hash(),
            raw: envelope.encoded_2718().into(),
        })
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address())
            .field("chain_id", &self.chain_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::consensus::transaction::SignerRecoverable;
    use alloy::consensus::{Transaction, TxEnvelope};
    use alloy::eips::eip2718::Decodable2718;
    use alloy::primitives::U256;

    // Well-known test private key (Anvil's first account)
    const TEST_PRIVATE_KEY: &str =
        "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_wallet_from_private_key() {
        let wallet = Wallet::from_private_key(TEST_PRIVATE_KEY, 1).unwrap();
        assert_eq!(
            wallet.address().to_string().to_lowercase(),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
    }

    #[test]
    fn test_wallet_with_0x_prefix() {
        let wallet = Wallet::from_private_key(&format!("0x{}", TEST_PRIVATE_KEY), 1).unwrap();
        assert_eq!(
            wallet.address().to_string().to_lowercase(),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
    }

    #[test]
    fn test_invalid_private_key() {
        let result = Wallet::from_private_key("invalid_key", 1);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Invalid private key"));
    }

    #[test]
    fn test_debug_hides_key() {
        let wallet = Wallet::from_private_key(TEST_PRIVATE_KEY, 1).unwrap();
        let text = format!("{:?}", wallet);
        assert!(!text.contains(TEST_PRIVATE_KEY));
        assert!(text.to_lowercase().contains("f39fd6e51aad88f6f4ce6ab8827279cfffb92266"));
    }

    #[tokio::test]
    async fn test_sign_eip1559_transaction() {
        let wallet = Wallet::from_private_key(TEST_PRIVATE_KEY, 31337).unwrap();
        let tx = TransactionRequest::default()
            .with_to(Address::repeat_byte(0x11))
            .with_value(U256::from(1_000))
            .with_nonce(4)
            .with_gas_limit(21_000)
            .with_max_fee_per_gas(3_000_000_000)
            .with_max_priority_fee_per_gas(1_500_000_000);

        let signed = wallet.sign_transaction(tx).await.unwrap();
        let envelope = TxEnvelope::decode_2718_exact(&signed.raw).unwrap();

        assert_eq!(*envelope.tx_hash(), signed.hash);
        assert_eq!(envelope.nonce(), 4);
        assert_eq!(envelope.chain_id(), Some(31337));
        assert_eq!(envelope.max_priority_fee_per_gas(), Some(1_500_000_000));
        assert_eq!(envelope.recover_signer().unwrap(), wallet.address());
    }
}
