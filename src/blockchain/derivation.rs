//! Deterministic account derivation from external identities.
//!
//! An identity (e.g. a chat user id) is mapped to a secp256k1 key with
//! HMAC-SHA256 keyed by a process-wide secret. The same secret and identity
//! always produce the same account, across restarts, so no per-user key is
//! ever stored.

use alloy::primitives::{uint, Address, B256, U256};
use alloy::signers::local::PrivateKeySigner;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::blockchain::wallet::Wallet;
use crate::error::{RelayError, RelayResult};

/// Environment variable holding the derivation secret.
pub const DERIVATION_SECRET_ENV_VAR: &str = "POLL_RELAY_DERIVATION_SECRET";

/// Order of the secp256k1 group.
const SECP256K1_ORDER: U256 =
    uint!(0xFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFEBAAEDCE6AF48A03BBFD25E8CD0364141_U256);

type HmacSha256 = Hmac<Sha256>;

/// The HMAC key all accounts are derived from. Wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivationSecret(Vec<u8>);

impl DerivationSecret {
    /// Wrap raw secret bytes. An empty secret is a configuration error.
    pub fn new(secret: impl Into<Vec<u8>>) -> RelayResult<Self> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(RelayError::Config(
                "derivation secret must not be empty".to_string(),
            ));
        }
        Ok(Self(secret))
    }

    /// Load the secret from `POLL_RELAY_DERIVATION_SECRET`.
    ///
    /// The variable's UTF-8 bytes are the key as-is; a hex string is not
    /// decoded.
    pub fn from_env() -> RelayResult<Self> {
        let secret = std::env::var(DERIVATION_SECRET_ENV_VAR).map_err(|_| {
            RelayError::Config(format!(
                "Environment variable {} not set",
                DERIVATION_SECRET_ENV_VAR
            ))
        })?;
        Self::new(secret.into_bytes())
    }
}

impl std::fmt::Debug for DerivationSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DerivationSecret(<redacted>)")
    }
}

/// A keypair derived from an identity. Lives for one operation only.
#[derive(Clone)]
pub struct DerivedAccount {
    signer: PrivateKeySigner,
}

impl DerivedAccount {
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Turn the account into a signing wallet for `chain_id`.
    pub fn into_wallet(self, chain_id: u64) -> Wallet {
        Wallet::from_signer(self.signer, chain_id)
    }
}

impl PartialEq for DerivedAccount {
    fn eq(&self, other: &Self) -> bool {
        self.address() == other.address()
    }
}

impl Eq for DerivedAccount {}

impl std::fmt::Debug for DerivedAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedAccount")
            .field("address", &self.address())
            .finish()
    }
}

/// Compute the private scalar for an identity.
fn derive_scalar(secret: &DerivationSecret, identity: &str) -> RelayResult<B256> {
    if identity.is_empty() {
        return Err(RelayError::InvalidIdentity);
    }

    let mut mac =
        HmacSha256::new_from_slice(&secret.0).map_err(|_| RelayError::DerivationFailed)?;
    mac.update(identity.as_bytes());
    let digest = mac.finalize().into_bytes();

    let scalar = U256::from_be_slice(&digest).reduce_mod(SECP256K1_ORDER);
    if scalar.is_zero() {
        return Err(RelayError::DerivationFailed);
    }
    Ok(B256::from(scalar.to_be_bytes::<32>()))
}

/// Derive the signing account for `identity`.
pub fn derive(secret: &DerivationSecret, identity: &str) -> RelayResult<DerivedAccount> {
    let key = derive_scalar(secret, identity)?;
    let signer = PrivateKeySigner::from_bytes(&key).map_err(|_| RelayError::DerivationFailed)?;
    Ok(DerivedAccount { signer })
}
