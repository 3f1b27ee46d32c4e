//! Ed25519 keypairs in the ledger's StrKey encoding.
//!
//! Addresses are `G...` strings and secret seeds are `S...` strings. The signing
//! key is zeroized when the keypair is dropped.

use crate::domain::envelope::DecoratedSignature;
use crate::error::{Result, SignerError};
use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;
use std::fmt;
use stellar_strkey::ed25519::{PrivateKey, PublicKey};
use zeroize::{Zeroize, Zeroizing};

/// Length of the signature hint (last bytes of the public key).
pub const HINT_LEN: usize = 4;

#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
    address: String,
}

impl Keypair {
    /// Generates a keypair from the OS random number generator.
    pub fn random() -> Self {
        Self::from_signing_key(SigningKey::generate(&mut OsRng))
    }

    /// Parses an `S...` secret seed.
    pub fn from_seed(seed: &str) -> Result<Self> {
        let mut raw = PrivateKey::from_string(seed)
            .map_err(|_| SignerError::Validation("secret seed is not a valid Ed25519 secret".into()))?
            .0;
        let signing_key = SigningKey::from_bytes(&raw);
        raw.zeroize();
        Ok(Self::from_signing_key(signing_key))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let address = PublicKey(signing_key.verifying_key().to_bytes()).to_string();
        Self {
            signing_key,
            address,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn seed(&self) -> Zeroizing<String> {
        let mut raw = self.signing_key.to_bytes();
        let seed = Zeroizing::new(PrivateKey(raw).to_string());
        raw.zeroize();
        seed
    }

    pub fn hint(&self) -> [u8; HINT_LEN] {
        let public = self.signing_key.verifying_key().to_bytes();
        let mut hint = [0u8; HINT_LEN];
        hint.copy_from_slice(&public[public.len() - HINT_LEN..]);
        hint
    }

    pub fn sign_decorated(&self, message: &[u8]) -> DecoratedSignature {
        DecoratedSignature {
            hint: self.hint(),
            signature: self.signing_key.sign(message).to_bytes().to_vec(),
        }
    }

    /// Checks `signature` against `message` using this keypair's public key.
    pub fn verify(&self, message: &[u8], signature: &DecoratedSignature) -> bool {
        let Ok(bytes) = <[u8; 64]>::try_from(signature.signature.as_slice()) else {
            return false;
        };
        let signature = ed25519_dalek::Signature::from_bytes(&bytes);
        self.signing_key
            .verifying_key()
            .verify_strict(message, &signature)
            .is_ok()
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

pub fn is_valid_secret_seed(seed: &str) -> bool {
    PrivateKey::from_string(seed).is_ok()
}

pub fn is_valid_public_key(address: &str) -> bool {
    PublicKey::from_string(address).is_ok()
}
