//! Opaque ledger transaction envelopes.
//!
//! The signing engine never builds or inspects transaction contents. It only hashes
//! the envelope bytes together with the network identity and appends signatures.

use crate::domain::keypair::{HINT_LEN, Keypair};
use crate::error::{Result, SignerError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

const ENVELOPE_TYPE_TX: u32 = 2;
const ENVELOPE_TYPE_TX_FEE_BUMP: u32 = 5;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct DecoratedSignature {
    pub hint: [u8; HINT_LEN],
    pub signature: Vec<u8>,
}

/// Hash of the network passphrase, mixed into every signature payload.
pub fn network_id(network_passphrase: &str) -> [u8; 32] {
    Sha256::digest(network_passphrase.as_bytes()).into()
}

fn signature_base(network_passphrase: &str, envelope_type: u32, envelope: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(network_id(network_passphrase));
    hasher.update(envelope_type.to_be_bytes());
    hasher.update(envelope);
    hasher.finalize().into()
}

fn signed_copy(
    network_passphrase: &str,
    envelope_type: u32,
    envelope: &[u8],
    signatures: &[DecoratedSignature],
    keypairs: &[Keypair],
) -> Result<Vec<DecoratedSignature>> {
    if envelope.is_empty() {
        return Err(SignerError::Validation(
            "transaction envelope cannot be empty".into(),
        ));
    }

    let hash = signature_base(network_passphrase, envelope_type, envelope);
    let mut signed = signatures.to_vec();
    signed.extend(keypairs.iter().map(|kp| kp.sign_decorated(&hash)));
    Ok(signed)
}

/// An unsigned or partially signed transaction.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Default)]
pub struct Transaction {
    pub envelope: Vec<u8>,
    pub signatures: Vec<DecoratedSignature>,
}

impl Transaction {
    pub fn new(envelope: impl Into<Vec<u8>>) -> Self {
        Self {
            envelope: envelope.into(),
            signatures: Vec::new(),
        }
    }

    pub fn hash(&self, network_passphrase: &str) -> [u8; 32] {
        signature_base(network_passphrase, ENVELOPE_TYPE_TX, &self.envelope)
    }

    /// Returns a copy of this transaction with one signature per keypair appended.
    pub fn sign(&self, network_passphrase: &str, keypairs: &[Keypair]) -> Result<Self> {
        let signatures = signed_copy(
            network_passphrase,
            ENVELOPE_TYPE_TX,
            &self.envelope,
            &self.signatures,
            keypairs,
        )?;
        Ok(Self {
            envelope: self.envelope.clone(),
            signatures,
        })
    }
}

/// A wrapper envelope that pays a higher fee for an inner transaction.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Default)]
pub struct FeeBumpTransaction {
    pub envelope: Vec<u8>,
    pub signatures: Vec<DecoratedSignature>,
}

impl FeeBumpTransaction {
    pub fn new(envelope: impl Into<Vec<u8>>) -> Self {
        Self {
            envelope: envelope.into(),
            signatures: Vec::new(),
        }
    }

    pub fn hash(&self, network_passphrase: &str) -> [u8; 32] {
        signature_base(network_passphrase, ENVELOPE_TYPE_TX_FEE_BUMP, &self.envelope)
    }

    pub fn sign(&self, network_passphrase: &str, keypairs: &[Keypair]) -> Result<Self> {
        let signatures = signed_copy(
            network_passphrase,
            ENVELOPE_TYPE_TX_FEE_BUMP,
            &self.envelope,
            &self.signatures,
            keypairs,
        )?;
        Ok(Self {
            envelope: self.envelope.clone(),
            signatures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TESTNET: &str = "Test SDF Network ; September 2015";

    #[test]
    fn test_sign_appends_without_mutating_input() {
        let tx = Transaction::new(b"payment".to_vec());
        let kp = Keypair::random();

        let signed = tx.sign(TESTNET, std::slice::from_ref(&kp)).unwrap();
        assert!(tx.signatures.is_empty());
        assert_eq!(signed.signatures.len(), 1);
        assert_eq!(signed.signatures[0].hint, kp.hint());
        assert!(kp.verify(&tx.hash(TESTNET), &signed.signatures[0]));
    }

    #[test]
    fn test_signatures_are_network_and_type_bound() {
        let kp = Keypair::random();
        let tx = Transaction::new(b"payment".to_vec());
        let fee_bump = FeeBumpTransaction::new(b"payment".to_vec());

        assert_ne!(tx.hash(TESTNET), tx.hash("Public Global Stellar Network ; September 2015"));
        assert_ne!(tx.hash(TESTNET), fee_bump.hash(TESTNET));

        let signed = fee_bump.sign(TESTNET, std::slice::from_ref(&kp)).unwrap();
        assert!(kp.verify(&fee_bump.hash(TESTNET), &signed.signatures[0]));
        assert!(!kp.verify(&tx.hash(TESTNET), &signed.signatures[0]));
    }

    #[test]
    fn test_empty_envelope_is_rejected() {
        let kp = Keypair::random();
        let result = Transaction::default().sign(TESTNET, &[kp]);
        assert!(matches!(result, Err(SignerError::Validation(_))));
    }
}
