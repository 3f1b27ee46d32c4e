//! Passphrase-based encryption of private keys.
//!
//! - **Key derivation**: SHA-256 of the passphrase. Passphrases are validated as
//!   secret seeds before use, so they already carry 256 bits of entropy.
//! - **Encryption**: ChaCha20-Poly1305 with a random 12-byte nonce.
//! - **Encoding**: base64(nonce || ciphertext || tag).
//!
//! Nothing in this module logs its inputs or outputs.

use crate::domain::ports::PrivateKeyEncrypter;
use crate::error::{Result, SignerError};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use chacha20poly1305::{ChaCha20Poly1305, Key, KeyInit, Nonce, aead::Aead};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

/// Nonce length for ChaCha20-Poly1305 (12 bytes)
pub const NONCE_LEN: usize = 12;

/// ChaCha20-Poly1305 auth tag length (16 bytes)
pub const AUTH_TAG_LEN: usize = 16;

#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultPrivateKeyEncrypter;

impl DefaultPrivateKeyEncrypter {
    pub fn new() -> Self {
        Self
    }
}

fn derive_key(passphrase: &str) -> Result<Zeroizing<[u8; 32]>> {
    if passphrase.is_empty() {
        return Err(SignerError::Config("encryption passphrase cannot be empty".into()));
    }
    let mut key = Zeroizing::new([0u8; 32]);
    key.copy_from_slice(&Sha256::digest(passphrase.as_bytes()));
    Ok(key)
}

impl PrivateKeyEncrypter for DefaultPrivateKeyEncrypter {
    fn encrypt(&self, plaintext: &str, passphrase: &str) -> Result<String> {
        let key = derive_key(passphrase)?;
        let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_slice()));

        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|_| SignerError::Validation("encrypting private key failed".into()))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(sealed))
    }

    fn decrypt(&self, ciphertext: &str, passphrase: &str) -> Result<Zeroizing<String>> {
        let key = derive_key(passphrase)?;
        let sealed = BASE64
            .decode(ciphertext)
            .map_err(|_| SignerError::Authentication)?;
        if sealed.len() < NONCE_LEN + AUTH_TAG_LEN {
            return Err(SignerError::Authentication);
        }

        let (nonce, body) = sealed.split_at(NONCE_LEN);
        let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_slice()));
        let plaintext = Zeroizing::new(
            cipher
                .decrypt(Nonce::from_slice(nonce), body)
                .map_err(|_| SignerError::Authentication)?,
        );

        let text = std::str::from_utf8(&plaintext).map_err(|_| SignerError::Authentication)?;
        Ok(Zeroizing::new(text.to_owned()))
    }
}
