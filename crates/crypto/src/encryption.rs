//! Per-session encryption state
//!
//! Owns the router's RSA key, the AES session key and the handshake
//! sequence number. Commands are AES-encrypted; the signature is the RSA
//! encryption of `h=<hash>&s=<sequence + ciphertext length>`, prefixed at
//! login with `key=<k>&iv=<iv>&` so the router learns the session key.

use crate::cipher::{AesError, SessionCipher, SessionKey};
use crate::rsa_nopad::{RouterRsaKey, RsaError};
use thiserror::Error;
use tracing::{debug, trace};

/// The web UI signs a hash field it never assigns; the router accepts the
/// resulting literal text, so it is reproduced as-is.
pub const UNSET_HASH: &str = "undefined";

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("RSA error: {0}")]
    Rsa(#[from] RsaError),

    #[error("AES error: {0}")]
    Aes(#[from] AesError),

    #[error("No session key generated")]
    NoSessionKey,
}

/// Encrypted body plus its signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedPayload {
    /// Base64 AES ciphertext
    pub data: String,
    /// Hex RSA signature
    pub sign: String,
}

struct ActiveKey {
    key: SessionKey,
    cipher: SessionCipher,
}

/// Encryption state for one router session
pub struct EncryptionManager {
    rsa: RouterRsaKey,
    sequence: u64,
    session: Option<ActiveKey>,
}

impl EncryptionManager {
    /// Store the router's public key and handshake sequence.
    ///
    /// No AES key exists until `generate_session_key` or `set_session_key`.
    pub fn configure(modulus: &str, exponent: &str, sequence: u64) -> Result<Self, CryptoError> {
        let rsa = RouterRsaKey::from_hex(modulus, exponent)?;
        debug!(
            "Configured router RSA key ({} bits, e={}, seq={})",
            rsa.block_len() * 8,
            rsa.exponent(),
            sequence
        );
        Ok(Self {
            rsa,
            sequence,
            session: None,
        })
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn rsa_key(&self) -> &RouterRsaKey {
        &self.rsa
    }

    /// Replace any previous AES state with a fresh random key/iv
    pub fn generate_session_key(&mut self) -> SessionKey {
        let key = SessionKey::generate();
        self.set_session_key(key);
        key
    }

    /// Use a known key/iv, e.g. to replay captured traffic
    pub fn set_session_key(&mut self, key: SessionKey) {
        // Logged so captured responses can be decrypted by hand
        debug!("Session AES key: {}", key.key_string());
        self.session = Some(ActiveKey {
            key,
            cipher: SessionCipher::new(&key),
        });
    }

    pub fn session_key(&self) -> Option<&SessionKey> {
        self.session.as_ref().map(|active| &active.key)
    }

    /// Encrypt and sign a command frame
    pub fn encrypt_command(&self, plaintext: &str) -> Result<EncryptedPayload, CryptoError> {
        self.encrypt(plaintext, false)
    }

    /// Encrypt and sign `login\npassword`, announcing the session key
    pub fn encrypt_login(&self, credentials: &str) -> Result<EncryptedPayload, CryptoError> {
        self.encrypt(credentials, true)
    }

    /// Decrypt a base64 response body
    pub fn decrypt_response(&self, encoded: &str) -> Result<String, CryptoError> {
        let active = self.active()?;
        Ok(active.cipher.decrypt(encoded)?)
    }

    /// The plaintext that gets RSA-signed for a ciphertext of `data_len` characters
    pub fn signed_material(&self, data_len: usize, login: bool) -> Result<String, CryptoError> {
        let active = self.active()?;
        let seq = self.sequence.saturating_add(data_len as u64);

        let mut material = String::new();
        if login {
            material.push_str(&active.key.key_string());
            material.push('&');
        }
        material.push_str(&format!("h={}&s={}", UNSET_HASH, seq));
        Ok(material)
    }

    fn encrypt(&self, plaintext: &str, login: bool) -> Result<EncryptedPayload, CryptoError> {
        let data = self.active()?.cipher.encrypt(plaintext)?;
        let material = self.signed_material(data.len(), login)?;
        trace!("Signing {:?}", material);
        let sign = self.rsa.encrypt(&material)?;

        Ok(EncryptedPayload { data, sign })
    }

    fn active(&self) -> Result<&ActiveKey, CryptoError> {
        self.session.as_ref().ok_or(CryptoError::NoSessionKey)
    }
}
