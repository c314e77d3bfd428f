//! AES-128-CBC session cipher

use aes::Aes128;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::RngCore;
use rand::rngs::OsRng;
use thiserror::Error;

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

#[derive(Error, Debug)]
pub enum AesError {
    #[error("Invalid key or iv length")]
    InvalidKeyLength,

    #[error("Invalid base64 ciphertext: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("Decryption failed (bad padding)")]
    DecryptionFailed,

    #[error("Decrypted data is not valid UTF-8")]
    InvalidUtf8,
}

/// Session key and iv, 8 random bytes each.
///
/// The router expects the 16-character lower-case hex rendering of each
/// value, and uses the ASCII bytes of that rendering as the AES-128 key/iv.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionKey {
    key: [u8; 8],
    iv: [u8; 8],
}

impl SessionKey {
    /// Generate a fresh random key/iv pair
    pub fn generate() -> Self {
        let mut key = [0u8; 8];
        let mut iv = [0u8; 8];
        OsRng.fill_bytes(&mut key);
        OsRng.fill_bytes(&mut iv);
        Self { key, iv }
    }

    pub fn from_parts(key: [u8; 8], iv: [u8; 8]) -> Self {
        Self { key, iv }
    }

    /// Parse from the 16-hex-character strings found in `key=...&iv=...`
    pub fn from_hex(key: &str, iv: &str) -> Result<Self, AesError> {
        let mut k = [0u8; 8];
        let mut i = [0u8; 8];
        hex::decode_to_slice(key, &mut k).map_err(|_| AesError::InvalidKeyLength)?;
        hex::decode_to_slice(iv, &mut i).map_err(|_| AesError::InvalidKeyLength)?;
        Ok(Self { key: k, iv: i })
    }

    pub fn key_hex(&self) -> String {
        hex::encode(self.key)
    }

    pub fn iv_hex(&self) -> String {
        hex::encode(self.iv)
    }

    /// `key=<hex>&iv=<hex>`, the form announced to the router at login
    pub fn key_string(&self) -> String {
        format!("key={}&iv={}", self.key_hex(), self.iv_hex())
    }
}

/// AES-128-CBC with PKCS#7 padding and base64 ciphertext
pub struct SessionCipher {
    key_material: [u8; 16],
    iv_material: [u8; 16],
}

impl SessionCipher {
    pub fn new(session_key: &SessionKey) -> Self {
        Self {
            key_material: ascii_material(&session_key.key_hex()),
            iv_material: ascii_material(&session_key.iv_hex()),
        }
    }

    /// Encrypt UTF-8 text, returning base64
    pub fn encrypt(&self, plaintext: &str) -> Result<String, AesError> {
        let cipher = Aes128CbcEnc::new_from_slices(&self.key_material, &self.iv_material)
            .map_err(|_| AesError::InvalidKeyLength)?;
        let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());
        Ok(STANDARD.encode(ciphertext))
    }

    /// Decrypt base64 ciphertext back to UTF-8 text
    pub fn decrypt(&self, encoded: &str) -> Result<String, AesError> {
        let ciphertext = STANDARD.decode(encoded.trim())?;
        let cipher = Aes128CbcDec::new_from_slices(&self.key_material, &self.iv_material)
            .map_err(|_| AesError::InvalidKeyLength)?;
        let plaintext = cipher
            .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
            .map_err(|_| AesError::DecryptionFailed)?;
        String::from_utf8(plaintext).map_err(|_| AesError::InvalidUtf8)
    }
}

fn ascii_material(hex: &str) -> [u8; 16] {
    let mut out = [0u8; 16];
    out.copy_from_slice(&hex.as_bytes()[..16]);
    out
}
