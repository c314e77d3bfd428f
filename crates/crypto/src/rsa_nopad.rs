//! Unpadded, chunked RSA as spoken by the router's web UI
//!
//! The router decrypts each 128-hex-digit chunk with its private key and
//! strips trailing zero bytes, so the plaintext is zero-padded on the right
//! and never carries a PKCS#1 header.

use crate::bigint::{self, BigIntError};
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPublicKey};
use thiserror::Error;

/// Key size the router firmware is built around
pub const RSA_BITS: usize = 512;

/// Plaintext code units per chunk
pub const CHUNK_CHARS: usize = RSA_BITS / 8;

/// Hex digits per encrypted chunk
pub const CHUNK_HEX_LEN: usize = RSA_BITS / 4;

#[derive(Error, Debug)]
pub enum RsaError {
    #[error("Invalid RSA public key: {0}")]
    InvalidKey(String),

    #[error("Invalid RSA key component: {0}")]
    Component(#[from] BigIntError),

    #[error("Public exponent does not fit in 64 bits")]
    ExponentTooLarge,

    #[error("Message too long for RSA: {len} bytes, modulus holds {max}")]
    MessageTooLong { len: usize, max: usize },
}

/// The router's RSA public key
#[derive(Debug, Clone)]
pub struct RouterRsaKey {
    key: RsaPublicKey,
    exponent: u64,
}

impl RouterRsaKey {
    /// Build from hex-encoded modulus and exponent
    pub fn from_hex(modulus: &str, exponent: &str) -> Result<Self, RsaError> {
        let n = bigint::parse_hex(modulus)?;
        let e = bigint::parse_hex(exponent)?;

        let e_bytes = e.to_bytes_be();
        if e_bytes.len() > 8 {
            return Err(RsaError::ExponentTooLarge);
        }
        let exponent = e_bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b));

        let key = RsaPublicKey::new(n, e).map_err(|err| RsaError::InvalidKey(err.to_string()))?;
        Ok(Self { key, exponent })
    }

    pub fn modulus(&self) -> &BigUint {
        self.key.n()
    }

    pub fn exponent(&self) -> u64 {
        self.exponent
    }

    /// Modulus length in bytes, i.e. the padded block size
    pub fn block_len(&self) -> usize {
        bigint::byte_length(self.key.n())
    }

    /// Encrypt one block of at most `block_len()` encoded bytes
    fn encrypt_block(&self, units: &[u16]) -> Result<String, RsaError> {
        let max = self.block_len();
        if units.len() > max {
            return Err(RsaError::MessageTooLong {
                len: units.len(),
                max,
            });
        }

        let mut bytes = encode_units(units);
        if bytes.len() > max {
            return Err(RsaError::MessageTooLong {
                len: bytes.len(),
                max,
            });
        }
        bytes.resize(max, 0);

        let m = BigUint::from_bytes_be(&bytes);
        let c = bigint::mod_pow(&m, self.exponent, self.key.n())?;
        Ok(bigint::to_hex(&c))
    }

    /// Encrypt `plaintext` in 64-unit chunks, concatenating the hex output.
    ///
    /// Each chunk is left-padded with zeros to exactly 128 hex digits.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, RsaError> {
        let units: Vec<u16> = plaintext.encode_utf16().collect();
        let mut out = String::with_capacity(units.len().div_ceil(CHUNK_CHARS) * CHUNK_HEX_LEN);

        for chunk in units.chunks(CHUNK_CHARS) {
            let hex = self.encrypt_block(chunk)?;
            out.push_str(&format!("{:0>width$}", hex, width = CHUNK_HEX_LEN));
        }

        Ok(out)
    }
}

/// Byte encoding the router's RSA code expects.
///
/// Looks like UTF-8 but emits the continuation bytes first: two-byte
/// sequences are `0x80|low6, 0xC0|high`, three-byte sequences are
/// `0x80|low6, 0x80|mid6, 0xE0|high`. Surrogate halves are encoded as
/// independent units.
pub fn encode_units(units: &[u16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(units.len());
    for &unit in units {
        let c = u32::from(unit);
        if c < 0x80 {
            out.push(c as u8);
        } else if c < 0x800 {
            out.push(((c & 0x3f) | 0x80) as u8);
            out.push(((c >> 6) | 0xc0) as u8);
        } else {
            out.push(((c & 0x3f) | 0x80) as u8);
            out.push((((c >> 6) & 0x3f) | 0x80) as u8);
            out.push(((c >> 12) | 0xe0) as u8);
        }
    }
    out
}
