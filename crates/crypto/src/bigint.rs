//! Hex codec and modular arithmetic over arbitrary-precision unsigned integers

use rsa::BigUint;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BigIntError {
    #[error("Empty hex string")]
    Empty,

    #[error("Invalid hex string: {0:?}")]
    InvalidHex(String),

    #[error("Modulus must be non-zero")]
    ZeroModulus,
}

/// Parse a big-endian hex string (either case, no `0x` prefix)
pub fn parse_hex(s: &str) -> Result<BigUint, BigIntError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(BigIntError::Empty);
    }
    if !s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(BigIntError::InvalidHex(s.to_string()));
    }
    BigUint::parse_bytes(s.as_bytes(), 16).ok_or_else(|| BigIntError::InvalidHex(s.to_string()))
}

/// Lower-case hex, left-padded with one `0` when the digit count is odd
pub fn to_hex(value: &BigUint) -> String {
    let digits = value.to_str_radix(16);
    if digits.len() % 2 == 0 {
        digits
    } else {
        format!("0{}", digits)
    }
}

/// `base^exponent mod modulus`
pub fn mod_pow(base: &BigUint, exponent: u64, modulus: &BigUint) -> Result<BigUint, BigIntError> {
    if *modulus == BigUint::from(0u32) {
        return Err(BigIntError::ZeroModulus);
    }
    Ok(base.modpow(&BigUint::from(exponent), modulus))
}

/// Number of significant bits (0 for zero)
pub fn bit_length(value: &BigUint) -> usize {
    value.bits()
}

/// Byte length needed to hold `bit_length(value)` bits
pub fn byte_length(value: &BigUint) -> usize {
    (bit_length(value) + 7) >> 3
}
