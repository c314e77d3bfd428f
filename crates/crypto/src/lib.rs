//! MR600 Crypto - Router session encryption
//!
//! This crate provides:
//! - Hex codec and modular exponentiation over big unsigned integers
//! - The router's unpadded, chunked 512-bit RSA
//! - AES-128-CBC session cipher with router-style key material
//! - `EncryptionManager`, the per-session state tying them together

pub mod bigint;
mod cipher;
mod encryption;
mod rsa_nopad;

pub use bigint::BigIntError;
pub use cipher::*;
pub use encryption::*;
pub use rsa_nopad::*;
