//! MR600 Protocol - Command model and text frame codec
//!
//! This crate defines:
//! - `Command` / `Batch`: what is sent to a controller
//! - `frame::encode` / `frame::decode`: the line-oriented frame format
//! - `ResponsePayload` / `Record` / `Value`: decoded replies and type coercion
//!
//! Frames are plaintext here; encryption lives in `mr600-crypto`.

pub mod controller;
mod command;
pub mod frame;
mod value;

pub use command::*;
pub use frame::FrameError;
pub use value::*;
