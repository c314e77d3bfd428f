//! MR600 router client library
//!
//! Drives the encrypted web-UI protocol of the TP-Link MR600 LTE router:
//! RSA/AES handshake, session lifecycle with reconnect, and SMS operations.

pub mod config;
pub mod error;
pub mod handshake;
pub mod session;
pub mod sms;

pub use error::{ClientError, Result};
pub use session::{RetryPolicy, SessionClient, SessionConfig, SessionCredentials, SessionState};
pub use sms::{InboxMessage, OutboxMessage, SendStatus, Sms, filter_by_unread};
