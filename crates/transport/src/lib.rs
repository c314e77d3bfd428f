//! MR600 Transport - HTTP seam between the session client and the router
//!
//! This crate provides:
//! - `HttpRequest` / `HttpResponse`: plain request/response values
//! - `Transport`: the one capability the session layer depends on
//! - `HttpTransport`: reqwest implementation
//!
//! Non-2xx statuses are returned as responses, not errors; only network
//! failures surface as `TransportError`.

mod http;
mod message;

pub use http::*;
pub use message::*;

use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

pub type SharedTransport = Arc<dyn Transport>;
