//! Live Proxy - Multi-Endpoint Proxy Validator
//!
//! Validates HTTP, HTTPS, SOCKS4 and SOCKS5 proxies against a fixed battery
//! of independent endpoints. A proxy is only reported alive when every
//! endpoint for its protocol succeeds.

pub mod error;
pub mod proxy;

pub use error::{ProtocolError, ValidationError};
pub use proxy::*;

/// Application result type
pub type Result<T> = anyhow::Result<T>;
