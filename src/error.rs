//! Per-candidate error taxonomy
//!
//! Every variant here ends up as the `error` string of a dead
//! [`ProxyResult`](crate::proxy::ProxyResult). None of them ever aborts a run.

use thiserror::Error;

/// Failure of a single probe against a single validation endpoint
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("timed out during {0}")]
    Timeout(&'static str),

    #[error("connect failed: {0}")]
    Connect(String),

    #[error("i/o error: {0}")]
    Io(String),

    #[error("could not resolve {host}: {reason}")]
    Resolve { host: String, reason: String },

    #[error("short reply: expected {expected} bytes, got {got}")]
    ShortReply { expected: usize, got: usize },

    #[error("unexpected reply version {0:#04x}")]
    BadVersion(u8),

    #[error("socks4 request rejected with code {0:#04x}")]
    Socks4Rejected(u8),

    #[error("socks5 method {0:#04x} not supported")]
    UnsupportedMethod(u8),

    #[error("socks5 connect failed with reply {0:#04x}")]
    Socks5Rejected(u8),

    #[error("HTTP status: {0}")]
    HttpStatus(u16),

    #[error("no IPv4 address in response body")]
    NoIpInBody,

    #[error("request failed: {0}")]
    Request(String),

    #[error("endpoint {0} does not match the checker")]
    EndpointMismatch(String),
}

impl From<std::io::Error> for ProtocolError {
    fn from(err: std::io::Error) -> Self {
        ProtocolError::Io(err.to_string())
    }
}

/// Reason a candidate was finalized dead
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid format")]
    InvalidFormat,

    #[error("invalid port")]
    InvalidPort,

    #[error("port closed")]
    PortClosed,

    #[error("failed at endpoint {index}/{total}: {source}")]
    Protocol {
        index: usize,
        total: usize,
        source: ProtocolError,
    },

    #[error("timeout")]
    TaskTimeout,

    #[error("checker panicked")]
    Panicked,
}
