//! Protocol checkers: one probe of one candidate against one endpoint

pub mod http;
pub mod socks;

use crate::proxy::endpoints::ValidationEndpoint;
use crate::proxy::models::{Candidate, CheckOutcome, ProxyType};
use std::future::Future;
use std::time::Duration;

pub use http::HttpChecker;
pub use socks::{SocksChecker, SocksVersion};

/// A single probe. Every I/O step inside must be bounded by `timeout`, a
/// hang resolves to a failed outcome instead of pending forever.
pub trait EndpointCheck {
    fn check(
        &self,
        candidate: &Candidate,
        endpoint: &ValidationEndpoint,
        timeout: Duration,
    ) -> impl Future<Output = CheckOutcome> + Send;
}

/// Checker strategy, chosen once per run from the protocol being tested
#[derive(Debug, Clone)]
pub enum ProtocolChecker {
    Http(HttpChecker),
    Socks(SocksChecker),
}

impl ProtocolChecker {
    pub fn for_type(proxy_type: ProxyType) -> Self {
        match proxy_type {
            ProxyType::Http | ProxyType::Https => ProtocolChecker::Http(HttpChecker::new()),
            ProxyType::Socks4 => ProtocolChecker::Socks(SocksChecker::new(SocksVersion::V4)),
            ProxyType::Socks5 => ProtocolChecker::Socks(SocksChecker::new(SocksVersion::V5)),
        }
    }
}

impl EndpointCheck for ProtocolChecker {
    async fn check(
        &self,
        candidate: &Candidate,
        endpoint: &ValidationEndpoint,
        timeout: Duration,
    ) -> CheckOutcome {
        match self {
            ProtocolChecker::Http(checker) => checker.check(candidate, endpoint, timeout).await,
            ProtocolChecker::Socks(checker) => checker.check(candidate, endpoint, timeout).await,
        }
    }
}
