//! All-pass, fail-fast validation of one candidate across its endpoint list

use crate::error::{ProtocolError, ValidationError};
use crate::proxy::endpoints::ValidationEndpoint;
use crate::proxy::models::{ProxyResult, ProxyType};
use crate::proxy::parser::ProxyParser;
use crate::proxy::prefilter::PortProbe;
use crate::proxy::protocol::EndpointCheck;
use chrono::Utc;
use std::time::Duration;
use tracing::debug;

/// Drives one candidate through `PORT_CHECK` and then every endpoint in order
#[derive(Debug, Clone)]
pub struct Validator<C, P> {
    proxy_type: ProxyType,
    checker: C,
    prefilter: P,
    endpoints: Vec<ValidationEndpoint>,
    timeout: Duration,
    port_timeout: Duration,
}

impl<C, P> Validator<C, P>
where
    C: EndpointCheck,
    P: PortProbe,
{
    pub fn new(
        proxy_type: ProxyType,
        checker: C,
        prefilter: P,
        endpoints: Vec<ValidationEndpoint>,
    ) -> Self {
        Self {
            proxy_type,
            checker,
            prefilter,
            endpoints,
            timeout: Duration::from_secs(crate::proxy::checker::DEFAULT_TIMEOUT_SECS),
            port_timeout: Duration::from_millis(crate::proxy::prefilter::DEFAULT_PORT_TIMEOUT_MS),
        }
    }

    /// Per-check timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_port_timeout(mut self, port_timeout: Duration) -> Self {
        self.port_timeout = port_timeout;
        self
    }

    pub fn proxy_type(&self) -> ProxyType {
        self.proxy_type
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn endpoints(&self) -> &[ValidationEndpoint] {
        &self.endpoints
    }

    /// Validate a raw `host:port` string.
    ///
    /// Never fails: malformed input, a closed port and protocol failures all
    /// come back as a dead [`ProxyResult`].
    pub async fn validate(&self, raw: &str) -> ProxyResult {
        let proxy = raw.trim();
        let candidate = match ProxyParser::parse_candidate(proxy, self.proxy_type) {
            Ok(candidate) => candidate,
            Err(e) => {
                debug!("{:?} rejected: {}", proxy, e);
                return ProxyResult::dead(proxy, self.proxy_type, &e);
            }
        };

        if !self
            .prefilter
            .is_open(&candidate.host, candidate.port, self.port_timeout)
            .await
        {
            debug!("{}: port closed", candidate);
            return ProxyResult::dead(proxy, self.proxy_type, &ValidationError::PortClosed);
        }

        let total = self.endpoints.len();
        let mut passed = 0;
        let mut elapsed_sum = Duration::ZERO;
        let mut first_ip: Option<String> = None;
        let mut error = None;

        for (index, endpoint) in self.endpoints.iter().enumerate() {
            let outcome = self.checker.check(&candidate, endpoint, self.timeout).await;
            if !outcome.success {
                let source = outcome
                    .failure
                    .unwrap_or_else(|| ProtocolError::Request("check failed".to_string()));
                let err = ValidationError::Protocol {
                    index: index + 1,
                    total,
                    source,
                };
                debug!("{}: {}", candidate, err);
                error = Some(err.to_string());
                break;
            }

            passed += 1;
            elapsed_sum += outcome.elapsed;
            if first_ip.is_none() {
                first_ip = outcome.identifier.filter(|ip| !ip.is_empty());
            }
        }

        let alive = total > 0 && passed == total;
        let response_time = if passed == 0 {
            0.0
        } else {
            elapsed_sum.as_secs_f64() / passed as f64
        };
        if alive {
            debug!("{}: alive in {:.3}s", candidate, response_time);
        }

        ProxyResult {
            proxy: proxy.to_string(),
            protocol: self.proxy_type,
            alive,
            response_time,
            ip_returned: first_ip,
            checks_passed: passed,
            checks_total: total,
            error,
            checked_at: Utc::now(),
        }
    }
}
