//! HTTP/HTTPS forward-proxy checker

use crate::error::ProtocolError;
use crate::proxy::endpoints::ValidationEndpoint;
use crate::proxy::models::{Candidate, CheckOutcome};
use crate::proxy::protocol::EndpointCheck;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, Proxy as ReqwestProxy, StatusCode};
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};
use tracing::debug;

/// Default user agent for validation requests
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Dotted-quad candidates; octet ranges are checked by parsing
static IPV4_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\d{1,3}(?:\.\d{1,3}){3}\b").expect("Invalid IPv4 regex")
});

/// First syntactically valid IPv4 address in `body`
pub fn extract_ipv4(body: &str) -> Option<String> {
    IPV4_REGEX
        .find_iter(body)
        .map(|m| m.as_str())
        .find(|s| s.parse::<Ipv4Addr>().is_ok())
        .map(str::to_string)
}

/// Sends a GET through the candidate and expects the endpoint to echo an IP
#[derive(Debug, Clone)]
pub struct HttpChecker {
    user_agent: String,
}

impl HttpChecker {
    pub fn new() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }

    /// A fresh client per probe so every endpoint gets its own connection
    /// through the proxy
    fn create_client(&self, candidate: &Candidate, timeout: Duration) -> reqwest::Result<Client> {
        Client::builder()
            .proxy(ReqwestProxy::all(candidate.url())?)
            .timeout(timeout)
            .connect_timeout(timeout)
            .pool_max_idle_per_host(0)
            .user_agent(self.user_agent.as_str())
            .build()
    }

    async fn fetch(client: &Client, url: &str) -> Result<String, ProtocolError> {
        let response = client.get(url).send().await.map_err(request_error)?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ProtocolError::HttpStatus(status.as_u16()));
        }

        let body = response.text().await.map_err(request_error)?;
        extract_ipv4(body.trim()).ok_or(ProtocolError::NoIpInBody)
    }
}

impl Default for HttpChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl EndpointCheck for HttpChecker {
    async fn check(
        &self,
        candidate: &Candidate,
        endpoint: &ValidationEndpoint,
        timeout: Duration,
    ) -> CheckOutcome {
        let ValidationEndpoint::Url(url) = endpoint else {
            return CheckOutcome::failed(
                Duration::ZERO,
                ProtocolError::EndpointMismatch(endpoint.to_string()),
            );
        };

        let client = match self.create_client(candidate, timeout) {
            Ok(client) => client,
            Err(e) => {
                return CheckOutcome::failed(Duration::ZERO, ProtocolError::Request(e.to_string()))
            }
        };

        let start = Instant::now();
        let result = match tokio::time::timeout(timeout, Self::fetch(&client, url)).await {
            Ok(result) => result,
            Err(_) => Err(ProtocolError::Timeout("http request")),
        };
        let elapsed = start.elapsed();

        match result {
            Ok(ip) => CheckOutcome::passed(elapsed, Some(ip)),
            Err(e) => {
                debug!("{} via {}: {}", candidate, url, e);
                CheckOutcome::failed(elapsed, e)
            }
        }
    }
}

fn request_error(err: reqwest::Error) -> ProtocolError {
    if err.is_timeout() {
        ProtocolError::Timeout("http request")
    } else {
        ProtocolError::Request(err.to_string())
    }
}
