//! Proxy data models

use crate::error::{ProtocolError, ValidationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Proxy type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProxyType {
    #[default]
    Http,
    Https,
    Socks4,
    Socks5,
}

impl fmt::Display for ProxyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyType::Http => write!(f, "http"),
            ProxyType::Https => write!(f, "https"),
            ProxyType::Socks4 => write!(f, "socks4"),
            ProxyType::Socks5 => write!(f, "socks5"),
        }
    }
}

impl FromStr for ProxyType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "http" => Ok(ProxyType::Http),
            "https" => Ok(ProxyType::Https),
            "socks4" => Ok(ProxyType::Socks4),
            "socks5" => Ok(ProxyType::Socks5),
            _ => Err(anyhow::anyhow!(
                "Invalid proxy type: {}. Use: http, https, socks4, socks5",
                s
            )),
        }
    }
}

/// A `host:port` pair nominated for liveness testing
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Candidate {
    pub host: String,
    pub port: u16,
    pub proxy_type: ProxyType,
}

impl Candidate {
    pub fn new(host: impl Into<String>, port: u16, proxy_type: ProxyType) -> Self {
        Self {
            host: host.into(),
            port,
            proxy_type,
        }
    }

    /// Forward-proxy URL for HTTP clients (always the `http` scheme, the
    /// proxy itself is spoken to in plain text)
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Get the proxy string in IP:PORT format
    pub fn to_simple_string(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.proxy_type, self.host, self.port)
    }
}

/// Result of probing one candidate against one validation endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct CheckOutcome {
    pub success: bool,
    pub elapsed: Duration,
    /// IP address echoed back by the endpoint, if any
    pub identifier: Option<String>,
    pub failure: Option<ProtocolError>,
}

impl CheckOutcome {
    pub fn passed(elapsed: Duration, identifier: Option<String>) -> Self {
        Self {
            success: true,
            elapsed,
            identifier,
            failure: None,
        }
    }

    pub fn failed(elapsed: Duration, error: ProtocolError) -> Self {
        Self {
            success: false,
            elapsed,
            identifier: None,
            failure: Some(error),
        }
    }
}

/// Aggregate validation record for one candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyResult {
    /// The candidate as it was supplied, normally `host:port`
    pub proxy: String,
    pub protocol: ProxyType,
    pub alive: bool,
    /// Mean seconds over successful checks only, 0 when none succeeded
    pub response_time: f64,
    pub ip_returned: Option<String>,
    pub checks_passed: usize,
    pub checks_total: usize,
    pub error: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl ProxyResult {
    /// A dead result that never reached the protocol stage
    pub fn dead(proxy: impl Into<String>, protocol: ProxyType, error: &ValidationError) -> Self {
        Self {
            proxy: proxy.into(),
            protocol,
            alive: false,
            response_time: 0.0,
            ip_returned: None,
            checks_passed: 0,
            checks_total: 0,
            error: Some(error.to_string()),
            checked_at: Utc::now(),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn response_time_ms(&self) -> u64 {
        (self.response_time * 1000.0).round() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_creation() {
        let candidate = Candidate::new("127.0.0.1", 8080, ProxyType::Http);
        assert_eq!(candidate.host, "127.0.0.1");
        assert_eq!(candidate.port, 8080);
        assert_eq!(candidate.proxy_type, ProxyType::Http);
    }

    #[test]
    fn test_candidate_urls() {
        let candidate = Candidate::new("192.168.1.1", 1080, ProxyType::Https);
        assert_eq!(candidate.url(), "http://192.168.1.1:1080");
        assert_eq!(candidate.to_simple_string(), "192.168.1.1:1080");
        assert_eq!(candidate.to_string(), "https://192.168.1.1:1080");
    }

    #[test]
    fn test_proxy_type_from_str() {
        assert_eq!("SOCKS5".parse::<ProxyType>().unwrap(), ProxyType::Socks5);
        assert_eq!("https".parse::<ProxyType>().unwrap(), ProxyType::Https);
        assert!("ftp".parse::<ProxyType>().is_err());
    }

    #[test]
    fn test_dead_result() {
        let result =
            ProxyResult::dead("1.2.3.4:80", ProxyType::Socks4, &ValidationError::PortClosed);
        assert!(!result.is_alive());
        assert_eq!(result.checks_total, 0);
        assert_eq!(result.response_time, 0.0);
        assert_eq!(result.error.as_deref(), Some("port closed"));
    }

    #[test]
    fn test_result_serializes_lowercase_protocol() {
        let result =
            ProxyResult::dead("1.2.3.4:80", ProxyType::Socks5, &ValidationError::TaskTimeout);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["protocol"], "socks5");
        assert_eq!(json["error"], "timeout");
    }
}
