//! Validation endpoint catalog

use crate::proxy::models::ProxyType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Echo-IP endpoints every HTTP(S) proxy must pass
const VALIDATION_URLS: [&str; 3] = [
    "http://icanhazip.com",
    "http://api.ipify.org",
    "http://ip.me",
];

/// Extra endpoint reached through a TLS tunnel for HTTPS proxies
const TLS_VALIDATION_URL: &str = "https://api.ipify.org";

/// CONNECT destinations for SOCKS handshakes
const SOCKS_TARGETS: [(&str, u16); 3] = [
    ("icanhazip.com", 80),
    ("api.ipify.org", 80),
    ("ip.me", 80),
];

/// A single probe target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationEndpoint {
    /// Fetched through the proxy, body must echo an IPv4 address
    Url(String),
    /// Destination requested in a SOCKS CONNECT
    Socks { host: String, port: u16 },
}

impl ValidationEndpoint {
    pub fn url(url: impl Into<String>) -> Self {
        ValidationEndpoint::Url(url.into())
    }

    pub fn socks(host: impl Into<String>, port: u16) -> Self {
        ValidationEndpoint::Socks {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for ValidationEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationEndpoint::Url(url) => write!(f, "{}", url),
            ValidationEndpoint::Socks { host, port } => write!(f, "{}:{}", host, port),
        }
    }
}

/// Static mapping from protocol to its ordered endpoint list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointCatalog {
    pub urls: Vec<String>,
    pub tls_url: String,
    pub socks_targets: Vec<(String, u16)>,
}

impl Default for EndpointCatalog {
    fn default() -> Self {
        Self {
            urls: VALIDATION_URLS.iter().map(|u| u.to_string()).collect(),
            tls_url: TLS_VALIDATION_URL.to_string(),
            socks_targets: SOCKS_TARGETS
                .iter()
                .map(|(host, port)| (host.to_string(), *port))
                .collect(),
        }
    }
}

impl EndpointCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_urls(mut self, urls: Vec<String>) -> Self {
        self.urls = urls;
        self
    }

    pub fn with_tls_url(mut self, url: String) -> Self {
        self.tls_url = url;
        self
    }

    pub fn with_socks_targets(mut self, targets: Vec<(String, u16)>) -> Self {
        self.socks_targets = targets;
        self
    }

    /// Ordered endpoints a proxy of `proxy_type` has to pass
    pub fn endpoints_for(&self, proxy_type: ProxyType) -> Vec<ValidationEndpoint> {
        match proxy_type {
            ProxyType::Http => self.urls.iter().map(ValidationEndpoint::url).collect(),
            ProxyType::Https => self
                .urls
                .iter()
                .chain(std::iter::once(&self.tls_url))
                .map(ValidationEndpoint::url)
                .collect(),
            ProxyType::Socks4 | ProxyType::Socks5 => self
                .socks_targets
                .iter()
                .map(|(host, port)| ValidationEndpoint::socks(host.as_str(), *port))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_endpoint_counts() {
        let catalog = EndpointCatalog::default();
        assert_eq!(catalog.endpoints_for(ProxyType::Http).len(), 3);
        assert_eq!(catalog.endpoints_for(ProxyType::Https).len(), 4);
        assert_eq!(catalog.endpoints_for(ProxyType::Socks4).len(), 3);
        assert_eq!(catalog.endpoints_for(ProxyType::Socks5).len(), 3);
    }

    #[test]
    fn test_https_appends_tls_endpoint_last() {
        let endpoints = EndpointCatalog::default().endpoints_for(ProxyType::Https);
        assert_eq!(endpoints[0], ValidationEndpoint::url("http://icanhazip.com"));
        assert_eq!(endpoints[3], ValidationEndpoint::url("https://api.ipify.org"));
    }

    #[test]
    fn test_socks_targets() {
        let endpoints = EndpointCatalog::new()
            .with_socks_targets(vec![("127.0.0.1".to_string(), 8081)])
            .endpoints_for(ProxyType::Socks5);
        assert_eq!(endpoints, vec![ValidationEndpoint::socks("127.0.0.1", 8081)]);
        assert_eq!(endpoints[0].to_string(), "127.0.0.1:8081");
    }

    #[test]
    fn test_custom_urls() {
        let catalog = EndpointCatalog::new()
            .with_urls(vec!["http://127.0.0.1:8080/ip".to_string()])
            .with_tls_url("https://127.0.0.1:8443/ip".to_string());

        assert_eq!(
            catalog.endpoints_for(ProxyType::Http),
            vec![ValidationEndpoint::url("http://127.0.0.1:8080/ip")]
        );
        assert_eq!(
            catalog.endpoints_for(ProxyType::Https),
            vec![
                ValidationEndpoint::url("http://127.0.0.1:8080/ip"),
                ValidationEndpoint::url("https://127.0.0.1:8443/ip"),
            ]
        );
        assert_eq!(catalog.endpoints_for(ProxyType::Socks4).len(), 3);
    }
}
