//! Candidate parser for `host:port` proxy lists

use crate::error::ValidationError;
use crate::proxy::models::{Candidate, ProxyType};
use crate::Result;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Proxy parser for parsing candidates from strings and files
pub struct ProxyParser;

impl ProxyParser {
    /// Parse a single `host:port` candidate.
    ///
    /// Anything other than exactly two colon-separated fields is an
    /// [`ValidationError::InvalidFormat`]; a port that is not an integer in
    /// `0..=65535` is an [`ValidationError::InvalidPort`].
    pub fn parse_candidate(
        line: &str,
        proxy_type: ProxyType,
    ) -> std::result::Result<Candidate, ValidationError> {
        let parts: Vec<&str> = line.trim().split(':').collect();
        let [host, port] = parts.as_slice() else {
            return Err(ValidationError::InvalidFormat);
        };

        if host.is_empty() {
            return Err(ValidationError::InvalidFormat);
        }
        let port: u16 = port.parse().map_err(|_| ValidationError::InvalidPort)?;

        Ok(Candidate::new(*host, port, proxy_type))
    }

    /// Split raw text into candidate strings.
    ///
    /// Blank lines and `#` comments are skipped; exact duplicates are dropped
    /// while keeping first-seen order. Lines are not validated here, malformed
    /// entries surface later as dead results.
    pub fn parse_string(content: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter(|line| seen.insert(*line))
            .map(str::to_string)
            .collect()
    }

    /// Parse candidates from a file
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
        let content = fs::read_to_string(path)?;
        Ok(Self::parse_string(&content))
    }
}
