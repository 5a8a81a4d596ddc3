//! Result cache consulted before a candidate is validated

use crate::proxy::models::ProxyResult;
use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::warn;

/// Default maximum age of a cached result in hours
const DEFAULT_MAX_AGE_HOURS: u64 = 12;

/// Shared `get`/`set` store; implementations must tolerate many concurrent
/// readers and writers
pub trait ResultCache: Send + Sync + fmt::Debug {
    fn get(&self, key: &str) -> Option<ProxyResult>;
    fn set(&self, key: &str, value: ProxyResult);

    /// Drop entries that can no longer be served; called once per run
    fn purge_expired(&self) {}
}

/// In-process cache with a maximum entry age
#[derive(Debug)]
pub struct MemoryCache {
    max_age: Duration,
    entries: RwLock<HashMap<String, (Instant, ProxyResult)>>,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_MAX_AGE_HOURS * 3600))
    }
}

impl MemoryCache {
    pub fn new(max_age: Duration) -> Self {
        Self {
            max_age,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResultCache for MemoryCache {
    fn get(&self, key: &str) -> Option<ProxyResult> {
        {
            let entries = match self.entries.read() {
                Ok(entries) => entries,
                Err(_) => {
                    warn!("result cache lock poisoned, treating as miss");
                    return None;
                }
            };
            match entries.get(key) {
                None => return None,
                Some((stored, result)) if stored.elapsed() < self.max_age => {
                    return Some(result.clone())
                }
                Some(_) => {}
            }
        }

        // expired, evict
        if let Ok(mut entries) = self.entries.write() {
            if let Some((stored, _)) = entries.get(key) {
                if stored.elapsed() >= self.max_age {
                    entries.remove(key);
                }
            }
        }
        None
    }

    fn set(&self, key: &str, value: ProxyResult) {
        match self.entries.write() {
            Ok(mut entries) => {
                entries.insert(key.to_string(), (Instant::now(), value));
            }
            Err(_) => warn!("result cache lock poisoned, dropping {}", key),
        }
    }

    /// Drop every entry older than the maximum age
    fn purge_expired(&self) {
        let max_age = self.max_age;
        match self.entries.write() {
            Ok(mut entries) => entries.retain(|_, (stored, _)| stored.elapsed() < max_age),
            Err(_) => warn!("result cache lock poisoned, skipping purge"),
        }
    }
}
