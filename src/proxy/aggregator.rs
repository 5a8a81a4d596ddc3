//! Collects alive results and ranks them

use crate::proxy::models::ProxyResult;

/// Alive results of a run, dead ones are dropped on arrival
#[derive(Debug, Default)]
pub struct LiveResults {
    live: Vec<ProxyResult>,
}

impl LiveResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep `result` if it is alive; returns whether it was kept
    pub fn push(&mut self, result: ProxyResult) -> bool {
        if result.alive {
            self.live.push(result);
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Fastest first
    pub fn into_sorted(mut self) -> Vec<ProxyResult> {
        self.live.sort_by(|a, b| a.response_time.total_cmp(&b.response_time));
        self.live
    }
}
