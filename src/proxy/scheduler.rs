//! Batch scheduler with bounded concurrency and early stop
//!
//! Everything runs on the calling task: the per-candidate futures of one
//! batch are polled together through a [`FuturesUnordered`], and a
//! [`Semaphore`] caps how many of them are past the gate at once. The live
//! accumulator and the progress listener are only touched from the loop that
//! drains that set, so neither needs a lock.

use crate::error::ValidationError;
use crate::proxy::aggregator::LiveResults;
use crate::proxy::cache::ResultCache;
use crate::proxy::checker::{
    DEFAULT_BATCH_SIZE, DEFAULT_CONCURRENCY, DEFAULT_DEADLINE_FACTOR, DEFAULT_TIMEOUT_SECS,
};
use crate::proxy::models::{ProxyResult, ProxyType};
use crate::proxy::prefilter::PortProbe;
use crate::proxy::protocol::EndpointCheck;
use crate::proxy::validator::Validator;
use crate::Result;
use anyhow::Context;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{AcquireError, Semaphore};
use tracing::{debug, info, warn};

/// Receives one notification per finalized candidate, dead or alive.
///
/// Called inline from the scheduling loop; a slow listener slows the whole
/// run down. Use [`ProxyChecker::check_proxies_stream`] when the consumer
/// may block.
///
/// [`ProxyChecker::check_proxies_stream`]: crate::proxy::ProxyChecker::check_proxies_stream
pub trait ProgressListener {
    fn on_progress(&mut self, checked: usize, total: usize, result: &ProxyResult);
}

impl<F> ProgressListener for F
where
    F: FnMut(usize, usize, &ProxyResult),
{
    fn on_progress(&mut self, checked: usize, total: usize, result: &ProxyResult) {
        self(checked, total, result)
    }
}

/// Listener that ignores every notification
#[derive(Debug, Clone, Copy, Default)]
pub struct Silent;

impl ProgressListener for Silent {
    fn on_progress(&mut self, _checked: usize, _total: usize, _result: &ProxyResult) {}
}

/// Owned progress notification, for channel-based consumers
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub checked: usize,
    pub total: usize,
    pub result: ProxyResult,
}

/// Cache key for a candidate tested as `proxy_type`
pub fn cache_key(proxy_type: ProxyType, raw: &str) -> String {
    format!("{}://{}", proxy_type, raw.trim())
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    batch_size: usize,
    concurrency: usize,
    deadline: Duration,
    target: Option<usize>,
    cache: Option<Arc<dyn ResultCache>>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
            deadline: Duration::from_secs(DEFAULT_TIMEOUT_SECS) * DEFAULT_DEADLINE_FACTOR,
            target: None,
            cache: None,
        }
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.clamp(1, Semaphore::MAX_PERMITS);
        self
    }

    /// Outer deadline for one candidate's whole validation
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Stop issuing batches once this many live proxies were found
    pub fn with_target(mut self, target: Option<usize>) -> Self {
        self.target = target.filter(|t| *t > 0);
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Validate every candidate and return the live ones, fastest first.
    ///
    /// Candidate-level failures never surface here; an `Err` means the
    /// scheduler itself broke.
    pub async fn run<C, P, L>(
        &self,
        validator: &Validator<C, P>,
        proxies: &[String],
        listener: &mut L,
    ) -> Result<Vec<ProxyResult>>
    where
        C: EndpointCheck,
        P: PortProbe,
        L: ProgressListener + ?Sized,
    {
        let total = proxies.len();
        let batches = total.div_ceil(self.batch_size);
        let mut checked = 0;
        let mut live = LiveResults::new();

        if let Some(cache) = &self.cache {
            cache.purge_expired();
        }

        for (index, batch) in proxies.chunks(self.batch_size).enumerate() {
            let semaphore = Semaphore::new(self.concurrency);
            let mut in_flight: FuturesUnordered<_> = batch
                .iter()
                .map(|raw| self.dispatch(validator, raw, &semaphore))
                .collect();

            while let Some(result) = in_flight.next().await {
                let result = result.context("concurrency limiter closed")?;
                checked += 1;
                listener.on_progress(checked, total, &result);
                live.push(result);
            }

            info!(
                "batch {}/{} done: {}/{} checked, {} live",
                index + 1,
                batches,
                checked,
                total,
                live.len()
            );

            if let Some(target) = self.target {
                if live.len() >= target {
                    info!("target of {} live proxies reached, stopping", target);
                    break;
                }
            }
        }

        Ok(live.into_sorted())
    }

    async fn dispatch<C, P>(
        &self,
        validator: &Validator<C, P>,
        raw: &str,
        semaphore: &Semaphore,
    ) -> std::result::Result<ProxyResult, AcquireError>
    where
        C: EndpointCheck,
        P: PortProbe,
    {
        let _permit = semaphore.acquire().await?;
        Ok(self.check_one(validator, raw).await)
    }

    /// Validate one candidate under the outer deadline.
    ///
    /// A timeout or a panic inside the checker finalizes only this
    /// candidate as dead.
    pub async fn check_one<C, P>(&self, validator: &Validator<C, P>, raw: &str) -> ProxyResult
    where
        C: EndpointCheck,
        P: PortProbe,
    {
        let proxy_type = validator.proxy_type();
        let key = cache_key(proxy_type, raw);

        if let Some(hit) = self.cache.as_ref().and_then(|cache| cache.get(&key)) {
            debug!("{}: cached", key);
            return hit;
        }

        let guarded = AssertUnwindSafe(validator.validate(raw)).catch_unwind();
        let result = match tokio::time::timeout(self.deadline, guarded).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => {
                warn!("{}: checker panicked", key);
                return ProxyResult::dead(raw.trim(), proxy_type, &ValidationError::Panicked);
            }
            Err(_) => {
                debug!("{}: exceeded {:?}", key, self.deadline);
                ProxyResult::dead(raw.trim(), proxy_type, &ValidationError::TaskTimeout)
            }
        };

        if let Some(cache) = &self.cache {
            cache.set(&key, result.clone());
        }
        result
    }
}
