//! Proxy checker: the top-level entry point of the validation engine

use crate::proxy::cache::ResultCache;
use crate::proxy::endpoints::EndpointCatalog;
use crate::proxy::models::{ProxyResult, ProxyType};
use crate::proxy::prefilter::{TcpPrefilter, DEFAULT_PORT_TIMEOUT_MS};
use crate::proxy::protocol::ProtocolChecker;
use crate::proxy::scheduler::{ProgressEvent, ProgressListener, Scheduler, Silent};
use crate::proxy::validator::Validator;
use crate::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Default timeout for each endpoint check in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 6;

/// Default number of validations in flight at once
pub const DEFAULT_CONCURRENCY: usize = 100;

/// Default number of candidates per batch
pub const DEFAULT_BATCH_SIZE: usize = 200;

/// Outer per-candidate deadline, as a multiple of the check timeout
pub const DEFAULT_DEADLINE_FACTOR: u32 = 4;

/// Configuration for proxy checker
#[derive(Debug, Clone)]
pub struct CheckerConfig {
    /// Timeout for each endpoint check
    pub timeout: Duration,
    /// Timeout for the TCP prefilter
    pub port_timeout: Duration,
    /// Number of concurrent validations
    pub concurrency: usize,
    /// Number of candidates dispatched per batch
    pub batch_size: usize,
    /// Outer deadline = `timeout * deadline_factor`
    pub deadline_factor: u32,
    /// Stop after the batch in which this many live proxies were found
    pub target: Option<usize>,
    /// Endpoints each protocol has to pass
    pub endpoints: EndpointCatalog,
    /// Optional cache consulted before validating
    pub cache: Option<Arc<dyn ResultCache>>,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            port_timeout: Duration::from_millis(DEFAULT_PORT_TIMEOUT_MS),
            concurrency: DEFAULT_CONCURRENCY,
            batch_size: DEFAULT_BATCH_SIZE,
            deadline_factor: DEFAULT_DEADLINE_FACTOR,
            target: None,
            endpoints: EndpointCatalog::default(),
            cache: None,
        }
    }
}

impl CheckerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_port_timeout(mut self, port_timeout: Duration) -> Self {
        self.port_timeout = port_timeout;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_deadline_factor(mut self, factor: u32) -> Self {
        self.deadline_factor = factor;
        self
    }

    /// `0` means check everything
    pub fn with_target(mut self, target: usize) -> Self {
        self.target = (target > 0).then_some(target);
        self
    }

    pub fn with_endpoints(mut self, endpoints: EndpointCatalog) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Outer deadline for a single candidate
    pub fn task_deadline(&self) -> Duration {
        self.timeout
            .checked_mul(self.deadline_factor.max(1))
            .unwrap_or(Duration::MAX)
    }
}

/// Proxy checker for validating proxies
#[derive(Debug, Clone, Default)]
pub struct ProxyChecker {
    config: CheckerConfig,
}

impl ProxyChecker {
    /// Create a new proxy checker with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new proxy checker with custom configuration
    pub fn with_config(config: CheckerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    /// Validator for one run, the protocol strategy is fixed here
    pub fn validator(&self, proxy_type: ProxyType) -> Validator<ProtocolChecker, TcpPrefilter> {
        Validator::new(
            proxy_type,
            ProtocolChecker::for_type(proxy_type),
            TcpPrefilter,
            self.config.endpoints.endpoints_for(proxy_type),
        )
        .with_timeout(self.config.timeout)
        .with_port_timeout(self.config.port_timeout)
    }

    pub fn scheduler(&self) -> Scheduler {
        let scheduler = Scheduler::new()
            .with_batch_size(self.config.batch_size)
            .with_concurrency(self.config.concurrency)
            .with_deadline(self.config.task_deadline())
            .with_target(self.config.target);
        match &self.config.cache {
            Some(cache) => scheduler.with_cache(Arc::clone(cache)),
            None => scheduler,
        }
    }

    /// Check a single proxy
    pub async fn check_proxy(&self, proxy: &str, proxy_type: ProxyType) -> ProxyResult {
        self.scheduler()
            .check_one(&self.validator(proxy_type), proxy)
            .await
    }

    /// Check multiple proxies, reporting every finalized candidate to
    /// `listener`. Returns only the live ones, fastest first.
    pub async fn check_all<L>(
        &self,
        proxies: &[String],
        proxy_type: ProxyType,
        listener: &mut L,
    ) -> Result<Vec<ProxyResult>>
    where
        L: ProgressListener + ?Sized,
    {
        let validator = self.validator(proxy_type);
        self.scheduler().run(&validator, proxies, listener).await
    }

    /// Check multiple proxies without progress reporting
    pub async fn check_proxies(
        &self,
        proxies: &[String],
        proxy_type: ProxyType,
    ) -> Result<Vec<ProxyResult>> {
        self.check_all(proxies, proxy_type, &mut Silent).await
    }

    /// Run the check on a background task and stream progress.
    ///
    /// Events go through an unbounded channel so a slow receiver never holds
    /// up the scheduler. The handle resolves to the live results once the
    /// run is over; dropping the receiver does not stop the run.
    pub fn check_proxies_stream(
        &self,
        proxies: Vec<String>,
        proxy_type: ProxyType,
    ) -> (
        mpsc::UnboundedReceiver<ProgressEvent>,
        JoinHandle<Result<Vec<ProxyResult>>>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let checker = self.clone();

        let handle = tokio::spawn(async move {
            let mut forward = move |checked: usize, total: usize, result: &ProxyResult| {
                let _ = tx.send(ProgressEvent {
                    checked,
                    total,
                    result: result.clone(),
                });
            };
            checker.check_all(&proxies, proxy_type, &mut forward).await
        });

        (rx, handle)
    }
}
