//! Proxy validation engine
//!
//! This module provides functionality for:
//! - Parsing `host:port` candidates
//! - A TCP prefilter that drops dead sockets cheaply
//! - HTTP/HTTPS, SOCKS4 and SOCKS5 protocol checkers
//! - All-pass, fail-fast validation across several endpoints
//! - Batched scheduling with bounded concurrency and early stop

pub mod aggregator;
pub mod cache;
pub mod checker;
pub mod endpoints;
pub mod models;
pub mod parser;
pub mod prefilter;
pub mod protocol;
pub mod scheduler;
pub mod validator;

pub use aggregator::LiveResults;
pub use cache::{MemoryCache, ResultCache};
pub use checker::{CheckerConfig, ProxyChecker};
pub use endpoints::{EndpointCatalog, ValidationEndpoint};
pub use models::{Candidate, CheckOutcome, ProxyResult, ProxyType};
pub use parser::ProxyParser;
pub use prefilter::{PortProbe, TcpPrefilter};
pub use protocol::{EndpointCheck, HttpChecker, ProtocolChecker, SocksChecker, SocksVersion};
pub use scheduler::{ProgressEvent, ProgressListener, Scheduler, Silent};
pub use validator::Validator;
