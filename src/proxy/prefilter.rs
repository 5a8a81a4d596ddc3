//! TCP reachability prefilter run before any protocol handshake

use std::future::Future;
use std::time::Duration;
use tokio::net::TcpStream;

/// Default timeout for the port check in milliseconds
pub const DEFAULT_PORT_TIMEOUT_MS: u64 = 2000;

/// Decides whether a candidate socket is worth a full protocol probe
pub trait PortProbe {
    fn is_open(&self, host: &str, port: u16, timeout: Duration)
        -> impl Future<Output = bool> + Send;
}

/// Plain TCP connect, the connection is dropped as soon as it is up
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpPrefilter;

impl PortProbe for TcpPrefilter {
    async fn is_open(&self, host: &str, port: u16, timeout: Duration) -> bool {
        matches!(
            tokio::time::timeout(timeout, TcpStream::connect((host, port))).await,
            Ok(Ok(_))
        )
    }
}
