//! SOCKS4 and SOCKS5 CONNECT handshakes
//!
//! Only the handshake is performed: a granted CONNECT is enough to prove the
//! proxy relays, no payload is sent to the destination afterwards.

use crate::error::ProtocolError;
use crate::proxy::endpoints::ValidationEndpoint;
use crate::proxy::models::{Candidate, CheckOutcome};
use crate::proxy::protocol::EndpointCheck;
use std::net::{SocketAddr, SocketAddrV4};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{lookup_host, TcpStream};
use tracing::debug;

const SOCKS4_VERSION: u8 = 0x04;
const SOCKS5_VERSION: u8 = 0x05;
const CMD_CONNECT: u8 = 0x01;
const SOCKS4_GRANTED: u8 = 0x5A;
const SOCKS5_NO_AUTH: u8 = 0x00;
const SOCKS5_SUCCEEDED: u8 = 0x00;
const SOCKS5_ATYP_IPV4: u8 = 0x01;

const SOCKS4_REPLY_LEN: usize = 8;
const SOCKS5_REPLY_MAX: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocksVersion {
    V4,
    V5,
}

/// Raw-socket SOCKS checker
#[derive(Debug, Clone)]
pub struct SocksChecker {
    pub version: SocksVersion,
}

impl SocksChecker {
    pub fn new(version: SocksVersion) -> Self {
        Self { version }
    }

    async fn probe(
        &self,
        candidate: &Candidate,
        endpoint: &ValidationEndpoint,
        timeout: Duration,
    ) -> Result<(), ProtocolError> {
        let ValidationEndpoint::Socks { host, port } = endpoint else {
            return Err(ProtocolError::EndpointMismatch(endpoint.to_string()));
        };

        let dest = resolve_ipv4(host, *port, timeout).await?;

        let mut stream = match tokio::time::timeout(
            timeout,
            TcpStream::connect((candidate.host.as_str(), candidate.port)),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(ProtocolError::Connect(e.to_string())),
            Err(_) => return Err(ProtocolError::Timeout("connect")),
        };

        match self.version {
            SocksVersion::V4 => socks4_handshake(&mut stream, dest, timeout).await,
            SocksVersion::V5 => socks5_handshake(&mut stream, dest, timeout).await,
        }
    }
}

impl EndpointCheck for SocksChecker {
    async fn check(
        &self,
        candidate: &Candidate,
        endpoint: &ValidationEndpoint,
        timeout: Duration,
    ) -> CheckOutcome {
        let start = Instant::now();
        match self.probe(candidate, endpoint, timeout).await {
            Ok(()) => CheckOutcome::passed(start.elapsed(), None),
            Err(e) => {
                debug!("{} via {}: {}", candidate, endpoint, e);
                CheckOutcome::failed(start.elapsed(), e)
            }
        }
    }
}

/// Resolve a CONNECT destination without blocking the runtime.
///
/// Both wire formats used here only carry IPv4, so the first IPv4 record
/// wins and a host with only IPv6 records is a resolution failure.
pub async fn resolve_ipv4(
    host: &str,
    port: u16,
    timeout: Duration,
) -> Result<SocketAddrV4, ProtocolError> {
    let addrs = match tokio::time::timeout(timeout, lookup_host((host, port))).await {
        Ok(Ok(addrs)) => addrs,
        Ok(Err(e)) => {
            return Err(ProtocolError::Resolve {
                host: host.to_string(),
                reason: e.to_string(),
            })
        }
        Err(_) => return Err(ProtocolError::Timeout("resolve")),
    };

    addrs
        .filter_map(|addr| match addr {
            SocketAddr::V4(v4) => Some(v4),
            SocketAddr::V6(_) => None,
        })
        .next()
        .ok_or_else(|| ProtocolError::Resolve {
            host: host.to_string(),
            reason: "no IPv4 address".to_string(),
        })
}

/// `[0x04, 0x01, port(2, BE), ip(4), 0x00]`, then an 8 byte reply whose
/// second byte must be `0x5A`
pub async fn socks4_handshake<S>(
    stream: &mut S,
    dest: SocketAddrV4,
    timeout: Duration,
) -> Result<(), ProtocolError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut request = Vec::with_capacity(9);
    request.extend_from_slice(&[SOCKS4_VERSION, CMD_CONNECT]);
    request.extend_from_slice(&dest.port().to_be_bytes());
    request.extend_from_slice(&dest.ip().octets());
    request.push(0x00);
    write_all(stream, &request, timeout, "socks4 request").await?;

    let mut reply = [0u8; SOCKS4_REPLY_LEN];
    read_at_least(stream, &mut reply, SOCKS4_REPLY_LEN, timeout, "socks4 reply").await?;

    match reply[1] {
        SOCKS4_GRANTED => Ok(()),
        code => Err(ProtocolError::Socks4Rejected(code)),
    }
}

/// No-auth greeting followed by an IPv4 CONNECT
pub async fn socks5_handshake<S>(
    stream: &mut S,
    dest: SocketAddrV4,
    timeout: Duration,
) -> Result<(), ProtocolError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    write_all(
        stream,
        &[SOCKS5_VERSION, 0x01, SOCKS5_NO_AUTH],
        timeout,
        "socks5 greeting",
    )
    .await?;

    let mut choice = [0u8; 2];
    read_at_least(stream, &mut choice, 2, timeout, "socks5 method").await?;
    if choice[0] != SOCKS5_VERSION {
        return Err(ProtocolError::BadVersion(choice[0]));
    }
    if choice[1] != SOCKS5_NO_AUTH {
        return Err(ProtocolError::UnsupportedMethod(choice[1]));
    }

    let mut request = Vec::with_capacity(10);
    request.extend_from_slice(&[SOCKS5_VERSION, CMD_CONNECT, 0x00, SOCKS5_ATYP_IPV4]);
    request.extend_from_slice(&dest.ip().octets());
    request.extend_from_slice(&dest.port().to_be_bytes());
    write_all(stream, &request, timeout, "socks5 connect").await?;

    // the bound address that follows varies in length, the status byte is all we need
    let mut reply = [0u8; SOCKS5_REPLY_MAX];
    read_at_least(stream, &mut reply, 2, timeout, "socks5 reply").await?;

    match reply[1] {
        SOCKS5_SUCCEEDED => Ok(()),
        code => Err(ProtocolError::Socks5Rejected(code)),
    }
}

async fn write_all<S>(
    stream: &mut S,
    bytes: &[u8],
    timeout: Duration,
    stage: &'static str,
) -> Result<(), ProtocolError>
where
    S: AsyncWrite + Unpin,
{
    let write = async {
        stream.write_all(bytes).await?;
        stream.flush().await
    };
    match tokio::time::timeout(timeout, write).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(ProtocolError::Timeout(stage)),
    }
}

/// Fill `buf` until at least `min` bytes arrived. EOF before that is a short
/// reply; the whole read shares one deadline.
async fn read_at_least<S>(
    stream: &mut S,
    buf: &mut [u8],
    min: usize,
    timeout: Duration,
    stage: &'static str,
) -> Result<usize, ProtocolError>
where
    S: AsyncRead + Unpin,
{
    let read = async {
        let mut filled = 0;
        while filled < min {
            let n = stream.read(&mut buf[filled..]).await?;
            if n == 0 {
                return Err(ProtocolError::ShortReply {
                    expected: min,
                    got: filled,
                });
            }
            filled += n;
        }
        Ok(filled)
    };
    match tokio::time::timeout(timeout, read).await {
        Ok(result) => result,
        Err(_) => Err(ProtocolError::Timeout(stage)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use tokio::io::duplex;
    use tokio::net::TcpListener;

    const TIMEOUT: Duration = Duration::from_millis(500);

    fn dest() -> SocketAddrV4 {
        SocketAddrV4::new(Ipv4Addr::new(104, 16, 185, 241), 80)
    }

    #[tokio::test]
    async fn test_socks4_granted() {
        let (mut client, mut server) = duplex(64);
        let fake = tokio::spawn(async move {
            let mut request = [0u8; 9];
            server.read_exact(&mut request).await.unwrap();
            server
                .write_all(&[0x00, 0x5A, 0, 0, 0, 0, 0, 0])
                .await
                .unwrap();
            request
        });

        socks4_handshake(&mut client, dest(), TIMEOUT).await.unwrap();
        let request = fake.await.unwrap();
        assert_eq!(request, [0x04, 0x01, 0x00, 0x50, 104, 16, 185, 241, 0x00]);
    }

    #[tokio::test]
    async fn test_socks4_rejected() {
        let (mut client, mut server) = duplex(64);
        tokio::spawn(async move {
            let mut request = [0u8; 9];
            server.read_exact(&mut request).await.unwrap();
            server
                .write_all(&[0x00, 0x5B, 0, 0, 0, 0, 0, 0])
                .await
                .unwrap();
        });

        let err = socks4_handshake(&mut client, dest(), TIMEOUT)
            .await
            .unwrap_err();
        assert_eq!(err, ProtocolError::Socks4Rejected(0x5B));
    }

    #[tokio::test]
    async fn test_socks4_closed_early() {
        let (mut client, mut server) = duplex(64);
        tokio::spawn(async move {
            let mut request = [0u8; 9];
            server.read_exact(&mut request).await.unwrap();
            server.write_all(&[0x00, 0x5A]).await.unwrap();
        });

        let err = socks4_handshake(&mut client, dest(), TIMEOUT)
            .await
            .unwrap_err();
        assert_eq!(err, ProtocolError::ShortReply { expected: 8, got: 2 });
    }

    #[tokio::test]
    async fn test_socks4_silent_server_times_out() {
        let (mut client, _server) = duplex(64);

        let start = Instant::now();
        let err = socks4_handshake(&mut client, dest(), Duration::from_millis(100))
            .await
            .unwrap_err();
        assert_eq!(err, ProtocolError::Timeout("socks4 reply"));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_socks5_success() {
        let (mut client, mut server) = duplex(64);
        let fake = tokio::spawn(async move {
            let mut greeting = [0u8; 3];
            server.read_exact(&mut greeting).await.unwrap();
            server.write_all(&[0x05, 0x00]).await.unwrap();

            let mut request = [0u8; 10];
            server.read_exact(&mut request).await.unwrap();
            server
                .write_all(&[0x05, 0x00, 0x00, 0x01, 0, 0, 0, 0, 0, 0])
                .await
                .unwrap();
            (greeting, request)
        });

        socks5_handshake(&mut client, dest(), TIMEOUT).await.unwrap();
        let (greeting, request) = fake.await.unwrap();
        assert_eq!(greeting, [0x05, 0x01, 0x00]);
        assert_eq!(
            request,
            [0x05, 0x01, 0x00, 0x01, 104, 16, 185, 241, 0x00, 0x50]
        );
    }

    #[tokio::test]
    async fn test_socks5_auth_required() {
        let (mut client, mut server) = duplex(64);
        tokio::spawn(async move {
            let mut greeting = [0u8; 3];
            server.read_exact(&mut greeting).await.unwrap();
            server.write_all(&[0x05, 0x02]).await.unwrap();
        });

        let err = socks5_handshake(&mut client, dest(), TIMEOUT)
            .await
            .unwrap_err();
        assert_eq!(err, ProtocolError::UnsupportedMethod(0x02));
    }

    #[tokio::test]
    async fn test_socks5_connect_refused() {
        let (mut client, mut server) = duplex(64);
        tokio::spawn(async move {
            let mut greeting = [0u8; 3];
            server.read_exact(&mut greeting).await.unwrap();
            server.write_all(&[0x05, 0x00]).await.unwrap();

            let mut request = [0u8; 10];
            server.read_exact(&mut request).await.unwrap();
            server
                .write_all(&[0x05, 0x05, 0x00, 0x01, 0, 0, 0, 0, 0, 0])
                .await
                .unwrap();
        });

        let err = socks5_handshake(&mut client, dest(), TIMEOUT)
            .await
            .unwrap_err();
        assert_eq!(err, ProtocolError::Socks5Rejected(0x05));
    }

    #[tokio::test]
    async fn test_socks5_wrong_version() {
        let (mut client, mut server) = duplex(64);
        tokio::spawn(async move {
            let mut greeting = [0u8; 3];
            server.read_exact(&mut greeting).await.unwrap();
            server.write_all(&[0x04, 0x00]).await.unwrap();
        });

        let err = socks5_handshake(&mut client, dest(), TIMEOUT)
            .await
            .unwrap_err();
        assert_eq!(err, ProtocolError::BadVersion(0x04));
    }

    #[tokio::test]
    async fn test_resolve_literal() {
        let addr = resolve_ipv4("127.0.0.1", 80, TIMEOUT).await.unwrap();
        assert_eq!(addr, SocketAddrV4::new(Ipv4Addr::LOCALHOST, 80));
    }

    #[tokio::test]
    async fn test_checker_against_fake_socks4_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 9];
            socket.read_exact(&mut request).await.unwrap();
            socket
                .write_all(&[0x00, 0x5A, 0, 0, 0, 0, 0, 0])
                .await
                .unwrap();
        });

        let checker = SocksChecker::new(SocksVersion::V4);
        let candidate = Candidate::new("127.0.0.1", port, crate::ProxyType::Socks4);
        let outcome = checker
            .check(&candidate, &ValidationEndpoint::socks("127.0.0.1", 80), TIMEOUT)
            .await;

        assert!(outcome.success);
        assert!(outcome.identifier.is_none());
        assert!(outcome.failure.is_none());
    }

    #[tokio::test]
    async fn test_checker_against_fake_socks5_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let fake = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut greeting = [0u8; 3];
            socket.read_exact(&mut greeting).await.unwrap();
            socket.write_all(&[0x05, 0x00]).await.unwrap();

            let mut request = [0u8; 10];
            socket.read_exact(&mut request).await.unwrap();
            socket
                .write_all(&[0x05, 0x00, 0x00, 0x01, 127, 0, 0, 1, 0x1F, 0x90])
                .await
                .unwrap();
            request
        });

        let checker = SocksChecker::new(SocksVersion::V5);
        let candidate = Candidate::new("127.0.0.1", port, crate::ProxyType::Socks5);
        let outcome = checker
            .check(&candidate, &ValidationEndpoint::socks("127.0.0.1", 443), TIMEOUT)
            .await;

        assert!(outcome.success, "{:?}", outcome.failure);
        assert!(outcome.identifier.is_none());
        let request = fake.await.unwrap();
        assert_eq!(request, [0x05, 0x01, 0x00, 0x01, 127, 0, 0, 1, 0x01, 0xBB]);
    }

    #[tokio::test]
    async fn test_socks5_silent_server_times_out() {
        let (mut client, _server) = duplex(64);

        let start = Instant::now();
        let err = socks5_handshake(&mut client, dest(), Duration::from_millis(100))
            .await
            .unwrap_err();
        assert_eq!(err, ProtocolError::Timeout("socks5 method"));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_checker_against_silent_socks5_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let _hold = tokio::spawn(async move {
            let mut sockets = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                sockets.push(socket);
            }
        });

        let checker = SocksChecker::new(SocksVersion::V5);
        let candidate = Candidate::new("127.0.0.1", port, crate::ProxyType::Socks5);
        let start = Instant::now();
        let outcome = checker
            .check(
                &candidate,
                &ValidationEndpoint::socks("127.0.0.1", 80),
                Duration::from_millis(150),
            )
            .await;

        assert!(!outcome.success);
        assert_eq!(outcome.failure, Some(ProtocolError::Timeout("socks5 method")));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_checker_rejects_url_endpoint() {
        let checker = SocksChecker::new(SocksVersion::V5);
        let candidate = Candidate::new("127.0.0.1", 1, crate::ProxyType::Socks5);
        let outcome = checker
            .check(&candidate, &ValidationEndpoint::url("http://ip.me"), TIMEOUT)
            .await;

        assert!(!outcome.success);
        assert_eq!(
            outcome.failure,
            Some(ProtocolError::EndpointMismatch("http://ip.me".to_string()))
        );
    }
}
