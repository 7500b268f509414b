//! Opening TCP and TLS connections to an IRC server.

use std::time::Duration;

use tokio::net::{TcpStream, lookup_host};
use tokio::time::timeout;
use tokio_native_tls::{TlsConnector, native_tls};
use tracing::{debug, info};

use chaskis_core::{IrcConfig, TransportError, TransportResult};

use crate::lines::{BoxedStream, LineReader, LineWriter, split_lines};

/// Default timeout for DNS, TCP connect and the TLS handshake combined.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Where and how to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Server host name or address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Wrap the TCP stream in TLS.
    pub use_tls: bool,
    /// Upper bound on the whole connect sequence.
    pub connect_timeout: Duration,
    /// Skip certificate validation. Only for test networks.
    pub accept_invalid_certs: bool,
}

impl TransportConfig {
    /// Creates a plain-text configuration.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            use_tls: false,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            accept_invalid_certs: false,
        }
    }

    /// Enables or disables TLS.
    pub fn with_tls(mut self, use_tls: bool) -> Self {
        self.use_tls = use_tls;
        self
    }

    /// Sets the connect timeout.
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Returns `host:port`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl From<&IrcConfig> for TransportConfig {
    fn from(config: &IrcConfig) -> Self {
        Self::new(config.server.clone(), config.port).with_tls(config.use_ssl)
    }
}

/// Resolves, connects and (optionally) negotiates TLS.
pub async fn connect(config: &TransportConfig) -> TransportResult<(LineReader, LineWriter)> {
    let addr = config.address();

    let stream = match timeout(config.connect_timeout, open(config)).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(TransportError::ConnectionFailed {
                addr,
                reason: format!("timed out after {:?}", config.connect_timeout),
            });
        }
    };

    info!(addr = %addr, tls = config.use_tls, "Connected to IRC server");
    Ok(split_lines(stream, addr))
}

async fn open(config: &TransportConfig) -> TransportResult<BoxedStream> {
    let addr = config.address();

    let resolved: Vec<_> = lookup_host(&addr)
        .await
        .map_err(|e| TransportError::Dns {
            host: config.host.clone(),
            reason: e.to_string(),
        })?
        .collect();
    if resolved.is_empty() {
        return Err(TransportError::Dns {
            host: config.host.clone(),
            reason: "no addresses found".into(),
        });
    }
    debug!(host = %config.host, addresses = resolved.len(), "Resolved server");

    let mut last_error = None;
    let mut tcp = None;
    for candidate in resolved {
        match TcpStream::connect(candidate).await {
            Ok(stream) => {
                tcp = Some(stream);
                break;
            }
            Err(e) => {
                debug!(addr = %candidate, error = %e, "Connect attempt failed");
                last_error = Some(e);
            }
        }
    }
    let tcp = tcp.ok_or_else(|| TransportError::ConnectionFailed {
        addr: addr.clone(),
        reason: last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unreachable".into()),
    })?;
    // Lines are small and latency matters more than throughput.
    let _ = tcp.set_nodelay(true);

    if !config.use_tls {
        return Ok(Box::new(tcp));
    }

    let tls_error = |e: native_tls::Error| TransportError::Tls {
        host: config.host.clone(),
        reason: e.to_string(),
    };
    let connector = native_tls::TlsConnector::builder()
        .danger_accept_invalid_certs(config.accept_invalid_certs)
        .build()
        .map_err(tls_error)?;
    let tls = TlsConnector::from(connector)
        .connect(&config.host, tcp)
        .await
        .map_err(tls_error)?;

    Ok(Box::new(tls))
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    use super::*;

    #[tokio::test]
    async fn connects_and_exchanges_lines() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let (read, mut write) = socket.into_split();
            let mut lines = BufReader::new(read).lines();
            let received = lines.next_line().await.unwrap();
            write.write_all(b"PING :srv\r\n").await.unwrap();
            received
        });

        let config = TransportConfig::new("127.0.0.1", port);
        let (mut reader, mut writer) = connect(&config).await.unwrap();
        writer.write_line("NICK chaskis").await.unwrap();

        assert_eq!(reader.read_line().await.unwrap().as_deref(), Some("PING :srv"));
        assert_eq!(server.await.unwrap().as_deref(), Some("NICK chaskis"));
    }

    #[tokio::test]
    async fn refused_connection_is_reported() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = connect(&TransportConfig::new("127.0.0.1", port))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, TransportError::ConnectionFailed { .. }));
    }

    #[test]
    fn config_from_irc_config() {
        let mut irc = IrcConfig::new("irc.example.net", "bot").with_port(6697);
        irc.use_ssl = true;

        let config = TransportConfig::from(&irc);
        assert_eq!(config.address(), "irc.example.net:6697");
        assert!(config.use_tls);
    }
}
