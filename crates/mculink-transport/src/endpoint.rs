use std::fmt;
use std::net::TcpStream;
use std::path::PathBuf;
use std::str::FromStr;

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::LinkStream;

/// Where a device link can be reached.
///
/// Accepted forms:
/// - `unix:/run/mcu.sock`: Unix domain socket
/// - `tcp:192.168.4.1:2000`: TCP serial bridge
/// - `/run/mcu.sock`: bare path, treated as a Unix domain socket
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Unix(PathBuf),
    Tcp(String),
}

impl Endpoint {
    /// Parse an endpoint string.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(TransportError::InvalidEndpoint(input.to_string()));
        }

        if let Some(path) = input.strip_prefix("unix:") {
            if path.is_empty() {
                return Err(TransportError::InvalidEndpoint(input.to_string()));
            }
            return Ok(Self::Unix(PathBuf::from(path)));
        }

        if let Some(addr) = input.strip_prefix("tcp:") {
            // host:port, the port must be numeric
            let valid = addr
                .rsplit_once(':')
                .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok());
            if !valid {
                return Err(TransportError::InvalidEndpoint(input.to_string()));
            }
            return Ok(Self::Tcp(addr.to_string()));
        }

        if input.contains("://") {
            return Err(TransportError::InvalidEndpoint(input.to_string()));
        }

        Ok(Self::Unix(PathBuf::from(input)))
    }

    /// Connect to this endpoint (blocking).
    pub fn connect(&self) -> Result<LinkStream> {
        match self {
            #[cfg(unix)]
            Self::Unix(path) => crate::uds::UnixDomainSocket::connect(path),
            #[cfg(not(unix))]
            Self::Unix(path) => Err(TransportError::Connect {
                endpoint: self.to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::Unsupported,
                    format!(
                        "unix domain sockets are not available on this platform: {}",
                        path.display()
                    ),
                ),
            }),
            Self::Tcp(addr) => {
                let stream = TcpStream::connect(addr).map_err(|e| TransportError::Connect {
                    endpoint: self.to_string(),
                    source: e,
                })?;
                // Commands are tiny; don't let Nagle hold them back.
                stream.set_nodelay(true)?;
                debug!(%addr, "connected to tcp serial bridge");
                Ok(LinkStream::from_tcp(stream))
            }
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix(path) => write!(f, "unix:{}", path.display()),
            Self::Tcp(addr) => write!(f, "tcp:{addr}"),
        }
    }
}

impl FromStr for Endpoint {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
