use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

use crate::error::Result;

/// A readable and writable byte stream to a device.
///
/// The session splits a `Duplex` into two handles with [`Duplex::try_clone`]:
/// the reader thread owns one and blocks in `read`, the sender side writes
/// through the other. [`Duplex::shutdown`] must make that blocked `read`
/// return so the reader thread can exit.
pub trait Duplex: Read + Write + Send + 'static {
    /// Create a second handle to the same underlying stream.
    fn try_clone(&self) -> Result<Self>
    where
        Self: Sized;

    /// Shut down both directions of the stream.
    fn shutdown(&self) -> Result<()>;

    /// Bound how long a single `write` may block. `None` blocks forever.
    ///
    /// The timeout is a property of the stream, so it covers every handle
    /// cloned from it. An expired write fails with `WouldBlock` or `TimedOut`.
    fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()>;
}

#[cfg(unix)]
impl Duplex for std::os::unix::net::UnixStream {
    fn try_clone(&self) -> Result<Self> {
        Ok(std::os::unix::net::UnixStream::try_clone(self)?)
    }

    fn shutdown(&self) -> Result<()> {
        shutdown_ignoring_not_connected(std::os::unix::net::UnixStream::shutdown(
            self,
            Shutdown::Both,
        ))
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        Ok(std::os::unix::net::UnixStream::set_write_timeout(self, timeout)?)
    }
}

impl Duplex for TcpStream {
    fn try_clone(&self) -> Result<Self> {
        Ok(TcpStream::try_clone(self)?)
    }

    fn shutdown(&self) -> Result<()> {
        shutdown_ignoring_not_connected(TcpStream::shutdown(self, Shutdown::Both))
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        Ok(TcpStream::set_write_timeout(self, timeout)?)
    }
}

// A peer that already hung up leaves nothing to shut down.
fn shutdown_ignoring_not_connected(result: std::io::Result<()>) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotConnected => Ok(()),
        Err(err) => Err(err.into()),
    }
}

/// A connected device link implementing [`Duplex`].
///
/// This is the stream type returned by [`crate::Endpoint::connect`].
/// It wraps either a Unix domain socket or a TCP connection to a serial bridge.
pub struct LinkStream {
    inner: LinkStreamInner,
}

enum LinkStreamInner {
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
    Tcp(TcpStream),
}

impl Read for LinkStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            LinkStreamInner::Unix(stream) => stream.read(buf),
            LinkStreamInner::Tcp(stream) => stream.read(buf),
        }
    }
}

impl Write for LinkStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            LinkStreamInner::Unix(stream) => stream.write(buf),
            LinkStreamInner::Tcp(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            #[cfg(unix)]
            LinkStreamInner::Unix(stream) => stream.flush(),
            LinkStreamInner::Tcp(stream) => stream.flush(),
        }
    }
}

impl Duplex for LinkStream {
    fn try_clone(&self) -> Result<Self> {
        let inner = match &self.inner {
            #[cfg(unix)]
            LinkStreamInner::Unix(stream) => LinkStreamInner::Unix(Duplex::try_clone(stream)?),
            LinkStreamInner::Tcp(stream) => LinkStreamInner::Tcp(Duplex::try_clone(stream)?),
        };
        Ok(Self { inner })
    }

    fn shutdown(&self) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            LinkStreamInner::Unix(stream) => Duplex::shutdown(stream),
            LinkStreamInner::Tcp(stream) => Duplex::shutdown(stream),
        }
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            LinkStreamInner::Unix(stream) => Duplex::set_write_timeout(stream, timeout),
            LinkStreamInner::Tcp(stream) => Duplex::set_write_timeout(stream, timeout),
        }
    }
}

impl LinkStream {
    /// Wrap a connected Unix domain socket stream.
    #[cfg(unix)]
    pub fn from_unix(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: LinkStreamInner::Unix(stream),
        }
    }

    /// Wrap a connected TCP stream.
    pub fn from_tcp(stream: TcpStream) -> Self {
        Self {
            inner: LinkStreamInner::Tcp(stream),
        }
    }

    /// Short transport name for diagnostics.
    pub fn kind(&self) -> &'static str {
        match &self.inner {
            #[cfg(unix)]
            LinkStreamInner::Unix(_) => "unix",
            LinkStreamInner::Tcp(_) => "tcp",
        }
    }
}

impl std::fmt::Debug for LinkStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkStream")
            .field("type", &self.kind())
            .finish()
    }
}
