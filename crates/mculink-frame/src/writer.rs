use std::io::{ErrorKind, Write};

use bytes::BytesMut;

use crate::codec::encode_command;
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 256;

/// Writes correlated commands to any `Write` stream.
pub struct CommandWriter<T> {
    inner: T,
    buf: BytesMut,
}

impl<T: Write> CommandWriter<T> {
    /// Create a new command writer.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Encode and write `<correlation_id>:<command>\n` (blocking).
    ///
    /// The whole command is written and flushed before this returns. A write
    /// timeout on the underlying stream surfaces as `FrameError::Io`.
    pub fn send(&mut self, correlation_id: &str, command: &str) -> Result<()> {
        self.buf.clear();
        encode_command(correlation_id, command, &mut self.buf)?;

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// The wrapped stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// The wrapped stream, mutably.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Unwrap the stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn write_single_command() {
        let mut writer = CommandWriter::new(Cursor::new(Vec::<u8>::new()));

        writer.send("1700000000001", "abc").unwrap();

        let wire = writer.into_inner().into_inner();
        assert_eq!(wire, b"1700000000001:abc\n");
    }

    #[test]
    fn write_multiple_commands() {
        let mut writer = CommandWriter::new(Cursor::new(Vec::<u8>::new()));

        writer.send("1", "START_STATE").unwrap();
        writer.send("2", "LED:on\n").unwrap();
        writer.send("3", "STOP_STATE").unwrap();

        let wire = writer.into_inner().into_inner();
        assert_eq!(wire, b"1:START_STATE\n2:LED:on\n3:STOP_STATE\n");
    }

    #[test]
    fn embedded_terminator_writes_nothing() {
        let mut writer = CommandWriter::new(Cursor::new(Vec::<u8>::new()));

        let err = writer.send("1", "two\nlines").unwrap_err();
        assert!(matches!(err, FrameError::EmbeddedTerminator));
        assert!(writer.into_inner().into_inner().is_empty());
    }

    #[test]
    fn flush_propagates() {
        let sink = FlushSpy::default();
        let flag = Arc::clone(&sink.flushed);
        let mut writer = CommandWriter::new(sink);

        writer.send("1", "x").unwrap();

        assert!(flag.load(Ordering::SeqCst));
    }

    #[test]
    fn handles_interrupted_write_and_flush() {
        let writer_impl = InterruptsOnce {
            wrote_once: false,
            flush_interrupted: false,
            data: Vec::new(),
        };

        let mut writer = CommandWriter::new(writer_impl);
        writer.send("5", "retry").unwrap();

        let inner = writer.into_inner();
        assert_eq!(inner.data, b"5:retry\n");
    }

    #[test]
    fn short_writes_are_completed() {
        let mut writer = CommandWriter::new(Dribble { data: Vec::new() });
        writer.send("42", "slow").unwrap();
        assert_eq!(writer.into_inner().data, b"42:slow\n");
    }

    #[test]
    fn write_timeout_surfaces_as_io_error() {
        let mut writer = CommandWriter::new(WouldBlockWriter);
        let err = writer.send("1", "x").unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::WouldBlock));
    }

    #[test]
    fn connection_closed_when_write_returns_zero() {
        let mut writer = CommandWriter::new(ClosedWriter);
        let err = writer.send("1", "x").unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[derive(Default)]
    struct FlushSpy {
        flushed: Arc<AtomicBool>,
        data: Vec<u8>,
    }

    impl Write for FlushSpy {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct InterruptsOnce {
        wrote_once: bool,
        flush_interrupted: bool,
        data: Vec<u8>,
    }

    impl Write for InterruptsOnce {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if !self.wrote_once {
                self.wrote_once = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            if !self.flush_interrupted {
                self.flush_interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            Ok(())
        }
    }

    struct Dribble {
        data: Vec<u8>,
    }

    impl Write for Dribble {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.data.push(buf[0]);
            Ok(1)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct WouldBlockWriter;

    impl Write for WouldBlockWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::WouldBlock))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct ClosedWriter;

    impl Write for ClosedWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
