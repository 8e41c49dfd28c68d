use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::trace;

use crate::error::{FrameError, Result};

/// Frame terminator: a single newline byte.
pub const TERMINATOR: u8 = b'\n';

/// Field separator inside a frame.
pub const SEPARATOR: u8 = b':';

/// Default maximum frame length (excluding terminator): 64 KiB.
pub const DEFAULT_MAX_FRAME_LEN: usize = 64 * 1024;

/// Default number of bytes requested from the transport per read.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 1024;

/// Configuration for frame assembly.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum frame length in bytes. Default: 64 KiB.
    pub max_frame_len: usize,
    /// Bytes requested from the stream per read. Default: 1 KiB.
    pub read_chunk_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
        }
    }
}

/// Reassembles newline-terminated frames from arbitrarily sized chunks.
///
/// Bytes after the last terminator are carried over to the next call, so a
/// frame split across reads comes out whole. Chunk boundaries never change
/// the resulting frame sequence.
#[derive(Debug)]
pub struct FrameAssembler {
    buf: BytesMut,
    /// Offset up to which `buf` is known to hold no terminator.
    scanned: usize,
    /// Set after an oversized frame was reported; bytes are dropped until
    /// the next terminator.
    discarding: bool,
    max_frame_len: usize,
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_LEN)
    }
}

impl FrameAssembler {
    /// Create an assembler that rejects frames longer than `max_frame_len`.
    pub fn new(max_frame_len: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            scanned: 0,
            discarding: false,
            max_frame_len,
        }
    }

    /// Append a chunk and iterate over the frames it completes.
    ///
    /// The iterator is lazy: frames it does not yield stay buffered and come
    /// out of the next `push` or [`FrameAssembler::next_frame`].
    pub fn push(&mut self, chunk: &[u8]) -> Frames<'_> {
        self.extend(chunk);
        Frames { assembler: self }
    }

    /// Append a chunk without draining any frames.
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Take the next complete frame out of the buffer, if there is one.
    ///
    /// Yields `Err(FrameError::FrameTooLong)` once per oversized frame; the
    /// rest of that frame is discarded up to its terminator.
    pub fn next_frame(&mut self) -> Option<Result<Bytes>> {
        loop {
            let found = self.buf[self.scanned..]
                .iter()
                .position(|&b| b == TERMINATOR)
                .map(|pos| self.scanned + pos);

            let Some(end) = found else {
                self.scanned = self.buf.len();
                if self.discarding {
                    self.buf.clear();
                    self.scanned = 0;
                    return None;
                }
                if self.buf.len() > self.max_frame_len {
                    let len = self.buf.len();
                    self.buf.clear();
                    self.scanned = 0;
                    self.discarding = true;
                    return Some(Err(FrameError::FrameTooLong {
                        len,
                        max: self.max_frame_len,
                    }));
                }
                return None;
            };

            let frame = self.buf.split_to(end).freeze();
            self.buf.advance(1);
            self.scanned = 0;

            if self.discarding {
                self.discarding = false;
                trace!(dropped = frame.len(), "resynchronised after oversized frame");
                continue;
            }

            if frame.len() > self.max_frame_len {
                return Some(Err(FrameError::FrameTooLong {
                    len: frame.len(),
                    max: self.max_frame_len,
                }));
            }

            return Some(Ok(frame));
        }
    }

    /// Number of buffered bytes not yet part of a complete frame.
    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }

    /// Drop any buffered partial frame.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.scanned = 0;
        self.discarding = false;
    }
}

/// Lazy iterator over the frames completed by [`FrameAssembler::push`].
#[derive(Debug)]
pub struct Frames<'a> {
    assembler: &'a mut FrameAssembler,
}

impl Iterator for Frames<'_> {
    type Item = Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        self.assembler.next_frame()
    }
}

/// Encode an outbound command into the wire format.
///
/// Wire format:
/// ```text
/// <correlation id>:<command>\n
/// ```
/// The terminator is appended unless `command` already ends with it.
pub fn encode_command(correlation_id: &str, command: &str, dst: &mut BytesMut) -> Result<()> {
    let body = command
        .strip_suffix(TERMINATOR as char)
        .unwrap_or(command)
        .as_bytes();
    if body.contains(&TERMINATOR) {
        return Err(FrameError::EmbeddedTerminator);
    }

    dst.reserve(correlation_id.len() + body.len() + 2);
    dst.put_slice(correlation_id.as_bytes());
    dst.put_u8(SEPARATOR);
    dst.put_slice(body);
    dst.put_u8(TERMINATOR);
    Ok(())
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn collect(assembler: &mut FrameAssembler, chunk: &[u8]) -> Vec<Bytes> {
        assembler
            .push(chunk)
            .map(|frame| frame.expect("frame should assemble"))
            .collect()
    }

    #[test]
    fn single_chunk_many_frames() {
        let mut assembler = FrameAssembler::default();
        let frames = collect(&mut assembler, b"S:1\nS:2\nR:7:ok\n");
        assert_eq!(frames, vec!["S:1", "S:2", "R:7:ok"]);
        assert_eq!(assembler.pending_len(), 0);
    }

    #[test]
    fn partial_frame_is_carried_over() {
        let mut assembler = FrameAssembler::default();
        assert!(collect(&mut assembler, b"R:12").is_empty());
        assert_eq!(assembler.pending_len(), 4);

        let frames = collect(&mut assembler, b"3:done\nS:");
        assert_eq!(frames, vec!["R:123:done"]);
        assert_eq!(assembler.pending_len(), 2);

        let frames = collect(&mut assembler, b"9\n");
        assert_eq!(frames, vec!["S:9"]);
    }

    #[test]
    fn empty_frames_are_yielded() {
        let mut assembler = FrameAssembler::default();
        let frames = collect(&mut assembler, b"\n\nS:1\n");
        assert_eq!(frames, vec!["", "", "S:1"]);
    }

    #[test]
    fn undrained_frames_stay_buffered() {
        let mut assembler = FrameAssembler::default();
        let first = assembler.push(b"S:1\nS:2\n").next().unwrap().unwrap();
        assert_eq!(first, "S:1");

        let rest = collect(&mut assembler, b"S:3\n");
        assert_eq!(rest, vec!["S:2", "S:3"]);
    }

    #[test]
    fn oversized_frame_is_reported_once_and_skipped() {
        let mut assembler = FrameAssembler::new(4);

        let mut results = assembler.push(b"S:123456").collect::<Vec<_>>();
        assert_eq!(results.len(), 1);
        assert!(matches!(
            results.remove(0),
            Err(FrameError::FrameTooLong { len: 8, max: 4 })
        ));

        // Tail of the oversized frame is dropped, the stream resynchronises.
        let frames = collect(&mut assembler, b"789\nS:1\n");
        assert_eq!(frames, vec!["S:1"]);
    }

    #[test]
    fn oversized_complete_frame_is_rejected() {
        let mut assembler = FrameAssembler::new(4);
        let results = assembler.push(b"S:123456\nS:1\n").collect::<Vec<_>>();
        assert_eq!(results.len(), 2);
        assert!(matches!(results[0], Err(FrameError::FrameTooLong { .. })));
        assert_eq!(results[1].as_ref().unwrap(), "S:1");
    }

    #[test]
    fn clear_drops_partial_frame() {
        let mut assembler = FrameAssembler::default();
        assert!(collect(&mut assembler, b"S:partial").is_empty());
        assembler.clear();
        assert_eq!(collect(&mut assembler, b"S:1\n"), vec!["S:1"]);
    }

    #[test]
    fn encode_appends_terminator() {
        let mut buf = BytesMut::new();
        encode_command("1700000000000", "abc", &mut buf).unwrap();
        assert_eq!(buf.as_ref(), b"1700000000000:abc\n");
    }

    #[test]
    fn encode_keeps_existing_terminator() {
        let mut buf = BytesMut::new();
        encode_command("5", "START_STATE\n", &mut buf).unwrap();
        assert_eq!(buf.as_ref(), b"5:START_STATE\n");
    }

    #[test]
    fn encode_rejects_embedded_terminator() {
        let mut buf = BytesMut::new();
        let result = encode_command("5", "a\nb", &mut buf);
        assert!(matches!(result, Err(FrameError::EmbeddedTerminator)));
        assert!(buf.is_empty());
    }

    #[test]
    fn encode_allows_separator_in_command() {
        let mut buf = BytesMut::new();
        encode_command("5", "SET:led:on", &mut buf).unwrap();
        assert_eq!(buf.as_ref(), b"5:SET:led:on\n");
    }

    proptest! {
        #[test]
        fn chunking_does_not_change_frames(
            frames in prop::collection::vec("[A-Za-z0-9:]{0,24}", 0..16),
            cuts in prop::collection::vec(1usize..8, 1..64),
        ) {
            let mut wire = Vec::new();
            for frame in &frames {
                wire.extend_from_slice(frame.as_bytes());
                wire.push(TERMINATOR);
            }
            wire.extend_from_slice(b"S:tail");

            let mut whole = FrameAssembler::default();
            let expected = collect(&mut whole, &wire);

            let mut chunked = FrameAssembler::default();
            let mut actual = Vec::new();
            let mut offset = 0;
            let mut cut = cuts.iter().cycle();
            while offset < wire.len() {
                let len = (*cut.next().unwrap()).min(wire.len() - offset);
                actual.extend(collect(&mut chunked, &wire[offset..offset + len]));
                offset += len;
            }

            prop_assert_eq!(&actual, &expected);
            prop_assert_eq!(actual.len(), frames.len());
            prop_assert_eq!(chunked.pending_len(), whole.pending_len());
        }
    }
}
