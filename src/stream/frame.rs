use bytes::{Buf, Bytes, BytesMut};

use crate::error::FrameError;

/// Frames are separated by a blank line.
pub const DELIMITER: &[u8] = b"\n\n";

/// One delimiter-bounded unit of the wire stream, still undecoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame(Bytes);

impl Frame {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// True for frames holding nothing but ASCII whitespace.
    pub fn is_blank(&self) -> bool {
        self.0.iter().all(u8::is_ascii_whitespace)
    }
}

impl From<&[u8]> for Frame {
    fn from(bytes: &[u8]) -> Self {
        Frame(Bytes::copy_from_slice(bytes))
    }
}

/// Splits an unbounded byte stream into frames.
///
/// Bytes are buffered as-is and never decoded here, so a multi-byte
/// character split across network reads stays intact until its frame is
/// complete.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: BytesMut,
    /// Offset up to which `buffer` is known not to contain a delimiter start
    scanned: usize,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `chunk` and return every frame it completed, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(pos) = find_delimiter(&self.buffer[self.scanned..]) {
            let end = self.scanned + pos;
            let frame = self.buffer.split_to(end).freeze();
            self.buffer.advance(DELIMITER.len());
            self.scanned = 0;
            frames.push(Frame(frame));
        }

        // A trailing '\n' may be the first half of a delimiter
        self.scanned = self.buffer.len().saturating_sub(DELIMITER.len() - 1);
        frames
    }

    /// Number of buffered bytes not yet part of a complete frame.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Signal end of stream. Fails if an unterminated frame is left over;
    /// trailing whitespace alone is not a frame.
    pub fn flush(&mut self) -> Result<(), FrameError> {
        let pending = self.buffer.len();
        let blank = self.buffer.iter().all(u8::is_ascii_whitespace);
        self.buffer.clear();
        self.scanned = 0;
        if blank {
            Ok(())
        } else {
            Err(FrameError::Truncated { pending })
        }
    }
}

fn find_delimiter(haystack: &[u8]) -> Option<usize> {
    haystack
        .windows(DELIMITER.len())
        .position(|window| window == DELIMITER)
}
