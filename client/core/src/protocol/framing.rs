//! Frame Decoder
//!
//! Turns arbitrarily chunked bytes into [`StreamEvent`]s.
//!
//! Chunk boundaries never line up with frame boundaries, so the decoder keeps
//! a byte buffer: every `\n`-terminated line is complete and gets decoded; the
//! trailing segment stays buffered until the rest of it arrives. Lines are
//! split on raw bytes before UTF-8 decoding, so a multi-byte character split
//! across two chunks is reassembled before it is looked at.

use super::event::StreamEvent;

/// Prefix marking a significant line
pub const DATA_PREFIX: &str = "data: ";

/// Incremental `data: <json>` line decoder
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    frames_decoded: u64,
    frames_dropped: u64,
}

impl FrameDecoder {
    /// Create an empty decoder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and return the events completed by it, in order
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.buffer.extend_from_slice(chunk);

        let Some(last_newline) = self.buffer.iter().rposition(|&b| b == b'\n') else {
            return Vec::new();
        };

        let remainder = self.buffer.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.buffer, remainder);

        complete
            .split(|&b| b == b'\n')
            .filter_map(|line| self.decode_line(line))
            .collect()
    }

    /// Bytes of the incomplete trailing line
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Number of frames successfully decoded so far
    #[must_use]
    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded
    }

    /// Number of `data:` frames dropped as malformed
    #[must_use]
    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped
    }

    /// Discard any incomplete trailing line at end of stream
    ///
    /// An unterminated line can never be confirmed complete, so it is
    /// dropped rather than parsed. Returns the number of bytes discarded.
    pub fn finish(&mut self) -> usize {
        let discarded = self.buffer.len();
        if discarded > 0 {
            tracing::debug!(bytes = discarded, "Discarding unterminated trailing frame");
        }
        self.buffer.clear();
        discarded
    }

    fn decode_line(&mut self, line: &[u8]) -> Option<StreamEvent> {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let payload = line.strip_prefix(DATA_PREFIX.as_bytes())?;

        let Ok(text) = std::str::from_utf8(payload) else {
            self.frames_dropped += 1;
            tracing::trace!("Dropping frame with invalid UTF-8");
            return None;
        };

        match serde_json::from_str::<StreamEvent>(text) {
            Ok(event) => {
                self.frames_decoded += 1;
                Some(event)
            }
            Err(e) => {
                self.frames_dropped += 1;
                tracing::trace!(error = %e, frame = text, "Dropping malformed frame");
                None
            }
        }
    }
}
