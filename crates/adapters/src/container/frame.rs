// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Demultiplexer for the engine's stdout/stderr stream framing.
//!
//! Multiplexed streams carry an 8-byte header per frame:
//! `{stream_type, 0, 0, 0, size_be32}` with `stream_type ∈ {0, 1, 2}`.
//! TTY-attached containers emit raw bytes with no framing at all, so
//! anything that does not look like a valid header passes through as
//! literal bytes. The NDJSON scanner sits on top of the demuxed payload.

const HEADER_LEN: usize = 8;

// A frame claiming more than this is treated as a corrupt header rather
// than buffered indefinitely.
const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Incremental frame demultiplexer. Feed raw chunks, collect payload bytes.
#[derive(Debug, Default)]
pub struct FrameDemuxer {
    buf: Vec<u8>,
}

impl FrameDemuxer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one raw chunk and return the payload bytes it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<u8> {
        self.buf.extend_from_slice(chunk);
        let mut out = Vec::with_capacity(chunk.len());

        loop {
            if self.buf.is_empty() {
                break;
            }
            // Bytes before the next plausible header start are literal
            match self.buf.iter().position(|&b| matches!(b, 0 | 1 | 2)) {
                None => {
                    out.append(&mut self.buf);
                    break;
                }
                Some(0) => {}
                Some(pos) => {
                    out.extend(self.buf.drain(..pos));
                    continue;
                }
            }
            if !zero_padded(&self.buf) {
                // Right stream type but bad padding: literal byte
                out.extend(self.buf.drain(..1));
                continue;
            }
            if self.buf.len() < HEADER_LEN {
                // Plausible header prefix, wait for more input
                break;
            }
            let size = u32::from_be_bytes([self.buf[4], self.buf[5], self.buf[6], self.buf[7]])
                as usize;
            if size > MAX_FRAME_LEN {
                out.extend(self.buf.drain(..1));
                continue;
            }
            if self.buf.len() < HEADER_LEN + size {
                // Complete header, incomplete payload
                break;
            }
            out.extend_from_slice(&self.buf[HEADER_LEN..HEADER_LEN + size]);
            self.buf.drain(..HEADER_LEN + size);
        }

        out
    }

    /// Flush whatever is still buffered (trailing partial frame) as literal
    /// bytes. Call once at end of stream.
    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Whether the header padding bytes (1..4) are zero, as far as they are
/// available. Call only when `buf[0]` is a valid stream type.
fn zero_padded(buf: &[u8]) -> bool {
    buf.iter().take(4).skip(1).all(|&b| b == 0)
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
