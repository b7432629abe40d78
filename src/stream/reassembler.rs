//! Frame reassembly across chunk boundaries
//!
//! The transport hands over chunks of arbitrary size with no alignment to
//! frame boundaries. The reassembler turns them back into whole frames.
//!
//! Two states:
//! - **Seeking** (`need == 0`): scan at the cursor; frames fully inside the
//!   chunk are sliced out directly, a frame running past the end of the chunk
//!   becomes a [`PendingFrame`].
//! - **Awaiting** (`need > 0`): the next bytes go into the pending frame first.
//!
//! A header cut by a chunk boundary is kept in a small stash and completed
//! from the next chunk, so the emitted frames never depend on how the
//! stream was chunked.

use bytes::{Bytes, BytesMut};

use crate::mpeg::{scan, ScanResult, HEADER_LEN};

/// Position into the current chunk and bytes still owed to the pending frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ByteCursor {
    pub pos: usize,
    pub need: usize,
}

/// A frame whose bytes are spread over more than one chunk
#[derive(Debug)]
pub struct PendingFrame {
    buf: BytesMut,
    frame_len: usize,
}

impl PendingFrame {
    /// Allocate a buffer for a frame of `frame_len` bytes
    pub fn new(frame_len: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(frame_len),
            frame_len,
        }
    }

    /// Copy as much of `bytes` as still fits; returns the count copied
    pub fn write(&mut self, bytes: &[u8]) -> usize {
        let take = bytes.len().min(self.remaining());
        self.buf.extend_from_slice(&bytes[..take]);
        take
    }

    /// Current write offset
    pub fn offset(&self) -> usize {
        self.buf.len()
    }

    /// Bytes still missing
    pub fn remaining(&self) -> usize {
        self.frame_len - self.buf.len()
    }

    pub fn is_complete(&self) -> bool {
        self.remaining() == 0
    }

    pub fn into_frame(self) -> Bytes {
        self.buf.freeze()
    }
}

/// Reassembly counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReassemblerStats {
    /// Complete frames emitted
    pub frames_emitted: u64,
    /// Bytes dropped while looking for a sync word
    pub bytes_skipped: u64,
    /// Number of times sync was lost and had to be searched for
    pub resync_events: u64,
}

/// Turns an unaligned chunk stream into complete frames
#[derive(Debug, Default)]
pub struct Reassembler {
    cursor: ByteCursor,
    pending: Option<PendingFrame>,
    /// Leading bytes of a header cut off at the end of the previous chunk
    stash: Vec<u8>,
    /// Length of the current run of skipped bytes
    skip_run: usize,
    stats: ReassemblerStats,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process a whole chunk and return the frames it completed, in order
    pub fn feed(&mut self, chunk: &Bytes) -> Vec<Bytes> {
        self.feed_while(chunk, || true)
    }

    /// Process a chunk, polling `keep_going` before every step.
    ///
    /// When `keep_going` returns false the rest of the chunk is dropped and
    /// whatever partial state exists is left as is.
    pub fn feed_while(&mut self, chunk: &Bytes, mut keep_going: impl FnMut() -> bool) -> Vec<Bytes> {
        let mut frames = Vec::new();
        self.cursor.pos = 0;

        while self.cursor.pos < chunk.len() && keep_going() {
            if self.cursor.need > 0 {
                self.fill_pending(chunk, &mut frames);
            } else if !self.stash.is_empty() {
                self.resolve_stash(chunk);
            } else {
                self.seek(chunk, &mut frames);
            }
        }

        frames
    }

    /// Whether a partial frame is waiting for more bytes
    pub fn is_awaiting(&self) -> bool {
        self.cursor.need > 0
    }

    /// Bytes still needed to complete the pending frame
    pub fn need(&self) -> usize {
        self.cursor.need
    }

    pub fn stats(&self) -> &ReassemblerStats {
        &self.stats
    }

    /// Drop any partial frame and go back to seeking
    pub fn reset(&mut self) {
        self.cursor = ByteCursor::default();
        self.pending = None;
        self.stash.clear();
        self.skip_run = 0;
    }

    fn seek(&mut self, chunk: &Bytes, frames: &mut Vec<Bytes>) {
        let pos = self.cursor.pos;

        match scan(chunk, pos) {
            ScanResult::Found { frame_len, .. } => {
                self.end_skip_run();
                let available = chunk.len() - pos;

                if frame_len <= available {
                    frames.push(chunk.slice(pos..pos + frame_len));
                    self.stats.frames_emitted += 1;
                    self.cursor.pos += frame_len;
                } else {
                    let mut pending = PendingFrame::new(frame_len);
                    pending.write(&chunk[pos..]);
                    self.start_awaiting(pending);
                    self.cursor.pos = chunk.len();
                }
            }
            ScanResult::NoSync => {
                self.skip_byte();
                self.cursor.pos += 1;
            }
            ScanResult::Incomplete => {
                self.stash.extend_from_slice(&chunk[pos..]);
                self.cursor.pos = chunk.len();
            }
        }
    }

    fn fill_pending(&mut self, chunk: &Bytes, frames: &mut Vec<Bytes>) {
        let Some(pending) = self.pending.as_mut() else {
            // need without a buffer cannot happen; recover by seeking
            self.cursor.need = 0;
            return;
        };

        let copied = pending.write(&chunk[self.cursor.pos..]);
        self.cursor.pos += copied;
        self.cursor.need = pending.remaining();

        if pending.is_complete() {
            if let Some(pending) = self.pending.take() {
                frames.push(pending.into_frame());
                self.stats.frames_emitted += 1;
            }
        }
    }

    /// Complete the stashed header prefix from `chunk` and scan it
    fn resolve_stash(&mut self, chunk: &Bytes) {
        while self.stash.len() < HEADER_LEN && self.cursor.pos < chunk.len() {
            self.stash.push(chunk[self.cursor.pos]);
            self.cursor.pos += 1;
        }

        match scan(&self.stash, 0) {
            ScanResult::Found { frame_len, .. } => {
                self.end_skip_run();
                let mut pending = PendingFrame::new(frame_len);
                pending.write(&self.stash);
                self.stash.clear();
                self.start_awaiting(pending);
            }
            ScanResult::NoSync => {
                self.skip_byte();
                self.stash.remove(0);
            }
            // chunk exhausted; wait for the next one
            ScanResult::Incomplete => {}
        }
    }

    fn start_awaiting(&mut self, pending: PendingFrame) {
        self.cursor.need = pending.remaining();
        tracing::trace!(
            "Frame of {} bytes split across chunks, {} bytes outstanding",
            pending.offset() + pending.remaining(),
            self.cursor.need
        );
        self.pending = Some(pending);
    }

    fn skip_byte(&mut self) {
        if self.skip_run == 0 {
            self.stats.resync_events += 1;
            tracing::trace!("Sync lost, scanning for next frame header");
        }
        self.skip_run += 1;
        self.stats.bytes_skipped += 1;
    }

    fn end_skip_run(&mut self) {
        if self.skip_run > 0 {
            tracing::debug!("Resynchronized after skipping {} bytes", self.skip_run);
            self.skip_run = 0;
        }
    }
}
