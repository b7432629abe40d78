//! Decode batching
//!
//! Groups reassembled frames into super-frame blocks and decodes each block
//! as soon as it is complete. Blocks are decoded strictly one at a time, so
//! segments come out in the order their frames went in.

use bytes::Bytes;
use std::sync::Arc;

use crate::batch::buffer::{CapacityPolicy, SuperFrameBuffer};
use crate::codec::{decode_block, SegmentDecoder};
use crate::error::BatchError;
use crate::playback::{DecodedSegment, SegmentId};

/// Batching and decoding counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchStats {
    /// Frames accepted into a block
    pub frames_batched: u64,
    /// Frames refused by the strict policy
    pub frames_rejected: u64,
    /// Blocks handed to the decoder
    pub blocks_decoded: u64,
    /// Blocks the decoder refused
    pub decode_failures: u64,
    /// Samples produced across all channels
    pub samples_produced: u64,
}

/// Frame batcher feeding a decoder
pub struct DecodeBatcher<D> {
    buffer: SuperFrameBuffer,
    decoder: Arc<D>,
    next_id: u64,
    stats: BatchStats,
}

impl<D: SegmentDecoder> DecodeBatcher<D> {
    pub fn new(decoder: Arc<D>, capacity: usize, policy: CapacityPolicy) -> Self {
        Self {
            buffer: SuperFrameBuffer::new(capacity, policy),
            decoder,
            next_id: 0,
            stats: BatchStats::default(),
        }
    }

    /// Add one complete frame and decode any block it completed.
    ///
    /// A block that fails to decode is logged and skipped. An overflow under
    /// the strict policy is returned and the frame is dropped.
    pub async fn push_frame(&mut self, frame: &[u8]) -> Result<Vec<DecodedSegment>, BatchError> {
        let blocks = match self.buffer.push(frame) {
            Ok(blocks) => blocks,
            Err(e) => {
                self.stats.frames_rejected += 1;
                return Err(e);
            }
        };
        self.stats.frames_batched += 1;

        let mut segments = Vec::with_capacity(blocks.len());
        for block in blocks {
            if let Some(segment) = self.decode(block).await {
                segments.push(segment);
            }
        }
        Ok(segments)
    }

    /// Decode whatever is left in the buffer, for end of stream
    pub async fn finish(&mut self) -> Option<DecodedSegment> {
        let block = self.buffer.take()?;
        tracing::debug!("Flushing final block of {} bytes", block.len());
        self.decode(block).await
    }

    /// Drop the partially filled block
    pub fn abandon(&mut self) {
        if !self.buffer.is_empty() {
            tracing::debug!("Abandoning {} buffered bytes", self.buffer.len());
        }
        self.buffer.clear();
    }

    pub fn stats(&self) -> &BatchStats {
        &self.stats
    }

    /// Bytes waiting in the current block
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    async fn decode(&mut self, block: Bytes) -> Option<DecodedSegment> {
        let len = block.len();
        self.stats.blocks_decoded += 1;

        match decode_block(self.decoder.clone(), block).await {
            Ok(pcm) => {
                self.stats.samples_produced += pcm.samples.len() as u64;
                let id = SegmentId(self.next_id);
                self.next_id += 1;
                tracing::trace!(
                    "Decoded block of {} bytes into segment {} ({:?})",
                    len,
                    id,
                    pcm.duration()
                );
                Some(DecodedSegment::new(id, pcm))
            }
            Err(e) => {
                self.stats.decode_failures += 1;
                tracing::warn!("Skipping block of {} bytes: {}", len, e);
                None
            }
        }
    }
}
