//! Super-frame accumulation buffer
//!
//! A reusable byte arena that collects whole frames until it holds
//! `capacity` bytes, then hands the block over for decoding.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::BatchError;

/// What to do with a frame that does not fit in the remaining capacity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapacityPolicy {
    /// Flush the short block, then start a new one with the frame
    #[default]
    FlushEarly,
    /// Take the frame anyway and flush once capacity is reached
    Grow,
    /// Reject the frame with [`BatchError::Overflow`]
    Strict,
}

/// Fixed-capacity frame accumulator
#[derive(Debug)]
pub struct SuperFrameBuffer {
    buf: Vec<u8>,
    capacity: usize,
    policy: CapacityPolicy,
}

impl SuperFrameBuffer {
    pub fn new(capacity: usize, policy: CapacityPolicy) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            capacity,
            policy,
        }
    }

    /// Append a frame; returns the blocks that became ready, oldest first.
    pub fn push(&mut self, frame: &[u8]) -> Result<Vec<Bytes>, BatchError> {
        if frame.is_empty() {
            return Err(BatchError::EmptyFrame);
        }

        let mut ready = Vec::new();

        if frame.len() > self.remaining() {
            match self.policy {
                CapacityPolicy::Strict => {
                    return Err(BatchError::Overflow {
                        frame_len: frame.len(),
                        remaining: self.remaining(),
                        capacity: self.capacity,
                    });
                }
                CapacityPolicy::FlushEarly => {
                    if let Some(block) = self.take() {
                        tracing::trace!("Flushing short block of {} bytes", block.len());
                        ready.push(block);
                    }
                    if frame.len() > self.capacity {
                        tracing::warn!(
                            "Frame of {} bytes exceeds super-frame capacity {}, decoding it alone",
                            frame.len(),
                            self.capacity
                        );
                        ready.push(Bytes::copy_from_slice(frame));
                        return Ok(ready);
                    }
                }
                CapacityPolicy::Grow => {}
            }
        }

        self.buf.extend_from_slice(frame);
        if self.buf.len() >= self.capacity {
            if let Some(block) = self.take() {
                ready.push(block);
            }
        }

        Ok(ready)
    }

    /// Remove the accumulated bytes as a block, keeping the allocation
    pub fn take(&mut self) -> Option<Bytes> {
        if self.buf.is_empty() {
            return None;
        }
        let block = Bytes::copy_from_slice(&self.buf);
        self.buf.clear();
        Some(block)
    }

    /// Drop the accumulated bytes
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Write offset
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Bytes that still fit before the buffer is full
    pub fn remaining(&self) -> usize {
        self.capacity.saturating_sub(self.buf.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overflow_flushes_early() {
        let mut buffer = SuperFrameBuffer::new(200, CapacityPolicy::FlushEarly);

        assert!(buffer.push(&[1; 150]).unwrap().is_empty());
        let ready = buffer.push(&[2; 80]).unwrap();

        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].len(), 150);
        assert!(ready[0].iter().all(|&b| b == 1));
        assert_eq!(buffer.len(), 80);
    }

    #[test]
    fn test_overflow_strict_is_typed_error() {
        let mut buffer = SuperFrameBuffer::new(200, CapacityPolicy::Strict);

        buffer.push(&[1; 150]).unwrap();
        let err = buffer.push(&[2; 80]).unwrap_err();

        assert_eq!(
            err,
            BatchError::Overflow {
                frame_len: 80,
                remaining: 50,
                capacity: 200
            }
        );
        // nothing was written
        assert_eq!(buffer.len(), 150);
    }

    #[test]
    fn test_overflow_grows() {
        let mut buffer = SuperFrameBuffer::new(200, CapacityPolicy::Grow);

        buffer.push(&[1; 150]).unwrap();
        let ready = buffer.push(&[2; 80]).unwrap();

        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].len(), 230);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_exact_fill_flushes() {
        let mut buffer = SuperFrameBuffer::new(200, CapacityPolicy::Strict);

        assert!(buffer.push(&[1; 100]).unwrap().is_empty());
        let ready = buffer.push(&[2; 100]).unwrap();

        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].len(), 200);
        assert_eq!(buffer.remaining(), 200);
    }

    #[test]
    fn test_oversized_frame_alone() {
        let mut buffer = SuperFrameBuffer::new(200, CapacityPolicy::FlushEarly);

        buffer.push(&[1; 50]).unwrap();
        let ready = buffer.push(&[2; 250]).unwrap();

        assert_eq!(ready.len(), 2);
        assert_eq!(ready[0].len(), 50);
        assert_eq!(ready[1].len(), 250);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_empty_frame_rejected() {
        let mut buffer = SuperFrameBuffer::new(200, CapacityPolicy::FlushEarly);
        assert_eq!(buffer.push(&[]), Err(BatchError::EmptyFrame));
    }

    #[test]
    fn test_take_partial() {
        let mut buffer = SuperFrameBuffer::new(200, CapacityPolicy::FlushEarly);
        assert!(buffer.take().is_none());

        buffer.push(&[3; 30]).unwrap();
        assert_eq!(buffer.take().unwrap().len(), 30);
        assert!(buffer.is_empty());
    }
}
