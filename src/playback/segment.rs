//! Decoded audio segments

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::codec::PcmBuffer;

/// Arrival order of a segment; strictly increasing
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SegmentId(pub u64);

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A decoded block ready for playback
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedSegment {
    pub id: SegmentId,
    pub pcm: Arc<PcmBuffer>,
}

impl DecodedSegment {
    pub fn new(id: SegmentId, pcm: PcmBuffer) -> Self {
        Self {
            id,
            pcm: Arc::new(pcm),
        }
    }

    pub fn duration(&self) -> Duration {
        self.pcm.duration()
    }
}
