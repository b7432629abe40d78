//! Audio output sinks
//!
//! A sink plays one segment at a time and reports through the segment's
//! [`Completion`] when the last sample has been played.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::AudioError;
use crate::playback::segment::{DecodedSegment, SegmentId};

/// Completion notification for one started segment
#[derive(Debug)]
pub struct Completion {
    id: SegmentId,
    tx: mpsc::UnboundedSender<SegmentId>,
}

impl Completion {
    pub fn new(id: SegmentId, tx: mpsc::UnboundedSender<SegmentId>) -> Self {
        Self { id, tx }
    }

    pub fn id(&self) -> SegmentId {
        self.id
    }

    /// Report that playback finished. Safe to call from any thread.
    pub fn notify(self) {
        if self.tx.send(self.id).is_err() {
            tracing::trace!("Completion for segment {} after controller exit", self.id);
        }
    }
}

/// Output that plays decoded segments
pub trait AudioSink: Send {
    /// Start playing `segment` now; signal `completion` when it ends.
    fn play(&mut self, segment: DecodedSegment, completion: Completion) -> Result<(), AudioError>;

    /// Offer the segment that follows the one playing.
    ///
    /// A sink that returns `Ok(true)` switches to it by itself the moment
    /// the current segment ends, then signals the current completion. It
    /// will not be asked to `play` that segment again. The default declines.
    fn queue_next(
        &mut self,
        _segment: DecodedSegment,
        _completion: Completion,
    ) -> Result<bool, AudioError> {
        Ok(false)
    }

    /// Stop output, dropping whatever is playing
    fn stop(&mut self) {}
}

/// Sink that produces no sound but takes real time to play each segment.
///
/// Must be used from within a tokio runtime.
#[derive(Debug, Default)]
pub struct ClockSink {
    playing: Option<JoinHandle<()>>,
}

impl ClockSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AudioSink for ClockSink {
    fn play(&mut self, segment: DecodedSegment, completion: Completion) -> Result<(), AudioError> {
        let duration = segment.duration();
        tracing::debug!("Playing segment {} for {:?}", segment.id, duration);

        self.playing = Some(tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            completion.notify();
        }));
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(handle) = self.playing.take() {
            handle.abort();
        }
    }
}
