//! Gapless playback scheduling
//!
//! Holds the single active-playback slot and the FIFO of decoded segments
//! waiting behind it. The scheduler never talks to an output itself: every
//! operation returns the segment that must be started now, if any, and the
//! caller starts it before handling the next event.
//!
//! Starting from an empty slot requires more than `lookahead` segments to be
//! queued, so playback does not start only to run dry immediately. A
//! completion with a successor queued chains straight into it. A completion
//! with nothing queued leaves the slot empty, and the lookahead condition
//! applies again to the next start.

use std::collections::VecDeque;

use crate::error::ScheduleError;
use crate::playback::segment::{DecodedSegment, SegmentId};

/// Scheduling counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Segments started
    pub started: u64,
    /// Starts that chained directly from a completion
    pub chained: u64,
    /// Completions that found the queue empty
    pub underruns: u64,
    /// Deepest the queue has been
    pub max_queued: usize,
}

/// Single-slot FIFO playback state machine
#[derive(Debug)]
pub struct Scheduler {
    active: Option<DecodedSegment>,
    queue: VecDeque<DecodedSegment>,
    lookahead: usize,
    end_of_stream: bool,
    stats: SchedulerStats,
}

impl Scheduler {
    /// `lookahead` segments must sit behind the one being started
    pub fn new(lookahead: usize) -> Self {
        Self {
            active: None,
            queue: VecDeque::new(),
            lookahead,
            end_of_stream: false,
            stats: SchedulerStats::default(),
        }
    }

    /// A decoded segment arrived. Returns the segment to start, if any.
    pub fn enqueue(&mut self, segment: DecodedSegment) -> Option<DecodedSegment> {
        self.queue.push_back(segment);
        self.stats.max_queued = self.stats.max_queued.max(self.queue.len());

        if self.active.is_none() && (self.queue.len() > self.lookahead || self.end_of_stream) {
            return self.start_next();
        }
        None
    }

    /// The active segment finished playing. Returns its successor to start.
    pub fn complete(&mut self, id: SegmentId) -> Result<Option<DecodedSegment>, ScheduleError> {
        match &self.active {
            Some(active) if active.id == id => {}
            _ => return Err(ScheduleError::NotActive(id)),
        }
        self.active = None;

        if self.queue.is_empty() {
            if !self.end_of_stream {
                self.stats.underruns += 1;
                tracing::debug!("Queue ran dry after segment {}", id);
            }
            return Ok(None);
        }

        self.stats.chained += 1;
        Ok(self.start_next())
    }

    /// No more segments will arrive; start the queue regardless of lookahead.
    pub fn drain(&mut self) -> Option<DecodedSegment> {
        self.end_of_stream = true;
        if self.active.is_none() && !self.queue.is_empty() {
            return self.start_next();
        }
        None
    }

    /// The segment currently sounding
    pub fn active(&self) -> Option<&DecodedSegment> {
        self.active.as_ref()
    }

    /// The segment that will start when the active one completes
    pub fn peek_next(&self) -> Option<&DecodedSegment> {
        self.queue.front()
    }

    /// Segments waiting behind the active one
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Nothing playing and nothing waiting
    pub fn is_idle(&self) -> bool {
        self.active.is_none() && self.queue.is_empty()
    }

    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    fn start_next(&mut self) -> Option<DecodedSegment> {
        let next = self.queue.pop_front()?;
        self.active = Some(next.clone());
        self.stats.started += 1;
        Some(next)
    }
}
