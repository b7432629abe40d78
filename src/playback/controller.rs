//! Playback controller
//!
//! Owns the [`Scheduler`] and the [`AudioSink`] and applies two kinds of
//! events to them one at a time: a decoded segment arriving, and the sink
//! reporting that the active segment finished. A completion that has a
//! successor queued starts it inside the same event, before anything else
//! is looked at.
//!
//! Sinks that can switch segments on their own (a device callback) are
//! handed the queued successor in advance through
//! [`AudioSink::queue_next`]; its completion then only advances the
//! scheduler.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::AudioError;
use crate::pipeline::RunFlag;
use crate::playback::scheduler::{Scheduler, SchedulerStats};
use crate::playback::segment::{DecodedSegment, SegmentId};
use crate::playback::sink::{AudioSink, Completion};

/// Point-in-time view of playback, readable from other tasks
#[derive(Debug, Clone, Default)]
pub struct PlaybackStatus {
    pub active: Option<SegmentId>,
    pub queued: usize,
    pub stats: SchedulerStats,
}

/// Sending half used by the decode side
#[derive(Clone)]
pub struct PlaybackHandle {
    segment_tx: mpsc::Sender<DecodedSegment>,
    status: Arc<Mutex<PlaybackStatus>>,
}

impl PlaybackHandle {
    /// Hand over a decoded segment; waits while the queue is full.
    pub async fn submit(&self, segment: DecodedSegment) -> Result<(), AudioError> {
        self.segment_tx
            .send(segment)
            .await
            .map_err(|_| AudioError::SinkClosed)
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status.lock().clone()
    }
}

/// Event loop driving the scheduler
pub struct PlaybackController<S> {
    scheduler: Scheduler,
    sink: S,
    segment_rx: mpsc::Receiver<DecodedSegment>,
    done_tx: mpsc::UnboundedSender<SegmentId>,
    done_rx: mpsc::UnboundedReceiver<SegmentId>,
    status: Arc<Mutex<PlaybackStatus>>,
    /// Stop taking segments once this many are queued
    max_queued: usize,
    segments_closed: bool,
    /// Successor already handed to the sink
    preloaded: Option<SegmentId>,
}

impl<S: AudioSink> PlaybackController<S> {
    /// Create a controller and the handle that feeds it.
    ///
    /// The handle (and its clones) must be dropped to signal end of stream.
    pub fn new(sink: S, lookahead: usize, capacity: usize) -> (Self, PlaybackHandle) {
        let (segment_tx, segment_rx) = mpsc::channel(capacity.max(1));
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        let status = Arc::new(Mutex::new(PlaybackStatus::default()));

        let controller = Self {
            scheduler: Scheduler::new(lookahead),
            sink,
            segment_rx,
            done_tx,
            done_rx,
            status: status.clone(),
            max_queued: capacity.max(lookahead + 1),
            segments_closed: false,
            preloaded: None,
        };
        let handle = PlaybackHandle { segment_tx, status };

        (controller, handle)
    }

    /// Run until every submitted segment has played or `run` is cancelled.
    pub async fn run(mut self, run: Arc<RunFlag>) -> Result<SchedulerStats, AudioError> {
        loop {
            let accepting = !self.segments_closed && self.scheduler.queued() < self.max_queued;

            tokio::select! {
                biased;

                _ = run.cancelled() => {
                    tracing::info!("Playback cancelled");
                    self.sink.stop();
                    break;
                }
                Some(id) = self.done_rx.recv() => {
                    self.on_completed(id)?;
                }
                segment = self.segment_rx.recv(), if accepting => match segment {
                    Some(segment) => self.on_segment(segment)?,
                    None => self.on_end_of_stream()?,
                },
            }

            self.preload()?;
            self.publish_status();

            if self.segments_closed && self.scheduler.is_idle() {
                tracing::info!("Playback finished");
                break;
            }
        }

        Ok(self.scheduler.stats().clone())
    }

    fn on_segment(&mut self, segment: DecodedSegment) -> Result<(), AudioError> {
        tracing::trace!("Segment {} ready", segment.id);
        match self.scheduler.enqueue(segment) {
            Some(start) => self.start(start),
            None => Ok(()),
        }
    }

    fn on_completed(&mut self, id: SegmentId) -> Result<(), AudioError> {
        match self.scheduler.complete(id) {
            Ok(Some(next)) if self.preloaded == Some(next.id) => {
                // the sink is already playing it
                tracing::debug!("Segment {} continued from {}", next.id, id);
                self.preloaded = None;
                Ok(())
            }
            Ok(Some(next)) => self.start(next),
            Ok(None) => Ok(()),
            Err(e) => {
                tracing::warn!("Ignoring completion: {}", e);
                Ok(())
            }
        }
    }

    fn on_end_of_stream(&mut self) -> Result<(), AudioError> {
        tracing::debug!("No more segments, draining {} queued", self.scheduler.queued());
        self.segments_closed = true;
        match self.scheduler.drain() {
            Some(start) => self.start(start),
            None => Ok(()),
        }
    }

    fn start(&mut self, segment: DecodedSegment) -> Result<(), AudioError> {
        let completion = Completion::new(segment.id, self.done_tx.clone());
        tracing::debug!("Starting segment {}", segment.id);
        self.sink.play(segment, completion)
    }

    /// Offer the queued successor to the sink once per segment
    fn preload(&mut self) -> Result<(), AudioError> {
        if self.preloaded.is_some() || self.scheduler.active().is_none() {
            return Ok(());
        }
        let Some(next) = self.scheduler.peek_next().cloned() else {
            return Ok(());
        };

        let id = next.id;
        let completion = Completion::new(id, self.done_tx.clone());
        if self.sink.queue_next(next, completion)? {
            tracing::trace!("Segment {} handed to the sink in advance", id);
            self.preloaded = Some(id);
        }
        Ok(())
    }

    fn publish_status(&self) {
        let mut status = self.status.lock();
        status.active = self.scheduler.active().map(|s| s.id);
        status.queued = self.scheduler.queued();
        status.stats = self.scheduler.stats().clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::PcmBuffer;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::Instant;

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Start(SegmentId, Instant),
        End(SegmentId, Instant),
    }

    /// Clock-paced sink that records what it plays
    #[derive(Clone, Default)]
    struct RecordingSink {
        events: Arc<Mutex<Vec<Event>>>,
        active: Arc<AtomicUsize>,
        max_active: Arc<AtomicUsize>,
    }

    impl AudioSink for RecordingSink {
        fn play(&mut self, segment: DecodedSegment, completion: Completion) -> Result<(), AudioError> {
            let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now_active, Ordering::SeqCst);
            self.events.lock().push(Event::Start(segment.id, Instant::now()));

            let events = self.events.clone();
            let active = self.active.clone();
            let duration = segment.duration();
            tokio::spawn(async move {
                tokio::time::sleep(duration).await;
                active.fetch_sub(1, Ordering::SeqCst);
                events.lock().push(Event::End(segment.id, Instant::now()));
                completion.notify();
            });
            Ok(())
        }
    }

    fn segment(id: u64, millis: usize) -> DecodedSegment {
        DecodedSegment::new(SegmentId(id), PcmBuffer::new(vec![0.0; millis * 48], 48000, 1))
    }

    #[tokio::test(start_paused = true)]
    async fn test_segments_play_in_order_without_gaps() {
        let sink = RecordingSink::default();
        let (controller, handle) = PlaybackController::new(sink.clone(), 1, 8);
        let task = tokio::spawn(controller.run(RunFlag::new()));

        handle.submit(segment(0, 300)).await.unwrap();
        handle.submit(segment(1, 200)).await.unwrap();
        handle.submit(segment(2, 100)).await.unwrap();
        drop(handle);

        let stats = task.await.unwrap().unwrap();
        assert_eq!(stats.started, 3);
        assert_eq!(sink.max_active.load(Ordering::SeqCst), 1);

        let events = sink.events.lock().clone();
        let starts: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                Event::Start(id, at) => Some((*id, *at)),
                _ => None,
            })
            .collect();
        let ends: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                Event::End(id, at) => Some((*id, *at)),
                _ => None,
            })
            .collect();

        let order: Vec<_> = starts.iter().map(|(id, _)| *id).collect();
        assert_eq!(order, vec![SegmentId(0), SegmentId(1), SegmentId(2)]);

        // each successor starts the moment its predecessor ends
        for (end, next_start) in ends.iter().zip(starts.iter().skip(1)) {
            let gap = next_start.1.duration_since(end.1);
            assert!(gap < Duration::from_millis(2), "gap of {:?}", gap);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_segment_plays_at_end_of_stream() {
        let sink = RecordingSink::default();
        let (controller, handle) = PlaybackController::new(sink.clone(), 1, 8);
        let task = tokio::spawn(controller.run(RunFlag::new()));

        handle.submit(segment(0, 50)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        // lookahead not met yet
        assert_eq!(handle.status().active, None);
        assert_eq!(handle.status().queued, 1);
        drop(handle);

        let stats = task.await.unwrap().unwrap();
        assert_eq!(stats.started, 1);
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Call {
        Play(SegmentId),
        Queue(SegmentId),
    }

    /// Sink that accepts successors in advance; the test fires completions
    #[derive(Clone, Default)]
    struct HandoffSink {
        calls: Arc<Mutex<Vec<Call>>>,
        pending: Arc<Mutex<std::collections::VecDeque<Completion>>>,
    }

    impl AudioSink for HandoffSink {
        fn play(&mut self, segment: DecodedSegment, completion: Completion) -> Result<(), AudioError> {
            self.calls.lock().push(Call::Play(segment.id));
            self.pending.lock().push_back(completion);
            Ok(())
        }

        fn queue_next(
            &mut self,
            segment: DecodedSegment,
            completion: Completion,
        ) -> Result<bool, AudioError> {
            self.calls.lock().push(Call::Queue(segment.id));
            self.pending.lock().push_back(completion);
            Ok(true)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_successors_handed_to_sink_in_advance() {
        let sink = HandoffSink::default();
        let (controller, handle) = PlaybackController::new(sink.clone(), 1, 8);
        let task = tokio::spawn(controller.run(RunFlag::new()));
        let settle = || tokio::time::sleep(Duration::from_millis(1));

        handle.submit(segment(0, 10)).await.unwrap();
        handle.submit(segment(1, 10)).await.unwrap();
        handle.submit(segment(2, 10)).await.unwrap();
        drop(handle);
        settle().await;
        assert_eq!(sink.pending.lock().len(), 2);

        for _ in 0..3 {
            let completion = sink.pending.lock().pop_front().unwrap();
            completion.notify();
            settle().await;
        }

        let stats = task.await.unwrap().unwrap();
        assert_eq!(stats.started, 3);
        assert_eq!(
            *sink.calls.lock(),
            vec![
                Call::Play(SegmentId(0)),
                Call::Queue(SegmentId(1)),
                Call::Queue(SegmentId(2)),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_playback() {
        let sink = RecordingSink::default();
        let (controller, handle) = PlaybackController::new(sink.clone(), 0, 8);
        let run = RunFlag::new();
        let task = tokio::spawn(controller.run(run.clone()));

        handle.submit(segment(0, 10_000)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        run.cancel();

        let stats = task.await.unwrap().unwrap();
        assert_eq!(stats.started, 1);
        assert!(sink
            .events
            .lock()
            .iter()
            .all(|e| matches!(e, Event::Start(..))));
    }
}
