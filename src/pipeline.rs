//! The reader loop
//!
//! One cooperative loop per stream: read a chunk, reassemble frames, batch
//! and decode them, hand segments to playback. The only suspension points
//! are the chunk read, the decode, and waiting for room in the playback
//! queue. Nothing is decoded concurrently.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

use crate::batch::{BatchStats, DecodeBatcher};
use crate::codec::SegmentDecoder;
use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::playback::{AudioSink, DecodedSegment, PlaybackController, PlaybackHandle, SchedulerStats};
use crate::stream::{ChunkSource, Reassembler, ReassemblerStats};

/// Shared loop-continuation flag
#[derive(Debug)]
pub struct RunFlag {
    running: AtomicBool,
    notify: Notify,
}

impl RunFlag {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            running: AtomicBool::new(true),
            notify: Notify::new(),
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Request shutdown. In-flight reads and decodes still complete.
    pub fn cancel(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Resolves once [`cancel`](Self::cancel) has been called
    pub async fn cancelled(&self) {
        loop {
            let notified = self.notify.notified();
            if !self.is_running() {
                return;
            }
            notified.await;
        }
    }
}

/// Summary of one reader loop run
#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    pub chunks_read: u64,
    pub bytes_read: u64,
    pub reassembler: ReassemblerStats,
    pub batch: BatchStats,
    /// Stopped by the run flag rather than end of stream
    pub cancelled: bool,
}

/// Reader loop from a chunk source to playback
pub struct Pipeline<C, D> {
    source: C,
    reassembler: Reassembler,
    batcher: DecodeBatcher<D>,
    playback: PlaybackHandle,
    run: Arc<RunFlag>,
    flush_on_end: bool,
}

impl<C: ChunkSource, D: SegmentDecoder> Pipeline<C, D> {
    pub fn new(
        source: C,
        decoder: Arc<D>,
        playback: PlaybackHandle,
        config: &AppConfig,
        run: Arc<RunFlag>,
    ) -> Self {
        Self {
            source,
            reassembler: Reassembler::new(),
            batcher: DecodeBatcher::new(decoder, config.batch.capacity, config.batch.policy),
            playback,
            run,
            flush_on_end: config.batch.flush_on_end,
        }
    }

    /// Read until end of stream or cancellation.
    ///
    /// Dropping the pipeline at the end closes the playback handle, which
    /// lets the controller drain and finish.
    pub async fn run(mut self) -> Result<PipelineReport> {
        let mut report = PipelineReport::default();

        while self.run.is_running() {
            let Some(chunk) = self.source.next_chunk().await? else {
                tracing::info!("End of stream after {} bytes", report.bytes_read);
                break;
            };
            report.chunks_read += 1;
            report.bytes_read += chunk.len() as u64;

            let run = self.run.clone();
            let frames = self.reassembler.feed_while(&chunk, || run.is_running());

            for frame in frames {
                // only a decode already in flight may finish after cancel
                if !self.run.is_running() {
                    break;
                }
                match self.batcher.push_frame(&frame).await {
                    Ok(segments) => {
                        for segment in segments {
                            self.submit(segment).await?;
                        }
                    }
                    Err(e) => tracing::warn!("Dropping frame: {}", e),
                }
            }
        }

        if self.run.is_running() {
            if self.flush_on_end {
                if let Some(segment) = self.batcher.finish().await {
                    self.submit(segment).await?;
                }
            }
        } else {
            tracing::info!("Reader stopped, abandoning partial frame state");
            report.cancelled = true;
            self.batcher.abandon();
            self.reassembler.reset();
        }

        report.reassembler = self.reassembler.stats().clone();
        report.batch = self.batcher.stats().clone();
        Ok(report)
    }

    /// Forward a segment to playback. After cancellation a closed playback
    /// side is expected and the segment is dropped.
    async fn submit(&self, segment: DecodedSegment) -> Result<()> {
        match self.playback.submit(segment).await {
            Ok(()) => Ok(()),
            Err(_) if !self.run.is_running() => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Play a whole stream: reader loop and playback controller together.
pub async fn play<C, D, S>(
    source: C,
    decoder: Arc<D>,
    sink: S,
    config: &AppConfig,
    run: Arc<RunFlag>,
) -> Result<(PipelineReport, SchedulerStats)>
where
    C: ChunkSource,
    D: SegmentDecoder,
    S: AudioSink + 'static,
{
    let (controller, handle) = PlaybackController::new(
        sink,
        config.playback.lookahead,
        config.playback.channel_capacity,
    );
    let playback = tokio::spawn(controller.run(run.clone()));

    let pipeline = Pipeline::new(source, decoder, handle, config, run.clone());
    let report = pipeline.run().await;
    if report.is_err() {
        run.cancel();
    }

    let stats = playback
        .await
        .map_err(|e| Error::Task(format!("playback: {}", e)))??;
    Ok((report?, stats))
}
