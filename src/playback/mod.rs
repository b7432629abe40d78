//! Gapless playback of decoded segments

pub mod controller;
pub mod scheduler;
pub mod segment;
pub mod sink;

#[cfg(feature = "cpal")]
pub mod cpal_sink;

pub use controller::{PlaybackController, PlaybackHandle, PlaybackStatus};
pub use scheduler::{Scheduler, SchedulerStats};
pub use segment::{DecodedSegment, SegmentId};
pub use sink::{AudioSink, ClockSink, Completion};

#[cfg(feature = "cpal")]
pub use cpal_sink::CpalSink;
