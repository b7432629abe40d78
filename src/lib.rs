//! # Gapless Stream
//!
//! Gapless playback of an MPEG audio stream that arrives in arbitrary,
//! unaligned chunks.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                            READER LOOP                               │
//! │  ┌──────────────┐   ┌──────────────────┐   ┌──────────────────────┐  │
//! │  │ ChunkSource  │──▶│   Reassembler    │──▶│    DecodeBatcher     │  │
//! │  │ (TCP, Stream)│   │ (mpeg::scan per  │   │ (SuperFrameBuffer +  │  │
//! │  │              │   │  frame header)   │   │  SegmentDecoder)     │  │
//! │  └──────────────┘   └──────────────────┘   └──────────┬───────────┘  │
//! │                                                       │              │
//! └───────────────────────────────────────────────────────┼──────────────┘
//!                                                         │ DecodedSegment
//!                                                         ▼
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                        PLAYBACK CONTROLLER                           │
//! │  ┌──────────────────────────┐        ┌────────────────────────────┐  │
//! │  │ Scheduler                │ start  │ AudioSink                  │  │
//! │  │ (active + FIFO queue,    │───────▶│ (ClockSink, CpalSink)      │  │
//! │  │  lookahead before start) │◀───────│                            │  │
//! │  └──────────────────────────┘  done  └────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```

pub mod batch;
pub mod codec;
pub mod config;
pub mod error;
pub mod mpeg;
pub mod pipeline;
pub mod playback;
pub mod stream;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    /// Default TCP port of the stream server
    pub const DEFAULT_STREAM_PORT: u16 = 3615;

    /// Bytes requested per socket read
    pub const DEFAULT_CHUNK_SIZE: usize = 4096;

    /// Super-frame capacity in bytes (384 frames of up to 128 bytes)
    pub const SUPER_FRAME_CAPACITY: usize = 384 * 128;

    /// Segments held back before the first one starts
    pub const DEFAULT_LOOKAHEAD: usize = 1;

    /// Decoded segments that may wait in the playback channel
    pub const DEFAULT_PLAYBACK_QUEUE: usize = 16;
}
