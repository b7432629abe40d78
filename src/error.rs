//! Error types for the stream player

use thiserror::Error;

use crate::playback::SegmentId;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    #[error("Batch error: {0}")]
    Batch(#[from] BatchError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Schedule error: {0}")]
    Schedule(#[from] ScheduleError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Task failed: {0}")]
    Task(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Byte source and transport errors
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

/// Super-frame batching errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    #[error("Frame of {frame_len} bytes does not fit: {remaining} of {capacity} bytes left")]
    Overflow {
        frame_len: usize,
        remaining: usize,
        capacity: usize,
    },

    #[error("Empty frame")]
    EmptyFrame,
}

/// Codec errors
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Decoding failed: {0}")]
    DecodingFailed(String),

    #[error("No audio in block of {0} bytes")]
    NoAudio(usize),

    #[error("Decode task aborted: {0}")]
    TaskAborted(String),
}

/// Audio output errors
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to open stream: {0}")]
    StreamError(String),

    #[error("Sink closed")]
    SinkClosed,
}

/// Playback scheduling errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("Segment {0} is not the active segment")]
    NotActive(SegmentId),
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;
