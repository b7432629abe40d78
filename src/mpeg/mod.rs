//! MPEG audio frame headers and sync scanning

pub mod header;
pub mod scanner;

pub use header::{ChannelMode, FrameHeader, Layer, Version, HEADER_LEN};
pub use scanner::{scan, ScanResult};
