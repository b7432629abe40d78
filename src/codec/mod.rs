//! Decoding of super-frame blocks into PCM

pub mod decoder;

pub use decoder::{decode_block, PcmBuffer, SegmentDecoder, SilenceDecoder};

#[cfg(feature = "minimp3")]
pub use decoder::Minimp3Decoder;
