//! Super-frame batching ahead of the decoder

pub mod batcher;
pub mod buffer;

pub use batcher::{BatchStats, DecodeBatcher};
pub use buffer::{CapacityPolicy, SuperFrameBuffer};
