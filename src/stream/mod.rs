//! Byte sources and frame reassembly

pub mod reassembler;
pub mod source;

pub use reassembler::{ByteCursor, PendingFrame, Reassembler, ReassemblerStats};
pub use source::{connect_tcp, ChunkSource, ReaderChunkSource, StreamChunkSource, TcpChunkSource};
