//! Super-frame decoders
//!
//! A decoder turns one block of whole MPEG frames into PCM. Decoding is run
//! on the blocking pool, so from the pipeline's point of view it is an
//! asynchronous operation that is awaited before the next block is issued.

use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;

use crate::error::CodecError;
use crate::mpeg::{FrameHeader, HEADER_LEN};

/// Decoded audio: interleaved `f32` samples
#[derive(Debug, Clone, PartialEq)]
pub struct PcmBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl PcmBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    /// Samples per channel
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    /// Playback duration
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }
}

/// Decodes a block of concatenated frames
pub trait SegmentDecoder: Send + Sync + 'static {
    fn decode(&self, block: &[u8]) -> Result<PcmBuffer, CodecError>;
}

/// Decode `block` on the blocking pool
pub async fn decode_block<D: SegmentDecoder>(
    decoder: Arc<D>,
    block: Bytes,
) -> Result<PcmBuffer, CodecError> {
    tokio::task::spawn_blocking(move || decoder.decode(&block))
        .await
        .map_err(|e| CodecError::TaskAborted(e.to_string()))?
}

/// Produces silence of the right length by walking the frame headers.
///
/// Useful without an MP3 codec: timing, scheduling and output pacing all
/// behave as with real audio.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilenceDecoder;

impl SegmentDecoder for SilenceDecoder {
    fn decode(&self, block: &[u8]) -> Result<PcmBuffer, CodecError> {
        let mut offset = 0;
        let mut frames = 0usize;
        let mut format: Option<(u32, u16)> = None;

        while offset < block.len() {
            let header = block
                .get(offset..offset + HEADER_LEN)
                .and_then(|b| FrameHeader::parse([b[0], b[1], b[2], b[3]]))
                .ok_or_else(|| {
                    CodecError::DecodingFailed(format!("no frame header at offset {}", offset))
                })?;

            let (rate, _) =
                *format.get_or_insert((header.sample_rate, header.channel_mode.channels()));
            // the first frame fixes the output format
            if rate == header.sample_rate {
                frames += header.samples_per_frame() as usize;
            }
            offset += header.frame_len();
        }

        match format {
            Some((sample_rate, channels)) => Ok(PcmBuffer::new(
                vec![0.0; frames * channels as usize],
                sample_rate,
                channels,
            )),
            None => Err(CodecError::NoAudio(block.len())),
        }
    }
}

/// MP3 decoding through minimp3
#[cfg(feature = "minimp3")]
#[derive(Debug, Default, Clone, Copy)]
pub struct Minimp3Decoder;

#[cfg(feature = "minimp3")]
impl SegmentDecoder for Minimp3Decoder {
    fn decode(&self, block: &[u8]) -> Result<PcmBuffer, CodecError> {
        let mut decoder = minimp3::Decoder::new(std::io::Cursor::new(block));
        let mut samples = Vec::new();
        let mut format: Option<(u32, u16)> = None;

        loop {
            match decoder.next_frame() {
                Ok(frame) => {
                    let (rate, channels) = *format
                        .get_or_insert((frame.sample_rate as u32, frame.channels as u16));
                    if rate != frame.sample_rate as u32 || channels != frame.channels as u16 {
                        tracing::debug!("Dropping frame with changed format inside block");
                        continue;
                    }
                    samples.extend(frame.data.iter().map(|&s| s as f32 / 32768.0));
                }
                Err(minimp3::Error::Eof) | Err(minimp3::Error::InsufficientData) => break,
                Err(minimp3::Error::SkippedData) => continue,
                Err(e) => return Err(CodecError::DecodingFailed(e.to_string())),
            }
        }

        match format {
            Some((sample_rate, channels)) => Ok(PcmBuffer::new(samples, sample_rate, channels)),
            None => Err(CodecError::NoAudio(block.len())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(headers: &[[u8; 4]]) -> Vec<u8> {
        let mut data = Vec::new();
        for header in headers {
            let len = FrameHeader::parse(*header).unwrap().frame_len();
            let start = data.len();
            data.extend_from_slice(header);
            data.resize(start + len, 0x00);
        }
        data
    }

    #[test]
    fn test_pcm_duration() {
        let pcm = PcmBuffer::new(vec![0.0; 44100 * 2], 44100, 2);
        assert_eq!(pcm.frames(), 44100);
        assert_eq!(pcm.duration(), Duration::from_secs(1));
    }

    #[test]
    fn test_silence_length_matches_headers() {
        let data = block(&[[0xFF, 0xFB, 0x90, 0x00], [0xFF, 0xFB, 0x10, 0x00]]);
        let pcm = SilenceDecoder.decode(&data).unwrap();

        assert_eq!(pcm.sample_rate, 44100);
        assert_eq!(pcm.channels, 2);
        assert_eq!(pcm.frames(), 2 * 1152);
        assert!(pcm.samples.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_silence_rejects_garbage() {
        let result = SilenceDecoder.decode(&[0x00; 64]);
        assert!(matches!(result, Err(CodecError::DecodingFailed(_))));
        assert!(matches!(SilenceDecoder.decode(&[]), Err(CodecError::NoAudio(0))));
    }

    #[tokio::test]
    async fn test_decode_block_runs_off_thread() {
        let data = Bytes::from(block(&[[0xFF, 0xFB, 0x10, 0xC0]]));
        let pcm = decode_block(Arc::new(SilenceDecoder), data).await.unwrap();
        assert_eq!(pcm.channels, 1);
        assert_eq!(pcm.frames(), 1152);
    }
}
