//! MPEG audio frame header decoding
//!
//! Header layout (4 bytes, big-endian bit order):
//!
//! ```text
//! [0]: 11111111  sync word (high 8 bits)
//! [1]: 111VVLLC  sync word (low 3 bits), version, layer, CRC-protected flag
//! [2]: BBBBSSPR  bitrate index, sample-rate index, padding, private
//! [3]: MMXXCOEE  channel mode, mode extension, copyright, original, emphasis
//! ```

use std::time::Duration;

/// Length of a frame header in bytes
pub const HEADER_LEN: usize = 4;

/// MPEG version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    V1,
    V2,
    V2_5,
}

/// MPEG layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    L1,
    L2,
    L3,
}

/// Channel mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMode {
    Stereo,
    JointStereo,
    DualChannel,
    Mono,
}

impl ChannelMode {
    /// Number of output channels
    pub fn channels(self) -> u16 {
        match self {
            ChannelMode::Mono => 1,
            _ => 2,
        }
    }
}

/// Bitrates in kbit/s for bitrate indices 1..=14
const BITRATES_V1_L1: [u32; 14] = [32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448];
const BITRATES_V1_L2: [u32; 14] = [32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384];
const BITRATES_V1_L3: [u32; 14] = [32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320];
const BITRATES_V2_L1: [u32; 14] = [32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256];
const BITRATES_V2_L23: [u32; 14] = [8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160];

/// Returns true if the two bytes form the 11-bit frame sync pattern.
///
/// The mask is applied to the second byte before the comparison.
#[inline]
pub fn is_sync(b0: u8, b1: u8) -> bool {
    b0 == 0xFF && (b1 & 0xE0) == 0xE0
}

/// A decoded, structurally valid frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub version: Version,
    pub layer: Layer,
    /// CRC-16 follows the header
    pub protected: bool,
    /// Bitrate in kbit/s
    pub bitrate_kbps: u32,
    /// Sample rate in Hz
    pub sample_rate: u32,
    pub padding: bool,
    pub channel_mode: ChannelMode,
}

impl FrameHeader {
    /// Decode a header from its four bytes.
    ///
    /// Returns `None` when the sync word is missing or any field holds a
    /// reserved value (free-format and "bad" bitrates included).
    pub fn parse(bytes: [u8; HEADER_LEN]) -> Option<Self> {
        if !is_sync(bytes[0], bytes[1]) {
            return None;
        }

        let version = match (bytes[1] >> 3) & 0b11 {
            0b11 => Version::V1,
            0b10 => Version::V2,
            0b00 => Version::V2_5,
            _ => return None,
        };

        let layer = match (bytes[1] >> 1) & 0b11 {
            0b11 => Layer::L1,
            0b10 => Layer::L2,
            0b01 => Layer::L3,
            _ => return None,
        };

        let bitrate_idx = (bytes[2] >> 4) as usize;
        if bitrate_idx == 0 || bitrate_idx == 0b1111 {
            return None;
        }
        let table = match (version, layer) {
            (Version::V1, Layer::L1) => &BITRATES_V1_L1,
            (Version::V1, Layer::L2) => &BITRATES_V1_L2,
            (Version::V1, Layer::L3) => &BITRATES_V1_L3,
            (_, Layer::L1) => &BITRATES_V2_L1,
            (_, _) => &BITRATES_V2_L23,
        };
        let bitrate_kbps = table[bitrate_idx - 1];

        let rates = match version {
            Version::V1 => [44100, 48000, 32000],
            Version::V2 => [22050, 24000, 16000],
            Version::V2_5 => [11025, 12000, 8000],
        };
        let sample_rate = *rates.get(((bytes[2] >> 2) & 0b11) as usize)?;

        let channel_mode = match bytes[3] >> 6 {
            0b00 => ChannelMode::Stereo,
            0b01 => ChannelMode::JointStereo,
            0b10 => ChannelMode::DualChannel,
            _ => ChannelMode::Mono,
        };

        Some(Self {
            version,
            layer,
            protected: bytes[1] & 0b1 == 0,
            bitrate_kbps,
            sample_rate,
            padding: bytes[2] & 0b10 == 0b10,
            channel_mode,
        })
    }

    /// PCM samples per channel carried by one frame
    pub fn samples_per_frame(&self) -> u32 {
        match (self.version, self.layer) {
            (_, Layer::L1) => 384,
            (_, Layer::L2) => 1152,
            (Version::V1, Layer::L3) => 1152,
            (_, Layer::L3) => 576,
        }
    }

    /// Total frame length in bytes, header included
    pub fn frame_len(&self) -> usize {
        let bitrate = self.bitrate_kbps as usize * 1000;
        let rate = self.sample_rate as usize;
        let padding = self.padding as usize;

        match self.layer {
            // Layer I counts in 4-byte slots
            Layer::L1 => (12 * bitrate / rate + padding) * 4,
            _ => {
                let coefficient = self.samples_per_frame() as usize / 8;
                coefficient * bitrate / rate + padding
            }
        }
    }

    /// Playback duration of one frame
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.samples_per_frame() as f64 / self.sample_rate as f64)
    }
}
