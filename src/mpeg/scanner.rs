//! Frame boundary scanning
//!
//! Checks a single position of a byte window for a frame header. Callers
//! handle re-synchronization by advancing one byte on [`ScanResult::NoSync`].

use super::header::{is_sync, FrameHeader, HEADER_LEN};

/// Outcome of scanning one position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanResult {
    /// A structurally valid header starts at `header_offset`
    Found {
        header: FrameHeader,
        frame_len: usize,
        header_offset: usize,
    },
    /// The bytes at this position cannot start a frame
    NoSync,
    /// Too few bytes left to decide, but what is there matches a header prefix
    Incomplete,
}

/// Scan `window` at `pos` for a frame header.
pub fn scan(window: &[u8], pos: usize) -> ScanResult {
    let rest = match window.get(pos..) {
        Some(rest) if !rest.is_empty() => rest,
        _ => return ScanResult::Incomplete,
    };

    if rest[0] != 0xFF {
        return ScanResult::NoSync;
    }
    if rest.len() == 1 {
        return ScanResult::Incomplete;
    }
    if !is_sync(rest[0], rest[1]) {
        return ScanResult::NoSync;
    }
    if rest.len() < HEADER_LEN {
        return ScanResult::Incomplete;
    }

    let bytes = [rest[0], rest[1], rest[2], rest[3]];
    match FrameHeader::parse(bytes) {
        Some(header) => ScanResult::Found {
            frame_len: header.frame_len(),
            header,
            header_offset: pos,
        },
        None => ScanResult::NoSync,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_found_at_offset() {
        let window = [0x00, 0x12, 0xFF, 0xFB, 0x90, 0x00, 0xAA];
        match scan(&window, 2) {
            ScanResult::Found { frame_len, header_offset, .. } => {
                assert_eq!(frame_len, 417);
                assert_eq!(header_offset, 2);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_no_sync() {
        let window = [0x00, 0xFF, 0x1B, 0x90, 0x00];
        assert_eq!(scan(&window, 0), ScanResult::NoSync);
        // 0xFF followed by a byte without the three sync bits
        assert_eq!(scan(&window, 1), ScanResult::NoSync);
    }

    #[test]
    fn test_invalid_header_is_no_sync() {
        let window = [0xFF, 0xFB, 0xF0, 0x00];
        assert_eq!(scan(&window, 0), ScanResult::NoSync);
    }

    #[test]
    fn test_incomplete_prefix() {
        assert_eq!(scan(&[0xFF], 0), ScanResult::Incomplete);
        assert_eq!(scan(&[0xFF, 0xFB], 0), ScanResult::Incomplete);
        assert_eq!(scan(&[0xFF, 0xFB, 0x90], 0), ScanResult::Incomplete);
        assert_eq!(scan(&[0x00, 0x00], 2), ScanResult::Incomplete);
        // a partial prefix that is already wrong is not worth waiting for
        assert_eq!(scan(&[0xFF, 0x00], 0), ScanResult::NoSync);
    }
}
