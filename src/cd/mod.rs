use hex_literal::hex;

pub mod msf;

pub const SECTOR_SIZE: usize = 2352;
pub const FRAMES_PER_SECOND: u32 = 75;
pub const LEAD_IN_FRAMES: u32 = 150;

/// Sync pattern opening every raw data sector.
pub const SYNC_PATTERN: [u8; 12] = hex!("00FFFFFFFFFFFFFFFFFFFF00");

/// Sync pattern plus the 4 byte sector header (3 bytes address, 1 byte mode).
pub const SECTOR_HEADER_SIZE: usize = 16;

pub const CD_AUDIO_SAMPLE_RATE: u32 = 44_100;
pub const CD_AUDIO_CHANNELS: u32 = 2;
pub const CD_AUDIO_BIT_DEPTH: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackMode {
    Mode0 = 0,
    Mode1 = 1,
    Mode2 = 2,
}

impl TrackMode {
    pub fn from_header_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(TrackMode::Mode0),
            1 => Some(TrackMode::Mode1),
            2 => Some(TrackMode::Mode2),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_pattern_is_zero_framed() {
        assert_eq!(SYNC_PATTERN[0], 0x00);
        assert_eq!(SYNC_PATTERN[11], 0x00);
        assert!(SYNC_PATTERN[1..11].iter().all(|b| *b == 0xFF));
    }

    #[test]
    fn mode_from_header_byte() {
        assert_eq!(TrackMode::from_header_byte(1), Some(TrackMode::Mode1));
        assert_eq!(TrackMode::from_header_byte(2), Some(TrackMode::Mode2));
        assert_eq!(TrackMode::from_header_byte(3), None);
    }
}
