use crate::cd::msf::MSF;
use crate::cd::{
    CD_AUDIO_BIT_DEPTH, CD_AUDIO_CHANNELS, CD_AUDIO_SAMPLE_RATE, SECTOR_HEADER_SIZE, SECTOR_SIZE,
    SYNC_PATTERN, TrackMode,
};
use crate::cue::models::TrackType;
use crate::metadata::error::{DecodeError, DecodeResult};
use crate::metadata::{
    AudioDecoder, AudioMetadata, BinaryDecoder, DecoderCapability, ReadSeek, stream_length,
};
use byteorder::ReadBytesExt;
use log::debug;
use std::io::ErrorKind;

pub const BINARY_FORMAT_LABEL: &str = "BINARY";

/// Reads the length of raw CD images (.bin) from their sector count.
///
/// One sector holds one frame, so the play time is the sector count at 75 sectors
/// per second.
#[derive(Debug, Default)]
pub struct RawSectorDecoder;

impl RawSectorDecoder {
    pub fn new() -> Self {
        Self
    }

    fn sector_size(track_types: &[TrackType]) -> DecodeResult<usize> {
        let first = track_types.first().ok_or(DecodeError::MissingTrackTypes)?;
        let sector_size = first.sector_size();

        if track_types.iter().any(|t| t.sector_size() != sector_size) {
            let mut sizes: Vec<usize> = track_types.iter().map(TrackType::sector_size).collect();
            sizes.dedup();
            return Err(DecodeError::MixedSectorSizes(sizes));
        }

        Ok(sector_size)
    }

    /// Checks the sync pattern and mode byte of the first sector.
    ///
    /// Only full 2352 byte data sectors carry a header. Audio sectors are plain
    /// samples, so images starting with an audio track always pass.
    fn signature_matches(stream: &mut dyn ReadSeek, first: TrackType) -> DecodeResult<bool> {
        if first.sector_size() != SECTOR_SIZE || first.contains_audio_data() {
            return Ok(true);
        }

        let mut sync = [0u8; SYNC_PATTERN.len()];
        match stream.read_exact(&mut sync) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(false),
            Err(e) => return Err(e.into()),
        }
        if sync != SYNC_PATTERN {
            return Ok(false);
        }

        // Skip the 3 byte address to reach the mode byte.
        let mut address = [0u8; SECTOR_HEADER_SIZE - SYNC_PATTERN.len() - 1];
        stream.read_exact(&mut address)?;
        let mode = stream.read_u8()?;

        Ok(TrackMode::from_header_byte(mode) == Some(first.mode()))
    }
}

impl AudioDecoder for RawSectorDecoder {
    fn format_label(&self) -> &str {
        BINARY_FORMAT_LABEL
    }

    fn extensions(&self) -> Vec<&str> {
        vec!["bin", "img", "raw"]
    }

    fn capability(&self) -> DecoderCapability<'_> {
        DecoderCapability::Binary(self)
    }
}

impl BinaryDecoder for RawSectorDecoder {
    fn decode_binary(
        &self,
        stream: &mut dyn ReadSeek,
        track_types: &[TrackType],
    ) -> DecodeResult<Option<AudioMetadata>> {
        let sector_size = Self::sector_size(track_types)?;
        let length = stream_length(stream)?;

        if !Self::signature_matches(stream, track_types[0])? {
            debug!("First sector does not look like {}", track_types[0].label());
            return Ok(None);
        }

        if length % sector_size as u64 != 0 {
            return Err(DecodeError::invalid(
                BINARY_FORMAT_LABEL,
                format!("{length} bytes is not a multiple of the {sector_size} byte sector size"),
            ));
        }

        let sectors = length / sector_size as u64;
        let sectors = u32::try_from(sectors).map_err(|_| {
            DecodeError::invalid(BINARY_FORMAT_LABEL, format!("{sectors} sectors is too many"))
        })?;

        let signal = if track_types.iter().any(TrackType::contains_audio_data) {
            (
                Some(CD_AUDIO_SAMPLE_RATE),
                Some(CD_AUDIO_CHANNELS),
                Some(CD_AUDIO_BIT_DEPTH),
            )
        } else {
            (None, None, None)
        };

        let metadata = AudioMetadata::new(
            BINARY_FORMAT_LABEL,
            MSF::from_frames(sectors).to_duration(),
        )
        .with_signal(signal.0, signal.1, signal.2)
        .binary(true)
        .lossy(false)
        .with_size(Some(length));

        Ok(Some(metadata))
    }
}
