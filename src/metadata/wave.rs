use crate::metadata::error::{DecodeError, DecodeResult};
use crate::metadata::{
    AudioDecoder, AudioMetadata, DecoderCapability, ReadSeek, StreamDecoder, stream_length,
};
use binrw::BinRead;
use log::debug;
use std::io::ErrorKind;
use std::time::Duration;

pub const WAVE_FORMAT_LABEL: &str = "WAVE";

const RIFF_MAGIC: &[u8; 4] = b"RIFF";
const WAVE_MAGIC: &[u8; 4] = b"WAVE";
const PCM_FORMAT_CHUNK_SIZE: u32 = 16;
const WAVE_FORMAT_PCM: u16 = 1;
const RIFF_PREAMBLE_SIZE: u64 = 8;

/// Canonical 44 byte header of a PCM wave file.
#[derive(Debug, BinRead)]
#[br(little)]
pub struct WaveHeader {
    pub riff_tag: [u8; 4],

    /// Size of the file minus the 8 byte RIFF preamble.
    pub riff_size: u32,

    pub wave_tag: [u8; 4],

    pub fmt_tag: [u8; 4],

    /// Always 16 for plain PCM.
    pub fmt_size: u32,

    /// 1 = linear PCM
    pub audio_format: u16,

    pub channels: u16,

    pub sample_rate: u32,

    /// sample_rate * block_align
    pub byte_rate: u32,

    /// channels * bits_per_sample / 8
    pub block_align: u16,

    pub bits_per_sample: u16,

    /// Length of the sample data, read after skipping the `data` tag.
    #[br(pad_before = 4)]
    pub data_size: u32,
}

/// Reads duration and signal layout from uncompressed PCM wave files.
#[derive(Debug, Default)]
pub struct WaveDecoder;

impl WaveDecoder {
    pub fn new() -> Self {
        Self
    }

    fn validate(header: &WaveHeader, stream_length: u64) -> DecodeResult<()> {
        if header.fmt_size != PCM_FORMAT_CHUNK_SIZE {
            return Err(DecodeError::invalid(
                WAVE_FORMAT_LABEL,
                format!("unsupported format chunk size {}", header.fmt_size),
            ));
        }

        if header.audio_format != WAVE_FORMAT_PCM {
            return Err(DecodeError::invalid(
                WAVE_FORMAT_LABEL,
                format!("audio format {} is not linear PCM", header.audio_format),
            ));
        }

        let declared_length = header.riff_size as u64 + RIFF_PREAMBLE_SIZE;
        if declared_length != stream_length {
            return Err(DecodeError::invalid(
                WAVE_FORMAT_LABEL,
                format!("header declares {declared_length} bytes, file has {stream_length}"),
            ));
        }

        if header.channels == 0 || header.bits_per_sample == 0 || header.sample_rate == 0 {
            return Err(DecodeError::invalid(
                WAVE_FORMAT_LABEL,
                "channels, bits per sample and sample rate must be non-zero",
            ));
        }

        let expected_block_align = header.channels as u32 * header.bits_per_sample as u32 / 8;
        if header.block_align as u32 != expected_block_align {
            return Err(DecodeError::invalid(
                WAVE_FORMAT_LABEL,
                format!(
                    "block align {} does not match {expected_block_align}",
                    header.block_align
                ),
            ));
        }

        let expected_byte_rate = header.sample_rate as u64 * header.block_align as u64;
        if header.byte_rate as u64 != expected_byte_rate {
            return Err(DecodeError::invalid(
                WAVE_FORMAT_LABEL,
                format!(
                    "byte rate {} does not match {expected_byte_rate}",
                    header.byte_rate
                ),
            ));
        }

        Ok(())
    }

    fn duration(header: &WaveHeader) -> Duration {
        let bits_per_second =
            header.channels as u128 * header.bits_per_sample as u128 * header.sample_rate as u128;
        let nanos = header.data_size as u128 * 8 * 1_000_000_000 / bits_per_second;
        Duration::from_nanos(nanos as u64)
    }
}

impl AudioDecoder for WaveDecoder {
    fn format_label(&self) -> &str {
        WAVE_FORMAT_LABEL
    }

    fn extensions(&self) -> Vec<&str> {
        vec!["wav", "wave"]
    }

    fn capability(&self) -> DecoderCapability<'_> {
        DecoderCapability::Stream(self)
    }
}

impl StreamDecoder for WaveDecoder {
    fn decode_stream(&self, stream: &mut dyn ReadSeek) -> DecodeResult<Option<AudioMetadata>> {
        let length = stream_length(stream)?;

        let mut signature = [0u8; 12];
        match stream.read_exact(&mut signature) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        if &signature[0..4] != RIFF_MAGIC || &signature[8..12] != WAVE_MAGIC {
            return Ok(None);
        }

        stream.rewind()?;
        let mut reader = &mut *stream;
        let header = WaveHeader::read(&mut reader)?;
        Self::validate(&header, length)?;

        debug!(
            "PCM wave: {} Hz, {} channels, {} bit, {} data bytes",
            header.sample_rate, header.channels, header.bits_per_sample, header.data_size
        );

        let metadata = AudioMetadata::new(WAVE_FORMAT_LABEL, Self::duration(&header))
            .with_signal(
                Some(header.sample_rate),
                Some(header.channels as u32),
                Some(header.bits_per_sample as u32),
            )
            .lossy(false)
            .binary(false)
            .with_size(Some(length));

        Ok(Some(metadata))
    }
}
