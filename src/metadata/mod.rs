//! Audio metadata extraction.
//!
//! Every supported family of audio files has a decoder implementing [`AudioDecoder`].
//! A decoder declares how it wants to be fed through [`DecoderCapability`]: with the
//! file path, with an open stream, or with an open stream plus the track types of a
//! raw disc image. The [`registry::DecoderRegistry`] picks the right entry point.
//!
//! Decoders return `Ok(None)` when a file is not theirs (a *decline*) and an error
//! when the file claims to be theirs but is malformed.

use crate::cd::msf::MSF;
use crate::cue::models::TrackType;
use crate::metadata::error::DecodeResult;
use std::io::{Read, Seek};
use std::path::Path;
use std::time::Duration;

pub mod error;
pub mod probe;
pub mod raw;
pub mod registry;
pub mod wave;

pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek> ReadSeek for T {}

/// Format-level description of one audio resource.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioMetadata {
    duration: Duration,
    is_binary: bool,
    sample_rate: Option<u32>,
    channels: Option<u32>,
    bit_depth: Option<u32>,
    is_lossy: bool,
    format: String,
    size: Option<u64>,
}

impl AudioMetadata {
    pub fn new(format: impl Into<String>, duration: Duration) -> Self {
        Self {
            duration,
            is_binary: false,
            sample_rate: None,
            channels: None,
            bit_depth: None,
            is_lossy: false,
            format: format.into(),
            size: None,
        }
    }

    pub fn with_signal(
        mut self,
        sample_rate: Option<u32>,
        channels: Option<u32>,
        bit_depth: Option<u32>,
    ) -> Self {
        self.sample_rate = sample_rate;
        self.channels = channels;
        self.bit_depth = bit_depth;
        self
    }

    pub fn lossy(mut self, is_lossy: bool) -> Self {
        self.is_lossy = is_lossy;
        self
    }

    pub fn binary(mut self, is_binary: bool) -> Self {
        self.is_binary = is_binary;
        self
    }

    pub fn with_size(mut self, size: Option<u64>) -> Self {
        self.size = size;
        self
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Duration rounded to whole frames.
    pub fn msf(&self) -> MSF {
        MSF::from_duration(self.duration)
    }

    pub fn is_binary(&self) -> bool {
        self.is_binary
    }

    pub fn sample_rate(&self) -> Option<u32> {
        self.sample_rate
    }

    pub fn channels(&self) -> Option<u32> {
        self.channels
    }

    pub fn bit_depth(&self) -> Option<u32> {
        self.bit_depth
    }

    pub fn is_lossy(&self) -> bool {
        self.is_lossy
    }

    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn size(&self) -> Option<u64> {
        self.size
    }
}

/// Entry point a decoder offers the registry.
pub enum DecoderCapability<'a> {
    Path(&'a dyn PathDecoder),
    Stream(&'a dyn StreamDecoder),
    Binary(&'a dyn BinaryDecoder),
}

pub trait AudioDecoder: Send + Sync {
    fn format_label(&self) -> &str;

    fn extensions(&self) -> Vec<&str>;

    fn matches_extension(&self, extension: &str) -> bool {
        let extension = extension.trim_start_matches('.');
        self.extensions()
            .iter()
            .any(|e| e.eq_ignore_ascii_case(extension))
    }

    fn capability(&self) -> DecoderCapability<'_>;
}

pub trait PathDecoder {
    fn decode_path(&self, path: &Path) -> DecodeResult<Option<AudioMetadata>>;
}

pub trait StreamDecoder {
    fn decode_stream(&self, stream: &mut dyn ReadSeek) -> DecodeResult<Option<AudioMetadata>>;
}

pub trait BinaryDecoder {
    fn decode_binary(
        &self,
        stream: &mut dyn ReadSeek,
        track_types: &[TrackType],
    ) -> DecodeResult<Option<AudioMetadata>>;
}

pub(crate) fn stream_length(stream: &mut dyn ReadSeek) -> std::io::Result<u64> {
    let length = stream.seek(std::io::SeekFrom::End(0))?;
    stream.rewind()?;
    Ok(length)
}
