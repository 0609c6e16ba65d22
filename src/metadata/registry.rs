use crate::cue::models::TrackType;
use crate::metadata::error::{DecodeError, DecodeResult};
use crate::metadata::raw::RawSectorDecoder;
use crate::metadata::wave::WaveDecoder;
use crate::metadata::{AudioDecoder, AudioMetadata, DecoderCapability, ReadSeek};
use log::{debug, warn};
use std::fmt::Display;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// A decoder that recognized a file but could not read it.
#[derive(Debug)]
pub struct DecoderFailure {
    pub decoder: String,
    pub error: DecodeError,
}

impl Display for DecoderFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.decoder, self.error)
    }
}

/// Outcome of running a file through the registry.
#[derive(Debug, Default)]
pub struct Resolution {
    pub metadata: Option<AudioMetadata>,

    /// Label of the decoder that produced `metadata`.
    pub decoder: Option<String>,

    /// Every failed attempt, in the order the decoders were tried.
    pub failures: Vec<DecoderFailure>,
}

/// Ordered list of decoders; earlier entries win.
///
/// Resolution first tries all decoders claiming the file's extension, then offers
/// the stream to the remaining stream and binary decoders so they can sniff their
/// signature. Decoders that fail are logged and skipped: a malformed file of one
/// type never stops another decoder from reading it.
#[derive(Default)]
pub struct DecoderRegistry {
    decoders: Vec<Box<dyn AudioDecoder>>,
}

impl DecoderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in PCM wave and raw sector decoders.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(WaveDecoder::new());
        registry.register(RawSectorDecoder::new());
        registry
    }

    pub fn register<D: AudioDecoder + 'static>(&mut self, decoder: D) -> &mut Self {
        self.decoders.push(Box::new(decoder));
        self
    }

    pub fn reset(&mut self) {
        self.decoders.clear();
    }

    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    pub fn format_labels(&self) -> Vec<&str> {
        self.decoders.iter().map(|d| d.format_label()).collect()
    }

    pub fn resolve(&self, path: &Path) -> DecodeResult<Option<AudioMetadata>> {
        Ok(self.resolve_detailed(path)?.metadata)
    }

    /// Only failing to open `path` is reported as an error.
    pub fn resolve_detailed(&self, path: &Path) -> DecodeResult<Resolution> {
        let mut reader = BufReader::new(File::open(path)?);
        Ok(self.run(Some(path), &extension_of(path), &mut reader, None))
    }

    pub fn resolve_binary(
        &self,
        path: &Path,
        track_types: &[TrackType],
    ) -> DecodeResult<Option<AudioMetadata>> {
        Ok(self.resolve_binary_detailed(path, track_types)?.metadata)
    }

    pub fn resolve_binary_detailed(
        &self,
        path: &Path,
        track_types: &[TrackType],
    ) -> DecodeResult<Resolution> {
        let mut reader = BufReader::new(File::open(path)?);
        Ok(self.run(
            Some(path),
            &extension_of(path),
            &mut reader,
            Some(track_types),
        ))
    }

    /// Resolves an already open stream. Path decoders are skipped.
    pub fn resolve_stream(&self, stream: &mut dyn ReadSeek, extension: &str) -> Resolution {
        self.run(None, extension, stream, None)
    }

    fn run(
        &self,
        path: Option<&Path>,
        extension: &str,
        stream: &mut dyn ReadSeek,
        track_types: Option<&[TrackType]>,
    ) -> Resolution {
        let name = path
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| format!("<stream .{extension}>"));
        let mut resolution = Resolution::default();

        for by_extension in [true, false] {
            for decoder in &self.decoders {
                if decoder.matches_extension(extension) != by_extension {
                    continue;
                }

                let attempt = match (decoder.capability(), track_types) {
                    (DecoderCapability::Path(d), None) if by_extension => match path {
                        Some(path) => d.decode_path(path),
                        None => continue,
                    },
                    (DecoderCapability::Stream(d), None) => {
                        rewound(stream).and_then(|s| d.decode_stream(s))
                    }
                    (DecoderCapability::Binary(d), Some(types)) => {
                        rewound(stream).and_then(|s| d.decode_binary(s, types))
                    }
                    _ => continue,
                };

                let label = decoder.format_label();
                match attempt {
                    Ok(Some(metadata)) => {
                        debug!("{label} decoder read {name}");
                        resolution.metadata = Some(metadata);
                        resolution.decoder = Some(label.to_string());
                        return resolution;
                    }
                    Ok(None) => debug!("{label} decoder declined {name}"),
                    Err(error) => {
                        if error.is_format_invalid() {
                            warn!("{name} looks like {label} but is invalid: {error}");
                        } else {
                            warn!("{label} decoder failed on {name}: {error}");
                        }
                        resolution.failures.push(DecoderFailure {
                            decoder: label.to_string(),
                            error,
                        });
                    }
                }
            }
        }

        if resolution.failures.is_empty() {
            warn!("No decoder recognized {name}");
        } else {
            let attempts: Vec<String> = resolution.failures.iter().map(|f| f.to_string()).collect();
            warn!(
                "No decoder could read {name}, failed attempts: {}",
                attempts.join("; ")
            );
        }

        resolution
    }
}

fn rewound(stream: &mut dyn ReadSeek) -> DecodeResult<&mut dyn ReadSeek> {
    stream.rewind()?;
    Ok(stream)
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}
