use crate::metadata::error::{DecodeError, DecodeResult};
use crate::metadata::{AudioDecoder, AudioMetadata, DecoderCapability, PathDecoder};
use log::{debug, warn};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::str::FromStr;
use std::time::Duration;
use tokio::process::Command;

pub const DEFAULT_PROBE_EXECUTABLE: &str = "ffprobe";
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(30);

pub const DEFAULT_PROBE_EXTENSIONS: [&str; 15] = [
    "flac", "mp3", "ogg", "oga", "opus", "m4a", "aac", "ape", "wv", "wma", "aif", "aiff", "tta",
    "mka", "mp4",
];

const LOSSY_EXTENSIONS: [&str; 9] = ["mp3", "ogg", "oga", "opus", "m4a", "aac", "wma", "mp4", "mka"];

const PROBE_ARGS: [&str; 8] = [
    "-v",
    "error",
    "-select_streams",
    "a:0",
    "-show_entries",
    "stream=duration,bit_rate,channels,sample_rate,bits_per_raw_sample,bits_per_sample:format=size",
    "-of",
    "default=noprint_wrappers=1",
];

/// `key=value` lines printed by the probe tool.
#[derive(Debug, Default, Clone)]
pub struct ProbeOutput {
    values: HashMap<String, String>,
}

impl ProbeOutput {
    pub fn parse(stdout: &str) -> Self {
        let values = stdout
            .lines()
            .filter_map(|line| line.split_once('='))
            .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
            .collect();

        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Parsed value of `key`, or `default` when it is missing or does not parse.
    pub fn value_or<T: FromStr>(&self, key: &str, default: T) -> T {
        self.get(key)
            .and_then(|v| v.parse::<T>().ok())
            .unwrap_or(default)
    }
}

/// Reads metadata of compressed and container formats by running `ffprobe`.
///
/// The decoder never fails: a missing tool, a timeout or unreadable output are
/// logged and reported as "no metadata".
#[derive(Debug, Clone)]
pub struct ProbeDecoder {
    executable: PathBuf,
    timeout: Duration,
    extensions: Vec<String>,
}

impl Default for ProbeDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_EXECUTABLE)
    }
}

impl ProbeDecoder {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            timeout: DEFAULT_PROBE_TIMEOUT,
            extensions: DEFAULT_PROBE_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|e| e.into().trim_start_matches('.').to_ascii_lowercase())
            .collect();
        self
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn run(&self, path: &Path) -> DecodeResult<ProbeOutput> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        runtime.block_on(async {
            let child = Command::new(&self.executable)
                .args(PROBE_ARGS)
                .arg(path)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::null())
                .kill_on_drop(true)
                .spawn()
                .map_err(|e| match e.kind() {
                    ErrorKind::NotFound | ErrorKind::PermissionDenied => {
                        DecodeError::ToolUnavailable(self.executable.display().to_string())
                    }
                    _ => e.into(),
                })?;

            // Dropping the future on timeout drops the child, which kills it.
            let output = tokio::time::timeout(self.timeout, child.wait_with_output())
                .await
                .map_err(|_| DecodeError::ProbeTimedOut(self.timeout))??;

            if !output.status.success() {
                debug!(
                    "{} exited with {} for {}",
                    self.executable.display(),
                    output.status,
                    path.display()
                );
            }

            Ok::<_, DecodeError>(ProbeOutput::parse(&String::from_utf8_lossy(&output.stdout)))
        })
    }

    fn metadata_from_output(&self, output: &ProbeOutput, extension: &str) -> Option<AudioMetadata> {
        let seconds = output.value_or("duration", -1.0f64);
        let Ok(duration) = Duration::try_from_secs_f64(seconds) else {
            debug!("Probe output has no usable duration: {seconds}");
            return None;
        };

        let sample_rate = positive(output.value_or("sample_rate", -1i64));
        let channels = positive(output.value_or("channels", -1i64));
        let bit_depth = positive(output.value_or("bits_per_sample", -1i64))
            .or_else(|| positive(output.value_or("bits_per_raw_sample", -1i64)));
        let size = u64::try_from(output.value_or("size", -1i64)).ok();

        let is_lossy = LOSSY_EXTENSIONS
            .iter()
            .any(|e| e.eq_ignore_ascii_case(extension));

        Some(
            AudioMetadata::new(extension.to_ascii_uppercase(), duration)
                .with_signal(sample_rate, channels, bit_depth)
                .lossy(is_lossy)
                .binary(false)
                .with_size(size),
        )
    }
}

fn positive(value: i64) -> Option<u32> {
    u32::try_from(value).ok().filter(|v| *v > 0)
}

impl AudioDecoder for ProbeDecoder {
    fn format_label(&self) -> &str {
        "PROBE"
    }

    fn extensions(&self) -> Vec<&str> {
        self.extensions.iter().map(String::as_str).collect()
    }

    fn capability(&self) -> DecoderCapability<'_> {
        DecoderCapability::Path(self)
    }
}

impl PathDecoder for ProbeDecoder {
    fn decode_path(&self, path: &Path) -> DecodeResult<Option<AudioMetadata>> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();

        match self.run(path) {
            Ok(output) => Ok(self.metadata_from_output(&output, extension)),
            Err(e @ (DecodeError::ToolUnavailable(_) | DecodeError::ProbeTimedOut(_))) => {
                warn!("{e}, no metadata for {}", path.display());
                Ok(None)
            }
            Err(e) => {
                warn!("Probing {} failed: {e}", path.display());
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FLAC_OUTPUT: &str = "sample_rate=44100\nchannels=2\nbits_per_sample=0\nbits_per_raw_sample=16\nduration=245.133333\nbit_rate=N/A\nsize=26474132\n";

    #[test]
    fn parses_key_value_lines_on_first_equals() {
        let output = ProbeOutput::parse("a=1\nb=x=y\nnot a pair\n c = 3 \n");
        assert_eq!(output.get("a"), Some("1"));
        assert_eq!(output.get("b"), Some("x=y"));
        assert_eq!(output.get("c"), Some("3"));
        assert_eq!(output.get("not a pair"), None);
    }

    #[test]
    fn value_or_falls_back_on_missing_or_garbage() {
        let output = ProbeOutput::parse("bit_rate=N/A\nchannels=2\n");
        assert_eq!(output.value_or("bit_rate", -1i64), -1);
        assert_eq!(output.value_or("sample_rate", -1i64), -1);
        assert_eq!(output.value_or("channels", -1i64), 2);
        assert_eq!(output.value_or("duration", -1.0f64), -1.0);
    }

    #[test]
    fn bit_depth_falls_back_to_raw_sample_bits() {
        let decoder = ProbeDecoder::default();
        let metadata = decoder
            .metadata_from_output(&ProbeOutput::parse(FLAC_OUTPUT), "flac")
            .unwrap();

        assert_eq!(metadata.bit_depth(), Some(16));
        assert_eq!(metadata.sample_rate(), Some(44_100));
        assert_eq!(metadata.channels(), Some(2));
        assert_eq!(metadata.size(), Some(26_474_132));
        assert_eq!(metadata.format(), "FLAC");
        assert!(!metadata.is_lossy());
        assert_eq!(metadata.msf().total_frames(), 18_385);
    }

    #[test]
    fn lossy_formats_have_unknown_bit_depth() {
        let decoder = ProbeDecoder::default();
        let output = ProbeOutput::parse("sample_rate=48000\nchannels=2\nduration=1.5\n");
        let metadata = decoder.metadata_from_output(&output, "mp3").unwrap();

        assert!(metadata.is_lossy());
        assert_eq!(metadata.bit_depth(), None);
        assert_eq!(metadata.size(), None);
        assert_eq!(metadata.duration(), Duration::from_millis(1_500));
    }

    #[test]
    fn missing_duration_yields_no_metadata() {
        let decoder = ProbeDecoder::default();
        let output = ProbeOutput::parse("sample_rate=48000\n");
        assert!(decoder.metadata_from_output(&output, "ogg").is_none());
    }

    #[test]
    fn missing_tool_is_soft_failure() {
        let decoder = ProbeDecoder::new("/nonexistent/definitely-not-ffprobe");
        let result = decoder.decode_path(Path::new("track.flac"));
        assert!(matches!(result, Ok(None)));
    }

    #[cfg(unix)]
    #[test]
    fn hung_tool_is_killed_after_timeout() {
        use std::os::unix::fs::PermissionsExt;
        use std::time::Instant;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("hang.sh");
        std::fs::write(&script, "#!/bin/sh\nexec sleep 10\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let decoder = ProbeDecoder::new(&script).with_timeout(Duration::from_millis(100));

        let started = Instant::now();
        let error = decoder.run(Path::new("track.flac")).unwrap_err();
        assert!(matches!(error, DecodeError::ProbeTimedOut(t) if t == Duration::from_millis(100)));

        let result = decoder.decode_path(Path::new("track.flac"));
        assert!(matches!(result, Ok(None)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn custom_extensions_are_normalized() {
        let decoder = ProbeDecoder::default().with_extensions([".DSF", "dff"]);
        assert!(decoder.matches_extension("dsf"));
        assert!(decoder.matches_extension("DFF"));
        assert!(!decoder.matches_extension("flac"));
    }
}
