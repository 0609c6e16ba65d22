use crate::commands::probe::ProbeCommand;
use crate::commands::rewrite::RewriteCommand;
use clap::{Args, Parser, Subcommand};
use cuesheet_io::metadata::probe::{DEFAULT_PROBE_EXECUTABLE, ProbeDecoder};
use cuesheet_io::metadata::registry::DecoderRegistry;
use std::path::PathBuf;
use std::time::Duration;

pub mod probe;
pub mod rewrite;

/// CLI for probing audio files and rewriting CD cue sheets.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Probe(ProbeCommand),
    Rewrite(RewriteCommand),
}

/// Options controlling which decoders are used to read audio files.
#[derive(Args, Debug, Clone)]
pub struct DecoderArgs {
    /// Path to the ffprobe executable used for compressed formats
    #[arg(long, value_name = "FFPROBE", env = "FFPROBE_PATH", default_value = DEFAULT_PROBE_EXECUTABLE)]
    pub ffprobe: PathBuf,

    /// Seconds to wait for ffprobe before giving up on a file
    #[arg(long, value_name = "SECONDS", default_value_t = 30)]
    pub timeout: u64,

    /// Only use the built-in wave and raw sector decoders
    #[arg(long, default_value_t = false)]
    pub no_probe: bool,
}

impl DecoderArgs {
    pub fn registry(&self) -> DecoderRegistry {
        let mut registry = DecoderRegistry::with_defaults();
        if !self.no_probe {
            registry.register(
                ProbeDecoder::new(&self.ffprobe).with_timeout(Duration::from_secs(self.timeout)),
            );
        }
        registry
    }
}
