use crate::commands::DecoderArgs;
use anyhow::Result;
use clap::Parser;
use cuesheet_io::cue::CueParser;
use cuesheet_io::metadata::AudioMetadata;
use cuesheet_io::metadata::registry::DecoderRegistry;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::{Path, PathBuf};

/// Reads duration and signal properties of audio files or of every file a cue sheet references.
#[derive(Parser, Debug, Clone)]
pub struct ProbeCommand {
    /// Audio, disc image or .cue files to inspect
    #[arg(value_name = "FILES", required = true)]
    pub files: Vec<PathBuf>,

    /// Time format for durations, e.g. "mm:ss.000"
    #[arg(long, value_name = "PATTERN", default_value = "mm:ss:ff")]
    pub time_format: String,

    #[command(flatten)]
    pub decoders: DecoderArgs,
}

pub fn probe_files(pb: &MultiProgress, cmd: ProbeCommand) -> Result<()> {
    let registry = cmd.decoders.registry();

    let bar = pb.add(ProgressBar::new(cmd.files.len() as u64));
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    for path in &cmd.files {
        bar.set_message(path.display().to_string());

        let is_cue = path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("cue"));
        if is_cue {
            probe_sheet(&registry, path, &cmd.time_format);
        } else {
            probe_file(&registry, path, &cmd.time_format);
        }

        bar.inc(1);
    }

    bar.finish_and_clear();
    Ok(())
}

fn probe_file(registry: &DecoderRegistry, path: &Path, time_format: &str) {
    match registry.resolve_detailed(path) {
        Ok(resolution) => match (resolution.metadata, resolution.decoder) {
            (Some(metadata), Some(decoder)) => {
                info!("{}: {} (via {decoder})", path.display(), describe(&metadata, time_format))
            }
            _ => warn!("{}: no decoder could read this file", path.display()),
        },
        Err(e) => error!("{}: {e}", path.display()),
    }
}

fn probe_sheet(registry: &DecoderRegistry, path: &Path, time_format: &str) {
    let mut sheet = match CueParser::new(path).parse() {
        Ok(sheet) => sheet,
        Err(e) => {
            error!("{}: {e}", path.display());
            return;
        }
    };

    sheet.attach_metadata(registry);

    for file in &sheet.files {
        match &file.metadata {
            Some(metadata) => info!("{}: {}", file.filename, describe(metadata, time_format)),
            None => warn!("{}: unknown", file.filename),
        }
    }

    match sheet.calculate_disc_id() {
        Some(disc_id) => info!("{}: {} tracks, disc id {disc_id}", path.display(), sheet.track_count()),
        None => info!("{}: {} tracks", path.display(), sheet.track_count()),
    }
}

fn describe(metadata: &AudioMetadata, time_format: &str) -> String {
    let mut description = format!("{} {}", metadata.format(), metadata.msf().format(time_format));

    if let Some(sample_rate) = metadata.sample_rate() {
        description.push_str(&format!(" {sample_rate} Hz"));
    }
    if let Some(channels) = metadata.channels() {
        description.push_str(&format!(" {channels} ch"));
    }
    if let Some(bit_depth) = metadata.bit_depth() {
        description.push_str(&format!(" {bit_depth} bit"));
    }
    if metadata.is_lossy() {
        description.push_str(" lossy");
    }
    if let Some(size) = metadata.size() {
        description.push_str(&format!(" {size} bytes"));
    }

    description
}
