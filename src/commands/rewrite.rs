use crate::commands::DecoderArgs;
use anyhow::{Result, bail};
use clap::{Parser, ValueEnum};
use cuesheet_io::cue::CueParser;
use cuesheet_io::cue::models::CueSheet;
use cuesheet_io::writer::encoding::TextEncoding;
use cuesheet_io::writer::options::{QuoteReplacement, RedundantFieldBehavior, WriterOptions};
use cuesheet_io::writer::template::PathTemplate;
use cuesheet_io::writer::{CUE_EXTENSION, CueWriter};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

#[derive(ValueEnum, Debug, Clone, Copy, Eq, PartialEq)]
pub enum QuoteStyle {
    Single,
    Curly,
    Remove,
}

impl From<QuoteStyle> for QuoteReplacement {
    fn from(style: QuoteStyle) -> Self {
        match style {
            QuoteStyle::Single => QuoteReplacement::SingleQuote,
            QuoteStyle::Curly => QuoteReplacement::CurlyQuotes,
            QuoteStyle::Remove => QuoteReplacement::Remove,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, Eq, PartialEq)]
pub enum RedundantFields {
    Keep,
    Remove,
    Always,
}

impl From<RedundantFields> for RedundantFieldBehavior {
    fn from(fields: RedundantFields) -> Self {
        match fields {
            RedundantFields::Keep => RedundantFieldBehavior::KeepAsIs,
            RedundantFields::Remove => RedundantFieldBehavior::RemoveRedundant,
            RedundantFields::Always => RedundantFieldBehavior::AlwaysWrite,
        }
    }
}

/// Reads a .cue file and writes it again with the given formatting.
#[derive(Parser, Debug, Clone)]
#[command(
    long_about = "Reads a .cue file and writes it again with the given formatting\n\nNote: FILE entries are resolved against the input directory, so they are written as absolute paths unless the referenced files live below the output directory"
)]
pub struct RewriteCommand {
    /// Input .cue file
    #[arg(value_name = "INPUT_CUE")]
    pub input_cue: PathBuf,

    /// Directory the rewritten sheet is placed in
    #[arg(value_name = "OUTPUT_DIR")]
    pub output: PathBuf,

    /// File name pattern, e.g. "%Artist%/%Year% - %Album%"
    #[arg(long, short = 'p', value_name = "PATTERN", default_value = "%Performer% - %Title%")]
    pub pattern: String,

    /// Text encoding label, e.g. utf-8, utf-8-bom, utf-16le, windows-1252, shift_jis
    #[arg(long, short = 'e', value_name = "ENCODING")]
    pub encoding: Option<TextEncoding>,

    /// Quote every value, not only those containing whitespace
    #[arg(long, default_value_t = false)]
    pub force_quotes: bool,

    /// Replacement for double quotes inside values
    #[arg(long, value_enum, default_value_t = QuoteStyle::Single)]
    pub quotes: QuoteStyle,

    /// How track titles, performers and composers are written
    #[arg(long, value_enum, default_value_t = RedundantFields::Keep)]
    pub redundant_fields: RedundantFields,

    /// Use CRLF line endings regardless of platform
    #[arg(long, default_value_t = false)]
    pub crlf: bool,

    /// Indentation per nesting level
    #[arg(long, value_name = "WIDTH", default_value_t = 2)]
    pub indent: usize,

    /// Indent with tabs instead of spaces
    #[arg(long, default_value_t = false)]
    pub tabs: bool,

    /// Read the referenced files and store the computed disc id
    #[arg(long, short = 'd', default_value_t = false)]
    pub disc_id: bool,

    /// Force overwrite of the output file if it already exists
    #[arg(long, short = 'f', value_name = "FORCE", default_value_t = false)]
    pub force: bool,

    #[command(flatten)]
    pub decoders: DecoderArgs,
}

impl RewriteCommand {
    fn writer_options(&self) -> WriterOptions {
        let defaults = WriterOptions::default();
        WriterOptions {
            force_quotes: self.force_quotes,
            quote_replacement: self.quotes.into(),
            encoding: self.encoding,
            newline: if self.crlf {
                "\r\n".to_string()
            } else {
                defaults.newline
            },
            indent_width: self.indent,
            indent_char: if self.tabs { '\t' } else { ' ' },
            redundant_fields: self.redundant_fields.into(),
        }
    }
}

pub fn rewrite_cue(cmd: RewriteCommand) -> Result<()> {
    let mut sheet = CueParser::new(&cmd.input_cue).parse()?;
    debug!(
        "Read {} files and {} tracks from {}",
        sheet.files.len(),
        sheet.track_count(),
        cmd.input_cue.display()
    );

    if cmd.disc_id {
        sheet.attach_metadata(&cmd.decoders.registry());
        match sheet.calculate_disc_id() {
            Some(disc_id) => sheet.disc_id = Some(disc_id),
            None => warn!("Not every referenced file could be read, keeping the existing disc id"),
        }
    }

    resolve_file_references(&mut sheet, &cmd.input_cue)?;

    let template = PathTemplate::new(&cmd.pattern);
    let destination = std::path::absolute(&cmd.output)?
        .join(format!("{}.{CUE_EXTENSION}", template.format(&sheet)));

    if destination.exists() && !cmd.force {
        bail!(
            "{} already exists, use --force to overwrite it",
            destination.display()
        );
    }

    let mut writer = CueWriter::new(cmd.writer_options());
    let destination = writer.save_as(&mut sheet, destination)?;

    info!(
        "Wrote {} ({})",
        destination.display(),
        sheet.encoding.unwrap_or_default()
    );
    Ok(())
}

/// Makes relative `FILE` names absolute, resolved against the directory of `input_cue`.
fn resolve_file_references(sheet: &mut CueSheet, input_cue: &Path) -> std::io::Result<()> {
    let input_dir = input_cue
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let input_dir = std::path::absolute(input_dir)?;

    for file in &mut sheet.files {
        if Path::new(&file.filename).is_relative() {
            file.filename = input_dir.join(&file.filename).to_string_lossy().into_owned();
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet_with(filename: &str) -> CueSheet {
        CueParser::parse_str(&format!(
            "FILE \"{filename}\" WAVE\n  TRACK 01 AUDIO\n    INDEX 01 00:00:00\n"
        ))
        .unwrap()
    }

    #[test]
    fn relative_input_resolves_to_absolute_files() {
        let mut sheet = sheet_with("a.wav");
        resolve_file_references(&mut sheet, Path::new("music/album.cue")).unwrap();

        let resolved = Path::new(&sheet.files[0].filename);
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with(Path::new("music").join("a.wav")));
        assert!(resolved.starts_with(std::env::current_dir().unwrap()));
    }

    #[test]
    fn bare_input_name_resolves_against_current_dir() {
        let mut sheet = sheet_with("a.wav");
        resolve_file_references(&mut sheet, Path::new("album.cue")).unwrap();

        assert_eq!(
            Path::new(&sheet.files[0].filename),
            std::env::current_dir().unwrap().join("a.wav")
        );
    }

    #[test]
    fn absolute_files_are_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let absolute = dir.path().join("b.wav");
        let mut sheet = sheet_with(&absolute.to_string_lossy());
        resolve_file_references(&mut sheet, Path::new("music/album.cue")).unwrap();

        assert_eq!(Path::new(&sheet.files[0].filename), absolute);
    }
}
