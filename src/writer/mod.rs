use crate::cd::msf::MSF;
use crate::cue::models::{CueFile, CueSheet, Remark, Track, TrackFields};
use crate::writer::encoding::TextEncoding;
use crate::writer::error::{WriteError, WriteResult};
use crate::writer::options::{PLATFORM_NEWLINE, RedundantFieldBehavior, WriterOptions};
use crate::writer::template::PathTemplate;
use log::{debug, warn};
use std::path::{Path, PathBuf};

pub mod encoding;
pub mod error;
pub mod options;
pub mod template;

pub const CUE_EXTENSION: &str = "cue";

/// Renders cue sheets to text and writes them to disk.
///
/// The writer reuses one text buffer between calls, so one instance must not be
/// shared across threads without synchronization.
#[derive(Debug, Default)]
pub struct CueWriter {
    options: WriterOptions,
    buffer: String,
}

impl CueWriter {
    pub fn new(options: WriterOptions) -> Self {
        Self {
            options,
            buffer: String::new(),
        }
    }

    pub fn options(&self) -> &WriterOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut WriterOptions {
        &mut self.options
    }

    /// Renders `sheet`, resolving file paths against the sheet's own directory.
    pub fn render(&mut self, sheet: &CueSheet) -> &str {
        self.render_into(sheet, sheet.directory());
        &self.buffer
    }

    /// Writes the sheet to its own path.
    pub fn save(&mut self, sheet: &mut CueSheet) -> WriteResult<PathBuf> {
        let destination = sheet.path.clone().ok_or(WriteError::MissingDestination)?;
        self.write_file(sheet, &destination)?;
        Ok(destination)
    }

    /// Writes the sheet to `path` and makes that its new location.
    pub fn save_as(&mut self, sheet: &mut CueSheet, path: impl AsRef<Path>) -> WriteResult<PathBuf> {
        let destination = path.as_ref().to_path_buf();
        self.write_file(sheet, &destination)?;
        sheet.path = Some(destination.clone());
        Ok(destination)
    }

    /// Writes the sheet to `directory` under a name expanded from `template`.
    ///
    /// The expanded name is always relative, so the file lands inside `directory`.
    pub fn save_with_template(
        &mut self,
        sheet: &mut CueSheet,
        directory: impl AsRef<Path>,
        template: &PathTemplate,
    ) -> WriteResult<PathBuf> {
        let relative = template.format(sheet);
        let destination = directory
            .as_ref()
            .join(format!("{relative}.{CUE_EXTENSION}"));
        self.save_as(sheet, destination)
    }

    fn write_file(&mut self, sheet: &mut CueSheet, destination: &Path) -> WriteResult<()> {
        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        self.render_into(sheet, destination.parent());
        let (bytes, encoding) = self.encode(sheet)?;

        std::fs::write(destination, bytes)?;
        sheet.encoding = Some(encoding);

        debug!("Wrote {} as {encoding}", destination.display());
        Ok(())
    }

    /// Encodes the buffer with the configured, recorded or default encoding, retrying
    /// once with the default if a character does not fit.
    fn encode(&self, sheet: &CueSheet) -> WriteResult<(Vec<u8>, TextEncoding)> {
        let encoding = self
            .options
            .encoding
            .or(sheet.encoding)
            .unwrap_or_default();

        if encoding.needs_bom() && !encoding.has_bom() {
            warn!("Writing {encoding} without a byte order mark, readers may misdetect it");
        }

        match encoding.encode(&self.buffer) {
            Ok(bytes) => Ok((bytes, encoding)),
            Err(WriteError::Unencodable { character, .. }) => {
                let fallback = TextEncoding::default();
                warn!("{character:?} cannot be written as {encoding}, using {fallback} instead");
                Ok((fallback.encode(&self.buffer)?, fallback))
            }
            Err(e) => Err(e),
        }
    }

    fn render_into(&mut self, sheet: &CueSheet, base_dir: Option<&Path>) {
        self.buffer.clear();

        self.write_remarks(0, &sheet.remarks);
        self.write_comments(0, &sheet.comments);
        if let Some(date) = &sheet.date {
            self.write_value_line(0, "REM DATE", date);
        }
        if let Some(disc_id) = &sheet.disc_id {
            self.write_value_line(0, "REM DISCID", disc_id);
        }
        if let Some(cd_text_file) = &sheet.cd_text_file {
            self.write_value_line(0, "CDTEXTFILE", cd_text_file);
        }
        if let Some(catalog) = &sheet.catalog {
            self.write_value_line(0, "CATALOG", catalog);
        }
        if let Some(performer) = &sheet.performer {
            self.write_value_line(0, "PERFORMER", performer);
        }
        if let Some(composer) = &sheet.composer {
            self.write_value_line(0, "REM COMPOSER", composer);
        }
        if let Some(title) = &sheet.title {
            self.write_value_line(0, "TITLE", title);
        }

        for file in &sheet.files {
            self.write_file_header(file, base_dir);
            for track in &file.tracks {
                self.write_track(sheet, track);
            }
        }

        if self.options.newline != PLATFORM_NEWLINE {
            self.buffer = self.buffer.replace(PLATFORM_NEWLINE, &self.options.newline);
        }
    }

    fn write_file_header(&mut self, file: &CueFile, base_dir: Option<&Path>) {
        let path = self.quote(&file.relative_path(base_dir));
        self.write_line(0, &format!("FILE {path} {}", file.file_type.label()));
    }

    fn write_track(&mut self, sheet: &CueSheet, track: &Track) {
        self.write_line(
            1,
            &format!("TRACK {:02} {}", track.number, track.track_type.label()),
        );

        let fields = [
            (TrackFields::TITLE, "TITLE", track.title(), None),
            (
                TrackFields::PERFORMER,
                "PERFORMER",
                track.performer(),
                sheet.performer.as_deref(),
            ),
            (
                TrackFields::COMPOSER,
                "REM COMPOSER",
                track.composer(),
                sheet.composer.as_deref(),
            ),
        ];

        for (field, keyword, value, inherited) in fields {
            if let Some(value) = self.track_field(track, field, value, inherited, sheet) {
                self.write_value_line(2, keyword, &value);
            }
        }

        if let Some(isrc) = &track.isrc {
            self.write_value_line(2, "ISRC", isrc);
        }
        if !track.flags.is_empty() {
            self.write_line(2, &format!("FLAGS {}", track.flags.labels().join(" ")));
        }
        self.write_remarks(2, &track.remarks);
        self.write_comments(2, &track.comments);
        if track.pregap > MSF::ZERO {
            self.write_line(2, &format!("PREGAP {}", track.pregap));
        }
        for index in &track.indices {
            self.write_line(2, &format!("INDEX {:02} {}", index.number, index.position));
        }
        if track.postgap > MSF::ZERO {
            self.write_line(2, &format!("POSTGAP {}", track.postgap));
        }
    }

    /// Value to write for one of the track's inheritable fields, if any.
    fn track_field(
        &self,
        track: &Track,
        field: TrackFields,
        value: &str,
        inherited: Option<&str>,
        sheet: &CueSheet,
    ) -> Option<String> {
        let explicit = track.is_explicit(field);
        let sheet_value = match field {
            TrackFields::TITLE => sheet.title.as_deref(),
            _ => inherited,
        };

        match self.options.redundant_fields {
            RedundantFieldBehavior::KeepAsIs => explicit.then(|| value.to_string()),
            RedundantFieldBehavior::RemoveRedundant => {
                (explicit && Some(value) != sheet_value).then(|| value.to_string())
            }
            RedundantFieldBehavior::AlwaysWrite => {
                let effective = if explicit {
                    value
                } else {
                    inherited.unwrap_or_default()
                };
                (field == TrackFields::TITLE || !effective.is_empty())
                    .then(|| effective.to_string())
            }
        }
    }

    fn write_remarks(&mut self, level: usize, remarks: &[Remark]) {
        for remark in remarks {
            self.write_value_line(level, &format!("REM {}", remark.name), &remark.value);
        }
    }

    fn write_comments(&mut self, level: usize, comments: &[String]) {
        for comment in comments {
            let comment = self.options.quote_replacement.apply(comment);
            self.write_line(level, &format!("REM {comment}"));
        }
    }

    fn write_value_line(&mut self, level: usize, keyword: &str, value: &str) {
        let value = self.quote(value);
        self.write_line(level, &format!("{keyword} {value}"));
    }

    fn write_line(&mut self, level: usize, line: &str) {
        let indent = level * self.options.indent_width;
        self.buffer
            .extend(std::iter::repeat_n(self.options.indent_char, indent));
        self.buffer.push_str(line);
        self.buffer.push_str(PLATFORM_NEWLINE);
    }

    /// Quotes values containing whitespace (or every value when forced), after
    /// replacing the inner quotes the syntax cannot escape.
    fn quote(&self, value: &str) -> String {
        let value = self.options.quote_replacement.apply(value);
        if self.options.force_quotes || value.is_empty() || value.chars().any(char::is_whitespace) {
            format!("\"{value}\"")
        } else {
            value
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cue::models::{FileType, TrackFlags, TrackType};
    use crate::writer::options::QuoteReplacement;
    use encoding_rs::WINDOWS_1252;

    fn options() -> WriterOptions {
        WriterOptions {
            newline: "\n".to_string(),
            ..WriterOptions::default()
        }
    }

    fn msf(m: u32, s: u32, f: u32) -> MSF {
        MSF::new(m, s, f).unwrap()
    }

    fn album() -> CueSheet {
        let mut sheet = CueSheet::new();
        sheet.remarks.push(Remark::new("GENRE", "Jazz"));
        sheet.comments.push("ExactAudioCopy v1.6".to_string());
        sheet.date = Some("1959".to_string());
        sheet.disc_id = Some("6D0A7C08".to_string());
        sheet.catalog = Some("5099750442227".to_string());
        sheet.performer = Some("Miles Davis".to_string());
        sheet.composer = Some("Miles Davis".to_string());
        sheet.title = Some("Kind of Blue".to_string());

        let file = sheet.add_file(CueFile::new("Kind of Blue.wav", FileType::Wave));

        let mut first = Track::new(1, TrackType::Audio);
        first.set_title("So What");
        first.set_performer("Miles Davis");
        first.isrc = Some("USSM15900113".to_string());
        first.add_index(1, MSF::ZERO);
        file.tracks.push(first);

        let mut second = Track::new(2, TrackType::Audio);
        second.set_title("Freddie Freeloader");
        second.set_performer("Miles Davis Sextet");
        second.flags = TrackFlags::DCP | TrackFlags::PRE;
        second.pregap = msf(0, 2, 0);
        second.add_index(0, msf(9, 20, 10));
        second.add_index(1, msf(9, 22, 10));
        second.postgap = msf(0, 1, 0);
        file.tracks.push(second);

        sheet
    }

    #[test]
    fn renders_statements_in_order() {
        let mut writer = CueWriter::new(options());
        let text = writer.render(&album()).to_string();

        let expected = "\
REM GENRE Jazz
REM ExactAudioCopy v1.6
REM DATE 1959
REM DISCID 6D0A7C08
CATALOG 5099750442227
PERFORMER \"Miles Davis\"
REM COMPOSER \"Miles Davis\"
TITLE \"Kind of Blue\"
FILE \"Kind of Blue.wav\" WAVE
  TRACK 01 AUDIO
    TITLE \"So What\"
    PERFORMER \"Miles Davis\"
    ISRC USSM15900113
    INDEX 01 00:00:00
  TRACK 02 AUDIO
    TITLE \"Freddie Freeloader\"
    PERFORMER \"Miles Davis Sextet\"
    FLAGS DCP PRE
    PREGAP 00:02:00
    INDEX 00 09:20:10
    INDEX 01 09:22:10
    POSTGAP 00:01:00
";
        assert_eq!(text, expected);
    }

    #[test]
    fn redundant_performer_policies() {
        let sheet = album();

        let mut writer = CueWriter::new(options());
        assert!(writer.render(&sheet).contains("    PERFORMER \"Miles Davis\"\n"));

        writer.options_mut().redundant_fields = RedundantFieldBehavior::RemoveRedundant;
        let text = writer.render(&sheet).to_string();
        assert!(!text.contains("    PERFORMER \"Miles Davis\"\n"));
        assert!(text.contains("    PERFORMER \"Miles Davis Sextet\"\n"));

        writer.options_mut().redundant_fields = RedundantFieldBehavior::AlwaysWrite;
        assert!(writer.render(&sheet).contains("    PERFORMER \"Miles Davis\"\n"));
    }

    #[test]
    fn always_write_fills_inherited_fields() {
        let mut sheet = album();
        let track = &mut sheet.files[0].tracks[0];
        track.clear(TrackFields::TITLE | TrackFields::PERFORMER);

        let mut writer = CueWriter::new(options());
        let text = writer.render(&sheet).to_string();
        assert!(!text.contains("TITLE \"So What\""));
        assert!(!text.contains("    TITLE \"\""));

        writer.options_mut().redundant_fields = RedundantFieldBehavior::AlwaysWrite;
        let text = writer.render(&sheet).to_string();
        assert!(text.contains("  TRACK 01 AUDIO\n    TITLE \"\"\n    PERFORMER \"Miles Davis\"\n"));
        assert!(text.contains("    REM COMPOSER \"Miles Davis\"\n"));
    }

    #[test]
    fn quoting_depends_on_whitespace_unless_forced() {
        let mut sheet = CueSheet::new();
        sheet.title = Some("Single".to_string());
        sheet.performer = Some("Two Words".to_string());

        let mut writer = CueWriter::new(options());
        let text = writer.render(&sheet).to_string();
        assert!(text.contains("TITLE Single\n"));
        assert!(text.contains("PERFORMER \"Two Words\"\n"));

        writer.options_mut().force_quotes = true;
        let text = writer.render(&sheet).to_string();
        assert!(text.contains("TITLE \"Single\"\n"));
        assert!(text.contains("PERFORMER \"Two Words\"\n"));
    }

    #[test]
    fn inner_quotes_are_replaced() {
        let mut sheet = CueSheet::new();
        sheet.title = Some(r#"The "Best""#.to_string());

        let mut writer = CueWriter::new(options());
        assert!(writer.render(&sheet).contains("TITLE \"The 'Best'\"\n"));

        writer.options_mut().quote_replacement = QuoteReplacement::Remove;
        assert!(writer.render(&sheet).contains("TITLE \"The Best\"\n"));
    }

    #[test]
    fn newline_and_indent_are_configurable() {
        let mut writer = CueWriter::new(WriterOptions {
            newline: "\r\n".to_string(),
            indent_width: 1,
            indent_char: '\t',
            ..WriterOptions::default()
        });

        let text = writer.render(&album()).to_string();
        assert!(text.contains("FILE \"Kind of Blue.wav\" WAVE\r\n\tTRACK 01 AUDIO\r\n\t\tTITLE"));
        assert!(!text.replace("\r\n", "").contains('\n'));
    }

    #[test]
    fn render_clears_previous_output() {
        let mut writer = CueWriter::new(options());
        let first = writer.render(&album()).len();
        let second = writer.render(&album()).len();
        assert_eq!(first, second);
    }

    #[test]
    fn save_without_path_fails() {
        let mut writer = CueWriter::new(options());
        let mut sheet = album();
        assert!(matches!(
            writer.save(&mut sheet),
            Err(WriteError::MissingDestination)
        ));
    }

    #[test]
    fn save_as_creates_directories_and_records_encoding() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("nested").join("album.cue");

        let mut writer = CueWriter::new(options());
        let mut sheet = album();
        writer.save_as(&mut sheet, &destination).unwrap();

        let bytes = std::fs::read(&destination).unwrap();
        assert!(bytes.starts_with(b"REM GENRE Jazz\n"));
        assert_eq!(sheet.path.as_deref(), Some(destination.as_path()));
        assert_eq!(sheet.encoding, Some(TextEncoding::Utf8 { bom: false }));
    }

    #[test]
    fn unencodable_text_falls_back_to_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("album.cue");

        let mut sheet = album();
        sheet.title = Some("東京".to_string());
        sheet.encoding = Some(TextEncoding::Legacy(WINDOWS_1252));

        let mut writer = CueWriter::new(options());
        writer.save_as(&mut sheet, &destination).unwrap();

        let text = std::fs::read_to_string(&destination).unwrap();
        assert!(text.contains("TITLE 東京\n"));
        assert_eq!(sheet.encoding, Some(TextEncoding::Utf8 { bom: false }));
    }

    #[test]
    fn writer_encoding_overrides_sheet_encoding() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("album.cue");

        let mut sheet = album();
        sheet.title = Some("Café".to_string());

        let mut writer = CueWriter::new(WriterOptions {
            encoding: Some(TextEncoding::Legacy(WINDOWS_1252)),
            ..options()
        });
        writer.save_as(&mut sheet, &destination).unwrap();

        let bytes = std::fs::read(&destination).unwrap();
        assert!(bytes.windows(10).any(|w| w == b"TITLE Caf\xE9"));
        assert_eq!(sheet.encoding, Some(TextEncoding::Legacy(WINDOWS_1252)));
    }

    #[test]
    fn save_with_template_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut sheet = album();

        let mut writer = CueWriter::new(options());
        let path = writer
            .save_with_template(&mut sheet, dir.path(), &PathTemplate::new("%Artist%/%Title%"))
            .unwrap();

        assert_eq!(
            path,
            dir.path().join("Miles Davis").join("Kind of Blue.cue")
        );
        assert!(path.exists());
    }

    #[test]
    fn save_with_template_stays_inside_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        let template = PathTemplate::new("%Title%");
        let mut writer = CueWriter::new(options());

        let mut sheet = album();
        sheet.title = Some(outside.path().join("escaped").to_string_lossy().into_owned());
        let path = writer
            .save_with_template(&mut sheet, dir.path(), &template)
            .unwrap();
        assert!(path.starts_with(dir.path()), "{}", path.display());
        assert!(!outside.path().join("escaped.cue").exists());

        let mut sheet = album();
        sheet.title = Some("../../evil".to_string());
        let path = writer
            .save_with_template(&mut sheet, dir.path(), &template)
            .unwrap();
        assert_eq!(path, dir.path().join("evil.cue"));
    }

    #[test]
    fn file_paths_are_written_relative_to_the_destination() {
        let dir = tempfile::tempdir().unwrap();
        let mut sheet = album();
        sheet.files[0].filename = dir
            .path()
            .join("Kind of Blue.wav")
            .to_string_lossy()
            .into_owned();

        let mut writer = CueWriter::new(options());
        let destination = writer.save_as(&mut sheet, dir.path().join("album.cue")).unwrap();
        let text = std::fs::read_to_string(destination).unwrap();
        assert!(text.contains("FILE \"Kind of Blue.wav\" WAVE\n"));
    }
}
