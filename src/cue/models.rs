use crate::cd::msf::MSF;
use crate::cd::{FRAMES_PER_SECOND, LEAD_IN_FRAMES, SECTOR_SIZE, TrackMode};
use crate::metadata::AudioMetadata;
use crate::metadata::registry::DecoderRegistry;
use crate::writer::encoding::TextEncoding;
use bitflags::bitflags;
use log::{debug, warn};
use std::path::{Path, PathBuf};

pub const DEFAULT_SHEET_NAME: &str = "Untitled";

#[derive(Debug, Clone, Default)]
pub struct CueSheet {
    /// Location of the .cue file, if it has one.
    pub path: Option<PathBuf>,

    /// Encoding the sheet was read with, updated after every successful write.
    pub encoding: Option<TextEncoding>,

    pub remarks: Vec<Remark>,
    pub comments: Vec<String>,
    pub date: Option<String>,
    pub disc_id: Option<String>,
    pub cd_text_file: Option<String>,
    pub catalog: Option<String>,
    pub performer: Option<String>,
    pub composer: Option<String>,
    pub title: Option<String>,
    pub files: Vec<CueFile>,
}

/// `REM <NAME> <value>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remark {
    pub name: String,
    pub value: String,
}

impl Remark {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CueFile {
    pub filename: String,
    pub file_type: FileType,
    pub tracks: Vec<Track>,
    pub metadata: Option<AudioMetadata>,
}

bitflags! {
    /// Track fields that were set on the track itself rather than inherited.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TrackFields: u8 {
        const TITLE = 1 << 0;
        const PERFORMER = 1 << 1;
        const COMPOSER = 1 << 2;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TrackFlags: u8 {
        const DCP = 1 << 0;
        const FOUR_CHANNEL = 1 << 1;
        const PRE = 1 << 2;
        const SCMS = 1 << 3;
    }
}

impl TrackFlags {
    const LABELS: [(TrackFlags, &'static str); 4] = [
        (TrackFlags::DCP, "DCP"),
        (TrackFlags::FOUR_CHANNEL, "4CH"),
        (TrackFlags::PRE, "PRE"),
        (TrackFlags::SCMS, "SCMS"),
    ];

    pub fn from_label(label: &str) -> Option<Self> {
        Self::LABELS
            .iter()
            .find(|(_, l)| l.eq_ignore_ascii_case(label))
            .map(|(flag, _)| *flag)
    }

    pub fn labels(&self) -> Vec<&'static str> {
        Self::LABELS
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, label)| *label)
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct Track {
    pub number: u8,
    pub track_type: TrackType,
    title: String,
    performer: String,
    composer: String,
    explicit: TrackFields,
    pub isrc: Option<String>,
    pub flags: TrackFlags,
    pub remarks: Vec<Remark>,
    pub comments: Vec<String>,
    pub pregap: MSF,
    pub postgap: MSF,
    pub indices: Vec<Index>,
}

impl Track {
    pub fn new(number: u8, track_type: TrackType) -> Self {
        Self {
            number,
            track_type,
            title: String::new(),
            performer: String::new(),
            composer: String::new(),
            explicit: TrackFields::empty(),
            isrc: None,
            flags: TrackFlags::empty(),
            remarks: Vec::new(),
            comments: Vec::new(),
            pregap: MSF::ZERO,
            postgap: MSF::ZERO,
            indices: Vec::new(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn performer(&self) -> &str {
        &self.performer
    }

    pub fn composer(&self) -> &str {
        &self.composer
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
        self.explicit.insert(TrackFields::TITLE);
    }

    pub fn set_performer(&mut self, performer: impl Into<String>) {
        self.performer = performer.into();
        self.explicit.insert(TrackFields::PERFORMER);
    }

    pub fn set_composer(&mut self, composer: impl Into<String>) {
        self.composer = composer.into();
        self.explicit.insert(TrackFields::COMPOSER);
    }

    /// Resets a field to its default and marks it as not explicitly set.
    pub fn clear(&mut self, fields: TrackFields) {
        if fields.contains(TrackFields::TITLE) {
            self.title.clear();
        }
        if fields.contains(TrackFields::PERFORMER) {
            self.performer.clear();
        }
        if fields.contains(TrackFields::COMPOSER) {
            self.composer.clear();
        }
        self.explicit.remove(fields);
    }

    pub fn explicit_fields(&self) -> TrackFields {
        self.explicit
    }

    pub fn is_explicit(&self, field: TrackFields) -> bool {
        self.explicit.contains(field)
    }

    pub fn add_index(&mut self, number: u8, position: MSF) {
        self.indices.push(Index { number, position });
    }

    /// INDEX 01, or the first index when the track has no INDEX 01.
    pub fn start(&self) -> Option<MSF> {
        self.indices
            .iter()
            .find(|i| i.number == 1)
            .or_else(|| self.indices.first())
            .map(|i| i.position)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Index {
    pub number: u8,
    pub position: MSF,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackType {
    Audio,
    CdG,
    Mode1_2048,
    Mode1_2352,
    Mode2_2336,
    Mode2_2352,
    CdI2336,
    CdI2352,
}

impl TrackType {
    pub fn from_label(label: &str) -> Option<Self> {
        match label.to_ascii_uppercase().as_str() {
            "AUDIO" => Some(TrackType::Audio),
            "CDG" => Some(TrackType::CdG),
            "MODE1/2048" => Some(TrackType::Mode1_2048),
            "MODE1/2352" => Some(TrackType::Mode1_2352),
            "MODE2/2336" => Some(TrackType::Mode2_2336),
            "MODE2/2352" => Some(TrackType::Mode2_2352),
            "CDI/2336" => Some(TrackType::CdI2336),
            "CDI/2352" => Some(TrackType::CdI2352),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TrackType::Audio => "AUDIO",
            TrackType::CdG => "CDG",
            TrackType::Mode1_2048 => "MODE1/2048",
            TrackType::Mode1_2352 => "MODE1/2352",
            TrackType::Mode2_2336 => "MODE2/2336",
            TrackType::Mode2_2352 => "MODE2/2352",
            TrackType::CdI2336 => "CDI/2336",
            TrackType::CdI2352 => "CDI/2352",
        }
    }

    pub fn sector_size(&self) -> usize {
        match self {
            TrackType::Audio => SECTOR_SIZE,
            TrackType::CdG => SECTOR_SIZE + 96,
            TrackType::Mode1_2048 => 2048,
            TrackType::Mode1_2352 => SECTOR_SIZE,
            TrackType::Mode2_2336 | TrackType::CdI2336 => 2336,
            TrackType::Mode2_2352 | TrackType::CdI2352 => SECTOR_SIZE,
        }
    }

    pub fn mode(&self) -> TrackMode {
        match self {
            TrackType::Audio | TrackType::CdG => TrackMode::Mode0,
            TrackType::Mode1_2048 | TrackType::Mode1_2352 => TrackMode::Mode1,
            TrackType::Mode2_2336
            | TrackType::Mode2_2352
            | TrackType::CdI2336
            | TrackType::CdI2352 => TrackMode::Mode2,
        }
    }

    pub fn contains_audio_data(&self) -> bool {
        matches!(self, TrackType::Audio | TrackType::CdG)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    Binary,
    Motorola,
    Aiff,
    Wave,
    Mp3,
}

impl FileType {
    pub fn from_label(label: &str) -> Option<Self> {
        match label.to_ascii_uppercase().as_str() {
            "BINARY" => Some(FileType::Binary),
            "MOTOROLA" => Some(FileType::Motorola),
            "AIFF" => Some(FileType::Aiff),
            "WAVE" => Some(FileType::Wave),
            "MP3" => Some(FileType::Mp3),
            _ => None,
        }
    }

    /// Guesses the type from a file name; anything not recognized is treated as WAVE,
    /// which is what most players expect for decoded audio.
    pub fn from_filename(filename: &str) -> Self {
        let extension = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("bin" | "img" | "raw" | "iso") => FileType::Binary,
            Some("aif" | "aiff") => FileType::Aiff,
            Some("mp3") => FileType::Mp3,
            _ => FileType::Wave,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FileType::Binary => "BINARY",
            FileType::Motorola => "MOTOROLA",
            FileType::Aiff => "AIFF",
            FileType::Wave => "WAVE",
            FileType::Mp3 => "MP3",
        }
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, FileType::Binary | FileType::Motorola)
    }
}

impl CueFile {
    pub fn new(filename: impl Into<String>, file_type: FileType) -> Self {
        Self {
            filename: filename.into(),
            file_type,
            tracks: Vec::new(),
            metadata: None,
        }
    }

    /// The file name as it should appear relative to `base_dir`.
    pub fn relative_path(&self, base_dir: Option<&Path>) -> String {
        let path = Path::new(&self.filename);
        match base_dir {
            Some(base) if path.is_absolute() => path
                .strip_prefix(base)
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_else(|_| self.filename.clone()),
            _ => self.filename.clone(),
        }
    }

    pub fn track_types(&self) -> Vec<TrackType> {
        self.tracks.iter().map(|t| t.track_type).collect()
    }
}

impl CueSheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn directory(&self) -> Option<&Path> {
        self.path.as_deref().and_then(Path::parent)
    }

    /// File stem of the sheet's own path.
    pub fn file_stem(&self) -> Option<String> {
        self.path
            .as_deref()
            .and_then(Path::file_stem)
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.trim().is_empty())
    }

    pub fn add_file(&mut self, file: CueFile) -> &mut CueFile {
        self.files.push(file);
        let last = self.files.len() - 1;
        &mut self.files[last]
    }

    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.files.iter().flat_map(|f| f.tracks.iter())
    }

    pub fn track_count(&self) -> usize {
        self.tracks().count()
    }

    /// Value of the first remark named `name`, case-insensitive.
    pub fn remark(&self, name: &str) -> Option<&str> {
        self.remarks
            .iter()
            .find(|r| r.name.eq_ignore_ascii_case(name))
            .map(|r| r.value.as_str())
    }

    /// Resolves every referenced file through `registry` and stores the result on it.
    ///
    /// Relative file names are resolved against the sheet's directory. Files whose
    /// metadata cannot be determined keep `None`. Returns the number of files that
    /// received metadata.
    pub fn attach_metadata(&mut self, registry: &DecoderRegistry) -> usize {
        let base_dir = self.directory().map(Path::to_path_buf);
        let mut attached = 0;

        for file in &mut self.files {
            let path = match &base_dir {
                Some(dir) => dir.join(&file.filename),
                None => PathBuf::from(&file.filename),
            };

            let result = if file.file_type.is_binary() {
                registry.resolve_binary(&path, &file.track_types())
            } else {
                registry.resolve(&path)
            };

            match result {
                Ok(metadata) => {
                    if metadata.is_some() {
                        attached += 1;
                    }
                    file.metadata = metadata;
                }
                Err(e) => {
                    warn!("Could not read {}: {e}", path.display());
                    file.metadata = None;
                }
            }
        }

        debug!("Attached metadata to {attached}/{} files", self.files.len());
        attached
    }

    /// FreeDB disc id of the sheet, when every file has metadata attached.
    ///
    /// Files are laid out back to back on the disc and each track starts at its
    /// INDEX 01 within its file.
    pub fn calculate_disc_id(&self) -> Option<String> {
        let mut file_offset = 0u32;
        let mut track_offsets = Vec::new();

        for file in &self.files {
            let length = file.metadata.as_ref()?.msf().total_frames();
            for track in &file.tracks {
                let start = track.start().unwrap_or(MSF::ZERO).total_frames();
                track_offsets.push(file_offset + start + LEAD_IN_FRAMES);
            }
            file_offset += length;
        }

        let first = *track_offsets.first()?;
        let lead_out = file_offset + LEAD_IN_FRAMES;

        let checksum: u32 = track_offsets
            .iter()
            .map(|offset| digit_sum(offset / FRAMES_PER_SECOND))
            .sum();
        let length_seconds = lead_out / FRAMES_PER_SECOND - first / FRAMES_PER_SECOND;
        let id = ((checksum % 0xFF) << 24) | (length_seconds << 8) | track_offsets.len() as u32;

        Some(format!("{id:08X}"))
    }
}

fn digit_sum(mut n: u32) -> u32 {
    let mut sum = 0;
    while n > 0 {
        sum += n % 10;
        n /= 10;
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn audio_track(number: u8, start: MSF) -> Track {
        let mut track = Track::new(number, TrackType::Audio);
        track.add_index(1, start);
        track
    }

    #[test]
    fn setters_mark_fields_explicit() {
        let mut track = Track::new(1, TrackType::Audio);
        assert!(track.explicit_fields().is_empty());

        track.set_performer("Someone");
        assert!(track.is_explicit(TrackFields::PERFORMER));
        assert!(!track.is_explicit(TrackFields::TITLE));

        track.clear(TrackFields::PERFORMER);
        assert!(!track.is_explicit(TrackFields::PERFORMER));
        assert_eq!(track.performer(), "");
    }

    #[test]
    fn track_flag_labels_keep_canonical_order() {
        let flags = TrackFlags::SCMS | TrackFlags::DCP | TrackFlags::FOUR_CHANNEL;
        assert_eq!(flags.labels(), vec!["DCP", "4CH", "SCMS"]);
        assert_eq!(TrackFlags::from_label("4ch"), Some(TrackFlags::FOUR_CHANNEL));
        assert_eq!(TrackFlags::from_label("XYZ"), None);
    }

    #[test]
    fn track_type_descriptors() {
        assert_eq!(TrackType::Mode1_2352.sector_size(), 2352);
        assert_eq!(TrackType::Mode1_2352.mode(), TrackMode::Mode1);
        assert_eq!(TrackType::Mode2_2336.mode(), TrackMode::Mode2);
        assert!(TrackType::Audio.contains_audio_data());
        assert!(!TrackType::Mode1_2048.contains_audio_data());
        assert_eq!(TrackType::from_label("mode2/2352"), Some(TrackType::Mode2_2352));
        assert_eq!(TrackType::CdI2352.label(), "CDI/2352");
    }

    #[test]
    fn file_type_from_filename() {
        assert_eq!(FileType::from_filename("disc.BIN"), FileType::Binary);
        assert_eq!(FileType::from_filename("a.mp3"), FileType::Mp3);
        assert_eq!(FileType::from_filename("a.flac"), FileType::Wave);
    }

    #[test]
    fn relative_path_strips_base_dir() {
        let base = std::env::temp_dir();
        let absolute = base.join("album").join("01.wav");
        let file = CueFile::new(absolute.to_string_lossy(), FileType::Wave);
        assert_eq!(
            file.relative_path(Some(&base)),
            Path::new("album").join("01.wav").to_string_lossy()
        );
        assert_eq!(
            CueFile::new("01.wav", FileType::Wave).relative_path(Some(&base)),
            "01.wav"
        );
    }

    #[test]
    fn disc_id_requires_metadata() {
        let mut sheet = CueSheet::new();
        let file = sheet.add_file(CueFile::new("a.wav", FileType::Wave));
        file.tracks.push(audio_track(1, MSF::ZERO));
        assert_eq!(sheet.calculate_disc_id(), None);
    }

    #[test]
    fn disc_id_of_single_file_layout() {
        let mut sheet = CueSheet::new();
        let file = sheet.add_file(CueFile::new("a.wav", FileType::Wave));
        file.tracks.push(audio_track(1, MSF::ZERO));
        file.tracks.push(audio_track(2, MSF::new(3, 0, 0).unwrap()));
        file.metadata = Some(AudioMetadata::new("WAVE", Duration::from_secs(600)));

        // Track offsets are 150 and 13650 frames: 2 s and 182 s.
        // Digit sums 2 + 11 = 13, playing time 602 - 2 = 600 s.
        let expected = (13u32 << 24) | (600 << 8) | 2;
        assert_eq!(sheet.calculate_disc_id(), Some(format!("{expected:08X}")));
    }

    #[test]
    fn remark_lookup_is_case_insensitive() {
        let mut sheet = CueSheet::new();
        sheet.remarks.push(Remark::new("GENRE", "Jazz"));
        assert_eq!(sheet.remark("genre"), Some("Jazz"));
        assert_eq!(sheet.remark("comment"), None);
    }
}
