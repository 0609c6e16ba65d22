use crate::cd::msf::MSF;
use crate::cue::error::{CueError, CueResult};
use crate::cue::models::{CueFile, CueSheet, FileType, Remark, Track, TrackFlags, TrackType};
use crate::writer::encoding::TextEncoding;
use log::debug;
use std::path::{Path, PathBuf};

pub mod error;
pub mod models;

pub struct CueParser {
    cue_path: PathBuf,
}

/// Where sheet-level and track-level statements currently go.
enum Scope {
    Sheet,
    Track,
}

impl CueParser {
    pub fn new(cue_path: impl AsRef<Path>) -> Self {
        Self {
            cue_path: cue_path.as_ref().to_path_buf(),
        }
    }

    pub fn parse(&self) -> CueResult<CueSheet> {
        debug!("Parsing CUE file: {:?}", self.cue_path);
        let data = std::fs::read(&self.cue_path)?;

        let mut cue_sheet = Self::parse_bytes(&data)?;
        cue_sheet.path = Some(self.cue_path.clone());
        Ok(cue_sheet)
    }

    /// Parses raw file contents, detecting and recording their text encoding.
    pub fn parse_bytes(data: &[u8]) -> CueResult<CueSheet> {
        let (text, encoding) = TextEncoding::decode(data);
        let mut cue_sheet = Self::parse_str(&text)?;
        cue_sheet.encoding = Some(encoding);
        Ok(cue_sheet)
    }

    pub fn parse_str(text: &str) -> CueResult<CueSheet> {
        let mut cue_sheet = CueSheet::new();
        let mut scope = Scope::Sheet;

        for (number, line) in text.lines().enumerate() {
            let line_number = number + 1;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let (keyword, rest) = match line.split_once(char::is_whitespace) {
                Some((keyword, rest)) => (keyword, rest.trim()),
                None => (line, ""),
            };
            let keyword = keyword.to_ascii_uppercase();

            let argument = |rest: &str| {
                if rest.is_empty() {
                    Err(CueError::MissingArgument {
                        line: line_number,
                        keyword: keyword.clone(),
                    })
                } else {
                    Ok(())
                }
            };

            match keyword.as_str() {
                "REM" => Self::parse_remark(&mut cue_sheet, &scope, rest)?,
                "FILE" => {
                    argument(rest)?;
                    let (filename, file_type) = Self::parse_file(rest)?;
                    cue_sheet.add_file(CueFile::new(filename, file_type));
                    scope = Scope::Sheet;
                }
                "TRACK" => {
                    argument(rest)?;
                    let (number, track_type) = Self::parse_track(rest)?;
                    let Some(file) = cue_sheet.files.last_mut() else {
                        return Err(CueError::TrackOutsideFile {
                            line: line_number,
                            number,
                        });
                    };
                    file.tracks.push(Track::new(number, track_type));
                    scope = Scope::Track;
                }
                "TITLE" | "PERFORMER" | "SONGWRITER" => {
                    let value = extract_value(rest)?;
                    match (current_track(&mut cue_sheet, &scope), keyword.as_str()) {
                        (Some(track), "TITLE") => track.set_title(value),
                        (Some(track), "PERFORMER") => track.set_performer(value),
                        (Some(track), _) => track.set_composer(value),
                        (None, "TITLE") => cue_sheet.title = Some(value),
                        (None, "PERFORMER") => cue_sheet.performer = Some(value),
                        (None, _) => cue_sheet.composer = Some(value),
                    }
                }
                "CATALOG" => cue_sheet.catalog = Some(extract_value(rest)?),
                "CDTEXTFILE" => cue_sheet.cd_text_file = Some(extract_value(rest)?),
                "ISRC" | "FLAGS" | "INDEX" | "PREGAP" | "POSTGAP" => {
                    argument(rest)?;
                    let Some(track) = current_track(&mut cue_sheet, &scope) else {
                        debug!("Ignoring {keyword} outside of a track on line {line_number}");
                        continue;
                    };
                    Self::parse_track_statement(track, &keyword, rest)?;
                }
                _ => debug!("Skipping unknown statement on line {line_number}: {line}"),
            }
        }

        Ok(cue_sheet)
    }

    fn parse_remark(cue_sheet: &mut CueSheet, scope: &Scope, rest: &str) -> CueResult<()> {
        let named = rest.split_once(char::is_whitespace).filter(|(name, _)| {
            name.chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
        });

        let Some((name, value)) = named else {
            let comment = rest.to_string();
            match current_track(cue_sheet, scope) {
                Some(track) => track.comments.push(comment),
                None => cue_sheet.comments.push(comment),
            }
            return Ok(());
        };

        let value = extract_value(value.trim())?;
        match (current_track(cue_sheet, scope), name) {
            (Some(track), "COMPOSER") => track.set_composer(value),
            (Some(track), _) => track.remarks.push(Remark::new(name, value)),
            (None, "DATE") => cue_sheet.date = Some(value),
            (None, "DISCID") => cue_sheet.disc_id = Some(value),
            (None, "COMPOSER") => cue_sheet.composer = Some(value),
            (None, _) => cue_sheet.remarks.push(Remark::new(name, value)),
        }
        Ok(())
    }

    fn parse_track_statement(track: &mut Track, keyword: &str, rest: &str) -> CueResult<()> {
        match keyword {
            "ISRC" => track.isrc = Some(extract_value(rest)?),
            "FLAGS" => {
                for label in rest.split_whitespace() {
                    match TrackFlags::from_label(label) {
                        Some(flag) => track.flags |= flag,
                        None => debug!("Ignoring unknown track flag {label}"),
                    }
                }
            }
            "INDEX" => {
                let mut parts = rest.split_whitespace();
                let number = parts.next().unwrap_or_default().parse::<u8>()?;
                let position = Self::parse_msf(parts.next().unwrap_or_default())?;
                track.add_index(number, position);
            }
            "PREGAP" => track.pregap = Self::parse_msf(rest)?,
            "POSTGAP" => track.postgap = Self::parse_msf(rest)?,
            _ => {}
        }
        Ok(())
    }

    fn parse_file(rest: &str) -> CueResult<(String, FileType)> {
        let (filename, type_str) = if rest.starts_with('"') {
            let filename = extract_quoted_string(rest)?;
            let type_str = rest[filename.len() + 2..].trim();
            (filename, type_str)
        } else {
            match rest.rsplit_once(char::is_whitespace) {
                Some((filename, type_str)) => (filename.trim().to_string(), type_str),
                None => (rest.to_string(), ""),
            }
        };

        let file_type = if type_str.is_empty() {
            FileType::from_filename(&filename)
        } else {
            FileType::from_label(type_str)
                .ok_or_else(|| CueError::InvalidFileType(type_str.to_string()))?
        };

        Ok((filename, file_type))
    }

    fn parse_track(rest: &str) -> CueResult<(u8, TrackType)> {
        let mut parts = rest.split_whitespace();
        let number = parts.next().unwrap_or_default().parse::<u8>()?;
        let type_str = parts.next().unwrap_or_default();
        let track_type = TrackType::from_label(type_str)
            .ok_or_else(|| CueError::InvalidTrackType(type_str.to_string()))?;

        Ok((number, track_type))
    }

    fn parse_msf(msf_str: &str) -> CueResult<MSF> {
        Ok(msf_str.trim().parse::<MSF>()?)
    }
}

fn current_track<'a>(cue_sheet: &'a mut CueSheet, scope: &Scope) -> Option<&'a mut Track> {
    match scope {
        Scope::Sheet => None,
        Scope::Track => cue_sheet.files.last_mut()?.tracks.last_mut(),
    }
}

/// A quoted value up to its closing quote, or the bare rest of the line.
fn extract_value(rest: &str) -> CueResult<String> {
    if rest.starts_with('"') {
        extract_quoted_string(rest)
    } else {
        Ok(rest.to_string())
    }
}

fn extract_quoted_string(line: &str) -> CueResult<String> {
    let start = line.find('"').ok_or(CueError::MissingQuoteError(
        "Missing opening quote".to_string(),
    ))?;
    let end = line[start + 1..]
        .find('"')
        .map(|end| start + 1 + end)
        .ok_or(CueError::MissingQuoteError(
            "Missing closing quote".to_string(),
        ))?;
    if start >= end {
        return Err(CueError::InvalidQuotedString(line.to_string()));
    }

    Ok(line[start + 1..end].to_string())
}
