//! Destination paths built from `%Token%` patterns such as `%Performer%/%Title%`.

use crate::cue::models::{CueSheet, DEFAULT_SHEET_NAME};
use lazy_static::lazy_static;
use log::warn;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::path::MAIN_SEPARATOR_STR;

type TokenFn = fn(&CueSheet) -> String;

const INVALID_PATH_CHARS: [char; 7] = ['<', '>', ':', '"', '|', '?', '*'];
const PATH_SEPARATORS: [char; 2] = ['/', '\\'];

fn text(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

lazy_static! {
    static ref PLACEHOLDER: Regex = Regex::new(r"%([^%]*)%").unwrap();
    static ref TOKENS: HashMap<&'static str, TokenFn> = {
        let mut tokens: HashMap<&'static str, TokenFn> = HashMap::new();

        let title: TokenFn = |sheet| text(&sheet.title);
        let performer: TokenFn = |sheet| text(&sheet.performer);
        let composer: TokenFn = |sheet| text(&sheet.composer);
        let date: TokenFn = |sheet| text(&sheet.date);
        let disc_id: TokenFn = |sheet| text(&sheet.disc_id);
        let catalog: TokenFn = |sheet| text(&sheet.catalog);
        let file_name: TokenFn = |sheet| sheet.file_stem().unwrap_or_default();
        let track_count: TokenFn = |sheet| format!("{:02}", sheet.track_count());
        let genre: TokenFn = |sheet| sheet.remark("GENRE").unwrap_or_default().to_string();

        for (names, token) in [
            (&["title", "album", "albumtitle"][..], title),
            (&["performer", "artist", "albumartist"][..], performer),
            (&["composer", "songwriter"][..], composer),
            (&["date", "year"][..], date),
            (&["discid", "freedbid"][..], disc_id),
            (&["catalog", "upc", "ean"][..], catalog),
            (&["filename", "name"][..], file_name),
            (&["trackcount", "tracks", "totaltracks"][..], track_count),
            (&["genre"][..], genre),
        ] {
            for name in names {
                tokens.insert(*name, token);
            }
        }

        tokens
    };
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    pattern: String,
}

impl PathTemplate {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Expands the pattern against `sheet` into a relative path without extension.
    ///
    /// Unknown tokens are dropped with a warning. Falls back to the sheet's file name
    /// when the pattern or its expansion is empty.
    pub fn format(&self, sheet: &CueSheet) -> String {
        if self.pattern.trim().is_empty() {
            return Self::fallback(sheet, "the pattern is empty");
        }

        let expansion = self.expand(sheet);
        for token in &expansion.unresolved {
            warn!("Unknown path token %{token}%");
        }

        let sanitized = sanitize(&expansion.text);
        if sanitized.is_empty() {
            return Self::fallback(sheet, "the expanded path is empty");
        }

        sanitized
    }

    fn expand(&self, sheet: &CueSheet) -> Expansion {
        let mut unresolved = Vec::new();

        let text = PLACEHOLDER.replace_all(&self.pattern, |captures: &Captures| {
            let name: String = captures[1]
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .to_lowercase();

            match TOKENS.get(name.as_str()) {
                Some(token) => token(sheet),
                None => {
                    unresolved.push(captures[1].to_string());
                    String::new()
                }
            }
        });

        Expansion {
            text: text.into_owned(),
            unresolved,
        }
    }

    fn fallback(sheet: &CueSheet, reason: &str) -> String {
        let name = sheet
            .file_stem()
            .unwrap_or_else(|| DEFAULT_SHEET_NAME.to_string());
        warn!("Using \"{name}\" as file name because {reason}");
        name
    }
}

/// Pattern text with every placeholder replaced.
struct Expansion {
    text: String,
    /// Placeholder names without a matching token, as written.
    unresolved: Vec<String>,
}

/// Replaces characters not allowed in paths with `_` and rebuilds the path from its
/// named components.
///
/// Empty, `.` and `..` components are dropped, so the result is always relative and
/// never climbs above the directory it is joined to.
pub fn sanitize(path: &str) -> String {
    let replaced: String = path
        .chars()
        .map(|c| {
            if c.is_control() || INVALID_PATH_CHARS.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .collect();

    replaced
        .split(PATH_SEPARATORS)
        .map(str::trim)
        .filter(|component| !component.is_empty() && *component != "." && *component != "..")
        .collect::<Vec<_>>()
        .join(MAIN_SEPARATOR_STR)
}
