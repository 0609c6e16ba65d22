use crate::writer::encoding::TextEncoding;

#[cfg(windows)]
pub const PLATFORM_NEWLINE: &str = "\r\n";
#[cfg(not(windows))]
pub const PLATFORM_NEWLINE: &str = "\n";

/// How track title, performer and composer are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RedundantFieldBehavior {
    /// Write a field only when it was set on the track.
    #[default]
    KeepAsIs,
    /// Like `KeepAsIs`, but skip fields equal to the sheet's value.
    RemoveRedundant,
    /// Always write the title, and performer/composer even when inherited.
    ///
    /// Titles are not inherited, so a track without its own title gets `TITLE ""`.
    /// Performer and composer are skipped when neither the track nor the sheet sets them.
    AlwaysWrite,
}

/// What to do with `"` inside a value, which the cue syntax cannot escape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuoteReplacement {
    /// `"` becomes `'`
    #[default]
    SingleQuote,
    /// Alternating typographic quotes, opening with `“`
    CurlyQuotes,
    /// `"` is dropped
    Remove,
}

impl QuoteReplacement {
    pub fn apply(&self, value: &str) -> String {
        match self {
            QuoteReplacement::SingleQuote => value.replace('"', "'"),
            QuoteReplacement::Remove => value.replace('"', ""),
            QuoteReplacement::CurlyQuotes => {
                let mut opening = true;
                value
                    .chars()
                    .map(|c| {
                        if c != '"' {
                            return c;
                        }
                        let replacement = if opening { '“' } else { '”' };
                        opening = !opening;
                        replacement
                    })
                    .collect()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WriterOptions {
    /// Quote every value, not just those containing whitespace.
    pub force_quotes: bool,
    pub quote_replacement: QuoteReplacement,
    /// Overrides the sheet's own encoding.
    pub encoding: Option<TextEncoding>,
    pub newline: String,
    pub indent_width: usize,
    pub indent_char: char,
    pub redundant_fields: RedundantFieldBehavior,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            force_quotes: false,
            quote_replacement: QuoteReplacement::default(),
            encoding: None,
            newline: PLATFORM_NEWLINE.to_string(),
            indent_width: 2,
            indent_char: ' ',
            redundant_fields: RedundantFieldBehavior::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_replacements() {
        let value = r#"The "Best" Of"#;
        assert_eq!(QuoteReplacement::SingleQuote.apply(value), "The 'Best' Of");
        assert_eq!(QuoteReplacement::Remove.apply(value), "The Best Of");
        assert_eq!(QuoteReplacement::CurlyQuotes.apply(value), "The “Best” Of");
    }

    #[test]
    fn defaults_use_two_space_indent() {
        let options = WriterOptions::default();
        assert_eq!(options.indent_width, 2);
        assert_eq!(options.indent_char, ' ');
        assert_eq!(options.newline, PLATFORM_NEWLINE);
        assert_eq!(options.redundant_fields, RedundantFieldBehavior::KeepAsIs);
    }
}
