use crate::writer::error::{WriteError, WriteResult};
use encoding_rs::{EncoderResult, Encoding, UTF_8, UTF_16BE, UTF_16LE, WINDOWS_1252};
use std::fmt::Display;
use std::str::FromStr;

const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];
const UTF16LE_BOM: [u8; 2] = [0xFF, 0xFE];
const UTF16BE_BOM: [u8; 2] = [0xFE, 0xFF];

/// Text encoding of a cue file.
///
/// Unicode encodings carry their byte order mark choice; everything else is a
/// single `encoding_rs` code page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8 { bom: bool },
    Utf16Le { bom: bool },
    Utf16Be { bom: bool },
    Legacy(&'static Encoding),
}

impl Default for TextEncoding {
    fn default() -> Self {
        TextEncoding::Utf8 { bom: false }
    }
}

impl TextEncoding {
    /// Looks up a WHATWG encoding label. `utf-8-bom` / `utf-8-sig` select UTF-8
    /// with a byte order mark; UTF-16 labels always get one.
    pub fn for_label(label: &str) -> Option<Self> {
        let label = label.trim();
        if label.eq_ignore_ascii_case("utf-8-bom") || label.eq_ignore_ascii_case("utf-8-sig") {
            return Some(TextEncoding::Utf8 { bom: true });
        }

        Encoding::for_label(label.as_bytes()).map(Self::from_encoding)
    }

    fn from_encoding(encoding: &'static Encoding) -> Self {
        if encoding == UTF_8 {
            TextEncoding::Utf8 { bom: false }
        } else if encoding == UTF_16LE {
            TextEncoding::Utf16Le { bom: true }
        } else if encoding == UTF_16BE {
            TextEncoding::Utf16Be { bom: true }
        } else {
            TextEncoding::Legacy(encoding)
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TextEncoding::Utf8 { .. } => UTF_8.name(),
            TextEncoding::Utf16Le { .. } => UTF_16LE.name(),
            TextEncoding::Utf16Be { .. } => UTF_16BE.name(),
            TextEncoding::Legacy(encoding) => encoding.name(),
        }
    }

    pub fn has_bom(&self) -> bool {
        match self {
            TextEncoding::Utf8 { bom }
            | TextEncoding::Utf16Le { bom }
            | TextEncoding::Utf16Be { bom } => *bom,
            TextEncoding::Legacy(_) => false,
        }
    }

    /// Encodings whose byte order cannot be guessed without a byte order mark.
    pub fn needs_bom(&self) -> bool {
        matches!(
            self,
            TextEncoding::Utf16Le { .. } | TextEncoding::Utf16Be { .. }
        )
    }

    /// Encodes `text`, failing on the first character the encoding cannot represent.
    pub fn encode(&self, text: &str) -> WriteResult<Vec<u8>> {
        match self {
            TextEncoding::Utf8 { bom } => {
                let mut bytes = Vec::with_capacity(text.len() + 3);
                if *bom {
                    bytes.extend_from_slice(&UTF8_BOM);
                }
                bytes.extend_from_slice(text.as_bytes());
                Ok(bytes)
            }
            TextEncoding::Utf16Le { bom } => {
                Ok(encode_utf16(text, *bom, UTF16LE_BOM, u16::to_le_bytes))
            }
            TextEncoding::Utf16Be { bom } => {
                Ok(encode_utf16(text, *bom, UTF16BE_BOM, u16::to_be_bytes))
            }
            TextEncoding::Legacy(encoding) => encode_legacy(*encoding, text),
        }
    }

    /// Decodes file contents, detecting the encoding.
    ///
    /// A byte order mark wins; otherwise valid UTF-8 is taken as UTF-8 and anything
    /// else as Windows-1252, the usual code page of cue files written on Windows.
    pub fn decode(bytes: &[u8]) -> (String, TextEncoding) {
        if let Some((encoding, bom_length)) = Encoding::for_bom(bytes) {
            let (text, _) = encoding.decode_without_bom_handling(&bytes[bom_length..]);
            let detected = match Self::from_encoding(encoding) {
                TextEncoding::Utf8 { .. } => TextEncoding::Utf8 { bom: true },
                other => other,
            };
            return (text.into_owned(), detected);
        }

        match std::str::from_utf8(bytes) {
            Ok(text) => (text.to_string(), TextEncoding::Utf8 { bom: false }),
            Err(_) => {
                let (text, _) = WINDOWS_1252.decode_without_bom_handling(bytes);
                (text.into_owned(), TextEncoding::Legacy(WINDOWS_1252))
            }
        }
    }
}

fn encode_utf16(text: &str, bom: bool, mark: [u8; 2], to_bytes: fn(u16) -> [u8; 2]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(text.len() * 2 + 2);
    if bom {
        bytes.extend_from_slice(&mark);
    }
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&to_bytes(unit));
    }
    bytes
}

fn encode_legacy(encoding: &'static Encoding, text: &str) -> WriteResult<Vec<u8>> {
    let mut encoder = encoding.new_encoder();
    let capacity = encoder
        .max_buffer_length_from_utf8_without_replacement(text.len())
        .ok_or_else(|| WriteError::UnknownEncoding(encoding.name().to_string()))?;

    let mut bytes = vec![0u8; capacity];
    let (result, _, written) =
        encoder.encode_from_utf8_without_replacement(text, &mut bytes, true);

    match result {
        EncoderResult::InputEmpty => {
            bytes.truncate(written);
            Ok(bytes)
        }
        EncoderResult::Unmappable(character) => Err(WriteError::Unencodable {
            character,
            encoding: encoding.name(),
        }),
        EncoderResult::OutputFull => Err(WriteError::IoError(std::io::Error::other(format!(
            "{} encoder ran out of buffer space",
            encoding.name()
        )))),
    }
}

impl Display for TextEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.has_bom() {
            write!(f, "{} (BOM)", self.name())
        } else {
            write!(f, "{}", self.name())
        }
    }
}

impl FromStr for TextEncoding {
    type Err = WriteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TextEncoding::for_label(s).ok_or_else(|| WriteError::UnknownEncoding(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::SHIFT_JIS;

    #[test]
    fn labels_resolve_to_variants() {
        assert_eq!(
            TextEncoding::for_label("UTF-8"),
            Some(TextEncoding::Utf8 { bom: false })
        );
        assert_eq!(
            TextEncoding::for_label("utf-8-bom"),
            Some(TextEncoding::Utf8 { bom: true })
        );
        assert_eq!(
            TextEncoding::for_label("utf-16le"),
            Some(TextEncoding::Utf16Le { bom: true })
        );
        assert_eq!(
            TextEncoding::for_label("latin1"),
            Some(TextEncoding::Legacy(WINDOWS_1252))
        );
        assert_eq!(TextEncoding::for_label("klingon"), None);
    }

    #[test]
    fn utf8_bom_is_optional() {
        assert_eq!(
            TextEncoding::Utf8 { bom: false }.encode("é").unwrap(),
            vec![0xC3, 0xA9]
        );
        assert_eq!(
            TextEncoding::Utf8 { bom: true }.encode("a").unwrap(),
            vec![0xEF, 0xBB, 0xBF, b'a']
        );
    }

    #[test]
    fn utf16_writes_byte_order() {
        assert_eq!(
            TextEncoding::Utf16Le { bom: true }.encode("A").unwrap(),
            vec![0xFF, 0xFE, 0x41, 0x00]
        );
        assert_eq!(
            TextEncoding::Utf16Be { bom: false }.encode("A").unwrap(),
            vec![0x00, 0x41]
        );
    }

    #[test]
    fn legacy_encoding_reports_unencodable_character() {
        let encoding = TextEncoding::Legacy(WINDOWS_1252);
        assert_eq!(encoding.encode("café").unwrap(), b"caf\xE9".to_vec());

        match encoding.encode("日本") {
            Err(WriteError::Unencodable { character, .. }) => assert_eq!(character, '日'),
            other => panic!("expected unencodable error, got {other:?}"),
        }
    }

    #[test]
    fn multi_byte_legacy_encoding() {
        let bytes = TextEncoding::Legacy(SHIFT_JIS).encode("日本").unwrap();
        assert_eq!(bytes, vec![0x93, 0xFA, 0x96, 0x7B]);
    }

    #[test]
    fn decode_detects_encodings() {
        let (text, encoding) = TextEncoding::decode(b"\xEF\xBB\xBFTITLE x");
        assert_eq!(text, "TITLE x");
        assert_eq!(encoding, TextEncoding::Utf8 { bom: true });

        let (text, encoding) = TextEncoding::decode(b"\xFF\xFEA\x00");
        assert_eq!(text, "A");
        assert_eq!(encoding, TextEncoding::Utf16Le { bom: true });

        let (text, encoding) = TextEncoding::decode("Café".as_bytes());
        assert_eq!(text, "Café");
        assert_eq!(encoding, TextEncoding::Utf8 { bom: false });

        let (text, encoding) = TextEncoding::decode(b"Caf\xE9");
        assert_eq!(text, "Café");
        assert_eq!(encoding, TextEncoding::Legacy(WINDOWS_1252));
    }

    #[test]
    fn only_utf16_needs_a_bom() {
        assert!(TextEncoding::Utf16Le { bom: false }.needs_bom());
        assert!(!TextEncoding::Utf8 { bom: false }.needs_bom());
        assert!(!TextEncoding::Legacy(SHIFT_JIS).needs_bom());
    }
}
