//! Source file loading with encoding detection.
//!
//! Input files may be UTF-8 (with or without BOM) or UTF-16LE with a BOM.
//! Everything downstream of this module works on UTF-8 bytes only.

use std::path::Path;

use thiserror::Error;

/// Errors raised while loading a source file.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("source is not valid UTF-8")]
    InvalidUtf8,
}

/// Reads a source file and normalizes it to UTF-8.
///
/// A `FF FE` prefix selects UTF-16LE decoding; an `EF BB BF` prefix is
/// stripped; anything else is taken as UTF-8 as-is.
pub fn read_source(path: &Path) -> Result<String, SourceError> {
    let raw = std::fs::read(path).map_err(|e| SourceError::Io {
        path: path.display().to_string(),
        source: e,
    })?;

    if raw.starts_with(&[0xFF, 0xFE]) {
        return Ok(utf16le_to_utf8(&raw[2..]));
    }
    if raw.starts_with(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8(raw[3..].to_vec()).map_err(|_| SourceError::InvalidUtf8);
    }
    String::from_utf8(raw).map_err(|_| SourceError::InvalidUtf8)
}

/// Decodes UTF-16LE code units into a UTF-8 string.
///
/// Surrogate pairs are combined; an unpaired surrogate falls back to its
/// raw unit value. A trailing odd byte is dropped.
fn utf16le_to_utf8(raw: &[u8]) -> String {
    let mut units = raw
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .peekable();

    let mut out = String::with_capacity(raw.len() / 2);
    while let Some(w1) = units.next() {
        let cp = if (0xD800..=0xDBFF).contains(&w1) {
            match units.peek() {
                Some(&w2) if (0xDC00..=0xDFFF).contains(&w2) => {
                    units.next();
                    0x10000 + (((w1 as u32 - 0xD800) << 10) | (w2 as u32 - 0xDC00))
                }
                _ => w1 as u32,
            }
        } else {
            w1 as u32
        };
        out.push(char::from_u32(cp).unwrap_or('\u{FFFD}'));
    }
    out
}
