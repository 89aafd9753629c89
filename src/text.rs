//! Text normalization helpers
//!
//! Shared by the field matcher (label slugs), the form filler (fuzzy key
//! matching, diacritic sanitization) and the content-stream painter
//! (WinAnsi encoding for the standard Helvetica font).

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Letters with no canonical decomposition into base + mark
fn fold_undecomposable(c: char) -> Option<&'static str> {
    let base = match c {
        'ł' => "l",
        'Ł' => "L",
        'ø' => "o",
        'Ø' => "O",
        'đ' => "d",
        'Đ' => "D",
        'ı' => "i",
        'ß' => "ss",
        'æ' => "ae",
        'Æ' => "AE",
        'œ' => "oe",
        'Œ' => "OE",
        _ => return None,
    };
    Some(base)
}

/// Replace accented letters with their base letters
///
/// NFKD splits letters into base + combining marks and the marks are dropped.
pub fn strip_diacritics(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match fold_undecomposable(c) {
            Some(base) => out.push_str(base),
            None => out.extend(
                std::iter::once(c)
                    .nfkd()
                    .filter(|m| !is_combining_mark(*m)),
            ),
        }
    }
    out
}

/// Slug used for generated field names: `"Imię i nazwisko:"` → `"imie_i_nazwisko"`
pub fn slugify(input: &str) -> String {
    let folded = strip_diacritics(&input.to_lowercase());
    let mut slug = String::with_capacity(folded.len());
    let mut pending_separator = false;

    for c in folded.chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_separator && !slug.is_empty() {
                slug.push('_');
            }
            pending_separator = false;
            slug.push(c);
        } else {
            pending_separator = true;
        }
    }

    slug
}

/// Key form used by fuzzy matching: case-folded, no diacritics, no separators
pub fn normalize_key(input: &str) -> String {
    strip_diacritics(&input.to_lowercase())
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect()
}

/// Make text safe for the standard PDF fonts
///
/// Typographic punctuation is folded to ASCII. With `strip_accents`,
/// diacritics are replaced by base letters as well.
pub fn sanitize_for_pdf(input: &str, strip_accents: bool) -> String {
    let text = if strip_accents {
        strip_diacritics(input)
    } else {
        input.to_string()
    };

    text.chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' | '\u{201A}' => '\'',
            '\u{201C}' | '\u{201D}' | '\u{201E}' => '"',
            '\u{2013}' | '\u{2014}' => '-',
            '\u{00A0}' | '\t' => ' ',
            '\r' | '\n' => ' ',
            other => other,
        })
        .collect()
}

/// Encode text for a WinAnsiEncoding font
///
/// Returns the bytes and whether any character had to be replaced by `?`.
pub fn encode_win_ansi(input: &str) -> (Vec<u8>, bool) {
    let mut bytes = Vec::with_capacity(input.len());
    let mut lossy = false;

    for c in input.chars() {
        let code = c as u32;
        let byte = match c {
            '\u{20AC}' => Some(0x80),
            '\u{2026}' => Some(0x85),
            '\u{2018}' => Some(0x91),
            '\u{2019}' => Some(0x92),
            '\u{201C}' => Some(0x93),
            '\u{201D}' => Some(0x94),
            '\u{2022}' => Some(0x95),
            '\u{2013}' => Some(0x96),
            '\u{2014}' => Some(0x97),
            _ if (0x20..0x7F).contains(&code) => Some(code as u8),
            _ if (0xA0..=0xFF).contains(&code) => Some(code as u8),
            _ => None,
        };

        match byte {
            Some(b) => bytes.push(b),
            None => {
                lossy = true;
                bytes.push(b'?');
            }
        }
    }

    (bytes, lossy)
}
