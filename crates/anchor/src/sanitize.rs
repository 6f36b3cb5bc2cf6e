//! Text repair and escaping for anchor-text lines.
//!
//! Every text element ends up on one line of the anchor text, so extracted
//! strings are repaired (mis-decoded UTF-8, ligatures, curly quotes, stray
//! control characters), trimmed, escaped, and capped in length.

use std::borrow::Cow;
use std::sync::OnceLock;

use encoding_rs::WINDOWS_1252;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Longest text element emitted into anchor text, in characters.
pub const MAX_TEXT_ELEMENT_LENGTH: usize = 250;

/// Characters that would break the one-line-per-element layout.
const TEXT_REPLACEMENTS: [(char, &str); 5] = [
    ('[', "\\["),
    (']', "\\]"),
    ('\n', "\\n"),
    ('\r', "\\r"),
    ('\t', "\\t"),
];

/// Mis-decoding rounds undone at most.
const MAX_ENCODING_PASSES: usize = 3;

/// Undo one round of "UTF-8 bytes decoded as Windows-1252".
///
/// Returns `None` when the text does not look mis-decoded: it must hold a
/// non-ASCII character, encode to Windows-1252 without loss, and those
/// bytes must be valid UTF-8 that differs from the input.
fn undo_mojibake(text: &str) -> Option<String> {
    if text.is_ascii() {
        return None;
    }

    let (bytes, _, had_errors) = WINDOWS_1252.encode(text);
    if had_errors {
        return None;
    }
    let decoded = String::from_utf8(bytes.into_owned()).ok()?;
    (decoded != text).then_some(decoded)
}

/// Repair common text-extraction damage.
///
/// In order: HTML entities (only when the text has no markup), terminal
/// escape sequences, mis-decoded UTF-8, Latin ligatures, fullwidth ASCII,
/// curly quotes, line-break variants, invisible control characters, and
/// finally NFC normalization.
pub fn repair_text(text: &str) -> String {
    let mut result: String = if text.contains('<') {
        text.to_string()
    } else {
        html_escape::decode_html_entities(text).into_owned()
    };

    static RE_TERMINAL: OnceLock<Regex> = OnceLock::new();
    let re_terminal =
        RE_TERMINAL.get_or_init(|| Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").unwrap());
    if let Cow::Owned(stripped) = re_terminal.replace_all(&result, "") {
        result = stripped;
    }

    for _ in 0..MAX_ENCODING_PASSES {
        match undo_mojibake(&result) {
            Some(fixed) => result = fixed,
            None => break,
        }
    }

    let ligatures = [
        ("\u{FB00}", "ff"),
        ("\u{FB01}", "fi"),
        ("\u{FB02}", "fl"),
        ("\u{FB03}", "ffi"),
        ("\u{FB04}", "ffl"),
        ("\u{FB05}", "st"),
        ("\u{FB06}", "st"),
    ];
    for (lig, replacement) in &ligatures {
        result = result.replace(lig, replacement);
    }

    result = result.replace("\r\n", "\n").replace('\r', "\n");

    result
        .chars()
        .filter_map(|c| match c {
            // Fullwidth ASCII variants.
            '\u{FF01}'..='\u{FF5E}' => char::from_u32(c as u32 - 0xFEE0),
            '\u{3000}' => Some(' '),
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' => Some('\''),
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' => Some('"'),
            '\u{2028}' | '\u{2029}' | '\u{0085}' => Some('\n'),
            '\t' | '\n' => Some(c),
            '\u{0000}'..='\u{001F}' | '\u{007F}' => None,
            '\u{FEFF}' | '\u{FFF9}'..='\u{FFFC}' | '\u{206A}'..='\u{206F}' => None,
            _ => Some(c),
        })
        .nfc()
        .collect()
}

/// Escape the characters listed in [`TEXT_REPLACEMENTS`].
pub fn escape_element_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match TEXT_REPLACEMENTS.iter().find(|(from, _)| *from == c) {
            Some((_, to)) => out.push_str(to),
            None => out.push(c),
        }
    }
    out
}

/// Shorten `text` to roughly `max_length` characters, keeping its start and
/// end around an ellipsis.
///
/// Head and tail each take `max_length / 2 - 3` characters. The head is cut
/// back to its last space and the tail forward past its first space, unless
/// that would leave nothing, in which case the hard cut is kept.
pub fn cap_split_string(text: &str, max_length: usize) -> String {
    let count = text.chars().count();
    if count <= max_length {
        return text.to_string();
    }

    let keep = (max_length / 2).saturating_sub(3);
    let head_slice: String = text.chars().take(keep).collect();
    let tail_slice: String = text.chars().skip(count - keep).collect();

    let head = match head_slice.rfind(' ') {
        Some(idx) if idx > 0 => &head_slice[..idx],
        _ => head_slice.as_str(),
    };
    let tail = match tail_slice.find(' ') {
        Some(idx) if idx + 1 < tail_slice.len() => &tail_slice[idx + 1..],
        _ => tail_slice.as_str(),
    };

    format!("{head} ... {tail}")
}

/// Prepare one extracted text run for an anchor-text line.
pub fn cleanup_element_text(text: &str) -> String {
    let repaired = repair_text(text);
    let escaped = escape_element_text(repaired.trim());
    cap_split_string(&escaped, MAX_TEXT_ELEMENT_LENGTH)
}
