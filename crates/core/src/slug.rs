//! Slug normalisation and syntax checks.
//!
//! A slug is one or more `/`-separated segments, each made of lowercase ASCII
//! alphanumeric words joined by single hyphens (`about-us/our-team`).

use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Separator placed between words inside one segment.
pub const WORD_SEPARATOR: char = '-';

/// Separator between path segments.
pub const PATH_SEPARATOR: char = '/';

static SLUG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*(/[a-z0-9]+(-[a-z0-9]+)*)*$").expect("valid regex")
});

/// Letters that do not decompose under NFD but have an obvious ASCII spelling.
fn transliterate(ch: char) -> Option<&'static str> {
    match ch {
        'ß' => Some("ss"),
        'æ' => Some("ae"),
        'œ' => Some("oe"),
        'ø' => Some("o"),
        'đ' | 'ð' => Some("d"),
        'ł' => Some("l"),
        'þ' => Some("th"),
        'ı' => Some("i"),
        _ => None,
    }
}

fn push_word_char(out: &mut String, ch: char, pending_separator: &mut bool) {
    if *pending_separator && !out.is_empty() {
        out.push(WORD_SEPARATOR);
    }
    *pending_separator = false;
    out.push(ch);
}

/// Normalise arbitrary text into a single slug segment.
///
/// Lower-cases, strips diacritics, turns every run of other characters into
/// one `-`, and trims separators from both ends. The result never contains
/// `/` and may be empty when the input has no usable characters.
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut pending_separator = false;

    for ch in lowered.nfd().filter(|c| !is_combining_mark(*c)) {
        if ch.is_ascii_alphanumeric() {
            push_word_char(&mut out, ch, &mut pending_separator);
        } else if let Some(ascii) = transliterate(ch) {
            for a in ascii.chars() {
                push_word_char(&mut out, a, &mut pending_separator);
            }
        } else {
            pending_separator = true;
        }
    }

    out
}

/// Normalise every `/`-separated segment of `text`, dropping empty ones.
pub fn normalize_path(text: &str) -> String {
    text.split(PATH_SEPARATOR)
        .map(normalize)
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Strip leading and trailing `/` characters.
pub fn trim_slashes(text: &str) -> &str {
    text.trim_matches(PATH_SEPARATOR)
}

/// Whether `slug` is syntactically valid. The empty string is not.
pub fn validate(slug: &str) -> bool {
    SLUG_RE.is_match(slug)
}

/// Join a parent slug and a child segment.
pub fn join(parent: Option<&str>, segment: &str) -> String {
    match parent {
        Some(parent) if !parent.is_empty() => format!("{parent}/{segment}"),
        _ => segment.to_string(),
    }
}
