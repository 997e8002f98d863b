//! Title normalization for guess matching.
//!
//! `normalize_title` strips catalog annotations (parentheticals, hyphenated
//! qualifiers, featured-artist credits) and keeps the original casing.
//! `match_key` folds a string for comparison: lowercase, ASCII, straight quotes.
//!
//! The canonical title is only ever used for matching. Round results always
//! show the raw catalog title.

use any_ascii::any_ascii;
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

// ============================================================================
// REGEX PATTERNS
// ============================================================================

/// Parenthesized annotations anywhere in the title: "(Remastered 2011)", "(feat. X)".
/// Square brackets are treated the same way: "[Live]".
pub static PARENTHESIZED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*(?:\([^()]*?\)|\[[^\[\]]*?\])").unwrap());

/// Trailing qualifiers introduced by a hyphen (applied repeatedly, in order).
/// The hyphen needs whitespace on at least one side so "Anti-Hero" survives.
pub static QUALIFIER_SUFFIXES: Lazy<Vec<Regex>> = Lazy::new(|| {
    let dash = r"(?:\s+[-–—]\s*|[-–—]\s+)";
    vec![
        // Remaster variants: "- Remastered", "- Remastered 2011", "- 2011 Remaster"
        Regex::new(&format!(
            r"(?i){dash}(?:\d{{4}}\s+)?(?:digital\s+)?remaster(?:ed)?(?:\s+\d{{4}})?\s*$"
        ))
        .unwrap(),
        // Live/acoustic: "- Live", "- Live at Wembley", "- Acoustic"
        Regex::new(&format!(
            r"(?i){dash}(?:live(?:\s+(?:at|from|in)\s+.+)?|acoustic)(?:\s+version)?\s*$"
        ))
        .unwrap(),
        // Localized versions: "- English Version", "- Spanish Version"
        Regex::new(&format!(r"(?i){dash}(?:english|spanish)\s+version\s*$")).unwrap(),
        // Year versions: "- 1999 Version"
        Regex::new(&format!(r"(?i){dash}\d{{4}}\s+version\s*$")).unwrap(),
        // Mix/edit variants: "- Radio Edit", "- Extended Mix", "- Remix", "- Dub"
        Regex::new(&format!(
            r"(?i){dash}(?:radio\s+edit|extended\s+mix|instrumental|remix|mix|edit|version|dub)\s*$"
        ))
        .unwrap(),
    ]
});

/// Featured-artist credit: the token and the credit that trails it.
/// "Song feat. Other Artist" -> "Song", "Song ft Someone" -> "Song".
pub static FEATURED_CREDIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s+(?:feat|ft|featuring)\b\.?.*$").unwrap());

static MULTI_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").unwrap());

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Check if a character is a Unicode combining mark (diacritical mark).
pub fn is_combining_mark(c: char) -> bool {
    matches!(c as u32, 0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0xFE20..=0xFE2F)
}

/// Fold Unicode text to lowercase ASCII by applying NFKD decomposition,
/// removing combining marks and transliterating what remains.
/// e.g., "Beyoncé" → "beyonce", "Björk" → "bjork"
pub fn fold_to_ascii(s: &str) -> String {
    let stripped: String = s.nfkd().filter(|c| !is_combining_mark(*c)).collect();
    any_ascii(&stripped).to_lowercase()
}

/// Straighten curly quotes and spell out " & ".
pub fn normalize_punctuation(s: &str) -> String {
    s.replace(['\u{2018}', '\u{2019}', '\u{00B4}', '\u{0060}'], "'")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(" & ", " and ")
}

fn collapse_whitespace(s: &str) -> String {
    MULTI_SPACE.replace_all(s.trim(), " ").to_string()
}

// ============================================================================
// NORMALIZATION FUNCTIONS
// ============================================================================

/// Normalize a raw catalog title into the canonical title used for matching.
///
/// Steps, in order:
/// 1. drop every parenthesized (or bracketed) substring,
/// 2. strip trailing hyphen qualifiers ("- Live", "- Remastered 2011", ...),
/// 3. drop featured-artist credits ("feat." / "ft." and what follows),
/// 4. trim and collapse whitespace.
///
/// Casing is preserved. A title made only of annotations ("(Intro)") falls back
/// to the trimmed raw title so there is always something to guess.
pub fn normalize_title(raw_title: &str) -> String {
    let mut result = raw_title.to_string();
    // Innermost groups go first, so nested annotations need more than one pass
    while PARENTHESIZED.is_match(&result) {
        result = PARENTHESIZED.replace_all(&result, "").to_string();
    }

    // Qualifiers can stack: "Song - Live - Remastered"
    loop {
        let before = result.len();
        for pattern in QUALIFIER_SUFFIXES.iter() {
            result = pattern.replace(&result, "").to_string();
        }
        if result.len() == before {
            break;
        }
    }

    result = FEATURED_CREDIT.replace(&result, "").to_string();

    let normalized = collapse_whitespace(&result);
    if normalized.is_empty() {
        collapse_whitespace(raw_title)
    } else {
        normalized
    }
}

/// Fold a guess or canonical title into its comparison form.
/// Case, diacritics, curly quotes and repeated whitespace are ignored.
pub fn match_key(s: &str) -> String {
    collapse_whitespace(&fold_to_ascii(&normalize_punctuation(s.trim())))
}

// ============================================================================
// TESTS
// ============================================================================
