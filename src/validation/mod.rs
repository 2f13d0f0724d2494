//! Acceptance filter for reward code candidates.
//!
//! Both detectors are noisy: OCR on a curved reflective can picks up UI words
//! and stray numbers, and QR decoding on low contrast sometimes yields
//! fragments. Every proposed string passes through [`is_valid_candidate`]
//! before it is treated as a result. Rules run in order and the first match
//! rejects.

pub mod url;

pub use self::url::{extract_code_from_url, looks_like_url};

pub const MIN_CODE_LEN: usize = 6;
pub const MAX_CODE_LEN: usize = 25;

/// Longest run of one character tolerated inside a code.
const MAX_REPEAT_RUN: usize = 3;
/// Alternating letter/digit strings up to this length look like placeholders.
const MAX_ALTERNATING_LEN: usize = 8;

/// Uppercased tokens that show up around the code but never are the code.
const BLACKLIST: &[&str] = &[
    // Domain and UI noise
    "BARCODE", "CODE", "CODES", "ENTER", "ITEM", "PRODUCT", "REWARD", "REWARDS", "SCAN", "SKU",
    "ZYN", "POINTS", "REDEEM", "SUBMIT", "CAMERA", "LOGIN", "ACCOUNT",
    // Generic words OCR lifts off packaging
    "NICOTINE", "WARNING", "POUCHES", "FLAVOR", "STRENGTH", "MINT", "WINTERGREEN", "CITRUS",
    "COFFEE", "PEPPERMINT", "SPEARMINT", "ORIGINAL", "PRODUCTS", "ADDICTIVE", "CHEMICAL",
    "CONTAINS", "THIS", "THAT", "WITH", "FROM", "YOUR", "HERE", "WWW", "HTTP", "HTTPS", "COM",
    // Mixed tokens that look like codes but come from printed specs
    "MP3", "MP4", "H264", "H265", "X264", "720P", "1080P", "2160P", "4K", "UTF8", "SHA256",
    "MD5", "IPV4", "IPV6", "COVID19", "6MG", "3MG", "12MG", "15CT", "20CT", "1OZ",
];

/// Exact sequences OCR produces from test cards and keyboard rows.
const KNOWN_SEQUENCES: &[&str] = &[
    "ABCDEFGHIJKLMNOPQRSTUVWXYZ",
    "ZYXWVUTSRQPONMLKJIHGFEDCBA",
    "0123456789",
    "1234567890",
    "9876543210",
    "0987654321",
    "ABC123",
    "123ABC",
    "ABCD1234",
    "1234ABCD",
    "ABC12345",
    "ABCDEF123",
    "123456ABC",
    "ABCDEF123456",
    "123456ABCDEF",
    "QWERTY123",
    "QWERTY1234",
    "ASDF1234",
    "ZYX987",
    "987ZYX",
    "ZYXW9876",
    "9876ZYXW",
];

/// Whether `raw` may be a reward code.
pub fn is_valid_candidate(raw: &str) -> bool {
    let token = raw.trim();

    let len = token.chars().count();
    if !(MIN_CODE_LEN..=MAX_CODE_LEN).contains(&len) {
        return false;
    }
    if !token.chars().all(|c| c.is_ascii_alphanumeric()) {
        return false;
    }
    if token.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    if token.chars().all(|c| c.is_ascii_alphabetic()) {
        return false;
    }
    let has_letter = token.chars().any(|c| c.is_ascii_alphabetic());
    let has_digit = token.chars().any(|c| c.is_ascii_digit());
    if !(has_letter && has_digit) {
        return false;
    }

    let upper = token.to_ascii_uppercase();
    if BLACKLIST.contains(&upper.as_str()) {
        return false;
    }
    if is_version_like(token) || is_date_like(token) || is_time_like(token) {
        return false;
    }
    if longest_run(token) > MAX_REPEAT_RUN {
        return false;
    }
    if KNOWN_SEQUENCES.contains(&upper.as_str()) {
        return false;
    }
    if len <= MAX_ALTERNATING_LEN && is_alternating(token) {
        return false;
    }

    true
}

/// `^v?\d+\.\d+`
fn is_version_like(token: &str) -> bool {
    let rest = token
        .strip_prefix('v')
        .or_else(|| token.strip_prefix('V'))
        .unwrap_or(token);
    let (major, rest) = split_digits(rest);
    if major.is_empty() {
        return false;
    }
    let Some(rest) = rest.strip_prefix('.') else {
        return false;
    };
    !split_digits(rest).0.is_empty()
}

/// Eight bare digits, or three digit groups joined by `-` or `/`
/// (`YYYY-MM-DD`, `DD/MM/YYYY`, `MM-DD-YY`).
fn is_date_like(token: &str) -> bool {
    if token.len() == 8 && token.chars().all(|c| c.is_ascii_digit()) {
        return true;
    }

    let groups = match split_groups(token, &['-', '/']) {
        Some(groups) if groups.len() == 3 => groups,
        _ => return false,
    };
    let lens: Vec<usize> = groups.iter().map(|g| g.len()).collect();
    match lens.as_slice() {
        [4, m, d] => (1..=2).contains(m) && (1..=2).contains(d),
        [a, b, y] => (1..=2).contains(a) && (1..=2).contains(b) && (*y == 2 || *y == 4),
        _ => false,
    }
}

/// `HH:MM`, `HH.MM`, optionally with seconds.
fn is_time_like(token: &str) -> bool {
    let Some(groups) = split_groups(token, &[':', '.']) else {
        return false;
    };
    match groups.as_slice() {
        [h, m] => (1..=2).contains(&h.len()) && m.len() == 2,
        [h, m, s] => (1..=2).contains(&h.len()) && m.len() == 2 && s.len() == 2,
        _ => false,
    }
}

/// Splits on any of `separators`; `None` unless every group is a non-empty digit run
/// and at least one separator occurred.
fn split_groups<'a>(token: &'a str, separators: &[char]) -> Option<Vec<&'a str>> {
    let groups: Vec<&str> = token.split(|c| separators.contains(&c)).collect();
    if groups.len() < 2 {
        return None;
    }
    groups
        .iter()
        .all(|g| !g.is_empty() && g.chars().all(|c| c.is_ascii_digit()))
        .then_some(groups)
}

fn split_digits(s: &str) -> (&str, &str) {
    let end = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(idx, _)| idx)
        .unwrap_or(s.len());
    s.split_at(end)
}

fn longest_run(token: &str) -> usize {
    let mut longest = 0;
    let mut current = 0;
    let mut previous = None;
    for c in token.chars() {
        if Some(c) == previous {
            current += 1;
        } else {
            current = 1;
            previous = Some(c);
        }
        longest = longest.max(current);
    }
    longest
}

/// `A1B2C3` or `1A2B3C`.
fn is_alternating(token: &str) -> bool {
    let mut chars = token.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    let mut expect_letter = !first.is_ascii_alphabetic();
    for c in chars {
        if c.is_ascii_alphabetic() != expect_letter {
            return false;
        }
        expect_letter = !expect_letter;
    }
    true
}
