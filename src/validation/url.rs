//! Reward codes embedded in redirect URLs.
//!
//! Some QR codes carry a landing-page URL instead of the code itself, with
//! the code as one of the trailing path segments or in a `?code=` style
//! query parameter.

use url::Url;

use super::is_valid_candidate;

/// Heuristic check for URL-shaped text, including scheme-less hosts.
pub fn looks_like_url(text: &str) -> bool {
    if let Ok(parsed) = Url::parse(text) {
        if parsed.has_host() {
            return true;
        }
    }

    let lower = text.to_ascii_lowercase();
    lower.contains("http") || lower.contains("www.") || has_domain_suffix(&lower)
}

/// Host part ends with `.` followed by two or more letters, as in
/// `example.com/r/K7PQ2M9XWT`.
fn has_domain_suffix(text: &str) -> bool {
    let host = text
        .split(|c| matches!(c, '/' | '?' | '#'))
        .next()
        .unwrap_or_default();
    match host.rsplit_once('.') {
        Some((head, tld)) => {
            !head.is_empty() && tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic())
        }
        None => false,
    }
}

/// Pulls a code out of a URL: last path segment, then the one before it,
/// then any query parameter whose key mentions `code`.
pub fn extract_code_from_url(text: &str) -> Option<String> {
    let text = text.trim();
    let normalized = if text.starts_with("http") {
        text.to_string()
    } else {
        format!("https://{text}")
    };
    let parsed = Url::parse(&normalized).ok()?;

    let segments: Vec<&str> = parsed
        .path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();

    if let Some(code) = segments
        .iter()
        .rev()
        .take(2)
        .find(|segment| is_valid_candidate(segment))
    {
        return Some((*code).to_string());
    }

    parsed
        .query_pairs()
        .find(|(key, value)| key.to_ascii_lowercase().contains("code") && is_valid_candidate(value))
        .map(|(_, value)| value.into_owned())
}
