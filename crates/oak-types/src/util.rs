use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};

/// Marker appended when content exceeds its byte budget
pub const TRUNCATION_MARKER: &str = " …[truncated]";

/// Cap `text` to `budget` bytes. Content at exactly the budget is preserved
/// byte-for-byte; anything past it is cut on a char boundary and suffixed
/// with the truncation marker.
pub fn truncate_to_budget(text: &str, budget: usize) -> String {
    if text.len() <= budget {
        return text.to_string();
    }
    let mut end = budget;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    let mut out = String::with_capacity(end + TRUNCATION_MARKER.len());
    out.push_str(&text[..end]);
    out.push_str(TRUNCATION_MARKER);
    out
}

/// Stable hex digest of observation content. Replays compare this to skip
/// re-embedding unchanged text.
pub fn content_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    hex_encode(&digest)
}

/// Short hex digest used for prompt fingerprints
pub fn short_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    hex_encode(&digest[..8])
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

/// RFC3339 with microsecond precision; microseconds keep batch creation
/// order observable within a session.
pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_ts(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// First `max_chars` characters of a string, for prompt/output excerpts in
/// retrieval queries and previews.
pub fn excerpt(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_exact_budget_preserved() {
        let text = "a".repeat(64);
        assert_eq!(truncate_to_budget(&text, 64), text);
    }

    #[test]
    fn test_truncate_past_budget_marked() {
        let text = "a".repeat(65);
        let out = truncate_to_budget(&text, 64);
        assert_eq!(out.len(), 64 + TRUNCATION_MARKER.len());
        assert!(out.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        // 'é' is two bytes; a budget of 3 lands mid-char and must back off
        let out = truncate_to_budget("éé", 3);
        assert!(out.starts_with('é'));
        assert!(out.ends_with(TRUNCATION_MARKER));
        assert_eq!(out.len(), 2 + TRUNCATION_MARKER.len());
    }

    #[test]
    fn test_content_hash_stable() {
        assert_eq!(content_hash("abc"), content_hash("abc"));
        assert_ne!(content_hash("abc"), content_hash("abd"));
        assert_eq!(content_hash("abc").len(), 64);
    }

    #[test]
    fn test_ts_round_trip() {
        let now = Utc::now();
        let parsed = parse_ts(&format_ts(now)).unwrap();
        assert_eq!(parsed.timestamp_micros(), now.timestamp_micros());
    }

    #[test]
    fn test_excerpt_char_safe() {
        assert_eq!(excerpt("hello world", 5), "hello");
        assert_eq!(excerpt("héllo", 2), "hé");
        assert_eq!(excerpt("hi", 10), "hi");
    }
}
