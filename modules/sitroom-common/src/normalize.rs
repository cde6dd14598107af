//! Text normalization and content hashing for dedup key derivation.
//!
//! Keys must be stable across repeated observations of the same event, so
//! everything here is a pure function of content — no timestamps, no randomness.

use sha2::{Digest, Sha256};

/// Lowercase and collapse all whitespace runs to single spaces, trimming ends.
pub fn normalize_text(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// First 16 hex chars of the SHA-256 of `s`. Short enough for readable keys,
/// long enough that collisions are not a practical concern at this volume.
pub fn hash16(s: &str) -> String {
    let digest = Sha256::digest(s.as_bytes());
    hex::encode(digest)[..16].to_string()
}

/// Truncate to at most `max` characters, respecting char boundaries.
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_whitespace_and_lowercases() {
        assert_eq!(
            normalize_text("  M7.1   Quake\n near\tCoastal City "),
            "m7.1 quake near coastal city"
        );
    }

    #[test]
    fn hash16_is_deterministic_and_short() {
        let a = hash16("manual:some report text");
        let b = hash16("manual:some report text");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert_ne!(a, hash16("manual:other text"));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo wörld", 5), "héllo");
        assert_eq!(truncate_chars("short", 200), "short");
    }
}
