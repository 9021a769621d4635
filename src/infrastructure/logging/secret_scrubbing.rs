//! Redacts credential-shaped substrings from log fields before they are
//! written (SPEC_FULL §1A "Logging").

use regex::Regex;
use std::sync::OnceLock;

fn patterns() -> &'static Vec<Regex> {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        vec![
            Regex::new(r"(?i)(api[_-]?key\s*[:=]\s*)([A-Za-z0-9_\-]{8,})").unwrap(),
            Regex::new(r"(?i)(bearer\s+)([A-Za-z0-9_\-\.]{8,})").unwrap(),
            Regex::new(r"(?i)(authorization\s*[:=]\s*)([A-Za-z0-9_\-\.]{8,})").unwrap(),
            Regex::new(r"sk-[A-Za-z0-9]{16,}").unwrap(),
        ]
    })
}

/// Replaces any matched secret-shaped substring with `<redacted>`, preserving
/// the label prefix (e.g. `api_key=`) when one is captured.
pub fn scrub(input: &str) -> String {
    let mut out = input.to_string();
    for pattern in patterns() {
        out = pattern
            .replace_all(&out, |caps: &regex::Captures| {
                if caps.len() >= 3 {
                    format!("{}<redacted>", &caps[1])
                } else {
                    "<redacted>".to_string()
                }
            })
            .to_string();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_api_key() {
        let scrubbed = scrub("api_key=sk_live_abcdef1234567890");
        assert!(!scrubbed.contains("abcdef1234567890"));
        assert!(scrubbed.contains("<redacted>"));
    }

    #[test]
    fn redacts_bearer_token() {
        let scrubbed = scrub("Authorization: Bearer abcdefghijklmno123");
        assert!(!scrubbed.contains("abcdefghijklmno123"));
    }

    #[test]
    fn leaves_ordinary_text_untouched() {
        assert_eq!(scrub("build completed in 3.2s"), "build completed in 3.2s");
    }
}
