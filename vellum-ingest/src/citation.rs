//! Citation detection and verification.
//!
//! Detection alone is insufficient: a `CitationVerifier` must confirm the
//! reference actually exists before it counts toward Tier 1 eligibility.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

static ADR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bADR-\d+\b").unwrap());
static COMMIT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[0-9a-fA-F]{6,40}\b").unwrap());
static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").unwrap());
static ISSUE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(#\d+|issue:\d+)").unwrap());

/// A single detected citation, tagged by kind, with the matched text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Citation {
    Adr(String),
    Commit(String),
    Url(String),
    Issue(String),
}

/// Whether a 6-hex-digit match is actually a CSS-style color literal rather
/// than a short commit hash. Plain 6-hex tokens are ambiguous; we exclude
/// them from commit detection to avoid constant false positives on content
/// that discusses colors or hex constants.
fn is_color_literal(hex: &str) -> bool {
    hex.len() == 6
}

/// Scan content for every recognized citation form.
pub fn detect(content: &str) -> Vec<Citation> {
    let mut found = Vec::new();

    for m in ADR_RE.find_iter(content) {
        found.push(Citation::Adr(m.as_str().to_string()));
    }
    for m in COMMIT_RE.find_iter(content) {
        let hex = m.as_str();
        if !is_color_literal(hex) {
            found.push(Citation::Commit(hex.to_string()));
        }
    }
    for m in URL_RE.find_iter(content) {
        found.push(Citation::Url(m.as_str().to_string()));
    }
    for m in ISSUE_RE.find_iter(content) {
        found.push(Citation::Issue(m.as_str().to_string()));
    }

    found
}

/// Confirms that a detected citation actually exists. Detection alone never
/// promotes a claim to Tier 1.
#[async_trait]
pub trait CitationVerifier: Send + Sync {
    async fn verify(&self, citation: &Citation) -> bool;
}

/// Test/fake verifier: a fixed allow-list of citation texts that verify
/// successfully; everything else fails verification.
pub struct FakeCitationVerifier {
    known_good: Vec<String>,
}

impl FakeCitationVerifier {
    pub fn new(known_good: Vec<String>) -> Self {
        Self { known_good }
    }

    fn text_of(citation: &Citation) -> &str {
        match citation {
            Citation::Adr(s) | Citation::Commit(s) | Citation::Url(s) | Citation::Issue(s) => s,
        }
    }
}

#[async_trait]
impl CitationVerifier for FakeCitationVerifier {
    async fn verify(&self, citation: &Citation) -> bool {
        self.known_good.iter().any(|k| k == Self::text_of(citation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_adr_reference() {
        let citations = detect("See ADR-003 for the decision record");
        assert!(citations.contains(&Citation::Adr("ADR-003".to_string())));
    }

    #[test]
    fn detects_commit_hash_but_not_color_literal() {
        let citations = detect("fixed in a1b2c3d, unlike the color #ff00aa");
        assert!(citations.iter().any(|c| matches!(c, Citation::Commit(h) if h == "a1b2c3d")));
        assert!(!citations.iter().any(|c| matches!(c, Citation::Commit(h) if h == "ff00aa")));
    }

    #[test]
    fn six_hex_short_sha_is_still_excluded_as_ambiguous() {
        let citations = detect("short sha abcdef landed the fix");
        assert!(!citations.iter().any(|c| matches!(c, Citation::Commit(h) if h == "abcdef")));
    }

    #[test]
    fn detects_url_and_issue_reference() {
        let citations = detect("discussed in https://example.com/thread and issue:42");
        assert!(citations.iter().any(|c| matches!(c, Citation::Url(_))));
        assert!(citations.iter().any(|c| matches!(c, Citation::Issue(_))));
    }

    #[tokio::test]
    async fn fake_verifier_only_confirms_known_good() {
        let verifier = FakeCitationVerifier::new(vec!["ADR-003".to_string()]);
        assert!(verifier.verify(&Citation::Adr("ADR-003".to_string())).await);
        assert!(!verifier.verify(&Citation::Adr("ADR-999".to_string())).await);
    }
}
