//! Hedge-language classification. Heuristic, not a security boundary: the
//! architectural controls (owner filters, bounded metadata, fail-closed
//! dedup/citation checks) are what actually defend the store.

use vellum_core::HedgeClass;

const BLOCK_PHRASES: &[&str] = &[
    "i think",
    "i guess",
    "i believe",
    "i assume",
    "i don't know",
    "not sure",
    "maybe we should",
];

const REVIEW_PHRASES: &[&str] = &["may", "might", "typically", "often", "usually", "approximately"];

fn contains_whole_word(haystack: &str, phrase: &str) -> bool {
    let haystack = haystack.to_lowercase();
    if phrase.contains(' ') {
        return haystack.contains(phrase);
    }
    haystack.split(|c: char| !c.is_alphanumeric()).any(|w| w == phrase)
}

/// Classify a piece of content for hedging language. `Block` takes
/// precedence over `Review`, which takes precedence over `None`.
pub fn classify(content: &str) -> HedgeClass {
    if BLOCK_PHRASES.iter().any(|p| contains_whole_word(content, p)) {
        return HedgeClass::Block;
    }
    if REVIEW_PHRASES.iter().any(|p| contains_whole_word(content, p)) {
        return HedgeClass::Review;
    }
    HedgeClass::None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_personal_speculation_as_block() {
        assert_eq!(classify("I think the database is Postgres"), HedgeClass::Block);
        assert_eq!(classify("I'm not sure about this"), HedgeClass::Block);
    }

    #[test]
    fn detects_technical_hedge_as_review() {
        assert_eq!(classify("This may require a migration"), HedgeClass::Review);
        assert_eq!(classify("Requests typically complete in 200ms"), HedgeClass::Review);
    }

    #[test]
    fn plain_statement_is_none() {
        assert_eq!(classify("The team uses Postgres for storage"), HedgeClass::None);
    }

    #[test]
    fn block_takes_precedence_over_review() {
        assert_eq!(classify("I think this might be true"), HedgeClass::Block);
    }
}
