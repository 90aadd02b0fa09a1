//! Deterministic query rewriting for the BM25 stage.
//!
//! Dense search embeds the query text unchanged — embedding models already
//! capture synonymy. BM25 has no such notion, so a query like "auth bug" is
//! expanded with an OR of bounded synonym terms before it reaches the index.

use once_cell::sync::Lazy;
use std::collections::HashMap;

static SYNONYMS: Lazy<HashMap<&'static str, &'static [&'static str]>> = Lazy::new(|| {
    HashMap::from([
        ("auth", ["authentication", "login", "jwt"].as_slice()),
        ("db", ["database", "datastore", "storage"].as_slice()),
        ("bug", ["defect", "issue", "regression"].as_slice()),
        ("perf", ["performance", "latency", "throughput"].as_slice()),
        ("config", ["configuration", "settings"].as_slice()),
        ("api", ["endpoint", "interface"].as_slice()),
        ("ui", ["frontend", "interface"].as_slice()),
        ("repo", ["repository", "codebase"].as_slice()),
        ("prod", ["production"].as_slice()),
        ("env", ["environment"].as_slice()),
    ])
});

/// Expand each whitespace token that has a synonym entry into `token OR
/// synonym1 OR synonym2 ...`, leaving unrecognized tokens untouched.
/// `"or"` is a BM25 stop word and query tokens are deduped before scoring,
/// so rewriting an already-rewritten query changes the surface string but
/// never changes the resulting term set or search results.
pub fn rewrite_query_for_bm25(query: &str) -> String {
    let mut out = Vec::new();
    for token in query.split_whitespace() {
        let key = token.to_lowercase();
        match SYNONYMS.get(key.as_str()) {
            Some(synonyms) => {
                out.push(token.to_string());
                for syn in *synonyms {
                    out.push("OR".to_string());
                    out.push(syn.to_string());
                }
            }
            None => out.push(token.to_string()),
        }
    }
    out.join(" ")
}
