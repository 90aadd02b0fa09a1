//! Vellum Ingest - tiered ingestion pipeline: hedge detection, dedup,
//! citation verification, review queue.

mod citation;
mod dedup;
mod hedge;
mod pipeline;
mod review_queue;

pub use citation::{detect as detect_citations, Citation, CitationVerifier, FakeCitationVerifier};
pub use dedup::{jaccard_similarity, most_similar};
pub use hedge::classify as classify_hedge;
pub use pipeline::{dedup_detector_failed, decide_tier, same_type_filter, IngestionCandidate, TierDecision, TierReason};
pub use review_queue::{ReviewDecision, ReviewEntry, ReviewQueue};
