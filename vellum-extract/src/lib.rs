//! Vellum Extract - asynchronous extraction pipeline. Callers submit raw
//! conversational text and get a job identifier back immediately; results
//! land once a bounded worker pool has run the configured `Extractor`
//! against it.

mod extractor;
mod worker;

pub use extractor::{
    ExtractedCandidate, ExtractionInput, Extractor, RuleBasedExtractor, REFERENCE_EXTRACTION_VERSION,
};
pub use worker::{ExtractionPipeline, ExtractionResult, ExtractionStatus};
