//! # scorecard-core
//!
//! Deterministic engine for rubric scoring of long-form documents.
//!
//! This crate owns everything that does not talk to the network:
//! - Sentence segmentation and a BM25 lexical index over the sentences
//! - Token-budgeted evidence selection per criterion
//! - Rubric loading and validation
//! - Verdict parsing with pattern-extraction and sentinel fallbacks
//! - Weighted aggregation into a report
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: same document and query always yield the same evidence
//! 2. **No LLM calls**: the scoring oracle lives in `scorecard-runtime`
//! 3. **Total**: every criterion ends with exactly one verdict
//!
//! ## Example
//!
//! ```rust,ignore
//! use scorecard_core::{segment, Aggregator, EvidenceSelector, LexicalIndex, Rubric};
//!
//! let rubric = Rubric::from_file("rubric.json")?;
//! let index = LexicalIndex::new(segment(&document_text));
//! let selector = EvidenceSelector::default();
//!
//! for (id, criterion) in rubric.criteria() {
//!     let bundle = selector.select(&index, &criterion.text);
//!     println!("{}:\n{}", id, bundle);
//! }
//! ```

pub mod aggregator;
pub mod evidence;
pub mod index;
pub mod report;
pub mod rubric;
pub mod segmenter;
pub mod text;
pub mod verdict;

// Re-export main types at crate root
pub use aggregator::{round2, Aggregator, WeightTable};
pub use evidence::{
    get_evidence, EvidenceBundle, EvidenceEntry, EvidenceSelector, DEFAULT_EVIDENCE_K,
    DEFAULT_EVIDENCE_TOKEN_BUDGET,
};
pub use index::LexicalIndex;
pub use report::{DimensionScore, DimensionScores, Report};
pub use rubric::{dimension_of, Criterion, Dimension, Rubric, RubricError, ScoringAnchors};
pub use segmenter::{segment, Segmenter, Sentence};
pub use text::{
    default_token_counter, BigramTermTokenizer, Cl100kTokenCounter, HeuristicTokenCounter,
    JiebaTermTokenizer, TermTokenizer, TokenCounter,
};
pub use verdict::{parse_verdict, Verdict, VerdictStatus, MAX_SCORE, MIN_SCORE};

use thiserror::Error;

/// Errors raised by the core engine.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Rubric error: {0}")]
    Rubric(#[from] RubricError),

    #[error("Invalid weight table: {0}")]
    InvalidWeights(String),

    #[error("Tokenizer unavailable: {0}")]
    Tokenizer(String),
}
