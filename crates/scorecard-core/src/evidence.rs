//! Evidence selection for a single criterion.
//!
//! Every verdict the oracle returns is grounded in a bounded bundle of source
//! sentences. Each line carries the sentence's original index so the
//! oracle's reason can cite traceable evidence.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::index::LexicalIndex;
use crate::text::{default_token_counter, TokenCounter};

/// Default number of candidate sentences per criterion.
pub const DEFAULT_EVIDENCE_K: usize = 5;

/// Default token budget for one evidence bundle.
pub const DEFAULT_EVIDENCE_TOKEN_BUDGET: usize = 350;

/// One selected sentence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceEntry {
    /// Index of the sentence in the source document
    pub sentence_index: usize,

    /// Sentence text
    pub text: String,
}

/// Token-budgeted evidence for one criterion.
///
/// `token_count` never exceeds the budget the bundle was selected under.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceBundle {
    /// Selected sentences in rank order
    pub entries: Vec<EvidenceEntry>,

    /// Cumulative token count of the selected sentences
    pub token_count: usize,
}

impl EvidenceBundle {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Newline-joined `"[index] sentence"` lines.
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for EvidenceBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "[{}] {}", entry.sentence_index, entry.text)?;
        }
        Ok(())
    }
}

/// Ranks sentences for a query and assembles a budgeted bundle.
#[derive(Clone)]
pub struct EvidenceSelector {
    k: usize,
    token_budget: usize,
    counter: Arc<dyn TokenCounter>,
}

impl fmt::Debug for EvidenceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvidenceSelector")
            .field("k", &self.k)
            .field("token_budget", &self.token_budget)
            .finish()
    }
}

impl EvidenceSelector {
    /// Create a selector counting tokens with cl100k.
    pub fn new(k: usize, token_budget: usize) -> Self {
        Self::with_counter(k, token_budget, default_token_counter())
    }

    /// Create a selector with a custom token counter.
    pub fn with_counter(k: usize, token_budget: usize, counter: Arc<dyn TokenCounter>) -> Self {
        Self {
            k,
            token_budget,
            counter,
        }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn token_budget(&self) -> usize {
        self.token_budget
    }

    /// Select evidence for `query`.
    ///
    /// Walks the top-`k` sentences in rank order and appends each one while
    /// the running token total stays within budget. Selection stops at the
    /// first sentence that would exceed it; later, shorter candidates are not
    /// considered. If the best sentence alone is over budget the bundle is
    /// empty.
    pub fn select(&self, index: &LexicalIndex, query: &str) -> EvidenceBundle {
        let mut bundle = EvidenceBundle::default();

        for i in index.top_k(query, self.k) {
            let sentence = &index.sentences()[i];
            let tokens = self.counter.count(&sentence.text);
            if bundle.token_count + tokens > self.token_budget {
                tracing::trace!(
                    sentence = i,
                    tokens,
                    running = bundle.token_count,
                    budget = self.token_budget,
                    "Evidence budget reached"
                );
                break;
            }
            bundle.token_count += tokens;
            bundle.entries.push(EvidenceEntry {
                sentence_index: sentence.index,
                text: sentence.text.clone(),
            });
        }

        bundle
    }
}

impl Default for EvidenceSelector {
    fn default() -> Self {
        Self::new(DEFAULT_EVIDENCE_K, DEFAULT_EVIDENCE_TOKEN_BUDGET)
    }
}

/// Select evidence with default `k` and budget, rendered as text.
pub fn get_evidence(index: &LexicalIndex, query: &str) -> String {
    EvidenceSelector::default().select(index, query).render()
}
