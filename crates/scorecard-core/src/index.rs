//! BM25 lexical index over segmented sentences.
//!
//! Each sentence is one retrievable document. The index is built once per
//! scoring run and is immutable afterwards, so it can be shared by reference
//! across every concurrent scoring task.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::segmenter::Sentence;
use crate::text::{JiebaTermTokenizer, TermTokenizer};

/// BM25 term-frequency saturation.
pub const BM25_K1: f64 = 1.5;

/// BM25 length normalisation.
pub const BM25_B: f64 = 0.75;

/// Floor applied to negative IDF values, as a fraction of the mean IDF.
pub const BM25_EPSILON: f64 = 0.25;

/// Per-sentence term statistics.
#[derive(Debug, Clone)]
struct DocStats {
    term_freqs: HashMap<String, usize>,
    len: usize,
}

/// Immutable BM25 (Okapi) ranking structure.
pub struct LexicalIndex {
    sentences: Vec<Sentence>,
    docs: Vec<DocStats>,
    idf: HashMap<String, f64>,
    avgdl: f64,
    tokenizer: Arc<dyn TermTokenizer>,
}

impl std::fmt::Debug for LexicalIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LexicalIndex")
            .field("sentences", &self.sentences.len())
            .field("vocabulary", &self.idf.len())
            .field("avgdl", &self.avgdl)
            .finish()
    }
}

impl LexicalIndex {
    /// Build an index with jieba term segmentation.
    pub fn new(sentences: Vec<Sentence>) -> Self {
        Self::with_tokenizer(sentences, Arc::new(JiebaTermTokenizer))
    }

    /// Build an index with a custom term tokenizer.
    ///
    /// The same tokenizer is used for queries, so ranking stays consistent.
    pub fn with_tokenizer(sentences: Vec<Sentence>, tokenizer: Arc<dyn TermTokenizer>) -> Self {
        let docs: Vec<DocStats> = sentences
            .iter()
            .map(|s| {
                let terms = tokenizer.terms(&s.text);
                let len = terms.len();
                let mut term_freqs = HashMap::new();
                for term in terms {
                    *term_freqs.entry(term).or_insert(0) += 1;
                }
                DocStats { term_freqs, len }
            })
            .collect();

        let total_len: usize = docs.iter().map(|d| d.len).sum();
        let avgdl = if docs.is_empty() {
            0.0
        } else {
            total_len as f64 / docs.len() as f64
        };

        let idf = compute_idf(&docs);

        tracing::debug!(
            sentences = sentences.len(),
            vocabulary = idf.len(),
            avgdl,
            "Built lexical index"
        );

        Self {
            sentences,
            docs,
            idf,
            avgdl,
            tokenizer,
        }
    }

    /// All indexed sentences in document order.
    pub fn sentences(&self) -> &[Sentence] {
        &self.sentences
    }

    /// Number of indexed sentences.
    pub fn len(&self) -> usize {
        self.sentences.len()
    }

    /// Whether the corpus is empty.
    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }

    /// Tokenize a query with the index's tokenizer.
    pub fn query_terms(&self, query: &str) -> Vec<String> {
        self.tokenizer.terms(query)
    }

    /// BM25 score of every sentence against `query_terms`, in document order.
    ///
    /// Pure function of (corpus, query): repeated calls return identical
    /// scores. Duplicate query terms contribute once per occurrence.
    pub fn scores(&self, query_terms: &[String]) -> Vec<f64> {
        self.docs
            .iter()
            .map(|doc| {
                if self.avgdl <= 0.0 {
                    return 0.0;
                }
                let norm = BM25_K1 * (1.0 - BM25_B + BM25_B * doc.len as f64 / self.avgdl);
                query_terms
                    .iter()
                    .map(|term| {
                        let freq = doc.term_freqs.get(term).copied().unwrap_or(0) as f64;
                        let idf = self.idf.get(term).copied().unwrap_or(0.0);
                        idf * (freq * (BM25_K1 + 1.0)) / (freq + norm)
                    })
                    .sum()
            })
            .collect()
    }

    /// Indices of the `k` highest-scoring sentences.
    ///
    /// Sorted by descending score; ties broken by lower sentence index.
    /// Returns nothing when the query has no terms.
    pub fn top_k(&self, query: &str, k: usize) -> Vec<usize> {
        let terms = self.query_terms(query);
        if terms.is_empty() {
            return Vec::new();
        }

        let scores = self.scores(&terms);
        let mut ranked: Vec<usize> = (0..scores.len()).collect();
        ranked.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]).then(a.cmp(&b)));
        ranked.truncate(k);
        ranked
    }
}

/// Okapi IDF with epsilon floor for terms present in most documents.
fn compute_idf(docs: &[DocStats]) -> HashMap<String, f64> {
    // Ordered so the IDF sum, and therefore the epsilon floor, is reproducible
    let mut doc_freq: BTreeMap<&str, usize> = BTreeMap::new();
    for doc in docs {
        for term in doc.term_freqs.keys() {
            *doc_freq.entry(term.as_str()).or_insert(0) += 1;
        }
    }

    let n = docs.len() as f64;
    let mut idf: HashMap<String, f64> = HashMap::with_capacity(doc_freq.len());
    let mut idf_sum = 0.0;
    let mut negative = Vec::new();

    for (term, df) in doc_freq {
        let df = df as f64;
        let value = ((n - df + 0.5) / (df + 0.5)).ln();
        idf_sum += value;
        if value < 0.0 {
            negative.push(term.to_string());
        }
        idf.insert(term.to_string(), value);
    }

    if !idf.is_empty() {
        let eps = BM25_EPSILON * idf_sum / idf.len() as f64;
        for term in negative {
            idf.insert(term, eps);
        }
    }

    idf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segmenter::segment;

    fn index(text: &str) -> LexicalIndex {
        LexicalIndex::new(segment(text))
    }

    #[test]
    fn test_relevant_sentence_ranks_first() {
        let idx = index(
            "The team has ten engineers.\n\
             Our market is growing quickly.\n\
             The battery market is large and the battery market is global.\n\
             We have a patent.\n\
             Customers like the product.",
        );
        let top = idx.top_k("battery market", 2);
        assert_eq!(top, vec![2, 1]);
    }

    #[test]
    fn test_ties_broken_by_document_order() {
        let idx = index("alpha one\nalpha two\nalpha three\nbeta");
        // equal-length sentences sharing "alpha" tie
        let top = idx.top_k("alpha", 3);
        assert_eq!(top, vec![0, 1, 2]);
    }

    #[test]
    fn test_scores_are_deterministic() {
        let idx = index("专利技术领先。团队经验丰富。市场空间广阔。");
        let terms = idx.query_terms("技术专利");
        assert_eq!(idx.scores(&terms), idx.scores(&terms));
        assert_eq!(idx.top_k("技术专利", 3), idx.top_k("技术专利", 3));
        assert_eq!(idx.top_k("技术专利", 1), vec![0]);
    }

    #[test]
    fn test_chinese_query_matches_segmented_words() {
        let idx = index("团队成员来自清华大学。\n公司主营锂电池回收业务。\n市场规模持续扩大。");
        assert_eq!(idx.top_k("锂电池回收", 1), vec![1]);
        assert_eq!(idx.top_k("清华大学团队", 1), vec![0]);
    }

    #[test]
    fn test_custom_tokenizer_is_used_for_queries() {
        let idx = LexicalIndex::with_tokenizer(
            segment("市场规模\n规则模板\n团队介绍"),
            Arc::new(crate::text::BigramTermTokenizer),
        );
        assert!(idx.query_terms("规模").contains(&"规模".to_string()));
        assert_eq!(idx.top_k("规模", 1), vec![0]);
    }

    #[test]
    fn test_empty_query_and_corpus() {
        let idx = index("one sentence.");
        assert!(idx.top_k("", 5).is_empty());
        assert!(idx.top_k("。，", 5).is_empty());

        let empty = index("");
        assert!(empty.is_empty());
        assert!(empty.top_k("anything", 5).is_empty());
    }

    #[test]
    fn test_k_larger_than_corpus() {
        let idx = index("a\nb");
        assert_eq!(idx.top_k("a", 10).len(), 2);
    }

    #[test]
    fn test_negative_idf_is_floored() {
        // "common" appears in 3 of 4 sentences: raw Okapi IDF is negative
        let idx = index("common x\ncommon y\ncommon z\nrare");
        let common = idx.idf["common"];
        assert!(common > 0.0);
        assert!(common < idx.idf["rare"]);

        let scores = idx.scores(&["rare".to_string()]);
        assert!(scores[3] > scores[0]);
    }
}
