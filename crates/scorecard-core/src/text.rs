//! Tokenization seams used by retrieval.
//!
//! Two different notions of "token" are in play:
//! - [`TermTokenizer`] produces the lexical terms the BM25 index ranks on.
//!   The default is [`JiebaTermTokenizer`].
//! - [`TokenCounter`] counts the model-side token cost of a sentence and
//!   drives the evidence budget. The default is [`Cl100kTokenCounter`].

use std::sync::Arc;

use jieba_rs::Jieba;
use lazy_static::lazy_static;
use tiktoken_rs::CoreBPE;

use crate::CoreError;

lazy_static! {
    static ref JIEBA: Jieba = Jieba::new();
    static ref CL100K: Result<Arc<CoreBPE>, String> = tiktoken_rs::cl100k_base()
        .map(Arc::new)
        .map_err(|e| e.to_string());
}

/// Splits text into lexical terms for ranking.
pub trait TermTokenizer: Send + Sync {
    /// Tokenize `text` into terms. Order matters only for term frequency.
    fn terms(&self, text: &str) -> Vec<String>;
}

/// Counts model tokens for budget enforcement.
pub trait TokenCounter: Send + Sync {
    /// Number of tokens `text` costs when sent to the scoring oracle.
    fn count(&self, text: &str) -> usize;
}

/// Dictionary segmentation with jieba (HMM enabled for unknown words).
///
/// Text is lowercased before cutting. Pieces without any alphanumeric
/// character (whitespace, punctuation) are dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct JiebaTermTokenizer;

impl TermTokenizer for JiebaTermTokenizer {
    fn terms(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        JIEBA
            .cut(&lowered, true)
            .into_iter()
            .filter(|piece| piece.chars().any(char::is_alphanumeric))
            .map(str::to_string)
            .collect()
    }
}

/// Dictionary-free tokenizer for mixed CJK / Latin text.
///
/// - Latin, digit and other alphanumeric runs become one lowercased term.
/// - Each run of CJK ideographs yields its single characters plus every
///   overlapping bigram.
/// - Everything else separates terms.
#[derive(Debug, Clone, Copy, Default)]
pub struct BigramTermTokenizer;

impl TermTokenizer for BigramTermTokenizer {
    fn terms(&self, text: &str) -> Vec<String> {
        let mut terms = Vec::new();
        let mut word = String::new();
        let mut cjk_run: Vec<char> = Vec::new();

        for c in text.chars() {
            if is_cjk(c) {
                flush_word(&mut word, &mut terms);
                cjk_run.push(c);
            } else if c.is_alphanumeric() {
                flush_cjk(&mut cjk_run, &mut terms);
                word.extend(c.to_lowercase());
            } else {
                flush_word(&mut word, &mut terms);
                flush_cjk(&mut cjk_run, &mut terms);
            }
        }
        flush_word(&mut word, &mut terms);
        flush_cjk(&mut cjk_run, &mut terms);

        terms
    }
}

fn flush_word(word: &mut String, terms: &mut Vec<String>) {
    if !word.is_empty() {
        terms.push(std::mem::take(word));
    }
}

fn flush_cjk(run: &mut Vec<char>, terms: &mut Vec<String>) {
    for c in run.iter() {
        terms.push(c.to_string());
    }
    for pair in run.windows(2) {
        terms.push(pair.iter().collect());
    }
    run.clear();
}

/// CJK unified ideographs (basic block, extension A and compatibility).
fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{20000}'..='\u{2A6DF}')
}

/// Exact token counts with the `cl100k_base` BPE encoding.
#[derive(Clone)]
pub struct Cl100kTokenCounter {
    bpe: Arc<CoreBPE>,
}

impl std::fmt::Debug for Cl100kTokenCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cl100kTokenCounter").finish_non_exhaustive()
    }
}

impl Cl100kTokenCounter {
    /// Shared encoder, loaded once per process.
    pub fn new() -> Result<Self, CoreError> {
        match &*CL100K {
            Ok(bpe) => Ok(Self { bpe: bpe.clone() }),
            Err(e) => Err(CoreError::Tokenizer(e.clone())),
        }
    }
}

impl TokenCounter for Cl100kTokenCounter {
    fn count(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }
}

/// Character-class token estimate.
///
/// ASCII runs cost one token per four characters; every other character
/// costs one. Under-counts CJK text against cl100k, so it is only used
/// for log estimates and when the encoder cannot be loaded.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicTokenCounter;

impl TokenCounter for HeuristicTokenCounter {
    fn count(&self, text: &str) -> usize {
        let mut tokens: usize = 0;
        let mut ascii_run: usize = 0;

        for c in text.chars() {
            if c.is_ascii() {
                ascii_run += 1;
            } else {
                tokens += ascii_run.div_ceil(4) + 1;
                ascii_run = 0;
            }
        }

        tokens + ascii_run.div_ceil(4)
    }
}

/// The budget counter used when none is given.
pub fn default_token_counter() -> Arc<dyn TokenCounter> {
    match Cl100kTokenCounter::new() {
        Ok(counter) => Arc::new(counter),
        Err(error) => {
            tracing::warn!(%error, "cl100k encoder unavailable; estimating evidence tokens");
            Arc::new(HeuristicTokenCounter)
        }
    }
}
