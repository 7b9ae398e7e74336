//! Sentence segmentation of raw document text.
//!
//! A document is split into atomic sentence units that the lexical index
//! treats as individual retrievable documents. Splitting happens *after* a
//! terminal marker, so the marker stays attached to the sentence it ends.

use serde::{Deserialize, Serialize};

/// Terminal markers recognised by the default segmenter.
///
/// Full-width CJK punctuation always terminates a sentence. ASCII `!`, `?`
/// and `;` do too. The ASCII full stop only terminates when followed by
/// whitespace or end of input, so decimals like `3.5` stay intact.
pub const DEFAULT_TERMINALS: &[char] = &['。', '！', '？', '；', '!', '?', ';', '\n'];

/// One sentence of the source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sentence {
    /// 0-based position in document order
    pub index: usize,

    /// Trimmed sentence text, never empty
    pub text: String,
}

/// Splits document text into sentences.
#[derive(Debug, Clone)]
pub struct Segmenter {
    terminals: Vec<char>,
    split_on_full_stop: bool,
}

impl Segmenter {
    pub fn new() -> Self {
        Self {
            terminals: DEFAULT_TERMINALS.to_vec(),
            split_on_full_stop: true,
        }
    }

    /// Use a custom terminal set. The whitespace-followed ASCII full stop
    /// rule is disabled; add `'.'` explicitly to split on every full stop.
    pub fn with_terminals(terminals: impl IntoIterator<Item = char>) -> Self {
        Self {
            terminals: terminals.into_iter().collect(),
            split_on_full_stop: false,
        }
    }

    /// Segment `text` into ordered, non-empty, trimmed sentences.
    ///
    /// Deterministic: the same text always yields the same sequence and
    /// indices. An empty or all-whitespace document yields no sentences.
    pub fn segment(&self, text: &str) -> Vec<Sentence> {
        let mut sentences = Vec::new();
        let mut start = 0;
        let mut chars = text.char_indices().peekable();

        while let Some((pos, c)) = chars.next() {
            let end = pos + c.len_utf8();
            let boundary = self.terminals.contains(&c)
                || (self.split_on_full_stop
                    && c == '.'
                    && chars.peek().map_or(true, |(_, next)| next.is_whitespace()));

            if boundary {
                push_fragment(&mut sentences, &text[start..end]);
                start = end;
            }
        }
        push_fragment(&mut sentences, &text[start..]);

        sentences
    }
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::new()
    }
}

fn push_fragment(sentences: &mut Vec<Sentence>, fragment: &str) {
    let trimmed = fragment.trim();
    if !trimmed.is_empty() {
        sentences.push(Sentence {
            index: sentences.len(),
            text: trimmed.to_string(),
        });
    }
}

/// Segment with the default terminal set.
pub fn segment(text: &str) -> Vec<Sentence> {
    Segmenter::new().segment(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn texts(sentences: &[Sentence]) -> Vec<&str> {
        sentences.iter().map(|s| s.text.as_str()).collect()
    }

    #[test]
    fn test_cjk_terminals_stay_attached() {
        let sentences = segment("我们的产品很好。市场很大！你相信吗？");
        assert_eq!(
            texts(&sentences),
            vec!["我们的产品很好。", "市场很大！", "你相信吗？"]
        );
        assert_eq!(sentences[2].index, 2);
    }

    #[test]
    fn test_newline_splits_and_empty_fragments_dropped() {
        let sentences = segment("Team\n\n  \nMarket size is large; growth is fast\n");
        assert_eq!(
            texts(&sentences),
            vec!["Team", "Market size is large;", "growth is fast"]
        );
    }

    #[test]
    fn test_full_stop_requires_following_whitespace() {
        let sentences = segment("Revenue grew 3.5 times. Margins held.");
        assert_eq!(
            texts(&sentences),
            vec!["Revenue grew 3.5 times.", "Margins held."]
        );
    }

    #[test]
    fn test_empty_document() {
        assert!(segment("").is_empty());
        assert!(segment(" \n\t\n").is_empty());
    }

    #[test]
    fn test_custom_terminals() {
        let segmenter = Segmenter::with_terminals(['|']);
        let sentences = segmenter.segment("a. b|c");
        assert_eq!(texts(&sentences), vec!["a. b|", "c"]);
    }

    proptest! {
        #[test]
        fn prop_no_empty_sentences(text in "[a-z 。！\n.]{0,80}") {
            for sentence in segment(&text) {
                prop_assert!(!sentence.text.is_empty());
                prop_assert_eq!(sentence.text.trim(), sentence.text.as_str());
            }
        }

        #[test]
        fn prop_reconstructs_non_whitespace(text in "[a-z 。？；\n.]{0,80}") {
            let joined: String = segment(&text).iter().map(|s| s.text.as_str()).collect();
            let strip = |s: &str| s.chars().filter(|c| !c.is_whitespace()).collect::<String>();
            prop_assert_eq!(strip(&joined), strip(&text));
        }

        #[test]
        fn prop_indices_are_dense(text in "[a-z。\n]{0,60}") {
            for (i, sentence) in segment(&text).iter().enumerate() {
                prop_assert_eq!(sentence.index, i);
            }
        }
    }
}
