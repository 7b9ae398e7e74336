//! Verdicts and oracle reply parsing.
//!
//! Every criterion ends a run with exactly one [`Verdict`]. When the oracle's
//! reply cannot be trusted a sentinel verdict (score 1) is substituted and
//! its [`VerdictStatus`] records why.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lowest score on the rubric scale; also the sentinel score.
pub const MIN_SCORE: u8 = 1;

/// Highest score on the rubric scale.
pub const MAX_SCORE: u8 = 5;

/// Characters of the raw reply kept in an unparseable sentinel's reason.
pub const UNPARSEABLE_PREFIX_CHARS: usize = 100;

lazy_static! {
    /// A verdict-shaped object embedded anywhere in the reply. The reason may
    /// span lines and contain backslash-escaped quotes.
    static ref VERDICT_PATTERN: Regex = Regex::new(
        r#"(?s)\{\s*"score"\s*:\s*([1-5])\s*,\s*"reason"\s*:\s*"((?:[^"\\]|\\.)*)"\s*\}"#
    ).unwrap();

    /// A single surrounding Markdown code fence, optionally tagged.
    static ref CODE_FENCE: Regex = Regex::new(
        r"(?s)^```[A-Za-z0-9_-]*\s*\n(.*?)\n?\s*```$"
    ).unwrap();
}

/// How a verdict was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictStatus {
    /// Reply parsed directly as a verdict object
    Scored,
    /// Reply recovered by pattern extraction
    Extracted,
    /// Reply could not be interpreted
    Unparseable,
    /// Oracle answered with a non-success status
    ApiError,
    /// Transport reply had no usable message content
    MalformedResponse,
    /// Request exceeded its wall-clock ceiling
    Timeout,
    /// Connection, TLS or other transport failure
    TransportError,
}

impl VerdictStatus {
    /// Whether the verdict is a sentinel rather than the oracle's judgment.
    pub fn is_degraded(&self) -> bool {
        !matches!(self, VerdictStatus::Scored | VerdictStatus::Extracted)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VerdictStatus::Scored => "scored",
            VerdictStatus::Extracted => "extracted",
            VerdictStatus::Unparseable => "unparseable",
            VerdictStatus::ApiError => "api_error",
            VerdictStatus::MalformedResponse => "malformed_response",
            VerdictStatus::Timeout => "timeout",
            VerdictStatus::TransportError => "transport_error",
        }
    }
}

impl fmt::Display for VerdictStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The judgment for one criterion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    /// Score in `MIN_SCORE..=MAX_SCORE`
    pub score: u8,

    /// Rationale, or a diagnostic for sentinel verdicts
    pub reason: String,

    pub status: VerdictStatus,
}

impl Verdict {
    /// A verdict parsed directly from the oracle.
    pub fn scored(score: u8, reason: impl Into<String>) -> Self {
        Self {
            score: score.clamp(MIN_SCORE, MAX_SCORE),
            reason: reason.into(),
            status: VerdictStatus::Scored,
        }
    }

    /// A sentinel verdict: lowest score, diagnostic reason.
    pub fn sentinel(status: VerdictStatus, reason: impl Into<String>) -> Self {
        Self {
            score: MIN_SCORE,
            reason: reason.into(),
            status,
        }
    }

    /// Sentinel for a reply neither parse tier could read.
    pub fn unparseable(raw: &str) -> Self {
        let prefix: String = raw.chars().take(UNPARSEABLE_PREFIX_CHARS).collect();
        Self::sentinel(
            VerdictStatus::Unparseable,
            format!("unable to parse oracle reply: {}...", prefix),
        )
    }

    pub fn is_degraded(&self) -> bool {
        self.status.is_degraded()
    }
}

/// Interpret an oracle reply as a verdict.
///
/// 1. The whole reply (minus surrounding whitespace and one code fence) is
///    read as a JSON object with an integral `score` in 1..=5 and a string
///    `reason`.
/// 2. Otherwise the first verdict-shaped `{"score": N, "reason": "..."}`
///    substring is extracted.
/// 3. Otherwise an unparseable sentinel carrying a prefix of the reply.
///
/// Never fails.
pub fn parse_verdict(raw: &str) -> Verdict {
    if let Some(verdict) = parse_structured(raw) {
        return verdict;
    }

    if let Some(verdict) = extract_embedded(raw) {
        tracing::debug!(score = verdict.score, "Verdict recovered by pattern extraction");
        return verdict;
    }

    tracing::warn!(reply_chars = raw.chars().count(), "Oracle reply is unparseable");
    Verdict::unparseable(raw)
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    match CODE_FENCE.captures(trimmed).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => trimmed,
    }
}

fn parse_structured(raw: &str) -> Option<Verdict> {
    let value: serde_json::Value = serde_json::from_str(strip_code_fence(raw)).ok()?;
    let object = value.as_object()?;

    let score = match object.get("score")? {
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i
            } else {
                let f = n.as_f64()?;
                if f.fract() != 0.0 {
                    return None;
                }
                f as i64
            }
        }
        _ => return None,
    };
    if !(i64::from(MIN_SCORE)..=i64::from(MAX_SCORE)).contains(&score) {
        return None;
    }

    let reason = object.get("reason")?.as_str()?;

    Some(Verdict::scored(score as u8, reason))
}

fn extract_embedded(raw: &str) -> Option<Verdict> {
    let captures = VERDICT_PATTERN.captures(raw)?;
    let score: u8 = captures.get(1)?.as_str().parse().ok()?;
    let escaped = captures.get(2)?.as_str();

    // Decode JSON string escapes; keep the raw capture if they are invalid
    let literal = escaped
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t");
    let reason = serde_json::from_str::<String>(&format!("\"{}\"", literal))
        .unwrap_or_else(|_| escaped.to_string());

    Some(Verdict {
        score,
        reason,
        status: VerdictStatus::Extracted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_json_reply() {
        let verdict = parse_verdict(r#"{"score": 4, "reason": "团队完整 [2]"}"#);
        assert_eq!(verdict, Verdict::scored(4, "团队完整 [2]"));
        assert!(!verdict.is_degraded());
    }

    #[test]
    fn test_code_fenced_reply() {
        let verdict = parse_verdict("```json\n{\"score\": 2, \"reason\": \"thin\"}\n```");
        assert_eq!(verdict.score, 2);
        assert_eq!(verdict.status, VerdictStatus::Scored);
    }

    #[test]
    fn test_integral_float_score_accepted() {
        let verdict = parse_verdict(r#"{"score": 3.0, "reason": "ok"}"#);
        assert_eq!(verdict.score, 3);
        assert_eq!(verdict.status, VerdictStatus::Scored);
    }

    #[test]
    fn test_embedded_verdict_extracted() {
        let raw = r#"Here is my assessment: {"score": 3, "reason": "ok"} Hope this helps."#;
        let verdict = parse_verdict(raw);
        assert_eq!(verdict.score, 3);
        assert_eq!(verdict.reason, "ok");
        assert_eq!(verdict.status, VerdictStatus::Extracted);
        assert!(!verdict.is_degraded());
    }

    #[test]
    fn test_extraction_decodes_escaped_quotes() {
        let raw = "Result:\n{\"score\": 5, \"reason\": \"cites \\\"[4]\\\"\nand more\"}";
        let verdict = parse_verdict(raw);
        assert_eq!(verdict.score, 5);
        assert_eq!(verdict.reason, "cites \"[4]\"\nand more");
    }

    #[test]
    fn test_out_of_range_score_falls_through() {
        // Valid JSON but score 7 is outside the scale and the pattern only
        // accepts 1-5, so this degrades to the sentinel
        let verdict = parse_verdict(r#"{"score": 7, "reason": "great"}"#);
        assert_eq!(verdict.status, VerdictStatus::Unparseable);
        assert_eq!(verdict.score, MIN_SCORE);
    }

    #[test]
    fn test_wrong_shape_json_falls_through_to_pattern() {
        let verdict = parse_verdict(r#"[{"score": 2, "reason": "listed"}]"#);
        assert_eq!(verdict.status, VerdictStatus::Extracted);
        assert_eq!(verdict.score, 2);
    }

    #[test]
    fn test_unparseable_reply_truncated_by_chars() {
        let raw = "评".repeat(150);
        let verdict = parse_verdict(&raw);
        assert_eq!(verdict.status, VerdictStatus::Unparseable);
        assert_eq!(verdict.score, 1);
        assert!(verdict.is_degraded());
        let expected_prefix = "评".repeat(UNPARSEABLE_PREFIX_CHARS);
        assert!(verdict.reason.ends_with(&format!("{}...", expected_prefix)));
        assert!(!verdict.reason.contains(&"评".repeat(UNPARSEABLE_PREFIX_CHARS + 1)));
    }

    #[test]
    fn test_empty_reply_is_unparseable() {
        let verdict = parse_verdict("");
        assert_eq!(verdict.status, VerdictStatus::Unparseable);
        assert!(verdict.reason.ends_with("..."));
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let verdict = Verdict::sentinel(VerdictStatus::MalformedResponse, "missing choices");
        let json = serde_json::to_value(&verdict).unwrap();
        assert_eq!(json["status"], "malformed_response");
        assert_eq!(json["score"], 1);
        assert_eq!(VerdictStatus::TransportError.to_string(), "transport_error");
    }
}
