//! Prompts for the scoring oracle.
//!
//! Each criterion is judged in a two-turn exchange:
//! 1. Instruction turn: persona, the criterion text and its scoring anchors
//! 2. Evidence turn: the evidence bundle and the required reply format
//!
//! Anchors are serialized as a JSON object in rubric order with non-ASCII
//! text left unescaped, so the oracle sees them exactly as authored.

use scorecard_core::{Criterion, EvidenceBundle};

use crate::providers::ChatMessage;

/// Label preceding the criterion text.
pub const CRITERION_LABEL: &str = "评分项说明：";

/// Label preceding the serialized anchors.
pub const ANCHORS_LABEL: &str = "评分锚点：";

/// Opening line of the evidence turn.
pub const EVIDENCE_PREAMBLE: &str = "以下是与该评分项最相关的内容证据：";

/// Required reply shape, closing the evidence turn.
pub const VERDICT_INSTRUCTION: &str = r#"请基于锚点给出 1-5 分并返回 JSON格式：
{"score": 数字(1-5), "reason": "评分理由"}"#;

/// Build the instruction turn for a criterion.
pub fn instruction_turn(persona: &str, criterion: &Criterion) -> ChatMessage {
    ChatMessage::system(format!(
        "{}\n{}{}\n{}{}",
        persona,
        CRITERION_LABEL,
        criterion.text,
        ANCHORS_LABEL,
        criterion.scoring_anchors.to_json()
    ))
}

/// Build the evidence turn for a bundle.
pub fn evidence_turn(evidence: &EvidenceBundle) -> ChatMessage {
    ChatMessage::user(format!(
        "{}\n{}\n\n{}",
        EVIDENCE_PREAMBLE,
        evidence.render(),
        VERDICT_INSTRUCTION
    ))
}

/// Both turns, in order.
pub fn scoring_messages(
    persona: &str,
    criterion: &Criterion,
    evidence: &EvidenceBundle,
) -> Vec<ChatMessage> {
    vec![instruction_turn(persona, criterion), evidence_turn(evidence)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use scorecard_core::{EvidenceEntry, Rubric};

    fn criterion() -> Criterion {
        let rubric = Rubric::from_json(
            r#"[{"subcriteria": [{
                "id": "E1",
                "text": "团队结构完整",
                "scoring_anchors": {"5": "核心成员齐全", "1": "仅有创始人"}
            }]}]"#,
        )
        .unwrap();
        rubric.criteria()["E1"].clone()
    }

    #[test]
    fn test_instruction_turn_carries_anchors_losslessly() {
        let message = instruction_turn("你是一位评委。", &criterion());
        assert_eq!(message.role, "system");
        assert_eq!(
            message.content,
            "你是一位评委。\n评分项说明：团队结构完整\n评分锚点：{\"5\":\"核心成员齐全\",\"1\":\"仅有创始人\"}"
        );
    }

    #[test]
    fn test_evidence_turn_lists_indexed_sentences() {
        let bundle = EvidenceBundle {
            entries: vec![
                EvidenceEntry {
                    sentence_index: 7,
                    text: "团队共有五名成员。".to_string(),
                },
                EvidenceEntry {
                    sentence_index: 2,
                    text: "CTO 拥有十年经验。".to_string(),
                },
            ],
            token_count: 20,
        };
        let message = evidence_turn(&bundle);
        assert_eq!(message.role, "user");
        assert!(message
            .content
            .contains("[7] 团队共有五名成员。\n[2] CTO 拥有十年经验。"));
        assert!(message.content.ends_with(VERDICT_INSTRUCTION));
    }

    #[test]
    fn test_empty_bundle_still_asks_for_verdict() {
        let messages = scoring_messages("p", &criterion(), &EvidenceBundle::default());
        assert_eq!(messages.len(), 2);
        assert!(messages[1].content.starts_with(EVIDENCE_PREAMBLE));
        assert!(messages[1].content.contains(r#""score""#));
    }
}
