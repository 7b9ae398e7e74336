//! Rubric parsing from JSON/YAML.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::path::Path;

use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::SerializeMap;
use lazy_static::lazy_static;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

lazy_static! {
    /// Compiled from `schema/rubric.schema.json`.
    static ref RUBRIC_SCHEMA: Result<jsonschema::Validator, String> =
        serde_json::from_str::<serde_json::Value>(include_str!("../../schema/rubric.schema.json"))
            .map_err(|e| format!("invalid rubric schema: {}", e))
            .and_then(|schema| {
                jsonschema::options()
                    .build(&schema)
                    .map_err(|e| format!("rubric schema does not compile: {}", e))
            });
}

/// Every schema violation in `value`, each with its instance path.
fn schema_violations(value: &serde_json::Value) -> Vec<String> {
    match &*RUBRIC_SCHEMA {
        Ok(validator) => validator
            .iter_errors(value)
            .map(|e| format!("{} at {}", e, e.instance_path))
            .collect(),
        Err(e) => vec![e.clone()],
    }
}

/// Errors that can occur when loading rubrics.
#[derive(Error, Debug)]
pub enum RubricError {
    #[error("Failed to read rubric file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Rubric does not match schema: {}", .0.join("; "))]
    SchemaViolation(Vec<String>),

    #[error("Rubric validation failed: {0}")]
    ValidationError(String),

    #[error("Duplicate criterion ID: {0}")]
    DuplicateCriterion(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// One anchor: what a given score level looks like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoringAnchor {
    /// Score level, e.g. "1" or "5"
    pub level: String,

    /// Description of performance at this level
    pub text: String,
}

/// Ordered scoring anchors of a criterion.
///
/// Accepts either an object (`{"1": "...", "5": "..."}`) or a list of
/// `{level, text}` objects. Source order is kept and serialization always
/// emits an object in that same order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScoringAnchors(Vec<ScoringAnchor>);

impl ScoringAnchors {
    pub fn new(anchors: Vec<ScoringAnchor>) -> Self {
        Self(anchors)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScoringAnchor> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Compact JSON object in source order, non-ASCII left unescaped.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

impl Serialize for ScoringAnchors {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for anchor in &self.0 {
            map.serialize_entry(&anchor.level, &anchor.text)?;
        }
        map.end()
    }
}

/// A score level written as either a string or an integer.
#[derive(Deserialize)]
#[serde(untagged)]
enum Level {
    Int(i64),
    Str(String),
}

impl From<Level> for String {
    fn from(level: Level) -> Self {
        match level {
            Level::Int(n) => n.to_string(),
            Level::Str(s) => s,
        }
    }
}

#[derive(Deserialize)]
struct ListedAnchor {
    level: Level,
    text: String,
}

struct AnchorsVisitor;

impl<'de> Visitor<'de> for AnchorsVisitor {
    type Value = ScoringAnchors;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of level to anchor text, or a list of {level, text}")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut anchors = Vec::new();
        while let Some((level, text)) = map.next_entry::<Level, String>()? {
            anchors.push(ScoringAnchor {
                level: level.into(),
                text,
            });
        }
        Ok(ScoringAnchors(anchors))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut anchors = Vec::new();
        while let Some(item) = seq.next_element::<ListedAnchor>()? {
            anchors.push(ScoringAnchor {
                level: item.level.into(),
                text: item.text,
            });
        }
        Ok(ScoringAnchors(anchors))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(ScoringAnchors::default())
    }
}

impl<'de> Deserialize<'de> for ScoringAnchors {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(AnchorsVisitor)
    }
}

/// One scorable rubric item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Criterion {
    /// Unique identifier; its first character names the dimension (e.g. "E1")
    pub id: String,

    /// What the criterion assesses
    pub text: String,

    /// Ordered score-level anchors
    #[serde(default)]
    pub scoring_anchors: ScoringAnchors,
}

impl Criterion {
    /// Dimension this criterion belongs to.
    pub fn dimension(&self) -> &str {
        dimension_of(&self.id)
    }
}

/// Dimension key of a criterion id: its leading character.
pub fn dimension_of(id: &str) -> &str {
    let end = id.chars().next().map_or(0, char::len_utf8);
    &id[..end]
}

/// A top-level rubric category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Dimension {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub name: Option<String>,

    /// Criteria scored within this dimension
    pub subcriteria: Vec<Criterion>,
}

/// A scoring rubric: ordered dimensions of criteria.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Rubric {
    pub dimensions: Vec<Dimension>,
}

impl Rubric {
    /// Parse a rubric from a JSON string, validating against the schema.
    pub fn from_json(json: &str) -> Result<Self, RubricError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let violations = schema_violations(&value);
        if !violations.is_empty() {
            return Err(RubricError::SchemaViolation(violations));
        }
        // Re-read from the source text: `Value` objects do not keep key order
        let rubric: Rubric = serde_json::from_str(json)?;
        rubric.validate()?;
        Ok(rubric)
    }

    /// Parse a rubric from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, RubricError> {
        let rubric: Rubric = serde_yaml::from_str(yaml)?;
        rubric.validate()?;
        Ok(rubric)
    }

    /// Load a rubric file; `.yaml`/`.yml` are read as YAML, anything else as JSON.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RubricError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&contents),
            _ => Self::from_json(&contents),
        }
    }

    fn validate(&self) -> Result<(), RubricError> {
        let mut seen = HashSet::new();

        for criterion in self.dimensions.iter().flat_map(|d| &d.subcriteria) {
            if criterion.id.is_empty() {
                return Err(RubricError::MissingField("subcriteria[].id".to_string()));
            }
            if criterion.text.trim().is_empty() {
                return Err(RubricError::MissingField(format!("{}.text", criterion.id)));
            }
            if !seen.insert(criterion.id.as_str()) {
                return Err(RubricError::DuplicateCriterion(criterion.id.clone()));
            }
        }

        if seen.is_empty() {
            return Err(RubricError::ValidationError(
                "rubric defines no criteria".to_string(),
            ));
        }

        Ok(())
    }

    /// Every criterion, keyed by id.
    pub fn criteria(&self) -> BTreeMap<String, Criterion> {
        self.dimensions
            .iter()
            .flat_map(|d| &d.subcriteria)
            .map(|c| (c.id.clone(), c.clone()))
            .collect()
    }

    /// Total number of criteria.
    pub fn criterion_count(&self) -> usize {
        self.dimensions.iter().map(|d| d.subcriteria.len()).sum()
    }

    /// Number of criteria per dimension key.
    pub fn dimension_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for criterion in self.dimensions.iter().flat_map(|d| &d.subcriteria) {
            *counts.entry(criterion.dimension().to_string()).or_insert(0) += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_RUBRIC: &str = r#"[
        {
            "id": "E",
            "name": "Execution",
            "subcriteria": [
                {
                    "id": "E1",
                    "text": "团队结构完整",
                    "scoring_anchors": {"5": "完整", "3": "一般", "1": "缺失"}
                },
                {"id": "E2", "text": "Milestones are concrete"}
            ]
        },
        {
            "id": "I",
            "subcriteria": [
                {
                    "id": "I1",
                    "text": "Technical novelty",
                    "scoring_anchors": [{"level": 1, "text": "None"}, {"level": 5, "text": "Patented"}]
                }
            ]
        }
    ]"#;

    #[test]
    fn test_parse_valid_rubric() {
        let rubric = Rubric::from_json(VALID_RUBRIC).unwrap();
        assert_eq!(rubric.dimensions.len(), 2);
        assert_eq!(rubric.criterion_count(), 3);

        let criteria = rubric.criteria();
        assert_eq!(
            criteria.keys().collect::<Vec<_>>(),
            vec!["E1", "E2", "I1"]
        );
        assert_eq!(criteria["E1"].dimension(), "E");
        assert!(criteria["E2"].scoring_anchors.is_empty());
    }

    #[test]
    fn test_anchor_order_is_preserved() {
        let rubric = Rubric::from_json(VALID_RUBRIC).unwrap();
        let criteria = rubric.criteria();

        assert_eq!(
            criteria["E1"].scoring_anchors.to_json(),
            r#"{"5":"完整","3":"一般","1":"缺失"}"#
        );
        assert_eq!(
            criteria["I1"].scoring_anchors.to_json(),
            r#"{"1":"None","5":"Patented"}"#
        );
    }

    #[test]
    fn test_parse_yaml_with_integer_levels() {
        let yaml = r#"
- id: T
  subcriteria:
    - id: T1
      text: Technology readiness
      scoring_anchors:
        1: Idea only
        5: Shipping product
"#;
        let rubric = Rubric::from_yaml(yaml).unwrap();
        let criteria = rubric.criteria();
        let levels: Vec<_> = criteria["T1"]
            .scoring_anchors
            .iter()
            .map(|a| a.level.as_str())
            .collect();
        assert_eq!(levels, vec!["1", "5"]);
    }

    #[test]
    fn test_duplicate_criterion_ids() {
        let json = r#"[
            {"subcriteria": [{"id": "C1", "text": "a"}]},
            {"subcriteria": [{"id": "C1", "text": "b"}]}
        ]"#;
        let result = Rubric::from_json(json);
        assert!(matches!(result, Err(RubricError::DuplicateCriterion(id)) if id == "C1"));
    }

    #[test]
    fn test_empty_rubric_rejected() {
        let result = Rubric::from_json(r#"[{"subcriteria": []}]"#);
        assert!(matches!(result, Err(RubricError::ValidationError(_))));
    }

    #[test]
    fn test_schema_violation_reported() {
        let result = Rubric::from_json(r#"[{"subcriteria": [{"id": "S1"}]}]"#);
        match result {
            Err(RubricError::SchemaViolation(errors)) => assert!(!errors.is_empty()),
            other => panic!("Expected SchemaViolation, got {:?}", other),
        }
    }

    #[test]
    fn test_schema_accepts_both_anchor_shapes() {
        let value = serde_json::json!([
            {
                "id": "I",
                "subcriteria": [
                    {"id": "I1", "text": "Novelty", "scoring_anchors": {"1": "None", "5": "Strong"}},
                    {
                        "id": "I2",
                        "text": "Moat",
                        "scoring_anchors": [{"level": 1, "text": "None"}, {"level": "5", "text": "Wide"}]
                    }
                ]
            }
        ]);
        assert!(schema_violations(&value).is_empty());
    }

    #[test]
    fn test_schema_reports_paths() {
        let value = serde_json::json!([{ "subcriteria": [{ "id": "", "text": "Something" }] }]);
        let violations = schema_violations(&value);
        assert!(violations.iter().any(|e| e.contains("/0/subcriteria/0/id")));

        assert!(!schema_violations(&serde_json::json!([{ "id": "E" }])).is_empty());
        assert!(!schema_violations(&serde_json::json!({ "subcriteria": [] })).is_empty());
    }

    #[test]
    fn test_blank_text_rejected_in_yaml() {
        let yaml = "- subcriteria:\n    - id: S1\n      text: \"  \"\n";
        assert!(matches!(
            Rubric::from_yaml(yaml),
            Err(RubricError::MissingField(field)) if field == "S1.text"
        ));
    }

    #[test]
    fn test_dimension_counts() {
        let rubric = Rubric::from_json(VALID_RUBRIC).unwrap();
        let counts = rubric.dimension_counts();
        assert_eq!(counts["E"], 2);
        assert_eq!(counts["I"], 1);
    }

    #[test]
    fn test_dimension_of_multibyte_id() {
        assert_eq!(dimension_of("创1"), "创");
        assert_eq!(dimension_of(""), "");
    }
}
