//! Final scoring report and its artifacts.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::verdict::Verdict;

/// Weighted contribution of one dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct DimensionScore {
    pub dimension: String,
    pub weighted_value: f64,
}

/// Per-dimension scores in weight-table order, serialized as an object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DimensionScores(Vec<DimensionScore>);

impl DimensionScores {
    pub fn new(scores: Vec<DimensionScore>) -> Self {
        Self(scores)
    }

    pub fn get(&self, dimension: &str) -> Option<f64> {
        self.0
            .iter()
            .find(|d| d.dimension == dimension)
            .map(|d| d.weighted_value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DimensionScore> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for DimensionScores {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for score in &self.0 {
            map.serialize_entry(&score.dimension, &score.weighted_value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for DimensionScores {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ScoresVisitor;

        impl<'de> Visitor<'de> for ScoresVisitor {
            type Value = DimensionScores;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a map of dimension to weighted score")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut scores = Vec::new();
                while let Some((dimension, weighted_value)) = map.next_entry::<String, f64>()? {
                    scores.push(DimensionScore {
                        dimension,
                        weighted_value,
                    });
                }
                Ok(DimensionScores(scores))
            }
        }

        deserializer.deserialize_map(ScoresVisitor)
    }
}

/// Outcome of one scoring run. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Sum of weighted dimension scores, rounded to two decimals
    pub total: f64,

    /// Weighted value of every dimension in the weight table
    pub dim_scores: DimensionScores,

    /// Verdict of every criterion, keyed by id
    pub detail: BTreeMap<String, Verdict>,

    /// When the report was aggregated
    pub scored_at: DateTime<Utc>,
}

impl Report {
    /// Criteria that ended with a sentinel verdict.
    pub fn degraded_count(&self) -> usize {
        self.detail.values().filter(|v| v.is_degraded()).count()
    }

    /// Pretty-printed JSON artifact.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// `dimension,score` summary for spreadsheets.
    pub fn to_csv(&self) -> String {
        let mut out = String::from("dimension,score\n");
        for score in self.dim_scores.iter() {
            let _ = writeln!(
                out,
                "{},{}",
                csv_field(&score.dimension),
                score.weighted_value
            );
        }
        out
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
