//! Weighted multi-dimension aggregation.
//!
//! Verdicts are grouped by dimension (the criterion id's leading character),
//! averaged, scaled by the dimension weight and summed into a total.

use std::collections::BTreeMap;
use std::fmt;

use chrono::Utc;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::report::{DimensionScore, DimensionScores, Report};
use crate::rubric::dimension_of;
use crate::verdict::{Verdict, MAX_SCORE};
use crate::CoreError;

/// Dimension weights, in reporting order.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightTable(Vec<(String, f64)>);

impl WeightTable {
    /// Build a table; later duplicates replace earlier weights in place.
    pub fn new<I, S>(weights: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let mut table = Self(Vec::new());
        for (dimension, weight) in weights {
            table.set(dimension.into(), weight);
        }
        table
    }

    fn set(&mut self, dimension: String, weight: f64) {
        match self.0.iter_mut().find(|(d, _)| *d == dimension) {
            Some(entry) => entry.1 = weight,
            None => self.0.push((dimension, weight)),
        }
    }

    pub fn get(&self, dimension: &str) -> Option<f64> {
        self.0.iter().find(|(d, _)| d == dimension).map(|(_, w)| *w)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(d, w)| (d.as_str(), *w))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sum of all weights; the upper bound of any total.
    pub fn total_weight(&self) -> f64 {
        self.0.iter().map(|(_, w)| w).sum()
    }

    /// Reject empty tables, keys that are not a single character, and
    /// negative or non-finite weights.
    ///
    /// Criteria map to dimensions by the first character of their id, so a
    /// longer key could never receive a score.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.0.is_empty() {
            return Err(CoreError::InvalidWeights(
                "weight table is empty".to_string(),
            ));
        }
        for (dimension, weight) in &self.0 {
            if dimension.chars().count() != 1 {
                return Err(CoreError::InvalidWeights(format!(
                    "dimension key must be a single character, got '{}'",
                    dimension
                )));
            }
            if !weight.is_finite() || *weight < 0.0 {
                return Err(CoreError::InvalidWeights(format!(
                    "weight for '{}' must be a non-negative number, got {}",
                    dimension, weight
                )));
            }
        }
        Ok(())
    }
}

impl Default for WeightTable {
    fn default() -> Self {
        Self::new([("E", 30.0), ("I", 30.0), ("T", 15.0), ("C", 15.0), ("S", 15.0)])
    }
}

impl Serialize for WeightTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (dimension, weight) in &self.0 {
            map.serialize_entry(dimension, weight)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for WeightTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct WeightsVisitor;

        impl<'de> Visitor<'de> for WeightsVisitor {
            type Value = WeightTable;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of dimension to weight")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut table = WeightTable(Vec::new());
                while let Some((dimension, weight)) = map.next_entry::<String, f64>()? {
                    table.set(dimension, weight);
                }
                Ok(table)
            }
        }

        deserializer.deserialize_map(WeightsVisitor)
    }
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Turns a complete verdict set into a [`Report`].
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    weights: WeightTable,
}

impl Aggregator {
    pub fn new(weights: WeightTable) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &WeightTable {
        &self.weights
    }

    /// Aggregate verdicts keyed by criterion id.
    ///
    /// Each weighted dimension reports `mean(score) * weight / 5`, or 0 when
    /// no criterion was scored in it. Criteria whose dimension has no weight
    /// stay in the detail but contribute nothing.
    pub fn aggregate(&self, verdicts: BTreeMap<String, Verdict>) -> Report {
        let mut sums: BTreeMap<&str, (u32, u32)> = BTreeMap::new();

        for (id, verdict) in &verdicts {
            let dimension = dimension_of(id);
            if self.weights.get(dimension).is_none() {
                tracing::warn!(
                    criterion = %id,
                    dimension,
                    "Criterion dimension has no weight; excluded from total"
                );
                continue;
            }
            let entry = sums.entry(dimension).or_insert((0, 0));
            entry.0 += u32::from(verdict.score);
            entry.1 += 1;
        }

        let dim_scores: Vec<DimensionScore> = self
            .weights
            .iter()
            .map(|(dimension, weight)| {
                let weighted_value = match sums.get(dimension) {
                    Some(&(sum, count)) if count > 0 => {
                        (f64::from(sum) / f64::from(count)) * weight / f64::from(MAX_SCORE)
                    }
                    _ => 0.0,
                };
                DimensionScore {
                    dimension: dimension.to_string(),
                    weighted_value,
                }
            })
            .collect();

        let total = round2(dim_scores.iter().map(|d| d.weighted_value).sum());

        tracing::debug!(total, criteria = verdicts.len(), "Aggregated verdicts");

        Report {
            total,
            dim_scores: DimensionScores::new(dim_scores),
            detail: verdicts,
            scored_at: Utc::now(),
        }
    }
}
