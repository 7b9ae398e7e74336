//! Rubric parsing and validation.
//!
//! A rubric is an ordered list of dimensions, each holding scorable criteria.
//! This module handles parsing YAML/JSON rubrics and validating them.

mod parser;

pub use parser::{
    dimension_of, Criterion, Dimension, Rubric, RubricError, ScoringAnchor, ScoringAnchors,
};
