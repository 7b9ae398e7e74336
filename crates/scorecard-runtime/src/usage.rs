//! Token and call accounting for a scoring run.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::providers::TokenUsage;

/// Accumulated LLM usage for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmUsage {
    /// Number of oracle calls made
    pub llm_calls: u32,

    /// Calls that ended in a sentinel verdict
    pub degraded_calls: u32,

    /// Prompt/input tokens
    pub prompt_tokens: u32,

    /// Completion/output tokens
    pub completion_tokens: u32,

    /// Total tokens used
    pub total_tokens: u32,
}

impl LlmUsage {
    /// Record one call.
    pub fn add(&mut self, usage: Option<&TokenUsage>, degraded: bool) {
        self.llm_calls += 1;
        if degraded {
            self.degraded_calls += 1;
        }
        if let Some(usage) = usage {
            self.prompt_tokens += usage.prompt_tokens;
            self.completion_tokens += usage.completion_tokens;
            self.total_tokens += usage.total();
        }
    }
}

/// Shared usage accumulator for concurrent scoring tasks.
#[derive(Debug, Default)]
pub struct UsageTracker {
    usage: RwLock<LlmUsage>,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, usage: Option<&TokenUsage>, degraded: bool) {
        self.usage.write().add(usage, degraded);
    }

    /// Copy of the current totals.
    pub fn snapshot(&self) -> LlmUsage {
        self.usage.read().clone()
    }
}
