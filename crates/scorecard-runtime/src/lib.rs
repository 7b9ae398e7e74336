//! # scorecard-runtime
//!
//! Concurrent, LLM-judged scoring for Scorecard.
//!
//! `scorecard-core` decides which evidence each criterion sees and how
//! verdicts roll up into a report. This crate owns the part that talks to
//! the scoring oracle:
//! - [`providers`]: the [`LlmProvider`] seam and an OpenAI-compatible client
//! - [`oracle`]: prompts a criterion and always returns one verdict
//! - [`orchestrator`]: runs every criterion under a concurrency ceiling
//!
//! ## Example
//!
//! ```rust,ignore
//! use scorecard_core::Rubric;
//! use scorecard_runtime::{RuntimeConfig, ScoringOrchestrator};
//!
//! let config = RuntimeConfig::from_file("scorecard.yaml")?.apply_env()?;
//! let orchestrator = ScoringOrchestrator::from_config(config)?;
//!
//! let rubric = Rubric::from_file("rubric.json")?;
//! let run = orchestrator.score_document(&plan_text, &rubric).await?;
//! println!("total: {}", run.report.total);
//! ```

pub mod cache;
pub mod config;
pub mod oracle;
pub mod orchestrator;
pub mod prompts;
pub mod providers;
pub mod usage;

pub use cache::EvidenceCache;
pub use config::{ConfigError, RuntimeConfig};
pub use oracle::{verdict_for_error, OracleOutcome, ScoringOracle};
pub use orchestrator::{RuntimeError, ScoringOrchestrator, ScoringOrchestratorBuilder, ScoringRun};
pub use providers::{
    ApiCredential, ChatMessage, CompletionConfig, CompletionResponse, CredentialSource,
    LlmProvider, ProviderError, TokenUsage,
};
pub use usage::{LlmUsage, UsageTracker};

#[cfg(feature = "openai")]
pub use providers::ChatCompletionsProvider;
