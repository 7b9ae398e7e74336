//! Concurrency coordinator for a scoring run.
//!
//! One task per criterion, all polled on the caller's task. A counting
//! semaphore caps the oracle requests in flight; tasks past the cap wait
//! for a free slot. Failures are already sentinel verdicts by the time a
//! task finishes, so the join never branches on errors.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use scorecard_core::{
    segment, Aggregator, EvidenceSelector, LexicalIndex, Report, Rubric, Verdict,
};
use thiserror::Error;
use tokio::sync::Semaphore;

use crate::cache::EvidenceCache;
use crate::config::{ConfigError, RuntimeConfig};
use crate::oracle::ScoringOracle;
use crate::providers::{LlmProvider, ProviderError};
use crate::usage::{LlmUsage, UsageTracker};

/// Errors from setting up or starting a run.
///
/// Individual scoring failures never surface here.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Rubric has no criteria to score")]
    EmptyRubric,
}

/// Outcome of one scoring run.
#[derive(Debug, Clone)]
pub struct ScoringRun {
    pub report: Report,
    pub usage: LlmUsage,
}

/// Scores documents against rubrics.
pub struct ScoringOrchestrator {
    oracle: ScoringOracle,
    selector: EvidenceSelector,
    aggregator: Aggregator,
    concurrency: usize,
}

impl std::fmt::Debug for ScoringOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoringOrchestrator")
            .field("oracle", &self.oracle)
            .field("selector", &self.selector)
            .field("concurrency", &self.concurrency)
            .finish()
    }
}

impl ScoringOrchestrator {
    pub fn builder() -> ScoringOrchestratorBuilder {
        ScoringOrchestratorBuilder::new()
    }

    /// Build an orchestrator talking to the configured chat-completions
    /// endpoint.
    #[cfg(feature = "openai")]
    pub fn from_config(config: RuntimeConfig) -> Result<Self, RuntimeError> {
        let credential = config.credential.clone().ok_or_else(|| {
            RuntimeError::NotConfigured(format!(
                "Scoring API key required: set 'api_key' in config or {} environment variable",
                crate::providers::API_KEY_ENV
            ))
        })?;
        let provider = crate::providers::ChatCompletionsProvider::with_credential(
            credential,
            config.endpoint.clone(),
        );
        Self::builder()
            .provider(Arc::new(provider))
            .config(config)
            .build()
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Segment `text`, index it once and score every criterion of `rubric`.
    pub async fn score_document(
        &self,
        text: &str,
        rubric: &Rubric,
    ) -> Result<ScoringRun, RuntimeError> {
        let index = LexicalIndex::new(segment(text));
        self.score_index(&index, rubric).await
    }

    /// Score every criterion of `rubric` against a prebuilt index.
    pub async fn score_index(
        &self,
        index: &LexicalIndex,
        rubric: &Rubric,
    ) -> Result<ScoringRun, RuntimeError> {
        let criteria = rubric.criteria();
        if criteria.is_empty() {
            return Err(RuntimeError::EmptyRubric);
        }

        let total = criteria.len();
        tracing::info!(
            criteria = total,
            sentences = index.len(),
            concurrency = self.concurrency,
            provider = self.oracle.provider_name(),
            "Scoring run started"
        );

        let gate = Semaphore::new(self.concurrency);
        let cache = EvidenceCache::new(total as u64);
        let tracker = UsageTracker::new();
        let completed = AtomicUsize::new(0);

        let tasks = criteria.iter().map(|(id, criterion)| {
            let (gate, cache, tracker, completed) = (&gate, &cache, &tracker, &completed);
            async move {
                let evidence = cache
                    .get_or_select(index, &self.selector, &criterion.text)
                    .await;

                let outcome = {
                    // The gate is never closed, so acquire cannot fail
                    let _permit = gate.acquire().await.ok();
                    self.oracle.judge(criterion, &evidence).await
                };

                tracker.record(outcome.usage.as_ref(), outcome.verdict.is_degraded());
                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::info!(
                    criterion = %id,
                    score = outcome.verdict.score,
                    status = %outcome.verdict.status,
                    completed = done,
                    total,
                    "Criterion scored"
                );

                (id.clone(), outcome.verdict)
            }
        });

        let verdicts: BTreeMap<String, Verdict> = join_all(tasks).await.into_iter().collect();
        let report = self.aggregator.aggregate(verdicts);
        let usage = tracker.snapshot();

        tracing::info!(
            total = report.total,
            degraded = usage.degraded_calls,
            llm_calls = usage.llm_calls,
            total_tokens = usage.total_tokens,
            "Scoring run finished"
        );

        Ok(ScoringRun { report, usage })
    }
}

/// Builder for [`ScoringOrchestrator`].
pub struct ScoringOrchestratorBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    config: RuntimeConfig,
}

impl ScoringOrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            config: RuntimeConfig::default(),
        }
    }

    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Validate the configuration and build.
    pub fn build(self) -> Result<ScoringOrchestrator, RuntimeError> {
        let provider = self
            .provider
            .ok_or_else(|| RuntimeError::NotConfigured("no LLM provider set".to_string()))?;
        self.config.validate()?;

        Ok(ScoringOrchestrator {
            oracle: ScoringOracle::new(
                provider,
                self.config.completion_config(),
                self.config.persona.clone(),
            ),
            selector: EvidenceSelector::new(
                self.config.evidence_k,
                self.config.evidence_token_budget,
            ),
            aggregator: Aggregator::new(self.config.weights.clone()),
            concurrency: self.config.concurrency,
        })
    }
}

impl Default for ScoringOrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
