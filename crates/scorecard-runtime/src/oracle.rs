//! Scoring oracle client.
//!
//! Turns a criterion and its evidence into exactly one [`Verdict`]. Every
//! provider failure is absorbed here and becomes a sentinel verdict whose
//! status names the failure category; nothing propagates to the caller.

use std::sync::Arc;

use scorecard_core::{parse_verdict, Criterion, EvidenceBundle, Verdict, VerdictStatus};

use crate::prompts::scoring_messages;
use crate::providers::{CompletionConfig, LlmProvider, ProviderError, TokenUsage};

/// Result of one oracle call.
#[derive(Debug, Clone)]
pub struct OracleOutcome {
    pub verdict: Verdict,

    /// Token usage, when the endpoint answered and reported it
    pub usage: Option<TokenUsage>,
}

/// Sends criteria to an LLM judge and interprets its replies.
#[derive(Clone)]
pub struct ScoringOracle {
    provider: Arc<dyn LlmProvider>,
    completion: CompletionConfig,
    persona: String,
}

impl std::fmt::Debug for ScoringOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoringOracle")
            .field("provider", &self.provider.name())
            .field("completion", &self.completion)
            .finish()
    }
}

impl ScoringOracle {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        completion: CompletionConfig,
        persona: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            completion,
            persona: persona.into(),
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Judge one criterion. Never fails.
    pub async fn judge(&self, criterion: &Criterion, evidence: &EvidenceBundle) -> OracleOutcome {
        let messages = scoring_messages(&self.persona, criterion, evidence);

        tracing::debug!(
            criterion = %criterion.id,
            evidence_sentences = evidence.len(),
            estimated_prompt_tokens = messages
                .iter()
                .map(|m| self.provider.estimate_tokens(&m.content))
                .sum::<u32>(),
            "Sending criterion to oracle"
        );

        let timeout = self.completion.timeout;
        let result =
            match tokio::time::timeout(timeout, self.provider.complete(messages, &self.completion))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(timeout)),
            };

        match result {
            Ok(response) => {
                tracing::debug!(criterion = %criterion.id, reply = %response.content, "Oracle replied");
                let verdict = parse_verdict(&response.content);
                if verdict.is_degraded() {
                    tracing::warn!(
                        criterion = %criterion.id,
                        status = %verdict.status,
                        "Oracle reply could not be interpreted"
                    );
                }
                OracleOutcome {
                    verdict,
                    usage: Some(response.usage),
                }
            }
            Err(error) => {
                let verdict = verdict_for_error(&error);
                tracing::warn!(
                    criterion = %criterion.id,
                    status = %verdict.status,
                    error = %error,
                    "Oracle call failed; using sentinel verdict"
                );
                OracleOutcome {
                    verdict,
                    usage: None,
                }
            }
        }
    }
}

/// Sentinel verdict for a provider failure.
pub fn verdict_for_error(error: &ProviderError) -> Verdict {
    match error {
        ProviderError::Timeout(after) => Verdict::sentinel(
            VerdictStatus::Timeout,
            format!(
                "oracle request timed out after {}",
                humantime::format_duration(*after)
            ),
        ),
        ProviderError::ApiError { status, message } => Verdict::sentinel(
            VerdictStatus::ApiError,
            format!("oracle API call failed with status {}: {}", status, message),
        ),
        ProviderError::RateLimited { .. } => Verdict::sentinel(
            VerdictStatus::ApiError,
            "oracle API call failed with status 429: rate limited",
        ),
        ProviderError::AuthError(status) => Verdict::sentinel(
            VerdictStatus::ApiError,
            format!(
                "oracle API call failed with status {}: authentication rejected",
                status
            ),
        ),
        ProviderError::ParseError(detail) => Verdict::sentinel(
            VerdictStatus::MalformedResponse,
            format!("malformed oracle response: {}", detail),
        ),
        ProviderError::HttpError(detail) | ProviderError::NotConfigured(detail) => {
            Verdict::sentinel(
                VerdictStatus::TransportError,
                format!("oracle request failed: {}", detail),
            )
        }
    }
}
