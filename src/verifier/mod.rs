//! Turn verifier: a format-rule pass plus an optional LLM-as-judge
//! semantic pass, combined into the [`TurnVerifier`] seam the agent
//! loop calls after producing a final answer (§4.6).

pub mod format;
pub mod semantic;

use std::sync::Arc;

use async_trait::async_trait;

use crate::agent::verification::{TurnVerifier, VerificationContext, VerificationOutcome, VerificationVerdict};
use crate::ai::provider::LLMProvider;
use format::{FormatCheckConfig, FormatRule, run_format_check};
use semantic::{SemanticCheckConfig, run_semantic_check};

/// Combines the format and (optional) semantic phases into the outcome
/// the agent loop consumes.
pub struct Verifier {
    format_config: FormatCheckConfig,
    custom_format_rules: Vec<FormatRule>,
    semantic_config: Option<SemanticCheckConfig>,
    provider: Option<Arc<dyn LLMProvider>>,
}

impl Verifier {
    pub fn new(format_config: FormatCheckConfig) -> Self {
        Self {
            format_config,
            custom_format_rules: Vec::new(),
            semantic_config: None,
            provider: None,
        }
    }

    pub fn with_custom_rule(mut self, rule: FormatRule) -> Self {
        self.custom_format_rules.push(rule);
        self
    }

    pub fn with_semantic_check(mut self, provider: Arc<dyn LLMProvider>, config: SemanticCheckConfig) -> Self {
        self.semantic_config = Some(config);
        self.provider = Some(provider);
        self
    }
}

impl Default for Verifier {
    fn default() -> Self {
        Self::new(FormatCheckConfig::default())
    }
}

#[async_trait]
impl TurnVerifier for Verifier {
    async fn verify(&self, ctx: VerificationContext<'_>) -> VerificationOutcome {
        let format_result = run_format_check(&ctx, &self.format_config, &self.custom_format_rules);

        if !format_result.passed {
            let reasoning = format_result
                .issues
                .iter()
                .map(|i| i.message.clone())
                .collect::<Vec<_>>()
                .join("; ");
            return VerificationOutcome {
                verdict: VerificationVerdict::Failure,
                confidence: 0.2,
                reasoning: if reasoning.is_empty() { "format check failed".to_string() } else { reasoning },
            };
        }

        if let (Some(provider), Some(semantic_config)) = (&self.provider, &self.semantic_config) {
            return match run_semantic_check(provider, &ctx, semantic_config).await {
                Ok(semantic) => {
                    let verdict = if semantic.score >= 71 {
                        VerificationVerdict::Success
                    } else if semantic.score >= 31 {
                        VerificationVerdict::Partial
                    } else {
                        VerificationVerdict::Failure
                    };
                    VerificationOutcome {
                        verdict,
                        confidence: semantic.score as f32 / 100.0,
                        reasoning: semantic.reasoning,
                    }
                }
                Err(err) => VerificationOutcome {
                    verdict: VerificationVerdict::Failure,
                    confidence: 0.2,
                    reasoning: format!("semantic check unavailable: {err}"),
                },
            };
        }

        if format_result.has_warnings() {
            let reasoning = format_result
                .issues
                .iter()
                .map(|i| i.message.clone())
                .collect::<Vec<_>>()
                .join("; ");
            VerificationOutcome { verdict: VerificationVerdict::Partial, confidence: 0.7, reasoning }
        } else {
            VerificationOutcome {
                verdict: VerificationVerdict::Success,
                confidence: 0.7,
                reasoning: "format check passed with no issues".to_string(),
            }
        }
    }
}
