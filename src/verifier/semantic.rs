//! LLM-as-judge semantic scoring (§4.6 "Semantic phase").

use std::sync::Arc;

use regex::Regex;
use serde::Deserialize;

use crate::agent::verification::VerificationContext;
use crate::ai::{provider::LLMProvider, types::{CompletionRequest, Message}};

#[derive(Debug, Clone)]
pub struct SemanticCheckConfig {
    pub model: String,
    pub max_tool_results_in_prompt: usize,
}

#[derive(Debug, Clone)]
pub struct SemanticCheckResult {
    pub score: u8,
    pub passed: bool,
    pub reasoning: String,
    pub issues: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct JudgeResponse {
    score: f64,
    #[serde(default)]
    passed: Option<bool>,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    issues: Vec<String>,
}

fn build_judge_prompt(ctx: &VerificationContext, tool_result_summary: &str, state_diff: &str) -> String {
    format!(
        "You are judging whether an AI assistant's answer actually completes the \
         task it was given. Respond with a single JSON object only, of the shape \
         {{\"score\": 0-100, \"passed\": bool, \"reasoning\": string, \"issues\": [string]}}.\n\n\
         Task:\n{}\n\nFinal answer:\n{}\n\nTool result summary:\n{}\n\nState changes:\n{}\n",
        ctx.task, ctx.answer, tool_result_summary, state_diff
    )
}

fn parse_judge_response(raw: &str) -> Result<JudgeResponse, String> {
    let stripped = raw.trim();
    let without_fences = if stripped.starts_with("```") {
        stripped
            .trim_start_matches("```json")
            .trim_start_matches("```")
            .trim_end_matches("```")
            .trim()
    } else {
        stripped
    };

    if let Ok(parsed) = serde_json::from_str::<JudgeResponse>(without_fences) {
        return Ok(parsed);
    }

    // Fallback: pull the first standalone number out as the score.
    let re = Regex::new(r"(\d{1,3})").map_err(|e| e.to_string())?;
    let score = re
        .captures(without_fences)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .ok_or_else(|| "could not extract a numeric score from judge response".to_string())?;

    Ok(JudgeResponse {
        score,
        passed: None,
        reasoning: without_fences.to_string(),
        issues: Vec::new(),
    })
}

/// Runs the semantic check. Any provider failure is mapped by the caller
/// into a synthetic failing result (§4.6 "Failure semantics") — this
/// function only returns `Err` for genuine provider/parse failures.
pub async fn run_semantic_check(
    provider: &Arc<dyn LLMProvider>,
    ctx: &VerificationContext<'_>,
    cfg: &SemanticCheckConfig,
) -> Result<SemanticCheckResult, String> {
    let tool_result_summary = if ctx.tool_calls_made == 0 {
        "(no tool calls made)".to_string()
    } else {
        format!(
            "{} tool call(s) made, {} failed",
            ctx.tool_calls_made.min(cfg.max_tool_results_in_prompt),
            ctx.tool_errors
        )
    };

    let state_diff = if ctx.state_snapshots.is_empty() {
        "(no state snapshots available)".to_string()
    } else {
        ctx.state_snapshots
            .iter()
            .map(|s| {
                let changed = !matches!((&s.before, &s.after), (Some(b), Some(a)) if b == a);
                format!("{}: {}", s.tool, if changed { "changed" } else { "unchanged" })
            })
            .collect::<Vec<_>>()
            .join("; ")
    };

    let prompt = build_judge_prompt(ctx, &tool_result_summary, &state_diff);

    let request = CompletionRequest::new(
        cfg.model.clone(),
        vec![
            Message::system("You are a strict, concise evaluator. Output JSON only."),
            Message::user(prompt),
        ],
    )
    .with_temperature(0.0);

    let response = provider.complete(request).await?;
    let judge = parse_judge_response(&response.content)?;

    let score = judge.score.clamp(0.0, 100.0).round() as u8;
    let passed = judge.passed.unwrap_or(score >= 71);

    Ok(SemanticCheckResult {
        score,
        passed,
        reasoning: judge.reasoning,
        issues: judge.issues,
    })
}
