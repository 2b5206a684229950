//! Built-in format rules (§4.6 "Format phase").

use crate::agent::verification::VerificationContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueSeverity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct FormatIssue {
    pub rule: String,
    pub severity: IssueSeverity,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct FormatCheckConfig {
    pub min_answer_length: usize,
    pub tool_error_ratio_threshold: f32,
}

impl Default for FormatCheckConfig {
    fn default() -> Self {
        Self { min_answer_length: 1, tool_error_ratio_threshold: 0.5 }
    }
}

/// A custom format rule: returns `None` to pass, or an issue to fail/warn.
pub type FormatRule = Box<dyn Fn(&VerificationContext) -> Option<FormatIssue> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct FormatCheckResult {
    pub issues: Vec<FormatIssue>,
    /// `false` only when at least one issue has [`IssueSeverity::Error`].
    pub passed: bool,
}

impl FormatCheckResult {
    pub fn has_warnings(&self) -> bool {
        self.issues.iter().any(|i| i.severity == IssueSeverity::Warning)
    }
}

fn non_empty_answer(ctx: &VerificationContext, cfg: &FormatCheckConfig) -> Option<FormatIssue> {
    if ctx.answer.trim().chars().count() < cfg.min_answer_length {
        Some(FormatIssue {
            rule: "non_empty_answer".into(),
            severity: IssueSeverity::Error,
            message: "answer is empty or shorter than the configured minimum".into(),
        })
    } else {
        None
    }
}

fn tool_error_ratio(ctx: &VerificationContext, cfg: &FormatCheckConfig) -> Option<FormatIssue> {
    if ctx.tool_calls_made == 0 {
        return None;
    }
    let ratio = ctx.tool_errors as f32 / ctx.tool_calls_made as f32;
    if ratio > cfg.tool_error_ratio_threshold {
        Some(FormatIssue {
            rule: "tool_error_ratio".into(),
            severity: IssueSeverity::Warning,
            message: format!(
                "{}/{} tool calls failed ({:.0}% over the {:.0}% threshold)",
                ctx.tool_errors,
                ctx.tool_calls_made,
                ratio * 100.0,
                cfg.tool_error_ratio_threshold * 100.0
            ),
        })
    } else {
        None
    }
}

fn no_error_only_answer(ctx: &VerificationContext) -> Option<FormatIssue> {
    let trimmed = ctx.answer.trim();
    let looks_like_bare_error = trimmed.len() < 120
        && (trimmed.to_lowercase().starts_with("error")
            || trimmed.to_lowercase().starts_with("i encountered an error")
            || trimmed.to_lowercase().starts_with("failed to"));
    if looks_like_bare_error && ctx.tool_errors > 0 {
        Some(FormatIssue {
            rule: "no_error_only_answer".into(),
            severity: IssueSeverity::Error,
            message: "final answer is just an error report with no substantive content".into(),
        })
    } else {
        None
    }
}

fn task_reference_heuristic(ctx: &VerificationContext) -> Option<FormatIssue> {
    let task_tokens: std::collections::HashSet<String> = ctx
        .task
        .to_lowercase()
        .split_whitespace()
        .filter(|w| w.len() > 3)
        .map(str::to_string)
        .collect();
    if task_tokens.is_empty() {
        return None;
    }
    let answer_lower = ctx.answer.to_lowercase();
    let overlap = task_tokens.iter().filter(|t| answer_lower.contains(t.as_str())).count();
    let overlap_ratio = overlap as f32 / task_tokens.len() as f32;
    if overlap_ratio < 0.1 {
        Some(FormatIssue {
            rule: "task_reference_heuristic".into(),
            severity: IssueSeverity::Warning,
            message: "answer shares little vocabulary with the task description".into(),
        })
    } else {
        None
    }
}

/// Flags a mutating tool whose state snapshot shows no change across the
/// call. Informational only: it never fails or degrades the outcome, it
/// just gets folded into the result for the caller to inspect.
fn state_consistency(ctx: &VerificationContext) -> Vec<FormatIssue> {
    ctx.state_snapshots
        .iter()
        .filter(|s| matches!((&s.before, &s.after), (Some(b), Some(a)) if b == a))
        .map(|s| FormatIssue {
            rule: "state_consistency".into(),
            severity: IssueSeverity::Info,
            message: format!("tool '{}' reported a state snapshot but left it unchanged", s.tool),
        })
        .collect()
}

/// Runs the built-in rules plus any `custom_rules`, in order.
pub fn run_format_check(
    ctx: &VerificationContext,
    cfg: &FormatCheckConfig,
    custom_rules: &[FormatRule],
) -> FormatCheckResult {
    let mut issues = Vec::new();
    issues.extend(non_empty_answer(ctx, cfg));
    issues.extend(tool_error_ratio(ctx, cfg));
    issues.extend(no_error_only_answer(ctx));
    issues.extend(task_reference_heuristic(ctx));
    issues.extend(state_consistency(ctx));
    for rule in custom_rules {
        issues.extend(rule(ctx));
    }

    let passed = !issues.iter().any(|i| i.severity == IssueSeverity::Error);
    FormatCheckResult { issues, passed }
}
