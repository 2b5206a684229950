//! Compaction strategies for shrinking an over-budget `ConversationContext`.
//!
//! Three strategies are built in (`drop_oldest`, `summarize`, `sliding`),
//! each operating over *groups* rather than raw messages: a tool-call
//! assistant message and its contiguous following tool-result messages
//! always move together, so compaction never splits a call from its
//! result (invariant 3).

use std::collections::HashSet;
use std::ops::Range;
use std::sync::Arc;

use async_trait::async_trait;

use super::message::{Message, MessageRole};

/// Injected callback that turns a run of messages into a short summary.
///
/// When a strategy needs one and none is configured, the manager falls
/// back to `drop_oldest` for that pass.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, messages: &[Message]) -> Result<String, String>;
}

/// Which built-in algorithm a [`CompactionStrategy`] runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    DropOldest,
    Summarize,
    Sliding,
}

/// A named, parameterized compaction strategy.
#[derive(Clone)]
pub struct CompactionStrategy {
    pub kind: StrategyKind,
    /// Fraction of `maxTokens` to shrink down to. Default 0.6.
    pub compaction_target: f64,
    /// Fraction of messages kept verbatim by `summarize`. Default 0.3.
    pub keep_ratio: f64,
    /// Minimum trailing tool-call groups preserved. Default 3.
    pub preserve_recent_tool_pairs: usize,
    /// Keep the first user message ("task description") pinned.
    pub preserve_task_description: bool,
    /// Roles whose messages are always pinned, regardless of position.
    pub pinned_roles: Option<HashSet<MessageRole>>,
    pub summarizer: Option<Arc<dyn Summarizer>>,
}

impl std::fmt::Debug for CompactionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompactionStrategy")
            .field("kind", &self.kind)
            .field("compaction_target", &self.compaction_target)
            .field("keep_ratio", &self.keep_ratio)
            .field("preserve_recent_tool_pairs", &self.preserve_recent_tool_pairs)
            .field("preserve_task_description", &self.preserve_task_description)
            .finish_non_exhaustive()
    }
}

impl Default for CompactionStrategy {
    fn default() -> Self {
        Self {
            kind: StrategyKind::DropOldest,
            compaction_target: 0.6,
            keep_ratio: 0.3,
            preserve_recent_tool_pairs: 3,
            preserve_task_description: true,
            pinned_roles: None,
            summarizer: None,
        }
    }
}

impl CompactionStrategy {
    pub fn drop_oldest() -> Self {
        Self {
            kind: StrategyKind::DropOldest,
            ..Default::default()
        }
    }

    pub fn summarize(summarizer: Arc<dyn Summarizer>) -> Self {
        Self {
            kind: StrategyKind::Summarize,
            summarizer: Some(summarizer),
            ..Default::default()
        }
    }

    pub fn sliding(summarizer: Arc<dyn Summarizer>) -> Self {
        Self {
            kind: StrategyKind::Sliding,
            summarizer: Some(summarizer),
            ..Default::default()
        }
    }
}

/// Contiguous index ranges: a plain message is a group of one; a
/// tool-call assistant message plus its immediately following tool-result
/// messages is a single group.
fn message_groups(messages: &[Message]) -> Vec<Range<usize>> {
    let mut groups = Vec::new();
    let mut i = 0;
    while i < messages.len() {
        let start = i;
        if messages[i].is_tool_call() {
            let mut j = i + 1;
            while j < messages.len() && messages[j].is_tool_result() {
                j += 1;
            }
            groups.push(start..j);
            i = j;
        } else {
            groups.push(start..start + 1);
            i += 1;
        }
    }
    groups
}

fn group_tokens(messages: &[Message], group: &Range<usize>) -> usize {
    messages[group.clone()].iter().map(Message::token_estimate).sum()
}

fn is_tool_call_group(messages: &[Message], group: &Range<usize>) -> bool {
    messages[group.start].is_tool_call()
}

/// Indices (by group position in `groups`) that must never be dropped.
fn pinned_group_indices(
    messages: &[Message],
    groups: &[Range<usize>],
    strategy: &CompactionStrategy,
) -> HashSet<usize> {
    let mut pinned = HashSet::new();

    // The last message is never dropped.
    if !groups.is_empty() {
        pinned.insert(groups.len() - 1);
    }

    // The most recent N tool-call groups are always preserved. If there
    // are fewer than N tool-call groups present, all of them are pinned.
    let mut recent_tool_groups = 0;
    for (idx, group) in groups.iter().enumerate().rev() {
        if recent_tool_groups >= strategy.preserve_recent_tool_pairs {
            break;
        }
        if is_tool_call_group(messages, group) {
            pinned.insert(idx);
            recent_tool_groups += 1;
        }
    }

    if strategy.preserve_task_description {
        if let Some(idx) = groups
            .iter()
            .position(|g| messages[g.start].role == MessageRole::User)
        {
            pinned.insert(idx);
        }
    }

    if let Some(roles) = &strategy.pinned_roles {
        for (idx, group) in groups.iter().enumerate() {
            if group.clone().any(|i| roles.contains(&messages[i].role)) {
                pinned.insert(idx);
            }
        }
    }

    pinned
}

/// Result of running a compaction pass.
pub struct CompactionOutcome {
    pub messages: Vec<Message>,
    /// True if at least one message was actually dropped/summarized.
    pub changed: bool,
}

/// Drop groups from oldest to newest (skipping pinned ones) until the
/// estimate falls at or under `target_tokens`, or no droppable groups
/// remain. Always makes progress: drops at least one group per call if
/// any non-pinned group exists.
fn drop_oldest_pass(messages: Vec<Message>, target_tokens: usize, strategy: &CompactionStrategy) -> CompactionOutcome {
    let groups = message_groups(&messages);
    let pinned = pinned_group_indices(&messages, &groups, strategy);

    let mut total: usize = messages.iter().map(Message::token_estimate).sum();
    let mut keep = vec![true; groups.len()];
    let mut changed = false;

    for (idx, group) in groups.iter().enumerate() {
        if total <= target_tokens {
            break;
        }
        if pinned.contains(&idx) {
            continue;
        }
        total -= group_tokens(&messages, group);
        keep[idx] = false;
        changed = true;
    }

    let mut result = Vec::with_capacity(messages.len());
    for (idx, group) in groups.iter().enumerate() {
        if keep[idx] {
            result.extend(messages[group.clone()].iter().cloned());
        }
    }

    CompactionOutcome {
        messages: result,
        changed,
    }
}

async fn summarize_pass(
    messages: Vec<Message>,
    strategy: &CompactionStrategy,
) -> CompactionOutcome {
    let groups = message_groups(&messages);
    if groups.len() <= 1 {
        return CompactionOutcome {
            messages,
            changed: false,
        };
    }

    let split_count = ((groups.len() as f64) * (1.0 - strategy.keep_ratio)).round() as usize;
    // Snap the split to the nearest group boundary (it already is one,
    // since we split in units of groups) and keep at least one group in
    // the verbatim suffix.
    let split = split_count.min(groups.len() - 1);

    let prefix_end = groups.get(split.saturating_sub(1)).map(|g| g.end).unwrap_or(0);
    let prefix: Vec<Message> = messages[..prefix_end].to_vec();
    let suffix: Vec<Message> = messages[prefix_end..].to_vec();

    if prefix.is_empty() {
        return CompactionOutcome {
            messages,
            changed: false,
        };
    }

    let task_description = if strategy.preserve_task_description {
        prefix
            .iter()
            .find(|m| m.role == MessageRole::User)
            .cloned()
    } else {
        None
    };

    let summary_text = match &strategy.summarizer {
        Some(s) => s
            .summarize(&prefix)
            .await
            .unwrap_or_else(|_| format!("[{} messages compacted]", prefix.len())),
        None => {
            // No summarizer configured: caller should have fallen back to
            // drop_oldest before reaching here.
            return drop_oldest_pass(
                [prefix, suffix].concat(),
                0, // force at least one drop
                strategy,
            );
        }
    };

    let summary_msg = Message::system(format!("[Conversation summary] {summary_text}"));

    let mut result = Vec::new();
    if let Some(task_msg) = task_description {
        result.push(task_msg);
    }
    result.push(summary_msg);
    result.extend(suffix);

    CompactionOutcome {
        messages: result,
        changed: true,
    }
}

async fn sliding_pass(
    messages: Vec<Message>,
    target_tokens: usize,
    strategy: &CompactionStrategy,
) -> CompactionOutcome {
    let groups = message_groups(&messages);
    if groups.is_empty() {
        return CompactionOutcome {
            messages,
            changed: false,
        };
    }

    let mut window_tokens = 0usize;
    let mut tool_groups_in_window = 0usize;
    let mut window_start_group = groups.len();

    for (idx, group) in groups.iter().enumerate().rev() {
        let reached_target = window_tokens >= target_tokens;
        let reached_tool_pairs = tool_groups_in_window >= strategy.preserve_recent_tool_pairs;
        if reached_target && reached_tool_pairs {
            break;
        }
        window_tokens += group_tokens(&messages, group);
        if is_tool_call_group(&messages, group) {
            tool_groups_in_window += 1;
        }
        window_start_group = idx;
    }

    if window_start_group == 0 {
        // Everything is inside the window; nothing to summarize.
        return CompactionOutcome {
            messages,
            changed: false,
        };
    }

    let window_start = groups[window_start_group].start;
    let prefix: Vec<Message> = messages[..window_start].to_vec();
    let suffix: Vec<Message> = messages[window_start..].to_vec();

    let task_description = if strategy.preserve_task_description {
        prefix
            .iter()
            .find(|m| m.role == MessageRole::User)
            .cloned()
    } else {
        None
    };

    let summary_text = match &strategy.summarizer {
        Some(s) => s
            .summarize(&prefix)
            .await
            .unwrap_or_else(|_| format!("[{} messages compacted]", prefix.len())),
        None => {
            return drop_oldest_pass([prefix, suffix].concat(), 0, strategy);
        }
    };

    let summary_msg = Message::system(format!("[Conversation summary] {summary_text}"));

    let mut result = Vec::new();
    if let Some(task_msg) = task_description {
        result.push(task_msg);
    }
    result.push(summary_msg);
    result.extend(suffix);

    CompactionOutcome {
        messages: result,
        changed: true,
    }
}

/// Run one compaction pass over `messages` (the conversation, excluding
/// any separately-tracked system prompt) against `max_tokens`.
pub async fn run_compaction(
    messages: Vec<Message>,
    max_tokens: usize,
    strategy: &CompactionStrategy,
) -> CompactionOutcome {
    let target_tokens = (max_tokens as f64 * strategy.compaction_target) as usize;

    let needs_summarizer = matches!(strategy.kind, StrategyKind::Summarize | StrategyKind::Sliding);
    if needs_summarizer && strategy.summarizer.is_none() {
        return drop_oldest_pass(messages, target_tokens, strategy);
    }

    match strategy.kind {
        StrategyKind::DropOldest => drop_oldest_pass(messages, target_tokens, strategy),
        StrategyKind::Summarize => summarize_pass(messages, strategy).await,
        StrategyKind::Sliding => sliding_pass(messages, target_tokens, strategy).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSummarizer(&'static str);

    #[async_trait]
    impl Summarizer for FixedSummarizer {
        async fn summarize(&self, _messages: &[Message]) -> Result<String, String> {
            Ok(self.0.to_string())
        }
    }

    fn pair(n: usize) -> Vec<Message> {
        let mut out = Vec::new();
        for i in 0..n {
            out.push(Message::user(format!("user message {i} {}", "x".repeat(100))));
            out.push(Message::assistant(format!("assistant reply {i} {}", "x".repeat(100))));
        }
        out
    }

    #[tokio::test]
    async fn drop_oldest_removes_from_front() {
        let messages = pair(20);
        let strategy = CompactionStrategy::drop_oldest();
        let outcome = run_compaction(messages.clone(), 1000, &strategy).await;
        assert!(outcome.changed);
        assert!(outcome.messages.len() < messages.len());
        // Last message is always preserved.
        assert_eq!(outcome.messages.last(), messages.last());
    }

    #[tokio::test]
    async fn drop_oldest_never_splits_tool_pair() {
        let mut messages = vec![Message::user("task: do the thing")];
        for i in 0..10 {
            messages.push(Message::assistant_with_tool_calls(
                "",
                vec![super::super::message::ToolCallRecord {
                    id: format!("call_{i}"),
                    name: "noop".into(),
                    arguments: serde_json::json!({}),
                }],
            ));
            messages.push(Message::tool_result(format!("call_{i}"), "ok ".repeat(50)));
        }
        let strategy = CompactionStrategy::drop_oldest();
        let outcome = run_compaction(messages, 400, &strategy).await;

        // Every remaining tool-call message must be immediately followed
        // by its tool-result message.
        let result = outcome.messages;
        for (i, m) in result.iter().enumerate() {
            if m.is_tool_call() {
                assert!(result.get(i + 1).is_some_and(Message::is_tool_result));
            }
        }
    }

    #[tokio::test]
    async fn summarize_preserves_task_description_and_suffix() {
        let mut messages = vec![Message::user("task: summarize README")];
        messages.extend(pair(20));
        let strategy = CompactionStrategy::summarize(Arc::new(FixedSummarizer("summary text")));
        let outcome = run_compaction(messages, 1000, &strategy).await;

        assert!(outcome.changed);
        assert_eq!(outcome.messages[0].role, MessageRole::User);
        assert!(
            outcome
                .messages
                .iter()
                .any(|m| m.content.as_text().contains("[Conversation summary]"))
        );
    }

    #[tokio::test]
    async fn sliding_preserves_recent_tool_pairs() {
        let mut messages = vec![Message::user("task: do work")];
        for i in 0..10 {
            messages.push(Message::assistant_with_tool_calls(
                "",
                vec![super::super::message::ToolCallRecord {
                    id: format!("call_{i}"),
                    name: "noop".into(),
                    arguments: serde_json::json!({}),
                }],
            ));
            messages.push(Message::tool_result(format!("call_{i}"), "ok ".repeat(20)));
        }
        let mut strategy = CompactionStrategy::sliding(Arc::new(FixedSummarizer("s")));
        strategy.preserve_recent_tool_pairs = 3;
        let outcome = run_compaction(messages, 200, &strategy).await;

        let tool_pairs_present = outcome
            .messages
            .iter()
            .filter(|m| m.is_tool_call())
            .count();
        assert!(tool_pairs_present >= 3);
    }

    #[tokio::test]
    async fn missing_summarizer_falls_back_to_drop_oldest() {
        let messages = pair(20);
        let mut strategy = CompactionStrategy::default();
        strategy.kind = StrategyKind::Summarize;
        strategy.summarizer = None;
        let outcome = run_compaction(messages, 1000, &strategy).await;
        assert!(outcome.changed);
        assert!(
            !outcome
                .messages
                .iter()
                .any(|m| m.content.as_text().contains("[Conversation summary]"))
        );
    }
}
