//! Conversation message data model.
//!
//! Richer than the flat `{role, content}` wire format (`ai::types::Message`)
//! the provider layer speaks: tool calls, tool results, and an approximate
//! per-message token estimate live here, and get flattened to the wire
//! format only at the point a request is sent.

use serde::{Deserialize, Serialize};

/// Role of a message in a conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

/// A single tool invocation extracted from an assistant turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallRecord {
    /// Stable id the provider assigned to this call.
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// One block of a message's content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    Image { reference: String },
    ToolCall(ToolCallRecord),
    ToolResult { tool_call_id: String, content: String },
}

impl ContentBlock {
    fn char_len(&self) -> usize {
        match self {
            ContentBlock::Text { text } => text.len(),
            ContentBlock::Image { reference } => reference.len(),
            ContentBlock::ToolCall(call) => {
                call.name.len() + call.arguments.to_string().len()
            }
            ContentBlock::ToolResult { content, .. } => content.len(),
        }
    }
}

/// A message's content payload: either plain text or an ordered sequence
/// of content blocks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl MessageContent {
    fn char_len(&self) -> usize {
        match self {
            MessageContent::Text(t) => t.len(),
            MessageContent::Blocks(blocks) => blocks.iter().map(ContentBlock::char_len).sum(),
        }
    }

    /// Flatten to a plain string, concatenating text blocks and summarizing
    /// non-text blocks, for engines that only accept a flat string.
    pub fn as_text(&self) -> String {
        match self {
            MessageContent::Text(t) => t.clone(),
            MessageContent::Blocks(blocks) => blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::Text { text } => Some(text.clone()),
                    ContentBlock::ToolResult { content, .. } => Some(content.clone()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// A message in a `ConversationContext`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: MessageRole,
    pub content: MessageContent,
    /// Tool calls the model made in this (assistant) turn.
    #[serde(default)]
    pub tool_calls: Vec<ToolCallRecord>,
    /// Links a `role: tool` message back to its originating call.
    #[serde(default)]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: MessageContent::Text(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: MessageContent::Text(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: MessageContent::Text(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn assistant_with_tool_calls(
        content: impl Into<String>,
        tool_calls: Vec<ToolCallRecord>,
    ) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: MessageContent::Text(content.into()),
            tool_calls,
            tool_call_id: None,
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Tool,
            content: MessageContent::Text(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    /// True if this message carries one or more tool calls that will be
    /// followed by tool-result messages.
    pub fn is_tool_call(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    pub fn is_tool_result(&self) -> bool {
        self.role == MessageRole::Tool && self.tool_call_id.is_some()
    }

    /// Approximate token estimate: `ceil(chars/4)` over every text span,
    /// serialized tool input, and tool output, plus a small per-message
    /// structural overhead.
    pub fn token_estimate(&self) -> usize {
        let mut chars = self.content.char_len();
        for call in &self.tool_calls {
            chars += call.name.len() + call.arguments.to_string().len();
        }
        chars.div_ceil(4) + 4
    }
}
