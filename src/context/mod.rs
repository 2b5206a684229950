//! Conversation context: the per-session message log, its token budget,
//! and automatic compaction when that budget is exceeded.

pub mod compaction;
pub mod message;

pub use compaction::{CompactionOutcome, CompactionStrategy, StrategyKind, Summarizer};
pub use message::{ContentBlock, Message, MessageContent, MessageRole, ToolCallRecord};

/// Fraction of `max_tokens` at which `add_message` triggers compaction.
pub const DEFAULT_COMPACTION_THRESHOLD: f64 = 0.8;

/// The message log a session's agent loop reads from and appends to.
///
/// The system prompt is tracked separately from the conversation: it is
/// never subject to compaction and always appears first in
/// [`ConversationContext::get_messages`].
pub struct ConversationContext {
    system_prompt: Option<Message>,
    conversation: Vec<Message>,
    max_tokens: usize,
    compaction_threshold: f64,
    strategy: CompactionStrategy,
}

impl ConversationContext {
    pub fn new(max_tokens: usize, strategy: CompactionStrategy) -> Self {
        Self {
            system_prompt: None,
            conversation: Vec::new(),
            max_tokens,
            compaction_threshold: DEFAULT_COMPACTION_THRESHOLD,
            strategy,
        }
    }

    pub fn with_compaction_threshold(mut self, threshold: f64) -> Self {
        self.compaction_threshold = threshold;
        self
    }

    pub fn set_system_prompt(&mut self, content: impl Into<String>) {
        self.system_prompt = Some(Message::system(content));
    }

    /// Appends a message and runs a compaction pass if the running
    /// estimate has crossed `max_tokens * compaction_threshold`. Returns
    /// the compaction outcome when a pass ran.
    pub async fn add_message(&mut self, message: Message) -> Option<CompactionOutcome> {
        self.conversation.push(message);

        let trigger = (self.max_tokens as f64 * self.compaction_threshold) as usize;
        if self.get_token_estimate() <= trigger {
            return None;
        }

        Some(self.compact().await)
    }

    /// Runs one compaction pass unconditionally and applies its result.
    pub async fn compact(&mut self) -> CompactionOutcome {
        let conversation = std::mem::take(&mut self.conversation);
        let outcome = compaction::run_compaction(conversation, self.max_tokens, &self.strategy).await;
        self.conversation = outcome.messages.clone();
        outcome
    }

    /// Returns the system prompt (if set) followed by the conversation,
    /// in order — the exact sequence an agent loop sends to a provider.
    pub fn get_messages(&self) -> Vec<Message> {
        let mut out = Vec::with_capacity(self.conversation.len() + 1);
        if let Some(sys) = &self.system_prompt {
            out.push(sys.clone());
        }
        out.extend(self.conversation.iter().cloned());
        out
    }

    pub fn get_token_estimate(&self) -> usize {
        let sys = self.system_prompt.as_ref().map_or(0, Message::token_estimate);
        sys + self.conversation.iter().map(Message::token_estimate).sum::<usize>()
    }

    pub fn clear(&mut self) {
        self.conversation.clear();
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }
}
