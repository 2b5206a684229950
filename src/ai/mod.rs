pub mod provider;
pub mod types;

pub use provider::{LLMProvider, ProviderFactory, StreamResponse};
pub use types::{CompletionRequest, CompletionResponse, Message, MessageRole, StreamChunk};
