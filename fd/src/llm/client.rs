//! ChatClient trait definition

use async_trait::async_trait;

use super::{ChatRequest, ChatResponse, LlmError};

/// Stateless chat completion client - each call is independent.
///
/// The pipeline never holds a conversation: every classification or
/// parse is a fresh single-prompt request, so implementations need no
/// session state.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Send one completion request and wait for the assistant text.
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, LlmError>;
}
