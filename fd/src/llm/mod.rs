//! LLM client module
//!
//! Chat completion requests and the defensive JSON extraction every
//! pipeline stage applies to model output.

mod client;
mod error;
mod groq;
mod types;

pub use client::ChatClient;
pub use error::LlmError;
pub use groq::GroqClient;
pub use types::{ChatRequest, ChatResponse, Message, Role};

#[cfg(test)]
pub use client::mock::MockChatClient;

/// Extract the first balanced-looking JSON object from model text.
///
/// Models wrap JSON in markdown fences or prose; the contract is to take
/// the substring between the first `{` and the last `}` and parse that.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&text[start..=end])
}
