//! Chat completion request/response types
//!
//! Models the OpenAI-compatible chat-completions wire shape, which is
//! all the pipeline needs: one user prompt in, one assistant text out.

use serde::{Deserialize, Serialize};

/// A chat completion request - everything needed for one call
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ChatRequest {
    /// Single-user-message request, the shape every pipeline stage uses.
    pub fn user(prompt: impl Into<String>, temperature: f32, max_tokens: u32) -> Self {
        Self {
            messages: vec![Message::user(prompt)],
            temperature,
            max_tokens,
        }
    }
}

/// A message in the conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Response from a completion request
#[derive(Debug, Clone)]
pub struct ChatResponse {
    /// Assistant text, trimmed.
    pub content: String,
}

impl ChatResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_request_shape() {
        let req = ChatRequest::user("classify this", 0.1, 200);
        assert_eq!(req.messages.len(), 1);
        assert_eq!(req.messages[0].role, Role::User);
        assert_eq!(req.messages[0].content, "classify this");
        assert_eq!(req.max_tokens, 200);
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let msg = Message::user("hi");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "user");
    }
}
