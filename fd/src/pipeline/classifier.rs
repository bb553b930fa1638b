//! Message intent classification
//!
//! A sender with a pending confirmation gets the keyword short-circuit
//! before anything else; the model never sees those replies, so a
//! confused completion cannot derail an in-flight confirmation.
//! Everything else goes to the LLM, and any failure there degrades to a
//! read-only classification.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::llm::{ChatClient, ChatRequest, extract_json_object};
use crate::prompts;

/// Operations the classifier can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
    RemindAll,
    RemindSpecific,
}

impl Operation {
    /// Write operations go through parse -> validate -> confirm.
    pub fn is_write(&self) -> bool {
        matches!(self, Operation::Create | Operation::Update | Operation::Delete)
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Operation::Create => "CREATE",
            Operation::Read => "READ",
            Operation::Update => "UPDATE",
            Operation::Delete => "DELETE",
            Operation::RemindAll => "REMIND_ALL",
            Operation::RemindSpecific => "REMIND_SPECIFIC",
        };
        f.write_str(s)
    }
}

/// LLM classification of a free-text message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub operation: Operation,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub student_id: Option<String>,
}

impl Classification {
    /// The fail-safe default: a classifier outage must never trigger a
    /// write, so unknown messages read.
    pub fn fallback() -> Self {
        Self {
            operation: Operation::Read,
            confidence: 0.5,
            student_id: None,
        }
    }
}

/// A reply from a sender who has a pending confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationReply {
    Yes,
    No,
    Invalid,
}

/// Map a free-text reply onto yes/no/invalid. Purely lexical.
pub fn interpret_reply(text: &str) -> ConfirmationReply {
    match text.trim().to_lowercase().as_str() {
        "yes" | "y" | "confirm" | "ok" | "proceed" => ConfirmationReply::Yes,
        "no" | "n" | "cancel" | "stop" | "abort" => ConfirmationReply::No,
        _ => ConfirmationReply::Invalid,
    }
}

/// LLM-backed classifier.
pub struct Classifier {
    llm: Arc<dyn ChatClient>,
}

impl Classifier {
    pub fn new(llm: Arc<dyn ChatClient>) -> Self {
        Self { llm }
    }

    /// Classify a message that is not a confirmation reply.
    pub async fn classify(&self, text: &str) -> Classification {
        let prompt = prompts::render(prompts::CLASSIFY, text);
        let request = ChatRequest::user(prompt, prompts::CLASSIFY_TEMPERATURE, prompts::CLASSIFY_MAX_TOKENS);

        let response = match self.llm.complete(request).await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "classify: LLM call failed, defaulting to READ");
                return Classification::fallback();
            }
        };

        let Some(json) = extract_json_object(&response.content) else {
            warn!("classify: no JSON object in response, defaulting to READ");
            return Classification::fallback();
        };

        match serde_json::from_str::<Classification>(json) {
            Ok(mut classification) => {
                if classification
                    .student_id
                    .as_deref()
                    .is_some_and(|id| id.trim().is_empty())
                {
                    classification.student_id = None;
                }
                debug!(operation = %classification.operation, confidence = classification.confidence, "classify: done");
                classification
            }
            Err(e) => {
                warn!(error = %e, "classify: unparseable classification, defaulting to READ");
                Classification::fallback()
            }
        }
    }
}
