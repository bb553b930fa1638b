//! Structured write parser
//!
//! Turns WRITE-intent text into a tagged [`ChangeSet`] via the LLM.
//! Failure is a tagged outcome carrying the raw message and error so the
//! router can always write the `parse_error` audit row - the pipeline
//! never drops a failed parse on the floor.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::llm::{ChatClient, ChatRequest, extract_json_object};
use crate::pipeline::changeset::{ChangeSet, WriteIntent};
use crate::prompts;

/// Outcome of parsing a write request.
#[derive(Debug, Clone)]
pub enum ParseOutcome {
    Parsed(ChangeSet),
    Failed { raw_message: String, error: String },
}

pub struct WriteParser {
    llm: Arc<dyn ChatClient>,
}

impl WriteParser {
    pub fn new(llm: Arc<dyn ChatClient>) -> Self {
        Self { llm }
    }

    pub async fn parse(&self, text: &str) -> ParseOutcome {
        let prompt = prompts::render(prompts::PARSE_WRITE, text);
        let request = ChatRequest::user(
            prompt,
            prompts::PARSE_WRITE_TEMPERATURE,
            prompts::PARSE_WRITE_MAX_TOKENS,
        );

        let response = match self.llm.complete(request).await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "parse: LLM call failed");
                return ParseOutcome::Failed {
                    raw_message: text.to_string(),
                    error: e.to_string(),
                };
            }
        };

        let Some(json) = extract_json_object(&response.content) else {
            warn!("parse: no JSON object in response");
            return ParseOutcome::Failed {
                raw_message: text.to_string(),
                error: "no JSON object in model response".to_string(),
            };
        };

        match serde_json::from_str::<WriteIntent>(json) {
            Ok(intent) => {
                debug!(?intent, "parse: done");
                ParseOutcome::Parsed(ChangeSet::single(intent, text))
            }
            Err(e) => {
                warn!(error = %e, "parse: model JSON did not match a supported shape");
                ParseOutcome::Failed {
                    raw_message: text.to_string(),
                    error: e.to_string(),
                }
            }
        }
    }
}
