//! Delivery adapter trait
//!
//! The pipeline's outbound seam. Delivery is always best-effort at call
//! sites: a failed send is logged, never rolled back into the ledger.

use async_trait::async_trait;
use thiserror::Error;

/// Errors from the messaging platform
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Messaging API error {status}: {message}")]
    Api { status: u16, message: String },

    /// The platform refuses this recipient (not on the allowed list).
    #[error("Recipient not in the allowed list: {0}")]
    RecipientNotAllowed(String),
}

#[async_trait]
pub trait DeliveryAdapter: Send + Sync {
    /// Send a plain text message.
    async fn send_text(&self, to: &str, body: &str) -> Result<(), DeliveryError>;

    /// Send a previously uploaded document with a caption.
    async fn send_document(
        &self,
        to: &str,
        media_id: &str,
        caption: &str,
        filename: &str,
    ) -> Result<(), DeliveryError>;
}

/// Prints messages to stdout; used by the CLI's simulate mode.
pub struct ConsoleDelivery;

#[async_trait]
impl DeliveryAdapter for ConsoleDelivery {
    async fn send_text(&self, to: &str, body: &str) -> Result<(), DeliveryError> {
        println!("--- message to {to} ---\n{body}\n");
        Ok(())
    }

    async fn send_document(
        &self,
        to: &str,
        media_id: &str,
        caption: &str,
        filename: &str,
    ) -> Result<(), DeliveryError> {
        println!("--- document to {to} ({filename}, media {media_id}) ---\n{caption}\n");
        Ok(())
    }
}

#[cfg(test)]
pub mod recording {
    use super::*;
    use std::sync::Mutex;

    /// Captures outbound messages for assertions.
    #[derive(Default)]
    pub struct RecordingDelivery {
        sent: Mutex<Vec<(String, String)>>,
        /// Recipients the fake platform rejects.
        blocked: Vec<String>,
    }

    impl RecordingDelivery {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn blocking(recipients: Vec<&str>) -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                blocked: recipients.into_iter().map(String::from).collect(),
            }
        }

        pub fn sent(&self) -> Vec<(String, String)> {
            self.sent.lock().expect("recorder poisoned").clone()
        }

        pub fn last_to(&self, to: &str) -> Option<String> {
            self.sent()
                .into_iter()
                .rev()
                .find(|(recipient, _)| recipient == to)
                .map(|(_, body)| body)
        }
    }

    #[async_trait]
    impl DeliveryAdapter for RecordingDelivery {
        async fn send_text(&self, to: &str, body: &str) -> Result<(), DeliveryError> {
            if self.blocked.iter().any(|b| b == to) {
                return Err(DeliveryError::RecipientNotAllowed(to.to_string()));
            }
            self.sent
                .lock()
                .expect("recorder poisoned")
                .push((to.to_string(), body.to_string()));
            Ok(())
        }

        async fn send_document(
            &self,
            to: &str,
            _media_id: &str,
            caption: &str,
            _filename: &str,
        ) -> Result<(), DeliveryError> {
            self.send_text(to, caption).await
        }
    }
}
