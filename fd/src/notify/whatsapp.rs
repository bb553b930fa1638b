//! WhatsApp Graph API delivery adapter
//!
//! Text and document sends against the Cloud API. Documents require the
//! media-upload step first; `upload_media` returns the media id the
//! document send references.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use super::adapter::{DeliveryAdapter, DeliveryError};
use crate::config::WhatsAppConfig;

const DEFAULT_BASE_URL: &str = "https://graph.facebook.com";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Error code the platform returns for recipients outside the allowed
/// list (unverified business numbers can only message approved phones).
const ERROR_RECIPIENT_NOT_ALLOWED: u64 = 131030;

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: u64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct MediaUploadResponse {
    id: String,
}

pub struct WhatsAppClient {
    http: Client,
    base_url: String,
    api_version: String,
    phone_number_id: String,
    token: String,
}

impl WhatsAppClient {
    pub fn from_config(config: &WhatsAppConfig) -> Result<Self, DeliveryError> {
        let token = std::env::var(&config.access_token_env).map_err(|_| DeliveryError::Api {
            status: 0,
            message: format!(
                "access token not found: set the {} environment variable",
                config.access_token_env
            ),
        })?;
        let http = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(DeliveryError::Network)?;
        Ok(Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_version: config.api_version.clone(),
            phone_number_id: config.phone_number_id.clone(),
            token,
        })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/{}/{}/messages",
            self.base_url, self.api_version, self.phone_number_id
        )
    }

    async fn post_message(&self, body: serde_json::Value) -> Result<(), DeliveryError> {
        let response = self
            .http
            .post(self.messages_url())
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            debug!("message sent");
            return Ok(());
        }

        let status = status.as_u16();
        let text = response.text().await.unwrap_or_default();
        if let Ok(envelope) = serde_json::from_str::<ApiErrorEnvelope>(&text) {
            if envelope.error.code == ERROR_RECIPIENT_NOT_ALLOWED {
                warn!("recipient not in allowed list");
                return Err(DeliveryError::RecipientNotAllowed(envelope.error.message));
            }
            return Err(DeliveryError::Api {
                status,
                message: envelope.error.message,
            });
        }
        Err(DeliveryError::Api { status, message: text })
    }

    /// Upload a document and return its media id.
    pub async fn upload_media(
        &self,
        bytes: Vec<u8>,
        mime_type: &str,
        filename: &str,
    ) -> Result<String, DeliveryError> {
        let url = format!(
            "{}/{}/{}/media",
            self.base_url, self.api_version, self.phone_number_id
        );
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(mime_type)
            .map_err(DeliveryError::Network)?;
        let form = reqwest::multipart::Form::new()
            .text("messaging_product", "whatsapp")
            .part("file", part);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Api {
                status: status.as_u16(),
                message,
            });
        }
        let uploaded: MediaUploadResponse = response.json().await?;
        debug!(media_id = %uploaded.id, "media uploaded");
        Ok(uploaded.id)
    }
}

#[async_trait]
impl DeliveryAdapter for WhatsAppClient {
    async fn send_text(&self, to: &str, body: &str) -> Result<(), DeliveryError> {
        debug!(%to, body_len = body.len(), "send_text");
        self.post_message(serde_json::json!({
            "messaging_product": "whatsapp",
            "to": to,
            "type": "text",
            "text": { "body": body },
        }))
        .await
    }

    async fn send_document(
        &self,
        to: &str,
        media_id: &str,
        caption: &str,
        filename: &str,
    ) -> Result<(), DeliveryError> {
        debug!(%to, %media_id, "send_document");
        self.post_message(serde_json::json!({
            "messaging_product": "whatsapp",
            "to": to,
            "type": "document",
            "document": {
                "id": media_id,
                "caption": caption,
                "filename": filename,
            },
        }))
        .await
    }
}
