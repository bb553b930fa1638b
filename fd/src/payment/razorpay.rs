//! Razorpay REST client
//!
//! Order creation and lookup over the orders API with key-id/secret
//! basic auth. The gateway sits behind a trait so the webhook bridge is
//! testable without the network.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::RazorpayConfig;

const DEFAULT_BASE_URL: &str = "https://api.razorpay.com";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from the payment path
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Gateway API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Student not found: {0}")]
    StudentNotFound(String),

    #[error("Invalid payment amount: {0}")]
    InvalidAmount(String),

    #[error("Ledger error: {0}")]
    Ledger(#[from] feeledger::LedgerError),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Order-creation request. Amounts are minor units (paise).
#[derive(Debug, Clone, Serialize)]
pub struct OrderRequest {
    pub amount: u64,
    pub currency: String,
    pub receipt: String,
    pub notes: OrderNotes,
}

/// Metadata stored on the order; the webhook reads the student back out.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderNotes {
    pub studid: String,
    pub student_name: String,
    pub payment_amount: String,
    pub outstanding_balance: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Order {
    pub id: String,
    #[serde(default)]
    pub amount: u64,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub notes: OrderNotes,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_order(&self, request: OrderRequest) -> Result<Order, PaymentError>;

    async fn fetch_order(&self, order_id: &str) -> Result<Order, PaymentError>;
}

pub struct RazorpayClient {
    http: Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

impl RazorpayClient {
    pub fn from_config(config: &RazorpayConfig) -> Result<Self, PaymentError> {
        let key_id = std::env::var(&config.key_id_env).map_err(|_| {
            PaymentError::Config(format!("set the {} environment variable", config.key_id_env))
        })?;
        let key_secret = std::env::var(&config.key_secret_env).map_err(|_| {
            PaymentError::Config(format!("set the {} environment variable", config.key_secret_env))
        })?;
        let http = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(PaymentError::Network)?;
        Ok(Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            key_id,
            key_secret,
        })
    }
}

#[async_trait]
impl PaymentGateway for RazorpayClient {
    async fn create_order(&self, request: OrderRequest) -> Result<Order, PaymentError> {
        debug!(amount = request.amount, receipt = %request.receipt, "create_order");
        let url = format!("{}/v1/orders", self.base_url);
        let response = self
            .http
            .post(&url)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PaymentError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json().await?)
    }

    async fn fetch_order(&self, order_id: &str) -> Result<Order, PaymentError> {
        debug!(%order_id, "fetch_order");
        let url = format!("{}/v1/orders/{}", self.base_url, order_id);
        let response = self
            .http
            .get(&url)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PaymentError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json().await?)
    }
}
