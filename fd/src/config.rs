//! feedaemon configuration types and loading
//!
//! Secrets are named by environment variable (`*-env` fields) and read
//! from the process environment at client construction, never stored in
//! the config file.

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main feedaemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// LLM provider configuration
    pub llm: LlmConfig,

    /// WhatsApp Cloud API configuration
    pub whatsapp: WhatsAppConfig,

    /// Ledger backend configuration
    pub ledger: LedgerConfig,

    /// Payment gateway configuration
    pub razorpay: RazorpayConfig,

    /// School identity used in outbound messages
    pub school: SchoolConfig,

    /// Confirmation state machine tuning
    pub confirmation: ConfirmationConfig,
}

impl Config {
    /// Validate configuration before use. Call early to fail fast with
    /// clear error messages.
    pub fn validate(&self) -> Result<()> {
        if std::env::var(&self.llm.api_key_env).is_err() {
            return Err(eyre::eyre!(
                "LLM API key not found. Set the {} environment variable.",
                self.llm.api_key_env
            ));
        }
        if self.ledger.backend == LedgerBackend::Sheets {
            if self.ledger.spreadsheet_id.is_empty() {
                return Err(eyre::eyre!("ledger.spreadsheet-id is not configured"));
            }
            if std::env::var(&self.ledger.token_env).is_err() {
                return Err(eyre::eyre!(
                    "Ledger API token not found. Set the {} environment variable.",
                    self.ledger.token_env
                ));
            }
        }
        Ok(())
    }

    /// Load configuration with fallback chain:
    /// explicit path, then `./.feedaemon.yml`, then the user config dir.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path)
                .context(format!("Failed to load config from {}", path.display()));
        }

        let local_config = PathBuf::from(".feedaemon.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("feedaemon").join("feedaemon.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name (currently only "groq" supported)
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "groq".to_string(),
            model: "llama-3.3-70b-versatile".to_string(),
            api_key_env: "GROQ_API_KEY".to_string(),
            base_url: "https://api.groq.com/openai".to_string(),
            timeout_ms: 30_000,
        }
    }
}

/// WhatsApp Cloud API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WhatsAppConfig {
    /// Environment variable containing the access token
    #[serde(rename = "access-token-env")]
    pub access_token_env: String,

    /// Business phone number id the messages are sent from
    #[serde(rename = "phone-number-id")]
    pub phone_number_id: String,

    /// Environment variable containing the webhook verify token
    #[serde(rename = "verify-token-env")]
    pub verify_token_env: String,

    /// Graph API version segment
    #[serde(rename = "api-version")]
    pub api_version: String,

    /// Country code prefixed onto bare guardian numbers
    #[serde(rename = "country-code")]
    pub country_code: String,
}

impl WhatsAppConfig {
    /// The expected webhook verify token, if configured in the
    /// environment. Compared against `hub.verify_token` on the
    /// subscription handshake.
    pub fn verify_token(&self) -> Option<String> {
        std::env::var(&self.verify_token_env).ok()
    }
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            access_token_env: "WHATSAPP_ACCESS_TOKEN".to_string(),
            phone_number_id: String::new(),
            verify_token_env: "WHATSAPP_VERIFY_TOKEN".to_string(),
            api_version: "v18.0".to_string(),
            country_code: "91".to_string(),
        }
    }
}

/// Which ledger store implementation to run against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerBackend {
    Sheets,
    Memory,
}

/// Ledger backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub backend: LedgerBackend,

    /// Spreadsheet document id
    #[serde(rename = "spreadsheet-id")]
    pub spreadsheet_id: String,

    /// Environment variable containing the spreadsheet API bearer token
    #[serde(rename = "token-env")]
    pub token_env: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            backend: LedgerBackend::Sheets,
            spreadsheet_id: String::new(),
            token_env: "SHEETS_ACCESS_TOKEN".to_string(),
        }
    }
}

/// Payment gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RazorpayConfig {
    #[serde(rename = "key-id-env")]
    pub key_id_env: String,

    #[serde(rename = "key-secret-env")]
    pub key_secret_env: String,

    /// Environment variable containing the webhook shared secret
    #[serde(rename = "webhook-secret-env")]
    pub webhook_secret_env: String,

    pub currency: String,
}

impl RazorpayConfig {
    /// The shared secret the gateway signs webhook bodies with.
    pub fn webhook_secret(&self) -> Result<String> {
        std::env::var(&self.webhook_secret_env).map_err(|_| {
            eyre::eyre!(
                "Webhook secret not found. Set the {} environment variable.",
                self.webhook_secret_env
            )
        })
    }
}

impl Default for RazorpayConfig {
    fn default() -> Self {
        Self {
            key_id_env: "RAZORPAY_KEY_ID".to_string(),
            key_secret_env: "RAZORPAY_KEY_SECRET".to_string(),
            webhook_secret_env: "RAZORPAY_WEBHOOK_SECRET".to_string(),
            currency: "INR".to_string(),
        }
    }
}

/// School identity used in outbound messages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchoolConfig {
    pub name: String,

    /// Base URL the per-student payment links are built from
    #[serde(rename = "payment-base-url")]
    pub payment_base_url: String,
}

impl Default for SchoolConfig {
    fn default() -> Self {
        Self {
            name: "School".to_string(),
            payment_base_url: "http://localhost:3000".to_string(),
        }
    }
}

/// Confirmation state machine tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfirmationConfig {
    /// Pending proposals older than this are treated as cancelled on
    /// next access. 0 disables expiry.
    #[serde(rename = "ttl-minutes")]
    pub ttl_minutes: u64,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self { ttl_minutes: 15 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.llm.provider, "groq");
        assert_eq!(config.llm.api_key_env, "GROQ_API_KEY");
        assert_eq!(config.ledger.backend, LedgerBackend::Sheets);
        assert_eq!(config.confirmation.ttl_minutes, 15);
        assert_eq!(config.whatsapp.country_code, "91");
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
llm:
  provider: groq
  model: llama3-8b-8192
  api-key-env: MY_GROQ_KEY
  base-url: https://api.example.com
  timeout-ms: 60000

whatsapp:
  phone-number-id: "1234567890"
  api-version: v19.0

ledger:
  backend: memory

confirmation:
  ttl-minutes: 30
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.llm.model, "llama3-8b-8192");
        assert_eq!(config.llm.api_key_env, "MY_GROQ_KEY");
        assert_eq!(config.whatsapp.phone_number_id, "1234567890");
        assert_eq!(config.whatsapp.api_version, "v19.0");
        assert_eq!(config.ledger.backend, LedgerBackend::Memory);
        assert_eq!(config.confirmation.ttl_minutes, 30);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let yaml = r#"
school:
  name: Sunrise Public School
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.school.name, "Sunrise Public School");
        assert_eq!(config.school.payment_base_url, "http://localhost:3000");
        assert_eq!(config.llm.provider, "groq");
        assert_eq!(config.razorpay.currency, "INR");
    }

    #[test]
    fn test_load_from_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "school:\n  name: Test School").unwrap();
        let path = file.path().to_path_buf();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.school.name, "Test School");
    }

    #[test]
    fn test_validate_rejects_missing_api_key() {
        let config = Config {
            llm: LlmConfig {
                api_key_env: "FD_TEST_SURELY_UNSET_KEY_93451".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("FD_TEST_SURELY_UNSET_KEY_93451"));
    }

    #[test]
    fn test_validate_memory_backend_needs_no_sheet() {
        let config = Config {
            llm: LlmConfig {
                // PATH is always present; stands in for a configured key
                api_key_env: "PATH".to_string(),
                ..Default::default()
            },
            ledger: LedgerConfig {
                backend: LedgerBackend::Memory,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
