//! feedaemon - WhatsApp-driven fee-ledger pipeline
//!
//! Parents and staff send free-text WhatsApp messages; an LLM classifies
//! and parses them into structured commands; the pipeline validates,
//! asks the sender to confirm, and commits the confirmed change-set to
//! the spreadsheet-backed ledger. A payment-gateway webhook feeds the
//! same mutation service directly.
//!
//! # Modules
//!
//! - [`pipeline`] - classifier, parser, validator, confirmation state
//!   machine, mutation service, and the message router over them
//! - [`llm`] - chat completion client trait and the Groq implementation
//! - [`notify`] - delivery adapter, WhatsApp client, reminder service
//! - [`payment`] - gateway client, webhook verification, payment bridge
//! - [`webhook`] - inbound messaging payload contracts
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface

pub mod cli;
pub mod config;
pub mod llm;
pub mod notify;
pub mod payment;
pub mod pipeline;
pub mod prompts;
pub mod webhook;

// Re-export commonly used types
pub use config::{Config, LedgerBackend, LlmConfig, RazorpayConfig, WhatsAppConfig};
pub use llm::{ChatClient, ChatRequest, ChatResponse, GroqClient, LlmError};
pub use notify::{ConsoleDelivery, DeliveryAdapter, DeliveryError, ReminderService, WhatsAppClient};
pub use payment::{PaymentBridge, PaymentError, PaymentGateway, RazorpayClient, WebhookOutcome};
pub use pipeline::{
    ChangeSet, Classification, Classifier, ConfirmationStore, MessageRouter, MutationReport,
    MutationService, Operation, ParseOutcome, ReadService, WriteIntent, WriteParser,
};
