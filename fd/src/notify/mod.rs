//! Outbound messaging
//!
//! The delivery adapter seam, the WhatsApp Graph implementation, and
//! the reminder service.

mod adapter;
mod reminder;
mod whatsapp;

pub use adapter::{ConsoleDelivery, DeliveryAdapter, DeliveryError};
pub use reminder::ReminderService;
pub use whatsapp::WhatsAppClient;

#[cfg(test)]
pub use adapter::recording::RecordingDelivery;
