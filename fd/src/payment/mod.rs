//! Payment gateway integration
//!
//! Order creation, webhook signature verification, and the bridge that
//! turns captured payments into ledger mutations.

mod bridge;
mod razorpay;
pub mod webhook;

pub use bridge::{PaymentBridge, WebhookOutcome};
pub use razorpay::{Order, OrderNotes, OrderRequest, PaymentError, PaymentGateway, RazorpayClient};
pub use webhook::{EVENT_PAYMENT_CAPTURED, PaymentEvent, verify_signature};
