//! Payment webhook verification and event contracts
//!
//! The gateway signs the raw request body with HMAC-SHA256 over a
//! shared secret and sends the hex digest in a header. Verification
//! decodes the header and uses a constant-time comparison.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// The only event the bridge acts on.
pub const EVENT_PAYMENT_CAPTURED: &str = "payment.captured";

/// Verify the gateway signature over the raw body.
pub fn verify_signature(secret: &str, body: &[u8], signature_hex: &str) -> bool {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    match hex::decode(signature_hex.trim()) {
        Ok(signature) => mac.verify_slice(&signature).is_ok(),
        Err(_) => false,
    }
}

/// Compute the hex signature for a body; used by tests and tooling.
pub fn sign_body(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Gateway event envelope.
#[derive(Debug, Deserialize)]
pub struct PaymentEvent {
    pub event: String,
    #[serde(default)]
    pub payload: PaymentPayload,
}

#[derive(Debug, Default, Deserialize)]
pub struct PaymentPayload {
    #[serde(default)]
    pub payment: PaymentWrapper,
}

#[derive(Debug, Default, Deserialize)]
pub struct PaymentWrapper {
    #[serde(default)]
    pub entity: PaymentEntity,
}

/// The captured payment. `amount` is minor units (paise).
#[derive(Debug, Default, Deserialize)]
pub struct PaymentEntity {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub order_id: String,
    #[serde(default)]
    pub amount: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &[u8] = br#"{"event":"payment.captured","payload":{"payment":{"entity":{"id":"pay_x","order_id":"order_y","amount":400000}}}}"#;

    #[test]
    fn test_valid_signature_verifies() {
        let signature = sign_body("whsec_test", BODY);
        assert!(verify_signature("whsec_test", BODY, &signature));
        // Whitespace around the header value is tolerated
        assert!(verify_signature("whsec_test", BODY, &format!(" {signature} ")));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let signature = sign_body("whsec_test", BODY);
        assert!(!verify_signature("other_secret", BODY, &signature));
    }

    #[test]
    fn test_tampered_body_rejected() {
        let signature = sign_body("whsec_test", BODY);
        let mut tampered = BODY.to_vec();
        tampered[BODY.len() - 3] = b'9';
        assert!(!verify_signature("whsec_test", &tampered, &signature));
    }

    #[test]
    fn test_non_hex_signature_rejected() {
        assert!(!verify_signature("whsec_test", BODY, "not-hex-at-all"));
        assert!(!verify_signature("whsec_test", BODY, ""));
    }

    #[test]
    fn test_event_envelope_parses() {
        let event: PaymentEvent = serde_json::from_slice(BODY).unwrap();
        assert_eq!(event.event, EVENT_PAYMENT_CAPTURED);
        assert_eq!(event.payload.payment.entity.amount, 400000);
        assert_eq!(event.payload.payment.entity.order_id, "order_y");
    }
}
