//! Payment bridge
//!
//! Webhook-triggered mutation path. A verified captured payment becomes
//! a synthesized installment change-set fed straight into the mutation
//! service - webhook events are trusted and never wait on a human
//! reply. The outward response is always success-shaped so the gateway
//! does not retry-storm; failures are logged internally instead.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use feeledger::{LedgerStore, LogAction, LogResult, NewLog};

use super::razorpay::{Order, OrderNotes, OrderRequest, PaymentError, PaymentGateway};
use super::webhook::{EVENT_PAYMENT_CAPTURED, PaymentEvent, verify_signature};
use crate::notify::DeliveryAdapter;
use crate::pipeline::changeset::{ChangeSet, PaymentIntent, WriteIntent};
use crate::pipeline::confirmation::display_amount;
use crate::pipeline::mutation::MutationService;

/// Actor identity stamped on webhook-recorded installments.
const WEBHOOK_ACTOR: &str = "Razorpay";

/// What the bridge did with an inbound event. Regardless of variant,
/// the HTTP response to the gateway is success-shaped.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookOutcome {
    /// Signature mismatch or unusable payload; nothing mutated.
    Rejected,
    /// A valid event the bridge does not act on.
    Ignored { event: String },
    /// Exactly one installment recorded and the aggregate recomputed.
    Processed { stud_id: String, amount: f64 },
}

pub struct PaymentBridge {
    gateway: Arc<dyn PaymentGateway>,
    mutation: Arc<MutationService>,
    ledger: Arc<dyn LedgerStore>,
    delivery: Arc<dyn DeliveryAdapter>,
    webhook_secret: String,
    school_name: String,
    currency: String,
}

impl PaymentBridge {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        mutation: Arc<MutationService>,
        ledger: Arc<dyn LedgerStore>,
        delivery: Arc<dyn DeliveryAdapter>,
        webhook_secret: impl Into<String>,
        school_name: impl Into<String>,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            gateway,
            mutation,
            ledger,
            delivery,
            webhook_secret: webhook_secret.into(),
            school_name: school_name.into(),
            currency: currency.into(),
        }
    }

    async fn log_webhook_error(&self, raw_body: &str, error: String) {
        let log = NewLog::new(LogAction::WebhookError, LogResult::Fail, WEBHOOK_ACTOR)
            .with_message(raw_body)
            .with_error(error);
        if let Err(e) = self.ledger.append_log(log).await {
            error!(error = %e, "failed to log webhook error");
        }
    }

    /// Handle a raw gateway webhook delivery.
    pub async fn handle_webhook(&self, raw_body: &str, signature: &str) -> WebhookOutcome {
        if !verify_signature(&self.webhook_secret, raw_body.as_bytes(), signature) {
            warn!("webhook signature mismatch");
            self.log_webhook_error(raw_body, "invalid webhook signature".to_string())
                .await;
            return WebhookOutcome::Rejected;
        }

        let event: PaymentEvent = match serde_json::from_str(raw_body) {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "webhook payload unparseable");
                self.log_webhook_error(raw_body, e.to_string()).await;
                return WebhookOutcome::Rejected;
            }
        };

        if event.event != EVENT_PAYMENT_CAPTURED {
            info!(event = %event.event, "webhook event ignored");
            return WebhookOutcome::Ignored { event: event.event };
        }

        let payment = event.payload.payment.entity;
        let order = match self.gateway.fetch_order(&payment.order_id).await {
            Ok(o) => o,
            Err(e) => {
                warn!(error = %e, order_id = %payment.order_id, "order lookup failed");
                self.log_webhook_error(raw_body, e.to_string()).await;
                return WebhookOutcome::Rejected;
            }
        };

        let stud_id = order.notes.studid.clone();
        if stud_id.is_empty() {
            self.log_webhook_error(raw_body, format!("order {} has no student note", order.id))
                .await;
            return WebhookOutcome::Rejected;
        }

        let amount = payment.amount as f64 / 100.0;
        let change_set = ChangeSet::single(
            WriteIntent::Payment(PaymentIntent {
                stud_id: stud_id.clone(),
                name: String::new(),
                amount: display_amount(amount),
                date: String::new(),
                mode: "Online".to_string(),
                remarks: format!("Transaction ID: {}", payment.id),
            }),
            format!("payment.captured {} for {}", payment.id, stud_id),
        );

        let report = self.mutation.apply(&change_set, WEBHOOK_ACTOR).await;
        if !report.success() {
            warn!(%stud_id, "webhook mutation failed");
            // Row-level failures were already logged by the mutation
            // service; the gateway still gets a success-shaped reply.
            return WebhookOutcome::Rejected;
        }

        info!(%stud_id, amount, payment_id = %payment.id, "webhook payment recorded");

        // Best-effort receipt: exactly one per captured payment, and a
        // failed send never unwinds the committed mutation.
        self.send_receipt(&stud_id, amount, &payment.id).await;

        WebhookOutcome::Processed { stud_id, amount }
    }

    async fn send_receipt(&self, stud_id: &str, amount: f64, transaction_id: &str) {
        let student = match self.ledger.find_student(stud_id).await {
            Ok(Some(s)) => s,
            Ok(None) => {
                warn!(%stud_id, "no student row for receipt");
                return;
            }
            Err(e) => {
                warn!(error = %e, "receipt lookup failed");
                return;
            }
        };
        if student.parent_no.trim().is_empty() {
            warn!(%stud_id, "no guardian contact for receipt");
            return;
        }

        let message = format!(
            "✅ *Payment Received Successfully!*\n\n\
             💰 *Amount:* ₹{amount}\n\
             👨‍🎓 *Student:* {name}\n\
             🆔 *Student ID:* {stud_id}\n\
             📚 *Class:* {class}\n\
             💳 *Transaction ID:* {transaction_id}\n\n\
             Thank you for your payment!\n\n\
             *{school} Management*",
            amount = display_amount(amount),
            name = student.name,
            stud_id = student.stud_id,
            class = student.class,
            school = self.school_name,
        );

        if let Err(e) = self.delivery.send_text(&student.parent_no, &message).await {
            warn!(error = %e, %stud_id, "receipt delivery failed");
        }
    }

    /// Create a gateway order for an online fee payment, validating the
    /// amount against the student's outstanding balance.
    pub async fn create_order_for_student(
        &self,
        stud_id: &str,
        amount: f64,
    ) -> Result<Order, PaymentError> {
        let student = self
            .ledger
            .find_student(stud_id)
            .await?
            .ok_or_else(|| PaymentError::StudentNotFound(stud_id.to_string()))?;

        let balance = self
            .ledger
            .fee_account(stud_id)
            .await?
            .map(|account| account.balance)
            .unwrap_or(0.0);

        if amount <= 0.0 {
            return Err(PaymentError::InvalidAmount(format!("{amount}")));
        }
        if amount > balance {
            return Err(PaymentError::InvalidAmount(format!(
                "payment amount cannot exceed outstanding balance of ₹{}",
                display_amount(balance)
            )));
        }

        let request = OrderRequest {
            amount: (amount * 100.0).round() as u64,
            currency: self.currency.clone(),
            receipt: format!("fee_{}_{}", stud_id, Utc::now().timestamp()),
            notes: OrderNotes {
                studid: stud_id.to_string(),
                student_name: student.name.clone(),
                payment_amount: display_amount(amount),
                outstanding_balance: display_amount(balance),
            },
        };
        self.gateway.create_order(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::RecordingDelivery;
    use crate::payment::webhook::sign_body;
    use feeledger::{MemoryStore, NewStudent};
    use std::sync::Mutex;

    const SECRET: &str = "whsec_test";

    struct FakeGateway {
        orders: Mutex<Vec<Order>>,
    }

    impl FakeGateway {
        fn with_order(order: Order) -> Self {
            Self {
                orders: Mutex::new(vec![order]),
            }
        }
    }

    #[async_trait::async_trait]
    impl PaymentGateway for FakeGateway {
        async fn create_order(&self, request: OrderRequest) -> Result<Order, PaymentError> {
            let order = Order {
                id: format!("order_{}", request.receipt),
                amount: request.amount,
                currency: request.currency,
                notes: request.notes,
            };
            self.orders.lock().unwrap().push(order.clone());
            Ok(order)
        }

        async fn fetch_order(&self, order_id: &str) -> Result<Order, PaymentError> {
            self.orders
                .lock()
                .unwrap()
                .iter()
                .find(|o| o.id == order_id)
                .cloned()
                .ok_or_else(|| PaymentError::Api {
                    status: 404,
                    message: format!("order {order_id} not found"),
                })
        }
    }

    fn captured_body(order_id: &str, amount_minor: u64) -> String {
        format!(
            r#"{{"event":"payment.captured","payload":{{"payment":{{"entity":{{"id":"pay_abc123","order_id":"{order_id}","amount":{amount_minor}}}}}}}}}"#
        )
    }

    async fn bridge_with_student() -> (Arc<MemoryStore>, Arc<RecordingDelivery>, PaymentBridge) {
        let ledger = Arc::new(MemoryStore::new());
        let student = ledger
            .add_student(NewStudent {
                name: "Rahul Pandey".to_string(),
                class: "12".to_string(),
                parent_no: "919999999999".to_string(),
                total_fees: 40000.0,
                ..Default::default()
            })
            .await
            .unwrap();
        ledger.seed_fee_account(&student, 40000.0).await.unwrap();

        let gateway = Arc::new(FakeGateway::with_order(Order {
            id: "order_1".to_string(),
            amount: 400000,
            currency: "INR".to_string(),
            notes: OrderNotes {
                studid: "STU001".to_string(),
                student_name: "Rahul Pandey".to_string(),
                ..Default::default()
            },
        }));
        let delivery = Arc::new(RecordingDelivery::new());
        let mutation = Arc::new(MutationService::new(ledger.clone()));
        let bridge = PaymentBridge::new(
            gateway,
            mutation,
            ledger.clone(),
            delivery.clone(),
            SECRET,
            "Sunrise Public School",
            "INR",
        );
        (ledger, delivery, bridge)
    }

    #[tokio::test]
    async fn test_captured_payment_records_one_installment() {
        let (ledger, delivery, bridge) = bridge_with_student().await;
        let body = captured_body("order_1", 400000);
        let signature = sign_body(SECRET, body.as_bytes());

        let outcome = bridge.handle_webhook(&body, &signature).await;
        assert_eq!(
            outcome,
            WebhookOutcome::Processed {
                stud_id: "STU001".to_string(),
                amount: 4000.0
            }
        );

        let installments = ledger.installments_for("STU001").await.unwrap();
        assert_eq!(installments.len(), 1);
        assert_eq!(installments[0].amount, 4000.0);
        assert_eq!(installments[0].mode, "Online");
        assert_eq!(installments[0].recorded_by, "Razorpay");
        assert!(installments[0].remarks.contains("pay_abc123"));

        // Aggregate recomputed, not incremented
        let account = ledger.fee_account("STU001").await.unwrap().unwrap();
        assert_eq!(account.total_paid, 4000.0);
        assert_eq!(account.balance, 36000.0);

        // Exactly one receipt went to the guardian
        let receipts: Vec<_> = delivery
            .sent()
            .into_iter()
            .filter(|(to, _)| to == "919999999999")
            .collect();
        assert_eq!(receipts.len(), 1);
        assert!(receipts[0].1.contains("pay_abc123"));
    }

    #[tokio::test]
    async fn test_invalid_signature_mutates_nothing() {
        let (ledger, delivery, bridge) = bridge_with_student().await;
        let body = captured_body("order_1", 400000);

        let outcome = bridge.handle_webhook(&body, "deadbeef").await;
        assert_eq!(outcome, WebhookOutcome::Rejected);

        assert!(ledger.installments_for("STU001").await.unwrap().is_empty());
        assert!(delivery.sent().is_empty());
        // But the failure is on the audit trail
        assert!(
            ledger
                .logs()
                .iter()
                .any(|l| l.action == LogAction::WebhookError)
        );
    }

    #[tokio::test]
    async fn test_non_capture_event_is_ignored() {
        let (ledger, _delivery, bridge) = bridge_with_student().await;
        let body = r#"{"event":"payment.failed","payload":{"payment":{"entity":{"id":"pay_1","order_id":"order_1","amount":100}}}}"#;
        let signature = sign_body(SECRET, body.as_bytes());

        let outcome = bridge.handle_webhook(body, &signature).await;
        assert_eq!(
            outcome,
            WebhookOutcome::Ignored {
                event: "payment.failed".to_string()
            }
        );
        assert!(ledger.installments_for("STU001").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_receipt_failure_keeps_mutation() {
        let ledger = Arc::new(MemoryStore::new());
        let student = ledger
            .add_student(NewStudent {
                name: "Rahul".to_string(),
                class: "12".to_string(),
                parent_no: "917777777777".to_string(),
                total_fees: 10000.0,
                ..Default::default()
            })
            .await
            .unwrap();
        ledger.seed_fee_account(&student, 10000.0).await.unwrap();

        let gateway = Arc::new(FakeGateway::with_order(Order {
            id: "order_1".to_string(),
            amount: 100000,
            currency: "INR".to_string(),
            notes: OrderNotes {
                studid: "STU001".to_string(),
                ..Default::default()
            },
        }));
        let delivery = Arc::new(RecordingDelivery::blocking(vec!["917777777777"]));
        let bridge = PaymentBridge::new(
            gateway,
            Arc::new(MutationService::new(ledger.clone())),
            ledger.clone(),
            delivery,
            SECRET,
            "School",
            "INR",
        );

        let body = captured_body("order_1", 100000);
        let outcome = bridge.handle_webhook(&body, &sign_body(SECRET, body.as_bytes())).await;
        assert!(matches!(outcome, WebhookOutcome::Processed { .. }));
        // The committed installment survives the failed notification
        assert_eq!(ledger.installments_for("STU001").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_order_creation_validates_balance() {
        let (_ledger, _delivery, bridge) = bridge_with_student().await;

        let order = bridge.create_order_for_student("STU001", 4000.0).await.unwrap();
        assert_eq!(order.amount, 400000);
        assert_eq!(order.notes.studid, "STU001");

        assert!(matches!(
            bridge.create_order_for_student("STU001", 50000.0).await,
            Err(PaymentError::InvalidAmount(_))
        ));
        assert!(matches!(
            bridge.create_order_for_student("STU001", 0.0).await,
            Err(PaymentError::InvalidAmount(_))
        ));
        assert!(matches!(
            bridge.create_order_for_student("STU404", 100.0).await,
            Err(PaymentError::StudentNotFound(_))
        ));
    }
}
