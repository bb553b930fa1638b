//! Message router
//!
//! The control flow for one inbound message: pending-confirmation
//! resolution first, then classification, then the READ / reminder /
//! WRITE branches. Every terminal failure sends the sender a short
//! human-readable message and leaves an audit row; the inbound
//! acknowledgment is always success-shaped.

use std::sync::Arc;

use eyre::Result;
use tracing::{debug, error, info};

use feeledger::{LedgerStore, LogAction, LogResult, NewLog};

use crate::notify::{DeliveryAdapter, ReminderService};
use crate::pipeline::classifier::{Classifier, Operation, interpret_reply};
use crate::pipeline::confirmation::{ConfirmationStore, PendingState, Resolution, render_preview};
use crate::pipeline::mutation::MutationService;
use crate::pipeline::parser::{ParseOutcome, WriteParser};
use crate::pipeline::reads::ReadService;
use crate::pipeline::validator::validate;

const REPLY_YES_OR_NO: &str = "⚠️ Please reply *YES* to confirm or *NO* to cancel.";
const REPLY_CANCELLED: &str = "❌ Operation cancelled. No changes were made.";
const REPLY_EXPIRED: &str =
    "⌛ Your pending request expired without a reply and was cancelled. Please send it again.";
const REPLY_PARSE_FAILED: &str =
    "❌ Sorry, I couldn't understand that request. Please try again.";
const REPLY_INTERNAL_ERROR: &str =
    "❌ Sorry, I encountered an error processing your message. Please try again.";
const REPLY_REMIND_NEEDS_ID: &str =
    "❌ Please specify a student ID for reminder (e.g., remind STU123)";

pub struct MessageRouter {
    classifier: Classifier,
    parser: WriteParser,
    reads: ReadService,
    confirmations: Arc<ConfirmationStore>,
    mutation: Arc<MutationService>,
    reminders: ReminderService,
    ledger: Arc<dyn LedgerStore>,
    delivery: Arc<dyn DeliveryAdapter>,
}

impl MessageRouter {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        classifier: Classifier,
        parser: WriteParser,
        reads: ReadService,
        confirmations: Arc<ConfirmationStore>,
        mutation: Arc<MutationService>,
        reminders: ReminderService,
        ledger: Arc<dyn LedgerStore>,
        delivery: Arc<dyn DeliveryAdapter>,
    ) -> Self {
        Self {
            classifier,
            parser,
            reads,
            confirmations,
            mutation,
            reminders,
            ledger,
            delivery,
        }
    }

    /// Handle one inbound message end to end. Never propagates pipeline
    /// errors to the webhook acknowledgment.
    pub async fn handle_message(&self, from: &str, text: &str) -> Result<()> {
        info!(%from, text_len = text.len(), "inbound message");
        if let Err(e) = self.process(from, text).await {
            error!(error = %e, %from, "message processing failed");
            self.log(
                NewLog::new(LogAction::WebhookError, LogResult::Fail, actor(from))
                    .with_message(text)
                    .with_error(e.to_string()),
            )
            .await;
            self.send(from, REPLY_INTERNAL_ERROR).await;
        }
        Ok(())
    }

    async fn process(&self, from: &str, text: &str) -> Result<()> {
        // The confirmation short-circuit runs before any LLM call.
        match self.confirmations.state(from) {
            PendingState::Expired => {
                self.send(from, REPLY_EXPIRED).await;
                return Ok(());
            }
            PendingState::Active => return self.resolve_confirmation(from, text).await,
            PendingState::None => {}
        }

        let classification = self.classifier.classify(text).await;
        debug!(operation = %classification.operation, "classified");

        match classification.operation {
            Operation::Read => {
                let request = self.reads.parse(text).await;
                let reply = self.reads.execute(&request).await;
                self.send(from, &reply).await;
            }
            Operation::RemindAll => {
                let reply = self.reminders.remind_all().await;
                self.send(from, &reply).await;
            }
            Operation::RemindSpecific => match classification.student_id.as_deref() {
                Some(stud_id) => {
                    let reply = self.reminders.remind_one(stud_id).await;
                    self.send(from, &reply).await;
                }
                None => self.send(from, REPLY_REMIND_NEEDS_ID).await,
            },
            Operation::Create | Operation::Update | Operation::Delete => {
                self.start_write(from, text, classification.operation).await;
            }
        }
        Ok(())
    }

    async fn resolve_confirmation(&self, from: &str, text: &str) -> Result<()> {
        let reply = interpret_reply(text);
        match self.confirmations.resolve(from, reply) {
            Resolution::Confirmed(pending) => {
                info!(%from, id = %pending.id, "confirmation accepted, applying");
                let report = self.mutation.apply(&pending.change_set, &actor(from)).await;
                self.send(from, &report.summary_message()).await;
            }
            Resolution::Cancelled => self.send(from, REPLY_CANCELLED).await,
            // No state change and no log spam on ambiguous replies.
            Resolution::Unrecognized => self.send(from, REPLY_YES_OR_NO).await,
            Resolution::NothingPending => {
                // Consumed between the state check and the resolve;
                // nothing sensible to do but re-prompt.
                self.send(from, REPLY_YES_OR_NO).await;
            }
        }
        Ok(())
    }

    async fn start_write(&self, from: &str, text: &str, operation: Operation) {
        let change_set = match self.parser.parse(text).await {
            ParseOutcome::Parsed(change_set) => change_set,
            ParseOutcome::Failed { raw_message, error } => {
                self.log(
                    NewLog::new(LogAction::ParseError, LogResult::Fail, actor(from))
                        .with_message(raw_message)
                        .with_error(error),
                )
                .await;
                self.send(from, REPLY_PARSE_FAILED).await;
                return;
            }
        };

        // Invalid data never reaches the confirmation step.
        if let Err(validation) = validate(&change_set) {
            self.log(
                NewLog::new(LogAction::ValidationFailed, LogResult::Fail, actor(from))
                    .with_student(change_set.primary_student_id())
                    .with_message(text)
                    .with_snapshot(change_set.snapshot())
                    .with_error(validation.message.as_str()),
            )
            .await;
            self.send(from, &validation.message).await;
            return;
        }

        let preview = render_preview(&change_set, self.ledger.as_ref()).await;
        let pending = self.confirmations.request(from, change_set, operation);
        self.log(
            NewLog::new(LogAction::ConfirmationRequested, LogResult::Pending, actor(from))
                .with_student(pending.change_set.primary_student_id())
                .with_message(text)
                .with_snapshot(pending.change_set.snapshot()),
        )
        .await;
        self.send(from, &preview).await;
    }

    /// Delivery is best-effort; a failed send is logged and dropped.
    async fn send(&self, to: &str, body: &str) {
        if let Err(e) = self.delivery.send_text(to, body).await {
            error!(error = %e, %to, "reply delivery failed");
        }
    }

    async fn log(&self, log: NewLog) {
        if let Err(e) = self.ledger.append_log(log).await {
            error!(error = %e, "failed to append audit log");
        }
    }
}

fn actor(from: &str) -> String {
    format!("whatsapp_{from}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockChatClient;
    use crate::notify::RecordingDelivery;
    use feeledger::{FeeStatus, MemoryStore, NewStudent};

    const SENDER: &str = "919876543210";

    struct Fixture {
        ledger: Arc<MemoryStore>,
        delivery: Arc<RecordingDelivery>,
        router: MessageRouter,
    }

    /// Build a router whose three LLM consumers share one scripted
    /// mock. Calls happen in pipeline order: classify, then parse.
    async fn fixture(llm_responses: Vec<&str>) -> Fixture {
        let ledger: Arc<MemoryStore> = Arc::new(MemoryStore::new());
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

        let llm: Arc<MockChatClient> = Arc::new(MockChatClient::new(llm_responses));
        let delivery = Arc::new(RecordingDelivery::new());
        let confirmations = Arc::new(ConfirmationStore::new(15));
        let mutation = Arc::new(MutationService::new(ledger.clone()));
        let reminders = ReminderService::new(
            ledger.clone(),
            delivery.clone(),
            "Sunrise Public School",
            "https://fees.example.com",
            "91",
        );
        let router = MessageRouter::new(
            Classifier::new(llm.clone()),
            WriteParser::new(llm.clone()),
            ReadService::new(llm, ledger.clone()),
            confirmations,
            mutation,
            reminders,
            ledger.clone(),
            delivery.clone(),
        );
        Fixture {
            ledger,
            delivery,
            router,
        }
    }

    const CLASSIFY_CREATE: &str = r#"{"operation": "CREATE", "confidence": 0.9}"#;
    const PARSE_PAYMENT: &str = r#"{"intent": "payment", "stud_id": "STU001", "name": "", "installment_amount": "4000", "date": "", "mode": "", "remarks": ""}"#;

    #[tokio::test]
    async fn test_write_flow_confirm_and_commit() {
        let f = fixture(vec![CLASSIFY_CREATE, PARSE_PAYMENT]).await;

        f.router.handle_message(SENDER, "STU001 paid 4000").await.unwrap();
        let preview = f.delivery.last_to(SENDER).unwrap();
        assert!(preview.contains("Confirmation Required"), "{preview}");
        assert!(preview.contains("Current Balance: ₹40000"));
        assert!(preview.contains("New Balance: ₹36000"));

        // Nothing committed until the reply
        assert!(f.ledger.installments_for("STU001").await.unwrap().is_empty());

        f.router.handle_message(SENDER, "yes").await.unwrap();
        let summary = f.delivery.last_to(SENDER).unwrap();
        assert!(summary.contains("Data processed successfully"), "{summary}");

        let account = f.ledger.fee_account("STU001").await.unwrap().unwrap();
        assert_eq!(account.total_paid, 4000.0);
        assert_eq!(account.balance, 36000.0);
        assert_eq!(account.status, FeeStatus::Partial);

        let logs = f.ledger.logs();
        assert!(logs.iter().any(|l| l.action == LogAction::ConfirmationRequested
            && l.result == LogResult::Pending));
        assert!(logs.iter().any(|l| l.action == LogAction::AddInstallment
            && l.result == LogResult::Success));
    }

    #[tokio::test]
    async fn test_ambiguous_reply_reprompts_then_no_cancels() {
        let f = fixture(vec![CLASSIFY_CREATE, PARSE_PAYMENT]).await;
        f.router.handle_message(SENDER, "STU001 paid 4000").await.unwrap();

        f.router.handle_message(SENDER, "maybe").await.unwrap();
        assert!(f.delivery.last_to(SENDER).unwrap().contains("reply *YES*"));

        f.router.handle_message(SENDER, "no").await.unwrap();
        assert!(f.delivery.last_to(SENDER).unwrap().contains("Operation cancelled"));
        assert!(f.ledger.installments_for("STU001").await.unwrap().is_empty());

        // The slot is free again: the next message is classified, not
        // treated as a reply (the mock has no responses left, so the
        // classifier falls back to READ and the read fallback answers).
        f.router.handle_message(SENDER, "show STU001").await.unwrap();
        let reply = f.delivery.last_to(SENDER).unwrap();
        assert!(reply.contains("Student Details"), "{reply}");
    }

    #[tokio::test]
    async fn test_validation_failure_never_creates_confirmation() {
        let parse_no_student =
            r#"{"intent": "payment", "stud_id": "", "name": "", "installment_amount": "4000"}"#;
        let f = fixture(vec![CLASSIFY_CREATE, parse_no_student]).await;

        f.router.handle_message(SENDER, "paid 4000").await.unwrap();
        let reply = f.delivery.last_to(SENDER).unwrap();
        assert!(reply.contains("Invalid Request"), "{reply}");
        assert!(reply.contains("Student ID"));

        // "yes" afterwards must not commit anything
        f.router.handle_message(SENDER, "yes").await.unwrap();
        assert!(f.ledger.installments_for("STU001").await.unwrap().is_empty());
        assert!(
            f.ledger
                .logs()
                .iter()
                .any(|l| l.action == LogAction::ValidationFailed)
        );
    }

    #[tokio::test]
    async fn test_parse_failure_logs_and_apologizes() {
        let f = fixture(vec![CLASSIFY_CREATE, "this is not json"]).await;
        f.router.handle_message(SENDER, "add something odd").await.unwrap();

        let reply = f.delivery.last_to(SENDER).unwrap();
        assert!(reply.contains("couldn't understand"), "{reply}");
        let logs = f.ledger.logs();
        let parse_log = logs
            .iter()
            .find(|l| l.action == LogAction::ParseError)
            .expect("parse_error log row");
        assert_eq!(parse_log.raw_message, "add something odd");
        assert_eq!(parse_log.result, LogResult::Fail);
    }

    #[tokio::test]
    async fn test_read_flow_answers_without_confirmation() {
        let classify_read = r#"{"operation": "READ", "confidence": 0.9}"#;
        let read_parse = r#"{"query_type": "fee_status", "parameters": {"stud_id": "STU001"}}"#;
        let f = fixture(vec![classify_read, read_parse]).await;

        f.router.handle_message(SENDER, "fee status of STU001").await.unwrap();
        let reply = f.delivery.last_to(SENDER).unwrap();
        assert!(reply.contains("Fee Status for Rahul Pandey"), "{reply}");
    }

    #[tokio::test]
    async fn test_remind_specific_without_id_prompts() {
        let classify = r#"{"operation": "REMIND_SPECIFIC", "confidence": 0.8}"#;
        let f = fixture(vec![classify]).await;
        f.router.handle_message(SENDER, "send a reminder").await.unwrap();
        assert!(f.delivery.last_to(SENDER).unwrap().contains("specify a student ID"));
    }

    #[tokio::test]
    async fn test_remind_specific_sends_to_guardian() {
        let classify = r#"{"operation": "REMIND_SPECIFIC", "confidence": 0.9, "student_id": "STU001"}"#;
        let f = fixture(vec![classify]).await;
        f.router.handle_message(SENDER, "remind STU001").await.unwrap();

        // Guardian got the reminder, sender got the outcome summary
        assert!(f.delivery.last_to("919999999999").unwrap().contains("Fee Reminder"));
        assert!(f.delivery.last_to(SENDER).unwrap().contains("Reminder sent successfully"));
    }

    #[tokio::test]
    async fn test_confirmation_short_circuit_never_calls_llm() {
        let f = fixture(vec![CLASSIFY_CREATE, PARSE_PAYMENT]).await;
        f.router.handle_message(SENDER, "STU001 paid 4000").await.unwrap();

        // Both scripted responses are consumed; the reply below would
        // error if it reached the model, but the short-circuit answers
        // it lexically.
        f.router.handle_message(SENDER, "yes").await.unwrap();
        let summary = f.delivery.last_to(SENDER).unwrap();
        assert!(summary.contains("Data processed successfully"), "{summary}");
    }
}
