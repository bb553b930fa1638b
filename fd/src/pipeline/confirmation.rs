//! Confirmation state machine
//!
//! Holds at most one pending write proposal per sender. A new proposal
//! overwrites the old one (last request wins); yes/no consumes the
//! entry; any other reply leaves it untouched. Entries carry their
//! creation time and are treated as cancelled once older than the
//! configured TTL, so an abandoned proposal cannot block a sender
//! forever.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use feeledger::LedgerStore;

use crate::pipeline::changeset::{ChangeSet, WriteIntent};
use crate::pipeline::classifier::{ConfirmationReply, Operation};

/// One in-flight write proposal.
#[derive(Debug, Clone)]
pub struct PendingConfirmation {
    pub id: String,
    pub change_set: ChangeSet,
    pub operation: Operation,
    pub created_at: DateTime<Utc>,
}

/// What a sender's pending slot looks like right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingState {
    None,
    Active,
    /// The entry outlived the TTL; it has been removed.
    Expired,
}

/// Outcome of feeding a reply into the state machine.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// "yes" - the proposal is released for execution.
    Confirmed(PendingConfirmation),
    /// "no" - the proposal is dropped, nothing mutates.
    Cancelled,
    /// Anything else - the entry stays put, re-prompt the sender.
    Unrecognized,
    /// No entry for this sender (consumed or never created).
    NothingPending,
}

/// Keyed store of pending confirmations, one slot per sender.
pub struct ConfirmationStore {
    entries: Mutex<HashMap<String, PendingConfirmation>>,
    /// `None` disables expiry.
    ttl: Option<Duration>,
}

impl ConfirmationStore {
    /// `ttl_minutes` of 0 disables expiry.
    pub fn new(ttl_minutes: u64) -> Self {
        let ttl = if ttl_minutes == 0 {
            None
        } else {
            Some(Duration::minutes(ttl_minutes as i64))
        };
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    fn is_expired(&self, pending: &PendingConfirmation) -> bool {
        match self.ttl {
            Some(ttl) => Utc::now() - pending.created_at > ttl,
            None => false,
        }
    }

    /// Store a proposal for `sender`, overwriting any previous one.
    pub fn request(
        &self,
        sender: &str,
        change_set: ChangeSet,
        operation: Operation,
    ) -> PendingConfirmation {
        let pending = PendingConfirmation {
            id: Uuid::now_v7().to_string(),
            change_set,
            operation,
            created_at: Utc::now(),
        };
        let mut entries = self.entries.lock().expect("confirmation store poisoned");
        if entries.insert(sender.to_string(), pending.clone()).is_some() {
            info!(%sender, "previous pending confirmation overwritten");
        }
        debug!(%sender, id = %pending.id, "confirmation requested");
        pending
    }

    /// Check the sender's slot, evicting an expired entry.
    pub fn state(&self, sender: &str) -> PendingState {
        let mut entries = self.entries.lock().expect("confirmation store poisoned");
        match entries.get(sender) {
            None => PendingState::None,
            Some(pending) if self.is_expired(pending) => {
                entries.remove(sender);
                info!(%sender, "pending confirmation expired");
                PendingState::Expired
            }
            Some(_) => PendingState::Active,
        }
    }

    /// Apply a reply to the sender's pending entry.
    pub fn resolve(&self, sender: &str, reply: ConfirmationReply) -> Resolution {
        let mut entries = self.entries.lock().expect("confirmation store poisoned");
        match reply {
            ConfirmationReply::Yes => match entries.remove(sender) {
                Some(pending) => {
                    debug!(%sender, id = %pending.id, "confirmation accepted");
                    Resolution::Confirmed(pending)
                }
                None => Resolution::NothingPending,
            },
            ConfirmationReply::No => match entries.remove(sender) {
                Some(_) => {
                    debug!(%sender, "confirmation cancelled");
                    Resolution::Cancelled
                }
                None => Resolution::NothingPending,
            },
            ConfirmationReply::Invalid => {
                if entries.contains_key(sender) {
                    Resolution::Unrecognized
                } else {
                    Resolution::NothingPending
                }
            }
        }
    }

    #[cfg(test)]
    fn backdate(&self, sender: &str, minutes: i64) {
        let mut entries = self.entries.lock().expect("confirmation store poisoned");
        if let Some(pending) = entries.get_mut(sender) {
            pending.created_at = Utc::now() - Duration::minutes(minutes);
        }
    }
}

/// Render the confirmation preview for a proposal.
///
/// Resolves live ledger context where it can: a payment preview shows
/// the student's current and post-payment balance even though nothing
/// is persisted yet. Falls back to echoing the raw fields when the
/// lookup fails.
pub async fn render_preview(change_set: &ChangeSet, ledger: &dyn LedgerStore) -> String {
    let mut lines = vec!["⚠️ *Confirmation Required*".to_string(), String::new()];

    for intent in &change_set.intents {
        match intent {
            WriteIntent::Payment(payment) => {
                lines.push("You are about to record a payment:".to_string());
                lines.push(String::new());

                let student = if !payment.stud_id.is_empty() {
                    ledger.find_student(&payment.stud_id).await.ok().flatten()
                } else {
                    ledger.find_student_by_name(&payment.name).await.ok().flatten()
                };

                match student {
                    Some(student) => {
                        lines.push(format!("👨‍🎓 Student: {} ({})", student.name, student.stud_id));
                        lines.push(format!("💰 Amount: ₹{}", payment.amount));
                        let account = ledger.fee_account(&student.stud_id).await.ok().flatten();
                        if let Some(account) = account {
                            let amount = payment.amount.trim().parse::<f64>().unwrap_or(0.0);
                            lines.push(format!("📊 Current Balance: ₹{}", display_amount(account.balance)));
                            lines.push(format!(
                                "📉 New Balance: ₹{}",
                                display_amount(account.balance - amount)
                            ));
                        }
                    }
                    None => {
                        lines.push(format!("👨‍🎓 Student: {}", payment.student_ref()));
                        lines.push(format!("💰 Amount: ₹{}", payment.amount));
                    }
                }
            }
            WriteIntent::NewStudent(student) => {
                lines.push("You are about to add a new student:".to_string());
                lines.push(String::new());
                lines.push(format!("👨‍🎓 Name: {}", student.name));
                lines.push(format!("📚 Class: {}", student.class));
                if !student.parent_name.is_empty() {
                    lines.push(format!("👪 Parent: {}", student.parent_name));
                }
                if !student.parent_no.is_empty() {
                    lines.push(format!("📞 Parent No: {}", student.parent_no));
                }
                lines.push(format!("💰 Total Fees: ₹{}", student.total_fees));
            }
        }
        lines.push(String::new());
    }

    lines.push("Reply *YES* to confirm or *NO* to cancel.".to_string());
    lines.join("\n")
}

/// Format a rupee amount without a trailing `.0` for whole values.
pub fn display_amount(amount: f64) -> String {
    if amount.fract() == 0.0 {
        format!("{}", amount as i64)
    } else {
        format!("{amount}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::changeset::PaymentIntent;
    use feeledger::{MemoryStore, NewStudent};
    use std::sync::Arc;

    fn payment_change_set(stud_id: &str, amount: &str) -> ChangeSet {
        ChangeSet::single(
            WriteIntent::Payment(PaymentIntent {
                stud_id: stud_id.to_string(),
                amount: amount.to_string(),
                ..Default::default()
            }),
            format!("{stud_id} paid {amount}"),
        )
    }

    #[test]
    fn test_yes_consumes_and_returns_data() {
        let store = ConfirmationStore::new(15);
        let change_set = payment_change_set("STU001", "4000");
        store.request("919999", change_set.clone(), Operation::Create);

        assert_eq!(store.state("919999"), PendingState::Active);
        match store.resolve("919999", ConfirmationReply::Yes) {
            Resolution::Confirmed(pending) => assert_eq!(pending.change_set, change_set),
            other => panic!("expected Confirmed, got {other:?}"),
        }
        assert_eq!(store.state("919999"), PendingState::None);
    }

    #[test]
    fn test_no_consumes_without_data() {
        let store = ConfirmationStore::new(15);
        store.request("919999", payment_change_set("STU001", "4000"), Operation::Create);
        assert!(matches!(
            store.resolve("919999", ConfirmationReply::No),
            Resolution::Cancelled
        ));
        assert_eq!(store.state("919999"), PendingState::None);
    }

    #[test]
    fn test_invalid_reply_leaves_entry_intact() {
        let store = ConfirmationStore::new(15);
        store.request("919999", payment_change_set("STU001", "4000"), Operation::Create);
        assert!(matches!(
            store.resolve("919999", ConfirmationReply::Invalid),
            Resolution::Unrecognized
        ));
        assert_eq!(store.state("919999"), PendingState::Active);
    }

    #[test]
    fn test_second_request_overwrites_first() {
        let store = ConfirmationStore::new(15);
        store.request("919999", payment_change_set("STU001", "4000"), Operation::Create);
        store.request("919999", payment_change_set("STU002", "700"), Operation::Create);

        match store.resolve("919999", ConfirmationReply::Yes) {
            Resolution::Confirmed(pending) => {
                assert_eq!(pending.change_set.primary_student_id(), "STU002");
            }
            other => panic!("expected Confirmed, got {other:?}"),
        }
        // Only one slot per sender: nothing left after the resolve
        assert!(matches!(
            store.resolve("919999", ConfirmationReply::Yes),
            Resolution::NothingPending
        ));
    }

    #[test]
    fn test_senders_do_not_share_slots() {
        let store = ConfirmationStore::new(15);
        store.request("alice", payment_change_set("STU001", "100"), Operation::Create);
        assert_eq!(store.state("bob"), PendingState::None);
        assert_eq!(store.state("alice"), PendingState::Active);
    }

    #[test]
    fn test_expired_entry_is_cancelled_on_access() {
        let store = ConfirmationStore::new(15);
        store.request("919999", payment_change_set("STU001", "4000"), Operation::Create);
        store.backdate("919999", 16);

        assert_eq!(store.state("919999"), PendingState::Expired);
        // Evicted: subsequent checks see an empty slot
        assert_eq!(store.state("919999"), PendingState::None);
    }

    #[test]
    fn test_zero_ttl_never_expires() {
        let store = ConfirmationStore::new(0);
        store.request("919999", payment_change_set("STU001", "4000"), Operation::Create);
        store.backdate("919999", 60 * 24 * 365);
        assert_eq!(store.state("919999"), PendingState::Active);
    }

    #[tokio::test]
    async fn test_preview_shows_live_balance() {
        let ledger = Arc::new(MemoryStore::new());
        let student = ledger
            .add_student(NewStudent {
                name: "Rahul Pandey".to_string(),
                class: "12".to_string(),
                total_fees: 40000.0,
                ..Default::default()
            })
            .await
            .unwrap();
        ledger.seed_fee_account(&student, 40000.0).await.unwrap();

        let preview = render_preview(&payment_change_set("STU001", "4000"), ledger.as_ref()).await;
        assert!(preview.contains("Current Balance: ₹40000"), "{preview}");
        assert!(preview.contains("New Balance: ₹36000"), "{preview}");
        assert!(preview.contains("Rahul Pandey (STU001)"));
    }

    #[tokio::test]
    async fn test_preview_falls_back_to_raw_echo() {
        let ledger = MemoryStore::new();
        let preview = render_preview(&payment_change_set("STU404", "4000"), &ledger).await;
        assert!(preview.contains("Student: STU404"), "{preview}");
        assert!(preview.contains("Amount: ₹4000"));
        assert!(!preview.contains("Current Balance"));
    }
}
