//! Fee reminder service
//!
//! Formats and sends the templated reminder to one guardian or all of
//! them, returning the summary text the requesting staff member sees.
//! Guardian numbers are normalized with the configured country code.

use std::sync::Arc;

use tracing::{debug, info, warn};

use feeledger::{LedgerStore, LogAction, LogResult, NewLog, Student};

use super::adapter::{DeliveryAdapter, DeliveryError};
use crate::pipeline::confirmation::display_amount;

pub struct ReminderService {
    ledger: Arc<dyn LedgerStore>,
    delivery: Arc<dyn DeliveryAdapter>,
    school_name: String,
    payment_base_url: String,
    country_code: String,
}

impl ReminderService {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        delivery: Arc<dyn DeliveryAdapter>,
        school_name: impl Into<String>,
        payment_base_url: impl Into<String>,
        country_code: impl Into<String>,
    ) -> Self {
        Self {
            ledger,
            delivery,
            school_name: school_name.into(),
            payment_base_url: payment_base_url.into(),
            country_code: country_code.into(),
        }
    }

    /// Prefix the country code unless the number already carries it.
    fn format_phone(&self, phone: &str) -> Option<String> {
        let clean = phone.trim();
        if clean.is_empty() {
            return None;
        }
        if clean.starts_with(&self.country_code) {
            Some(clean.to_string())
        } else {
            Some(format!("{}{}", self.country_code, clean))
        }
    }

    fn reminder_message(&self, student: &Student, balance: Option<f64>) -> String {
        let balance_line = match balance {
            Some(b) => format!("₹{}", display_amount(b)),
            None => "Contact school".to_string(),
        };
        let payment_link = format!("{}/payments/{}", self.payment_base_url, student.stud_id);
        format!(
            "🔔 *Fee Reminder - {school}*\n\n\
             Dear Parent,\n\n\
             This is a gentle reminder regarding the fee payment for:\n\n\
             👨‍🎓 *Student:* {name}\n\
             🆔 *ID:* {id}\n\
             📚 *Class:* {class}\n\
             💰 *Outstanding Amount:* {balance}\n\n\
             💳 *Quick Payment Link:*\n{link}\n\n\
             🚀 *Pay instantly via:*\n\
             • Credit/Debit Card\n\
             • UPI (Google Pay, PhonePe, Paytm)\n\
             • Net Banking\n\n\
             For any queries, please contact the school office.\n\n\
             Thank you for your cooperation.\n\n\
             *{school} Management*",
            school = self.school_name,
            name = student.name,
            id = student.stud_id,
            class = student.class,
            balance = balance_line,
            link = payment_link,
        )
    }

    async fn balance_for(&self, stud_id: &str) -> Option<f64> {
        self.ledger
            .fee_account(stud_id)
            .await
            .ok()
            .flatten()
            .map(|account| account.balance)
    }

    async fn log_reminder(&self, stud_id: &str, result: LogResult, error: String) {
        let log = NewLog::new(LogAction::Reminder, result, "system")
            .with_student(stud_id)
            .with_error(error);
        if let Err(e) = self.ledger.append_log(log).await {
            warn!(error = %e, "failed to log reminder");
        }
    }

    /// Send the reminder to every student's guardian. Returns the
    /// summary text for the requesting sender.
    pub async fn remind_all(&self) -> String {
        let students = match self.ledger.all_students().await {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "remind_all: student listing failed");
                return "❌ Failed to send reminders to all students".to_string();
            }
        };
        if students.is_empty() {
            return "❌ No students found".to_string();
        }

        info!(count = students.len(), "remind_all: starting");
        let mut success_count = 0usize;
        let mut fail_count = 0usize;
        let mut error_details: Vec<String> = Vec::new();

        for student in &students {
            let Some(number) = self.format_phone(&student.parent_no) else {
                fail_count += 1;
                error_details.push(format!("{}: No parent number available", student.name));
                continue;
            };

            let balance = self.balance_for(&student.stud_id).await;
            let message = self.reminder_message(student, balance);
            match self.delivery.send_text(&number, &message).await {
                Ok(()) => {
                    debug!(stud_id = %student.stud_id, "reminder sent");
                    success_count += 1;
                }
                Err(DeliveryError::RecipientNotAllowed(_)) => {
                    fail_count += 1;
                    error_details.push(format!("{}: Phone not in allowed list", student.name));
                }
                Err(e) => {
                    fail_count += 1;
                    error_details.push(format!("{}: {}", student.name, e));
                }
            }
        }

        let result = if fail_count == 0 {
            LogResult::Success
        } else if success_count > 0 {
            LogResult::Partial
        } else {
            LogResult::Fail
        };
        self.log_reminder("", result, error_details.join("; ")).await;

        let mut response = format!(
            "📢 Reminder process completed\n\n📊 Summary:\n• Total Students: {}\n• Successful: {}\n• Failed: {}",
            students.len(),
            success_count,
            fail_count
        );
        if !error_details.is_empty() {
            response.push_str("\n\n❌ Errors:\n");
            response.push_str(
                &error_details
                    .iter()
                    .take(5)
                    .map(|d| format!("• {d}"))
                    .collect::<Vec<_>>()
                    .join("\n"),
            );
            if error_details.len() > 5 {
                response.push_str(&format!("\n• ... and {} more errors", error_details.len() - 5));
            }
        }
        response
    }

    /// Send the reminder for one student. Returns the outcome text.
    pub async fn remind_one(&self, stud_id: &str) -> String {
        let student = match self.ledger.find_student(stud_id).await {
            Ok(Some(s)) => s,
            Ok(None) => return format!("❌ Student {stud_id} not found"),
            Err(e) => {
                warn!(error = %e, "remind_one: lookup failed");
                return "❌ Failed to process reminder request".to_string();
            }
        };

        let Some(number) = self.format_phone(&student.parent_no) else {
            return format!(
                "❌ No parent number available for {} ({})",
                student.name, student.stud_id
            );
        };

        let balance = self.balance_for(&student.stud_id).await;
        let message = self.reminder_message(&student, balance);
        match self.delivery.send_text(&number, &message).await {
            Ok(()) => {
                self.log_reminder(&student.stud_id, LogResult::Success, String::new()).await;
                format!(
                    "✅ Reminder sent successfully\n\n👨‍🎓 Student: {}\n🆔 ID: {}\n📚 Class: {}\n📞 Parent Number: {}",
                    student.name, student.stud_id, student.class, number
                )
            }
            Err(DeliveryError::RecipientNotAllowed(_)) => {
                self.log_reminder(&student.stud_id, LogResult::Fail, "recipient not allowed".to_string())
                    .await;
                format!(
                    "❌ Cannot send reminder to {}\n\nReason: Parent's phone number ({}) is not in the WhatsApp Business allowed list.\n\n💡 To fix this:\n1. Add {} to your allowed recipients\n2. Or use a verified phone number",
                    student.name, number, number
                )
            }
            Err(e) => {
                self.log_reminder(&student.stud_id, LogResult::Fail, e.to_string()).await;
                format!("❌ Failed to send reminder to {}\n\nError: {}", student.name, e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::adapter::recording::RecordingDelivery;
    use feeledger::{MemoryStore, NewStudent};

    async fn seed(store: &MemoryStore, name: &str, parent_no: &str, total_fees: f64) {
        let student = store
            .add_student(NewStudent {
                name: name.to_string(),
                class: "10".to_string(),
                parent_no: parent_no.to_string(),
                total_fees,
                ..Default::default()
            })
            .await
            .unwrap();
        store.seed_fee_account(&student, total_fees).await.unwrap();
    }

    fn service(
        ledger: Arc<MemoryStore>,
        delivery: Arc<RecordingDelivery>,
    ) -> ReminderService {
        ReminderService::new(
            ledger,
            delivery,
            "Sunrise Public School",
            "https://fees.example.com",
            "91",
        )
    }

    #[tokio::test]
    async fn test_remind_one_formats_number_and_link() {
        let ledger = Arc::new(MemoryStore::new());
        seed(&ledger, "Rahul Pandey", "9999999999", 40000.0).await;
        let delivery = Arc::new(RecordingDelivery::new());
        let svc = service(ledger, delivery.clone());

        let reply = svc.remind_one("STU001").await;
        assert!(reply.contains("Reminder sent successfully"), "{reply}");
        assert!(reply.contains("919999999999"));

        let body = delivery.last_to("919999999999").unwrap();
        assert!(body.contains("Outstanding Amount:* ₹40000"));
        assert!(body.contains("https://fees.example.com/payments/STU001"));
        assert!(body.contains("Sunrise Public School"));
    }

    #[tokio::test]
    async fn test_remind_one_unknown_student() {
        let svc = service(Arc::new(MemoryStore::new()), Arc::new(RecordingDelivery::new()));
        assert_eq!(svc.remind_one("STU404").await, "❌ Student STU404 not found");
    }

    #[tokio::test]
    async fn test_remind_one_missing_number() {
        let ledger = Arc::new(MemoryStore::new());
        seed(&ledger, "Rahul", "", 1000.0).await;
        let svc = service(ledger, Arc::new(RecordingDelivery::new()));
        let reply = svc.remind_one("STU001").await;
        assert!(reply.contains("No parent number available"), "{reply}");
    }

    #[tokio::test]
    async fn test_remind_all_summarizes_failures() {
        let ledger = Arc::new(MemoryStore::new());
        seed(&ledger, "Rahul", "9999999999", 1000.0).await;
        seed(&ledger, "Priya", "", 2000.0).await;
        seed(&ledger, "Aman", "7777777777", 3000.0).await;
        let delivery = Arc::new(RecordingDelivery::blocking(vec!["917777777777"]));
        let svc = service(ledger.clone(), delivery.clone());

        let reply = svc.remind_all().await;
        assert!(reply.contains("Total Students: 3"), "{reply}");
        assert!(reply.contains("Successful: 1"));
        assert!(reply.contains("Failed: 2"));
        assert!(reply.contains("Priya: No parent number available"));
        assert!(reply.contains("Aman: Phone not in allowed list"));

        // Exactly one reminder actually went out
        assert_eq!(delivery.sent().len(), 1);
        // And the run left an audit row
        assert!(ledger.logs().iter().any(|l| l.action == LogAction::Reminder));
    }

    #[tokio::test]
    async fn test_country_code_not_doubled() {
        let ledger = Arc::new(MemoryStore::new());
        seed(&ledger, "Rahul", "919999999999", 1000.0).await;
        let delivery = Arc::new(RecordingDelivery::new());
        let svc = service(ledger, delivery.clone());
        svc.remind_one("STU001").await;
        assert!(delivery.last_to("919999999999").is_some());
    }
}
