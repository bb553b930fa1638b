//! Ledger mutation service
//!
//! The only place state is actually mutated. Applies a validated,
//! confirmed change-set in fixed order (students before payments, so a
//! payment can reference a just-created student), recomputes the fee
//! aggregate from the installment rows after every payment, and writes
//! an audit row for every attempt.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use feeledger::{
    FeeAccount, FeeStatus, LedgerStore, LogAction, LogResult, NewInstallment, NewLog, NewStudent,
};

use crate::pipeline::changeset::{ChangeSet, NewStudentIntent, PaymentIntent, WriteIntent};
use crate::pipeline::confirmation::display_amount;

/// Outcome of one row-level sub-operation.
#[derive(Debug, Clone)]
pub struct RowOutcome {
    pub success: bool,
    /// Human-readable line for the summary message.
    pub detail: String,
    pub error: Option<String>,
}

impl RowOutcome {
    fn ok(detail: impl Into<String>) -> Self {
        Self {
            success: true,
            detail: detail.into(),
            error: None,
        }
    }

    fn fail(detail: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            detail: detail.into(),
            error: Some(error.into()),
        }
    }
}

/// Per-row outcomes of applying a change-set.
/// `success` holds iff every sub-operation succeeded.
#[derive(Debug, Clone, Default)]
pub struct MutationReport {
    pub students: Vec<RowOutcome>,
    pub installments: Vec<RowOutcome>,
}

impl MutationReport {
    pub fn success(&self) -> bool {
        self.students.iter().chain(&self.installments).all(|r| r.success)
    }

    /// Render the WhatsApp summary for this report.
    pub fn summary_message(&self) -> String {
        let mut message = if self.success() {
            "✅ *Data processed successfully!*\n\n".to_string()
        } else {
            "⚠️ *Request processed with errors*\n\n".to_string()
        };

        let added_students: Vec<_> = self.students.iter().filter(|r| r.success).collect();
        if !added_students.is_empty() {
            message.push_str("👨‍🎓 *Students Added:*\n");
            for row in added_students {
                message.push_str(&format!("• {}\n", row.detail));
            }
            message.push('\n');
        }

        let added_installments: Vec<_> = self.installments.iter().filter(|r| r.success).collect();
        if !added_installments.is_empty() {
            message.push_str("💰 *Installments Added:*\n");
            for row in added_installments {
                message.push_str(&format!("• {}\n", row.detail));
            }
            message.push('\n');
        }

        let failures: Vec<_> = self
            .students
            .iter()
            .chain(&self.installments)
            .filter(|r| !r.success)
            .collect();
        if !failures.is_empty() {
            message.push_str("❌ *Errors:*\n");
            for row in failures {
                message.push_str(&format!(
                    "• {}\n",
                    row.error.as_deref().unwrap_or("unknown error")
                ));
            }
            message.push('\n');
        }

        if self.success() {
            message.push_str("Data has been updated in the ledger! 📊");
        }
        message.trim_end().to_string()
    }
}

/// Applies change-sets to the ledger.
pub struct MutationService {
    ledger: Arc<dyn LedgerStore>,
}

impl MutationService {
    pub fn new(ledger: Arc<dyn LedgerStore>) -> Self {
        Self { ledger }
    }

    /// Apply a validated change-set on behalf of `actor`.
    ///
    /// Row-level failures are isolated: one bad row never aborts its
    /// siblings. Nothing here deduplicates a logically repeated payment;
    /// that burden stays with the caller.
    pub async fn apply(&self, change_set: &ChangeSet, actor: &str) -> MutationReport {
        debug!(intents = change_set.intents.len(), %actor, "apply: called");
        let mut report = MutationReport::default();

        // Students first: a payment may reference a student created in
        // this same change-set by name.
        for intent in &change_set.intents {
            if let WriteIntent::NewStudent(student) = intent {
                report
                    .students
                    .push(self.create_student(student, &change_set.source, actor).await);
            }
        }
        for intent in &change_set.intents {
            if let WriteIntent::Payment(payment) = intent {
                report
                    .installments
                    .push(self.record_payment(payment, &change_set.source, actor).await);
            }
        }

        info!(success = report.success(), "apply: done");
        report
    }

    async fn create_student(&self, intent: &NewStudentIntent, source: &str, actor: &str) -> RowOutcome {
        let total_fees = intent.total_fees.trim().parse::<f64>().unwrap_or(0.0);
        let new_student = NewStudent {
            name: intent.name.clone(),
            class: intent.class.clone(),
            parent_name: intent.parent_name.clone(),
            parent_no: intent.parent_no.clone(),
            phone_no: intent.phone_no.clone(),
            email: intent.email.clone(),
            total_fees,
        };

        let student = match self.ledger.add_student(new_student).await {
            Ok(s) => s,
            Err(e) => {
                error!(error = %e, name = %intent.name, "create_student: failed");
                self.log(
                    NewLog::new(LogAction::AddStudent, LogResult::Fail, actor)
                        .with_message(source)
                        .with_error(e.to_string()),
                )
                .await;
                return RowOutcome::fail(
                    intent.name.clone(),
                    format!("Failed to create student {}: {}", intent.name, e),
                );
            }
        };

        if let Err(e) = self.ledger.seed_fee_account(&student, total_fees).await {
            error!(error = %e, stud_id = %student.stud_id, "create_student: fee seed failed");
            self.log(
                NewLog::new(LogAction::AddStudent, LogResult::Partial, actor)
                    .with_student(&student.stud_id)
                    .with_message(source)
                    .with_error(e.to_string()),
            )
            .await;
            return RowOutcome::fail(
                format!("{} ({})", student.name, student.stud_id),
                format!("Student {} created but fee account failed: {}", student.stud_id, e),
            );
        }

        self.log(
            NewLog::new(LogAction::AddStudent, LogResult::Success, actor)
                .with_student(&student.stud_id)
                .with_message(format!("Student {} created", student.name))
                .with_snapshot(serde_json::to_string(intent).unwrap_or_default()),
        )
        .await;

        RowOutcome::ok(format!("{} ({})", student.name, student.stud_id))
    }

    async fn record_payment(&self, intent: &PaymentIntent, source: &str, actor: &str) -> RowOutcome {
        // Id wins over name when both are present.
        let student = if !intent.stud_id.trim().is_empty() {
            self.ledger.find_student(intent.stud_id.trim()).await
        } else {
            self.ledger.find_student_by_name(&intent.name).await
        };

        let student = match student {
            Ok(Some(s)) => s,
            Ok(None) => {
                let message = format!("Student {} not found", intent.student_ref());
                warn!(student = %intent.student_ref(), "record_payment: student not found");
                self.log(
                    NewLog::new(LogAction::AddInstallment, LogResult::Fail, actor)
                        .with_student(&intent.stud_id)
                        .with_message(source)
                        .with_error(message.as_str()),
                )
                .await;
                return RowOutcome::fail(intent.student_ref(), message);
            }
            Err(e) => {
                error!(error = %e, "record_payment: lookup failed");
                self.log(
                    NewLog::new(LogAction::AddInstallment, LogResult::Fail, actor)
                        .with_message(source)
                        .with_error(e.to_string()),
                )
                .await;
                return RowOutcome::fail(intent.student_ref(), e.to_string());
            }
        };

        let amount = match intent.amount.trim().parse::<f64>() {
            Ok(a) if a > 0.0 => a,
            _ => {
                let message = format!("Invalid installment amount: {:?}", intent.amount);
                self.log(
                    NewLog::new(LogAction::AddInstallment, LogResult::Fail, actor)
                        .with_student(&student.stud_id)
                        .with_message(source)
                        .with_error(message.as_str()),
                )
                .await;
                return RowOutcome::fail(intent.student_ref(), message);
            }
        };

        // Server-side defaults; LLM-supplied blanks are never trusted.
        let date = if intent.date.trim().is_empty() {
            Utc::now().format("%Y-%m-%d").to_string()
        } else {
            intent.date.trim().to_string()
        };
        let mode = if intent.mode.trim().is_empty() {
            "cash".to_string()
        } else {
            intent.mode.trim().to_string()
        };

        let installment = NewInstallment {
            stud_id: student.stud_id.clone(),
            name: student.name.clone(),
            class: student.class.clone(),
            amount,
            date,
            mode,
            remarks: intent.remarks.clone(),
            recorded_by: actor.to_string(),
        };

        let row = match self.ledger.add_installment(installment).await {
            Ok(r) => r,
            Err(e) => {
                error!(error = %e, stud_id = %student.stud_id, "record_payment: append failed");
                self.log(
                    NewLog::new(LogAction::AddInstallment, LogResult::Fail, actor)
                        .with_student(&student.stud_id)
                        .with_message(source)
                        .with_error(e.to_string()),
                )
                .await;
                return RowOutcome::fail(intent.student_ref(), e.to_string());
            }
        };

        // Recompute from the installment rows; never increment in place.
        if let Err(e) = self.recompute_fee_account(&student.stud_id).await {
            warn!(error = %e, stud_id = %student.stud_id, "record_payment: recompute failed");
        }

        self.log(
            NewLog::new(LogAction::AddInstallment, LogResult::Success, actor)
                .with_student(&student.stud_id)
                .with_message(format!(
                    "Installment of ₹{} added for {}",
                    display_amount(amount),
                    student.name
                ))
                .with_snapshot(serde_json::to_string(intent).unwrap_or_default()),
        )
        .await;

        RowOutcome::ok(format!(
            "₹{} for {} ({})",
            display_amount(amount),
            student.name,
            row.stud_id
        ))
    }

    /// Rebuild a student's fee aggregate from their installment rows.
    ///
    /// Idempotent: with no new installments, a second run writes the
    /// same totals. Returns the recomputed account, or `None` when the
    /// student has no fee row to update.
    pub async fn recompute_fee_account(
        &self,
        stud_id: &str,
    ) -> feeledger::Result<Option<FeeAccount>> {
        let installments = self.ledger.installments_for(stud_id).await?;
        let total_paid: f64 = installments.iter().map(|i| i.amount).sum();

        let Some(account) = self.ledger.fee_account(stud_id).await? else {
            warn!(%stud_id, "recompute_fee_account: no fee row");
            return Ok(None);
        };

        let balance = account.total_fees - total_paid;
        let status = FeeStatus::derive(total_paid, balance);
        self.ledger
            .update_fee_totals(stud_id, total_paid, balance, status)
            .await?;

        debug!(%stud_id, total_paid, balance, %status, "recompute_fee_account: done");
        Ok(Some(FeeAccount {
            total_paid,
            balance,
            status,
            ..account
        }))
    }

    /// Append an audit row; failures are logged, never propagated.
    async fn log(&self, log: NewLog) {
        if let Err(e) = self.ledger.append_log(log).await {
            error!(error = %e, "failed to append audit log");
        }
    }
}
