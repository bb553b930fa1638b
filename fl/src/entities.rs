//! Ledger entity types
//!
//! Row types for the four ledger collections. Monetary fields are rupees
//! as `f64`; the spreadsheet adapter converts to and from cell text.
//! Timestamps stay as the strings the backend stores (RFC 3339 for
//! `created_at`, `YYYY-MM-DD` for installment dates).

use serde::{Deserialize, Serialize};

/// A student row. `stud_id` is assigned on create and immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub stud_id: String,
    pub name: String,
    pub class: String,
    pub parent_name: String,
    pub parent_no: String,
    pub phone_no: String,
    pub email: String,
    pub created_at: String,
}

/// Input for creating a student. The store assigns `stud_id` and
/// `created_at`; `total_fees` seeds the fee account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewStudent {
    pub name: String,
    pub class: String,
    pub parent_name: String,
    pub parent_no: String,
    pub phone_no: String,
    pub email: String,
    pub total_fees: f64,
}

/// Derived fee aggregate, one-to-one with a student.
///
/// Always a pure function of `total_fees` and the student's installment
/// set: recomputed from the installment rows, never incremented in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeAccount {
    pub stud_id: String,
    pub name: String,
    pub class: String,
    pub total_fees: f64,
    pub total_paid: f64,
    pub balance: f64,
    pub status: FeeStatus,
}

/// Fee account status. `Unpaid` is the creation seed; the derived set
/// after any recompute is `Paid`/`Partial`/`Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeeStatus {
    Unpaid,
    Paid,
    Partial,
    Pending,
}

impl FeeStatus {
    /// Derive status from a recomputed aggregate.
    pub fn derive(total_paid: f64, balance: f64) -> Self {
        if balance <= 0.0 {
            FeeStatus::Paid
        } else if total_paid > 0.0 {
            FeeStatus::Partial
        } else {
            FeeStatus::Pending
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FeeStatus::Unpaid => "unpaid",
            FeeStatus::Paid => "Paid",
            FeeStatus::Partial => "Partial",
            FeeStatus::Pending => "Pending",
        }
    }

    /// Parse a status cell. Unknown text maps to `Pending`.
    pub fn from_cell(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "unpaid" => FeeStatus::Unpaid,
            "paid" => FeeStatus::Paid,
            "partial" => FeeStatus::Partial,
            _ => FeeStatus::Pending,
        }
    }
}

impl std::fmt::Display for FeeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An installment (payment) row. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Installment {
    pub inst_id: String,
    pub stud_id: String,
    pub name: String,
    pub class: String,
    pub amount: f64,
    pub date: String,
    pub mode: String,
    pub remarks: String,
    pub recorded_by: String,
    pub created_at: String,
}

/// Input for recording an installment. The store assigns `inst_id` and
/// `created_at`; the caller has already resolved the student and applied
/// the server-side defaults (date, mode, recorded_by).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewInstallment {
    pub stud_id: String,
    pub name: String,
    pub class: String,
    pub amount: f64,
    pub date: String,
    pub mode: String,
    pub remarks: String,
    pub recorded_by: String,
}

/// Audit action recorded with every state-changing attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogAction {
    AddStudent,
    AddInstallment,
    UpdateFeesSummary,
    ValidationFailed,
    ParseError,
    WebhookError,
    ConfirmationRequested,
    Reminder,
}

impl LogAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogAction::AddStudent => "add_student",
            LogAction::AddInstallment => "add_installment",
            LogAction::UpdateFeesSummary => "update_fees_summary",
            LogAction::ValidationFailed => "validation_failed",
            LogAction::ParseError => "parse_error",
            LogAction::WebhookError => "webhook_error",
            LogAction::ConfirmationRequested => "confirmation_requested",
            LogAction::Reminder => "reminder",
        }
    }
}

impl std::fmt::Display for LogAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome recorded on an audit row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogResult {
    Success,
    Fail,
    Partial,
    Pending,
}

impl LogResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogResult::Success => "success",
            LogResult::Fail => "fail",
            LogResult::Partial => "partial",
            LogResult::Pending => "pending",
        }
    }
}

impl std::fmt::Display for LogResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only audit record. The only durable trace of what happened
/// and why, written for successes and failures alike.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub log_id: String,
    pub action: LogAction,
    pub stud_id: String,
    pub raw_message: String,
    pub parsed_json: String,
    pub result: LogResult,
    pub error_msg: String,
    pub performed_by: String,
    pub timestamp: String,
}

/// Input for an audit row. The store assigns `log_id` and `timestamp`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLog {
    pub action: LogAction,
    pub stud_id: String,
    pub raw_message: String,
    pub parsed_json: String,
    pub result: LogResult,
    pub error_msg: String,
    pub performed_by: String,
}

impl NewLog {
    /// A minimal log row; callers fill in the optional context fields.
    pub fn new(action: LogAction, result: LogResult, performed_by: impl Into<String>) -> Self {
        Self {
            action,
            stud_id: String::new(),
            raw_message: String::new(),
            parsed_json: String::new(),
            result,
            error_msg: String::new(),
            performed_by: performed_by.into(),
        }
    }

    pub fn with_student(mut self, stud_id: impl Into<String>) -> Self {
        self.stud_id = stud_id.into();
        self
    }

    pub fn with_message(mut self, raw: impl Into<String>) -> Self {
        self.raw_message = raw.into();
        self
    }

    pub fn with_snapshot(mut self, parsed_json: impl Into<String>) -> Self {
        self.parsed_json = parsed_json.into();
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error_msg = error.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_derivation() {
        assert_eq!(FeeStatus::derive(0.0, 40000.0), FeeStatus::Pending);
        assert_eq!(FeeStatus::derive(4000.0, 36000.0), FeeStatus::Partial);
        assert_eq!(FeeStatus::derive(40000.0, 0.0), FeeStatus::Paid);
        // Overpayment still reads as paid
        assert_eq!(FeeStatus::derive(41000.0, -1000.0), FeeStatus::Paid);
    }

    #[test]
    fn test_status_cell_round_trip() {
        for status in [
            FeeStatus::Unpaid,
            FeeStatus::Paid,
            FeeStatus::Partial,
            FeeStatus::Pending,
        ] {
            assert_eq!(FeeStatus::from_cell(status.as_str()), status);
        }
        assert_eq!(FeeStatus::from_cell("garbage"), FeeStatus::Pending);
    }

    #[test]
    fn test_log_builder() {
        let log = NewLog::new(LogAction::AddInstallment, LogResult::Success, "staff01")
            .with_student("STU001")
            .with_message("STU001 paid 4000");
        assert_eq!(log.stud_id, "STU001");
        assert_eq!(log.action.as_str(), "add_installment");
        assert_eq!(log.result.as_str(), "success");
    }
}
