//! The `LedgerStore` facade trait
//!
//! Single seam between the pipeline and persistence. The mutation path,
//! the read path, and confirmation previews all depend on this trait;
//! implementations are the in-memory store and the spreadsheet store.

use async_trait::async_trait;

use crate::entities::{
    FeeAccount, FeeStatus, Installment, LogEntry, NewInstallment, NewLog, NewStudent, Student,
};
use crate::error::Result;

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Append a student row. Assigns `stud_id` and `created_at`.
    async fn add_student(&self, student: NewStudent) -> Result<Student>;

    /// Look up a student by exact id.
    async fn find_student(&self, stud_id: &str) -> Result<Option<Student>>;

    /// Look up a student by name (case-insensitive, first match).
    async fn find_student_by_name(&self, name: &str) -> Result<Option<Student>>;

    async fn all_students(&self) -> Result<Vec<Student>>;

    async fn students_in_class(&self, class: &str) -> Result<Vec<Student>>;

    /// Seed the fee account written alongside a new student:
    /// total_paid 0, balance = total_fees, status unpaid.
    async fn seed_fee_account(&self, student: &Student, total_fees: f64) -> Result<()>;

    async fn fee_account(&self, stud_id: &str) -> Result<Option<FeeAccount>>;

    async fn all_fee_accounts(&self) -> Result<Vec<FeeAccount>>;

    /// Overwrite the derived aggregate columns of a student's fee row.
    async fn update_fee_totals(
        &self,
        stud_id: &str,
        total_paid: f64,
        balance: f64,
        status: FeeStatus,
    ) -> Result<()>;

    /// Append an installment row. Assigns `inst_id` and `created_at`.
    async fn add_installment(&self, installment: NewInstallment) -> Result<Installment>;

    async fn installments_for(&self, stud_id: &str) -> Result<Vec<Installment>>;

    /// Installments whose `date` column equals `date` (any student).
    async fn installments_on(&self, date: &str) -> Result<Vec<Installment>>;

    /// Append an audit row. Assigns `log_id` and `timestamp`.
    async fn append_log(&self, log: NewLog) -> Result<LogEntry>;
}
