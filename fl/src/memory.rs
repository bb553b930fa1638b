//! In-memory ledger store
//!
//! Backs tests and the CLI's `--memory` mode. Tables live behind one
//! mutex; id allocation shares the same counters the spreadsheet store
//! uses.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use crate::entities::{
    FeeAccount, FeeStatus, Installment, LogEntry, NewInstallment, NewLog, NewStudent, Student,
};
use crate::error::Result;
use crate::ids::{EntityKind, IdAllocator};
use crate::store::LedgerStore;

#[derive(Debug, Default)]
struct Tables {
    students: Vec<Student>,
    fees: Vec<FeeAccount>,
    installments: Vec<Installment>,
    logs: Vec<LogEntry>,
}

/// Mutex-guarded in-process ledger.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    ids: IdAllocator,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the audit log, for assertions.
    pub fn logs(&self) -> Vec<LogEntry> {
        self.tables.lock().expect("ledger tables poisoned").logs.clone()
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn add_student(&self, student: NewStudent) -> Result<Student> {
        let stud_id = self.ids.next(EntityKind::Student);
        debug!(%stud_id, name = %student.name, "add_student");
        let row = Student {
            stud_id,
            name: student.name,
            class: student.class,
            parent_name: student.parent_name,
            parent_no: student.parent_no,
            phone_no: student.phone_no,
            email: student.email,
            created_at: Utc::now().to_rfc3339(),
        };
        let mut tables = self.tables.lock().expect("ledger tables poisoned");
        tables.students.push(row.clone());
        Ok(row)
    }

    async fn find_student(&self, stud_id: &str) -> Result<Option<Student>> {
        let tables = self.tables.lock().expect("ledger tables poisoned");
        Ok(tables.students.iter().find(|s| s.stud_id == stud_id).cloned())
    }

    async fn find_student_by_name(&self, name: &str) -> Result<Option<Student>> {
        let needle = name.trim().to_lowercase();
        let tables = self.tables.lock().expect("ledger tables poisoned");
        Ok(tables
            .students
            .iter()
            .find(|s| s.name.to_lowercase() == needle)
            .cloned())
    }

    async fn all_students(&self) -> Result<Vec<Student>> {
        Ok(self.tables.lock().expect("ledger tables poisoned").students.clone())
    }

    async fn students_in_class(&self, class: &str) -> Result<Vec<Student>> {
        let tables = self.tables.lock().expect("ledger tables poisoned");
        Ok(tables
            .students
            .iter()
            .filter(|s| s.class == class)
            .cloned()
            .collect())
    }

    async fn seed_fee_account(&self, student: &Student, total_fees: f64) -> Result<()> {
        debug!(stud_id = %student.stud_id, total_fees, "seed_fee_account");
        let mut tables = self.tables.lock().expect("ledger tables poisoned");
        tables.fees.push(FeeAccount {
            stud_id: student.stud_id.clone(),
            name: student.name.clone(),
            class: student.class.clone(),
            total_fees,
            total_paid: 0.0,
            balance: total_fees,
            status: FeeStatus::Unpaid,
        });
        Ok(())
    }

    async fn fee_account(&self, stud_id: &str) -> Result<Option<FeeAccount>> {
        let tables = self.tables.lock().expect("ledger tables poisoned");
        Ok(tables.fees.iter().find(|f| f.stud_id == stud_id).cloned())
    }

    async fn all_fee_accounts(&self) -> Result<Vec<FeeAccount>> {
        Ok(self.tables.lock().expect("ledger tables poisoned").fees.clone())
    }

    async fn update_fee_totals(
        &self,
        stud_id: &str,
        total_paid: f64,
        balance: f64,
        status: FeeStatus,
    ) -> Result<()> {
        debug!(%stud_id, total_paid, balance, %status, "update_fee_totals");
        let mut tables = self.tables.lock().expect("ledger tables poisoned");
        if let Some(account) = tables.fees.iter_mut().find(|f| f.stud_id == stud_id) {
            account.total_paid = total_paid;
            account.balance = balance;
            account.status = status;
        }
        Ok(())
    }

    async fn add_installment(&self, installment: NewInstallment) -> Result<Installment> {
        let inst_id = self.ids.next(EntityKind::Installment);
        debug!(%inst_id, stud_id = %installment.stud_id, amount = installment.amount, "add_installment");
        let row = Installment {
            inst_id,
            stud_id: installment.stud_id,
            name: installment.name,
            class: installment.class,
            amount: installment.amount,
            date: installment.date,
            mode: installment.mode,
            remarks: installment.remarks,
            recorded_by: installment.recorded_by,
            created_at: Utc::now().to_rfc3339(),
        };
        let mut tables = self.tables.lock().expect("ledger tables poisoned");
        tables.installments.push(row.clone());
        Ok(row)
    }

    async fn installments_for(&self, stud_id: &str) -> Result<Vec<Installment>> {
        let tables = self.tables.lock().expect("ledger tables poisoned");
        Ok(tables
            .installments
            .iter()
            .filter(|i| i.stud_id == stud_id)
            .cloned()
            .collect())
    }

    async fn installments_on(&self, date: &str) -> Result<Vec<Installment>> {
        let tables = self.tables.lock().expect("ledger tables poisoned");
        Ok(tables
            .installments
            .iter()
            .filter(|i| i.date == date)
            .cloned()
            .collect())
    }

    async fn append_log(&self, log: NewLog) -> Result<LogEntry> {
        let log_id = self.ids.next(EntityKind::Log);
        let row = LogEntry {
            log_id,
            action: log.action,
            stud_id: log.stud_id,
            raw_message: log.raw_message,
            parsed_json: log.parsed_json,
            result: log.result,
            error_msg: log.error_msg,
            performed_by: log.performed_by,
            timestamp: Utc::now().to_rfc3339(),
        };
        let mut tables = self.tables.lock().expect("ledger tables poisoned");
        tables.logs.push(row.clone());
        Ok(row)
    }
}
