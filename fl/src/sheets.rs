//! Spreadsheet-backed ledger store
//!
//! Talks to the Google Sheets values API over REST: full-range reads,
//! append-row writes, and a single-range update used only for the fee
//! aggregate columns. Four tabs, one per collection, with fixed column
//! layouts. Authentication is a bearer token supplied by the caller;
//! minting that token is the environment's problem, not this crate's.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::entities::{
    FeeAccount, FeeStatus, Installment, LogEntry, NewInstallment, NewLog, NewStudent, Student,
};
use crate::error::{LedgerError, Result};
use crate::ids::{EntityKind, IdAllocator, parse_seq};
use crate::store::LedgerStore;

const DEFAULT_BASE_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const STUDENTS_TAB: &str = "Student_info";
const FEES_TAB: &str = "Totalfee_details";
const INSTALLMENTS_TAB: &str = "Installment_details";
const LOGS_TAB: &str = "Log_details";

const STUDENTS_RANGE: &str = "Student_info!A:H";
const FEES_RANGE: &str = "Totalfee_details!A:G";
const INSTALLMENTS_RANGE: &str = "Installment_details!A:J";
const LOGS_RANGE: &str = "Log_details!A:I";

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

/// Read a cell as text. The API may hand back numbers for amount columns.
fn cell(row: &[serde_json::Value], idx: usize) -> String {
    match row.get(idx) {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        Some(serde_json::Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// Parse an amount cell; unparseable text counts as zero.
fn amount_cell(row: &[serde_json::Value], idx: usize) -> f64 {
    cell(row, idx).trim().parse::<f64>().unwrap_or(0.0)
}

fn student_from_row(row: &[serde_json::Value]) -> Student {
    Student {
        stud_id: cell(row, 0),
        name: cell(row, 1),
        class: cell(row, 2),
        parent_name: cell(row, 3),
        parent_no: cell(row, 4),
        phone_no: cell(row, 5),
        email: cell(row, 6),
        created_at: cell(row, 7),
    }
}

fn fee_account_from_row(row: &[serde_json::Value]) -> FeeAccount {
    FeeAccount {
        stud_id: cell(row, 0),
        name: cell(row, 1),
        class: cell(row, 2),
        total_fees: amount_cell(row, 3),
        total_paid: amount_cell(row, 4),
        balance: amount_cell(row, 5),
        status: FeeStatus::from_cell(&cell(row, 6)),
    }
}

fn installment_from_row(row: &[serde_json::Value]) -> Installment {
    Installment {
        inst_id: cell(row, 0),
        stud_id: cell(row, 1),
        name: cell(row, 2),
        class: cell(row, 3),
        amount: amount_cell(row, 4),
        date: cell(row, 5),
        mode: cell(row, 6),
        remarks: cell(row, 7),
        recorded_by: cell(row, 8),
        created_at: cell(row, 9),
    }
}

/// Format an amount for a cell; whole rupees stay integral.
fn amount_to_cell(amount: f64) -> String {
    if amount.fract() == 0.0 {
        format!("{}", amount as i64)
    } else {
        format!("{amount}")
    }
}

/// Ledger store over the spreadsheet values API.
pub struct SheetsStore {
    http: reqwest::Client,
    base_url: String,
    spreadsheet_id: String,
    token: String,
    ids: IdAllocator,
    seeded: OnceCell<()>,
}

impl SheetsStore {
    pub fn new(spreadsheet_id: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(LedgerError::Network)?;
        Ok(Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            spreadsheet_id: spreadsheet_id.into(),
            token: token.into(),
            ids: IdAllocator::new(),
            seeded: OnceCell::new(),
        })
    }

    async fn values_get(&self, range: &str) -> Result<Vec<Vec<serde_json::Value>>> {
        debug!(%range, "values_get");
        let url = format!("{}/{}/values/{}", self.base_url, self.spreadsheet_id, range);
        let response = self.http.get(&url).bearer_auth(&self.token).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LedgerError::Api {
                status: status.as_u16(),
                message,
            });
        }
        let body: ValueRange = response.json().await?;
        Ok(body.values)
    }

    async fn values_append(&self, range: &str, row: Vec<String>) -> Result<()> {
        debug!(%range, cols = row.len(), "values_append");
        let url = format!(
            "{}/{}/values/{}:append?valueInputOption=USER_ENTERED",
            self.base_url, self.spreadsheet_id, range
        );
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "values": [row] }))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LedgerError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }

    async fn values_update(&self, range: &str, row: Vec<String>) -> Result<()> {
        debug!(%range, "values_update");
        let url = format!(
            "{}/{}/values/{}?valueInputOption=USER_ENTERED",
            self.base_url, self.spreadsheet_id, range
        );
        let response = self
            .http
            .put(&url)
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "values": [row] }))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LedgerError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }

    /// Seed the id counters from the highest id in each tab's first
    /// column. Runs once per process; later inserts only touch the
    /// in-memory counters.
    async fn ensure_seeded(&self) -> Result<()> {
        self.seeded
            .get_or_try_init(|| async {
                for (kind, tab) in [
                    (EntityKind::Student, STUDENTS_TAB),
                    (EntityKind::Installment, INSTALLMENTS_TAB),
                    (EntityKind::Log, LOGS_TAB),
                ] {
                    let range = format!("{tab}!A:A");
                    let rows = self.values_get(&range).await?;
                    let highest = rows
                        .iter()
                        .filter_map(|row| parse_seq(kind, &cell(row, 0)))
                        .max()
                        .unwrap_or(0);
                    debug!(tab, highest, "seeded id counter");
                    self.ids.seed(kind, highest);
                }
                Ok(())
            })
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl LedgerStore for SheetsStore {
    async fn add_student(&self, student: NewStudent) -> Result<Student> {
        self.ensure_seeded().await?;
        let stud_id = self.ids.next(EntityKind::Student);
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
        self.values_append(
            STUDENTS_RANGE,
            vec![
                row.stud_id.clone(),
                row.name.clone(),
                row.class.clone(),
                row.parent_name.clone(),
                row.parent_no.clone(),
                row.phone_no.clone(),
                row.email.clone(),
                row.created_at.clone(),
            ],
        )
        .await?;
        Ok(row)
    }

    async fn find_student(&self, stud_id: &str) -> Result<Option<Student>> {
        let rows = self.values_get(STUDENTS_RANGE).await?;
        Ok(rows
            .iter()
            .skip(1)
            .find(|row| cell(row, 0) == stud_id)
            .map(|row| student_from_row(row)))
    }

    async fn find_student_by_name(&self, name: &str) -> Result<Option<Student>> {
        let needle = name.trim().to_lowercase();
        let rows = self.values_get(STUDENTS_RANGE).await?;
        Ok(rows
            .iter()
            .skip(1)
            .find(|row| cell(row, 1).to_lowercase() == needle)
            .map(|row| student_from_row(row)))
    }

    async fn all_students(&self) -> Result<Vec<Student>> {
        let rows = self.values_get(STUDENTS_RANGE).await?;
        Ok(rows.iter().skip(1).map(|row| student_from_row(row)).collect())
    }

    async fn students_in_class(&self, class: &str) -> Result<Vec<Student>> {
        let rows = self.values_get(STUDENTS_RANGE).await?;
        Ok(rows
            .iter()
            .skip(1)
            .filter(|row| cell(row, 2) == class)
            .map(|row| student_from_row(row))
            .collect())
    }

    async fn seed_fee_account(&self, student: &Student, total_fees: f64) -> Result<()> {
        self.values_append(
            FEES_RANGE,
            vec![
                student.stud_id.clone(),
                student.name.clone(),
                student.class.clone(),
                amount_to_cell(total_fees),
                amount_to_cell(0.0),
                amount_to_cell(total_fees),
                FeeStatus::Unpaid.as_str().to_string(),
            ],
        )
        .await
    }

    async fn fee_account(&self, stud_id: &str) -> Result<Option<FeeAccount>> {
        let rows = self.values_get(FEES_RANGE).await?;
        Ok(rows
            .iter()
            .skip(1)
            .find(|row| cell(row, 0) == stud_id)
            .map(|row| fee_account_from_row(row)))
    }

    async fn all_fee_accounts(&self) -> Result<Vec<FeeAccount>> {
        let rows = self.values_get(FEES_RANGE).await?;
        Ok(rows
            .iter()
            .skip(1)
            .map(|row| fee_account_from_row(row))
            .collect())
    }

    async fn update_fee_totals(
        &self,
        stud_id: &str,
        total_paid: f64,
        balance: f64,
        status: FeeStatus,
    ) -> Result<()> {
        let rows = self.values_get(FEES_RANGE).await?;
        // Sheet rows are 1-based and row 1 is the header.
        let row_num = rows
            .iter()
            .position(|row| cell(row, 0) == stud_id)
            .map(|idx| idx + 1);
        let Some(row_num) = row_num else {
            warn!(%stud_id, "no fee row to update");
            return Err(LedgerError::StudentNotFound(stud_id.to_string()));
        };
        let range = format!("{FEES_TAB}!E{row_num}:G{row_num}");
        self.values_update(
            &range,
            vec![
                amount_to_cell(total_paid),
                amount_to_cell(balance),
                status.as_str().to_string(),
            ],
        )
        .await
    }

    async fn add_installment(&self, installment: NewInstallment) -> Result<Installment> {
        self.ensure_seeded().await?;
        let inst_id = self.ids.next(EntityKind::Installment);
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
        self.values_append(
            INSTALLMENTS_RANGE,
            vec![
                row.inst_id.clone(),
                row.stud_id.clone(),
                row.name.clone(),
                row.class.clone(),
                amount_to_cell(row.amount),
                row.date.clone(),
                row.mode.clone(),
                row.remarks.clone(),
                row.recorded_by.clone(),
                row.created_at.clone(),
            ],
        )
        .await?;
        Ok(row)
    }

    async fn installments_for(&self, stud_id: &str) -> Result<Vec<Installment>> {
        let rows = self.values_get(INSTALLMENTS_RANGE).await?;
        Ok(rows
            .iter()
            .skip(1)
            .filter(|row| cell(row, 1) == stud_id)
            .map(|row| installment_from_row(row))
            .collect())
    }

    async fn installments_on(&self, date: &str) -> Result<Vec<Installment>> {
        let rows = self.values_get(INSTALLMENTS_RANGE).await?;
        Ok(rows
            .iter()
            .skip(1)
            .filter(|row| cell(row, 5) == date)
            .map(|row| installment_from_row(row))
            .collect())
    }

    async fn append_log(&self, log: NewLog) -> Result<LogEntry> {
        self.ensure_seeded().await?;
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
        self.values_append(
            LOGS_RANGE,
            vec![
                row.log_id.clone(),
                row.action.as_str().to_string(),
                row.stud_id.clone(),
                row.raw_message.clone(),
                row.parsed_json.clone(),
                row.result.as_str().to_string(),
                row.error_msg.clone(),
                row.performed_by.clone(),
                row.timestamp.clone(),
            ],
        )
        .await?;
        Ok(row)
    }
}
