//! Read-query pipeline
//!
//! READ-intent text becomes a typed [`ReadRequest`] via the LLM, with a
//! deterministic regex fallback so a model outage still answers the
//! common queries. Execution resolves against the ledger and renders
//! the WhatsApp reply text.

use std::sync::Arc;

use chrono::{Duration, Utc};
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use feeledger::{FeeAccount, Installment, LedgerStore, Student};

use crate::llm::{ChatClient, ChatRequest, extract_json_object};
use crate::pipeline::confirmation::display_amount;
use crate::prompts;

/// A typed read query.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadRequest {
    StudentDetails { stud_id: String, name: String },
    FeeStatus { stud_id: String, name: String },
    PaymentHistoryByStudent { stud_id: String, name: String },
    PaymentHistoryByDate { date: String },
    ClassReport { class: String },
    StudentSearch { name: String },
    AggregateSummary { criteria: AggregateCriteria },
}

/// Filter for aggregate queries.
#[derive(Debug, Clone, PartialEq)]
pub enum AggregateCriteria {
    PaidLessThan(f64),
    PaidMoreThan(f64),
    BalanceLessThan(f64),
    BalanceMoreThan(f64),
    OutstandingFees,
    AllStudents,
}

// Wire shape the read-parser prompt demands.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ReadWire {
    query_type: String,
    parameters: ReadParams,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ReadParams {
    stud_id: String,
    name: String,
    class: String,
    date_filter: String,
    criteria: String,
    amount: String,
}

fn request_from_wire(wire: ReadWire) -> Option<ReadRequest> {
    let p = wire.parameters;
    match wire.query_type.as_str() {
        "student_details" | "student_info" => Some(ReadRequest::StudentDetails {
            stud_id: p.stud_id,
            name: p.name,
        }),
        "fee_status" => Some(ReadRequest::FeeStatus {
            stud_id: p.stud_id,
            name: p.name,
        }),
        "payment_history" => {
            if !p.date_filter.is_empty() {
                Some(ReadRequest::PaymentHistoryByDate { date: p.date_filter })
            } else {
                Some(ReadRequest::PaymentHistoryByStudent {
                    stud_id: p.stud_id,
                    name: p.name,
                })
            }
        }
        "class_report" => Some(ReadRequest::ClassReport { class: p.class }),
        "student_search" => Some(ReadRequest::StudentSearch { name: p.name }),
        "aggregate_summary" => Some(ReadRequest::AggregateSummary {
            criteria: parse_criteria(&p.criteria, &p.amount),
        }),
        _ => None,
    }
}

/// Parse criteria text like `paid_less_than_10000` (amount may also come
/// separately).
fn parse_criteria(criteria: &str, amount: &str) -> AggregateCriteria {
    let trailing_number = |s: &str| -> Option<f64> {
        s.rsplit('_').next().and_then(|tail| tail.parse::<f64>().ok())
    };
    let amount = amount
        .trim()
        .parse::<f64>()
        .ok()
        .or_else(|| trailing_number(criteria));

    match (criteria, amount) {
        (c, Some(a)) if c.starts_with("paid_less_than") => AggregateCriteria::PaidLessThan(a),
        (c, Some(a)) if c.starts_with("paid_more_than") => AggregateCriteria::PaidMoreThan(a),
        (c, Some(a)) if c.starts_with("balance_less_than") => AggregateCriteria::BalanceLessThan(a),
        (c, Some(a)) if c.starts_with("balance_more_than") => AggregateCriteria::BalanceMoreThan(a),
        ("outstanding_fees", _) => AggregateCriteria::OutstandingFees,
        _ => AggregateCriteria::AllStudents,
    }
}

/// Deterministic fallback when the LLM is unavailable or unparseable.
fn fallback_request(message: &str) -> ReadRequest {
    let class_re = Regex::new(r"(?i)class\s+(\d+)").expect("static regex");
    if let Some(captures) = class_re.captures(message) {
        return ReadRequest::ClassReport {
            class: captures[1].to_string(),
        };
    }

    let aggregate_re = Regex::new(r"(?i)total|count|all students|how many|list of students").expect("static regex");
    let fee_re = Regex::new(r"(?i)fee|paid|balance|outstanding|pending").expect("static regex");
    let amount_re = Regex::new(r"(\d+)").expect("static regex");
    if aggregate_re.is_match(message) && fee_re.is_match(message) {
        let amount = amount_re
            .captures(message)
            .and_then(|c| c[1].parse::<f64>().ok());
        let lower = message.to_lowercase();
        let criteria = match amount {
            Some(a) if lower.contains("less than") => AggregateCriteria::PaidLessThan(a),
            Some(a) if lower.contains("more than") => AggregateCriteria::BalanceMoreThan(a),
            _ if lower.contains("outstanding") || lower.contains("pending") => {
                AggregateCriteria::OutstandingFees
            }
            _ => AggregateCriteria::AllStudents,
        };
        return ReadRequest::AggregateSummary { criteria };
    }

    let stud_re = Regex::new(r"(?i)STU\d+").expect("static regex");
    if let Some(found) = stud_re.find(message) {
        return ReadRequest::StudentDetails {
            stud_id: found.as_str().to_uppercase(),
            name: String::new(),
        };
    }

    ReadRequest::StudentSearch { name: String::new() }
}

/// Resolve relative date words the model may pass through.
fn resolve_date(date: &str) -> String {
    match date.trim().to_lowercase().as_str() {
        "today" => Utc::now().format("%Y-%m-%d").to_string(),
        "yesterday" => (Utc::now() - Duration::days(1)).format("%Y-%m-%d").to_string(),
        _ => date.trim().to_string(),
    }
}

/// LLM-backed read pipeline: parse, execute, render.
pub struct ReadService {
    llm: Arc<dyn ChatClient>,
    ledger: Arc<dyn LedgerStore>,
}

impl ReadService {
    pub fn new(llm: Arc<dyn ChatClient>, ledger: Arc<dyn LedgerStore>) -> Self {
        Self { llm, ledger }
    }

    /// Parse READ-intent text; never fails, always yields some request.
    pub async fn parse(&self, message: &str) -> ReadRequest {
        let prompt = prompts::render(prompts::PARSE_READ, message);
        let request = ChatRequest::user(prompt, prompts::PARSE_READ_TEMPERATURE, prompts::PARSE_READ_MAX_TOKENS);

        let response = match self.llm.complete(request).await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "read parse: LLM call failed, using fallback");
                return fallback_request(message);
            }
        };

        let parsed = extract_json_object(&response.content)
            .and_then(|json| serde_json::from_str::<ReadWire>(json).ok())
            .and_then(request_from_wire);

        match parsed {
            Some(request) => {
                debug!(?request, "read parse: done");
                request
            }
            None => {
                warn!("read parse: unusable model output, using fallback");
                fallback_request(message)
            }
        }
    }

    /// Execute a read request and render the reply text.
    pub async fn execute(&self, request: &ReadRequest) -> String {
        match self.run(request).await {
            Ok(body) => format!("📊 *Information Retrieved*\n\n{body}"),
            Err(e) => {
                warn!(error = %e, "read execute: failed");
                format!("❌ *Error retrieving information*\n\nError: {e}")
            }
        }
    }

    async fn find_student(&self, stud_id: &str, name: &str) -> feeledger::Result<Option<Student>> {
        if !stud_id.trim().is_empty() {
            self.ledger.find_student(stud_id.trim()).await
        } else if !name.trim().is_empty() {
            self.ledger.find_student_by_name(name).await
        } else {
            Ok(None)
        }
    }

    async fn run(&self, request: &ReadRequest) -> feeledger::Result<String> {
        match request {
            ReadRequest::StudentDetails { stud_id, name } => {
                match self.find_student(stud_id, name).await? {
                    Some(student) => Ok(render_student_details(&student)),
                    None => Ok("❌ Student not found".to_string()),
                }
            }
            ReadRequest::FeeStatus { stud_id, name } => {
                let Some(student) = self.find_student(stud_id, name).await? else {
                    return Ok("❌ Student not found".to_string());
                };
                match self.ledger.fee_account(&student.stud_id).await? {
                    Some(account) => Ok(render_fee_status(&account)),
                    None => Ok("❌ Fee information not found".to_string()),
                }
            }
            ReadRequest::PaymentHistoryByStudent { stud_id, name } => {
                let Some(student) = self.find_student(stud_id, name).await? else {
                    return Ok("❌ Student not found".to_string());
                };
                let installments = self.ledger.installments_for(&student.stud_id).await?;
                Ok(render_payment_history(&installments))
            }
            ReadRequest::PaymentHistoryByDate { date } => {
                let date = resolve_date(date);
                let installments = self.ledger.installments_on(&date).await?;
                Ok(render_payments_report(&date, &installments))
            }
            ReadRequest::ClassReport { class } => {
                let students = self.ledger.students_in_class(class).await?;
                Ok(render_class_report(class, &students))
            }
            ReadRequest::StudentSearch { name } => {
                let students = if name.trim().is_empty() {
                    self.ledger.all_students().await?
                } else {
                    self.ledger
                        .find_student_by_name(name)
                        .await?
                        .into_iter()
                        .collect()
                };
                Ok(render_student_search(&students))
            }
            ReadRequest::AggregateSummary { criteria } => {
                let accounts = self.ledger.all_fee_accounts().await?;
                Ok(render_aggregate_summary(criteria, &accounts))
            }
        }
    }
}

fn render_student_details(student: &Student) -> String {
    let mut message = format!(
        "👨‍🎓 *Student Details:*\n• ID: {}\n• Name: {}\n• Class: {}\n• Parent: {}\n• Phone: {}\n",
        student.stud_id, student.name, student.class, student.parent_name, student.phone_no
    );
    if !student.email.is_empty() {
        message.push_str(&format!("• Email: {}\n", student.email));
    }
    message.trim_end().to_string()
}

fn render_fee_status(account: &FeeAccount) -> String {
    format!(
        "💰 *Fee Status for {}:*\n• Total Fees: ₹{}\n• Paid: ₹{}\n• Balance: ₹{}\n• Status: {}",
        account.name,
        display_amount(account.total_fees),
        display_amount(account.total_paid),
        display_amount(account.balance),
        account.status
    )
}

fn render_payment_history(installments: &[Installment]) -> String {
    if installments.is_empty() {
        return "❌ No payment history found".to_string();
    }
    let mut message = "📈 *Payment History:*\n".to_string();
    for (idx, payment) in installments.iter().enumerate() {
        message.push_str(&format!(
            "{}. 🆔 {}\n   💰 Amount: ₹{}\n   📅 Date: {}\n   💳 Mode: {}\n",
            idx + 1,
            payment.inst_id,
            display_amount(payment.amount),
            payment.date,
            payment.mode
        ));
        if !payment.remarks.is_empty() {
            message.push_str(&format!("   📝 Remarks: {}\n", payment.remarks));
        }
        message.push('\n');
    }
    let total: f64 = installments.iter().map(|i| i.amount).sum();
    message.push_str(&format!("💰 *Total Paid:* ₹{}", display_amount(total)));
    message
}

fn render_payments_report(date: &str, installments: &[Installment]) -> String {
    if installments.is_empty() {
        return format!("❌ No payments found on {date}");
    }
    let mut message = format!("📅 *Payments Report for {date}:*\n📈 *Total Payments:* {}\n\n", installments.len());
    let mut total = 0.0;
    for (idx, payment) in installments.iter().enumerate() {
        total += payment.amount;
        message.push_str(&format!(
            "{}. {} ({})\n   🆔 Installment ID: {}\n   💰 Amount: ₹{}\n   💳 Mode: {}\n\n",
            idx + 1,
            payment.name,
            payment.stud_id,
            payment.inst_id,
            display_amount(payment.amount),
            payment.mode
        ));
    }
    message.push_str(&format!("💰 *Total Amount Collected:* ₹{}", display_amount(total)));
    message
}

fn render_class_report(class: &str, students: &[Student]) -> String {
    if students.is_empty() {
        return "❌ No students found in this class".to_string();
    }
    let mut message = format!("📚 *Class {} Report ({} students):*\n", class, students.len());
    for student in students {
        message.push_str(&format!("• {} ({})\n", student.name, student.stud_id));
    }
    message.trim_end().to_string()
}

fn render_student_search(students: &[Student]) -> String {
    if students.is_empty() {
        return "❌ No students found".to_string();
    }
    let mut message = format!("🔍 *Search Results ({} found):*\n", students.len());
    for student in students {
        message.push_str(&format!(
            "• {} ({}) - Class {}\n",
            student.name, student.stud_id, student.class
        ));
    }
    message.trim_end().to_string()
}

fn render_aggregate_summary(criteria: &AggregateCriteria, accounts: &[FeeAccount]) -> String {
    let matches: Vec<&FeeAccount> = accounts
        .iter()
        .filter(|a| match criteria {
            AggregateCriteria::PaidLessThan(amount) => a.total_paid < *amount,
            AggregateCriteria::PaidMoreThan(amount) => a.total_paid > *amount,
            AggregateCriteria::BalanceLessThan(amount) => a.balance < *amount,
            AggregateCriteria::BalanceMoreThan(amount) => a.balance > *amount,
            AggregateCriteria::OutstandingFees => a.balance > 0.0,
            AggregateCriteria::AllStudents => true,
        })
        .collect();

    if matches.is_empty() {
        return "❌ No aggregate data found".to_string();
    }

    let mut message = format!("👥 *Students List ({}):*\n", matches.len());
    for account in &matches {
        message.push_str(&format!(
            "• {} ({}) - Class {}\n   Paid: ₹{}, Balance: ₹{}\n",
            account.name,
            account.stud_id,
            account.class,
            display_amount(account.total_paid),
            display_amount(account.balance)
        ));
    }
    let outstanding: f64 = matches.iter().map(|a| a.balance.max(0.0)).sum();
    let collected: f64 = matches.iter().map(|a| a.total_paid).sum();
    message.push_str(&format!("\n💰 *Total Outstanding:* ₹{}", display_amount(outstanding)));
    message.push_str(&format!("\n💰 *Total Collected:* ₹{}", display_amount(collected)));
    message
}
