//! Parsed write intents
//!
//! A `ChangeSet` is the parsed, not-yet-committed representation of a
//! sender's write request: a tagged list of intents rather than a bag of
//! maybe-empty arrays, so every consumer matches on exactly the fields
//! its shape carries. The wire format the parser prompt demands maps
//! straight onto [`WriteIntent`] via serde.

use serde::{Deserialize, Serialize};

/// One supported write shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum WriteIntent {
    NewStudent(NewStudentIntent),
    Payment(PaymentIntent),
}

/// A new student with their fee account seed. The server assigns the id
/// and timestamps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewStudentIntent {
    pub name: String,
    pub class: String,
    pub parent_name: String,
    pub parent_no: String,
    pub phone_no: String,
    pub email: String,
    /// Raw amount text as parsed; validated and converted server-side.
    pub total_fees: String,
}

/// An installment payment against an existing (or just-created) student.
///
/// Either `stud_id` or `name` identifies the student; id wins when both
/// are present. Empty date/mode are filled with server defaults at
/// commit time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentIntent {
    pub stud_id: String,
    pub name: String,
    #[serde(rename = "installment_amount")]
    pub amount: String,
    pub date: String,
    pub mode: String,
    pub remarks: String,
}

impl PaymentIntent {
    /// The student reference shown in errors and previews.
    pub fn student_ref(&self) -> &str {
        if !self.stud_id.is_empty() {
            &self.stud_id
        } else {
            &self.name
        }
    }

    pub fn has_student_ref(&self) -> bool {
        !self.stud_id.trim().is_empty() || !self.name.trim().is_empty()
    }
}

/// An ordered set of write intents plus the message that produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub intents: Vec<WriteIntent>,
    /// The raw inbound message, kept for the audit trail.
    pub source: String,
}

impl ChangeSet {
    pub fn single(intent: WriteIntent, source: impl Into<String>) -> Self {
        Self {
            intents: vec![intent],
            source: source.into(),
        }
    }

    /// Serialized snapshot for audit log rows.
    pub fn snapshot(&self) -> String {
        serde_json::to_string(&self.intents).unwrap_or_default()
    }

    /// First student id mentioned by any intent, for log attribution.
    pub fn primary_student_id(&self) -> String {
        self.intents
            .iter()
            .find_map(|intent| match intent {
                WriteIntent::Payment(p) if !p.stud_id.is_empty() => Some(p.stud_id.clone()),
                _ => None,
            })
            .unwrap_or_default()
    }
}
