//! Change-set validation
//!
//! Pure and synchronous. Runs strictly before a confirmation is created:
//! malformed data must never cost the sender a confirmation round-trip.
//! The first failing intent short-circuits with its corrective message.

use crate::pipeline::changeset::{ChangeSet, WriteIntent};

/// A validation failure with its user-facing corrective message.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub message: String,
}

impl ValidationError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Validate a parsed change-set.
pub fn validate(change_set: &ChangeSet) -> Result<(), ValidationError> {
    for intent in &change_set.intents {
        match intent {
            WriteIntent::Payment(payment) => {
                if !payment.has_student_ref() {
                    return Err(ValidationError::new(
                        "❌ *Invalid Request*\n\nTo add an installment, please provide either:\n\
                         • Student ID (e.g., STU001)\n• Student name\n\n\
                         Example: \"STU001 paid 100\" or \"Rahul paid 100\"",
                    ));
                }
                let amount = payment.amount.trim();
                if amount.is_empty() || amount == "0" {
                    return Err(ValidationError::new(
                        "❌ *Invalid Request*\n\nPlease specify a valid installment amount.\n\n\
                         Example: \"STU001 paid 100\"",
                    ));
                }
            }
            WriteIntent::NewStudent(student) => {
                if student.name.trim().is_empty() || student.class.trim().is_empty() {
                    return Err(ValidationError::new(
                        "❌ *Invalid Request*\n\nTo add a new student, please provide:\n\
                         • Student name\n• Class\n\n\
                         Example: \"Add student Rahul class 10\"",
                    ));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::changeset::{NewStudentIntent, PaymentIntent};

    fn payment(stud_id: &str, name: &str, amount: &str) -> ChangeSet {
        ChangeSet::single(
            WriteIntent::Payment(PaymentIntent {
                stud_id: stud_id.to_string(),
                name: name.to_string(),
                amount: amount.to_string(),
                ..Default::default()
            }),
            "test message",
        )
    }

    #[test]
    fn test_payment_with_id_is_valid() {
        assert!(validate(&payment("STU001", "", "4000")).is_ok());
    }

    #[test]
    fn test_payment_with_name_is_valid() {
        assert!(validate(&payment("", "Rahul", "100")).is_ok());
    }

    #[test]
    fn test_payment_without_student_ref_is_rejected() {
        let err = validate(&payment("", "", "4000")).unwrap_err();
        assert!(err.message.contains("Student ID"), "error should reference student identification");
    }

    #[test]
    fn test_payment_with_zero_amount_is_rejected() {
        let err = validate(&payment("STU001", "", "0")).unwrap_err();
        assert!(err.message.contains("installment amount"));
        assert!(validate(&payment("STU001", "", "")).is_err());
    }

    #[test]
    fn test_new_student_requires_name_and_class() {
        let ok = ChangeSet::single(
            WriteIntent::NewStudent(NewStudentIntent {
                name: "Rahul".to_string(),
                class: "10".to_string(),
                ..Default::default()
            }),
            "add student",
        );
        assert!(validate(&ok).is_ok());

        let missing_class = ChangeSet::single(
            WriteIntent::NewStudent(NewStudentIntent {
                name: "Rahul".to_string(),
                ..Default::default()
            }),
            "add student",
        );
        assert!(validate(&missing_class).is_err());
    }

    #[test]
    fn test_first_failure_wins_in_a_batch() {
        let change_set = ChangeSet {
            intents: vec![
                WriteIntent::Payment(PaymentIntent {
                    stud_id: String::new(),
                    name: String::new(),
                    amount: "100".to_string(),
                    ..Default::default()
                }),
                WriteIntent::Payment(PaymentIntent {
                    stud_id: "STU001".to_string(),
                    amount: "0".to_string(),
                    ..Default::default()
                }),
            ],
            source: "batch".to_string(),
        };
        let err = validate(&change_set).unwrap_err();
        assert!(err.message.contains("Student ID"));
    }
}
