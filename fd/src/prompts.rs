//! Embedded prompt templates
//!
//! Compiled into the binary; call sites substitute `{{message}}` with the
//! inbound text. Each prompt demands a bare JSON object so the extraction
//! helper can recover it from noisy model output.

/// Render a prompt template with the user's message.
pub fn render(template: &str, message: &str) -> String {
    template.replace("{{message}}", message)
}

/// Classifier prompt: operation + confidence, with reminder intents.
pub const CLASSIFY: &str = r#"Classify this message for a school fee management system and return ONLY a JSON object:

Message: "{{message}}"

Return format (no markdown, no extra text):
{"operation": "CREATE|READ|UPDATE|DELETE|REMIND_ALL|REMIND_SPECIFIC", "confidence": 0.85, "student_id": ""}

Rules:
- Questions about students, fees, balances or payment history are READ.
- Recording a payment or adding a student is CREATE.
- "remind all parents" or "send reminders to everyone" is REMIND_ALL.
- "remind STU123" or "send a reminder for Rahul's fees" is REMIND_SPECIFIC; put the student id in student_id when present.

Examples:
- "Show me details of Rahul" -> {"operation": "READ", "confidence": 0.9, "student_id": ""}
- "Add new student" -> {"operation": "CREATE", "confidence": 0.9, "student_id": ""}
- "STU001 paid 4000" -> {"operation": "CREATE", "confidence": 0.9, "student_id": "STU001"}
- "Update phone number" -> {"operation": "UPDATE", "confidence": 0.85, "student_id": ""}
- "remind all parents about fees" -> {"operation": "REMIND_ALL", "confidence": 0.9, "student_id": ""}
- "remind STU123" -> {"operation": "REMIND_SPECIFIC", "confidence": 0.9, "student_id": "STU123"}"#;

/// Write-parser prompt: the two supported change shapes.
pub const PARSE_WRITE: &str = r#"You are a structured data parser for a student fee management system.
Return ONLY valid JSON matching one of the two supported shapes. No explanations, no markdown.

### Shape 1: Installment payment

Staff identify the student by id (preferred) or by name and give an amount.
Return:
{
  "intent": "payment",
  "stud_id": "STU123",
  "name": "",
  "installment_amount": "4000",
  "date": "",
  "mode": "",
  "remarks": ""
}

Rules:
- Only stud_id/name and installment_amount are required; leave everything else as "".
- Never compute totals or balances; the server recalculates them.

### Shape 2: New student

Return:
{
  "intent": "new_student",
  "name": "Rahul Pandey",
  "class": "12",
  "parent_name": "Mr Pandey",
  "parent_no": "9999999999",
  "phone_no": "8888888888",
  "email": "rahul@example.com",
  "total_fees": "40000"
}

Rules:
- Do not invent a stud_id; the server assigns it.
- Missing optional fields are "".

### Example 1

Input: "student id STU123 paid 4000"
Output: {"intent": "payment", "stud_id": "STU123", "name": "", "installment_amount": "4000", "date": "", "mode": "", "remarks": ""}

### Example 2

Input: "Create student Rahul Pandey class 12, parent name: Mr Pandey, parent number: 9999999999, phone: 8888888888, email: rahul@example.com, total fees: 40000"
Output: {"intent": "new_student", "name": "Rahul Pandey", "class": "12", "parent_name": "Mr Pandey", "parent_no": "9999999999", "phone_no": "8888888888", "email": "rahul@example.com", "total_fees": "40000"}

Input: {{message}}"#;

/// Read-parser prompt: query taxonomy for the READ flow.
pub const PARSE_READ: &str = r#"You are a school fee management assistant for READ queries. Analyze this user query and return ONLY valid JSON.

User Query: "{{message}}"

CRITICAL CLASSIFICATION RULES:
- Student IDs always start with "STU" followed by numbers.
- If the query mentions a student ID or asks for payments "by/of/for" a student, use the stud_id parameter, NOT date_filter.
- Only use date_filter for actual dates (2025-08-22, today, yesterday).

Query types and format:

Payment history by student:
{"query_type": "payment_history", "parameters": {"stud_id": "STU123", "name": "", "class": ""}}

Date-based payments:
{"query_type": "payment_history", "parameters": {"date_filter": "2025-08-22"}}

Student details:
{"query_type": "student_details", "parameters": {"stud_id": "STU123", "name": "", "class": ""}}

Fee status:
{"query_type": "fee_status", "parameters": {"stud_id": "STU123", "name": "", "class": ""}}

Class report:
{"query_type": "class_report", "parameters": {"class": "11"}}

Aggregate summary:
{"query_type": "aggregate_summary", "parameters": {"criteria": "outstanding_fees", "amount": ""}}

Student search by name:
{"query_type": "student_search", "parameters": {"stud_id": "", "name": "John", "class": ""}}

Examples:
- "payment history of STU1235" -> {"query_type": "payment_history", "parameters": {"stud_id": "STU1235", "name": "", "class": ""}}
- "payments received on 2025-08-22" -> {"query_type": "payment_history", "parameters": {"date_filter": "2025-08-22"}}
- "students in class 11" -> {"query_type": "class_report", "parameters": {"class": "11"}}
- "which students still owe fees" -> {"query_type": "aggregate_summary", "parameters": {"criteria": "outstanding_fees", "amount": ""}}

RETURN ONLY THE JSON OBJECT, NO OTHER TEXT."#;

/// Per-call sampling settings. Classification and read parsing run near
/// deterministic; the write parser is fully deterministic.
pub const CLASSIFY_TEMPERATURE: f32 = 0.1;
pub const CLASSIFY_MAX_TOKENS: u32 = 200;
pub const PARSE_WRITE_TEMPERATURE: f32 = 0.0;
pub const PARSE_WRITE_MAX_TOKENS: u32 = 1000;
pub const PARSE_READ_TEMPERATURE: f32 = 0.1;
pub const PARSE_READ_MAX_TOKENS: u32 = 300;
