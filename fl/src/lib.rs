//! feeledger - student/fee/payment ledger facade
//!
//! The ledger is four row-oriented collections (students, fee accounts,
//! installments, audit logs) persisted in an external spreadsheet. This
//! crate owns the entity types, the human-readable ID scheme, and the
//! [`LedgerStore`] trait that every consumer depends on, so that the
//! mutation path and the read/preview paths never depend on each other.
//!
//! # Modules
//!
//! - [`entities`] - row types for the four collections
//! - [`ids`] - `STU###`/`INST###`/`LOG###` allocation
//! - [`store`] - the `LedgerStore` facade trait
//! - [`memory`] - in-memory store for tests and local runs
//! - [`sheets`] - spreadsheet-backed store

pub mod entities;
pub mod error;
pub mod ids;
pub mod memory;
pub mod sheets;
pub mod store;

pub use entities::{
    FeeAccount, FeeStatus, Installment, LogAction, LogEntry, LogResult, NewInstallment, NewLog,
    NewStudent, Student,
};
pub use error::{LedgerError, Result};
pub use ids::{EntityKind, IdAllocator};
pub use memory::MemoryStore;
pub use sheets::SheetsStore;
pub use store::LedgerStore;
