//! Ledger ID allocation
//!
//! Every entity gets an opaque, human-readable id with a fixed prefix:
//! `STU001`, `INST042`, `LOG117`. Numbers are zero-padded to three digits
//! and keep growing past 999.
//!
//! Allocation is a per-entity atomic counter owned by the store, seeded
//! once from the highest id already present. Scanning the last row on
//! every insert races under concurrent writers; a seeded counter cannot
//! hand out the same id twice within a process.

use std::sync::atomic::{AtomicU64, Ordering};

/// The three id-bearing entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Student,
    Installment,
    Log,
}

impl EntityKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            EntityKind::Student => "STU",
            EntityKind::Installment => "INST",
            EntityKind::Log => "LOG",
        }
    }
}

/// Format a sequence number as a display id, e.g. `STU007`.
pub fn format_id(kind: EntityKind, seq: u64) -> String {
    format!("{}{:03}", kind.prefix(), seq)
}

/// Parse the sequence number out of a display id.
///
/// Returns `None` when the prefix does not match or the tail is not a
/// number, so malformed rows never poison the counter seed.
pub fn parse_seq(kind: EntityKind, id: &str) -> Option<u64> {
    id.trim()
        .strip_prefix(kind.prefix())
        .and_then(|tail| tail.parse::<u64>().ok())
}

/// Per-entity monotonic counters.
#[derive(Debug, Default)]
pub struct IdAllocator {
    students: AtomicU64,
    installments: AtomicU64,
    logs: AtomicU64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    fn counter(&self, kind: EntityKind) -> &AtomicU64 {
        match kind {
            EntityKind::Student => &self.students,
            EntityKind::Installment => &self.installments,
            EntityKind::Log => &self.logs,
        }
    }

    /// Raise the counter to at least `highest`. Called while seeding from
    /// existing rows; safe to call repeatedly.
    pub fn seed(&self, kind: EntityKind, highest: u64) {
        self.counter(kind).fetch_max(highest, Ordering::SeqCst);
    }

    /// Allocate the next id for `kind`.
    pub fn next(&self, kind: EntityKind) -> String {
        let seq = self.counter(kind).fetch_add(1, Ordering::SeqCst) + 1;
        format_id(kind, seq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_id_pads_to_three() {
        assert_eq!(format_id(EntityKind::Student, 1), "STU001");
        assert_eq!(format_id(EntityKind::Installment, 42), "INST042");
        assert_eq!(format_id(EntityKind::Log, 1234), "LOG1234");
    }

    #[test]
    fn test_parse_seq() {
        assert_eq!(parse_seq(EntityKind::Student, "STU012"), Some(12));
        assert_eq!(parse_seq(EntityKind::Student, " STU012 "), Some(12));
        assert_eq!(parse_seq(EntityKind::Student, "INST012"), None);
        assert_eq!(parse_seq(EntityKind::Log, "LOGabc"), None);
        assert_eq!(parse_seq(EntityKind::Log, "stud_id"), None);
    }

    #[test]
    fn test_allocator_is_monotonic() {
        let ids = IdAllocator::new();
        assert_eq!(ids.next(EntityKind::Student), "STU001");
        assert_eq!(ids.next(EntityKind::Student), "STU002");
        // Independent counters per kind
        assert_eq!(ids.next(EntityKind::Log), "LOG001");
    }

    #[test]
    fn test_seed_never_lowers() {
        let ids = IdAllocator::new();
        ids.seed(EntityKind::Installment, 41);
        ids.seed(EntityKind::Installment, 7);
        assert_eq!(ids.next(EntityKind::Installment), "INST042");
    }
}
