//! # confirma-memory
//!
//! Durable local state for Confirma (SQLite-backed): the reminder Dedupe
//! Store and the reply audit log.

pub mod audit;
pub mod store;

pub use audit::{AuditCounts, AuditEntry, AuditStatus, ReplyAudit};
pub use store::{RecordOutcome, Store, StoreStats};
