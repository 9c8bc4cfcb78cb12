//! Courier Checker - Query Freshness and De-duplication
//!
//! Decides when metadata, document, and member-list refresh queries are
//! worth sending, and suppresses duplicates inside a fixed expiry
//! window. Built from two reusable timed-gate primitives plus the
//! [`EntityChecker`] that wires them to the store and the messenger.

pub mod checker;
pub mod gates;

pub use checker::EntityChecker;
pub use gates::{FrequencyChecker, RecentTimeChecker};
