//! Courier Group - Decentralized Group Consensus
//!
//! No server arbitrates group state: every client decides for itself
//! whether a membership, administrator, or bulletin update carries
//! sufficient authority and a strictly newer history time. This crate
//! implements those rules on top of the validating archive and the
//! freshness checker.
//!
//! Wiring mirrors the runtime object graph: a [`GroupDelegate`] answers
//! role and roster questions, a [`GroupManager`] applies membership
//! changes, a [`GroupAdminManager`] applies owner-only administrator
//! changes, and a [`GroupEmitter`] pushes bulletins to the members.

pub mod admin;
pub mod delegate;
pub mod emitter;
pub mod manager;

pub use admin::GroupAdminManager;
pub use delegate::GroupDelegate;
pub use emitter::GroupEmitter;
pub use manager::GroupManager;
