//! Courier Core - Entity Types and Collaborator Seams
//!
//! Pure data structures plus the trait boundaries to the outside world
//! (persistent account store, network messenger, crypto, clock).
//! All other crates depend on this. This crate contains no sync policy.

pub mod config;
pub mod document;
pub mod entity;
pub mod error;
pub mod id;
pub mod meta;
pub mod roster;
pub mod traits;

pub use config::CheckerConfig;
pub use document::{
    is_before, is_expired, last_bulletin, last_document, last_visa, Document, DocumentType,
};
pub use entity::{Group, User};
pub use error::{CourierError, CourierResult, IdError, StoreError};
pub use id::{Address, EntityId, NetworkType};
pub use meta::{Meta, MetaVersion, PublicKey};
pub use roster::GroupRoster;
pub use traits::{AccountStore, Clock, Messenger, SignatureVerifier, Signer, SystemClock};

/// Timestamp type using UTC timezone.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
