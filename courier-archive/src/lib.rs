//! Courier Archive - Validating Cache
//!
//! Accepts or rejects inbound metas and documents before anything is
//! persisted, resolves cached [`courier_core::User`] / [`courier_core::Group`]
//! objects, and bounds memory through the emergency halving eviction.

pub mod archivist;
pub mod thanos;

pub use archivist::Archivist;
pub use thanos::{MemoryCache, ThanosCache};
