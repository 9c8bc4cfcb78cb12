//! Error types for Courier operations.
//!
//! Policy outcomes (rejection, staleness, insufficient authority) are
//! plain booleans by design; the `Result` types here cover collaborator
//! faults only (store I/O, poisoned locks, malformed identifiers).

use thiserror::Error;

/// Persistent account store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Entity not found: {id}")]
    NotFound { id: String },

    #[error("Write failed for {id}: {reason}")]
    WriteFailed { id: String, reason: String },

    #[error("Store lock poisoned")]
    LockPoisoned,

    #[error("Backend error: {reason}")]
    Backend { reason: String },
}

/// Identifier parsing errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IdError {
    #[error("Empty identifier")]
    Empty,

    #[error("Malformed address: {address}")]
    BadAddress { address: String },

    #[error("Unknown network byte: 0x{network:02x}")]
    UnknownNetwork { network: u8 },
}

/// Master error type for all Courier operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CourierError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Identifier error: {0}")]
    Id(#[from] IdError),
}

/// Result type alias for Courier operations.
pub type CourierResult<T> = Result<T, CourierError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        let err = StoreError::NotFound {
            id: "moki@08abcd".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("not found"));
        assert!(msg.contains("moki@08abcd"));
    }

    #[test]
    fn test_id_error_display() {
        let err = IdError::UnknownNetwork { network: 0x07 };
        assert!(format!("{}", err).contains("0x07"));
    }

    #[test]
    fn test_courier_error_from_variants() {
        let store = CourierError::from(StoreError::LockPoisoned);
        assert!(matches!(store, CourierError::Store(_)));

        let id = CourierError::from(IdError::Empty);
        assert!(matches!(id, CourierError::Id(_)));
    }
}
