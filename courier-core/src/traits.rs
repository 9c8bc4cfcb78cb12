//! Collaborator seams consumed by the sync core.
//!
//! The core never talks to the network, the disk, or the crypto
//! library directly; everything goes through these traits so each
//! concern can be swapped independently (and faked in tests).

use chrono::Utc;

use crate::document::Document;
use crate::error::CourierResult;
use crate::id::EntityId;
use crate::meta::{Meta, PublicKey};
use crate::Timestamp;

/// Persistent account database, keyed by [`EntityId`].
///
/// Implementations must either enforce "write only if newer" for
/// documents themselves or expose the currently stored state so the
/// policy layer can enforce it (courier does the latter).
pub trait AccountStore: Send + Sync {
    fn meta(&self, id: &EntityId) -> CourierResult<Option<Meta>>;
    fn save_meta(&self, meta: &Meta, id: &EntityId) -> CourierResult<bool>;

    fn documents(&self, id: &EntityId) -> CourierResult<Vec<Document>>;
    fn save_document(&self, doc: &Document) -> CourierResult<bool>;

    fn members(&self, group: &EntityId) -> CourierResult<Vec<EntityId>>;
    fn save_members(&self, members: &[EntityId], group: &EntityId) -> CourierResult<bool>;

    fn administrators(&self, group: &EntityId) -> CourierResult<Vec<EntityId>>;
    fn save_administrators(&self, admins: &[EntityId], group: &EntityId) -> CourierResult<bool>;

    fn founder(&self, group: &EntityId) -> CourierResult<Option<EntityId>>;
    fn owner(&self, group: &EntityId) -> CourierResult<Option<EntityId>>;

    /// Accounts with private keys on this device; the first entry is
    /// the current user.
    fn local_users(&self) -> CourierResult<Vec<EntityId>>;
}

/// Network transport. Every call is fire-and-forget: the matching
/// response arrives later as an independent inbound event.
pub trait Messenger: Send + Sync {
    /// Ask the network for the meta of an entity.
    fn query_meta(&self, id: &EntityId);

    /// Ask the network for newer documents; `last_time` lets the peer
    /// answer only when it holds something newer.
    fn query_documents(&self, id: &EntityId, last_time: Option<Timestamp>);

    /// Ask for a group's member list. When a last-active-member hint is
    /// given the query targets that single peer instead of broadcasting.
    fn query_members(&self, group: &EntityId, hint: Option<&EntityId>);

    /// Push a document to one contact.
    fn send_document(&self, doc: &Document, to: &EntityId);

    /// Push a document to a set of members.
    fn broadcast_document(&self, doc: &Document, members: &[EntityId]);
}

/// Signature verification, delegated to the crypto library.
///
/// The structural halves (address derivation, key comparison) have
/// default implementations; only the signature math itself is abstract.
pub trait SignatureVerifier: Send + Sync {
    /// Verify `signature` over `data` with `key`.
    fn verify(&self, data: &[u8], signature: &[u8], key: &PublicKey) -> bool;

    /// Whether `meta` actually generates `id`: the derived address must
    /// match, and for seeded metas the id name must equal the seed.
    fn meta_matches_id(&self, meta: &Meta, id: &EntityId) -> bool {
        if !meta.is_valid() {
            return false;
        }
        if meta.version.has_seed() && id.name() != meta.seed.as_deref() {
            return false;
        }
        meta.generate_address(id.network()) == *id.address()
    }

    /// Whether `meta` binds the given public key.
    fn meta_matches_key(&self, meta: &Meta, key: &PublicKey) -> bool {
        meta.public_key == *key
    }
}

/// Local signing authority for the current user's own updates
/// (bulletins, group metas). Returns `None` when no private key for
/// `signer` is on this device.
pub trait Signer: Send + Sync {
    fn sign(&self, data: &[u8], signer: &EntityId) -> Option<Vec<u8>>;
}

/// Time source, injectable for tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// The real wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::NetworkType;
    use crate::meta::MetaVersion;

    struct NoopVerifier;
    impl SignatureVerifier for NoopVerifier {
        fn verify(&self, _data: &[u8], _signature: &[u8], _key: &PublicKey) -> bool {
            true
        }
    }

    fn seeded_meta(seed: &str) -> Meta {
        Meta::new(
            MetaVersion::Mkm,
            PublicKey::new("ECC", format!("{seed}-key").into_bytes()),
            Some(seed.to_string()),
            Some(format!("{seed}-fingerprint").into_bytes()),
        )
    }

    #[test]
    fn test_meta_matches_derived_id() {
        let meta = seeded_meta("moki");
        let id = EntityId::new(
            Some("moki".to_string()),
            meta.generate_address(NetworkType::User),
        );
        assert!(NoopVerifier.meta_matches_id(&meta, &id));
    }

    #[test]
    fn test_meta_rejects_wrong_name() {
        let meta = seeded_meta("moki");
        let id = EntityId::new(
            Some("mallory".to_string()),
            meta.generate_address(NetworkType::User),
        );
        assert!(!NoopVerifier.meta_matches_id(&meta, &id));
    }

    #[test]
    fn test_meta_rejects_wrong_address() {
        let meta = seeded_meta("moki");
        let other = seeded_meta("mallory");
        let id = EntityId::new(
            Some("moki".to_string()),
            other.generate_address(NetworkType::User),
        );
        assert!(!NoopVerifier.meta_matches_id(&meta, &id));
    }

    #[test]
    fn test_meta_matches_key() {
        let meta = seeded_meta("moki");
        assert!(NoopVerifier.meta_matches_key(&meta, &meta.public_key));
        let other = PublicKey::new("ECC", b"other".to_vec());
        assert!(!NoopVerifier.meta_matches_key(&meta, &other));
    }

    #[test]
    fn test_system_clock_advances() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
