//! Validating admission layer over the entity caches.
//!
//! The [`Archivist`] owns one cache per entity kind, decides whether an
//! inbound meta or document may be trusted, and persists only what
//! passes. Rejection is always a plain `false`: a forged or stale
//! update arriving from the network is a routine outcome, not a fault.

use std::sync::Arc;

use courier_checker::EntityChecker;
use courier_core::{
    AccountStore, Document, DocumentType, EntityId, Group, Meta, PublicKey, SignatureVerifier,
    User,
};

use crate::thanos::{MemoryCache, ThanosCache};

/// Validating cache for users and groups.
pub struct Archivist {
    users: Box<dyn MemoryCache<EntityId, User>>,
    groups: Box<dyn MemoryCache<EntityId, Group>>,
    store: Arc<dyn AccountStore>,
    verifier: Arc<dyn SignatureVerifier>,
    checker: Arc<EntityChecker>,
}

impl Archivist {
    pub fn new(
        store: Arc<dyn AccountStore>,
        verifier: Arc<dyn SignatureVerifier>,
        checker: Arc<EntityChecker>,
    ) -> Self {
        Self::with_caches(
            Self::create_user_cache(),
            Self::create_group_cache(),
            store,
            verifier,
            checker,
        )
    }

    /// Build with caller-supplied caches (differently tuned, or
    /// instrumented for tests).
    pub fn with_caches(
        users: Box<dyn MemoryCache<EntityId, User>>,
        groups: Box<dyn MemoryCache<EntityId, Group>>,
        store: Arc<dyn AccountStore>,
        verifier: Arc<dyn SignatureVerifier>,
        checker: Arc<EntityChecker>,
    ) -> Self {
        Self {
            users,
            groups,
            store,
            verifier,
            checker,
        }
    }

    /// Default user cache factory.
    pub fn create_user_cache() -> Box<dyn MemoryCache<EntityId, User>> {
        Box::new(ThanosCache::new())
    }

    /// Default group cache factory.
    pub fn create_group_cache() -> Box<dyn MemoryCache<EntityId, Group>> {
        Box::new(ThanosCache::new())
    }

    pub fn checker(&self) -> &Arc<EntityChecker> {
        &self.checker
    }

    pub fn store(&self) -> &Arc<dyn AccountStore> {
        &self.store
    }

    /// Emergency eviction across both caches; call on a low-memory
    /// signal. Returns the summed survivor count.
    pub fn reduce_memory(&self) -> usize {
        let survivors = self.users.reduce_memory() + self.groups.reduce_memory();
        tracing::info!(survivors, "memory pressure: entity caches halved");
        survivors
    }

    //
    //  Resolution
    //

    /// Cached user, built from the store on first access. A user is
    /// resolvable only once its meta is trusted.
    pub fn user(&self, id: &EntityId) -> Option<Arc<User>> {
        if id.is_broadcast() {
            return None;
        }
        if let Some(user) = self.users.get(id) {
            return Some(user);
        }
        let meta = self.store.meta(id).ok().flatten()?;
        let documents = self.store.documents(id).unwrap_or_default();
        self.users.put(
            id.clone(),
            User {
                id: id.clone(),
                meta: Some(meta),
                documents,
            },
        );
        self.users.get(id)
    }

    /// Cached group, built from the store on first access. A group is
    /// resolvable once any trusted evidence exists (meta, bulletin, or
    /// a member list).
    pub fn group(&self, id: &EntityId) -> Option<Arc<Group>> {
        if id.is_broadcast() || !id.is_group() {
            return None;
        }
        if let Some(group) = self.groups.get(id) {
            return Some(group);
        }
        let meta = self.store.meta(id).ok().flatten();
        let documents = self.store.documents(id).unwrap_or_default();
        let members = self.store.members(id).unwrap_or_default();
        if meta.is_none() && documents.is_empty() && members.is_empty() {
            return None;
        }
        self.groups.put(
            id.clone(),
            Group {
                id: id.clone(),
                meta,
                documents,
                members,
            },
        );
        self.groups.get(id)
    }

    //
    //  Checking
    //

    /// Structural meta validation: the meta must actually generate
    /// `id`. A rejected meta is never cached or persisted.
    pub fn check_meta(&self, meta: &Meta, id: &EntityId) -> bool {
        if self.verifier.meta_matches_id(meta, id) {
            true
        } else {
            tracing::warn!(entity = %id, "meta does not match id, rejected");
            false
        }
    }

    /// Lightweight validity check, independent of the signature:
    /// recognized id, signature bytes present, signing time present and
    /// not in the far future.
    pub fn check_document_valid(&self, doc: &Document) -> bool {
        if doc.id.is_broadcast() {
            return false;
        }
        if doc.signature.is_empty() {
            tracing::warn!(entity = %doc.id, "document without signature, rejected");
            return false;
        }
        let Some(time) = doc.time else {
            tracing::warn!(entity = %doc.id, "document without signing time, rejected");
            return false;
        };
        // clock skew tolerance is one respond window
        let tolerance = chrono::Duration::from_std(self.checker.config().respond_expiry)
            .unwrap_or_else(|_| chrono::Duration::seconds(600));
        let now = self.now();
        if time > now + tolerance {
            tracing::warn!(entity = %doc.id, %time, "document from the far future, rejected");
            return false;
        }
        true
    }

    fn now(&self) -> courier_core::Timestamp {
        // the checker owns the injected clock; the whole core runs on
        // one time source
        self.checker.clock().now()
    }

    /// Fast pre-filter: is this document already covered by the last
    /// accepted document time for its entity? No crypto involved.
    pub fn check_document_expired(&self, doc: &Document) -> bool {
        self.checker.is_document_expired(doc)
    }

    /// Cryptographic check against the authoritative key for the
    /// document type: the owning user's meta key for a visa or profile;
    /// for a bulletin, the current owner's or founder's key as
    /// resolvable from *currently trusted* state (never from the
    /// candidate document itself, which would let it certify its own
    /// signer).
    pub fn verify_document(&self, doc: &Document) -> bool {
        let keys = self.authoritative_keys(doc);
        if keys.is_empty() {
            tracing::debug!(entity = %doc.id, "no trusted key to verify document");
            return false;
        }
        let data = doc.signable_data();
        keys.iter()
            .any(|key| self.verifier.verify(&data, &doc.signature, key))
    }

    fn authoritative_keys(&self, doc: &Document) -> Vec<PublicKey> {
        match doc.doc_type {
            DocumentType::Visa | DocumentType::Profile => self
                .store
                .meta(&doc.id)
                .ok()
                .flatten()
                .map(|meta| meta.public_key)
                .into_iter()
                .collect(),
            DocumentType::Bulletin => self.bulletin_keys(&doc.id),
        }
    }

    /// Keys with authority over a group's bulletin: the current owner
    /// (store record, else the accepted bulletin's owner of record) and
    /// the founder (store record, else the accepted bulletin, else the
    /// group meta key, which is the founder's key by construction).
    /// Ownership transfer rides in a founder-signed bulletin, so both
    /// are acceptable signers.
    fn bulletin_keys(&self, group: &EntityId) -> Vec<PublicKey> {
        let stored = self.store.documents(group).unwrap_or_default();
        let accepted = courier_core::last_bulletin(&stored);
        let candidates = [
            self.store.owner(group).ok().flatten(),
            accepted.and_then(|doc| doc.owner()),
            self.store.founder(group).ok().flatten(),
            accepted.and_then(|doc| doc.founder()),
        ];
        let mut keys = Vec::new();
        for candidate in candidates.into_iter().flatten() {
            if let Ok(Some(meta)) = self.store.meta(&candidate) {
                if !keys.contains(&meta.public_key) {
                    keys.push(meta.public_key);
                }
            }
        }
        if let Ok(Some(group_meta)) = self.store.meta(group) {
            if !keys.contains(&group_meta.public_key) {
                keys.push(group_meta.public_key);
            }
        }
        keys
    }

    //
    //  Admission
    //

    /// Admit a meta: structural check, then persist. Accepting the
    /// same meta twice is a no-op; an existing meta is never replaced.
    pub fn save_meta(&self, meta: &Meta, id: &EntityId) -> bool {
        if !self.check_meta(meta, id) {
            return false;
        }
        if let Ok(Some(existing)) = self.store.meta(id) {
            // idempotent accept, refuse replacement
            return existing == *meta;
        }
        matches!(self.store.save_meta(meta, id), Ok(true))
    }

    /// Full document admission pipeline: structural validity, expiry
    /// pre-filter, signature, persist, advance the accepted time.
    pub fn save_document(&self, doc: &Document) -> bool {
        if !self.check_document_valid(doc) {
            return false;
        }
        if self.check_document_expired(doc) {
            tracing::debug!(entity = %doc.id, "document expired, dropped");
            return false;
        }
        if !self.verify_document(doc) {
            tracing::warn!(entity = %doc.id, "document signature failed, rejected");
            return false;
        }
        if !matches!(self.store.save_document(doc), Ok(true)) {
            return false;
        }
        if let Some(time) = doc.time {
            self.checker.set_last_document_time(time, &doc.id);
        }
        self.refresh(&doc.id);
        true
    }

    /// Rebuild the cached entity after a persisted change so the next
    /// resolution sees current documents and members.
    pub fn refresh(&self, id: &EntityId) {
        if id.is_group() {
            if let (Ok(meta), Ok(documents), Ok(members)) = (
                self.store.meta(id),
                self.store.documents(id),
                self.store.members(id),
            ) {
                self.groups.put(
                    id.clone(),
                    Group {
                        id: id.clone(),
                        meta,
                        documents,
                        members,
                    },
                );
            }
        } else if let (Ok(meta), Ok(documents)) = (self.store.meta(id), self.store.documents(id)) {
            self.users.put(
                id.clone(),
                User {
                    id: id.clone(),
                    meta,
                    documents,
                },
            );
        }
    }
}
