//! Courier Test Utilities
//!
//! Centralized test infrastructure for the Courier workspace:
//! - In-memory fakes for every collaborator trait (account store,
//!   messenger, verifier, signer, clock)
//! - Fixture builders for ids, metas, visas and bulletins
//!
//! The fake crypto scheme is deterministic: a "signature" is the
//! SHA-256 of the signing key bytes concatenated with the data, and the
//! key for a named identity is derived from its name. Tampering with
//! either the data or the signature makes verification fail, which is
//! all the policy layer ever observes.

use chrono::{TimeZone, Utc};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use courier_core::{
    AccountStore, Clock, CourierResult, Document, DocumentType, EntityId, Messenger, Meta,
    MetaVersion, NetworkType, PublicKey, SignatureVerifier, Signer, Timestamp,
};

// ============================================================================
// FAKE CRYPTO
// ============================================================================

/// Deterministic fake signature: SHA-256(key bytes || data).
pub fn fake_signature(key: &PublicKey, data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(&key.data);
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// The key every fixture derives for a named identity.
pub fn key_for_name(name: &str) -> PublicKey {
    PublicKey::new("ECC", format!("{name}-key").into_bytes())
}

/// Verifier matching the fake signature scheme.
#[derive(Debug, Default)]
pub struct FakeVerifier;

impl SignatureVerifier for FakeVerifier {
    fn verify(&self, data: &[u8], signature: &[u8], key: &PublicKey) -> bool {
        !signature.is_empty() && signature == fake_signature(key, data)
    }
}

/// Signer matching the fake signature scheme; signs for any id that
/// carries a name.
#[derive(Debug, Default)]
pub struct FakeSigner;

impl Signer for FakeSigner {
    fn sign(&self, data: &[u8], signer: &EntityId) -> Option<Vec<u8>> {
        let name = signer.name()?;
        Some(fake_signature(&key_for_name(name), data))
    }
}

// ============================================================================
// MANUAL CLOCK
// ============================================================================

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Timestamp>,
}

impl ManualClock {
    pub fn starting_at(now: Timestamp) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Control handle over a shared [`ManualClock`].
#[derive(Clone)]
pub struct ClockHandle(Arc<ManualClock>);

impl ClockHandle {
    pub fn advance(&self, by: Duration) {
        let mut now = self.0.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += chrono::Duration::from_std(by).unwrap_or_else(|_| chrono::Duration::zero());
    }

    pub fn set(&self, to: Timestamp) {
        let mut now = self.0.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now = to;
    }

    pub fn now(&self) -> Timestamp {
        self.0.now()
    }

    /// Convenience absolute timestamp, independent of the clock state.
    pub fn at(&self, secs: i64) -> Timestamp {
        Utc.timestamp_opt(secs, 0).unwrap()
    }
}

/// A manual clock starting well above the fixture timestamps, plus its
/// control handle.
pub fn manual_clock() -> (Arc<dyn Clock>, ClockHandle) {
    let clock = Arc::new(ManualClock::starting_at(
        Utc.timestamp_opt(1_000_000, 0).unwrap(),
    ));
    (Arc::clone(&clock) as Arc<dyn Clock>, ClockHandle(clock))
}

// ============================================================================
// RECORDING MESSENGER
// ============================================================================

/// Everything the core handed to the transport, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum SentEvent {
    QueryMeta(EntityId),
    QueryDocuments(EntityId, Option<Timestamp>),
    QueryMembers(EntityId, Option<EntityId>),
    SendDocument(Document, EntityId),
    Broadcast(Document, Vec<EntityId>),
}

/// Messenger fake that records every fire-and-forget call.
#[derive(Debug, Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<SentEvent>>,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentEvent> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn sent_of(&self, predicate: impl Fn(&SentEvent) -> bool) -> usize {
        self.sent().iter().filter(|e| predicate(e)).count()
    }

    fn record(&self, event: SentEvent) {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl Messenger for RecordingMessenger {
    fn query_meta(&self, id: &EntityId) {
        self.record(SentEvent::QueryMeta(id.clone()));
    }

    fn query_documents(&self, id: &EntityId, last_time: Option<Timestamp>) {
        self.record(SentEvent::QueryDocuments(id.clone(), last_time));
    }

    fn query_members(&self, group: &EntityId, hint: Option<&EntityId>) {
        self.record(SentEvent::QueryMembers(group.clone(), hint.cloned()));
    }

    fn send_document(&self, doc: &Document, to: &EntityId) {
        self.record(SentEvent::SendDocument(doc.clone(), to.clone()));
    }

    fn broadcast_document(&self, doc: &Document, members: &[EntityId]) {
        self.record(SentEvent::Broadcast(doc.clone(), members.to_vec()));
    }
}

// ============================================================================
// IN-MEMORY ACCOUNT STORE
// ============================================================================

/// Account database fake backed by plain maps.
#[derive(Debug, Default)]
pub struct MemoryAccountStore {
    metas: RwLock<HashMap<EntityId, Meta>>,
    documents: RwLock<HashMap<EntityId, Vec<Document>>>,
    members: RwLock<HashMap<EntityId, Vec<EntityId>>>,
    administrators: RwLock<HashMap<EntityId, Vec<EntityId>>>,
    founders: RwLock<HashMap<EntityId, EntityId>>,
    owners: RwLock<HashMap<EntityId, EntityId>>,
    local_users: RwLock<Vec<EntityId>>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a local account; the first registered is the current
    /// user.
    pub fn add_local_user(&self, id: EntityId) {
        self.local_users
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(id);
    }

    pub fn set_founder(&self, group: EntityId, founder: EntityId) {
        self.founders
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(group, founder);
    }

    pub fn set_owner(&self, group: EntityId, owner: EntityId) {
        self.owners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(group, owner);
    }
}

impl AccountStore for MemoryAccountStore {
    fn meta(&self, id: &EntityId) -> CourierResult<Option<Meta>> {
        Ok(self
            .metas
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned())
    }

    fn save_meta(&self, meta: &Meta, id: &EntityId) -> CourierResult<bool> {
        self.metas
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), meta.clone());
        Ok(true)
    }

    fn documents(&self, id: &EntityId) -> CourierResult<Vec<Document>> {
        Ok(self
            .documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .unwrap_or_default())
    }

    fn save_document(&self, doc: &Document) -> CourierResult<bool> {
        let mut documents = self
            .documents
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let entry = documents.entry(doc.id.clone()).or_default();
        entry.retain(|existing| existing.doc_type != doc.doc_type);
        entry.push(doc.clone());
        Ok(true)
    }

    fn members(&self, group: &EntityId) -> CourierResult<Vec<EntityId>> {
        Ok(self
            .members
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(group)
            .cloned()
            .unwrap_or_default())
    }

    fn save_members(&self, members: &[EntityId], group: &EntityId) -> CourierResult<bool> {
        self.members
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(group.clone(), members.to_vec());
        Ok(true)
    }

    fn administrators(&self, group: &EntityId) -> CourierResult<Vec<EntityId>> {
        Ok(self
            .administrators
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(group)
            .cloned()
            .unwrap_or_default())
    }

    fn save_administrators(&self, admins: &[EntityId], group: &EntityId) -> CourierResult<bool> {
        self.administrators
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(group.clone(), admins.to_vec());
        Ok(true)
    }

    fn founder(&self, group: &EntityId) -> CourierResult<Option<EntityId>> {
        Ok(self
            .founders
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(group)
            .cloned())
    }

    fn owner(&self, group: &EntityId) -> CourierResult<Option<EntityId>> {
        Ok(self
            .owners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(group)
            .cloned())
    }

    fn local_users(&self) -> CourierResult<Vec<EntityId>> {
        Ok(self
            .local_users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }
}

/// Fresh in-memory store.
pub fn memory_store() -> Arc<MemoryAccountStore> {
    Arc::new(MemoryAccountStore::new())
}

// ============================================================================
// FIXTURES
// ============================================================================

/// A named user with a matching seeded meta and derived id.
pub fn user_fixture(name: &str) -> (EntityId, Meta) {
    let key = key_for_name(name);
    let fingerprint = fake_signature(&key, name.as_bytes());
    let meta = Meta::new(MetaVersion::Mkm, key, Some(name.to_string()), Some(fingerprint));
    let id = EntityId::new(
        Some(name.to_string()),
        meta.generate_address(NetworkType::User),
    );
    (id, meta)
}

/// A visa for `id`, signed under the fake scheme with the id's own key.
pub fn visa_fixture(id: &EntityId, time: Timestamp) -> Document {
    let name = id.name().unwrap_or("anonymous");
    let mut doc = Document::new(id.clone(), DocumentType::Visa, time);
    doc.set_property("name", json!(name));
    doc.set_property("key", serde_json::to_value(key_for_name(name)).unwrap());
    doc.signature = fake_signature(&key_for_name(name), &doc.signable_data());
    doc
}

/// A group with the given founder-first member names, its member ids,
/// and a founder-signed bulletin at t=100.
pub fn bulletin_fixture(group_name: &str, member_names: &[&str]) -> (EntityId, Vec<EntityId>, Document) {
    let members: Vec<EntityId> = member_names.iter().map(|n| user_fixture(n).0).collect();
    let founder_name = member_names.first().copied().unwrap_or("founder");
    let (founder, founder_meta) = user_fixture(founder_name);

    let group_key = founder_meta.public_key.clone();
    let group_fingerprint = fake_signature(&key_for_name(founder_name), group_name.as_bytes());
    let group_meta = Meta::new(
        MetaVersion::Mkm,
        group_key,
        Some(group_name.to_string()),
        Some(group_fingerprint),
    );
    let group = EntityId::new(
        Some(group_name.to_string()),
        group_meta.generate_address(NetworkType::Group),
    );

    let mut bulletin = Document::new(
        group.clone(),
        DocumentType::Bulletin,
        Utc.timestamp_opt(100, 0).unwrap(),
    );
    bulletin.set_property("name", json!(group_name));
    bulletin.set_property("founder", json!(founder.to_string()));
    bulletin.set_property("owner", json!(founder.to_string()));
    bulletin.signature = fake_signature(&key_for_name(founder_name), &bulletin.signable_data());

    (group, members, bulletin)
}
