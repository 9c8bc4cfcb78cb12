//! The per-entity freshness checker.
//!
//! One [`EntityChecker`] instance per client process tracks, for every
//! entity id and query kind, when the last query went out and when the
//! last response was accepted. It owns the decision "should a refresh
//! be sent right now", the monotonic sender-document-time (SDT) and
//! group-history-time (GHT) bookkeeping, and the throttled publishing
//! of the local user's own visa.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use courier_core::{
    is_before, last_document, AccountStore, CheckerConfig, Clock, Document, EntityId, Messenger,
    Meta, Timestamp,
};

use crate::gates::{FrequencyChecker, RecentTimeChecker};

/// Query-freshness and de-duplication state machine.
pub struct EntityChecker {
    config: CheckerConfig,
    store: Arc<dyn AccountStore>,
    messenger: Arc<dyn Messenger>,
    clock: Arc<dyn Clock>,
    // outbound query gates, one per query kind
    meta_queries: FrequencyChecker<EntityId>,
    document_queries: FrequencyChecker<EntityId>,
    members_queries: FrequencyChecker<EntityId>,
    // accepted-response gates
    document_responses: FrequencyChecker<EntityId>,
    visa_responses: FrequencyChecker<(EntityId, EntityId)>,
    // monotonic time families
    document_times: RecentTimeChecker<EntityId>,
    history_times: RecentTimeChecker<EntityId>,
    // most recently observed active member per group
    active_members: RwLock<HashMap<EntityId, EntityId>>,
}

impl EntityChecker {
    pub fn new(
        config: CheckerConfig,
        store: Arc<dyn AccountStore>,
        messenger: Arc<dyn Messenger>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let query_expiry = config.query_expiry;
        let respond_expiry = config.respond_expiry;
        Self {
            config,
            store,
            messenger,
            clock,
            meta_queries: FrequencyChecker::new(query_expiry),
            document_queries: FrequencyChecker::new(query_expiry),
            members_queries: FrequencyChecker::new(query_expiry),
            document_responses: FrequencyChecker::new(respond_expiry),
            visa_responses: FrequencyChecker::new(respond_expiry),
            document_times: RecentTimeChecker::new(),
            history_times: RecentTimeChecker::new(),
            active_members: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn AccountStore> {
        &self.store
    }

    /// The injected time source, shared with the validation layer so
    /// the whole core runs on one clock.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    fn now(&self) -> Timestamp {
        self.clock.now()
    }

    //
    //  Meta
    //

    /// Claim the right to send a meta query for `id`. The first caller
    /// inside a window wins; everyone else must not send.
    pub fn is_meta_query_expired(&self, id: &EntityId) -> bool {
        self.meta_queries.check_expired(id, self.now(), false)
    }

    /// Pure policy: a meta refresh has value only when nothing is known
    /// locally. Broadcast ids never need a query.
    pub fn needs_query_meta(&self, meta: Option<&Meta>, id: &EntityId) -> bool {
        if id.is_broadcast() || meta.is_some() {
            return false;
        }
        // fall back to the account database before hitting the network
        !matches!(self.store.meta(id), Ok(Some(_)))
    }

    /// Composite meta path: query when needed and not recently queried.
    /// Returns true when a new query actually went out.
    pub fn check_meta(&self, meta: Option<&Meta>, id: &EntityId) -> bool {
        if !self.needs_query_meta(meta, id) {
            return false;
        }
        self.query_meta(id)
    }

    /// Gate and send. Returns false on a duplicated query.
    pub fn query_meta(&self, id: &EntityId) -> bool {
        if !self.is_meta_query_expired(id) {
            tracing::debug!(entity = %id, "meta query duplicated, suppressed");
            return false;
        }
        tracing::info!(entity = %id, "querying meta");
        self.messenger.query_meta(id);
        true
    }

    //
    //  Documents
    //

    /// Claim the right to send a documents query for `id`.
    pub fn is_documents_query_expired(&self, id: &EntityId) -> bool {
        self.document_queries.check_expired(id, self.now(), false)
    }

    /// Whether a fresh document response for `id` would still be
    /// worth re-validating. `force` means the caller has independent
    /// evidence the remote document changed and bypasses the window.
    pub fn is_document_response_expired(&self, id: &EntityId, force: bool) -> bool {
        self.document_responses.check_expired(id, self.now(), force)
    }

    /// Newest signing time among the held documents.
    pub fn last_time_of_documents(&self, documents: &[Document], id: &EntityId) -> Option<Timestamp> {
        if documents.iter().any(|doc| doc.time.is_none()) {
            tracing::warn!(entity = %id, "document without signing time");
        }
        last_document(documents, None).and_then(|doc| doc.time)
    }

    /// Pure policy: true when nothing is held, or the remote side is
    /// known (via SDT) to have signed something newer than we hold.
    pub fn needs_query_documents(&self, documents: &[Document], id: &EntityId) -> bool {
        if id.is_broadcast() {
            return false;
        }
        if documents.is_empty() {
            return true;
        }
        let current = self.last_time_of_documents(documents, id);
        match self.last_document_time(id) {
            Some(stored) => current.map_or(true, |held| held < stored),
            None => false,
        }
    }

    /// Composite documents path.
    pub fn check_documents(&self, documents: &[Document], id: &EntityId) -> bool {
        if !self.needs_query_documents(documents, id) {
            return false;
        }
        self.query_documents(documents, id)
    }

    /// Gate and send; the newest held time rides along so the peer can
    /// answer only when it holds something newer.
    pub fn query_documents(&self, documents: &[Document], id: &EntityId) -> bool {
        if !self.is_documents_query_expired(id) {
            tracing::debug!(entity = %id, "documents query duplicated, suppressed");
            return false;
        }
        let last_time = self.last_time_of_documents(documents, id);
        tracing::info!(entity = %id, ?last_time, "querying documents");
        self.messenger.query_documents(id, last_time);
        true
    }

    /// Advance the sender-document-time for `id`; fails without
    /// mutation unless strictly newer.
    pub fn set_last_document_time(&self, time: Timestamp, id: &EntityId) -> bool {
        self.document_times.set_last_time(id, time)
    }

    /// Last known SDT, falling back to the newest stored document.
    pub fn last_document_time(&self, id: &EntityId) -> Option<Timestamp> {
        if let Some(time) = self.document_times.last_time(id) {
            return Some(time);
        }
        let documents = self.store.documents(id).ok()?;
        last_document(&documents, None).and_then(|doc| doc.time)
    }

    /// Whether `doc` is already covered by the last accepted document
    /// time for its entity (fast pre-filter, no crypto).
    pub fn is_document_expired(&self, doc: &Document) -> bool {
        is_before(doc.time, self.last_document_time(&doc.id))
    }

    //
    //  Members
    //

    /// Claim the right to send a members query for `group`.
    pub fn is_members_query_expired(&self, group: &EntityId) -> bool {
        self.members_queries.check_expired(group, self.now(), false)
    }

    /// Remember the most recently observed active member; it becomes
    /// the target of the next members query.
    pub fn set_last_active_member(&self, member: EntityId, group: EntityId) {
        let mut hints = self
            .active_members
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        hints.insert(group, member);
    }

    pub fn last_active_member(&self, group: &EntityId) -> Option<EntityId> {
        let hints = self
            .active_members
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        hints.get(group).cloned()
    }

    /// Pure policy: a members refresh has value only when the local
    /// member list is empty.
    pub fn needs_query_members(&self, members: &[EntityId], group: &EntityId) -> bool {
        if group.is_broadcast() || !members.is_empty() {
            return false;
        }
        self.store
            .members(group)
            .map_or(true, |stored| stored.is_empty())
    }

    /// Composite members path.
    pub fn check_members(&self, members: &[EntityId], group: &EntityId) -> bool {
        if !self.needs_query_members(members, group) {
            return false;
        }
        self.query_members(members, group)
    }

    /// Gate and send, targeting the last active member when one is
    /// known instead of broadcasting to the whole group.
    pub fn query_members(&self, _members: &[EntityId], group: &EntityId) -> bool {
        if !self.is_members_query_expired(group) {
            tracing::debug!(group = %group, "members query duplicated, suppressed");
            return false;
        }
        let hint = self.last_active_member(group);
        tracing::info!(group = %group, hint = hint.as_ref().map(tracing::field::display), "querying members");
        self.messenger.query_members(group, hint.as_ref());
        true
    }

    /// Advance the group-history-time; fails without mutation unless
    /// strictly newer.
    pub fn set_last_history_time(&self, time: Timestamp, group: &EntityId) -> bool {
        self.history_times.set_last_time(group, time)
    }

    pub fn last_history_time(&self, group: &EntityId) -> Option<Timestamp> {
        self.history_times.last_time(group)
    }

    //
    //  Responding
    //

    /// Push the local user's own visa to a contact. Throttled per
    /// receiver by the respond window unless `updated` forces a send.
    pub fn send_visa(&self, visa: &Document, to: &EntityId, updated: bool) -> bool {
        let key = (to.clone(), visa.id.clone());
        if !self.visa_responses.check_expired(&key, self.now(), updated) {
            tracing::debug!(receiver = %to, "visa respond duplicated, suppressed");
            return false;
        }
        tracing::info!(receiver = %to, owner = %visa.id, "sending visa");
        self.messenger.send_document(visa, to);
        true
    }
}
