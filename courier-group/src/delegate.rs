//! Role resolution and roster access.

use std::sync::Arc;

use courier_archive::Archivist;
use courier_checker::EntityChecker;
use courier_core::{
    last_bulletin, AccountStore, Document, EntityId, GroupRoster, Timestamp,
};

/// Answers "who is what" questions about a group from currently
/// trusted local state only. Pure lookups, no network I/O.
pub struct GroupDelegate {
    archivist: Arc<Archivist>,
}

impl GroupDelegate {
    pub fn new(archivist: Arc<Archivist>) -> Self {
        Self { archivist }
    }

    pub fn archivist(&self) -> &Arc<Archivist> {
        &self.archivist
    }

    pub fn checker(&self) -> &Arc<EntityChecker> {
        self.archivist.checker()
    }

    fn store(&self) -> &Arc<dyn AccountStore> {
        self.archivist.store()
    }

    /// The accepted bulletin for a group, selected by latest signing
    /// time.
    pub fn bulletin(&self, group: &EntityId) -> Option<Document> {
        let documents = self.store().documents(group).ok()?;
        last_bulletin(&documents).cloned()
    }

    /// Admit a document through the validating archive.
    pub fn save_document(&self, doc: &Document) -> bool {
        self.archivist.save_document(doc)
    }

    //
    //  Members
    //

    /// Deterministic group name: display names of the sorted member
    /// list, joined. Independently computed names agree on every peer
    /// without any consensus traffic.
    pub fn build_group_name(&self, members: &[EntityId]) -> String {
        let mut sorted = members.to_vec();
        sorted.sort();
        let names: Vec<String> = sorted.iter().map(|id| self.name_of(id)).collect();
        names.join(", ")
    }

    fn name_of(&self, id: &EntityId) -> String {
        if let Some(user) = self.archivist.user(id) {
            if let Some(name) = user.visa().and_then(|visa| visa.name()) {
                return name.to_string();
            }
        }
        match id.name() {
            Some(name) => name.to_string(),
            None => id.address().to_string(),
        }
    }

    pub fn members(&self, group: &EntityId) -> Vec<EntityId> {
        self.store().members(group).unwrap_or_default()
    }

    /// Persist a new member list and refresh the cached group.
    pub fn save_members(&self, members: &[EntityId], group: &EntityId) -> bool {
        if !matches!(self.store().save_members(members, group), Ok(true)) {
            return false;
        }
        self.archivist.refresh(group);
        true
    }

    //
    //  Administrators
    //

    pub fn administrators(&self, group: &EntityId) -> Vec<EntityId> {
        let stored = self.store().administrators(group).unwrap_or_default();
        if !stored.is_empty() {
            return stored;
        }
        // fall back to the accepted bulletin
        self.bulletin(group)
            .map(|doc| doc.administrators())
            .unwrap_or_default()
    }

    pub fn save_administrators(&self, admins: &[EntityId], group: &EntityId) -> bool {
        matches!(self.store().save_administrators(admins, group), Ok(true))
    }

    //
    //  Membership
    //

    /// The founder: store record, else the accepted bulletin, else the
    /// group meta key compared against the candidate's meta key (the
    /// group meta is generated by the founder, so the keys agree).
    pub fn founder(&self, group: &EntityId) -> Option<EntityId> {
        if let Ok(Some(founder)) = self.store().founder(group) {
            return Some(founder);
        }
        self.bulletin(group).and_then(|doc| doc.founder())
    }

    /// The current owner, defaulting to the founder.
    pub fn owner(&self, group: &EntityId) -> Option<EntityId> {
        if let Ok(Some(owner)) = self.store().owner(group) {
            return Some(owner);
        }
        if let Some(owner) = self.bulletin(group).and_then(|doc| doc.owner()) {
            return Some(owner);
        }
        self.founder(group)
    }

    pub fn is_founder(&self, user: &EntityId, group: &EntityId) -> bool {
        if let Some(founder) = self.founder(group) {
            return founder == *user;
        }
        // last resort: the group meta carries the founder's key
        let group_key = self
            .store()
            .meta(group)
            .ok()
            .flatten()
            .map(|meta| meta.public_key);
        let user_key = self
            .store()
            .meta(user)
            .ok()
            .flatten()
            .map(|meta| meta.public_key);
        match (group_key, user_key) {
            (Some(gk), Some(uk)) => gk == uk,
            _ => false,
        }
    }

    pub fn is_owner(&self, user: &EntityId, group: &EntityId) -> bool {
        match self.owner(group) {
            Some(owner) => owner == *user,
            None => false,
        }
    }

    pub fn is_member(&self, user: &EntityId, group: &EntityId) -> bool {
        self.members(group).contains(user)
    }

    pub fn is_administrator(&self, user: &EntityId, group: &EntityId) -> bool {
        self.administrators(group).contains(user)
    }

    /// Assemble the full trusted roster, if enough is known.
    pub fn roster(&self, group: &EntityId) -> Option<GroupRoster> {
        let founder = self.founder(group)?;
        let owner = self.owner(group)?;
        Some(GroupRoster {
            founder,
            owner,
            administrators: self.administrators(group),
            members: self.members(group),
        })
    }

    /// Whether `time` would fail the strictly-newer history rule.
    /// Read-only: claims nothing, so a later failure leaves no trace.
    pub fn is_history_time_stale(&self, time: Timestamp, group: &EntityId) -> bool {
        self.checker()
            .last_history_time(group)
            .is_some_and(|stored| time <= stored)
    }

    /// Record an accepted group history time; see the checker for the
    /// strictly-newer rule. Call only after the matching state change
    /// has been persisted.
    pub fn record_history_time(&self, time: Timestamp, group: &EntityId) -> bool {
        self.checker().set_last_history_time(time, group)
    }
}
