//! Membership management.
//!
//! Every state-changing operation runs the same two-phase pattern:
//! local authority plus monotonic history-time check first, persist
//! only on success, and report any failure as a routine `false` with
//! no partial mutation.

use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use courier_core::{
    Document, DocumentType, EntityId, Meta, MetaVersion, NetworkType, Signer, Timestamp,
};

use crate::delegate::GroupDelegate;
use crate::emitter::GroupEmitter;

pub struct GroupManager {
    delegate: Arc<GroupDelegate>,
    emitter: Arc<GroupEmitter>,
    signer: Arc<dyn Signer>,
}

impl GroupManager {
    pub fn new(
        delegate: Arc<GroupDelegate>,
        emitter: Arc<GroupEmitter>,
        signer: Arc<dyn Signer>,
    ) -> Self {
        Self {
            delegate,
            emitter,
            signer,
        }
    }

    /// The account whose private keys live on this device.
    fn current_user(&self) -> Option<EntityId> {
        self.delegate
            .archivist()
            .store()
            .local_users()
            .ok()?
            .first()
            .cloned()
    }

    fn now(&self) -> Timestamp {
        self.delegate.checker().clock().now()
    }

    /// Create a new group: the local user becomes founder and owner and
    /// heads the member list. Returns the new group id, or `None` when
    /// the member set is too small or signing is unavailable.
    pub fn create_group(&self, members: &[EntityId]) -> Option<EntityId> {
        if members.len() < 2 {
            tracing::warn!(count = members.len(), "group needs at least two members");
            return None;
        }
        let me = self.current_user()?;
        let store = self.delegate.archivist().store();
        let my_meta = store.meta(&me).ok().flatten()?;

        // seeded group meta: the founder signs the seed, so the group
        // address is bound to the founder's key
        let seed = format!("Group-{}", Uuid::new_v4().simple());
        let fingerprint = self.signer.sign(seed.as_bytes(), &me)?;
        let group_meta = Meta::new(
            MetaVersion::Mkm,
            my_meta.public_key.clone(),
            Some(seed.clone()),
            Some(fingerprint),
        );
        let group = EntityId::new(
            Some(seed),
            group_meta.generate_address(NetworkType::Group),
        );
        if !self.delegate.archivist().save_meta(&group_meta, &group) {
            return None;
        }

        let mut all = members.to_vec();
        all.retain(|member| *member != me);
        all.insert(0, me.clone());

        let now = self.now();
        let mut bulletin = Document::new(group.clone(), DocumentType::Bulletin, now);
        bulletin.set_property("name", json!(self.delegate.build_group_name(&all)));
        bulletin.set_property("founder", json!(me.to_string()));
        bulletin.set_property("owner", json!(me.to_string()));
        bulletin.signature = self.signer.sign(&bulletin.signable_data(), &me)?;
        if !self.delegate.save_document(&bulletin) {
            tracing::warn!(group = %group, "initial bulletin rejected");
            return None;
        }

        if !self.delegate.save_members(&all, &group) {
            return None;
        }
        self.delegate.record_history_time(now, &group);
        tracing::info!(group = %group, members = all.len(), "group created");
        self.emitter.broadcast_group_document(&bulletin);
        Some(group)
    }

    /// Full member-list replacement; owner or administrator only, with
    /// a strictly newer history time.
    pub fn reset_group_members(&self, new_members: &[EntityId], group: &EntityId) -> bool {
        if new_members.is_empty() {
            return false;
        }
        let Some(me) = self.current_user() else {
            return false;
        };
        let Some(roster) = self.delegate.roster(group) else {
            return false;
        };
        if !roster.can_manage_members(&me) {
            tracing::info!(user = %me, group = %group, "reset refused: not owner or admin");
            return false;
        }
        let now = self.now();
        if self.delegate.is_history_time_stale(now, group) {
            tracing::debug!(group = %group, "reset refused: stale history time");
            return false;
        }
        let mut all = new_members.to_vec();
        all.retain(|member| *member != roster.owner);
        all.insert(0, roster.owner.clone());

        if !self.delegate.save_members(&all, group) {
            return false;
        }
        self.delegate.record_history_time(now, group);
        true
    }

    /// Incremental add. Any current member may invite; duplicate
    /// invitations are a no-op `false`.
    pub fn invite_group_members(&self, new_members: &[EntityId], group: &EntityId) -> bool {
        let Some(me) = self.current_user() else {
            return false;
        };
        let Some(roster) = self.delegate.roster(group) else {
            return false;
        };
        if !roster.is_member(&me) {
            tracing::info!(user = %me, group = %group, "invite refused: not a member");
            return false;
        }
        let now = self.now();
        if self.delegate.is_history_time_stale(now, group) {
            return false;
        }
        let added: Vec<EntityId> = new_members
            .iter()
            .filter(|candidate| !roster.is_member(candidate))
            .cloned()
            .collect();
        if added.is_empty() {
            return false;
        }
        let mut all = roster.members.clone();
        all.extend(added);

        if !self.delegate.save_members(&all, group) {
            return false;
        }
        self.delegate.record_history_time(now, group);
        true
    }

    /// Incremental remove; owner or administrator only. Expelling the
    /// owner or an administrator is refused, and expulsions that hit
    /// nobody are a no-op `false`.
    pub fn expel_group_members(&self, members: &[EntityId], group: &EntityId) -> bool {
        let Some(me) = self.current_user() else {
            return false;
        };
        let Some(roster) = self.delegate.roster(group) else {
            return false;
        };
        if !roster.can_manage_members(&me) {
            tracing::info!(user = %me, group = %group, "expel refused: not owner or admin");
            return false;
        }
        let targets: Vec<&EntityId> = members
            .iter()
            .filter(|target| roster.is_member(target))
            .collect();
        if targets.is_empty() {
            return false;
        }
        if targets
            .iter()
            .any(|target| roster.is_owner(target) || roster.is_administrator(target))
        {
            tracing::info!(group = %group, "expel refused: target holds authority");
            return false;
        }
        let now = self.now();
        if self.delegate.is_history_time_stale(now, group) {
            return false;
        }
        let remaining: Vec<EntityId> = roster
            .members
            .iter()
            .filter(|member| !members.contains(member))
            .cloned()
            .collect();

        if !self.delegate.save_members(&remaining, group) {
            return false;
        }
        self.delegate.record_history_time(now, group);
        true
    }

    /// Remove the local user from its own membership view. Locally
    /// immediate, no authority check; the rest of the network converges
    /// once an authorized update reflecting the removal propagates.
    /// Owners and administrators must hand off their role first.
    pub fn quit_group(&self, group: &EntityId) -> bool {
        let Some(me) = self.current_user() else {
            return false;
        };
        let members = self.delegate.members(group);
        if !members.contains(&me) {
            return false;
        }
        if self.delegate.is_owner(&me, group) || self.delegate.is_administrator(&me, group) {
            tracing::info!(user = %me, group = %group, "quit refused: transfer role first");
            return false;
        }
        let remaining: Vec<EntityId> = members.into_iter().filter(|m| *m != me).collect();
        tracing::info!(user = %me, group = %group, "quitting group locally");
        self.delegate.save_members(&remaining, group)
    }
}
