//! Administrator appointments.
//!
//! Only the owner may change who administers a group, and the change
//! rides on a fresh bulletin so remote peers can verify the authority
//! and the strictly newer signing time for themselves.

use std::sync::Arc;

use serde_json::json;

use courier_core::{Document, DocumentType, EntityId, Signer};

use crate::delegate::GroupDelegate;
use crate::emitter::GroupEmitter;

pub struct GroupAdminManager {
    delegate: Arc<GroupDelegate>,
    emitter: Arc<GroupEmitter>,
    signer: Arc<dyn Signer>,
}

impl GroupAdminManager {
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

    fn current_user(&self) -> Option<EntityId> {
        self.delegate
            .archivist()
            .store()
            .local_users()
            .ok()?
            .first()
            .cloned()
    }

    /// Replace the administrator list. Issues a new owner-signed
    /// bulletin carrying the list, admits it through the validating
    /// archive, then broadcasts it to the members.
    pub fn update_administrators(&self, admins: &[EntityId], group: &EntityId) -> bool {
        let Some(me) = self.current_user() else {
            return false;
        };
        if !self.delegate.is_owner(&me, group) {
            tracing::info!(user = %me, group = %group, "admin update refused: not the owner");
            return false;
        }
        // admins must come from the membership, and the owner is
        // already above them
        let members = self.delegate.members(group);
        if admins
            .iter()
            .any(|admin| *admin == me || !members.contains(admin))
        {
            tracing::info!(group = %group, "admin update refused: candidate outside membership");
            return false;
        }

        let now = self.delegate.checker().clock().now();
        if self.delegate.is_history_time_stale(now, group) {
            tracing::debug!(group = %group, "admin update refused: stale history time");
            return false;
        }
        let mut bulletin = Document::new(group.clone(), DocumentType::Bulletin, now);
        if let Some(previous) = self.delegate.bulletin(group) {
            bulletin.properties = previous.properties.clone();
        }
        let admin_strings: Vec<String> = admins.iter().map(|id| id.to_string()).collect();
        bulletin.set_property("administrators", json!(admin_strings));
        let Some(signature) = self.signer.sign(&bulletin.signable_data(), &me) else {
            tracing::warn!(group = %group, "admin update failed: no signing key");
            return false;
        };
        bulletin.signature = signature;

        if !self.delegate.save_document(&bulletin) {
            tracing::warn!(group = %group, "admin bulletin rejected by archive");
            return false;
        }
        if !self.delegate.save_administrators(admins, group) {
            return false;
        }
        self.delegate.record_history_time(now, group);
        self.emitter.broadcast_group_document(&bulletin);
        true
    }
}
