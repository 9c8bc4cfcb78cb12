//! Bulletin distribution.

use std::sync::Arc;

use courier_core::{Document, DocumentType, Messenger};

use crate::delegate::GroupDelegate;

/// Pushes accepted bulletins out to the current member list so every
/// peer converges on the same group state.
pub struct GroupEmitter {
    delegate: Arc<GroupDelegate>,
    messenger: Arc<dyn Messenger>,
}

impl GroupEmitter {
    pub fn new(delegate: Arc<GroupDelegate>, messenger: Arc<dyn Messenger>) -> Self {
        Self {
            delegate,
            messenger,
        }
    }

    /// Broadcast a bulletin to all known members of its group.
    /// Returns `false` when the document is not a bulletin or the
    /// member list is still unknown.
    pub fn broadcast_group_document(&self, bulletin: &Document) -> bool {
        if bulletin.doc_type != DocumentType::Bulletin {
            tracing::warn!(id = %bulletin.id, "refusing to broadcast a non-bulletin");
            return false;
        }
        let members = self.delegate.members(&bulletin.id);
        if members.is_empty() {
            tracing::debug!(group = %bulletin.id, "no members known, bulletin not sent");
            return false;
        }
        tracing::debug!(group = %bulletin.id, count = members.len(), "broadcasting bulletin");
        self.messenger.broadcast_document(bulletin, &members);
        true
    }
}
