//! Group roster state.

use serde::{Deserialize, Serialize};

use crate::id::EntityId;

/// A group's authority and membership state as currently trusted.
///
/// The founder is fixed at group creation and never changes; the owner
/// defaults to the founder and may move only through an authority
/// checked bulletin update. Member order is preserved, with the owner
/// at the head by convention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRoster {
    pub founder: EntityId,
    pub owner: EntityId,
    pub administrators: Vec<EntityId>,
    pub members: Vec<EntityId>,
}

impl GroupRoster {
    /// A fresh roster for a newly created group: the founder owns it
    /// and heads the member list.
    pub fn founded_by(founder: EntityId, members: Vec<EntityId>) -> Self {
        let mut all = members;
        all.retain(|m| *m != founder);
        all.insert(0, founder.clone());
        Self {
            owner: founder.clone(),
            founder,
            administrators: Vec::new(),
            members: all,
        }
    }

    pub fn is_founder(&self, user: &EntityId) -> bool {
        self.founder == *user
    }

    pub fn is_owner(&self, user: &EntityId) -> bool {
        self.owner == *user
    }

    pub fn is_administrator(&self, user: &EntityId) -> bool {
        self.administrators.contains(user)
    }

    pub fn is_member(&self, user: &EntityId) -> bool {
        self.members.contains(user)
    }

    /// Owner or administrator: the authority required for membership
    /// changes.
    pub fn can_manage_members(&self, user: &EntityId) -> bool {
        self.is_owner(user) || self.is_administrator(user)
    }
}
