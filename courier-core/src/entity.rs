//! Resolved domain objects held by the caches.
//!
//! A [`User`] or [`Group`] bundles an id with its currently trusted
//! meta and documents. The cache is the sole long-lived owner; callers
//! receive shared references.

use serde::{Deserialize, Serialize};

use crate::document::{last_bulletin, last_visa, Document};
use crate::id::EntityId;
use crate::meta::Meta;

/// A user as currently trusted by this client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: EntityId,
    pub meta: Option<Meta>,
    pub documents: Vec<Document>,
}

impl User {
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            meta: None,
            documents: Vec::new(),
        }
    }

    /// Current visa document, selected by latest signing time.
    pub fn visa(&self) -> Option<&Document> {
        last_visa(&self.documents)
    }
}

/// A group as currently trusted by this client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: EntityId,
    pub meta: Option<Meta>,
    pub documents: Vec<Document>,
    pub members: Vec<EntityId>,
}

impl Group {
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            meta: None,
            documents: Vec::new(),
            members: Vec::new(),
        }
    }

    /// Current bulletin document, selected by latest signing time.
    pub fn bulletin(&self) -> Option<&Document> {
        last_bulletin(&self.documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentType;
    use crate::id::{Address, NetworkType};
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_visa_selection() {
        let id = EntityId::new(
            Some("moki".to_string()),
            Address::new(NetworkType::User, "abcd1234"),
        );
        let mut user = User::new(id.clone());
        assert!(user.visa().is_none());
        user.documents.push(Document::new(
            id,
            DocumentType::Visa,
            Utc.timestamp_opt(100, 0).unwrap(),
        ));
        assert!(user.visa().is_some());
    }
}
