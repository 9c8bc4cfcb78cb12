//! Signed profile documents.
//!
//! A [`Document`] is a mutable, signed, timestamped record describing an
//! entity: a *visa* for a user, a *bulletin* for a group. Multiple
//! document types may coexist per entity; within one type only the
//! latest signing time is "current", and updates are accepted only when
//! strictly newer (the monotonicity rule enforced upstream).

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::id::EntityId;
use crate::meta::PublicKey;
use crate::Timestamp;

/// Recognized document types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    /// User profile carrying the communication key.
    Visa,
    /// Group profile carrying founder, owner and administrators.
    Bulletin,
    /// Generic profile, the fallback type.
    Profile,
}

/// A signed, timestamped profile record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: EntityId,
    pub doc_type: DocumentType,
    /// Signing time. Documents without a time sort as oldest.
    pub time: Option<Timestamp>,
    /// Free-form signed properties.
    pub properties: Map<String, Value>,
    pub signature: Vec<u8>,
}

impl Document {
    pub fn new(id: EntityId, doc_type: DocumentType, time: Timestamp) -> Self {
        Self {
            id,
            doc_type,
            time: Some(time),
            properties: Map::new(),
            signature: Vec::new(),
        }
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: Value) {
        self.properties.insert(key.into(), value);
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// The byte string covered by the signature: id, type, time and
    /// properties in one canonical JSON value.
    pub fn signable_data(&self) -> Vec<u8> {
        let value = json!({
            "did": self.id.to_string(),
            "type": self.doc_type,
            "time": self.time.map(|t| t.timestamp()),
            "data": Value::Object(self.properties.clone()),
        });
        // Object keys are sorted by serde_json's default BTreeMap backing,
        // so this serialization is stable across peers.
        serde_json::to_vec(&value).unwrap_or_default()
    }

    fn id_property(&self, key: &str) -> Option<EntityId> {
        self.property(key)?.as_str()?.parse().ok()
    }

    fn id_list_property(&self, key: &str) -> Vec<EntityId> {
        match self.property(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str())
                .filter_map(|s| s.parse().ok())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Display name, any document type.
    pub fn name(&self) -> Option<&str> {
        self.property("name")?.as_str()
    }

    /// Avatar URL (visa).
    pub fn avatar(&self) -> Option<&str> {
        self.property("avatar")?.as_str()
    }

    /// Communication key (visa).
    pub fn public_key(&self) -> Option<PublicKey> {
        serde_json::from_value(self.property("key")?.clone()).ok()
    }

    /// Group founder (bulletin).
    pub fn founder(&self) -> Option<EntityId> {
        self.id_property("founder")
    }

    /// Owner of record (bulletin).
    pub fn owner(&self) -> Option<EntityId> {
        self.id_property("owner")
    }

    /// Administrator list (bulletin).
    pub fn administrators(&self) -> Vec<EntityId> {
        self.id_list_property("administrators")
    }

    /// Group assistant bots (bulletin).
    pub fn assistants(&self) -> Vec<EntityId> {
        self.id_list_property("assistants")
    }
}

/// Whether `this_time` is not strictly after `old_time`.
///
/// Missing times never count as "before": a document with no time can
/// neither expire another nor be proven expired by one.
pub fn is_before(this_time: Option<Timestamp>, old_time: Option<Timestamp>) -> bool {
    match (this_time, old_time) {
        (Some(this), Some(old)) => this <= old,
        _ => false,
    }
}

/// Whether `doc` is expired compared to the currently stored `other`.
/// Equal signing times count as expired (strictly-newer rule).
pub fn is_expired(doc: &Document, other: &Document) -> bool {
    is_before(doc.time, other.time)
}

/// Select the latest document of the given type (any type when `None`).
pub fn last_document<'a>(
    documents: &'a [Document],
    doc_type: Option<DocumentType>,
) -> Option<&'a Document> {
    let mut newest: Option<&Document> = None;
    for doc in documents {
        if let Some(wanted) = doc_type {
            if doc.doc_type != wanted {
                continue;
            }
        }
        match newest {
            Some(best) if !is_before(best.time, doc.time) => {}
            _ => newest = Some(doc),
        }
    }
    newest
}

/// Select the latest visa document.
pub fn last_visa(documents: &[Document]) -> Option<&Document> {
    last_document(documents, Some(DocumentType::Visa))
}

/// Select the latest bulletin document.
pub fn last_bulletin(documents: &[Document]) -> Option<&Document> {
    last_document(documents, Some(DocumentType::Bulletin))
}
