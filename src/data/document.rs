use std::collections::BTreeMap;

use serde::Serialize;

use super::osm::ElementKind;

/// Keys the document sets itself. Plain attributes and tags never overwrite them.
pub const STRUCTURED_KEYS: [&str; 6] = ["type", "created", "pos", "address", "other_names", "node_refs"];

/// Provenance attributes of an element.
#[derive(Serialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct Created {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changeset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}

impl Created {
    /// Stores `value` if `key` is one of the provenance attributes. Returns false otherwise.
    pub fn set(&mut self, key: &str, value: &str) -> bool {
        let slot = match key {
            "version" => &mut self.version,
            "changeset" => &mut self.changeset,
            "timestamp" => &mut self.timestamp,
            "user" => &mut self.user,
            "uid" => &mut self.uid,
            _ => return false,
        };
        *slot = Some(value.to_string());
        true
    }
}

/// Normalized, document-store ready version of a node or a way.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Document {
    #[serde(rename = "type")]
    pub kind: ElementKind,
    pub created: Created,
    pub pos: [f64; 2],
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub address: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub other_names: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_refs: Option<Vec<String>>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, String>,
}

impl Document {
    pub fn new(kind: ElementKind) -> Self {
        Document {
            kind,
            created: Created::default(),
            pos: [0.0, 0.0],
            address: BTreeMap::new(),
            other_names: BTreeMap::new(),
            node_refs: None,
            fields: BTreeMap::new(),
        }
    }

    /// Sets a top-level scalar. Later values for the same key win.
    pub fn set_field(&mut self, key: &str, value: &str) {
        if STRUCTURED_KEYS.contains(&key) {
            return;
        }
        self.fields.insert(key.to_string(), value.to_string());
    }
}
