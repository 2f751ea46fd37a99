use serde::Serialize;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Node,
    Way,
    Relation,
}

impl ElementKind {
    pub fn from_name(name: &[u8]) -> Option<ElementKind> {
        match name {
            b"node" => Some(ElementKind::Node),
            b"way" => Some(ElementKind::Way),
            b"relation" => Some(ElementKind::Relation),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Node => "node",
            ElementKind::Way => "way",
            ElementKind::Relation => "relation",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Tag {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// One top-level element of the .osm file with its child records, as it appears in the
/// file. Nothing is interpreted at this point.
#[derive(Debug, Clone, PartialEq)]
pub struct RawElement {
    pub kind: ElementKind,
    pub attributes: Vec<(String, String)>,
    pub tags: Vec<Tag>,
    pub node_refs: Vec<String>,
    /// Children other than `tag` and `nd` (relation members mostly), by element name.
    pub other_children: Vec<String>,
}

impl RawElement {
    pub fn new(kind: ElementKind) -> Self {
        RawElement {
            kind,
            attributes: Vec::new(),
            tags: Vec::new(),
            node_refs: Vec::new(),
            other_children: Vec::new(),
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[cfg(test)]
impl RawElement {
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.iter()
            .find(|tag| tag.key == key)
            .map(|tag| tag.value.as_str())
    }

    pub fn with_attribute(mut self, key: &str, value: &str) -> Self {
        self.attributes.push((key.to_string(), value.to_string()));
        self
    }

    pub fn with_tag(mut self, key: &str, value: &str) -> Self {
        self.tags.push(Tag::new(key, value));
        self
    }

    pub fn with_node_ref(mut self, id: &str) -> Self {
        self.node_refs.push(id.to_string());
        self
    }
}
