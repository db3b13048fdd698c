use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Graph (vocabulary partition) identifier, assigned by the content store.
pub type GraphId = Uuid;
/// Concept identifier, unique within a graph.
pub type ConceptId = Uuid;
/// Index document key, see [`document_id`].
pub type DocumentId = String;

/// Display data carried verbatim into the index document.
pub type DisplayFields = serde_json::Map<String, serde_json::Value>;

/// Deterministic document key for a graph-scoped entity.
///
/// The same `(graph, entity)` pair always maps to the same key, which is what
/// makes repeated bulk upserts overwrite instead of duplicate.
pub fn document_id(graph_id: GraphId, entity_id: Uuid) -> DocumentId {
    format!("{}/{}", graph_id, entity_id)
}

/// Where a document lives in the backend: index name plus optional mapping type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexTarget {
    pub index: String,
    pub doc_type: Option<String>,
}

impl IndexTarget {
    pub fn new(index: impl Into<String>, doc_type: Option<String>) -> Self {
        Self {
            index: index.into(),
            doc_type,
        }
    }
}

/// Minimal graph metadata returned by the content store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphMeta {
    pub id: GraphId,
    #[serde(default)]
    pub code: Option<String>,
}

/// Index-relevant projection of a concept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concept {
    pub id: ConceptId,
    pub graph_id: GraphId,
    #[serde(default)]
    pub broader_ids: BTreeSet<ConceptId>,
    #[serde(default)]
    pub narrower_ids: BTreeSet<ConceptId>,
    #[serde(default)]
    pub display: DisplayFields,
}

const RESERVED_CONCEPT_KEYS: [&str; 4] = ["id", "vocabulary", "broader", "narrower"];

impl Concept {
    pub fn new(graph_id: GraphId, id: ConceptId) -> Self {
        Self {
            id,
            graph_id,
            broader_ids: BTreeSet::new(),
            narrower_ids: BTreeSet::new(),
            display: DisplayFields::new(),
        }
    }

    pub fn with_broader(mut self, ids: impl IntoIterator<Item = ConceptId>) -> Self {
        self.broader_ids.extend(ids);
        self
    }

    pub fn with_narrower(mut self, ids: impl IntoIterator<Item = ConceptId>) -> Self {
        self.narrower_ids.extend(ids);
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.display.insert(key.into(), value);
        self
    }

    pub fn document_id(&self) -> DocumentId {
        document_id(self.graph_id, self.id)
    }

    /// Both edge directions, the set the closure resolver walks.
    pub fn related_ids(&self) -> impl Iterator<Item = &ConceptId> {
        self.broader_ids.iter().chain(self.narrower_ids.iter())
    }

    /// Render into the index document body.
    ///
    /// `{"id", "vocabulary": {"id"}, "broader": [..], "narrower": [..], ..display}`
    pub fn to_document(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        map.insert("id".to_string(), serde_json::json!(self.id));
        map.insert(
            "vocabulary".to_string(),
            serde_json::json!({ "id": self.graph_id }),
        );
        map.insert("broader".to_string(), serde_json::json!(self.broader_ids));
        map.insert("narrower".to_string(), serde_json::json!(self.narrower_ids));
        for (key, value) in &self.display {
            if RESERVED_CONCEPT_KEYS.contains(&key.as_str()) {
                continue;
            }
            map.insert(key.clone(), value.clone());
        }
        serde_json::Value::Object(map)
    }

    /// Parse a concept back out of an indexed `_source` document.
    ///
    /// Used to recover the pre-mutation snapshot of a concept from the index.
    pub fn from_document(json: &serde_json::Value) -> crate::error::Result<Self> {
        use crate::error::SyncError;

        let obj = json
            .as_object()
            .ok_or_else(|| SyncError::InvalidDocument("Expected JSON object".to_string()))?;

        let id = parse_uuid(obj.get("id"), "id")?;
        let graph_id = parse_uuid(
            obj.get("vocabulary").and_then(|v| v.get("id")),
            "vocabulary.id",
        )?;

        let mut display = DisplayFields::new();
        for (key, value) in obj {
            if RESERVED_CONCEPT_KEYS.contains(&key.as_str()) {
                continue;
            }
            display.insert(key.clone(), value.clone());
        }

        Ok(Concept {
            id,
            graph_id,
            broader_ids: parse_id_list(obj.get("broader")),
            narrower_ids: parse_id_list(obj.get("narrower")),
            display,
        })
    }
}

fn parse_uuid(value: Option<&serde_json::Value>, field: &str) -> crate::error::Result<Uuid> {
    use crate::error::SyncError;

    let raw = value
        .and_then(|v| v.as_str())
        .ok_or_else(|| SyncError::MissingField(field.to_string()))?;
    Uuid::parse_str(raw)
        .map_err(|e| SyncError::InvalidDocument(format!("{} is not a UUID: {}", field, e)))
}

/// Accepts both `["uuid", ..]` and `[{"id": "uuid"}, ..]`; unparseable entries are dropped.
fn parse_id_list(value: Option<&serde_json::Value>) -> BTreeSet<Uuid> {
    let Some(serde_json::Value::Array(items)) = value else {
        return BTreeSet::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            serde_json::Value::String(s) => Some(s.as_str()),
            serde_json::Value::Object(o) => o.get("id").and_then(|v| v.as_str()),
            _ => None,
        })
        .filter_map(|s| Uuid::parse_str(s).ok())
        .collect()
}

/// Vocabulary listing entry: the graph's vocabulary node as the content store returns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vocabulary {
    pub id: Uuid,
    pub graph_id: GraphId,
    #[serde(default)]
    pub body: DisplayFields,
}

impl Vocabulary {
    pub fn new(graph_id: GraphId, id: Uuid) -> Self {
        Self {
            id,
            graph_id,
            body: DisplayFields::new(),
        }
    }

    /// Vocabulary documents are keyed by the vocabulary node id alone.
    pub fn document_id(&self) -> DocumentId {
        self.id.to_string()
    }

    pub fn to_document(&self) -> serde_json::Value {
        let mut map = self.body.clone();
        map.insert("id".to_string(), serde_json::json!(self.id));
        map.entry("type".to_string())
            .or_insert_with(|| serde_json::json!({ "graph": { "id": self.graph_id } }));
        serde_json::Value::Object(map)
    }
}

/// A named grouping of concepts inside a graph. Indexed alongside concepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub id: Uuid,
    pub graph_id: GraphId,
    #[serde(default)]
    pub member_ids: BTreeSet<ConceptId>,
    #[serde(default)]
    pub display: DisplayFields,
}

impl Collection {
    pub fn document_id(&self) -> DocumentId {
        document_id(self.graph_id, self.id)
    }

    pub fn to_document(&self) -> serde_json::Value {
        let mut map = self.display.clone();
        map.insert("id".to_string(), serde_json::json!(self.id));
        map.insert(
            "vocabulary".to_string(),
            serde_json::json!({ "id": self.graph_id }),
        );
        map.insert("members".to_string(), serde_json::json!(self.member_ids));
        serde_json::Value::Object(map)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityKind {
    Concept,
    Vocabulary,
    Collection,
}

/// Closed set of things that become index documents.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexEntity {
    Concept(Concept),
    Vocabulary(Vocabulary),
    Collection(Collection),
}

impl IndexEntity {
    pub fn kind(&self) -> EntityKind {
        match self {
            IndexEntity::Concept(_) => EntityKind::Concept,
            IndexEntity::Vocabulary(_) => EntityKind::Vocabulary,
            IndexEntity::Collection(_) => EntityKind::Collection,
        }
    }

    pub fn document_id(&self) -> DocumentId {
        match self {
            IndexEntity::Concept(c) => c.document_id(),
            IndexEntity::Vocabulary(v) => v.document_id(),
            IndexEntity::Collection(c) => c.document_id(),
        }
    }

    pub fn render(&self) -> serde_json::Value {
        match self {
            IndexEntity::Concept(c) => c.to_document(),
            IndexEntity::Vocabulary(v) => v.to_document(),
            IndexEntity::Collection(c) => c.to_document(),
        }
    }
}

impl From<Concept> for IndexEntity {
    fn from(c: Concept) -> Self {
        IndexEntity::Concept(c)
    }
}

impl From<Vocabulary> for IndexEntity {
    fn from(v: Vocabulary) -> Self {
        IndexEntity::Vocabulary(v)
    }
}

impl From<Collection> for IndexEntity {
    fn from(c: Collection) -> Self {
        IndexEntity::Collection(c)
    }
}
