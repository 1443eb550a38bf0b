use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMeta {
    pub title: String,
}

/// One typed processing node in the local engine's API format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub class_type: String,
    pub inputs: Map<String, Value>,
    #[serde(rename = "_meta", default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<NodeMeta>,
}

impl GraphNode {
    pub fn new(class_type: impl Into<String>, title: impl Into<String>, inputs: Value) -> Self {
        Self {
            class_type: class_type.into(),
            inputs: inputs.as_object().cloned().unwrap_or_default(),
            meta: Some(NodeMeta {
                title: title.into(),
            }),
        }
    }

    pub fn input(&self, key: &str) -> Option<&Value> {
        self.inputs.get(key)
    }
}

/// Reference to output `slot` of node `node_id`.
pub fn link(node_id: &str, slot: u32) -> Value {
    json!([node_id, slot])
}

/// Node id -> node, serialized as the bare object the `/prompt` endpoint expects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobGraph {
    nodes: IndexMap<String, GraphNode>,
}

impl JobGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, node: GraphNode) {
        self.nodes.insert(id.into(), node);
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    pub(crate) fn node_mut(&mut self, id: &str) -> Option<&mut GraphNode> {
        self.nodes.get_mut(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (&str, &GraphNode)> {
        self.nodes.iter().map(|(id, node)| (id.as_str(), node))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn find_by_class(&self, class_type: &str) -> Option<(&str, &GraphNode)> {
        self.nodes()
            .find(|(_, node)| node.class_type == class_type)
    }
}

/// Returned by the local engine for an accepted submission; only used to poll history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub id: String,
    pub client_id: String,
    pub submitted_at: DateTime<Utc>,
}

impl JobHandle {
    pub fn new(id: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            client_id: client_id.into(),
            submitted_at: Utc::now(),
        }
    }
}
