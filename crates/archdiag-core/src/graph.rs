use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Upstream stages emit `null` for fields they could not fill. Read those as the default.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// --- Types ---

/// Component kind. Unknown kinds coming from upstream stages collapse into `Other`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Default, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Actor,
    Service,
    WebApp,
    Database,
    Cache,
    Queue,
    Gateway,
    Infrastructure,
    External,
    #[default]
    #[serde(other)]
    Other,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Actor => "actor",
            NodeType::Service => "service",
            NodeType::WebApp => "web_app",
            NodeType::Database => "database",
            NodeType::Cache => "cache",
            NodeType::Queue => "queue",
            NodeType::Gateway => "gateway",
            NodeType::Infrastructure => "infrastructure",
            NodeType::External => "external",
            NodeType::Other => "other",
        }
    }

    /// Services and web applications: the nodes that call and get called.
    pub fn is_service_like(&self) -> bool {
        matches!(self, NodeType::Service | NodeType::WebApp)
    }

    /// Anything an actor can sensibly talk to first.
    pub fn is_entry_point(&self) -> bool {
        matches!(self, NodeType::Service | NodeType::WebApp | NodeType::Gateway)
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Business,
    Service,
    Data,
    Infra,
    #[serde(other)]
    Other,
}

impl Layer {
    /// Layers every complete architecture is expected to populate.
    pub const EXPECTED: [Layer; 4] = [Layer::Business, Layer::Service, Layer::Data, Layer::Infra];

    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::Business => "business",
            Layer::Service => "service",
            Layer::Data => "data",
            Layer::Infra => "infra",
            Layer::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum EdgeStyle {
    #[default]
    Solid,
    Dashed,
    Dotted,
}

/// A component in the diagram.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, schemars::JsonSchema)]
pub struct Node {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    #[schemars(with = "Option<String>")]
    pub label: String,
    #[serde(rename = "type", alias = "node_type", default, deserialize_with = "null_as_default")]
    #[schemars(with = "Option<NodeType>")]
    pub node_type: NodeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer: Option<Layer>,
    /// Clustering tag. Nodes added by pattern injection carry a `pattern_` prefix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    #[schemars(with = "Option<Vec<String>>")]
    pub details: Vec<String>,
    /// Rendering hints. Carried through repair untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl Node {
    pub fn new(id: impl Into<String>, label: impl Into<String>, node_type: NodeType) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            node_type,
            layer: None,
            group: None,
            details: Vec::new(),
            shape: None,
            color: None,
            icon: None,
        }
    }

    pub fn in_layer(mut self, layer: Layer) -> Self {
        self.layer = Some(layer);
        self
    }

    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn is_pattern_injected(&self) -> bool {
        self.group
            .as_deref()
            .is_some_and(|g| g.starts_with("pattern_"))
    }
}

/// A typed relation between two node ids.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, schemars::JsonSchema)]
pub struct Edge {
    pub source: String,
    pub target: String,
    #[serde(default, deserialize_with = "null_as_default")]
    #[schemars(with = "Option<String>")]
    pub relation: String,
    #[serde(default, deserialize_with = "null_as_default")]
    #[schemars(with = "Option<EdgeStyle>")]
    pub style: EdgeStyle,
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>, relation: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            relation: relation.into(),
            style: EdgeStyle::Solid,
        }
    }

    pub fn with_style(mut self, style: EdgeStyle) -> Self {
        self.style = style;
        self
    }

    pub fn key(&self) -> EdgeKey {
        EdgeKey {
            source: self.source.clone(),
            target: self.target.clone(),
            relation: self.relation.clone(),
        }
    }

    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }

    pub fn matches(&self, key: &EdgeKey) -> bool {
        self.source == key.source && self.target == key.target && self.relation == key.relation
    }
}

/// Identity of an edge as reported in issues: the (source, target, relation) triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeKey {
    pub source: String,
    pub target: String,
    pub relation: String,
}

impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source, self.target)
    }
}

/// The diagram: an ordered node list plus edges between node ids.
///
/// Node ids are expected to be unique but the graph tolerates duplicates so the
/// validator can report them and the fixer can rename them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, schemars::JsonSchema)]
pub struct Graph {
    #[serde(default, deserialize_with = "null_as_default")]
    #[schemars(with = "Option<Vec<Node>>")]
    pub nodes: Vec<Node>,
    #[serde(default, deserialize_with = "null_as_default")]
    #[schemars(with = "Option<Vec<Edge>>")]
    pub edges: Vec<Edge>,
    /// Layout direction for the renderer, e.g. `top-down`. Not interpreted here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<String>,
}

impl Graph {
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self {
            nodes,
            edges,
            layout: None,
        }
    }

    /// First node carrying `id`.
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_ids(&self) -> HashSet<&str> {
        self.nodes.iter().map(|n| n.id.as_str()).collect()
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.iter().any(|n| n.id == id)
    }

    /// First node, in declaration order, matching `pred`.
    pub fn find_node(&self, pred: impl Fn(&Node) -> bool) -> Option<&Node> {
        self.nodes.iter().find(|n| pred(n))
    }

    pub fn has_outgoing(&self, id: &str) -> bool {
        self.edges.iter().any(|e| e.source == id)
    }

    pub fn has_incoming(&self, id: &str) -> bool {
        self.edges.iter().any(|e| e.target == id)
    }

    /// Whether the node participates in at least one edge.
    pub fn is_connected(&self, id: &str) -> bool {
        self.edges.iter().any(|e| e.source == id || e.target == id)
    }

    pub fn contains_edge(&self, key: &EdgeKey) -> bool {
        self.edges.iter().any(|e| e.matches(key))
    }

    /// Add an edge unless it is a self-loop or an exact duplicate. Returns whether it was added.
    pub fn connect(&mut self, edge: Edge) -> bool {
        if edge.is_self_loop() || self.contains_edge(&edge.key()) {
            return false;
        }
        self.edges.push(edge);
        true
    }

    /// Drop every edge for which `pred` returns true. Returns how many were removed.
    pub fn remove_edges(&mut self, pred: impl Fn(&Edge) -> bool) -> usize {
        let before = self.edges.len();
        self.edges.retain(|e| !pred(e));
        before - self.edges.len()
    }

    /// Remove all nodes carrying `id` together with every edge touching them.
    pub fn remove_node(&mut self, id: &str) -> bool {
        let before = self.nodes.len();
        self.nodes.retain(|n| n.id != id);
        if self.nodes.len() == before {
            return false;
        }
        self.remove_edges(|e| e.source == id || e.target == id);
        true
    }

    /// Rename the node at `index`, rewriting every edge endpoint that referenced its old id.
    pub fn rename_node_at(&mut self, index: usize, new_id: &str) -> Option<String> {
        let node = self.nodes.get_mut(index)?;
        let old = std::mem::replace(&mut node.id, new_id.to_string());
        for edge in &mut self.edges {
            if edge.source == old {
                edge.source = new_id.to_string();
            }
            if edge.target == old {
                edge.target = new_id.to_string();
            }
        }
        Some(old)
    }

    /// Generate `<base>_<n>` with the smallest `n >= 1` not used by any node.
    pub fn unique_id(&self, base: &str) -> String {
        let taken = self.node_ids();
        (1u64..)
            .map(|n| format!("{}_{}", base, n))
            .find(|candidate| !taken.contains(candidate.as_str()))
            .unwrap_or_else(|| base.to_string())
    }
}
