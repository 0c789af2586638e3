use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::graph::{Graph, Layer, NodeType};
use crate::issue::{Issue, IssueCode, Severity};

/// Only the first few cycles found are reported; enumeration is not exhaustive.
pub const MAX_REPORTED_CYCLES: usize = 3;

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct Stats {
    pub nodes: usize,
    pub edges: usize,
    pub orphaned_nodes: usize,
    pub actors: usize,
    /// Services plus web applications.
    pub services: usize,
    pub databases: usize,
    pub infrastructure: usize,
    pub by_type: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub is_complete: bool,
    pub issues: Vec<Issue>,
    pub stats: Stats,
}

impl ValidationResult {
    fn count(&self, severity: Severity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }

    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    pub fn info_count(&self) -> usize {
        self.count(Severity::Info)
    }

    pub fn has_code(&self, code: IssueCode) -> bool {
        self.issues.iter().any(|i| i.code == code)
    }

    pub fn summary(&self) -> String {
        format!(
            "{} | {} | Errors: {}, Warnings: {}, Info: {}",
            if self.is_valid { "Valid" } else { "Invalid" },
            if self.is_complete { "Complete" } else { "Incomplete" },
            self.error_count(),
            self.warning_count(),
            self.info_count(),
        )
    }

    /// Stable JSON shape handed to API callers.
    pub fn to_dict(&self) -> serde_json::Value {
        serde_json::json!({
            "is_valid": self.is_valid,
            "is_complete": self.is_complete,
            "error_count": self.error_count(),
            "warning_count": self.warning_count(),
            "info_count": self.info_count(),
            "issues": self.issues,
            "stats": self.stats,
        })
    }

    /// `Err` listing every error-severity issue as `[CODE] message`, one per line.
    pub fn into_error_report(self) -> Result<(), String> {
        if self.is_valid {
            return Ok(());
        }
        let lines: Vec<String> = self
            .issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .map(|i| format!("[{}] {}", i.code, i.message))
            .collect();
        Err(format!(
            "Diagram validation failed with {} errors:\n{}",
            lines.len(),
            lines.join("\n")
        ))
    }
}

/// Runs the fixed battery of structural checks over a graph. Never mutates its input.
#[derive(Debug, Clone, Copy, Default)]
pub struct Validator {
    /// Strict mode treats warnings as invalidating too.
    pub strict: bool,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn strict() -> Self {
        Self { strict: true }
    }

    /// Validate a possibly absent graph. `None` yields a single `EMPTY_DIAGRAM` error.
    pub fn validate_opt(&self, graph: Option<&Graph>) -> ValidationResult {
        match graph {
            Some(g) => self.validate(g),
            None => ValidationResult {
                is_valid: false,
                is_complete: false,
                issues: vec![Issue::error(IssueCode::EmptyDiagram, "Diagram is missing or empty")
                    .suggest("Ensure the pipeline generates a valid diagram")],
                stats: Stats::default(),
            },
        }
    }

    pub fn validate(&self, graph: &Graph) -> ValidationResult {
        let node_ids = graph.node_ids();

        let mut issues = Vec::new();
        issues.extend(check_empty(graph));
        issues.extend(check_duplicate_node_ids(graph));
        issues.extend(check_empty_labels(graph));
        issues.extend(check_orphaned_nodes(graph));
        issues.extend(check_missing_edge_references(graph, &node_ids));
        issues.extend(check_self_loops(graph));
        issues.extend(check_duplicate_edges(graph));
        issues.extend(check_layer_coverage(graph));
        issues.extend(check_circular_dependencies(graph));
        issues.extend(check_node_type_connections(graph));

        let stats = calculate_stats(graph, &node_ids);

        let has_errors = issues.iter().any(|i| i.severity == Severity::Error);
        let has_warnings = issues.iter().any(|i| i.severity == Severity::Warning);
        let is_valid = !has_errors && !(self.strict && has_warnings);
        let is_complete = is_valid && stats.orphaned_nodes == 0;

        tracing::debug!(
            nodes = stats.nodes,
            edges = stats.edges,
            orphans = stats.orphaned_nodes,
            issues = issues.len(),
            is_valid,
            "validated graph"
        );

        ValidationResult {
            is_valid,
            is_complete,
            issues,
            stats,
        }
    }
}

/// Validate with default (non-strict) settings.
pub fn validate(graph: &Graph) -> ValidationResult {
    Validator::new().validate(graph)
}

fn connected_ids(graph: &Graph) -> HashSet<&str> {
    graph
        .edges
        .iter()
        .flat_map(|e| [e.source.as_str(), e.target.as_str()])
        .collect()
}

fn check_empty(graph: &Graph) -> Vec<Issue> {
    let mut issues = Vec::new();
    if graph.nodes.is_empty() {
        issues.push(
            Issue::error(IssueCode::NoNodes, "Diagram has no nodes")
                .suggest("Ensure the pipeline extracts components from requirements"),
        );
    }
    if graph.edges.is_empty() && graph.nodes.len() > 1 {
        issues.push(
            Issue::warning(
                IssueCode::NoEdges,
                format!("Diagram has {} nodes but no edges", graph.nodes.len()),
            )
            .suggest("Add connections between components"),
        );
    }
    issues
}

fn check_duplicate_node_ids(graph: &Graph) -> Vec<Issue> {
    // Counted in first-appearance order so reports are deterministic.
    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for node in &graph.nodes {
        let count = counts.entry(node.id.as_str()).or_insert(0);
        if *count == 0 {
            order.push(node.id.as_str());
        }
        *count += 1;
    }
    order
        .into_iter()
        .filter_map(|id| {
            let count = counts[id];
            (count > 1).then(|| {
                Issue::error(
                    IssueCode::DuplicateNodeId,
                    format!("Duplicate node ID '{}' appears {} times", id, count),
                )
                .on_node(id)
                .suggest("Ensure each node has a unique ID")
            })
        })
        .collect()
}

fn check_empty_labels(graph: &Graph) -> Vec<Issue> {
    graph
        .nodes
        .iter()
        .filter(|n| n.label.trim().is_empty())
        .map(|n| {
            Issue::warning(IssueCode::EmptyLabel, format!("Node '{}' has empty label", n.id))
                .on_node(&n.id)
                .suggest("Add a descriptive label to the node")
        })
        .collect()
}

fn check_orphaned_nodes(graph: &Graph) -> Vec<Issue> {
    let connected = connected_ids(graph);
    let mut reported: HashSet<&str> = HashSet::new();
    graph
        .nodes
        .iter()
        .filter(|n| !connected.contains(n.id.as_str()) && reported.insert(n.id.as_str()))
        .map(|n| {
            Issue::warning(
                IssueCode::OrphanedNode,
                format!(
                    "Node '{}' ({}, type={}, group={}) has no connections",
                    n.label,
                    n.id,
                    n.node_type,
                    n.group.as_deref().unwrap_or("none"),
                ),
            )
            .on_node(&n.id)
            .suggest(format!(
                "Connect this {} to other components or remove if unused",
                n.node_type
            ))
        })
        .collect()
}

fn check_missing_edge_references(graph: &Graph, node_ids: &HashSet<&str>) -> Vec<Issue> {
    let mut issues = Vec::new();
    for edge in &graph.edges {
        if !node_ids.contains(edge.source.as_str()) {
            issues.push(
                Issue::error(
                    IssueCode::MissingSourceNode,
                    format!("Edge references non-existent source node '{}'", edge.source),
                )
                .on_edge(edge.key())
                .suggest(format!("Add node '{}' or fix the edge reference", edge.source)),
            );
        }
        if !node_ids.contains(edge.target.as_str()) {
            issues.push(
                Issue::error(
                    IssueCode::MissingTargetNode,
                    format!("Edge references non-existent target node '{}'", edge.target),
                )
                .on_edge(edge.key())
                .suggest(format!("Add node '{}' or fix the edge reference", edge.target)),
            );
        }
    }
    issues
}

fn check_self_loops(graph: &Graph) -> Vec<Issue> {
    graph
        .edges
        .iter()
        .filter(|e| e.is_self_loop())
        .map(|e| {
            Issue::warning(
                IssueCode::SelfLoop,
                format!("Edge creates self-loop on node '{}'", e.source),
            )
            .on_node(&e.source)
            .on_edge(e.key())
            .suggest("Remove self-referencing edge unless intentional")
        })
        .collect()
}

fn check_duplicate_edges(graph: &Graph) -> Vec<Issue> {
    let mut order = Vec::new();
    let mut counts: HashMap<_, usize> = HashMap::new();
    for edge in &graph.edges {
        let key = edge.key();
        let count = counts.entry(key.clone()).or_insert(0);
        if *count == 0 {
            order.push(key);
        }
        *count += 1;
    }
    order
        .into_iter()
        .filter_map(|key| {
            let count = counts[&key];
            (count > 1).then(|| {
                Issue::info(
                    IssueCode::DuplicateEdge,
                    format!(
                        "Duplicate edge '{}' -> '{}' ({}) appears {} times",
                        key.source, key.target, key.relation, count
                    ),
                )
                .on_edge(key)
                .suggest("Consider consolidating duplicate edges")
            })
        })
        .collect()
}

fn check_layer_coverage(graph: &Graph) -> Vec<Issue> {
    let present: HashSet<Layer> = graph.nodes.iter().filter_map(|n| n.layer).collect();
    Layer::EXPECTED
        .iter()
        .filter(|layer| !present.contains(layer))
        .map(|layer| {
            Issue::info(
                IssueCode::MissingLayer,
                format!("Architecture layer '{}' has no components", layer.as_str()),
            )
            .suggest(format!(
                "Consider adding {} layer components for completeness",
                layer.as_str()
            ))
        })
        .collect()
}

fn check_circular_dependencies(graph: &Graph) -> Vec<Issue> {
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in &graph.edges {
        let targets = adjacency.entry(edge.source.as_str()).or_default();
        if !targets.contains(&edge.target.as_str()) {
            targets.push(edge.target.as_str());
        }
    }

    let mut visited: HashSet<&str> = HashSet::new();
    let mut cycles: Vec<Vec<String>> = Vec::new();
    for node in &graph.nodes {
        let root = node.id.as_str();
        if visited.contains(root) {
            continue;
        }
        if let Some(cycle) = first_cycle_from(root, &adjacency, &mut visited) {
            if !cycles.contains(&cycle) {
                cycles.push(cycle);
            }
        }
    }

    cycles
        .into_iter()
        .take(MAX_REPORTED_CYCLES)
        .map(|cycle| {
            let path = cycle.join(" -> ");
            Issue::warning(
                IssueCode::CircularDependency,
                format!("Circular dependency detected: {}", path),
            )
            .suggest("Consider breaking the cycle with an intermediary or event-driven pattern")
            .with_cycle(cycle)
        })
        .collect()
}

/// Depth-first search from `root` that stops at the first back-edge.
///
/// Nodes reached before the stop stay marked visited, so a later root never
/// re-enters them: cycles hidden behind an already reported one can be missed.
fn first_cycle_from<'a>(
    root: &'a str,
    adjacency: &HashMap<&'a str, Vec<&'a str>>,
    visited: &mut HashSet<&'a str>,
) -> Option<Vec<String>> {
    let mut stack: Vec<(&'a str, usize)> = vec![(root, 0)];
    let mut on_stack: HashSet<&'a str> = HashSet::from([root]);
    visited.insert(root);

    while let Some(frame) = stack.last_mut() {
        let node = frame.0;
        let neighbours = adjacency.get(node).map(Vec::as_slice).unwrap_or(&[]);
        match neighbours.get(frame.1).copied() {
            Some(next) => {
                frame.1 += 1;
                if on_stack.contains(next) {
                    let start = stack.iter().position(|(n, _)| *n == next).unwrap_or(0);
                    let mut cycle: Vec<String> =
                        stack[start..].iter().map(|(n, _)| n.to_string()).collect();
                    cycle.push(next.to_string());
                    return Some(cycle);
                }
                if visited.insert(next) {
                    on_stack.insert(next);
                    stack.push((next, 0));
                }
            }
            None => {
                on_stack.remove(node);
                stack.pop();
            }
        }
    }
    None
}

fn check_node_type_connections(graph: &Graph) -> Vec<Issue> {
    let mut outgoing: HashMap<&str, usize> = HashMap::new();
    let mut incoming: HashMap<&str, usize> = HashMap::new();
    for edge in &graph.edges {
        *outgoing.entry(edge.source.as_str()).or_default() += 1;
        *incoming.entry(edge.target.as_str()).or_default() += 1;
    }
    let out = |id: &str| outgoing.get(id).copied().unwrap_or(0);
    let inc = |id: &str| incoming.get(id).copied().unwrap_or(0);

    let mut issues = Vec::new();
    for node in &graph.nodes {
        match node.node_type {
            NodeType::Actor if out(&node.id) == 0 => issues.push(
                Issue::warning(
                    IssueCode::ActorNoOutgoing,
                    format!("Actor '{}' has no outgoing connections", node.label),
                )
                .on_node(&node.id)
                .suggest("Connect actor to services or entry points they interact with"),
            ),
            NodeType::Database if inc(&node.id) == 0 => issues.push(
                Issue::warning(
                    IssueCode::DatabaseNoIncoming,
                    format!("Database '{}' has no incoming connections", node.label),
                )
                .on_node(&node.id)
                .suggest("Connect services that read/write to this database"),
            ),
            NodeType::Service if out(&node.id) == 0 && inc(&node.id) == 0 => issues.push(
                Issue::warning(
                    IssueCode::IsolatedService,
                    format!("Service '{}' is completely isolated", node.label),
                )
                .on_node(&node.id)
                .suggest("Connect service to its dependencies and consumers"),
            ),
            _ => {}
        }
    }
    issues
}

fn calculate_stats(graph: &Graph, node_ids: &HashSet<&str>) -> Stats {
    let mut by_type: BTreeMap<String, usize> = BTreeMap::new();
    for node in &graph.nodes {
        *by_type.entry(node.node_type.as_str().to_string()).or_default() += 1;
    }
    let of = |t: NodeType| by_type.get(t.as_str()).copied().unwrap_or(0);
    let connected = connected_ids(graph);

    Stats {
        nodes: graph.nodes.len(),
        edges: graph.edges.len(),
        orphaned_nodes: node_ids.difference(&connected).count(),
        actors: of(NodeType::Actor),
        services: of(NodeType::Service) + of(NodeType::WebApp),
        databases: of(NodeType::Database),
        infrastructure: of(NodeType::Infrastructure),
        by_type,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, Node};

    fn codes(result: &ValidationResult) -> Vec<IssueCode> {
        result.issues.iter().map(|i| i.code).collect()
    }

    #[test]
    fn empty_graph_is_a_single_error_plus_layers() {
        let result = validate(&Graph::default());
        assert!(!result.is_valid);
        assert!(!result.is_complete);
        assert_eq!(result.error_count(), 1);
        assert!(result.has_code(IssueCode::NoNodes));
        assert!(!result.has_code(IssueCode::NoEdges));
    }

    #[test]
    fn absent_graph_reports_empty_diagram() {
        let result = Validator::new().validate_opt(None);
        assert_eq!(codes(&result), vec![IssueCode::EmptyDiagram]);
        assert!(!result.is_valid);
    }

    #[test]
    fn strict_mode_rejects_warnings() {
        let g = Graph::new(
            vec![
                Node::new("a", "", NodeType::Service),
                Node::new("b", "B", NodeType::Service),
            ],
            vec![Edge::new("a", "b", "calls")],
        );
        assert!(Validator::new().validate(&g).is_valid);
        assert!(!Validator::strict().validate(&g).is_valid);
    }

    #[test]
    fn self_loop_is_also_a_one_node_cycle() {
        let g = Graph::new(
            vec![Node::new("a", "A", NodeType::Service)],
            vec![Edge::new("a", "a", "calls")],
        );
        let result = validate(&g);
        assert!(result.has_code(IssueCode::SelfLoop));
        let cycle = result
            .issues
            .iter()
            .find(|i| i.code == IssueCode::CircularDependency)
            .unwrap();
        assert_eq!(cycle.cycle, vec!["a", "a"]);
    }

    #[test]
    fn at_most_three_cycles_are_reported() {
        let mut nodes = Vec::new();
        let mut edges = Vec::new();
        for i in 0..5 {
            let a = format!("a{i}");
            let b = format!("b{i}");
            nodes.push(Node::new(a.clone(), "A", NodeType::Service));
            nodes.push(Node::new(b.clone(), "B", NodeType::Service));
            edges.push(Edge::new(a.clone(), b.clone(), "calls"));
            edges.push(Edge::new(b, a, "calls"));
        }
        let result = validate(&Graph::new(nodes, edges));
        let cycles = result
            .issues
            .iter()
            .filter(|i| i.code == IssueCode::CircularDependency)
            .count();
        assert_eq!(cycles, MAX_REPORTED_CYCLES);
    }

    #[test]
    fn stats_count_types_and_orphans() {
        let g = Graph::new(
            vec![
                Node::new("u", "User", NodeType::Actor),
                Node::new("w", "Web", NodeType::WebApp),
                Node::new("s", "Svc", NodeType::Service),
                Node::new("d", "DB", NodeType::Database),
            ],
            vec![Edge::new("u", "w", "uses")],
        );
        let stats = validate(&g).stats;
        assert_eq!(stats.nodes, 4);
        assert_eq!(stats.edges, 1);
        assert_eq!(stats.orphaned_nodes, 2);
        assert_eq!(stats.services, 2);
        assert_eq!(stats.by_type["database"], 1);
    }

    #[test]
    fn error_report_lists_errors_only() {
        let g = Graph::new(
            vec![Node::new("a", "A", NodeType::Service)],
            vec![Edge::new("a", "ghost", "calls")],
        );
        let report = Validator::strict().validate(&g).into_error_report().unwrap_err();
        assert!(report.contains("[MISSING_TARGET_NODE]"));
        assert!(!report.contains("MISSING_LAYER"));
    }
}
