//! Type-directed heuristics used when no collaborator is configured or it failed.
//!
//! Every heuristic re-checks its trigger against the current graph first, so an
//! issue already resolved by an earlier fix in the same pass is skipped.

use super::Applied;
use crate::graph::{Edge, EdgeStyle, Graph, Node, NodeType};
use crate::issue::{Issue, IssueCode};

pub(crate) fn apply(graph: &mut Graph, issues: &[&Issue]) -> Applied {
    let mut applied = Applied::default();
    for issue in issues {
        if issue.code == IssueCode::NoEdges {
            for change in create_basic_edges(graph) {
                applied.record(issue.code, change);
            }
            continue;
        }

        let Some(id) = issue.node_id.as_deref() else {
            continue;
        };
        let change = match issue.code {
            IssueCode::OrphanedNode => fix_orphan(graph, id),
            IssueCode::ActorNoOutgoing => connect_actor(graph, id),
            IssueCode::DatabaseNoIncoming => connect_database(graph, id),
            IssueCode::IsolatedService => connect_service(graph, id),
            _ => None,
        };
        if let Some(change) = change {
            tracing::debug!(code = %issue.code, node = id, change = %change, "heuristic fix");
            applied.record(issue.code, change);
        }
    }
    applied
}

fn first_id(graph: &Graph, pred: impl Fn(&Node) -> bool) -> Option<String> {
    graph.find_node(pred).map(|n| n.id.clone())
}

/// Add the edge and describe it, or `None` if it would be a self-loop or duplicate.
fn link(graph: &mut Graph, source: &str, target: &str, relation: &str, style: EdgeStyle) -> Option<String> {
    let added = graph.connect(Edge::new(source, target, relation).with_style(style));
    added.then(|| format!("Connected {} -> {} ({})", source, target, relation))
}

fn fix_orphan(graph: &mut Graph, id: &str) -> Option<String> {
    let orphan = graph.node(id)?.clone();
    if graph.is_connected(id) {
        return None;
    }

    let by_type = match orphan.node_type {
        NodeType::Actor => first_id(graph, |n| n.node_type.is_entry_point() && n.id != id)
            .and_then(|target| link(graph, id, &target, "uses", EdgeStyle::Solid)),
        NodeType::Database => first_id(graph, |n| n.node_type.is_service_like())
            .and_then(|source| link(graph, &source, id, "reads/writes", EdgeStyle::Dotted)),
        NodeType::Service | NodeType::WebApp => {
            match first_id(graph, |n| n.node_type.is_service_like() && n.id != id) {
                Some(other) => link(graph, &other, id, "calls", EdgeStyle::Solid),
                None => first_id(graph, |n| n.node_type == NodeType::Database)
                    .and_then(|db| link(graph, id, &db, "accesses", EdgeStyle::Dotted)),
            }
        }
        NodeType::Cache | NodeType::Queue | NodeType::Gateway | NodeType::Infrastructure => {
            first_id(graph, |n| n.node_type.is_service_like() && n.id != id)
                .and_then(|service| link(graph, &service, id, "uses", EdgeStyle::Solid))
        }
        NodeType::External | NodeType::Other => None,
    };
    if by_type.is_some() {
        return by_type;
    }

    if orphan.is_pattern_injected() {
        graph.remove_node(id);
        return Some(format!("Removed orphaned pattern node: {}", id));
    }

    // Prefer a node already in the edge set, otherwise any other node.
    let anchor = first_id(graph, |n| n.id != id && graph.is_connected(&n.id))
        .or_else(|| first_id(graph, |n| n.id != id))?;
    link(graph, id, &anchor, "connects to", EdgeStyle::Dashed)
}

fn connect_actor(graph: &mut Graph, id: &str) -> Option<String> {
    if graph.has_outgoing(id) {
        return None;
    }
    let target = first_id(graph, |n| n.node_type.is_entry_point() && n.id != id)?;
    link(graph, id, &target, "uses", EdgeStyle::Dashed)
}

fn connect_database(graph: &mut Graph, id: &str) -> Option<String> {
    if graph.has_incoming(id) {
        return None;
    }
    let source = first_id(graph, |n| n.node_type.is_service_like())?;
    link(graph, &source, id, "reads/writes", EdgeStyle::Dotted)
}

fn connect_service(graph: &mut Graph, id: &str) -> Option<String> {
    if graph.is_connected(id) {
        return None;
    }
    if let Some(db) = first_id(graph, |n| n.node_type == NodeType::Database) {
        return link(graph, id, &db, "accesses", EdgeStyle::Dotted);
    }
    let other = first_id(graph, |n| n.node_type.is_service_like() && n.id != id)?;
    link(graph, id, &other, "calls", EdgeStyle::Solid)
}

/// Basic hierarchy for an edgeless diagram: actors to the first service,
/// services to the first database, services chained in declaration order.
fn create_basic_edges(graph: &mut Graph) -> Vec<String> {
    if !graph.edges.is_empty() || graph.nodes.len() < 2 {
        return vec![];
    }

    let ids = |pred: fn(&Node) -> bool| -> Vec<String> {
        graph.nodes.iter().filter(|n| pred(n)).map(|n| n.id.clone()).collect()
    };
    let actors = ids(|n| n.node_type == NodeType::Actor);
    let services = ids(|n| n.node_type.is_entry_point());
    let databases = ids(|n| n.node_type == NodeType::Database);

    let mut changes = Vec::new();
    if let Some(first_service) = services.first() {
        for actor in &actors {
            changes.extend(link(graph, actor, first_service, "uses", EdgeStyle::Dashed));
        }
    }
    if let Some(first_db) = databases.first() {
        for service in &services {
            changes.extend(link(graph, service, first_db, "accesses", EdgeStyle::Dotted));
        }
    }
    for pair in services.windows(2) {
        changes.extend(link(graph, &pair[0], &pair[1], "calls", EdgeStyle::Solid));
    }
    changes
}
