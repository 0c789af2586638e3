use crate::graph::{Graph, NodeType};
use crate::issue::Issue;

fn label_of<'a>(id: &'a str, graph: &'a Graph) -> &'a str {
    graph
        .node(id)
        .map(|n| n.label.as_str())
        .filter(|l| !l.is_empty())
        .unwrap_or(id)
}

fn type_prefix(t: NodeType) -> &'static str {
    match t {
        NodeType::Actor => "[A]",
        NodeType::Service => "[S]",
        NodeType::WebApp => "[W]",
        NodeType::Database => "[D]",
        NodeType::Cache => "[C]",
        NodeType::Queue => "[Q]",
        NodeType::Gateway => "[G]",
        NodeType::Infrastructure => "[I]",
        NodeType::External => "[X]",
        NodeType::Other => "[?]",
    }
}

/// Convert a graph to a compact text representation for LLM consumption.
pub fn serialize_graph(graph: &Graph) -> String {
    let mut out = String::with_capacity(2048);

    out.push_str("NODES:\n");
    for node in &graph.nodes {
        out.push_str(type_prefix(node.node_type));
        out.push(' ');
        out.push_str(&node.id);
        out.push_str(" \"");
        out.push_str(&node.label);
        out.push_str("\" (");
        out.push_str(node.node_type.as_str());
        if let Some(layer) = node.layer {
            out.push_str(",layer=");
            out.push_str(layer.as_str());
        }
        if let Some(group) = &node.group {
            out.push_str(",group=");
            out.push_str(group);
        }
        out.push(')');
        if let Some(first) = node.details.first() {
            out.push_str(" | \"");
            // Truncate long annotations
            if first.chars().count() > 80 {
                out.extend(first.chars().take(80));
                out.push_str("...");
            } else {
                out.push_str(first);
            }
            out.push('"');
        }
        out.push('\n');
    }

    out.push_str("EDGES:\n");
    for edge in &graph.edges {
        let relation = if edge.relation.is_empty() { "uses" } else { edge.relation.as_str() };
        out.push_str(&edge.source);
        out.push_str(" \"");
        out.push_str(label_of(&edge.source, graph));
        out.push_str("\" --[");
        out.push_str(relation);
        out.push_str("]--> ");
        out.push_str(&edge.target);
        out.push_str(" \"");
        out.push_str(label_of(&edge.target, graph));
        out.push_str("\"\n");
    }

    out
}

const OUTPUT_FORMAT: &str = "\
Output ONLY a JSON array of new edges. \
Each item: {\"from\":\"<source node id>\",\"to\":\"<target node id>\",\"relation\":\"<short label>\"}. \
Use node ids exactly as listed. If no sensible connection exists, output [].";

fn preamble() -> String {
    format!(
        "You are an expert software architect fixing an architecture diagram.\n\n\
## Connection Rules\n{}\n\n",
        crate::rules::RULES
    )
}

/// Prompt asking for edges that attach orphaned nodes to the rest of the diagram.
pub fn orphan_prompt(graph: &Graph, orphan_ids: &[&str]) -> String {
    let mut out = preamble();
    out.push_str("The following nodes are ORPHANED (no connections):\n");
    for id in orphan_ids {
        out.push_str("- ");
        out.push_str(id);
        if let Some(node) = graph.node(id) {
            out.push_str(" (");
            out.push_str(node.node_type.as_str());
            out.push(')');
        }
        out.push('\n');
    }
    out.push('\n');
    out.push_str(&serialize_graph(graph));
    out.push_str(
        "\nSuggest connections that attach every orphaned node:\n\
- Actors should connect to services they use\n\
- Services should connect to databases they access\n\
- Services should connect to other services they depend on\n\n",
    );
    out.push_str(OUTPUT_FORMAT);
    out
}

/// Prompt asking for edges that resolve type-specific connectivity issues.
pub fn connectivity_prompt(graph: &Graph, issues: &[&Issue]) -> String {
    let mut out = preamble();
    out.push_str("These nodes have connection issues:\n");
    for issue in issues {
        let Some(id) = issue.node_id.as_deref() else {
            continue;
        };
        out.push_str("- ");
        out.push_str(id);
        out.push_str(" \"");
        out.push_str(label_of(id, graph));
        out.push_str("\" ");
        out.push_str(issue.code.as_str());
        out.push_str(": ");
        out.push_str(&issue.message);
        out.push('\n');
    }
    out.push('\n');
    out.push_str(&serialize_graph(graph));
    out.push_str(
        "\nFix the issues by suggesting appropriate connections:\n\
- ACTOR_NO_OUTGOING: connect the actor to a service it would use\n\
- DATABASE_NO_INCOMING: connect a service that reads/writes the database\n\
- ISOLATED_SERVICE: connect the service to its consumers and dependencies\n\n",
    );
    out.push_str(OUTPUT_FORMAT);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, Layer, Node};

    #[test]
    fn serializes_nodes_and_edges() {
        let g = Graph::new(
            vec![
                Node::new("user", "User", NodeType::Actor).in_layer(Layer::Business),
                Node::new("api", "", NodeType::WebApp),
            ],
            vec![Edge::new("user", "api", "")],
        );
        let text = serialize_graph(&g);
        assert!(text.contains("[A] user \"User\" (actor,layer=business)"));
        assert!(text.contains("user \"User\" --[uses]--> api \"api\""));
    }

    #[test]
    fn orphan_prompt_lists_orphans_and_rules() {
        let g = Graph::new(vec![Node::new("db", "Orders DB", NodeType::Database)], vec![]);
        let prompt = orphan_prompt(&g, &["db"]);
        assert!(prompt.contains("- db (database)"));
        assert!(prompt.contains("Connection Rules"));
        assert!(prompt.contains("\"from\""));
    }

    #[test]
    fn connectivity_prompt_lists_node_issues() {
        use crate::issue::IssueCode;

        let g = Graph::new(
            vec![Node::new("user", "Customer", NodeType::Actor), Node::new("web", "Web", NodeType::WebApp)],
            vec![Edge::new("web", "user", "notifies")],
        );
        let no_outgoing = Issue::warning(IssueCode::ActorNoOutgoing, "Actor has no outgoing edges").on_node("user");
        let whole_graph = Issue::warning(IssueCode::NoEdges, "no edges");
        let prompt = connectivity_prompt(&g, &[&no_outgoing, &whole_graph]);
        assert!(prompt.starts_with("You are an expert software architect"));
        assert!(prompt.contains("These nodes have connection issues:\n- user \"Customer\" ACTOR_NO_OUTGOING: Actor has no outgoing edges\n\n"));
        assert!(prompt.contains("web \"Web\" --[notifies]--> user \"Customer\""));
        assert!(!prompt.contains("no edges"));
    }
}
