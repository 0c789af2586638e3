use std::cell::RefCell;

use archdiag_core::{
    validate, validate_and_fix, CollaboratorError, Edge, FixType, Fixer, Graph, IssueCode, Node, NodeType,
    Severity,
};

fn node(id: &str, node_type: NodeType) -> Node {
    Node::new(id, id.to_uppercase(), node_type)
}

fn codes(graph: &Graph) -> Vec<IssueCode> {
    validate(graph).issues.into_iter().map(|i| i.code).collect()
}

/// Orders scenario: duplicate id, self-loop, isolated database.
fn orders_graph() -> Graph {
    Graph::new(
        vec![
            node("user", NodeType::Actor),
            node("api", NodeType::WebApp),
            node("orders", NodeType::Service),
            node("orders", NodeType::Service),
            node("ordersDb", NodeType::Database),
        ],
        vec![
            Edge::new("user", "api", "uses"),
            Edge::new("api", "orders", "calls"),
            Edge::new("orders", "orders", "retries"),
        ],
    )
}

#[test]
fn duplicate_ids_are_renamed() {
    let g = Graph::new(
        vec![node("x", NodeType::Service), node("x", NodeType::Service), node("y", NodeType::Service)],
        vec![Edge::new("y", "x", "calls")],
    );
    let (fixed, result) = Fixer::new().fix(&g, None);

    let ids: Vec<&str> = fixed.nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids.iter().filter(|id| **id == "x").count(), 1);
    assert!(ids.contains(&"x_1"));
    for edge in &fixed.edges {
        assert!(fixed.contains_node(&edge.source) && fixed.contains_node(&edge.target));
    }
    assert!(result.issues_fixed.contains(&IssueCode::DuplicateNodeId));
    assert!(!codes(&fixed).contains(&IssueCode::DuplicateNodeId));
}

#[test]
fn dangling_edge_is_removed() {
    let g = Graph::new(
        vec![node("user", NodeType::Actor), node("a", NodeType::Service)],
        vec![Edge::new("user", "a", "uses"), Edge::new("a", "ghost", "calls")],
    );
    let (fixed, result) = Fixer::new().fix(&g, None);

    assert!(!fixed.edges.iter().any(|e| e.target == "ghost"));
    assert!(!codes(&fixed).contains(&IssueCode::MissingTargetNode));
    assert!(result.changes_made.iter().any(|c| c == "Removed edge with missing target: a -> ghost"));
    assert!(result.success);
}

#[test]
fn orphan_database_is_connected_by_fallback() {
    let g = Graph::new(
        vec![node("user", NodeType::Actor), node("svc", NodeType::Service), node("db", NodeType::Database)],
        vec![Edge::new("user", "svc", "uses")],
    );
    let (fixed, _, result) = validate_and_fix(&g, None);

    assert!(fixed.has_incoming("db"));
    let remaining = codes(&fixed);
    assert!(!remaining.contains(&IssueCode::OrphanedNode));
    assert!(!remaining.contains(&IssueCode::DatabaseNoIncoming));
    assert_eq!(result.fix_type, FixType::Fallback);
}

#[test]
fn lone_orphan_terminates_with_remaining_issues() {
    let g = Graph::new(vec![node("stripe", NodeType::External)], vec![]);
    let fixer = Fixer::new().max_iterations(3);
    let (fixed, result) = fixer.fix(&g, None);

    assert!(result.iterations <= 3);
    assert!(result.issues_remaining.contains(&IssueCode::OrphanedNode));
    assert!(fixed.edges.is_empty());
}

#[test]
fn mutually_isolated_externals_get_linked() {
    let g = Graph::new(
        vec![node("stripe", NodeType::External), node("twilio", NodeType::External)],
        vec![],
    );
    let (fixed, result) = Fixer::new().max_iterations(3).fix(&g, None);

    assert!(result.iterations <= 3);
    assert!(fixed.contains_edge(&Edge::new("stripe", "twilio", "connects to").key()));
    assert!(!result.issues_remaining.contains(&IssueCode::OrphanedNode));
    assert!(result.issues_remaining.contains(&IssueCode::MissingLayer));
    assert_eq!(result.fix_type, FixType::Fallback);
    assert!(result.success);
}

#[test]
fn orders_scenario_end_to_end() {
    let g = orders_graph();
    let (fixed, validation, result) = validate_and_fix(&g, None);

    let mut ids: Vec<&str> = fixed.nodes.iter().map(|n| n.id.as_str()).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 5);
    assert!(fixed.nodes.iter().any(|n| n.id.starts_with("orders_")));
    assert!(!fixed.edges.iter().any(|e| e.is_self_loop()));
    assert!(fixed.has_incoming("ordersDb"));
    assert!(validation.is_valid);
    assert!(result.success);
    assert!(!result.llm_used);
    for code in [IssueCode::DuplicateNodeId, IssueCode::SelfLoop] {
        assert!(result.issues_fixed.contains(&code));
    }
}

#[test]
fn input_graph_is_never_mutated() {
    let g = orders_graph();
    let snapshot = g.clone();
    let _ = validate_and_fix(&g, None);
    let _ = Fixer::new().fix(&g, None);
    assert_eq!(g, snapshot);
}

#[test]
fn supplied_validation_is_reused_for_first_iteration() {
    let g = orders_graph();
    let initial = validate(&g);
    let (with_supplied, _) = Fixer::new().fix(&g, Some(&initial));
    let (without, _) = Fixer::new().fix(&g, None);
    assert_eq!(with_supplied, without);
}

#[test]
fn collaborator_suggestions_are_applied() {
    let prompts = RefCell::new(Vec::new());
    let scripted = |prompt: &str| -> Result<String, CollaboratorError> {
        prompts.borrow_mut().push(prompt.to_string());
        Ok("Here are the edges:\n[{\"from\": \"svc\", \"to\": \"db\", \"relation\": \"persists\"}]".to_string())
    };
    let g = Graph::new(
        vec![node("user", NodeType::Actor), node("svc", NodeType::Service), node("db", NodeType::Database)],
        vec![Edge::new("user", "svc", "uses")],
    );

    let (fixed, validation, result) = Fixer::new().collaborator(&scripted).validate_and_fix(&g);

    assert!(fixed.contains_edge(&Edge::new("svc", "db", "persists").key()));
    assert!(result.llm_used);
    assert_eq!(result.fix_type, FixType::Llm);
    assert!(validation.is_complete);
    let prompts = prompts.borrow();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("ORPHANED"));
    assert!(prompts[0].contains("- db (database)"));
}

#[test]
fn collaborator_failure_falls_back() {
    let unavailable =
        |_: &str| -> Result<String, CollaboratorError> { Err(CollaboratorError::Unavailable("offline".into())) };
    let g = Graph::new(
        vec![node("user", NodeType::Actor), node("svc", NodeType::Service), node("db", NodeType::Database)],
        vec![Edge::new("user", "svc", "uses")],
    );

    let (fixed, result) = Fixer::new().collaborator(&unavailable).fix(&g, None);

    assert!(fixed.has_incoming("db"));
    assert!(!result.llm_used);
    assert_eq!(result.fix_type, FixType::Fallback);
    assert!(result.success);
}

#[test]
fn garbage_and_unknown_nodes_fall_back() {
    let replies = ["I'm not sure what you mean.", r#"[{"from":"nowhere","to":"db"}]"#, r#"{"from":"svc","to":"db"}"#];
    for reply in replies {
        let garbage = |_: &str| -> Result<String, CollaboratorError> { Ok(reply.to_string()) };
        let g = Graph::new(
            vec![node("user", NodeType::Actor), node("svc", NodeType::Service), node("db", NodeType::Database)],
            vec![Edge::new("user", "svc", "uses")],
        );

        let (fixed, result) = Fixer::new().collaborator(&garbage).fix(&g, None);

        assert!(fixed.has_incoming("db"), "reply {reply:?}");
        assert!(!result.llm_used);
        assert!(!fixed.contains_node("nowhere"));
    }
}

#[test]
fn fix_result_dict_shape() {
    let (_, _, result) = validate_and_fix(&orders_graph(), None);
    let dict = result.to_dict();
    for key in ["success", "fix_type", "issues_fixed", "issues_remaining", "changes_made", "llm_used"] {
        assert!(dict.get(key).is_some(), "missing {key}");
    }
    assert_eq!(dict["fix_type"], "fallback");
    assert!(dict["issues_fixed"]
        .as_array()
        .unwrap()
        .iter()
        .any(|c| c == "DUPLICATE_NODE_ID"));
}

#[test]
fn no_errors_after_repair_of_structural_defects() {
    let g = Graph::new(
        vec![
            node("a", NodeType::Service),
            node("a", NodeType::Service),
            Node::new("b", "", NodeType::Service),
        ],
        vec![
            Edge::new("a", "b", "calls"),
            Edge::new("a", "b", "calls"),
            Edge::new("b", "b", "calls"),
            Edge::new("ghost", "a", "calls"),
        ],
    );
    let (fixed, _) = Fixer::new().fix(&g, None);
    let result = validate(&fixed);
    assert_eq!(result.error_count(), 0);
    assert!(result.issues.iter().all(|i| i.severity != Severity::Error));
    assert_eq!(fixed.node("b").map(|n| n.label.as_str()), Some("B"));
}

#[test]
fn connectivity_issues_go_to_the_collaborator() {
    let prompts = RefCell::new(Vec::new());
    let scripted = |prompt: &str| -> Result<String, CollaboratorError> {
        prompts.borrow_mut().push(prompt.to_string());
        Ok(r#"[{"from": "user", "to": "web"}]"#.to_string())
    };
    // The actor is notified but never initiates anything.
    let g = Graph::new(
        vec![
            node("user", NodeType::Actor),
            node("notifier", NodeType::Service),
            node("web", NodeType::WebApp),
            node("db", NodeType::Database),
        ],
        vec![
            Edge::new("notifier", "user", "emails"),
            Edge::new("web", "db", "reads"),
            Edge::new("notifier", "db", "reads"),
        ],
    );
    assert!(codes(&g).contains(&IssueCode::ActorNoOutgoing));
    assert!(!codes(&g).contains(&IssueCode::OrphanedNode));

    let (fixed, validation, result) = Fixer::new().strict(true).collaborator(&scripted).validate_and_fix(&g);

    assert!(fixed.contains_edge(&Edge::new("user", "web", "uses").key()));
    assert!(result.llm_used);
    assert_eq!(result.fix_type, FixType::Llm);
    assert!(result.issues_fixed.contains(&IssueCode::ActorNoOutgoing));
    assert!(validation.is_valid);
    let prompts = prompts.borrow();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("These nodes have connection issues:"));
    assert!(prompts[0].contains("- user \"USER\" ACTOR_NO_OUTGOING:"));
    assert!(!prompts[0].contains("ORPHANED"));
}

#[test]
fn rendering_hints_survive_repair() {
    let g: Graph = serde_json::from_str(
        r##"{"nodes":[{"id":"svc","label":"Svc","type":"service","shape":"rounded","color":"#1f77b4"},
                      {"id":"db","label":"DB","type":"database","shape":"cylinder","icon":"postgres"}],
            "edges":[],"layout":"left-right"}"##,
    )
    .unwrap();
    let (fixed, result) = Fixer::new().fix(&g, None);
    assert!(!result.changes_made.is_empty());

    let out = serde_json::to_value(&fixed).unwrap();
    assert_eq!(out["layout"], "left-right");
    assert_eq!(out["nodes"][0]["shape"], "rounded");
    assert_eq!(out["nodes"][0]["color"], "#1f77b4");
    assert_eq!(out["nodes"][1]["shape"], "cylinder");
    assert_eq!(out["nodes"][1]["icon"], "postgres");
}
