use crate::graph::{Edge, Graph};

#[derive(serde::Deserialize)]
struct LlmEdge {
    #[serde(alias = "source")]
    from: String,
    #[serde(alias = "target")]
    to: String,
    #[serde(default, alias = "rel", alias = "label")]
    relation: Option<String>,
}

/// Parse raw LLM output into edges between known nodes.
/// Returns empty vec on total parse failure (graceful degradation).
pub fn parse_llm_output(raw: &str, graph: &Graph, default_relation: &str) -> Vec<Edge> {
    let json_str = match extract_json_array(raw) {
        Some(s) => s,
        None => return vec![],
    };

    // Try full array parse first
    let proposed: Vec<LlmEdge> = match serde_json::from_str(json_str) {
        Ok(edges) => edges,
        Err(_) => parse_object_by_object(json_str),
    };

    let mut edges: Vec<Edge> = Vec::new();
    for p in proposed {
        let (Some(source), Some(target)) = (resolve_node_id(&p.from, graph), resolve_node_id(&p.to, graph)) else {
            continue;
        };
        let relation = p
            .relation
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| default_relation.to_string());
        let edge = Edge::new(source, target, relation);
        if edge.is_self_loop() || graph.contains_edge(&edge.key()) || edges.contains(&edge) {
            continue;
        }
        edges.push(edge);
    }
    edges
}

/// Extract the first top-level JSON array from raw LLM output, ignoring surrounding prose.
///
/// Bracketed prose such as `[note]` is skipped. When no candidate is valid JSON the
/// first balanced (or, failing that, widest) candidate is returned for salvage.
fn extract_json_array(raw: &str) -> Option<&str> {
    let mut fallback = None;
    let mut from = 0;

    while let Some(pos) = raw[from..].find('[') {
        let start = from + pos;
        match balanced_array(raw, start) {
            Some(candidate) => {
                let is_array = serde_json::from_str::<serde_json::Value>(candidate)
                    .is_ok_and(|v| v.is_array());
                if is_array {
                    return Some(candidate);
                }
                fallback.get_or_insert(candidate);
                from = start + candidate.len();
            }
            None => {
                if fallback.is_none() {
                    let end = raw.rfind(']')?;
                    if end > start {
                        fallback = Some(&raw[start..=end]);
                    }
                }
                break;
            }
        }
    }

    fallback
}

/// The bracket-balanced slice starting at `start`, skipping brackets inside strings.
fn balanced_array(raw: &str, start: usize) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in raw[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Try to parse individual objects from a malformed JSON array.
fn parse_object_by_object(json_str: &str) -> Vec<LlmEdge> {
    let inner = json_str
        .trim()
        .strip_prefix('[')
        .unwrap_or(json_str)
        .strip_suffix(']')
        .unwrap_or(json_str);

    let mut edges = Vec::new();
    let mut depth = 0usize;
    let mut start = None;

    for (i, ch) in inner.char_indices() {
        match ch {
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start {
                        if let Ok(edge) = serde_json::from_str::<LlmEdge>(&inner[s..=i]) {
                            edges.push(edge);
                        }
                    }
                    start = None;
                }
            }
            _ => {}
        }
    }

    edges
}

/// Match an identifier from LLM output to a node id.
/// Tries the id first, then the label, then both case-insensitively.
fn resolve_node_id(name: &str, graph: &Graph) -> Option<String> {
    let name = name.trim();
    if graph.contains_node(name) {
        return Some(name.to_string());
    }

    if let Some(n) = graph.find_node(|n| n.label == name) {
        return Some(n.id.clone());
    }

    let name_lower = name.to_lowercase();
    graph
        .find_node(|n| n.id.to_lowercase() == name_lower || n.label.to_lowercase() == name_lower)
        .map(|n| n.id.clone())
}
