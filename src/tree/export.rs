//! Module tree export.
//!
//! Renders the module call tree for visualization and tooling.

use super::{ConfigNode, ConfigTree};
use crate::error::Result;
use crate::types::GraphFormat;
use serde::Serialize;

/// Export the module tree to the specified format.
///
/// # Supported Formats
///
/// - **DOT**: Graphviz DOT format for visualization
/// - **JSON**: Structured JSON for programmatic access
/// - **Mermaid**: Mermaid diagram syntax for documentation
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn export_tree(tree: &ConfigTree, format: GraphFormat) -> Result<String> {
    match format {
        GraphFormat::Dot => Ok(export_dot(tree)),
        GraphFormat::Json => export_json(tree),
        GraphFormat::Mermaid => Ok(export_mermaid(tree)),
    }
}

fn node_label(node: &ConfigNode) -> String {
    match &node.source {
        Some(source) => format!("{}\n{source}", node.path),
        None => node.path.to_string(),
    }
}

fn export_dot(tree: &ConfigTree) -> String {
    let mut dot = String::new();
    dot.push_str("digraph ModuleTree {\n");
    dot.push_str("    rankdir=TB;\n");
    dot.push_str("    node [shape=box, style=rounded];\n\n");

    for idx in tree.walk() {
        let node = tree.node(idx);
        let id = escape_dot_id(&node.path.to_string());
        let label = escape_dot_string(&node_label(node));
        if node.path.is_root() {
            dot.push_str(&format!(
                "    \"{id}\" [label=\"{label}\", fillcolor=lightblue, style=\"rounded,filled\"];\n"
            ));
        } else {
            dot.push_str(&format!("    \"{id}\" [label=\"{label}\"];\n"));
        }
    }
    dot.push('\n');

    for idx in tree.walk() {
        let from = tree.node(idx);
        for (call, child) in tree.children(idx) {
            let from_id = escape_dot_id(&from.path.to_string());
            let to_id = escape_dot_id(&tree.node(child).path.to_string());
            let label = escape_dot_string(call);
            dot.push_str(&format!("    \"{from_id}\" -> \"{to_id}\" [label=\"{label}\"];\n"));
        }
    }

    dot.push_str("}\n");
    dot
}

fn export_json(tree: &ConfigTree) -> Result<String> {
    #[derive(Serialize)]
    struct JsonTree {
        nodes: Vec<JsonNode>,
        edges: Vec<JsonEdge>,
        metadata: JsonMetadata,
    }

    #[derive(Serialize)]
    struct JsonNode {
        path: String,
        source: Option<String>,
        cache_key: Option<String>,
        dir: String,
        variables: usize,
        resources: usize,
    }

    #[derive(Serialize)]
    struct JsonEdge {
        from: String,
        to: String,
        call: String,
    }

    #[derive(Serialize)]
    struct JsonMetadata {
        total_modules: usize,
        total_calls: usize,
        max_depth: usize,
    }

    let order = tree.walk();
    let nodes: Vec<JsonNode> = order
        .iter()
        .map(|&idx| {
            let node = tree.node(idx);
            JsonNode {
                path: node.path.to_string(),
                source: node.source.clone(),
                cache_key: node.cache_key.clone(),
                dir: node.dir().to_string_lossy().to_string(),
                variables: node.module.variables.len(),
                resources: node.module.managed_resources.len(),
            }
        })
        .collect();

    let edges: Vec<JsonEdge> = order
        .iter()
        .flat_map(|&idx| {
            let from = tree.node(idx).path.to_string();
            tree.children(idx)
                .into_iter()
                .map(move |(call, child)| JsonEdge {
                    from: from.clone(),
                    to: tree.node(child).path.to_string(),
                    call: call.to_string(),
                })
        })
        .collect();

    let max_depth = order.iter().map(|&idx| tree.node(idx).path.depth()).max().unwrap_or(0);

    let json_tree = JsonTree {
        metadata: JsonMetadata {
            total_modules: nodes.len(),
            total_calls: edges.len(),
            max_depth,
        },
        nodes,
        edges,
    };

    serde_json::to_string_pretty(&json_tree).map_err(|e| {
        crate::err!(ReportGeneration {
            message: format!("Failed to serialize module tree to JSON: {e}"),
        })
    })
}

fn export_mermaid(tree: &ConfigTree) -> String {
    let mut mermaid = String::new();
    mermaid.push_str("graph TD\n");

    for idx in tree.walk() {
        let node = tree.node(idx);
        let id = sanitize_mermaid_id(&node.path.to_string());
        let label = escape_mermaid_string(&node.path.to_string());
        mermaid.push_str(&format!("    {id}[\"{label}\"]\n"));
    }
    mermaid.push('\n');

    for idx in tree.walk() {
        let from_id = sanitize_mermaid_id(&tree.node(idx).path.to_string());
        for (call, child) in tree.children(idx) {
            let to_id = sanitize_mermaid_id(&tree.node(child).path.to_string());
            let label = escape_mermaid_string(call);
            mermaid.push_str(&format!("    {from_id} -->|{label}| {to_id}\n"));
        }
    }

    mermaid
}

/// Escape a string for use in DOT labels.
fn escape_dot_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

/// Escape a string for use as a DOT node ID.
fn escape_dot_id(s: &str) -> String {
    s.replace(['.', '-', '/', ':'], "_")
}

/// Sanitize a string for use as a Mermaid node ID.
fn sanitize_mermaid_id(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

fn escape_mermaid_string(s: &str) -> String {
    s.replace('"', "'").replace('|', "/").replace('\n', " ")
}
