//! Mermaid diagram generation for flow trees
//!
//! # Node Shapes
//!
//! | Step kind     | Shape             | Mermaid Syntax  |
//! |---------------|-------------------|-----------------|
//! | Collecting    | Rectangle         | `id["label"]`   |
//! | Display-only  | Rounded Rectangle | `id("label")`   |
//!
//! Edges into a child that carries a branch condition are dotted.

use crate::node::{FlowData, FlowNode, NodeId};
use crate::runner::FlowRunner;

/// Sanitize an id for use as a Mermaid node identifier.
///
/// Mermaid identifiers must be alphanumeric (plus underscores); anything else
/// becomes an underscore.
pub fn sanitize_id(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

fn mermaid_id(id: &NodeId) -> String {
    format!("node_{}", sanitize_id(id.as_str()))
}

fn escape_label(label: &str) -> String {
    label.replace('"', "#quot;")
}

/// Render a node declaration with a shape based on its step kind
pub fn render_node<D: FlowData>(node: &FlowNode<D>) -> String {
    let id = mermaid_id(node.id());
    let label = escape_label(node.label());

    if node.step().should_run_collector() {
        format!("    {}[\"{}\"]", id, label)
    } else {
        format!("    {}(\"{}\")", id, label)
    }
}

/// Render the edge from `parent` into `child`
pub fn render_edge<D: FlowData>(parent: &FlowNode<D>, child: &FlowNode<D>) -> String {
    let from = mermaid_id(parent.id());
    let to = mermaid_id(child.id());

    if child.has_condition() {
        format!("    {} -.-> {}", from, to)
    } else {
        format!("    {} --> {}", from, to)
    }
}

/// CSS class applied to nodes present in a runner's trace
pub const STYLE_DEFS: &str = r#"
    classDef visited fill:#90EE90,stroke:#228B22,stroke-width:2px
"#;

/// Render the whole tree under `root` as a top-down flowchart
pub fn render_mermaid<D: FlowData>(root: &FlowNode<D>) -> String {
    render(root, |_| false)
}

/// Like [`render_mermaid`], marking every node `runner` has visited
pub fn render_mermaid_with_trace<D: FlowData>(root: &FlowNode<D>, runner: &FlowRunner<D>) -> String {
    let mut out = render(root, |node| runner.index_of(node).is_some());
    out.push_str(STYLE_DEFS);
    out
}

fn render<D, F>(root: &FlowNode<D>, visited: F) -> String
where
    D: FlowData,
    F: Fn(&FlowNode<D>) -> bool,
{
    let mut nodes = Vec::new();
    let mut edges = Vec::new();
    let mut pending = vec![root];

    // Depth-first, children in declared order
    while let Some(node) = pending.pop() {
        let mut line = render_node(node);
        if visited(node) {
            line.push_str(":::visited");
        }
        nodes.push(line);

        for child in node.children() {
            edges.push(render_edge(node, child));
        }
        pending.extend(node.children().iter().rev());
    }

    let mut out = String::from("flowchart TD\n");
    for line in nodes.iter().chain(edges.iter()) {
        out.push_str(line);
        out.push('\n');
    }
    out
}
