//! Graphviz output for an inspection tree.
//!
//! Nodes with elements become clusters; leaf nodes become boxes. An edge is
//! drawn for every output-port opposite, so each connection appears once.

use crate::inspect::InspectionNode;

use itertools::Itertools;
use std::io::Write;

/// Write `root` to `w` in DOT format.
pub fn render_dot(root: &InspectionNode, w: &mut impl Write) -> anyhow::Result<()> {
    writeln!(w, "digraph {} {{", quote(&root.id))?;
    writeln!(w, "  rankdir=LR;")?;
    writeln!(w, "  node[shape=box];")?;
    writeln!(w, "  label={};", quote(&format!("{} {}", root.title, root.id)))?;

    let mut path = Vec::new();
    for element in &root.elements {
        write_node(element, &mut path, 1, w)?;
    }
    writeln!(w)?;
    write_edges(root, &mut path, w)?;

    writeln!(w, "}}")?;
    w.flush()?;
    Ok(())
}

/// Nested ids are only unique among siblings, so DOT names use the full path.
fn dot_name(path: &[&str], id: &str) -> String {
    let scoped = path.iter().copied().chain(std::iter::once(id)).join("/");
    quote(&scoped)
}

fn write_node<'a>(
    node: &'a InspectionNode,
    path: &mut Vec<&'a str>,
    depth: usize,
    w: &mut impl Write,
) -> anyhow::Result<()> {
    let indent = "  ".repeat(depth);
    let label = node_label(node);
    if node.elements.is_empty() {
        writeln!(w, "{indent}{} [label={}];", dot_name(path, &node.id), quote(&label))?;
        return Ok(());
    }

    // The cluster also holds an anchor so edges can target the node itself.
    let cluster = format!("cluster_{}", path.iter().copied().chain([node.id.as_str()]).join("_"));
    writeln!(w, "{indent}subgraph {} {{", quote(&cluster))?;
    writeln!(w, "{indent}  label={};", quote(&label))?;
    writeln!(
        w,
        "{indent}  {} [label={}, shape=point];",
        dot_name(path, &node.id),
        quote(&node.id)
    )?;
    path.push(&node.id);
    for element in &node.elements {
        write_node(element, path, depth + 1, w)?;
    }
    path.pop();
    writeln!(w, "{indent}}}")?;
    Ok(())
}

fn write_edges<'a>(
    node: &'a InspectionNode,
    path: &mut Vec<&'a str>,
    w: &mut impl Write,
) -> anyhow::Result<()> {
    for element in &node.elements {
        for port in element.outputs.values() {
            for opposite in &port.opposites {
                writeln!(
                    w,
                    "  {} -> {} [taillabel={}, headlabel={}];",
                    dot_name(path, &element.id),
                    dot_name(path, &opposite.node),
                    quote(&port.id),
                    quote(&opposite.port)
                )?;
            }
        }
    }
    for element in &node.elements {
        path.push(&element.id);
        write_edges(element, path, w)?;
        path.pop();
    }
    Ok(())
}

fn node_label(node: &InspectionNode) -> String {
    match node.properties.get("name") {
        Some(name) => format!("{}\\n{} ({name})", node.id, node.title),
        None => format!("{}\\n{}", node.id, node.title),
    }
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\\\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspect::{Port, PortReference};

    #[test]
    fn writes_clusters_and_edges() {
        let mut a = InspectionNode::new("core-0", "Checkpoint");
        let mut out = Port::new("out0");
        out.add_opposite(PortReference::new("core-1", "in0"));
        a.add_output(out).unwrap();
        let b = InspectionNode::new("core-1", "Project");

        let mut flow = InspectionNode::new("flow-0", "Flow");
        flow.add_element(a);
        flow.add_element(b);
        let mut root = InspectionNode::new("g", "Graph");
        root.add_element(flow);

        let mut buf = Vec::new();
        render_dot(&root, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert!(text.starts_with("digraph \"g\" {"));
        assert!(text.contains("subgraph \"cluster_flow-0\""));
        assert!(text.contains("\"flow-0/core-0\" [label=\"core-0\\nCheckpoint\"];"));
        assert!(text.contains(
            "\"flow-0/core-0\" -> \"flow-0/core-1\" [taillabel=\"out0\", headlabel=\"in0\"];"
        ));
        assert!(text.trim_end().ends_with('}'));
    }
}
