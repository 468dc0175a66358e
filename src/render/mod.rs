//! Output formats for inspection trees.

pub mod dot;
pub mod html;

pub use dot::render_dot;
pub use html::render_html;

use crate::inspect::InspectionNode;

/// Serializes the tree in its wire format.
pub fn render_json(node: &InspectionNode, pretty: bool) -> serde_json::Result<String> {
    if pretty {
        serde_json::to_string_pretty(node)
    } else {
        serde_json::to_string(node)
    }
}
