use crate::inspect::InspectionNode;

/// Render a self-contained HTML viewer (tree embedded as JSON).
///
/// Important: we avoid `format!()` because the HTML contains many `{}` from JS
/// template literals (e.g., `${x}`), which would conflict with Rust formatting.
pub fn render_html(root: &InspectionNode) -> anyhow::Result<String> {
    // `</script>` inside a property value must not close the script element.
    let json = serde_json::to_string(root)?.replace("</", "<\\/");

    const TEMPLATE: &str = r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Batchflow Inspector</title>
<style>
  body { font-family: system-ui, -apple-system, Segoe UI, Roboto, Arial, sans-serif; margin: 0; }
  header { padding: 12px 16px; border-bottom: 1px solid #ddd; }
  .container { display: flex; height: calc(100vh - 58px); }
  .sidebar { width: 360px; border-right: 1px solid #ddd; padding: 12px; overflow: auto; }
  .main { flex: 1; padding: 12px; overflow: auto; }

  .summary { display: flex; gap: 16px; flex-wrap: wrap; font-size: 14px; color: #333; }
  .pill { padding: 4px 8px; border: 1px solid #ddd; border-radius: 999px; background: #fafafa; }

  .tree-node { cursor: pointer; user-select: none; padding: 2px 4px; border-radius: 4px; }
  .tree-node:hover { background: #f3f3f3; }
  .tree-node.selected { background: #e9f2ff; border: 1px solid #cfe3ff; }
  .indent { display: inline-block; width: 16px; }
  .toggle { display: inline-block; width: 16px; text-align: center; color: #666; }
  .muted { color: #777; font-size: 12px; }
  a.ref { color: #0b5cad; cursor: pointer; }

  table { border-collapse: collapse; width: 100%; margin-top: 8px; }
  th, td { border-bottom: 1px solid #eee; padding: 6px 8px; text-align: left; font-size: 14px; vertical-align: top; }
  th { background: white; border-bottom: 1px solid #ddd; }
  code { font-family: ui-monospace, SFMono-Regular, Menlo, Consolas, monospace; font-size: 13px; }
</style>
</head>
<body>
<header>
  <div class="summary" id="summary"></div>
</header>

<div class="container">
  <div class="sidebar">
    <div style="display:flex; gap: 8px; margin-bottom: 8px;">
      <input id="search" placeholder="Search id or title..." style="flex:1; padding: 6px 8px; border: 1px solid #ddd; border-radius: 6px;">
      <button id="expandAll" style="padding: 6px 10px;">Expand</button>
      <button id="collapseAll" style="padding: 6px 10px;">Collapse</button>
    </div>
    <div id="tree"></div>
  </div>

  <div class="main">
    <h2 id="title">Select a node</h2>
    <div id="meta" class="muted"></div>
    <div id="details"></div>
  </div>
</div>

<script>
// Embedded inspection tree (JSON object literal)
const ROOT = __DATA__;

// Ids are unique among siblings only; nodes are keyed by their id path.
const NODES = new Map();
const PARENT = new Map();
(function index(node, key, parentKey) {
  NODES.set(key, node);
  if (parentKey !== null) PARENT.set(key, parentKey);
  for (const e of node.elements) index(e, key + "/" + e.id, key);
})(ROOT, ROOT.id, null);

const state = {
  expanded: new Set([ROOT.id]),
  selected: null,
  search: ""
};

function escapeHtml(s) {
  return String(s)
    .replaceAll("&", "&amp;")
    .replaceAll("<", "&lt;")
    .replaceAll(">", "&gt;")
    .replaceAll('"', "&quot;")
    .replaceAll("'", "&#39;");
}

function renderSummary() {
  let ports = 0, links = 0;
  for (const node of NODES.values()) {
    for (const p of [...Object.values(node.inputs), ...Object.values(node.outputs)]) {
      ports += 1;
      links += p.opposites.length;
    }
  }
  document.getElementById("summary").innerHTML = `
    <span class="pill">${escapeHtml(ROOT.title)}: <b>${escapeHtml(ROOT.id)}</b></span>
    <span class="pill">nodes: <b>${NODES.size}</b></span>
    <span class="pill">ports: <b>${ports}</b></span>
    <span class="pill">references: <b>${links}</b></span>
  `;
}

function nodeMatches(node) {
  if (!state.search) return true;
  const s = state.search.toLowerCase();
  return node.id.toLowerCase().includes(s) || node.title.toLowerCase().includes(s);
}

function renderTree() {
  const root = document.getElementById("tree");
  root.innerHTML = "";

  // If search is active, show matches + their ancestors.
  const mustShow = new Set();
  if (state.search) {
    for (const [key, node] of NODES) {
      if (!nodeMatches(node)) continue;
      let cur = key;
      while (cur !== undefined) {
        mustShow.add(cur);
        cur = PARENT.get(cur);
      }
    }
  }

  function renderSubtree(key, depth) {
    const node = NODES.get(key);
    if (state.search && !mustShow.has(key)) return;

    const isExpanded = state.expanded.has(key) || !!state.search;
    const hasKids = node.elements.length > 0;

    const row = document.createElement("div");
    row.className = "tree-node" + (state.selected === key ? " selected" : "");
    row.onclick = () => selectNode(key);

    const indent = document.createElement("span");
    indent.className = "indent";
    indent.style.width = (depth * 16) + "px";
    row.appendChild(indent);

    const toggle = document.createElement("span");
    toggle.className = "toggle";
    toggle.textContent = hasKids ? (isExpanded ? "▾" : "▸") : " ";
    toggle.onclick = (e) => {
      e.stopPropagation();
      if (!hasKids) return;
      if (state.expanded.has(key)) state.expanded.delete(key);
      else state.expanded.add(key);
      renderTree();
    };
    row.appendChild(toggle);

    const label = document.createElement("span");
    label.innerHTML = `${escapeHtml(node.id)} <span class="muted">${escapeHtml(node.title)}</span>`;
    row.appendChild(label);
    root.appendChild(row);

    if (hasKids && isExpanded) {
      for (const e of node.elements) renderSubtree(key + "/" + e.id, depth + 1);
    }
  }

  renderSubtree(ROOT.id, 0);
}

function propertyRows(props) {
  return Object.entries(props)
    .map(([k, v]) => `<tr><td><code>${escapeHtml(k)}</code></td><td>${escapeHtml(v)}</td></tr>`)
    .join("");
}

function portTable(caption, ports, siblingBase) {
  const list = Object.values(ports);
  if (list.length === 0) return "";
  const rows = list.map(p => {
    const refs = p.opposites.map(r => {
      const target = siblingBase + "/" + r.node;
      return `<a class="ref" data-key="${escapeHtml(target)}">${escapeHtml(r.node)}.${escapeHtml(r.port)}</a>`;
    }).join("<br>");
    const props = Object.entries(p.properties)
      .map(([k, v]) => `${escapeHtml(k)}=${escapeHtml(v)}`).join("<br>");
    return `<tr><td><code>${escapeHtml(p.id)}</code></td><td>${props}</td><td>${refs}</td></tr>`;
  }).join("");
  return `<h3>${caption}</h3><table><thead><tr><th>port</th><th>properties</th><th>opposites</th></tr></thead><tbody>${rows}</tbody></table>`;
}

function selectNode(key) {
  state.selected = key;
  const node = NODES.get(key);
  document.getElementById("title").textContent = `${node.id} (${node.title})`;
  document.getElementById("meta").textContent =
    `path: ${key} | elements: ${node.elements.length}`;

  const base = PARENT.get(key) || key;
  const props = Object.keys(node.properties).length
    ? `<h3>Properties</h3><table><tbody>${propertyRows(node.properties)}</tbody></table>`
    : "";
  const details = document.getElementById("details");
  details.innerHTML = props
    + portTable("Inputs", node.inputs, base)
    + portTable("Outputs", node.outputs, base);

  for (const a of details.querySelectorAll("a.ref")) {
    a.onclick = () => {
      const target = a.getAttribute("data-key");
      if (NODES.has(target)) selectNode(target);
    };
  }
  renderTree();
}

function expandAll() {
  for (const [key, node] of NODES) {
    if (node.elements.length) state.expanded.add(key);
  }
  renderTree();
}

function collapseAll() {
  state.expanded.clear();
  renderTree();
}

document.getElementById("search").addEventListener("input", (e) => {
  state.search = e.target.value || "";
  renderTree();
});

document.getElementById("expandAll").onclick = expandAll;
document.getElementById("collapseAll").onclick = collapseAll;

renderSummary();
renderTree();
selectNode(ROOT.id);
</script>
</body>
</html>
"#;

    Ok(TEMPLATE.replace("__DATA__", &json))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embeds_tree_and_escapes_script_end() {
        let mut root = InspectionNode::new("g", "Graph");
        root.with_property("comment", "</script>");
        let html = render_html(&root).unwrap();

        assert!(html.contains(r#"const ROOT = {"id":"g","title":"Graph""#));
        assert!(!html.contains("__DATA__"));
        assert_eq!(html.matches("</script>").count(), 1);
    }
}
