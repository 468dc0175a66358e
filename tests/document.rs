use batchflow_ir::document::{Document, Target};
use batchflow_ir::inspect::{Inspector, PortReference};
use batchflow_ir::render::render_json;

use pretty_assertions::assert_eq;

const PLAN: &str = r#"{
    "level": "plan",
    "id": "daily",
    "plan": {
        "attributes": { "batch": "daily" },
        "sub_plans": [
            {
                "name": "extract",
                "graph": {
                    "operators": [
                        { "name": "src", "kind": "input", "external_name": "sales", "data_type": "Sales",
                          "outputs": [{ "name": "port", "data_type": "Sales" }] },
                        { "name": "cp", "kind": "core", "core": "checkpoint",
                          "inputs": [{ "name": "in", "data_type": "Sales" }],
                          "outputs": [{ "name": "out", "data_type": "Sales" }] }
                    ],
                    "connections": [{ "from": "src.port", "to": "cp.in" }]
                },
                "outputs": [{ "operator": "cp" }]
            },
            {
                "name": "aggregate",
                "attributes": { "kind": "reduce" },
                "graph": {
                    "operators": [
                        { "name": "recv", "kind": "marker", "data_type": "Sales",
                          "attributes": { "exchange": "group" },
                          "outputs": [{ "name": "out", "data_type": "Sales" }] },
                        { "name": "sum", "kind": "user", "annotation": "Fold",
                          "class": "com.example.SalesOps", "method": "sum",
                          "inputs": [{ "name": "in", "data_type": "Sales",
                                       "group": { "grouping": ["store"], "ordering": ["date DESC"] } }],
                          "outputs": [{ "name": "out", "data_type": "Sales" }] },
                        { "name": "dst", "kind": "output", "external_name": "totals", "data_type": "Sales",
                          "inputs": [{ "name": "port", "data_type": "Sales" }] }
                    ],
                    "connections": [
                        { "from": "recv.out", "to": "sum.in" },
                        { "from": "sum.out", "to": "dst.port" }
                    ]
                },
                "inputs": [{ "operator": "recv", "attributes": { "partition": "store" } }]
            }
        ],
        "connections": [{ "from": "extract.cp", "to": "aggregate.recv" }]
    }
}"#;

fn inspect(text: &str) -> batchflow_ir::inspect::InspectionNode {
    let target = Document::from_json(text).unwrap().build().unwrap();
    let inspector = Inspector::default();
    match target {
        Target::Batch(batch) => inspector.inspect_batch(&batch),
        Target::Jobflow(jobflow) => inspector.inspect_jobflow(&jobflow),
        Target::Graph(id, graph) => inspector.inspect_graph(&id, &graph),
        Target::Plan(id, plan) => inspector.inspect_plan(&id, &plan),
    }
    .unwrap()
}

#[test]
fn plan_document_end_to_end() {
    let node = inspect(PLAN);
    assert_eq!(node.id, "daily");
    assert_eq!(node.properties["batch"], "daily");
    assert_eq!(node.elements.len(), 2);

    let extract = node.element("sub-0").unwrap();
    assert_eq!(
        extract.element("core-0").unwrap().input("in0").unwrap().opposites,
        vec![PortReference::new("input-sales", "out0")]
    );
    assert_eq!(
        extract.output("core-0").unwrap().opposites,
        vec![PortReference::new("sub-1", "marker-0")]
    );

    let aggregate = node.element("sub-1").unwrap();
    assert_eq!(aggregate.properties["kind"], "reduce");
    let boundary = aggregate.input("marker-0").unwrap();
    assert_eq!(boundary.opposites, vec![PortReference::new("sub-0", "core-0")]);
    assert_eq!(boundary.properties["partition"], "store");
    assert_eq!(boundary.properties["operator.exchange"], "group");

    let sum = aggregate.element("user-0").unwrap();
    assert_eq!(sum.title, "Fold");
    assert_eq!(
        sum.input("in0").unwrap().properties["group"],
        "Group{grouping=[store], ordering=[-date]}"
    );
}

#[test]
fn document_rendering_is_stable() {
    let first = render_json(&inspect(PLAN), true).unwrap();
    let second = render_json(&inspect(PLAN), true).unwrap();
    assert_eq!(first, second);
}

#[test]
fn jobflow_document_renders_nested_flow() {
    let text = r#"{
        "level": "jobflow",
        "id": "load",
        "description": "com.example.LoadJob",
        "graph": {
            "operators": [
                { "name": "inner", "kind": "flow", "description": "com.example.Inner",
                  "graph": {
                      "operators": [
                          { "name": "a", "kind": "core", "core": "project" },
                          { "name": "b", "kind": "core", "core": "extend" }
                      ]
                  } },
                { "name": "c", "kind": "core", "core": "restructure" }
            ]
        }
    }"#;
    let node = inspect(text);
    assert_eq!(node.title, "Jobflow");
    assert_eq!(node.properties["class"], "com.example.LoadJob");

    let ids: Vec<_> = node.elements.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["flow-0", "core-0"]);

    // Counters restart inside a nested flow.
    let flow = node.element("flow-0").unwrap();
    let nested: Vec<_> = flow
        .elements
        .iter()
        .map(|e| (e.id.as_str(), e.title.as_str()))
        .collect();
    assert_eq!(nested, vec![("core-0", "Project"), ("core-1", "Extend")]);
}
