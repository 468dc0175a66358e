//! Rendering of batches, jobflows and operator graphs.
//!
//! Operator sets are rendered in two passes:
//! 1) assign an id to every operator of the connected closure and render it
//!    without connections;
//! 2) wire each port to the rendered ids of its opposites.
//!
//! Forward references are resolved by the second pass only, so the order in
//! which operators are visited never matters for correctness; it only decides
//! the counter ids.

use crate::batch::{Batch, BatchElementId, Jobflow};
use crate::graph::{Operator, OperatorBody, OperatorGraph, OperatorId};
use crate::inspect::{IdCounter, InspectionNode, Port, PortReference};
use crate::{Error, Result};

use index_vec::IndexVec;
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};

pub const PROPERTY_NAME: &str = "name";
pub const PROPERTY_TYPE: &str = "type";
pub const PROPERTY_MODULE: &str = "module";
pub const PROPERTY_DESCRIPTION: &str = "description";
pub const PROPERTY_CLASS: &str = "class";

/// Input port of a rendered jobflow that lists its blockers.
pub const PORT_UPSTREAM: &str = "upstream";
/// Output port of a rendered jobflow that lists the jobflows it blocks.
pub const PORT_DOWNSTREAM: &str = "downstream";

pub(crate) fn inspect_batch(batch: &Batch) -> Result<InspectionNode> {
    let mut node = InspectionNode::new(&batch.id, "Batch");
    if let Some(class) = &batch.description_class {
        node.with_property(PROPERTY_CLASS, class);
    }
    if let Some(comment) = &batch.comment {
        node.with_property("comment", comment);
    }
    for element in inspect_jobflows(batch)? {
        node.add_element(element);
    }
    tracing::debug!("rendered batch {} with {} jobflows", batch.id, batch.len());
    Ok(node)
}

/// Renders every jobflow first, then wires one dependency per blocker.
fn inspect_jobflows(batch: &Batch) -> Result<IndexVec<BatchElementId, InspectionNode>> {
    let mut results: IndexVec<BatchElementId, InspectionNode> = IndexVec::with_capacity(batch.len());
    for (_, element) in batch.elements() {
        let mut node = inspect_jobflow(element.jobflow())?;
        node.add_input(Port::new(PORT_UPSTREAM))?;
        node.add_output(Port::new(PORT_DOWNSTREAM))?;
        results.push(node);
    }

    for (downstream, element) in batch.elements() {
        for upstream in element.blockers() {
            let Some(upstream_node) = results.get(*upstream) else {
                return Err(Error::DanglingReference(format!(
                    "jobflow {} is blocked by element {upstream}, which was not rendered",
                    element.jobflow().id
                )));
            };
            let upstream_id = upstream_node.id.clone();
            let downstream_id = results[downstream].id.clone();
            tracing::trace!("wiring dependency {upstream_id} -> {downstream_id}");

            if let Some(port) = results[*upstream].outputs.get_mut(PORT_DOWNSTREAM) {
                port.add_opposite(PortReference::new(&downstream_id, PORT_UPSTREAM));
            }
            if let Some(port) = results[downstream].inputs.get_mut(PORT_UPSTREAM) {
                port.add_opposite(PortReference::new(&upstream_id, PORT_DOWNSTREAM));
            }
        }
    }
    Ok(results)
}

pub(crate) fn inspect_jobflow(jobflow: &Jobflow) -> Result<InspectionNode> {
    let mut node = InspectionNode::new(&jobflow.id, "Jobflow");
    node.with_property(PROPERTY_CLASS, &jobflow.description_class);
    let graph = &jobflow.graph;
    for (_, element) in inspect_operators(graph, graph.operator_ids())? {
        node.add_element(element);
    }
    Ok(node)
}

pub(crate) fn inspect_graph(id: &str, graph: &OperatorGraph) -> Result<InspectionNode> {
    let mut node = InspectionNode::new(id, "Graph");
    for (_, element) in inspect_operators(graph, graph.operator_ids())? {
        node.add_element(element);
    }
    Ok(node)
}

/// Renders the connected closure of `seeds`, keyed by source operator in
/// visitation order.
pub(crate) fn inspect_operators<I>(
    graph: &OperatorGraph,
    seeds: I,
) -> Result<IndexMap<OperatorId, InspectionNode>>
where
    I: IntoIterator<Item = OperatorId>,
{
    let mut counter = IdCounter::new();
    let mut results: IndexMap<OperatorId, InspectionNode> = IndexMap::new();
    let mut assigned: HashSet<String> = HashSet::new();
    for id in graph.transitive_connected(seeds)? {
        let operator = graph.operator(id);
        let node_id = counter.operator_id(operator);
        if !assigned.insert(node_id.clone()) {
            return Err(Error::DuplicateId(format!("operator {node_id}")));
        }
        results.insert(id, inspect_operator(graph, node_id, operator)?);
    }

    let ids: HashMap<OperatorId, String> = results
        .iter()
        .map(|(id, node)| (*id, node.id.clone()))
        .collect();
    let resolve = |owner: OperatorId, port: String| -> Option<PortReference> {
        ids.get(&owner).map(|node| PortReference::new(node, port))
    };

    for (id, node) in results.iter_mut() {
        let operator = graph.operator(*id);
        for port in operator.inputs() {
            let input = graph.input(*port);
            let rendered = node
                .inputs
                .get_mut(&input.port_id())
                .ok_or_else(|| Error::DanglingReference(format!("input {} of {}", input.port_id(), ids[id])))?;
            for opposite in input.opposites() {
                let output = graph.output(*opposite);
                let reference = resolve(output.owner(), output.port_id()).ok_or_else(|| {
                    Error::OutsideWorkingSet(format!("input {} of {}", input.port_id(), ids[id]))
                })?;
                rendered.add_opposite(reference);
            }
        }
        for port in operator.outputs() {
            let output = graph.output(*port);
            let rendered = node
                .outputs
                .get_mut(&output.port_id())
                .ok_or_else(|| Error::DanglingReference(format!("output {} of {}", output.port_id(), ids[id])))?;
            for opposite in output.opposites() {
                let input = graph.input(*opposite);
                let reference = resolve(input.owner(), input.port_id()).ok_or_else(|| {
                    Error::OutsideWorkingSet(format!("output {} of {}", output.port_id(), ids[id]))
                })?;
                rendered.add_opposite(reference);
            }
        }
    }

    tracing::trace!("rendered {} operators", results.len());
    Ok(results)
}

/// Renders one operator with its ports, arguments and constraints, but
/// without connections.
fn inspect_operator(graph: &OperatorGraph, id: String, operator: &Operator) -> Result<InspectionNode> {
    let mut node = inspect_flat(id, operator)?;
    for port in operator.inputs() {
        let input = graph.input(*port);
        let mut rendered = Port::new(input.port_id())
            .with_property(PROPERTY_NAME, input.name())
            .with_property(PROPERTY_TYPE, input.data_type());
        if let Some(group) = input.group() {
            rendered = rendered.with_property("group", group);
        }
        node.add_input(rendered)?;
    }
    for port in operator.outputs() {
        let output = graph.output(*port);
        let rendered = Port::new(output.port_id())
            .with_property(PROPERTY_NAME, output.name())
            .with_property(PROPERTY_TYPE, output.data_type());
        node.add_output(rendered)?;
    }
    for argument in operator.arguments() {
        node.with_property(format!("arguments.{}", argument.name), &argument.value);
    }
    for constraint in operator.constraints() {
        node.with_property(format!("constraints.{constraint}"), "true");
    }
    Ok(node)
}

fn inspect_flat(id: String, operator: &Operator) -> Result<InspectionNode> {
    let node = match operator.body() {
        OperatorBody::Core(kind) => InspectionNode::new(id, kind.to_string()),
        OperatorBody::User(user) => {
            let mut node = InspectionNode::new(id, &user.annotation);
            node.with_property(PROPERTY_CLASS, &user.declaring_class)
                .with_property("method", &user.method);
            node
        }
        OperatorBody::Flow(flow) => {
            let mut node = InspectionNode::new(id, "Flow");
            node.with_property(PROPERTY_DESCRIPTION, &flow.description_class);
            for (_, element) in inspect_operators(&flow.graph, flow.graph.operator_ids())? {
                node.add_element(element);
            }
            node
        }
        OperatorBody::Input(input) => {
            let mut node = InspectionNode::new(id, "Input");
            node.with_property(PROPERTY_NAME, &input.name)
                .with_property(PROPERTY_TYPE, &input.data_type);
            if let Some(info) = &input.info {
                node.with_property(PROPERTY_DESCRIPTION, &info.description_class)
                    .with_property(PROPERTY_MODULE, &info.module)
                    .with_property("size", info.data_size);
            }
            node
        }
        OperatorBody::Output(output) => {
            let mut node = InspectionNode::new(id, "Output");
            node.with_property(PROPERTY_NAME, &output.name)
                .with_property(PROPERTY_TYPE, &output.data_type);
            if let Some(info) = &output.info {
                node.with_property(PROPERTY_DESCRIPTION, &info.description_class)
                    .with_property(PROPERTY_MODULE, &info.module);
            }
            node
        }
        OperatorBody::Marker(marker) => {
            let mut node = InspectionNode::new(id, "Marker");
            node.with_property(PROPERTY_TYPE, &marker.data_type);
            for (key, value) in &marker.attributes {
                node.with_property(key, value);
            }
            node
        }
    };
    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{
        CoreOperatorKind, DataSize, ExternalInputInfo, FlowOperator, Group, MarkerOperator,
        OperatorArgument, OperatorConstraint, UserOperator,
    };
    use pretty_assertions::assert_eq;

    fn user(graph: &mut OperatorGraph) -> OperatorId {
        graph.add_operator(OperatorBody::User(UserOperator {
            annotation: "Update".into(),
            declaring_class: "com.example.SalesOperator".into(),
            method: "update".into(),
        }))
    }

    #[test]
    fn renders_kind_specific_properties() {
        let mut graph = OperatorGraph::new();
        let (src, src_out) = graph
            .add_external_input(
                "sales",
                "Sales",
                Some(ExternalInputInfo {
                    module: "directio".into(),
                    description_class: "com.example.SalesInput".into(),
                    data_size: DataSize::Large,
                }),
            )
            .unwrap();
        let op = user(&mut graph);
        let group = Group::parse(&["store"], &["-amount"]).unwrap();
        let op_in = graph.add_input(op, "in", "Sales", Some(group)).unwrap();
        graph.add_output(op, "out", "Sales").unwrap();
        graph
            .add_argument(
                op,
                OperatorArgument {
                    name: "rate".into(),
                    data_type: "int".into(),
                    value: "3".into(),
                },
            )
            .unwrap();
        graph.add_constraint(op, OperatorConstraint::AtLeastOnce).unwrap();
        graph.connect(src_out, op_in).unwrap();

        let nodes = inspect_operators(&graph, [src]).unwrap();
        let input = &nodes[&src];
        assert_eq!(input.id, "input-sales");
        assert_eq!(input.title, "Input");
        assert_eq!(
            input.properties.keys().collect::<Vec<_>>(),
            vec!["name", "type", "description", "module", "size"]
        );
        assert_eq!(input.properties["size"], "LARGE");

        let update = &nodes[&op];
        assert_eq!(update.id, "user-0");
        assert_eq!(update.title, "Update");
        assert_eq!(update.properties["class"], "com.example.SalesOperator");
        assert_eq!(update.properties["method"], "update");
        assert_eq!(update.properties["arguments.rate"], "3");
        assert_eq!(update.properties["constraints.AT_LEAST_ONCE"], "true");
        assert_eq!(
            update.inputs["in0"].properties["group"],
            "Group{grouping=[store], ordering=[-amount]}"
        );
        assert_eq!(
            update.inputs["in0"].opposites,
            vec![PortReference::new("input-sales", "out0")]
        );
    }

    #[test]
    fn flow_operator_renders_nested_graph_with_fresh_counters() {
        let mut inner = OperatorGraph::new();
        let (_, inner_out) = inner.add_external_input("in", "Model", None).unwrap();
        let core = inner.add_operator(OperatorBody::Core(CoreOperatorKind::Checkpoint));
        let core_in = inner.add_input(core, "in", "Model", None).unwrap();
        inner.connect(inner_out, core_in).unwrap();

        let mut graph = OperatorGraph::new();
        graph.add_operator(OperatorBody::Core(CoreOperatorKind::Project));
        let flow = graph.add_operator(OperatorBody::Flow(FlowOperator {
            description_class: "com.example.SubFlow".into(),
            graph: inner,
        }));

        let node = inspect_graph("g", &graph).unwrap();
        let ids: Vec<_> = node.elements.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["core-0", "flow-0"]);

        let rendered = &node.elements[1];
        assert_eq!(rendered.title, "Flow");
        assert_eq!(rendered.properties["description"], "com.example.SubFlow");
        let nested: Vec<_> = rendered.elements.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(nested, vec!["input-in", "core-0"]);
        assert!(matches!(graph.operator(flow).body(), OperatorBody::Flow(_)));
    }

    #[test]
    fn marker_attributes_become_properties() {
        let mut graph = OperatorGraph::new();
        let mut attributes = IndexMap::new();
        attributes.insert("buffer".to_string(), "HEAP".to_string());
        attributes.insert("broadcast".to_string(), "true".to_string());
        graph.add_operator(OperatorBody::Marker(MarkerOperator {
            data_type: "Model".into(),
            attributes,
        }));

        let node = inspect_graph("g", &graph).unwrap();
        let marker = &node.elements[0];
        assert_eq!(marker.id, "marker-0");
        assert_eq!(
            marker.properties.iter().collect::<Vec<_>>(),
            vec![
                (&"type".to_string(), &"Model".to_string()),
                (&"buffer".to_string(), &"HEAP".to_string()),
                (&"broadcast".to_string(), &"true".to_string()),
            ]
        );
    }

    #[test]
    fn duplicate_external_names_are_rejected() {
        let mut graph = OperatorGraph::new();
        graph.add_external_input("a", "Model", None).unwrap();
        graph.add_external_input("a", "Model", None).unwrap();

        assert!(matches!(
            inspect_graph("g", &graph),
            Err(Error::DuplicateId(_))
        ));
    }
}
