//! Rendering of execution plans.
//!
//! Every sub-plan is rendered on its own first, remembering which rendered
//! port stands for which boundary port. Inter-stage connections are then
//! linked in both directions from the opposites declared on sub-plan inputs.

use crate::inspect::dsl::inspect_operators;
use crate::inspect::{InspectionNode, Port, PortReference};
use crate::plan::{Plan, SubPlan, SubPlanId, SubPlanOutputRef};
use crate::{Error, Result};

use index_vec::IndexVec;
use indexmap::IndexMap;

struct RenderedSubPlan {
    node: InspectionNode,
    /// Rendered port id per boundary input, by input index.
    inputs: Vec<String>,
    /// Rendered port id per boundary output, by output index.
    outputs: Vec<String>,
}

pub(crate) fn inspect_plan(id: &str, plan: &Plan) -> Result<InspectionNode> {
    let mut node = InspectionNode::new(id, "Plan");
    for (key, value) in &plan.attributes {
        node.with_property(key, value);
    }
    for element in inspect_sub_plans(plan)? {
        node.add_element(element);
    }
    tracing::debug!("rendered plan {id} with {} sub-plans", plan.len());
    Ok(node)
}

fn inspect_sub_plans(plan: &Plan) -> Result<Vec<InspectionNode>> {
    let mut rendered: IndexVec<SubPlanId, RenderedSubPlan> = IndexVec::with_capacity(plan.len());
    for (id, sub_plan) in plan.elements() {
        rendered.push(inspect_sub_plan(format!("sub-{}", id.index()), sub_plan)?);
    }

    for (id, sub_plan) in plan.elements() {
        for (index, input) in sub_plan.inputs().iter().enumerate() {
            let this = PortReference::new(&rendered[id].node.id, &rendered[id].inputs[index]);
            for opposite in input.opposites() {
                let target = output_reference(&rendered, *opposite)?;
                tracing::trace!(
                    "linking {}.{} <- {}.{}",
                    this.node,
                    this.port,
                    target.node,
                    target.port
                );

                let port_id = rendered[id].inputs[index].clone();
                if let Some(port) = rendered[id].node.inputs.get_mut(&port_id) {
                    port.add_opposite(target.clone());
                }
                let port_id = rendered[opposite.sub_plan].outputs[opposite.index].clone();
                if let Some(port) = rendered[opposite.sub_plan].node.outputs.get_mut(&port_id) {
                    port.add_opposite(this.clone());
                }
            }
        }
    }

    Ok(rendered.into_iter().map(|r| r.node).collect())
}

fn output_reference(
    rendered: &IndexVec<SubPlanId, RenderedSubPlan>,
    opposite: SubPlanOutputRef,
) -> Result<PortReference> {
    let sub_plan = rendered.get(opposite.sub_plan).ok_or_else(|| {
        Error::DanglingReference(format!("sub-plan {} was not rendered", opposite.sub_plan))
    })?;
    let port = sub_plan.outputs.get(opposite.index).ok_or_else(|| {
        Error::DanglingReference(format!(
            "output {} of {} was not rendered",
            opposite.index, sub_plan.node.id
        ))
    })?;
    Ok(PortReference::new(&sub_plan.node.id, port))
}

fn inspect_sub_plan(id: String, sub_plan: &SubPlan) -> Result<RenderedSubPlan> {
    let graph = sub_plan.graph();
    let elements = inspect_operators(graph, graph.operator_ids())?;

    let mut node = InspectionNode::new(id, "SubPlan");
    for (key, value) in &sub_plan.attributes {
        node.with_property(key, value);
    }

    let mut inputs = Vec::with_capacity(sub_plan.inputs().len());
    for (index, input) in sub_plan.inputs().iter().enumerate() {
        let operator = elements.get(&input.operator()).ok_or_else(|| {
            Error::OutsideWorkingSet(format!("input {index} of {}", node.id))
        })?;
        let port = boundary_port(&operator.id, &input.attributes, operator);
        inputs.push(port.id.clone());
        node.add_input(port)?;
    }

    let mut outputs = Vec::with_capacity(sub_plan.outputs().len());
    for (index, output) in sub_plan.outputs().iter().enumerate() {
        let operator = elements.get(&output.operator()).ok_or_else(|| {
            Error::OutsideWorkingSet(format!("output {index} of {}", node.id))
        })?;
        let port = boundary_port(&operator.id, &output.attributes, operator);
        outputs.push(port.id.clone());
        node.add_output(port)?;
    }

    for (_, element) in elements {
        node.add_element(element);
    }
    Ok(RenderedSubPlan {
        node,
        inputs,
        outputs,
    })
}

/// A boundary port named after the operator it fronts, carrying its own
/// attributes followed by the operator's properties under `operator.`.
fn boundary_port(id: &str, attributes: &IndexMap<String, String>, operator: &InspectionNode) -> Port {
    let mut port = Port::new(id);
    for (key, value) in attributes {
        port.properties.insert(key.clone(), value.clone());
    }
    for (key, value) in &operator.properties {
        port.properties.insert(format!("operator.{key}"), value.clone());
    }
    port
}
