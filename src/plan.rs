//! Execution plans: sub-plans and the dependencies between them.
//!
//! A sub-plan owns an operator graph and exposes boundary ports, each of which
//! fronts exactly one internal operator. Inter-stage edges come only from the
//! opposites declared on sub-plan inputs; the resulting graph must be acyclic.
//! The planner that produces a [`Plan`] is expected to call
//! [`Plan::validate`] before handing it to inspection.

use crate::graph::{OperatorGraph, OperatorId};
use crate::{Error, Result};

use index_vec::IndexVec;
use indexmap::IndexMap;
use std::collections::{BTreeMap, BTreeSet};

index_vec::define_index_type! {
    /// Handle of a sub-plan within its plan.
    pub struct SubPlanId = u32;

    DISPLAY_FORMAT = "{}";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubPlanInputRef {
    pub sub_plan: SubPlanId,
    pub index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubPlanOutputRef {
    pub sub_plan: SubPlanId,
    pub index: usize,
}

#[derive(Debug, Clone)]
pub struct SubPlanInput {
    operator: OperatorId,
    pub attributes: IndexMap<String, String>,
    opposites: Vec<SubPlanOutputRef>,
}

#[derive(Debug, Clone)]
pub struct SubPlanOutput {
    operator: OperatorId,
    pub attributes: IndexMap<String, String>,
    opposites: Vec<SubPlanInputRef>,
}

impl SubPlanInput {
    /// The internal operator this port fronts.
    pub fn operator(&self) -> OperatorId {
        self.operator
    }

    /// Upstream outputs feeding this input.
    pub fn opposites(&self) -> &[SubPlanOutputRef] {
        &self.opposites
    }
}

impl SubPlanOutput {
    pub fn operator(&self) -> OperatorId {
        self.operator
    }

    pub fn opposites(&self) -> &[SubPlanInputRef] {
        &self.opposites
    }
}

#[derive(Debug, Clone, Default)]
pub struct SubPlan {
    graph: OperatorGraph,
    inputs: Vec<SubPlanInput>,
    outputs: Vec<SubPlanOutput>,
    pub attributes: IndexMap<String, String>,
}

impl SubPlan {
    pub fn new(graph: OperatorGraph) -> Self {
        Self {
            graph,
            ..Default::default()
        }
    }

    pub fn graph(&self) -> &OperatorGraph {
        &self.graph
    }

    pub fn inputs(&self) -> &[SubPlanInput] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[SubPlanOutput] {
        &self.outputs
    }

    /// Adds a boundary input fronting `operator`; returns its index.
    pub fn add_input(&mut self, operator: OperatorId) -> Result<usize> {
        self.check_boundary(operator, self.inputs.iter().map(|p| p.operator), "input")?;
        self.inputs.push(SubPlanInput {
            operator,
            attributes: IndexMap::new(),
            opposites: Vec::new(),
        });
        Ok(self.inputs.len() - 1)
    }

    /// Adds a boundary output fronting `operator`; returns its index.
    pub fn add_output(&mut self, operator: OperatorId) -> Result<usize> {
        self.check_boundary(operator, self.outputs.iter().map(|p| p.operator), "output")?;
        self.outputs.push(SubPlanOutput {
            operator,
            attributes: IndexMap::new(),
            opposites: Vec::new(),
        });
        Ok(self.outputs.len() - 1)
    }

    pub fn input_mut(&mut self, index: usize) -> Option<&mut SubPlanInput> {
        self.inputs.get_mut(index)
    }

    pub fn output_mut(&mut self, index: usize) -> Option<&mut SubPlanOutput> {
        self.outputs.get_mut(index)
    }

    fn check_boundary(
        &self,
        operator: OperatorId,
        mut existing: impl Iterator<Item = OperatorId>,
        direction: &str,
    ) -> Result<()> {
        if self.graph.get_operator(operator).is_none() {
            return Err(Error::MalformedSubPlan(format!(
                "{direction} refers to operator {operator} outside of the sub-plan"
            )));
        }
        if existing.any(|o| o == operator) {
            return Err(Error::MalformedSubPlan(format!(
                "operator {operator} is fronted by more than one {direction}"
            )));
        }
        Ok(())
    }

    /// Internal well-formedness: boundary ports front distinct, existing
    /// operators and the internal graph is consistent.
    pub fn validate(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        for port in &self.inputs {
            self.check_operator(port.operator, "input")?;
            if !seen.insert(port.operator) {
                return Err(Error::MalformedSubPlan(format!(
                    "operator {} is fronted by more than one input",
                    port.operator
                )));
            }
        }
        seen.clear();
        for port in &self.outputs {
            self.check_operator(port.operator, "output")?;
            if !seen.insert(port.operator) {
                return Err(Error::MalformedSubPlan(format!(
                    "operator {} is fronted by more than one output",
                    port.operator
                )));
            }
        }
        self.graph.validate()
    }

    fn check_operator(&self, operator: OperatorId, direction: &str) -> Result<()> {
        match self.graph.get_operator(operator) {
            Some(_) => Ok(()),
            None => Err(Error::MalformedSubPlan(format!(
                "{direction} refers to operator {operator} outside of the sub-plan"
            ))),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Plan {
    sub_plans: IndexVec<SubPlanId, SubPlan>,
    pub attributes: IndexMap<String, String>,
}

impl Plan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sub_plan(&mut self, sub_plan: SubPlan) -> SubPlanId {
        self.sub_plans.push(sub_plan)
    }

    pub fn sub_plan(&self, id: SubPlanId) -> &SubPlan {
        &self.sub_plans[id]
    }

    pub fn sub_plan_mut(&mut self, id: SubPlanId) -> Option<&mut SubPlan> {
        self.sub_plans.get_mut(id)
    }

    pub fn elements(&self) -> impl Iterator<Item = (SubPlanId, &SubPlan)> + '_ {
        self.sub_plans.iter_enumerated()
    }

    pub fn len(&self) -> usize {
        self.sub_plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sub_plans.is_empty()
    }

    pub fn get_input(&self, port: SubPlanInputRef) -> Option<&SubPlanInput> {
        self.sub_plans.get(port.sub_plan)?.inputs.get(port.index)
    }

    pub fn get_output(&self, port: SubPlanOutputRef) -> Option<&SubPlanOutput> {
        self.sub_plans.get(port.sub_plan)?.outputs.get(port.index)
    }

    /// Connects an upstream sub-plan output to a downstream sub-plan input,
    /// recording both directions.
    pub fn connect(&mut self, upstream: SubPlanOutputRef, downstream: SubPlanInputRef) -> Result<()> {
        if self.get_output(upstream).is_none() {
            return Err(Error::DanglingReference(format!(
                "unknown output {} of sub-plan {}",
                upstream.index, upstream.sub_plan
            )));
        }
        if self.get_input(downstream).is_none() {
            return Err(Error::DanglingReference(format!(
                "unknown input {} of sub-plan {}",
                downstream.index, downstream.sub_plan
            )));
        }

        let output = &mut self.sub_plans[upstream.sub_plan].outputs[upstream.index];
        if !output.opposites.contains(&downstream) {
            output.opposites.push(downstream);
        }
        let input = &mut self.sub_plans[downstream.sub_plan].inputs[downstream.index];
        if !input.opposites.contains(&upstream) {
            input.opposites.push(upstream);
        }
        Ok(())
    }

    /// Inter-stage edges `(upstream, downstream)` derived from input
    /// opposites, deduplicated, in sub-plan and port order.
    pub fn dependencies(&self) -> Vec<(SubPlanId, SubPlanId)> {
        let mut seen = BTreeSet::new();
        let mut edges = Vec::new();
        for (id, sub_plan) in self.sub_plans.iter_enumerated() {
            for input in &sub_plan.inputs {
                for opposite in &input.opposites {
                    let edge = (opposite.sub_plan, id);
                    if seen.insert(edge) {
                        edges.push(edge);
                    }
                }
            }
        }
        edges
    }

    /// Checks every sub-plan, the symmetry of boundary connections and the
    /// acyclicity of the inter-stage dependency graph.
    pub fn validate(&self) -> Result<()> {
        self.validate_structure()?;
        self.validate_acyclic()
    }

    /// Checks every sub-plan and the symmetry of boundary connections, but not
    /// acyclicity. Errors keep the variant raised by the failing check.
    pub fn validate_structure(&self) -> Result<()> {
        for (id, sub_plan) in self.sub_plans.iter_enumerated() {
            sub_plan
                .validate()
                .inspect_err(|e| tracing::debug!("sub-plan {id} is invalid: {e}"))?;
        }
        self.validate_symmetry()
    }

    fn validate_symmetry(&self) -> Result<()> {
        for (id, sub_plan) in self.sub_plans.iter_enumerated() {
            for (index, input) in sub_plan.inputs.iter().enumerate() {
                let this = SubPlanInputRef { sub_plan: id, index };
                for opposite in &input.opposites {
                    let output = self.get_output(*opposite).ok_or_else(|| {
                        Error::DanglingReference(format!(
                            "input {index} of sub-plan {id} refers to unknown output {} of sub-plan {}",
                            opposite.index, opposite.sub_plan
                        ))
                    })?;
                    if !output.opposites.contains(&this) {
                        return Err(Error::AsymmetricConnection(format!(
                            "input {index} of sub-plan {id} refers to output {} of sub-plan {}, but not vice versa",
                            opposite.index, opposite.sub_plan
                        )));
                    }
                }
            }
            for (index, output) in sub_plan.outputs.iter().enumerate() {
                let this = SubPlanOutputRef { sub_plan: id, index };
                for opposite in &output.opposites {
                    let input = self.get_input(*opposite).ok_or_else(|| {
                        Error::DanglingReference(format!(
                            "output {index} of sub-plan {id} refers to unknown input {} of sub-plan {}",
                            opposite.index, opposite.sub_plan
                        ))
                    })?;
                    if !input.opposites.contains(&this) {
                        return Err(Error::AsymmetricConnection(format!(
                            "output {index} of sub-plan {id} refers to input {} of sub-plan {}, but not vice versa",
                            opposite.index, opposite.sub_plan
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    fn validate_acyclic(&self) -> Result<()> {
        #[derive(Copy, Clone, PartialEq, Eq)]
        enum Mark {
            Temp,
            Perm,
        }

        fn dfs(
            v: SubPlanId,
            children: &BTreeMap<SubPlanId, Vec<SubPlanId>>,
            marks: &mut BTreeMap<SubPlanId, Mark>,
            stack: &mut Vec<SubPlanId>,
        ) -> Result<()> {
            match marks.get(&v) {
                Some(Mark::Perm) => return Ok(()),
                Some(Mark::Temp) => {
                    stack.push(v);
                    let path: Vec<String> = stack.iter().map(|id| format!("sub-{id}")).collect();
                    return Err(Error::CyclicDependency(format!(
                        "sub-plans: {}",
                        path.join(" -> ")
                    )));
                }
                None => {}
            }

            marks.insert(v, Mark::Temp);
            stack.push(v);
            if let Some(kids) = children.get(&v) {
                for k in kids {
                    dfs(*k, children, marks, stack)?;
                }
            }
            stack.pop();
            marks.insert(v, Mark::Perm);
            Ok(())
        }

        let mut children: BTreeMap<SubPlanId, Vec<SubPlanId>> = BTreeMap::new();
        for (upstream, downstream) in self.dependencies() {
            children.entry(upstream).or_default().push(downstream);
        }

        let mut marks = BTreeMap::new();
        let mut stack = Vec::new();
        for id in self.sub_plans.indices() {
            stack.clear();
            dfs(id, &children, &mut marks, &mut stack)?;
        }
        Ok(())
    }

    /// Returns the sub-plans in dependency order; ties keep plan order.
    pub fn sort(&self) -> Result<Vec<SubPlanId>> {
        self.validate_acyclic()?;

        let mut blockers: BTreeMap<SubPlanId, Vec<SubPlanId>> = BTreeMap::new();
        for (upstream, downstream) in self.dependencies() {
            blockers.entry(downstream).or_default().push(upstream);
        }

        let mut done = BTreeSet::new();
        let mut order = Vec::with_capacity(self.sub_plans.len());
        while order.len() < self.sub_plans.len() {
            let ready = self.sub_plans.indices().find(|id| {
                !done.contains(id)
                    && blockers
                        .get(id)
                        .map(|bs| bs.iter().all(|b| done.contains(b)))
                        .unwrap_or(true)
            });
            let Some(id) = ready else {
                return Err(Error::CyclicDependency("sub-plans".into()));
            };
            done.insert(id);
            order.push(id);
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{CoreOperatorKind, OperatorBody};
    use pretty_assertions::assert_eq;

    /// A sub-plan holding one checkpoint operator fronted by one input and one output.
    fn stage() -> SubPlan {
        let mut graph = OperatorGraph::new();
        let op = graph.add_operator(OperatorBody::Core(CoreOperatorKind::Checkpoint));
        let mut sub = SubPlan::new(graph);
        sub.add_input(op).unwrap();
        sub.add_output(op).unwrap();
        sub
    }

    fn out(sub_plan: SubPlanId) -> SubPlanOutputRef {
        SubPlanOutputRef { sub_plan, index: 0 }
    }

    fn inp(sub_plan: SubPlanId) -> SubPlanInputRef {
        SubPlanInputRef { sub_plan, index: 0 }
    }

    #[test]
    fn dependencies_follow_input_opposites() {
        let mut plan = Plan::new();
        let a = plan.add_sub_plan(stage());
        let b = plan.add_sub_plan(stage());
        let c = plan.add_sub_plan(stage());
        plan.connect(out(a), inp(b)).unwrap();
        plan.connect(out(a), inp(c)).unwrap();
        plan.connect(out(b), inp(c)).unwrap();
        plan.connect(out(b), inp(c)).unwrap();

        assert_eq!(plan.dependencies(), vec![(a, b), (a, c), (b, c)]);
        plan.validate().unwrap();
        assert_eq!(plan.sort().unwrap(), vec![a, b, c]);
        assert_eq!(plan.get_input(inp(c)).unwrap().opposites(), &[out(a), out(b)]);
    }

    #[test]
    fn sort_puts_producers_first() {
        let mut plan = Plan::new();
        let consumer = plan.add_sub_plan(stage());
        let producer = plan.add_sub_plan(stage());
        plan.connect(out(producer), inp(consumer)).unwrap();

        assert_eq!(plan.sort().unwrap(), vec![producer, consumer]);
    }

    #[test]
    fn cyclic_plan_is_rejected() {
        let mut plan = Plan::new();
        let a = plan.add_sub_plan(stage());
        let b = plan.add_sub_plan(stage());
        plan.connect(out(a), inp(b)).unwrap();
        plan.connect(out(b), inp(a)).unwrap();

        assert_eq!(
            plan.validate(),
            Err(Error::CyclicDependency("sub-plans: sub-0 -> sub-1 -> sub-0".into()))
        );
        assert!(plan.sort().is_err());
    }

    #[test]
    fn boundary_must_front_internal_operator_once() {
        let mut sub = stage();
        let op = sub.inputs()[0].operator();
        assert!(matches!(sub.add_input(op), Err(Error::MalformedSubPlan(_))));
        assert!(matches!(
            sub.add_output(OperatorId::from_usize(9)),
            Err(Error::MalformedSubPlan(_))
        ));
    }

    #[test]
    fn asymmetric_boundary_is_rejected() {
        let mut plan = Plan::new();
        let a = plan.add_sub_plan(stage());
        let b = plan.add_sub_plan(stage());
        plan.sub_plan_mut(b).unwrap().inputs[0].opposites.push(out(a));

        assert!(matches!(plan.validate(), Err(Error::AsymmetricConnection(_))));
    }

    #[test]
    fn internal_graph_errors_keep_their_variant() {
        let mut graph = OperatorGraph::new();
        let a = graph.add_operator(OperatorBody::Core(CoreOperatorKind::Checkpoint));
        let a_out = graph.add_output(a, "out", "Model").unwrap();
        let b = graph.add_operator(OperatorBody::Core(CoreOperatorKind::Project));
        let b_in = graph.add_input(b, "in", "Model", None).unwrap();
        graph.inputs_mut()[b_in].opposites.push(a_out);

        let mut sub = SubPlan::new(graph);
        sub.add_input(a).unwrap();
        let mut plan = Plan::new();
        plan.add_sub_plan(sub);

        assert!(matches!(plan.validate(), Err(Error::AsymmetricConnection(_))));
        assert!(matches!(
            plan.validate_structure(),
            Err(Error::AsymmetricConnection(_))
        ));
    }

    #[test]
    fn structure_check_ignores_cycles() {
        let mut plan = Plan::new();
        let a = plan.add_sub_plan(stage());
        let b = plan.add_sub_plan(stage());
        plan.connect(out(a), inp(b)).unwrap();
        plan.connect(out(b), inp(a)).unwrap();

        plan.validate_structure().unwrap();
        assert!(matches!(plan.validate(), Err(Error::CyclicDependency(_))));
    }

    #[test]
    fn connect_rejects_unknown_ports() {
        let mut plan = Plan::new();
        let a = plan.add_sub_plan(stage());
        let missing = SubPlanInputRef {
            sub_plan: a,
            index: 3,
        };
        assert!(matches!(
            plan.connect(out(a), missing),
            Err(Error::DanglingReference(_))
        ));
    }
}
