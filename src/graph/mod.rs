//! Operator graph: operators, ports and the connections between them.
//!
//! The graph is an arena. Operators and ports are addressed by handles, and
//! each connection is recorded on both of its ports:
//!
//!   output.opposites contains input  <=>  input.opposites contains output
//!
//! `connect` maintains this by construction. Graphs that are assembled some
//! other way can be checked with [`OperatorGraph::validate`].

pub mod key;
pub mod operator;
pub mod port;

pub use key::{Direction, Group, Ordering};
pub use operator::{
    CoreOperatorKind, DataSize, ExternalInput, ExternalInputInfo, ExternalOutput,
    ExternalOutputInfo, FlowOperator, MarkerOperator, Operator, OperatorArgument, OperatorBody,
    OperatorConstraint, OperatorId, OperatorKind, UserOperator,
};
pub use port::{DataType, InputId, OperatorInput, OperatorOutput, OutputId};

use crate::{Error, Result};

use index_vec::IndexVec;
use std::collections::{BTreeSet, HashSet, VecDeque};

#[derive(Debug, Clone, Default)]
pub struct OperatorGraph {
    operators: IndexVec<OperatorId, Operator>,
    inputs: IndexVec<InputId, OperatorInput>,
    outputs: IndexVec<OutputId, OperatorOutput>,
}

impl OperatorGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    pub fn add_operator(&mut self, body: OperatorBody) -> OperatorId {
        let id = self.operators.next_idx();
        self.operators.push(Operator {
            id,
            body,
            inputs: Vec::new(),
            outputs: Vec::new(),
            arguments: Vec::new(),
            constraints: BTreeSet::new(),
        })
    }

    pub fn add_input(
        &mut self,
        owner: OperatorId,
        name: impl Into<String>,
        data_type: impl Into<DataType>,
        group: Option<Group>,
    ) -> Result<InputId> {
        let index = self.try_operator(owner)?.inputs.len();
        let id = self.inputs.push(OperatorInput {
            owner,
            index,
            name: name.into(),
            data_type: data_type.into(),
            group,
            opposites: Vec::new(),
        });
        self.operators[owner].inputs.push(id);
        Ok(id)
    }

    pub fn add_output(
        &mut self,
        owner: OperatorId,
        name: impl Into<String>,
        data_type: impl Into<DataType>,
    ) -> Result<OutputId> {
        let index = self.try_operator(owner)?.outputs.len();
        let id = self.outputs.push(OperatorOutput {
            owner,
            index,
            name: name.into(),
            data_type: data_type.into(),
            opposites: Vec::new(),
        });
        self.operators[owner].outputs.push(id);
        Ok(id)
    }

    pub fn add_argument(&mut self, owner: OperatorId, argument: OperatorArgument) -> Result<()> {
        self.try_operator(owner)?;
        self.operators[owner].arguments.push(argument);
        Ok(())
    }

    pub fn add_constraint(&mut self, owner: OperatorId, constraint: OperatorConstraint) -> Result<()> {
        self.try_operator(owner)?;
        self.operators[owner].constraints.insert(constraint);
        Ok(())
    }

    /// Adds an input operator with a single output port named `port`.
    pub fn add_external_input(
        &mut self,
        name: impl Into<String>,
        data_type: impl Into<DataType>,
        info: Option<ExternalInputInfo>,
    ) -> Result<(OperatorId, OutputId)> {
        let data_type = data_type.into();
        let id = self.add_operator(OperatorBody::Input(ExternalInput {
            name: name.into(),
            data_type: data_type.clone(),
            info,
        }));
        let port = self.add_output(id, "port", data_type)?;
        Ok((id, port))
    }

    /// Adds an output operator with a single input port named `port`.
    pub fn add_external_output(
        &mut self,
        name: impl Into<String>,
        data_type: impl Into<DataType>,
        info: Option<ExternalOutputInfo>,
    ) -> Result<(OperatorId, InputId)> {
        let data_type = data_type.into();
        let id = self.add_operator(OperatorBody::Output(ExternalOutput {
            name: name.into(),
            data_type: data_type.clone(),
            info,
        }));
        let port = self.add_input(id, "port", data_type, None)?;
        Ok((id, port))
    }

    /// Connects `upstream` to `downstream`, recording both directions.
    ///
    /// Connecting an already connected pair is a no-op.
    pub fn connect(&mut self, upstream: OutputId, downstream: InputId) -> Result<()> {
        self.try_output(upstream)?;
        self.try_input(downstream)?;

        let output = &mut self.outputs[upstream];
        if !output.opposites.contains(&downstream) {
            output.opposites.push(downstream);
        }
        let input = &mut self.inputs[downstream];
        if !input.opposites.contains(&upstream) {
            input.opposites.push(upstream);
        }
        Ok(())
    }

    /// Removes the connection between `upstream` and `downstream` in both directions.
    pub fn disconnect(&mut self, upstream: OutputId, downstream: InputId) -> Result<()> {
        self.try_output(upstream)?;
        self.try_input(downstream)?;

        self.outputs[upstream].opposites.retain(|id| *id != downstream);
        self.inputs[downstream].opposites.retain(|id| *id != upstream);
        Ok(())
    }

    pub fn operator(&self, id: OperatorId) -> &Operator {
        &self.operators[id]
    }

    pub fn input(&self, id: InputId) -> &OperatorInput {
        &self.inputs[id]
    }

    pub fn output(&self, id: OutputId) -> &OperatorOutput {
        &self.outputs[id]
    }

    pub fn get_operator(&self, id: OperatorId) -> Option<&Operator> {
        self.operators.get(id)
    }

    pub fn get_input(&self, id: InputId) -> Option<&OperatorInput> {
        self.inputs.get(id)
    }

    pub fn get_output(&self, id: OutputId) -> Option<&OperatorOutput> {
        self.outputs.get(id)
    }

    pub fn operators(&self) -> impl Iterator<Item = &Operator> + '_ {
        self.operators.iter()
    }

    pub fn operator_ids(&self) -> impl Iterator<Item = OperatorId> + '_ {
        self.operators.indices()
    }

    /// Operators feeding any input of `id`, in first-seen order.
    pub fn upstream_operators(&self, id: OperatorId) -> Vec<OperatorId> {
        let mut seen = HashSet::new();
        self.operators[id]
            .inputs
            .iter()
            .flat_map(|port| self.inputs[*port].opposites.iter())
            .map(|opposite| self.outputs[*opposite].owner)
            .filter(|owner| seen.insert(*owner))
            .collect()
    }

    /// Operators fed by any output of `id`, in first-seen order.
    pub fn downstream_operators(&self, id: OperatorId) -> Vec<OperatorId> {
        let mut seen = HashSet::new();
        self.operators[id]
            .outputs
            .iter()
            .flat_map(|port| self.outputs[*port].opposites.iter())
            .map(|opposite| self.inputs[*opposite].owner)
            .filter(|owner| seen.insert(*owner))
            .collect()
    }

    /// Returns the operators reachable from `seeds` through port opposites in
    /// either direction, seeds included.
    ///
    /// Breadth-first: seeds keep their iteration order, then operators follow
    /// in discovery order (inputs before outputs, each in port order). A seed
    /// set that is already closed is returned in its own order, so the
    /// operation is idempotent.
    ///
    /// A seed that is not an operator of this graph is a
    /// [`Error::DanglingReference`].
    pub fn transitive_connected<I>(&self, seeds: I) -> Result<Vec<OperatorId>>
    where
        I: IntoIterator<Item = OperatorId>,
    {
        let mut work: VecDeque<OperatorId> = VecDeque::new();
        for seed in seeds {
            self.try_operator(seed)?;
            work.push_back(seed);
        }
        let mut visited: HashSet<OperatorId> = HashSet::new();
        let mut results = Vec::new();

        while let Some(next) = work.pop_front() {
            let operator = self.try_operator(next)?;
            if !visited.insert(next) {
                continue;
            }
            results.push(next);

            for port in &operator.inputs {
                for opposite in &self.inputs[*port].opposites {
                    if let Some(output) = self.outputs.get(*opposite) {
                        work.push_back(output.owner);
                    }
                }
            }
            for port in &operator.outputs {
                for opposite in &self.outputs[*port].opposites {
                    if let Some(input) = self.inputs.get(*opposite) {
                        work.push_back(input.owner);
                    }
                }
            }
        }
        Ok(results)
    }

    /// Checks ownership and connection symmetry, including nested flow graphs.
    pub fn validate(&self) -> Result<()> {
        for (id, input) in self.inputs.iter_enumerated() {
            let owner = self.try_operator(input.owner)?;
            if owner.inputs.get(input.index) != Some(&id) {
                return Err(Error::DanglingReference(format!(
                    "input {id} is not listed by its owner operator {}",
                    input.owner
                )));
            }
            for opposite in &input.opposites {
                let output = self.try_output(*opposite)?;
                if !output.opposites.contains(&id) {
                    return Err(Error::AsymmetricConnection(format!(
                        "input {} of operator {} refers to output {} of operator {}, but not vice versa",
                        input.index, input.owner, output.index, output.owner
                    )));
                }
            }
        }
        for (id, output) in self.outputs.iter_enumerated() {
            let owner = self.try_operator(output.owner)?;
            if owner.outputs.get(output.index) != Some(&id) {
                return Err(Error::DanglingReference(format!(
                    "output {id} is not listed by its owner operator {}",
                    output.owner
                )));
            }
            for opposite in &output.opposites {
                let input = self.try_input(*opposite)?;
                if !input.opposites.contains(&id) {
                    return Err(Error::AsymmetricConnection(format!(
                        "output {} of operator {} refers to input {} of operator {}, but not vice versa",
                        output.index, output.owner, input.index, input.owner
                    )));
                }
            }
        }
        for operator in &self.operators {
            if let OperatorBody::Flow(flow) = &operator.body {
                flow.graph.validate()?;
            }
        }
        Ok(())
    }

    fn try_operator(&self, id: OperatorId) -> Result<&Operator> {
        self.operators
            .get(id)
            .ok_or_else(|| Error::DanglingReference(format!("unknown operator {id}")))
    }

    fn try_input(&self, id: InputId) -> Result<&OperatorInput> {
        self.inputs
            .get(id)
            .ok_or_else(|| Error::DanglingReference(format!("unknown input {id}")))
    }

    fn try_output(&self, id: OutputId) -> Result<&OperatorOutput> {
        self.outputs
            .get(id)
            .ok_or_else(|| Error::DanglingReference(format!("unknown output {id}")))
    }

    #[cfg(test)]
    pub(crate) fn inputs_mut(&mut self) -> &mut IndexVec<InputId, OperatorInput> {
        &mut self.inputs
    }
}
