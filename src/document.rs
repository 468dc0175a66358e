//! Input document: a JSON rendering of the IR produced by an external graph
//! builder or planner.
//!
//! JSON shape:
//! {
//!   "level": "graph",                 // batch | jobflow | graph | plan
//!   "id": "main",
//!   "graph": {
//!     "operators": [
//!       { "name": "src", "kind": "input", "external_name": "sales", "data_type": "Sales",
//!         "outputs": [{ "name": "port", "data_type": "Sales" }] },
//!       { "name": "upd", "kind": "user", "annotation": "Update",
//!         "class": "com.example.Ops", "method": "update",
//!         "inputs":  [{ "name": "in",  "data_type": "Sales", "group": { "grouping": ["store"] } }],
//!         "outputs": [{ "name": "out", "data_type": "Sales" }] }
//!     ],
//!     "connections": [{ "from": "src.port", "to": "upd.in" }]
//!   }
//! }
//!
//! Operators are named locally (`name`); connections refer to
//! `<operator>.<port>`. Plan connections refer to
//! `<sub-plan>.<operator>` where the operator is fronted by a boundary port.
//! Jobflows in a batch list their blockers by jobflow id.

use crate::batch::{Batch, Jobflow};
use crate::graph::{
    CoreOperatorKind, DataSize, ExternalInput, ExternalInputInfo, ExternalOutput,
    ExternalOutputInfo, FlowOperator, Group, InputId, MarkerOperator, OperatorArgument,
    OperatorBody, OperatorConstraint, OperatorGraph, OperatorId, OutputId, UserOperator,
};
use crate::plan::{Plan, SubPlan, SubPlanId, SubPlanInputRef, SubPlanOutputRef};
use crate::{Error, Result};

use indexmap::IndexMap;
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "level", rename_all = "snake_case")]
pub enum Document {
    Batch(RawBatch),
    Jobflow(RawJobflow),
    Graph { id: String, graph: RawGraph },
    Plan { id: String, plan: RawPlan },
}

/// A validated document, ready for inspection.
#[derive(Debug, Clone)]
pub enum Target {
    Batch(Batch),
    Jobflow(Jobflow),
    Graph(String, OperatorGraph),
    Plan(String, Plan),
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawBatch {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub jobflows: Vec<RawJobflow>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawJobflow {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub blockers: Vec<String>,
    #[serde(default)]
    pub graph: RawGraph,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawGraph {
    #[serde(default)]
    pub operators: Vec<RawOperator>,
    #[serde(default)]
    pub connections: Vec<RawConnection>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawOperator {
    pub name: String,

    #[serde(flatten)]
    pub body: RawBody,

    #[serde(default)]
    pub inputs: Vec<RawPort>,

    #[serde(default)]
    pub outputs: Vec<RawPort>,

    #[serde(default)]
    pub arguments: Vec<RawArgument>,

    #[serde(default)]
    pub constraints: Vec<OperatorConstraint>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RawBody {
    Core {
        core: CoreOperatorKind,
    },
    User {
        annotation: String,
        class: String,
        method: String,
    },
    Flow {
        description: String,
        graph: Box<RawGraph>,
    },
    Input {
        external_name: String,
        data_type: String,
        #[serde(default)]
        external: Option<RawExternalInput>,
    },
    Output {
        external_name: String,
        data_type: String,
        #[serde(default)]
        external: Option<RawExternalOutput>,
    },
    Marker {
        data_type: String,
        #[serde(default)]
        attributes: IndexMap<String, String>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawExternalInput {
    pub module: String,
    pub description: String,
    #[serde(default)]
    pub size: DataSize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawExternalOutput {
    pub module: String,
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPort {
    pub name: String,
    pub data_type: String,
    #[serde(default)]
    pub group: Option<RawGroup>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawGroup {
    #[serde(default)]
    pub grouping: Vec<String>,
    #[serde(default)]
    pub ordering: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawArgument {
    pub name: String,
    #[serde(default = "default_argument_type")]
    pub data_type: String,
    pub value: String,
}

fn default_argument_type() -> String {
    "String".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawConnection {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPlan {
    #[serde(default)]
    pub attributes: IndexMap<String, String>,
    #[serde(default)]
    pub sub_plans: Vec<RawSubPlan>,
    #[serde(default)]
    pub connections: Vec<RawConnection>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawSubPlan {
    pub name: String,
    #[serde(default)]
    pub attributes: IndexMap<String, String>,
    #[serde(default)]
    pub graph: RawGraph,
    #[serde(default)]
    pub inputs: Vec<RawBoundary>,
    #[serde(default)]
    pub outputs: Vec<RawBoundary>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawBoundary {
    pub operator: String,
    #[serde(default)]
    pub attributes: IndexMap<String, String>,
}

impl Document {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::InvalidDocument(e.to_string()))
    }

    /// Validates names and references and builds the IR.
    pub fn build(&self) -> Result<Target> {
        match self {
            Document::Batch(raw) => raw.build().map(Target::Batch),
            Document::Jobflow(raw) => raw.build().map(Target::Jobflow),
            Document::Graph { id, graph } => Ok(Target::Graph(id.clone(), graph.build()?.graph)),
            Document::Plan { id, plan } => Ok(Target::Plan(id.clone(), plan.build()?)),
        }
    }
}

impl RawBatch {
    pub fn build(&self) -> Result<Batch> {
        let mut batch = Batch::new(&self.id);
        batch.description_class = self.description.clone();
        batch.comment = self.comment.clone();

        let mut ids = Vec::with_capacity(self.jobflows.len());
        for raw in &self.jobflows {
            ids.push(batch.add_element(raw.build()?)?);
        }
        for (raw, downstream) in self.jobflows.iter().zip(&ids) {
            for blocker in &raw.blockers {
                let upstream = batch.find(blocker).ok_or_else(|| {
                    Error::InvalidDocument(format!(
                        "jobflow {} is blocked by unknown jobflow {blocker}",
                        raw.id
                    ))
                })?;
                batch.add_blocker(*downstream, upstream)?;
            }
        }
        Ok(batch)
    }
}

impl RawJobflow {
    pub fn build(&self) -> Result<Jobflow> {
        let graph = self.graph.build()?.graph;
        Ok(Jobflow::new(&self.id, &self.description, graph))
    }
}

/// A built graph plus the local operator names used to build it.
pub struct BuiltGraph {
    pub graph: OperatorGraph,
    pub names: BTreeMap<String, OperatorId>,
}

impl RawGraph {
    pub fn build(&self) -> Result<BuiltGraph> {
        let mut graph = OperatorGraph::new();
        let mut names: BTreeMap<String, OperatorId> = BTreeMap::new();
        let mut input_ports: BTreeMap<(String, String), InputId> = BTreeMap::new();
        let mut output_ports: BTreeMap<(String, String), OutputId> = BTreeMap::new();

        for raw in &self.operators {
            if names.contains_key(&raw.name) {
                return Err(Error::InvalidDocument(format!(
                    "duplicate operator name {}",
                    raw.name
                )));
            }
            let id = graph.add_operator(raw.body.build()?);
            names.insert(raw.name.clone(), id);

            for port in &raw.inputs {
                let group = port
                    .group
                    .as_ref()
                    .map(|g| Group::parse(&g.grouping, &g.ordering))
                    .transpose()?;
                let input = graph.add_input(id, &port.name, port.data_type.as_str(), group)?;
                if input_ports
                    .insert((raw.name.clone(), port.name.clone()), input)
                    .is_some()
                {
                    return Err(Error::InvalidDocument(format!(
                        "duplicate input {}.{}",
                        raw.name, port.name
                    )));
                }
            }
            for port in &raw.outputs {
                let output = graph.add_output(id, &port.name, port.data_type.as_str())?;
                if output_ports
                    .insert((raw.name.clone(), port.name.clone()), output)
                    .is_some()
                {
                    return Err(Error::InvalidDocument(format!(
                        "duplicate output {}.{}",
                        raw.name, port.name
                    )));
                }
            }
            for argument in &raw.arguments {
                graph.add_argument(
                    id,
                    OperatorArgument {
                        name: argument.name.clone(),
                        data_type: argument.data_type.as_str().into(),
                        value: argument.value.clone(),
                    },
                )?;
            }
            for constraint in &raw.constraints {
                graph.add_constraint(id, *constraint)?;
            }
        }

        for connection in &self.connections {
            let from = split_ref(&connection.from)?;
            let to = split_ref(&connection.to)?;
            let upstream = output_ports.get(&from).ok_or_else(|| {
                Error::InvalidDocument(format!("connection from unknown output {}", connection.from))
            })?;
            let downstream = input_ports.get(&to).ok_or_else(|| {
                Error::InvalidDocument(format!("connection to unknown input {}", connection.to))
            })?;
            graph.connect(*upstream, *downstream)?;
        }

        Ok(BuiltGraph { graph, names })
    }
}

impl RawBody {
    fn build(&self) -> Result<OperatorBody> {
        let body = match self {
            RawBody::Core { core } => OperatorBody::Core(*core),
            RawBody::User {
                annotation,
                class,
                method,
            } => OperatorBody::User(UserOperator {
                annotation: annotation.clone(),
                declaring_class: class.clone(),
                method: method.clone(),
            }),
            RawBody::Flow { description, graph } => OperatorBody::Flow(FlowOperator {
                description_class: description.clone(),
                graph: graph.build()?.graph,
            }),
            RawBody::Input {
                external_name,
                data_type,
                external,
            } => OperatorBody::Input(ExternalInput {
                name: external_name.clone(),
                data_type: data_type.as_str().into(),
                info: external.as_ref().map(|e| ExternalInputInfo {
                    module: e.module.clone(),
                    description_class: e.description.clone(),
                    data_size: e.size,
                }),
            }),
            RawBody::Output {
                external_name,
                data_type,
                external,
            } => OperatorBody::Output(ExternalOutput {
                name: external_name.clone(),
                data_type: data_type.as_str().into(),
                info: external.as_ref().map(|e| ExternalOutputInfo {
                    module: e.module.clone(),
                    description_class: e.description.clone(),
                }),
            }),
            RawBody::Marker {
                data_type,
                attributes,
            } => OperatorBody::Marker(MarkerOperator {
                data_type: data_type.as_str().into(),
                attributes: attributes.clone(),
            }),
        };
        Ok(body)
    }
}

impl RawPlan {
    pub fn build(&self) -> Result<Plan> {
        let mut plan = Plan::new();
        plan.attributes = self.attributes.clone();

        // (sub-plan name, operator name) -> boundary port
        let mut inputs: BTreeMap<(String, String), SubPlanInputRef> = BTreeMap::new();
        let mut outputs: BTreeMap<(String, String), SubPlanOutputRef> = BTreeMap::new();
        let mut sub_plan_names: BTreeMap<String, SubPlanId> = BTreeMap::new();

        for raw in &self.sub_plans {
            if sub_plan_names.contains_key(&raw.name) {
                return Err(Error::InvalidDocument(format!(
                    "duplicate sub-plan name {}",
                    raw.name
                )));
            }
            let built = raw.graph.build()?;
            let mut sub_plan = SubPlan::new(built.graph);
            sub_plan.attributes = raw.attributes.clone();

            let mut boundary = Vec::new();
            for port in &raw.inputs {
                let operator = lookup_operator(&built.names, &raw.name, &port.operator)?;
                let index = sub_plan.add_input(operator)?;
                if let Some(input) = sub_plan.input_mut(index) {
                    input.attributes = port.attributes.clone();
                }
                boundary.push((true, port.operator.clone(), index));
            }
            for port in &raw.outputs {
                let operator = lookup_operator(&built.names, &raw.name, &port.operator)?;
                let index = sub_plan.add_output(operator)?;
                if let Some(output) = sub_plan.output_mut(index) {
                    output.attributes = port.attributes.clone();
                }
                boundary.push((false, port.operator.clone(), index));
            }

            let id = plan.add_sub_plan(sub_plan);
            sub_plan_names.insert(raw.name.clone(), id);
            for (is_input, operator, index) in boundary {
                let key = (raw.name.clone(), operator);
                if is_input {
                    inputs.insert(key, SubPlanInputRef { sub_plan: id, index });
                } else {
                    outputs.insert(key, SubPlanOutputRef { sub_plan: id, index });
                }
            }
        }

        for connection in &self.connections {
            let from = split_ref(&connection.from)?;
            let to = split_ref(&connection.to)?;
            let upstream = outputs.get(&from).ok_or_else(|| {
                Error::InvalidDocument(format!(
                    "plan connection from unknown sub-plan output {}",
                    connection.from
                ))
            })?;
            let downstream = inputs.get(&to).ok_or_else(|| {
                Error::InvalidDocument(format!(
                    "plan connection to unknown sub-plan input {}",
                    connection.to
                ))
            })?;
            plan.connect(*upstream, *downstream)?;
        }

        Ok(plan)
    }
}

fn lookup_operator(
    names: &BTreeMap<String, OperatorId>,
    sub_plan: &str,
    operator: &str,
) -> Result<OperatorId> {
    names.get(operator).copied().ok_or_else(|| {
        Error::InvalidDocument(format!(
            "sub-plan {sub_plan} has a boundary port on unknown operator {operator}"
        ))
    })
}

/// Splits `owner.member` at the last dot.
fn split_ref(s: &str) -> Result<(String, String)> {
    match s.trim().rsplit_once('.') {
        Some((owner, member)) if !owner.is_empty() && !member.is_empty() => {
            Ok((owner.to_string(), member.to_string()))
        }
        _ => Err(Error::InvalidDocument(format!(
            "reference must look like <owner>.<member>: {s:?}"
        ))),
    }
}
