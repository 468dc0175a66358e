//! Operator kinds and their kind-specific payloads.

use crate::graph::{DataType, InputId, OperatorGraph, OutputId};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

index_vec::define_index_type! {
    /// Handle of an operator within its graph.
    pub struct OperatorId = u32;

    DISPLAY_FORMAT = "{}";
}

/// Closed set of operator kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorKind {
    Core,
    User,
    Flow,
    Input,
    Output,
    Marker,
}

impl OperatorKind {
    pub fn label(self) -> &'static str {
        match self {
            OperatorKind::Core => "core",
            OperatorKind::User => "user",
            OperatorKind::Flow => "flow",
            OperatorKind::Input => "input",
            OperatorKind::Output => "output",
            OperatorKind::Marker => "marker",
        }
    }
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Built-in operators provided by the compiler itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoreOperatorKind {
    Checkpoint,
    Project,
    Extend,
    Restructure,
}

impl fmt::Display for CoreOperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CoreOperatorKind::Checkpoint => "Checkpoint",
            CoreOperatorKind::Project => "Project",
            CoreOperatorKind::Extend => "Extend",
            CoreOperatorKind::Restructure => "Restructure",
        };
        f.write_str(name)
    }
}

/// Size hint of an external input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSize {
    #[default]
    Unknown,
    Tiny,
    Small,
    Large,
}

impl fmt::Display for DataSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataSize::Unknown => "UNKNOWN",
            DataSize::Tiny => "TINY",
            DataSize::Small => "SMALL",
            DataSize::Large => "LARGE",
        };
        f.write_str(name)
    }
}

/// Symbolic constraints declared on an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperatorConstraint {
    AtLeastOnce,
    AtMostOnce,
    Generator,
}

impl fmt::Display for OperatorConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperatorConstraint::AtLeastOnce => "AT_LEAST_ONCE",
            OperatorConstraint::AtMostOnce => "AT_MOST_ONCE",
            OperatorConstraint::Generator => "GENERATOR",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorArgument {
    pub name: String,
    pub data_type: DataType,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct UserOperator {
    /// Simple name of the operator annotation, e.g. `Update`.
    pub annotation: String,
    pub declaring_class: String,
    pub method: String,
}

#[derive(Debug, Clone)]
pub struct FlowOperator {
    pub description_class: String,
    pub graph: OperatorGraph,
}

#[derive(Debug, Clone)]
pub struct ExternalInputInfo {
    pub module: String,
    pub description_class: String,
    pub data_size: DataSize,
}

#[derive(Debug, Clone)]
pub struct ExternalOutputInfo {
    pub module: String,
    pub description_class: String,
}

#[derive(Debug, Clone)]
pub struct ExternalInput {
    pub name: String,
    pub data_type: DataType,
    /// Present only when this input is a boundary of the whole program.
    pub info: Option<ExternalInputInfo>,
}

#[derive(Debug, Clone)]
pub struct ExternalOutput {
    pub name: String,
    pub data_type: DataType,
    pub info: Option<ExternalOutputInfo>,
}

#[derive(Debug, Clone)]
pub struct MarkerOperator {
    pub data_type: DataType,
    pub attributes: IndexMap<String, String>,
}

/// Kind-specific payload of an operator.
#[derive(Debug, Clone)]
pub enum OperatorBody {
    Core(CoreOperatorKind),
    User(UserOperator),
    Flow(FlowOperator),
    Input(ExternalInput),
    Output(ExternalOutput),
    Marker(MarkerOperator),
}

impl OperatorBody {
    pub fn kind(&self) -> OperatorKind {
        match self {
            OperatorBody::Core(_) => OperatorKind::Core,
            OperatorBody::User(_) => OperatorKind::User,
            OperatorBody::Flow(_) => OperatorKind::Flow,
            OperatorBody::Input(_) => OperatorKind::Input,
            OperatorBody::Output(_) => OperatorKind::Output,
            OperatorBody::Marker(_) => OperatorKind::Marker,
        }
    }
}

/// A node of the operator graph.
///
/// Ports are owned by the graph arena; the operator only lists their handles
/// in declaration order.
#[derive(Debug, Clone)]
pub struct Operator {
    pub(crate) id: OperatorId,
    pub(crate) body: OperatorBody,
    pub(crate) inputs: Vec<InputId>,
    pub(crate) outputs: Vec<OutputId>,
    pub(crate) arguments: Vec<OperatorArgument>,
    pub(crate) constraints: BTreeSet<OperatorConstraint>,
}

impl Operator {
    pub fn id(&self) -> OperatorId {
        self.id
    }

    pub fn kind(&self) -> OperatorKind {
        self.body.kind()
    }

    pub fn body(&self) -> &OperatorBody {
        &self.body
    }

    pub fn inputs(&self) -> &[InputId] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[OutputId] {
        &self.outputs
    }

    pub fn arguments(&self) -> &[OperatorArgument] {
        &self.arguments
    }

    pub fn constraints(&self) -> &BTreeSet<OperatorConstraint> {
        &self.constraints
    }
}
