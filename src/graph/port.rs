//! Operator ports and their opposite references.
//!
//! Ports live in the arena of the owning [`OperatorGraph`](super::OperatorGraph)
//! and refer to each other through [`InputId`] / [`OutputId`] handles, so a
//! connection never creates an ownership cycle.

use crate::graph::{Group, OperatorId};

use std::fmt;

index_vec::define_index_type! {
    /// Handle of an operator input within its graph.
    pub struct InputId = u32;

    DISPLAY_FORMAT = "{}";
}

index_vec::define_index_type! {
    /// Handle of an operator output within its graph.
    pub struct OutputId = u32;

    DISPLAY_FORMAT = "{}";
}

/// Record type carried by a port or an external boundary.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DataType(String);

impl DataType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DataType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

#[derive(Debug, Clone)]
pub struct OperatorInput {
    pub(crate) owner: OperatorId,
    pub(crate) index: usize,
    pub(crate) name: String,
    pub(crate) data_type: DataType,
    pub(crate) group: Option<Group>,
    pub(crate) opposites: Vec<OutputId>,
}

#[derive(Debug, Clone)]
pub struct OperatorOutput {
    pub(crate) owner: OperatorId,
    pub(crate) index: usize,
    pub(crate) name: String,
    pub(crate) data_type: DataType,
    pub(crate) opposites: Vec<InputId>,
}

impl OperatorInput {
    pub fn owner(&self) -> OperatorId {
        self.owner
    }

    /// Position within the owner's input list.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    pub fn group(&self) -> Option<&Group> {
        self.group.as_ref()
    }

    pub fn opposites(&self) -> &[OutputId] {
        &self.opposites
    }

    /// Identifier of this port within its rendered operator.
    pub fn port_id(&self) -> String {
        input_port_id(self.index)
    }
}

impl OperatorOutput {
    pub fn owner(&self) -> OperatorId {
        self.owner
    }

    /// Position within the owner's output list.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    pub fn opposites(&self) -> &[InputId] {
        &self.opposites
    }

    pub fn port_id(&self) -> String {
        output_port_id(self.index)
    }
}

pub fn input_port_id(index: usize) -> String {
    format!("in{index}")
}

pub fn output_port_id(index: usize) -> String {
    format!("out{index}")
}
