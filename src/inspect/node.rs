//! Serializable inspection tree.
//!
//! Nodes refer to each other only through `(node id, port id)` pairs, so a
//! tree is a self-contained snapshot of the inspected graph. Maps keep
//! insertion order; together with deterministic id assignment this makes the
//! serialized form stable across calls.

use crate::{Error, Result};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortReference {
    pub node: String,
    pub port: String,
}

impl PortReference {
    pub fn new(node: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            port: port.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    pub id: String,
    #[serde(default)]
    pub properties: IndexMap<String, String>,
    #[serde(default)]
    pub opposites: Vec<PortReference>,
}

impl Port {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            properties: IndexMap::new(),
            opposites: Vec::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.properties.insert(key.into(), value.to_string());
        self
    }

    /// Adds an opposite reference unless it is already present.
    pub fn add_opposite(&mut self, opposite: PortReference) {
        if !self.opposites.contains(&opposite) {
            self.opposites.push(opposite);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectionNode {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub properties: IndexMap<String, String>,
    #[serde(default)]
    pub inputs: IndexMap<String, Port>,
    #[serde(default)]
    pub outputs: IndexMap<String, Port>,
    #[serde(default)]
    pub elements: Vec<InspectionNode>,
}

impl InspectionNode {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            properties: IndexMap::new(),
            inputs: IndexMap::new(),
            outputs: IndexMap::new(),
            elements: Vec::new(),
        }
    }

    pub fn with_property(&mut self, key: impl Into<String>, value: impl ToString) -> &mut Self {
        self.properties.insert(key.into(), value.to_string());
        self
    }

    pub fn add_input(&mut self, port: Port) -> Result<()> {
        if self.inputs.contains_key(&port.id) {
            return Err(Error::DuplicatePort {
                node: self.id.clone(),
                port: port.id,
            });
        }
        self.inputs.insert(port.id.clone(), port);
        Ok(())
    }

    pub fn add_output(&mut self, port: Port) -> Result<()> {
        if self.outputs.contains_key(&port.id) {
            return Err(Error::DuplicatePort {
                node: self.id.clone(),
                port: port.id,
            });
        }
        self.outputs.insert(port.id.clone(), port);
        Ok(())
    }

    pub fn add_element(&mut self, element: InspectionNode) {
        self.elements.push(element);
    }

    pub fn element(&self, id: &str) -> Option<&InspectionNode> {
        self.elements.iter().find(|e| e.id == id)
    }

    pub fn input(&self, id: &str) -> Option<&Port> {
        self.inputs.get(id)
    }

    pub fn output(&self, id: &str) -> Option<&Port> {
        self.outputs.get(id)
    }

    /// Checks, at every level of the tree, that each opposite among sibling
    /// elements resolves to an existing port and refers back.
    ///
    /// Ports of this node itself are not checked against anything: their
    /// opposites belong to the enclosing level.
    pub fn verify_symmetry(&self) -> Result<()> {
        let index: HashMap<&str, &InspectionNode> =
            self.elements.iter().map(|e| (e.id.as_str(), e)).collect();

        for element in &self.elements {
            for port in element.inputs.values() {
                let this = PortReference::new(&element.id, &port.id);
                for opposite in &port.opposites {
                    let target = index
                        .get(opposite.node.as_str())
                        .and_then(|n| n.outputs.get(&opposite.port))
                        .ok_or_else(|| {
                            Error::DanglingReference(format!(
                                "input {}.{} refers to missing output {}.{}",
                                element.id, port.id, opposite.node, opposite.port
                            ))
                        })?;
                    if !target.opposites.contains(&this) {
                        return Err(Error::AsymmetricConnection(format!(
                            "input {}.{} refers to output {}.{}, but not vice versa",
                            element.id, port.id, opposite.node, opposite.port
                        )));
                    }
                }
            }
            for port in element.outputs.values() {
                let this = PortReference::new(&element.id, &port.id);
                for opposite in &port.opposites {
                    let target = index
                        .get(opposite.node.as_str())
                        .and_then(|n| n.inputs.get(&opposite.port))
                        .ok_or_else(|| {
                            Error::DanglingReference(format!(
                                "output {}.{} refers to missing input {}.{}",
                                element.id, port.id, opposite.node, opposite.port
                            ))
                        })?;
                    if !target.opposites.contains(&this) {
                        return Err(Error::AsymmetricConnection(format!(
                            "output {}.{} refers to input {}.{}, but not vice versa",
                            element.id, port.id, opposite.node, opposite.port
                        )));
                    }
                }
            }
            element.verify_symmetry()?;
        }
        Ok(())
    }
}
