//! Errors raised while building, validating or inspecting the IR.
//!
//! Every variant describes a contract violation by whoever produced the
//! graph. Nothing here is recoverable inside a single inspection call.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("asymmetric connection: {0}")]
    AsymmetricConnection(String),
    #[error("dangling reference: {0}")]
    DanglingReference(String),
    #[error("{0} is connected to an operator outside of the inspected set")]
    OutsideWorkingSet(String),
    #[error("duplicate id: {0}")]
    DuplicateId(String),
    #[error("duplicate port {port} on node {node}")]
    DuplicatePort { node: String, port: String },
    #[error("cyclic dependency: {0}")]
    CyclicDependency(String),
    #[error("malformed sub-plan: {0}")]
    MalformedSubPlan(String),
    #[error("invalid key term {term:?}: {reason}")]
    InvalidKey { term: String, reason: String },
    #[error("invalid document: {0}")]
    InvalidDocument(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
