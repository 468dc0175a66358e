//! Intermediate representation of batch dataflow programs.
//!
//! - [`graph`]: operators, typed ports and their connections
//! - [`batch`]: jobflows ordered by blocker dependencies
//! - [`plan`]: execution plans split into sub-plans
//! - [`inspect`]: renders any of the above into an id-referenced tree
//! - [`document`]: JSON input documents describing the IR
//! - [`render`]: JSON, Graphviz and HTML output of inspection trees

pub mod batch;
pub mod document;
pub mod error;
pub mod graph;
pub mod inspect;
pub mod plan;
pub mod render;

pub use error::{Error, Result};
