//! Inspection engine: renders any level of the IR into an id-referenced tree.
//!
//! Entry points, one per granularity:
//! - [`Inspector::inspect_batch`]     Batch    -> jobflows (+ dependency ports) -> operators
//! - [`Inspector::inspect_jobflow`]   Jobflow  -> operators
//! - [`Inspector::inspect_graph`]     graph    -> operators
//! - [`Inspector::inspect_operators`] closure of a seed set
//! - [`Inspector::inspect_plan`]      Plan     -> sub-plans (+ boundary ports) -> operators
//!
//! Each call builds its own counters and lookup maps, so independent calls
//! may run concurrently on immutable inputs.

pub mod counter;
pub mod dsl;
pub mod node;
pub mod options;
pub mod plan;

pub use counter::IdCounter;
pub use dsl::{PORT_DOWNSTREAM, PORT_UPSTREAM};
pub use node::{InspectionNode, Port, PortReference};
pub use options::{InspectOptions, Strictness};

use crate::Result;
use crate::batch::{Batch, Jobflow};
use crate::graph::{OperatorGraph, OperatorId};
use crate::plan::Plan;

#[derive(Debug, Clone, Default)]
pub struct Inspector {
    options: InspectOptions,
}

impl Inspector {
    pub fn new(options: InspectOptions) -> Self {
        if !options.verifies() {
            tracing::warn!("inspection runs without validating its input");
        }
        Self { options }
    }

    pub fn options(&self) -> &InspectOptions {
        &self.options
    }

    pub fn inspect_batch(&self, batch: &Batch) -> Result<InspectionNode> {
        if self.options.verifies() {
            batch.validate()?;
            for (_, element) in batch.elements() {
                element.jobflow().graph.validate()?;
            }
        }
        self.finish(dsl::inspect_batch(batch)?)
    }

    pub fn inspect_jobflow(&self, jobflow: &Jobflow) -> Result<InspectionNode> {
        if self.options.verifies() {
            jobflow.graph.validate()?;
        }
        self.finish(dsl::inspect_jobflow(jobflow)?)
    }

    pub fn inspect_graph(&self, id: &str, graph: &OperatorGraph) -> Result<InspectionNode> {
        if self.options.verifies() {
            graph.validate()?;
        }
        self.finish(dsl::inspect_graph(id, graph)?)
    }

    /// Renders the transitive-connected closure of `seeds` as the elements of
    /// a `Graph` node.
    pub fn inspect_operators<I>(&self, id: &str, graph: &OperatorGraph, seeds: I) -> Result<InspectionNode>
    where
        I: IntoIterator<Item = OperatorId>,
    {
        if self.options.verifies() {
            graph.validate()?;
        }
        let mut node = InspectionNode::new(id, "Graph");
        for (_, element) in dsl::inspect_operators(graph, seeds)? {
            node.add_element(element);
        }
        self.finish(node)
    }

    /// Sub-plan cycles are not checked here; the planner rejects them with
    /// [`Plan::validate`] before handing a plan over.
    pub fn inspect_plan(&self, id: &str, plan: &Plan) -> Result<InspectionNode> {
        if self.options.verifies() {
            plan.validate_structure()?;
        }
        self.finish(plan::inspect_plan(id, plan)?)
    }

    fn finish(&self, node: InspectionNode) -> Result<InspectionNode> {
        if self.options.verifies() {
            node.verify_symmetry()?;
        }
        Ok(node)
    }
}
