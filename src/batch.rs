//! Batches: jobflows plus the blocker relation that orders them.
//!
//! The blocker relation must be acyclic. That is checked here with
//! [`Batch::validate`] but never repaired: the inspection engine renders
//! whatever relation it is given.

use crate::graph::OperatorGraph;
use crate::{Error, Result};

use index_vec::IndexVec;
use std::collections::BTreeMap;

index_vec::define_index_type! {
    /// Handle of a jobflow element within its batch.
    pub struct BatchElementId = u32;

    DISPLAY_FORMAT = "{}";
}

/// A unit of work compiled from one flow description.
#[derive(Debug, Clone)]
pub struct Jobflow {
    pub id: String,
    pub description_class: String,
    pub graph: OperatorGraph,
}

impl Jobflow {
    pub fn new(id: impl Into<String>, description_class: impl Into<String>, graph: OperatorGraph) -> Self {
        Self {
            id: id.into(),
            description_class: description_class.into(),
            graph,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchElement {
    jobflow: Jobflow,
    blockers: Vec<BatchElementId>,
}

impl BatchElement {
    pub fn jobflow(&self) -> &Jobflow {
        &self.jobflow
    }

    /// Elements that must complete before this one starts.
    pub fn blockers(&self) -> &[BatchElementId] {
        &self.blockers
    }
}

#[derive(Debug, Clone)]
pub struct Batch {
    pub id: String,
    pub description_class: Option<String>,
    pub comment: Option<String>,
    elements: IndexVec<BatchElementId, BatchElement>,
}

impl Batch {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description_class: None,
            comment: None,
            elements: IndexVec::new(),
        }
    }

    pub fn add_element(&mut self, jobflow: Jobflow) -> Result<BatchElementId> {
        if self.find(&jobflow.id).is_some() {
            return Err(Error::DuplicateId(format!(
                "jobflow {} in batch {}",
                jobflow.id, self.id
            )));
        }
        Ok(self.elements.push(BatchElement {
            jobflow,
            blockers: Vec::new(),
        }))
    }

    /// Declares that `upstream` must complete before `downstream` starts.
    pub fn add_blocker(&mut self, downstream: BatchElementId, upstream: BatchElementId) -> Result<()> {
        for id in [downstream, upstream] {
            if self.elements.get(id).is_none() {
                return Err(Error::DanglingReference(format!(
                    "unknown element {id} in batch {}",
                    self.id
                )));
            }
        }
        let blockers = &mut self.elements[downstream].blockers;
        if !blockers.contains(&upstream) {
            blockers.push(upstream);
        }
        Ok(())
    }

    pub fn element(&self, id: BatchElementId) -> &BatchElement {
        &self.elements[id]
    }

    pub fn elements(&self) -> impl Iterator<Item = (BatchElementId, &BatchElement)> + '_ {
        self.elements.iter_enumerated()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn find(&self, jobflow_id: &str) -> Option<BatchElementId> {
        self.elements
            .iter_enumerated()
            .find(|(_, e)| e.jobflow.id == jobflow_id)
            .map(|(id, _)| id)
    }

    /// Checks that every blocker exists and the blocker relation is acyclic.
    pub fn validate(&self) -> Result<()> {
        #[derive(Copy, Clone, PartialEq, Eq)]
        enum Mark {
            Temp,
            Perm,
        }

        fn dfs(
            batch: &Batch,
            v: BatchElementId,
            marks: &mut BTreeMap<BatchElementId, Mark>,
            stack: &mut Vec<BatchElementId>,
        ) -> Result<()> {
            match marks.get(&v) {
                Some(Mark::Perm) => return Ok(()),
                Some(Mark::Temp) => {
                    // v is on the current path => cycle
                    stack.push(v);
                    let path: Vec<&str> = stack
                        .iter()
                        .map(|id| batch.elements[*id].jobflow.id.as_str())
                        .collect();
                    return Err(Error::CyclicDependency(format!(
                        "jobflows in batch {}: {}",
                        batch.id,
                        path.join(" -> ")
                    )));
                }
                None => {}
            }

            marks.insert(v, Mark::Temp);
            stack.push(v);
            for blocker in &batch.elements[v].blockers {
                if batch.elements.get(*blocker).is_none() {
                    return Err(Error::DanglingReference(format!(
                        "jobflow {} is blocked by unknown element {blocker}",
                        batch.elements[v].jobflow.id
                    )));
                }
                dfs(batch, *blocker, marks, stack)?;
            }
            stack.pop();
            marks.insert(v, Mark::Perm);
            Ok(())
        }

        let mut marks = BTreeMap::new();
        let mut stack = Vec::new();
        for id in self.elements.indices() {
            stack.clear();
            dfs(self, id, &mut marks, &mut stack)?;
        }
        Ok(())
    }

    /// Orders the elements so that every blocker precedes the elements it
    /// blocks. Ties keep element order.
    pub fn execution_order(&self) -> Result<Vec<BatchElementId>> {
        self.validate()?;

        let mut done = vec![false; self.elements.len()];
        let mut order = Vec::with_capacity(self.elements.len());
        while order.len() < self.elements.len() {
            let ready = self.elements.iter_enumerated().find(|(id, element)| {
                !done[id.index()] && element.blockers.iter().all(|b| done[b.index()])
            });
            match ready {
                Some((id, _)) => {
                    done[id.index()] = true;
                    order.push(id);
                }
                None => {
                    return Err(Error::CyclicDependency(format!(
                        "jobflows in batch {}",
                        self.id
                    )));
                }
            }
        }
        Ok(order)
    }
}
