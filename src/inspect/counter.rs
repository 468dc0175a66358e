use crate::graph::{Operator, OperatorBody};

use std::collections::HashMap;

/// Per-prefix sequence numbers, e.g. `core-0`, `core-1`, `user-0`.
///
/// A counter lives for a single rendering scope; nothing is shared between
/// calls.
#[derive(Debug, Default)]
pub struct IdCounter {
    counts: HashMap<&'static str, usize>,
}

impl IdCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fetch_id(&mut self, prefix: &'static str) -> String {
        let next = self.counts.entry(prefix).or_insert(0);
        let id = format!("{prefix}-{next}");
        *next += 1;
        id
    }

    /// Assigns the id of an operator.
    ///
    /// Input and output operators are named after their external name, which is
    /// unique within a graph. Every other kind draws from its own counter.
    pub fn operator_id(&mut self, operator: &Operator) -> String {
        let kind = operator.kind();
        match operator.body() {
            OperatorBody::Input(input) => format!("{}-{}", kind.label(), input.name),
            OperatorBody::Output(output) => format!("{}-{}", kind.label(), output.name),
            OperatorBody::Core(_)
            | OperatorBody::User(_)
            | OperatorBody::Flow(_)
            | OperatorBody::Marker(_) => self.fetch_id(kind.label()),
        }
    }
}
