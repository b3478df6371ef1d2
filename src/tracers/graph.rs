use super::{Trace, TraceError};
use petgraph::algo::toposort;
use petgraph::prelude::{NodeIndex, StableDiGraph};
use petgraph::Direction;
use std::collections::HashMap;

/// Which traced request read which. Nodes are labelled `name<period>`;
/// an edge runs from an input to the step that read it.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: StableDiGraph<String, ()>,
    nodes: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    pub fn from_trace(trace: &Trace) -> Self {
        let mut graph = Self::default();
        for step in trace.steps() {
            let dependent = graph.node(step.label());
            for input in &step.inputs {
                let source = graph.node(format!("{}<{}>", input.variable, input.period));
                if graph.graph.find_edge(source, dependent).is_none() {
                    graph.graph.add_edge(source, dependent, ());
                }
            }
        }
        graph
    }

    fn node(&mut self, label: String) -> NodeIndex {
        if let Some(&index) = self.nodes.get(&label) {
            return index;
        }
        let index = self.graph.add_node(label.clone());
        self.nodes.insert(label, index);
        index
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Direct inputs of `label`, sorted.
    pub fn dependencies_of(&self, label: &str) -> Vec<String> {
        let Some(&index) = self.nodes.get(label) else {
            return Vec::new();
        };
        let mut inputs: Vec<String> = self
            .graph
            .neighbors_directed(index, Direction::Incoming)
            .filter_map(|n| self.graph.node_weight(n).cloned())
            .collect();
        inputs.sort();
        inputs
    }

    /// Labels ordered so that every input comes before its readers.
    pub fn evaluation_order(&self) -> Result<Vec<String>, TraceError> {
        let order = toposort(&self.graph, None).map_err(|cycle| TraceError::Cycle {
            node: self.graph.node_weight(cycle.node_id()).cloned().unwrap_or_default(),
        })?;
        Ok(order
            .into_iter()
            .filter_map(|index| self.graph.node_weight(index).cloned())
            .collect())
    }
}
