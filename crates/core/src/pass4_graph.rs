//! Pass 4: Dependency graph over global predicates, component instances
//! and command instances, layered by repeated removal of ready nodes.

use crate::ast::*;
use crate::atoms::{AtomUsage, Node};
use crate::error::{CompileError, ErrorId};
use crate::pass2_instantiate::global_name;
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum GraphNode {
    /// A predicate of the global scope.
    Predicate(String),
    Component(String),
    Command(String),
}

impl GraphNode {
    pub fn name(&self) -> &str {
        match self {
            GraphNode::Predicate(n) | GraphNode::Component(n) | GraphNode::Command(n) => n,
        }
    }

    pub fn is_command(&self) -> bool {
        matches!(self, GraphNode::Command(_))
    }
}

impl fmt::Display for GraphNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphNode::Predicate(n) => write!(f, "predicate {}", n),
            GraphNode::Component(n) => write!(f, "component {}", n),
            GraphNode::Command(n) => write!(f, "command {}", n),
        }
    }
}

/// `from -> to` edges meaning `from` is emitted before `to`.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    edges: IndexMap<GraphNode, IndexSet<GraphNode>>,
    global_atoms: IndexSet<String>,
    handled: IndexSet<String>,
}

impl DependencyGraph {
    /// Build the graph of an instantiated program.
    pub fn build(program: &Program, usage: &AtomUsage) -> DependencyGraph {
        let mut graph = DependencyGraph {
            global_atoms: usage
                .declared(Node::Component(program.global_id()))
                .keys()
                .cloned()
                .collect(),
            ..Default::default()
        };

        let mut instances: IndexMap<&str, GraphNode> = IndexMap::new();
        for (id, cid) in program.components() {
            let node = if program.component(cid).is_command() {
                GraphNode::Command(id.to_string())
            } else {
                GraphNode::Component(id.to_string())
            };
            graph.add_node(node.clone());
            instances.insert(id, node);
        }

        for prop in program.propagations() {
            let Some(from) = instances.get(prop.from.as_str()) else {
                continue;
            };
            match &prop.to {
                Some(to) => {
                    if let Some(to) = instances.get(to.as_str()) {
                        graph.add_edge(from.clone(), to.clone());
                    }
                }
                None => {
                    for atom in &prop.atoms {
                        let name = global_name(&prop.from, atom);
                        graph.add_edge(from.clone(), GraphNode::Predicate(name.clone()));
                        graph.handled.insert(name);
                    }
                }
            }
        }

        for (id, cid) in program.components() {
            let node = &instances[id];
            for name in usage.used(Node::Component(cid)).keys() {
                if graph.global_atoms.contains(name) {
                    graph.add_edge(GraphNode::Predicate(name.clone()), node.clone());
                    graph.handled.insert(name.clone());
                }
            }
        }

        tracing::debug!(
            nodes = graph.edges.len(),
            edges = graph.edges.values().map(IndexSet::len).sum::<usize>(),
            "built dependency graph"
        );
        graph
    }

    fn add_node(&mut self, node: GraphNode) {
        self.edges.entry(node).or_default();
    }

    fn add_edge(&mut self, from: GraphNode, to: GraphNode) {
        self.add_node(to.clone());
        self.edges.entry(from).or_default().insert(to);
    }

    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.edges.keys()
    }

    pub fn successors(&self, node: &GraphNode) -> impl Iterator<Item = &GraphNode> {
        self.edges.get(node).into_iter().flatten()
    }

    /// Names declared in global scope.
    pub fn global_atoms(&self) -> &IndexSet<String> {
        &self.global_atoms
    }

    /// Global names that have a predicate node in the graph.
    pub fn handled(&self) -> &IndexSet<String> {
        &self.handled
    }

    /// Kahn's algorithm, taking each whole ready frontier as one layer.
    /// Nodes within a layer are sorted. Global predicates no node refers
    /// to form a trailing layer.
    pub fn layers(&self) -> Result<Vec<Vec<GraphNode>>, CompileError> {
        let mut in_degree: IndexMap<&GraphNode, usize> =
            self.edges.keys().map(|node| (node, 0)).collect();
        for targets in self.edges.values() {
            for target in targets {
                if let Some(d) = in_degree.get_mut(target) {
                    *d += 1;
                }
            }
        }

        let mut frontier: Vec<&GraphNode> = in_degree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(node, _)| *node)
            .collect();
        let mut layers = Vec::new();
        let mut scheduled = 0usize;
        while !frontier.is_empty() {
            frontier.sort();
            let mut next = Vec::new();
            for node in &frontier {
                for target in self.successors(node) {
                    if let Some(d) = in_degree.get_mut(target) {
                        *d -= 1;
                        if *d == 0 {
                            next.push(target);
                        }
                    }
                }
            }
            scheduled += frontier.len();
            layers.push(frontier.into_iter().cloned().collect::<Vec<_>>());
            frontier = next;
        }

        if scheduled < self.edges.len() {
            let mut stuck: Vec<&GraphNode> = in_degree
                .iter()
                .filter(|(_, d)| **d > 0)
                .map(|(node, _)| *node)
                .collect();
            stuck.sort();
            let names = stuck
                .iter()
                .map(|node| node.name())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(CompileError::new(ErrorId::DepCycle, &[names]));
        }

        let mut leftover: Vec<GraphNode> = self
            .global_atoms
            .iter()
            .filter(|name| !self.handled.contains(*name))
            .map(|name| GraphNode::Predicate(name.clone()))
            .collect();
        if !leftover.is_empty() {
            leftover.sort();
            layers.push(leftover);
        }
        tracing::debug!(layers = layers.len(), "layered dependency graph");
        Ok(layers)
    }
}
