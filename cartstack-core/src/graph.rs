//! Resource graph (DAG) for a stack.
//!
//! Every cross-resource relationship is an explicit edge: value references
//! (a container consuming an image or a network) become `Reference` edges
//! when the resource is added, ordering options become `DependsOn` edges.
//! Nothing is inferred at apply time.

use crate::error::{Result, StackError};
use crate::types::{Resource, ResourceKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Write as _;

/// Why one resource must follow another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Explicit ordering option
    DependsOn,
    /// The dependent consumes an output of the dependency
    Reference,
}

/// `from` is applied after `to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub kind: EdgeKind,
}

/// Declared resources of one stack plus their edges.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceGraph {
    /// Stack the graph was declared for
    pub stack: String,
    resources: Vec<Resource>,
    edges: Vec<Edge>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl ResourceGraph {
    pub fn new(stack: impl Into<String>) -> Self {
        Self { stack: stack.into(), ..Default::default() }
    }

    /// Declare a resource. Every resource it references must already be declared.
    pub fn add(&mut self, resource: Resource) -> Result<()> {
        let name = resource.name().to_string();
        if self.index.contains_key(&name) {
            return Err(StackError::DuplicateResource { name });
        }

        if let Resource::Container(spec) = &resource {
            // A job exits before further networks could be connected.
            let networks: BTreeSet<&str> =
                spec.networks.iter().map(|n| n.network.as_str()).collect();
            if spec.is_one_shot() && networks.len() > 1 {
                return Err(StackError::InvalidResource {
                    name,
                    reason: "a one-shot container can join at most one network".to_string(),
                });
            }
        }

        let mut edges = Vec::new();
        for reference in resource.references() {
            if !self.index.contains_key(reference) {
                return Err(StackError::UnknownResource {
                    from: name.clone(),
                    to: reference.to_string(),
                });
            }
            edges.push(Edge {
                from: name.clone(),
                to: reference.to_string(),
                kind: EdgeKind::Reference,
            });
        }

        self.index.insert(name, self.resources.len());
        self.resources.push(resource);
        self.edges.extend(edges);
        Ok(())
    }

    /// Add an explicit ordering edge: `from` waits for `to` to exist.
    pub fn depends_on(&mut self, from: &str, to: &str) -> Result<()> {
        if let Some(missing) = [from, to].into_iter().find(|n| !self.index.contains_key(*n)) {
            return Err(StackError::UndeclaredResource { name: missing.to_string() });
        }
        if from == to {
            return Err(StackError::CircularDependency { resource: from.to_string() });
        }

        let edge = Edge { from: from.to_string(), to: to.to_string(), kind: EdgeKind::DependsOn };
        if !self.edges.contains(&edge) {
            self.edges.push(edge);
        }
        Ok(())
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Resource> {
        self.index.get(name).map(|&i| &self.resources[i])
    }

    /// Explicit `DependsOn` targets of a resource.
    pub fn explicit_dependencies(&self, name: &str) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|e| e.from == name && e.kind == EdgeKind::DependsOn)
            .map(|e| e.to.as_str())
            .collect()
    }

    /// All resources `name` must follow, whatever the edge kind.
    pub fn dependencies(&self, name: &str) -> Vec<&str> {
        self.edges.iter().filter(|e| e.from == name).map(|e| e.to.as_str()).collect()
    }

    /// Check the graph is acyclic.
    pub fn validate(&self) -> Result<()> {
        self.apply_order().map(|_| ())
    }

    /// Resources in creation order (Kahn's algorithm).
    ///
    /// Independent resources keep their declaration order.
    pub fn apply_order(&self) -> Result<Vec<&Resource>> {
        let mut in_degree = vec![0usize; self.resources.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); self.resources.len()];

        for edge in &self.edges {
            let from = self.position(&edge.from)?;
            let to = self.position(&edge.to)?;
            in_degree[from] += 1;
            dependents[to].push(from);
        }

        let mut ready: BTreeSet<usize> =
            in_degree.iter().enumerate().filter(|(_, &d)| d == 0).map(|(i, _)| i).collect();
        let mut order = Vec::with_capacity(self.resources.len());

        while let Some(next) = ready.pop_first() {
            order.push(&self.resources[next]);
            for &dependent in &dependents[next] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        if order.len() != self.resources.len() {
            let stuck = in_degree
                .iter()
                .position(|&d| d > 0)
                .map(|i| self.resources[i].name().to_string())
                .unwrap_or_default();
            return Err(StackError::CircularDependency { resource: stuck });
        }

        Ok(order)
    }

    /// Resources in teardown order: dependents before their dependencies.
    pub fn destroy_order(&self) -> Result<Vec<&Resource>> {
        let mut order = self.apply_order()?;
        order.reverse();
        Ok(order)
    }

    /// Resource count per kind.
    pub fn summary(&self) -> BTreeMap<ResourceKind, usize> {
        let mut counts = BTreeMap::new();
        for resource in &self.resources {
            *counts.entry(resource.kind()).or_insert(0) += 1;
        }
        counts
    }

    /// Graphviz rendering; dashed edges are value references.
    pub fn to_dot(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "digraph \"{}\" {{", self.stack);
        let _ = writeln!(out, "    rankdir=LR;");
        for resource in &self.resources {
            let _ = writeln!(
                out,
                "    \"{}\" [label=\"{}\\n{}\"];",
                resource.name(),
                resource.kind(),
                resource.runtime_name()
            );
        }
        for edge in &self.edges {
            let style = match edge.kind {
                EdgeKind::DependsOn => "solid",
                EdgeKind::Reference => "dashed",
            };
            let _ = writeln!(out, "    \"{}\" -> \"{}\" [style={}];", edge.to, edge.from, style);
        }
        out.push_str("}\n");
        out
    }

    /// Rebuild the name index after deserialization.
    pub fn reindex(&mut self) {
        self.index =
            self.resources.iter().enumerate().map(|(i, r)| (r.name().to_string(), i)).collect();
    }

    fn position(&self, name: &str) -> Result<usize> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| {
                StackError::Internal(format!("edge refers to unindexed resource {}", name))
            })
    }
}
