//! A directed dependency graph with Kahn's-algorithm topological sort.
//!
//! Grounded on `pg_objects/graph.py`: vertices are keyed by a hashable
//! value, edges point from a vertex to its dependencies, and the sort
//! returns dependencies before dependants.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::hash::Hash;

/// Failure modes of [`Graph::topological_sort_kahn`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphError {
    /// The graph has at least one cycle.
    Cycle,
    /// No vertex in the graph has zero outgoing (dependency) edges.
    NoRoot,
}

/// A directed graph over hashable, clonable vertex values.
///
/// `edges_from[v]` is the set of vertices `v` depends on.
/// `edges_to[v]` is the set of vertices that depend on `v`.
#[derive(Debug, Clone)]
pub struct Graph<V: Clone + Eq + Hash + Ord> {
    vertices: HashSet<V>,
    edges_from: HashMap<V, BTreeSet<V>>,
    edges_to: HashMap<V, BTreeSet<V>>,
}

impl<V: Clone + Eq + Hash + Ord> Default for Graph<V> {
    fn default() -> Self {
        Self {
            vertices: HashSet::new(),
            edges_from: HashMap::new(),
            edges_to: HashMap::new(),
        }
    }
}

impl<V: Clone + Eq + Hash + Ord> Graph<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a vertex. A no-op if the vertex already exists.
    pub fn insert_vertex(&mut self, value: V) {
        if self.vertices.insert(value.clone()) {
            self.edges_from.entry(value.clone()).or_default();
            self.edges_to.entry(value).or_default();
        }
    }

    /// Adds an edge `from -> to` ("`from` depends on `to`"), inserting
    /// either endpoint that is not already present.
    pub fn add_edge(&mut self, from: V, to: V) {
        self.insert_vertex(from.clone());
        self.insert_vertex(to.clone());
        self.edges_from.get_mut(&from).unwrap().insert(to.clone());
        self.edges_to.get_mut(&to).unwrap().insert(from);
    }

    /// Removes an edge `from -> to`. A no-op if it does not exist.
    pub fn remove_edge(&mut self, from: &V, to: &V) {
        if let Some(set) = self.edges_from.get_mut(from) {
            set.remove(to);
        }
        if let Some(set) = self.edges_to.get_mut(to) {
            set.remove(from);
        }
    }

    pub fn contains(&self, value: &V) -> bool {
        self.vertices.contains(value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &V> {
        self.vertices.iter()
    }

    pub fn dependencies(&self, value: &V) -> impl Iterator<Item = &V> {
        self.edges_from
            .get(value)
            .into_iter()
            .flat_map(|s| s.iter())
    }

    pub fn has_edges(&self) -> bool {
        self.edges_from.values().any(|s| !s.is_empty())
    }

    pub fn clone_graph(&self) -> Self {
        self.clone()
    }

    pub fn from_edge_list<I: IntoIterator<Item = (V, V)>>(edges: I) -> Self {
        let mut g = Self::new();
        for (from, to) in edges {
            g.add_edge(from, to);
        }
        g
    }

    /// Kahn's algorithm: <https://en.wikipedia.org/wiki/Topological_sorting>.
    ///
    /// Returns vertices ordered dependencies-before-dependants. Ties among
    /// roots are broken by `Ord` so the result is stable across runs.
    pub fn topological_sort_kahn(&self) -> Result<Vec<V>, GraphError> {
        let mut g = self.clone_graph();
        let mut ordered = Vec::with_capacity(g.vertices.len());

        let mut start: BTreeSet<V> = g
            .vertices
            .iter()
            .filter(|v| g.edges_from.get(*v).map(|s| s.is_empty()).unwrap_or(true))
            .cloned()
            .collect();

        if start.is_empty() && !g.vertices.is_empty() {
            return Err(GraphError::NoRoot);
        }

        while let Some(n) = start.iter().next().cloned() {
            start.remove(&n);
            ordered.push(n.clone());

            let dependants: Vec<V> = g
                .edges_to
                .get(&n)
                .map(|s| s.iter().cloned().collect())
                .unwrap_or_default();

            for m in dependants {
                g.remove_edge(&m, &n);
                if g.edges_from.get(&m).map(|s| s.is_empty()).unwrap_or(true) {
                    start.insert(m);
                }
            }
        }

        if g.has_edges() {
            return Err(GraphError::Cycle);
        }

        Ok(ordered)
    }
}
