//! The recipe dependency graph.
//!
//! One node per recipe; an edge runs from each dependent to each of its
//! dependencies. Traversals are deterministic: roots are visited in name
//! order and dependencies in the order they were declared.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use crate::core::recipe::Recipe;
use crate::error::{Error, Result};

/// Validated dependency graph over a set of recipes.
#[derive(Debug, Clone)]
pub struct RecipeGraph {
    graph: DiGraph<Arc<Recipe>, ()>,
    by_name: HashMap<String, NodeIndex>,
}

impl RecipeGraph {
    /// Build the graph, checking that every requirement resolves to exactly
    /// one loaded recipe whose version satisfies the constraint.
    pub fn build(recipes: impl IntoIterator<Item = Recipe>) -> Result<Self> {
        let mut graph = DiGraph::new();
        let mut by_name: HashMap<String, NodeIndex> = HashMap::new();

        for recipe in recipes {
            if let Some(&existing) = by_name.get(recipe.name()) {
                let first: &Arc<Recipe> = &graph[existing];
                return Err(Error::invalid_recipe(
                    recipe.origin(),
                    format!(
                        "recipe `{}` is defined twice (also in {})",
                        recipe.name(),
                        first.origin().display()
                    ),
                ));
            }
            let name = recipe.name().to_string();
            let node = graph.add_node(Arc::new(recipe));
            by_name.insert(name, node);
        }

        let mut edges = Vec::new();
        for node in graph.node_indices() {
            let recipe = &graph[node];
            for req in recipe.requirements() {
                let Some(&dep) = by_name.get(&req.name) else {
                    return Err(Error::UnresolvedDependency {
                        recipe: recipe.name().to_string(),
                        dependency: req.name.clone(),
                        constraint: req.constraint.to_string(),
                        reason: format!("no recipe named `{}` was loaded", req.name),
                    });
                };
                let found = graph[dep].version();
                if !req.constraint.satisfies(found) {
                    return Err(Error::UnresolvedDependency {
                        recipe: recipe.name().to_string(),
                        dependency: req.name.clone(),
                        constraint: req.constraint.to_string(),
                        reason: format!("the loaded version is `{}`", found),
                    });
                }
                edges.push((node, dep));
            }
        }
        for (from, to) in edges {
            graph.add_edge(from, to, ());
        }

        Ok(RecipeGraph { graph, by_name })
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn recipe(&self, node: NodeIndex) -> &Arc<Recipe> {
        &self.graph[node]
    }

    pub fn node(&self, name: &str) -> Option<NodeIndex> {
        self.by_name.get(name).copied()
    }

    /// Direct dependencies in declared order.
    pub fn dependencies(&self, node: NodeIndex) -> Vec<NodeIndex> {
        self.graph[node]
            .requirements()
            .iter()
            .filter_map(|req| self.by_name.get(&req.name).copied())
            .collect()
    }

    /// Direct dependents, in name order.
    pub fn dependents(&self, node: NodeIndex) -> Vec<NodeIndex> {
        let mut dependents: Vec<_> = self
            .graph
            .neighbors_directed(node, Direction::Incoming)
            .collect();
        dependents.sort_by(|a, b| self.graph[*a].name().cmp(self.graph[*b].name()));
        dependents.dedup();
        dependents
    }

    /// Nodes sorted by recipe name.
    fn nodes_by_name(&self) -> Vec<NodeIndex> {
        let mut nodes: Vec<_> = self.graph.node_indices().collect();
        nodes.sort_by(|a, b| self.graph[*a].name().cmp(self.graph[*b].name()));
        nodes
    }

    /// Find a dependency cycle by depth-first search with a recursion stack.
    ///
    /// The returned path starts and ends with the same recipe.
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            OnStack,
            Done,
        }

        fn visit(
            graph: &RecipeGraph,
            node: NodeIndex,
            marks: &mut [Mark],
            stack: &mut Vec<NodeIndex>,
        ) -> Option<Vec<String>> {
            marks[node.index()] = Mark::OnStack;
            stack.push(node);

            for dep in graph.dependencies(node) {
                match marks[dep.index()] {
                    Mark::OnStack => {
                        let start = stack.iter().position(|&n| n == dep).unwrap_or(0);
                        let mut path: Vec<String> = stack[start..]
                            .iter()
                            .map(|&n| graph.recipe(n).name().to_string())
                            .collect();
                        path.push(graph.recipe(dep).name().to_string());
                        return Some(path);
                    }
                    Mark::Unvisited => {
                        if let Some(path) = visit(graph, dep, marks, stack) {
                            return Some(path);
                        }
                    }
                    Mark::Done => {}
                }
            }

            stack.pop();
            marks[node.index()] = Mark::Done;
            None
        }

        let mut marks = vec![Mark::Unvisited; self.graph.node_count()];
        let mut stack = Vec::new();
        for root in self.nodes_by_name() {
            if marks[root.index()] == Mark::Unvisited {
                if let Some(path) = visit(self, root, &mut marks, &mut stack) {
                    return Some(path);
                }
            }
        }
        None
    }

    /// Dependencies before dependents, by repeated removal of nodes whose
    /// dependencies are all placed.
    ///
    /// Nodes are removed in waves: every node ready at the start of a wave is
    /// placed, in name order, before any node that wave releases.
    ///
    /// Fails with `DependencyCycle` if the graph is not acyclic.
    pub fn topological_order(&self) -> Result<Vec<NodeIndex>> {
        let mut remaining: Vec<usize> = self
            .graph
            .node_indices()
            .map(|n| self.dependencies(n).len())
            .collect();

        let mut wave: BTreeSet<(&str, NodeIndex)> = self
            .graph
            .node_indices()
            .filter(|n| remaining[n.index()] == 0)
            .map(|n| (self.graph[n].name(), n))
            .collect();

        let mut order = Vec::with_capacity(self.graph.node_count());
        while !wave.is_empty() {
            let mut next = BTreeSet::new();
            for (_, node) in wave {
                order.push(node);
                for dependent in self.graph.neighbors_directed(node, Direction::Incoming) {
                    remaining[dependent.index()] -= 1;
                    if remaining[dependent.index()] == 0 {
                        next.insert((self.graph[dependent].name(), dependent));
                    }
                }
            }
            wave = next;
        }

        if order.len() != self.graph.node_count() {
            let path = self.find_cycle().unwrap_or_default();
            return Err(Error::DependencyCycle { path });
        }
        Ok(order)
    }
}
