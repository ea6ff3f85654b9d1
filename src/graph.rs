//! Dependency graph module.
//!
//! Provides `DependencyGraph`, the acyclic mapping from each declared stat
//! to the stats it reads. An object type builds one when it is defined,
//! rejects it if it contains a cycle, and keeps the resulting topological
//! order as its initialization order.

use crate::error::StatError;
use crate::stat_id::StatId;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet};

/// A directed graph of stat dependencies, owned by one object type.
///
/// Edges point from a dependency to its dependent: if `maxHP` reads `STR`,
/// there is an edge `STR -> maxHP`, and `STR` sorts first.
///
/// # Examples
///
/// ```rust
/// use gamestat::graph::DependencyGraph;
/// use gamestat::StatId;
///
/// let mut graph = DependencyGraph::new("Character");
/// let str_id = StatId::new("STR");
/// let max_hp = StatId::new("maxHP");
///
/// // maxHP reads STR
/// graph.add_edge(max_hp.clone(), str_id.clone());
///
/// let order = graph.topological_sort().unwrap();
/// assert_eq!(order, vec![str_id, max_hp]);
/// ```
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    type_name: String,
    graph: DiGraph<StatId, ()>,
    node_map: HashMap<StatId, NodeIndex>,
}

impl DependencyGraph {
    /// Create an empty graph for the named type.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            graph: DiGraph::new(),
            node_map: HashMap::new(),
        }
    }

    /// Name of the type this graph belongs to, used in cycle errors.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Add a node to the graph if it doesn't exist.
    ///
    /// Returns the existing index when the stat is already present.
    pub fn add_node(&mut self, stat_id: StatId) -> NodeIndex {
        if let Some(&idx) = self.node_map.get(&stat_id) {
            idx
        } else {
            let idx = self.graph.add_node(stat_id.clone());
            self.node_map.insert(stat_id, idx);
            idx
        }
    }

    /// Record that `dependent` reads `dependency`.
    ///
    /// Both nodes are added if missing.
    ///
    /// # Arguments
    ///
    /// * `dependent` - The stat whose value needs `dependency`
    /// * `dependency` - The stat that must be available first
    pub fn add_edge(&mut self, dependent: StatId, dependency: StatId) {
        let from_idx = self.add_node(dependent);
        let to_idx = self.add_node(dependency);
        self.graph.update_edge(to_idx, from_idx, ());
    }

    /// Detect cycles in the graph.
    ///
    /// Walks the graph depth first and reports the first cycle found as a
    /// closed path, e.g. `[A, B, C, A]`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use gamestat::graph::DependencyGraph;
    /// use gamestat::StatId;
    ///
    /// let mut graph = DependencyGraph::new("Loop");
    /// let a = StatId::new("A");
    /// let b = StatId::new("B");
    ///
    /// graph.add_edge(b.clone(), a.clone());
    /// assert!(graph.detect_cycles().is_ok());
    ///
    /// graph.add_edge(a.clone(), b.clone());
    /// assert!(graph.detect_cycles().is_err());
    /// ```
    pub fn detect_cycles(&self) -> Result<(), StatError> {
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();

        for node_idx in self.graph.node_indices() {
            if !visited.contains(&node_idx) {
                let mut cycle_path = Vec::new();
                if let Some(path) =
                    self.dfs_cycle_detect(node_idx, &mut visited, &mut rec_stack, &mut cycle_path)
                {
                    return Err(StatError::Cycle {
                        type_name: self.type_name.clone(),
                        path,
                    });
                }
            }
        }

        Ok(())
    }

    fn dfs_cycle_detect(
        &self,
        node: NodeIndex,
        visited: &mut HashSet<NodeIndex>,
        rec_stack: &mut HashSet<NodeIndex>,
        cycle_path: &mut Vec<StatId>,
    ) -> Option<Vec<StatId>> {
        visited.insert(node);
        rec_stack.insert(node);
        cycle_path.push(self.graph[node].clone());

        for neighbor in self
            .graph
            .neighbors_directed(node, petgraph::Direction::Outgoing)
        {
            if !visited.contains(&neighbor) {
                if let Some(cycle) = self.dfs_cycle_detect(neighbor, visited, rec_stack, cycle_path) {
                    return Some(cycle);
                }
            } else if rec_stack.contains(&neighbor) {
                let neighbor_stat = self.graph[neighbor].clone();
                let start = cycle_path
                    .iter()
                    .position(|stat| stat == &neighbor_stat)
                    .unwrap_or(0);
                let mut cycle: Vec<StatId> = cycle_path[start..].to_vec();
                cycle.push(neighbor_stat);
                return Some(cycle);
            }
        }

        rec_stack.remove(&node);
        cycle_path.pop();
        None
    }

    /// Order all stats so that every dependency precedes its dependents.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<StatId>)` - The initialization order
    /// * `Err(StatError::Cycle)` - If a cycle is detected
    pub fn topological_sort(&self) -> Result<Vec<StatId>, StatError> {
        self.detect_cycles()?;

        match toposort(&self.graph, None) {
            Ok(indices) => Ok(indices
                .into_iter()
                .map(|idx| self.graph[idx].clone())
                .collect()),
            Err(cycle) => Err(StatError::Cycle {
                type_name: self.type_name.clone(),
                path: vec![self.graph[cycle.node_id()].clone()],
            }),
        }
    }

    /// Get all nodes in insertion order.
    pub fn nodes(&self) -> Vec<StatId> {
        self.graph
            .node_indices()
            .map(|idx| self.graph[idx].clone())
            .collect()
    }

    pub fn contains_node(&self, stat_id: &StatId) -> bool {
        self.node_map.contains_key(stat_id)
    }

    /// The stats `stat_id` reads directly.
    pub fn dependencies_of(&self, stat_id: &StatId) -> Vec<StatId> {
        let Some(&idx) = self.node_map.get(stat_id) else {
            return Vec::new();
        };
        let mut deps: Vec<StatId> = self
            .graph
            .neighbors_directed(idx, petgraph::Direction::Incoming)
            .map(|n| self.graph[n].clone())
            .collect();
        deps.sort();
        deps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> StatId {
        StatId::new(name)
    }

    #[test]
    fn test_graph_add_nodes() {
        let mut graph = DependencyGraph::new("T");
        let hp = id("HP");
        let atk = id("ATK");

        graph.add_node(hp.clone());
        graph.add_node(atk.clone());

        assert!(graph.contains_node(&hp));
        assert!(graph.contains_node(&atk));
        assert!(!graph.contains_node(&id("MP")));
    }

    #[test]
    fn test_graph_duplicate_nodes() {
        let mut graph = DependencyGraph::new("T");
        let idx1 = graph.add_node(id("HP"));
        let idx2 = graph.add_node(id("HP"));

        assert_eq!(idx1, idx2);
        assert_eq!(graph.nodes().len(), 1);
    }

    #[test]
    fn test_duplicate_edges_collapse() {
        let mut graph = DependencyGraph::new("T");
        graph.add_edge(id("HP"), id("maxHP"));
        graph.add_edge(id("HP"), id("maxHP"));
        assert_eq!(graph.dependencies_of(&id("HP")), vec![id("maxHP")]);
    }

    #[test]
    fn test_topological_sort() {
        let mut graph = DependencyGraph::new("T");
        let str_ = id("STR");
        let dex = id("DEX");
        let atk = id("ATK");
        let crit = id("CRIT");

        graph.add_edge(atk.clone(), str_.clone());
        graph.add_edge(crit.clone(), dex.clone());

        let sorted = graph.topological_sort().unwrap();
        let pos = |s: &StatId| sorted.iter().position(|x| x == s).unwrap();

        assert!(pos(&str_) < pos(&atk));
        assert!(pos(&dex) < pos(&crit));
    }

    #[test]
    fn test_order_holds_for_any_declaration_order() {
        // HP reads maxHP, maxHP reads STR; declare them in every order.
        let edges = [("HP", "maxHP"), ("maxHP", "STR")];
        for flip in [false, true] {
            let mut graph = DependencyGraph::new("T");
            let names = if flip {
                ["HP", "maxHP", "STR"]
            } else {
                ["STR", "maxHP", "HP"]
            };
            for n in names {
                graph.add_node(id(n));
            }
            for (a, b) in edges {
                graph.add_edge(id(a), id(b));
            }
            let sorted = graph.topological_sort().unwrap();
            assert_eq!(sorted, vec![id("STR"), id("maxHP"), id("HP")]);
        }
    }

    #[test]
    fn test_graph_detect_cycle() {
        let mut graph = DependencyGraph::new("Broken");
        graph.add_edge(id("B"), id("A"));
        graph.add_edge(id("C"), id("B"));
        graph.add_edge(id("A"), id("C"));

        let err = graph.detect_cycles().unwrap_err();
        assert!(err.to_string().starts_with("Cycle detected in Broken"));
        assert!(graph.topological_sort().is_err());
    }

    #[test]
    fn test_graph_self_cycle() {
        let mut graph = DependencyGraph::new("T");
        let a = id("A");
        graph.add_edge(a.clone(), a.clone());

        match graph.detect_cycles() {
            Err(StatError::Cycle { path, .. }) => assert_eq!(path, vec![a.clone(), a]),
            other => panic!("Expected Cycle error, got {other:?}"),
        }
    }

    #[test]
    fn test_cycle_path_3_node() {
        let mut graph = DependencyGraph::new("T");
        let (a, b, c) = (id("A"), id("B"), id("C"));
        graph.add_edge(b.clone(), a.clone());
        graph.add_edge(c.clone(), b.clone());
        graph.add_edge(a.clone(), c.clone());

        if let Err(StatError::Cycle { path, .. }) = graph.detect_cycles() {
            assert_eq!(path.len(), 4);
            assert_eq!(path[0], path[3]);
            assert!(path.contains(&a) && path.contains(&b) && path.contains(&c));
        } else {
            panic!("Expected Cycle error");
        }
    }

    #[test]
    fn test_cycle_path_excludes_non_cycle_nodes() {
        let mut graph = DependencyGraph::new("T");
        let (x, y, a, b, c) = (id("X"), id("Y"), id("A"), id("B"), id("C"));

        graph.add_edge(y.clone(), x.clone());
        graph.add_edge(a.clone(), y.clone());
        graph.add_edge(b.clone(), a.clone());
        graph.add_edge(c.clone(), b.clone());
        graph.add_edge(a.clone(), c.clone());

        if let Err(StatError::Cycle { path, .. }) = graph.detect_cycles() {
            assert!(!path.contains(&x));
            assert!(!path.contains(&y));
            assert_eq!(path[0], path[path.len() - 1]);
        } else {
            panic!("Expected Cycle error");
        }
    }
}
