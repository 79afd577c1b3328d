//! The DAG Store (SS4.3): a typed directed graph over nodes keyed by opaque UUIDs.
//! Grounded on `integuru/models/DAGManager.py` (the `networkx`-backed original),
//! reimplemented as a hand-rolled adjacency list since this crate's access pattern
//! (add/update/edge/successors/predecessors/cycle-check) is narrow enough that a
//! general-purpose graph crate would add surface this code never uses.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::model::{Request, Response};

pub type NodeId = Uuid;

/// The payload a node carries, keyed by `NodeKind`.
#[derive(Debug, Clone)]
pub enum NodeContent {
    /// `master`/`curl` nodes: an actual captured request/response pair.
    Request { request: Request, response: Response },
    /// `cookie` nodes: a name/value pair drawn from the cookie jar.
    Cookie { name: String, value: String },
    /// `not_found` nodes: a dynamic-part literal with no discoverable producer.
    NotFound { search_string: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Master,
    Curl,
    Cookie,
    NotFound,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub content: NodeContent,
    /// Literal substrings this node still needs sourced from an upstream producer.
    pub dynamic_parts: Vec<String>,
    /// Literal substrings this node provides to its consumer(s), insertion-order
    /// deduplicated.
    pub extracted_parts: Vec<String>,
    /// Caller-supplied variable name -> literal as it appears in this node's
    /// request.
    pub input_variables: HashMap<String, String>,
}

/// Fields that may be updated in place on an existing node. `None` means "leave
/// unchanged", matching the spec's `update_node(id, **attrs)` semantics.
#[derive(Debug, Default)]
pub struct NodeUpdate {
    pub dynamic_parts: Option<Vec<String>>,
    pub extracted_parts_append: Vec<String>,
    pub input_variables_extend: HashMap<String, String>,
}

#[derive(Debug, Default)]
pub struct DagStore {
    nodes: Vec<Node>,
    index_by_id: HashMap<NodeId, usize>,
    successors: HashMap<NodeId, Vec<NodeId>>,
    predecessors: HashMap<NodeId, Vec<NodeId>>,
}

impl DagStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(
        &mut self,
        kind: NodeKind,
        content: NodeContent,
        dynamic_parts: Vec<String>,
        extracted_parts: Vec<String>,
        input_variables: HashMap<String, String>,
    ) -> NodeId {
        let id = Uuid::new_v4();
        let node = Node {
            id,
            kind,
            content,
            dynamic_parts,
            extracted_parts,
            input_variables,
        };
        self.index_by_id.insert(id, self.nodes.len());
        self.nodes.push(node);
        self.successors.entry(id).or_default();
        self.predecessors.entry(id).or_default();
        id
    }

    pub fn update_node(&mut self, id: NodeId, update: NodeUpdate) {
        let Some(&idx) = self.index_by_id.get(&id) else { return };
        let node = &mut self.nodes[idx];
        if let Some(dynamic_parts) = update.dynamic_parts {
            node.dynamic_parts = dynamic_parts;
        }
        for part in update.extracted_parts_append {
            if !node.extracted_parts.contains(&part) {
                node.extracted_parts.push(part);
            }
        }
        node.input_variables.extend(update.input_variables_extend);
    }

    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        self.index_by_id.get(&id).map(|&idx| &self.nodes[idx])
    }

    pub fn add_edge(&mut self, from: NodeId, to: NodeId) {
        let succ = self.successors.entry(from).or_default();
        if !succ.contains(&to) {
            succ.push(to);
        }
        let pred = self.predecessors.entry(to).or_default();
        if !pred.contains(&from) {
            pred.push(from);
        }
    }

    pub fn successors(&self, id: NodeId) -> &[NodeId] {
        self.successors.get(&id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn predecessors(&self, id: NodeId) -> &[NodeId] {
        self.predecessors.get(&id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn sources(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .map(|n| n.id)
            .filter(|id| self.predecessors(*id).is_empty())
            .collect()
    }

    pub fn sinks(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .map(|n| n.id)
            .filter(|id| self.successors(*id).is_empty())
            .collect()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the first cycle found (as a list of node IDs in cycle order), or
    /// `None` if the graph is acyclic. Runs a DFS from every node, since a
    /// fixed-point loop that adds one edge at a time may grow the graph into a
    /// shape a single-source search would miss.
    pub fn detect_cycles(&self) -> Option<Vec<NodeId>> {
        let mut state: HashMap<NodeId, VisitState> = HashMap::new();

        for node in &self.nodes {
            if matches!(state.get(&node.id), Some(VisitState::Done)) {
                continue;
            }
            let mut path = Vec::new();
            if let Some(cycle) = self.dfs_find_cycle(node.id, &mut state, &mut path) {
                return Some(cycle);
            }
        }
        None
    }

    fn dfs_find_cycle(
        &self,
        id: NodeId,
        state: &mut HashMap<NodeId, VisitState>,
        path: &mut Vec<NodeId>,
    ) -> Option<Vec<NodeId>> {
        match state.get(&id) {
            Some(VisitState::InProgress) => {
                let start = path.iter().position(|n| *n == id).unwrap_or(0);
                let mut cycle = path[start..].to_vec();
                cycle.push(id);
                return Some(cycle);
            }
            Some(VisitState::Done) => return None,
            None => {}
        }

        state.insert(id, VisitState::InProgress);
        path.push(id);

        for &succ in self.successors(id) {
            if let Some(cycle) = self.dfs_find_cycle(succ, state, path) {
                return Some(cycle);
            }
        }

        path.pop();
        state.insert(id, VisitState::Done);
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisitState {
    InProgress,
    Done,
}

/// Distinct node IDs visited, used by the traversal module; exposed here since it
/// operates purely over `DagStore` data.
pub fn reachable_from(store: &DagStore, start: &[NodeId]) -> HashSet<NodeId> {
    let mut seen = HashSet::new();
    let mut stack: Vec<NodeId> = start.to_vec();
    while let Some(id) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        stack.extend(store.successors(id).iter().copied());
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cookie_node(store: &mut DagStore, name: &str, value: &str) -> NodeId {
        store.add_node(
            NodeKind::Cookie,
            NodeContent::Cookie { name: name.into(), value: value.into() },
            vec![],
            vec![value.to_string()],
            HashMap::new(),
        )
    }

    #[test]
    fn add_node_assigns_fresh_unique_ids() {
        let mut store = DagStore::new();
        let a = cookie_node(&mut store, "a", "1");
        let b = cookie_node(&mut store, "b", "2");
        assert_ne!(a, b);
    }

    #[test]
    fn update_node_only_touches_passed_fields() {
        let mut store = DagStore::new();
        let id = cookie_node(&mut store, "csrf", "abc");
        store.update_node(
            id,
            NodeUpdate { extracted_parts_append: vec!["def".into()], ..Default::default() },
        );
        let node = store.get_node(id).unwrap();
        assert_eq!(node.extracted_parts, vec!["abc".to_string(), "def".to_string()]);
        assert!(node.dynamic_parts.is_empty());
    }

    #[test]
    fn sources_and_sinks() {
        let mut store = DagStore::new();
        let a = cookie_node(&mut store, "a", "1");
        let b = cookie_node(&mut store, "b", "2");
        store.add_edge(a, b);
        assert_eq!(store.sources(), vec![a]);
        assert_eq!(store.sinks(), vec![b]);
    }

    #[test]
    fn detects_cycle() {
        let mut store = DagStore::new();
        let a = cookie_node(&mut store, "a", "1");
        let b = cookie_node(&mut store, "b", "2");
        let c = cookie_node(&mut store, "c", "3");
        store.add_edge(a, b);
        store.add_edge(b, c);
        store.add_edge(c, a);
        assert!(store.detect_cycles().is_some());
    }

    #[test]
    fn acyclic_graph_reports_no_cycle() {
        let mut store = DagStore::new();
        let a = cookie_node(&mut store, "a", "1");
        let b = cookie_node(&mut store, "b", "2");
        store.add_edge(a, b);
        assert!(store.detect_cycles().is_none());
    }
}
