// ── Push cache ──
//
// Last-known snapshots of the two full-state channels. Each push replaces
// its slot wholesale; there is no merge and no eviction. Snapshots are
// shared as `Arc` so replay and fan-out never copy the data.

use std::sync::Arc;

use devconsole_api::types::{ComponentItem, DepGraphNode, Dependency};
use indexmap::IndexMap;

/// Component name to its ordered dependency edges, in push order.
pub type DependencyGraph = IndexMap<String, Vec<Dependency>>;

/// Rebuild the graph mapping from the node sequence of a push.
///
/// A repeated name keeps its first position and takes the last children.
pub fn build_graph(nodes: Vec<DepGraphNode>) -> DependencyGraph {
    nodes
        .into_iter()
        .map(|node| (node.name, node.children))
        .collect()
}

#[derive(Debug, Default)]
pub struct PushCache {
    component_list: Option<Arc<Vec<ComponentItem>>>,
    dependency_graph: Option<Arc<DependencyGraph>>,
}

impl PushCache {
    /// The last component list, if one has arrived.
    ///
    /// An empty list that was actually pushed still counts as data.
    pub fn component_list(&self) -> Option<Arc<Vec<ComponentItem>>> {
        self.component_list.clone()
    }

    pub fn dependency_graph(&self) -> Option<Arc<DependencyGraph>> {
        self.dependency_graph.clone()
    }

    pub fn replace_component_list(&mut self, list: Vec<ComponentItem>) -> Arc<Vec<ComponentItem>> {
        let list = Arc::new(list);
        self.component_list = Some(Arc::clone(&list));
        list
    }

    pub fn replace_dependency_graph(&mut self, nodes: Vec<DepGraphNode>) -> Arc<DependencyGraph> {
        let graph = Arc::new(build_graph(nodes));
        self.dependency_graph = Some(Arc::clone(&graph));
        graph
    }
}
