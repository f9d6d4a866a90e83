use scout_normalize::PackageName;

use crate::{
    Adjacency, Dep, DepGraph, GraphError, Node, NodeId, NodeIndex, NodeInfo, PackageId, Pkg,
    PkgInfo, PkgManager, PkgTable, SCHEMA_VERSION,
};

/// Incrementally builds a [`DepGraph`], enforcing referential integrity.
///
/// Node ids equal package ids except for pruned placeholders, which get a
/// fresh `:pruned-<n>` suffix from a per-build counter.
#[derive(Debug)]
pub struct DepGraphBuilder {
    pkg_manager: String,
    pkgs: PkgTable,
    nodes: Vec<Node>,
    index: NodeIndex,
    pruned: usize,
}

impl DepGraphBuilder {
    /// Start a graph for the given package manager, seeded with the
    /// synthetic root package and root node.
    pub fn new(pkg_manager: &str) -> Self {
        let mut pkgs = PkgTable::default();
        pkgs.insert(
            PackageId::root(),
            PkgInfo {
                name: "root".to_string(),
                version: Some("0.0.0".to_string()),
            },
        );
        let root = Node {
            node_id: NodeId::root(),
            pkg_id: PackageId::root(),
            deps: Vec::new(),
            info: None,
        };
        let mut index = NodeIndex::default();
        index.insert(NodeId::root(), 0);
        Self {
            pkg_manager: pkg_manager.to_string(),
            pkgs,
            nodes: vec![root],
            index,
            pruned: 0,
        }
    }

    pub fn root_node_id(&self) -> NodeId {
        NodeId::root()
    }

    /// Register a package, returning its id. Idempotent.
    pub fn add_pkg(&mut self, name: &PackageName, version: &str) -> PackageId {
        let id = PackageId::new(name, version);
        self.pkgs.entry(id.clone()).or_insert_with(|| PkgInfo {
            name: name.to_string(),
            version: (!version.is_empty()).then(|| version.to_string()),
        });
        id
    }

    /// Return the node for a package, creating it on first call.
    ///
    /// The package must have been registered with [`Self::add_pkg`].
    pub fn ensure_node(&mut self, pkg_id: &PackageId) -> Result<NodeId, GraphError> {
        if !self.pkgs.contains_key(pkg_id) {
            return Err(GraphError::UnknownPackage(pkg_id.clone()));
        }
        let node_id = NodeId::from(pkg_id);
        if !self.index.contains_key(&node_id) {
            self.push_node(Node {
                node_id: node_id.clone(),
                pkg_id: pkg_id.clone(),
                deps: Vec::new(),
                info: None,
            });
        }
        Ok(node_id)
    }

    /// Insert a pruned placeholder for an already-visited package: a fresh
    /// node id, the `pruned` label, and no outgoing edges.
    pub fn add_pruned_node(&mut self, pkg_id: &PackageId) -> Result<NodeId, GraphError> {
        if !self.pkgs.contains_key(pkg_id) {
            return Err(GraphError::UnknownPackage(pkg_id.clone()));
        }
        self.pruned += 1;
        let node_id = NodeId::pruned(pkg_id, self.pruned);
        self.push_node(Node {
            node_id: node_id.clone(),
            pkg_id: pkg_id.clone(),
            deps: Vec::new(),
            info: Some(NodeInfo {
                labels: [("pruned".to_string(), "true".to_string())]
                    .into_iter()
                    .collect(),
            }),
        });
        Ok(node_id)
    }

    /// Add an edge. Both endpoints must exist; duplicate edges collapse.
    pub fn connect(&mut self, from: &NodeId, to: &NodeId) -> Result<(), GraphError> {
        if !self.index.contains_key(to) {
            return Err(GraphError::UnknownNode(to.clone()));
        }
        let position = *self
            .index
            .get(from)
            .ok_or_else(|| GraphError::UnknownNode(from.clone()))?;
        let deps = &mut self.nodes[position].deps;
        if !deps.iter().any(|dep| &dep.node_id == to) {
            deps.push(Dep {
                node_id: to.clone(),
            });
        }
        Ok(())
    }

    /// Whether a node for this package id has already been laid out.
    pub fn has_node(&self, pkg_id: &PackageId) -> bool {
        self.index.contains_key(&NodeId::from(pkg_id))
    }

    pub fn build(self) -> DepGraph {
        DepGraph {
            schema_version: SCHEMA_VERSION.to_string(),
            pkg_manager: PkgManager {
                name: self.pkg_manager,
            },
            pkgs: self
                .pkgs
                .into_iter()
                .map(|(id, info)| Pkg { id, info })
                .collect(),
            graph: Adjacency {
                root_node_id: NodeId::root(),
                nodes: self.nodes,
            },
        }
    }

    fn push_node(&mut self, node: Node) {
        self.index.insert(node.node_id.clone(), self.nodes.len());
        self.nodes.push(node);
    }
}
