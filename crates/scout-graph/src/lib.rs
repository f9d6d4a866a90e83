//! The dependency-graph value emitted for every resolved manifest.
//!
//! The shape on the wire is the standard dep-graph schema (`schemaVersion
//! 1.3.0`): a flat package list plus an out-edge adjacency over nodes, with
//! a synthetic `root@0.0.0` package at the top. [`DepGraphBuilder`] is the
//! only way to construct one, and it enforces referential integrity while
//! the resolvers lay out nodes.

use std::collections::BTreeMap;
use std::fmt;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use scout_normalize::PackageName;

mod builder;

pub use builder::DepGraphBuilder;

/// The dep-graph schema version this crate reads and writes.
pub const SCHEMA_VERSION: &str = "1.3.0";

/// Version placeholder for packages whose version pip did not report.
pub const UNKNOWN_VERSION: &str = "?";

/// Synthetic root package id, present in every graph.
pub const ROOT_PKG_ID: &str = "root@0.0.0";

/// Node id of the synthetic root node.
pub const ROOT_NODE_ID: &str = "root-node";

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("node `{0}` does not exist in the graph")]
    UnknownNode(NodeId),
    #[error("package `{0}` does not exist in the graph")]
    UnknownPackage(PackageId),
}

/// Canonical `<normalized-name>@<version>` identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageId(String);

impl PackageId {
    /// Compose an id from a normalized name and a (possibly empty) version.
    pub fn new(name: &PackageName, version: &str) -> Self {
        if version.is_empty() {
            Self(format!("{name}@{UNKNOWN_VERSION}"))
        } else {
            Self(format!("{name}@{version}"))
        }
    }

    pub fn root() -> Self {
        Self(ROOT_PKG_ID.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Node identifier. Usually equal to the package id; pruned placeholders
/// carry a `:pruned-<n>` suffix instead.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn root() -> Self {
        Self(ROOT_NODE_ID.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&PackageId> for NodeId {
    fn from(pkg_id: &PackageId) -> Self {
        Self(pkg_id.0.clone())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl NodeId {
    pub(crate) fn pruned(pkg_id: &PackageId, ordinal: usize) -> Self {
        Self(format!("{pkg_id}:pruned-{ordinal}"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PkgManager {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PkgInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pkg {
    pub id: PackageId,
    pub info: PkgInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dep {
    pub node_id: NodeId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub node_id: NodeId,
    pub pkg_id: PackageId,
    pub deps: Vec<Dep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<NodeInfo>,
}

impl Node {
    /// Whether this node is a pruned placeholder.
    pub fn is_pruned(&self) -> bool {
        self.info
            .as_ref()
            .is_some_and(|info| info.labels.get("pruned").is_some_and(|v| v == "true"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Adjacency {
    root_node_id: NodeId,
    nodes: Vec<Node>,
}

/// A complete dependency graph in the standard schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepGraph {
    schema_version: String,
    pkg_manager: PkgManager,
    pkgs: Vec<Pkg>,
    graph: Adjacency,
}

impl DepGraph {
    pub fn pkg_manager(&self) -> &str {
        &self.pkg_manager.name
    }

    pub fn pkgs(&self) -> &[Pkg] {
        &self.pkgs
    }

    pub fn pkg(&self, id: &PackageId) -> Option<&PkgInfo> {
        self.pkgs
            .iter()
            .find(|pkg| &pkg.id == id)
            .map(|pkg| &pkg.info)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.graph.nodes
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.graph.nodes.iter().find(|node| &node.node_id == id)
    }

    pub fn root_node_id(&self) -> &NodeId {
        &self.graph.root_node_id
    }

    /// Direct dependencies of the synthetic root.
    pub fn root_deps(&self) -> impl Iterator<Item = &Node> {
        self.node(&self.graph.root_node_id)
            .into_iter()
            .flat_map(|root| root.deps.iter())
            .filter_map(|dep| self.node(&dep.node_id))
    }
}

type PkgTable = IndexMap<PackageId, PkgInfo>;
type NodeIndex = FxHashMap<NodeId, usize>;
