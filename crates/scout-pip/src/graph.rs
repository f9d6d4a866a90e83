//! Conversion of a pip report into a dependency graph.

use indexmap::IndexMap;
use rustc_hash::FxHashSet;

use scout_graph::{DepGraph, DepGraphBuilder, NodeId, PackageId};
use scout_normalize::PackageName;

use crate::report::{PipReport, parse_dependency};
use crate::PipError;

struct Indexed {
    id: PackageId,
    requested: bool,
    /// Resolved children, in declaration order, deduplicated.
    children: Vec<PackageName>,
}

/// Convert a dry-run report into a graph labelled with `pkg_manager`.
///
/// First every installed package is indexed by normalized name; then edges
/// are drawn to declared dependencies that exist in the index, with
/// extras-conditional dependencies kept only when the parent requested that
/// extra. Layout walks depth-first from each requested package with a
/// per-subtree visited set: a revisit within the same subtree becomes a
/// pruned placeholder, which keeps the graph acyclic.
pub fn graph_from_report(report: &PipReport, pkg_manager: &str) -> Result<DepGraph, PipError> {
    let mut builder = DepGraphBuilder::new(pkg_manager);

    let mut index: IndexMap<PackageName, Indexed> = IndexMap::new();
    for item in &report.install {
        let name = PackageName::new(&item.metadata.name);
        let id = builder.add_pkg(&name, &item.metadata.version);
        index.insert(
            name,
            Indexed {
                id,
                requested: item.requested,
                children: Vec::new(),
            },
        );
    }

    for item in &report.install {
        let name = PackageName::new(&item.metadata.name);
        let mut children = Vec::new();
        for raw in &item.metadata.requires_dist {
            let Some(dep) = parse_dependency(raw) else {
                continue;
            };
            if let Some(extra) = &dep.extra_marker {
                if !item.requested_extras.contains(extra) {
                    continue;
                }
            }
            // Targets pip did not install are silently dropped.
            if !index.contains_key(&dep.name) {
                continue;
            }
            if !children.contains(&dep.name) {
                children.push(dep.name);
            }
        }
        if let Some(entry) = index.get_mut(&name) {
            entry.children = children;
        }
    }

    let root = builder.root_node_id();
    let requested: Vec<PackageName> = index
        .iter()
        .filter(|(_, entry)| entry.requested)
        .map(|(name, _)| name.clone())
        .collect();
    for name in requested {
        // Each direct dependency of the root seeds its own visited set.
        let mut visited = FxHashSet::default();
        attach(&mut builder, &root, &name, &index, &mut visited)?;
    }

    Ok(builder.build())
}

fn attach(
    builder: &mut DepGraphBuilder,
    parent: &NodeId,
    name: &PackageName,
    index: &IndexMap<PackageName, Indexed>,
    visited: &mut FxHashSet<PackageName>,
) -> Result<(), PipError> {
    let entry = &index[name];
    if !visited.insert(name.clone()) {
        let placeholder = builder.add_pruned_node(&entry.id)?;
        builder.connect(parent, &placeholder)?;
        return Ok(());
    }
    let node = builder.ensure_node(&entry.id)?;
    builder.connect(parent, &node)?;
    for child in &entry.children {
        attach(builder, &node, child, index, visited)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use scout_graph::DepGraph;

    use super::graph_from_report;
    use crate::report::PipReport;

    fn report(items: serde_json::Value) -> PipReport {
        serde_json::from_value(serde_json::json!({ "install": items })).unwrap()
    }

    fn child_ids(graph: &DepGraph, node_id: &str) -> Vec<String> {
        graph
            .nodes()
            .iter()
            .find(|node| node.node_id.as_str() == node_id)
            .unwrap()
            .deps
            .iter()
            .map(|dep| dep.node_id.as_str().to_string())
            .collect()
    }

    #[test]
    fn extras_filter_keeps_only_requested_extras() {
        let report = report(serde_json::json!([
            {
                "requested": true,
                "requested_extras": ["test"],
                "metadata": {
                    "name": "arrow",
                    "version": "1.3.0",
                    "requires_dist": [
                        "python-dateutil>=2.7.0",
                        "pytest ; extra == \"test\"",
                        "pytest-cov ; extra == \"test\"",
                        "sphinx ; extra == \"docs\""
                    ]
                }
            },
            {"metadata": {"name": "python-dateutil", "version": "2.9.0"}},
            {"metadata": {"name": "pytest", "version": "8.0.0"}},
            {"metadata": {"name": "pytest-cov", "version": "4.1.0"}},
            {"metadata": {"name": "sphinx", "version": "7.2.0"}}
        ]));
        let graph = graph_from_report(&report, "pip").unwrap();
        assert_eq!(
            child_ids(&graph, "arrow@1.3.0"),
            [
                "python-dateutil@2.9.0",
                "pytest@8.0.0",
                "pytest-cov@4.1.0"
            ]
        );
    }

    #[test]
    fn pruning_within_a_subtree() {
        // A -> {C, D}, C -> {D}: D is reached first through C, so A's
        // second reference becomes a placeholder.
        let report = report(serde_json::json!([
            {
                "requested": true,
                "metadata": {"name": "a", "version": "1.0", "requires_dist": ["c", "d"]}
            },
            {"metadata": {"name": "c", "version": "1.0", "requires_dist": ["d"]}},
            {"metadata": {"name": "d", "version": "1.0"}}
        ]));
        let graph = graph_from_report(&report, "pip").unwrap();
        assert_eq!(child_ids(&graph, "a@1.0"), ["c@1.0", "d@1.0:pruned-1"]);
        assert_eq!(child_ids(&graph, "c@1.0"), ["d@1.0"]);
        let placeholder = graph
            .nodes()
            .iter()
            .find(|node| node.node_id.as_str() == "d@1.0:pruned-1")
            .unwrap();
        assert!(placeholder.is_pruned());
        assert!(placeholder.deps.is_empty());
    }

    #[test]
    fn shared_packages_across_subtrees_are_not_pruned() {
        let report = report(serde_json::json!([
            {
                "requested": true,
                "metadata": {"name": "a", "version": "1.0", "requires_dist": ["c"]}
            },
            {
                "requested": true,
                "metadata": {"name": "b", "version": "1.0", "requires_dist": ["c"]}
            },
            {"metadata": {"name": "c", "version": "2.0"}}
        ]));
        let graph = graph_from_report(&report, "pip").unwrap();
        assert_eq!(child_ids(&graph, "a@1.0"), ["c@2.0"]);
        assert_eq!(child_ids(&graph, "b@1.0"), ["c@2.0"]);
        // One package entry, one non-pruned node.
        assert_eq!(
            graph
                .pkgs()
                .iter()
                .filter(|pkg| pkg.id.as_str() == "c@2.0")
                .count(),
            1
        );
        assert_eq!(
            graph
                .nodes()
                .iter()
                .filter(|node| node.pkg_id.as_str() == "c@2.0" && !node.is_pruned())
                .count(),
            1
        );
    }

    #[test]
    fn requested_packages_hang_off_the_root() {
        let report = report(serde_json::json!([
            {"requested": true, "metadata": {"name": "flask", "version": "3.0.0"}},
            {"metadata": {"name": "werkzeug", "version": "3.0.1"}}
        ]));
        let graph = graph_from_report(&report, "pip").unwrap();
        assert_eq!(child_ids(&graph, "root-node"), ["flask@3.0.0"]);
    }

    #[test]
    fn names_are_normalized_and_missing_versions_masked() {
        let report = report(serde_json::json!([
            {
                "requested": true,
                "metadata": {"name": "Typing_Extensions", "version": "", "requires_dist": []}
            }
        ]));
        let graph = graph_from_report(&report, "pip").unwrap();
        assert_eq!(child_ids(&graph, "root-node"), ["typing-extensions@?"]);
        let pkg = graph.pkgs().iter().find(|pkg| pkg.id.as_str() == "typing-extensions@?").unwrap();
        assert_eq!(pkg.info.name, "typing-extensions");
        assert_eq!(pkg.info.version, None);
    }

    #[test]
    fn unknown_edge_targets_are_dropped() {
        let report = report(serde_json::json!([
            {
                "requested": true,
                "metadata": {
                    "name": "flask",
                    "version": "3.0.0",
                    "requires_dist": ["werkzeug", "not-installed ; extra == \"x\"", "ghost"]
                }
            },
            {"metadata": {"name": "werkzeug", "version": "3.0.1"}}
        ]));
        let graph = graph_from_report(&report, "pip").unwrap();
        assert_eq!(child_ids(&graph, "flask@3.0.0"), ["werkzeug@3.0.1"]);
    }

    #[test]
    fn duplicate_dependency_declarations_collapse() {
        let report = report(serde_json::json!([
            {
                "requested": true,
                "requested_extras": ["extra1"],
                "metadata": {
                    "name": "parent",
                    "version": "1.0",
                    "requires_dist": ["child>=1.0", "child ; extra == \"extra1\""]
                }
            },
            {"metadata": {"name": "child", "version": "1.0"}}
        ]));
        let graph = graph_from_report(&report, "pip").unwrap();
        assert_eq!(child_ids(&graph, "parent@1.0"), ["child@1.0"]);
    }

    #[test]
    fn label_follows_the_package_manager() {
        let graph = graph_from_report(&PipReport::default(), "pipenv").unwrap();
        assert_eq!(graph.pkg_manager(), "pipenv");
    }
}
