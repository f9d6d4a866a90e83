use std::path::{Path, PathBuf};
use std::sync::Arc;

use glob::Pattern;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use scout_discovery::{Discovered, DiscoveryError, FindOptions, find};

use crate::{Registry, Resolver};

#[derive(Debug, Error)]
pub enum MatchError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
}

/// A resolver bound to one discovered manifest.
#[derive(Clone)]
pub struct PluginMatch {
    pub plugin: Arc<dyn Resolver>,
    /// Manifest path relative to the discovery root.
    pub target_file: PathBuf,
}

impl std::fmt::Debug for PluginMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginMatch")
            .field("plugin", &self.plugin.name())
            .field("target_file", &self.target_file)
            .finish()
    }
}

/// Discover manifests and bind each to its most specific eligible resolver.
///
/// `base` carries the caller's extra discovery options (target file,
/// excludes, depth bound); the union of all registered primary manifests is
/// added as include patterns unless a target file pins discovery to one
/// path.
pub fn collect_matches(
    registry: &Registry,
    root: &Path,
    base: FindOptions,
    cancel: &CancellationToken,
) -> Result<Vec<PluginMatch>, MatchError> {
    let mut options = base;
    if !options.has_target_files() {
        for plugin in registry.all() {
            options = options.include_globs(plugin.capability().primary_manifests);
        }
    }

    let discovered = find(root, &options, cancel)?;

    let mut matches = Vec::new();
    for Discovered {
        absolute_path,
        relative_path,
    } in discovered
    {
        let Some(basename) = absolute_path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        let Some(directory) = absolute_path.parent() else {
            continue;
        };
        if let Some(plugin) = best_plugin(registry, directory, basename) {
            debug!(
                "matched `{}` to plugin `{}`",
                relative_path.display(),
                plugin.name()
            );
            matches.push(PluginMatch {
                plugin: Arc::clone(plugin),
                target_file: relative_path,
            });
        }
    }
    Ok(matches)
}

/// Pick the single best plugin for a file: among candidates whose required
/// companions are all present as siblings, the one with the most
/// companions; ties fall back to registry (name) order.
fn best_plugin<'registry>(
    registry: &'registry Registry,
    directory: &Path,
    basename: &str,
) -> Option<&'registry Arc<dyn Resolver>> {
    let mut best: Option<(&Arc<dyn Resolver>, usize)> = None;
    for plugin in registry.all() {
        let capability = plugin.capability();
        if !capability
            .primary_manifests
            .iter()
            .any(|manifest| claims(manifest, basename))
        {
            continue;
        }
        if !capability
            .required_companions
            .iter()
            .all(|companion| directory.join(companion).is_file())
        {
            continue;
        }
        let specificity = capability.required_companions.len();
        // Strictly-greater keeps the earlier (name-ordered) plugin on ties.
        if best.is_none_or(|(_, current)| specificity > current) {
            best = Some((plugin, specificity));
        }
    }
    best.map(|(plugin, _)| plugin)
}

fn claims(manifest: &str, basename: &str) -> bool {
    manifest == basename
        || Pattern::new(manifest)
            .map(|pattern| pattern.matches(basename))
            .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;

    use async_trait::async_trait;
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    use scout_config::Options;
    use scout_discovery::FindOptions;
    use scout_logging::SharedLogger;

    use super::collect_matches;
    use crate::{Capability, Ctx, PluginError, Registry, Resolver, ScaResult};

    struct Stub {
        name: &'static str,
        capability: Capability,
    }

    #[async_trait]
    impl Resolver for Stub {
        fn name(&self) -> &'static str {
            self.name
        }

        fn capability(&self) -> Capability {
            self.capability.clone()
        }

        async fn build(
            &self,
            _ctx: &Ctx,
            _logger: &SharedLogger,
            _root: &Path,
            _options: &Options,
        ) -> Result<Vec<ScaResult>, PluginError> {
            Ok(Vec::new())
        }
    }

    fn registry(stubs: Vec<Stub>) -> Registry {
        let mut registry = Registry::new();
        for stub in stubs {
            registry.register(Arc::new(stub)).unwrap();
        }
        registry
    }

    fn matched_names(registry: &Registry, root: &Path) -> Vec<(String, String)> {
        let mut matches: Vec<(String, String)> = collect_matches(
            registry,
            root,
            FindOptions::new(),
            &CancellationToken::new(),
        )
        .unwrap()
        .into_iter()
        .map(|m| {
            (
                m.plugin.name().to_string(),
                m.target_file.to_string_lossy().replace('\\', "/"),
            )
        })
        .collect();
        matches.sort();
        matches
    }

    #[test]
    fn companion_count_picks_the_most_specific_plugin() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("requirements.txt"), "").unwrap();
        fs::write(dir.path().join("uv.lock"), "").unwrap();

        let registry = registry(vec![
            Stub {
                name: "pip",
                capability: Capability::new().primary("requirements.txt"),
            },
            Stub {
                name: "uv",
                capability: Capability::new()
                    .primary("requirements.txt")
                    .companion("uv.lock"),
            },
        ]);

        assert_eq!(
            matched_names(&registry, dir.path()),
            [("uv".to_string(), "requirements.txt".to_string())]
        );

        fs::remove_file(dir.path().join("uv.lock")).unwrap();
        assert_eq!(
            matched_names(&registry, dir.path()),
            [("pip".to_string(), "requirements.txt".to_string())]
        );
    }

    #[test]
    fn ties_break_by_plugin_name() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("requirements.txt"), "").unwrap();

        let registry = registry(vec![
            Stub {
                name: "zebra",
                capability: Capability::new().primary("requirements.txt"),
            },
            Stub {
                name: "aardvark",
                capability: Capability::new().primary("requirements.txt"),
            },
        ]);

        assert_eq!(
            matched_names(&registry, dir.path()),
            [("aardvark".to_string(), "requirements.txt".to_string())]
        );
    }

    #[test]
    fn companions_are_not_matched_as_primaries() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("uv.lock"), "").unwrap();

        let registry = registry(vec![Stub {
            name: "uv",
            capability: Capability::new()
                .primary("requirements.txt")
                .companion("uv.lock"),
        }]);

        assert_eq!(matched_names(&registry, dir.path()), []);
    }

    #[test]
    fn each_directory_is_matched_independently() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("api")).unwrap();
        fs::create_dir(dir.path().join("worker")).unwrap();
        fs::write(dir.path().join("api/Pipfile"), "").unwrap();
        fs::write(dir.path().join("worker/requirements.txt"), "").unwrap();

        let registry = registry(vec![
            Stub {
                name: "pip",
                capability: Capability::new().primary("requirements.txt"),
            },
            Stub {
                name: "pipenv",
                capability: Capability::new().primary("Pipfile"),
            },
        ]);

        assert_eq!(
            matched_names(&registry, dir.path()),
            [
                ("pip".to_string(), "worker/requirements.txt".to_string()),
                ("pipenv".to_string(), "api/Pipfile".to_string()),
            ]
        );
    }

    #[test]
    fn target_file_pins_discovery_to_one_manifest() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("requirements.txt"), "").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested/requirements.txt"), "").unwrap();

        let registry = registry(vec![Stub {
            name: "pip",
            capability: Capability::new().primary("requirements.txt"),
        }]);

        let matches = collect_matches(
            &registry,
            dir.path(),
            FindOptions::new().target_file("nested/requirements.txt"),
            &CancellationToken::new(),
        )
        .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(
            matches[0].target_file.to_string_lossy().replace('\\', "/"),
            "nested/requirements.txt"
        );
    }
}
