//! Resolves Pipenv projects.
//!
//! The `Pipfile` supplies *which* packages to resolve, the `Pipfile.lock`
//! supplies *which versions*, and pip does the resolution: package names go
//! on the command line, lock-derived `name==version` pins go in through a
//! constraints pipe. A project without a lockfile is refused, since nothing
//! would pin the resolution.

use std::path::Path;

use anyhow::Context as _;
use async_trait::async_trait;
use tracing::debug;

use scout_config::Options;
use scout_errors::CatalogError;
use scout_logging::SharedLogger;
use scout_pip::{PipCommand, PipInput, graph_from_report};
use scout_plugins::{Capability, Ctx, PluginError, Resolver, ScaResult};

mod lock;
mod manifest;

pub use lock::{LockEntry, PipfileLock};
pub use manifest::{
    PackageSpec, PackageTable, Pipfile, Requires, Source, host_platform, requirement_args,
};

const LOCKFILE: &str = "Pipfile.lock";

/// The `Pipfile` resolver.
#[derive(Debug, Default)]
pub struct PipenvResolver {
    command: PipCommand,
}

impl PipenvResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the pip executable (tests point this at a stub).
    pub fn with_command(command: PipCommand) -> Self {
        Self { command }
    }
}

#[async_trait]
impl Resolver for PipenvResolver {
    fn name(&self) -> &'static str {
        "pipenv"
    }

    fn capability(&self) -> Capability {
        Capability::new().primary("Pipfile")
    }

    async fn build(
        &self,
        ctx: &Ctx,
        logger: &SharedLogger,
        root: &Path,
        options: &Options,
    ) -> Result<Vec<ScaResult>, PluginError> {
        let target_file = options
            .global
            .target_file
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("pipenv resolver invoked without a target file"))?;
        let manifest_path = root.join(target_file);
        let contents = fs_err::read_to_string(&manifest_path)
            .map_err(|_| CatalogError::manifest_not_found(manifest_path.display()))?;
        let pipfile = Pipfile::from_toml(&contents)
            .with_context(|| format!("failed to parse {}", manifest_path.display()))?;

        // Refuse to resolve unpinned: the lockfile is the version source.
        let lock_path = manifest_path
            .parent()
            .unwrap_or(root)
            .join(LOCKFILE);
        let lock_contents = fs_err::read_to_string(&lock_path)
            .map_err(|_| CatalogError::manifest_not_found(lock_path.display()))?;
        let lock = PipfileLock::from_json(&lock_contents)
            .map_err(|err| CatalogError::unparseable_lockfile(lock_path.display(), err))?;

        let runtime = scout_interpreter::detect(ctx.cancel_token())
            .await
            .map_err(|err| PluginError::Catalog(CatalogError::python_not_installed(err)))?;
        if let Some(required) = pipfile
            .requires
            .as_ref()
            .and_then(|requires| requires.python_version.as_deref())
        {
            let host = format!("{}.{}", runtime.major, runtime.minor);
            if host != required {
                debug!("Pipfile requires python {required}, host runs {host}");
            }
        }

        let include_dev = options.global.include_dev;
        let platform = host_platform();
        let mut args = Vec::new();
        let entries = pipfile.packages.iter().chain(
            include_dev
                .then_some(pipfile.dev_packages.iter())
                .into_iter()
                .flatten(),
        );
        for (name, spec) in entries {
            match requirement_args(name, spec, platform) {
                Some(rendered) => args.extend(rendered),
                None => debug!("skipping `{name}`: platform marker excludes {platform}"),
            }
        }
        logger.debug(
            "resolving Pipfile",
            &[
                ("targetFile", &target_file.display()),
                ("packages", &args.len()),
            ],
        );

        // With nothing to install there is nothing to ask pip.
        let graph = if args.is_empty() {
            scout_graph::DepGraphBuilder::new("pipenv").build()
        } else {
            let mut constraints = lock.constraints(include_dev).join("\n");
            constraints.push('\n');
            let report = self
                .command
                .dry_run_report(
                    ctx,
                    PipInput::Packages(&args),
                    Some(&constraints),
                    options.python.no_build_isolation,
                )
                .await
                .map_err(PluginError::from)?;
            graph_from_report(&report, "pipenv").map_err(PluginError::from)?
        };

        Ok(vec![ScaResult::graph(
            target_file,
            Some(runtime.to_string()),
            graph,
        )])
    }
}
