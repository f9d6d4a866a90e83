//! Resolves pip-style manifests into dependency graphs.
//!
//! pip is the resolver; this crate drives `pip install --dry-run
//! --ignore-installed --report -` and converts the JSON report into the
//! standard graph shape, handling extras markers and shared-subgraph
//! pruning along the way.

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

use scout_config::Options;
use scout_errors::CatalogError;
use scout_graph::GraphError;
use scout_logging::SharedLogger;
use scout_plugins::{Capability, Ctx, PluginError, Resolver, ScaResult};

mod command;
mod graph;
mod report;

pub use command::{INDEX_URL_ENV, PipCommand, PipInput};
pub use graph::graph_from_report;
pub use report::{DependencyRef, InstallItem, InstallMetadata, PipReport, parse_dependency};

#[derive(Debug, Error)]
pub enum PipError {
    #[error("failed to spawn `{program}`")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to pipe constraints to pip")]
    Stdin(#[source] std::io::Error),
    #[error("failed to wait for pip")]
    Wait(#[source] std::io::Error),
    #[error("failed to parse the pip report")]
    Report(#[source] serde_json::Error),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("pip was canceled")]
    Canceled,
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl From<PipError> for PluginError {
    fn from(err: PipError) -> Self {
        match err {
            PipError::Canceled => Self::Canceled,
            PipError::Catalog(err) => Self::Catalog(err),
            other => Self::Other(other.into()),
        }
    }
}

/// The `requirements.txt` resolver.
#[derive(Debug, Default)]
pub struct PipResolver {
    command: PipCommand,
}

impl PipResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the pip executable (tests point this at a stub).
    pub fn with_command(command: PipCommand) -> Self {
        Self { command }
    }
}

#[async_trait]
impl Resolver for PipResolver {
    fn name(&self) -> &'static str {
        "pip"
    }

    fn capability(&self) -> Capability {
        Capability::new().primary("requirements.txt")
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
            .ok_or_else(|| anyhow::anyhow!("pip resolver invoked without a target file"))?;
        let manifest = root.join(target_file);
        if !manifest.is_file() {
            return Err(CatalogError::manifest_not_found(manifest.display()).into());
        }

        let runtime = scout_interpreter::detect(ctx.cancel_token())
            .await
            .map_err(|err| PluginError::Catalog(CatalogError::python_not_installed(err)))?;
        logger.debug(
            "resolving requirements manifest",
            &[
                ("targetFile", &target_file.display()),
                ("runtime", &runtime),
            ],
        );

        let report = self
            .command
            .dry_run_report(
                ctx,
                PipInput::RequirementsFile(&manifest),
                None,
                options.python.no_build_isolation,
            )
            .await
            .map_err(PluginError::from)?;
        let graph = graph_from_report(&report, "pip").map_err(PluginError::from)?;
        Ok(vec![ScaResult::graph(
            target_file,
            Some(runtime.to_string()),
            graph,
        )])
    }
}

#[cfg(test)]
mod tests {
    use scout_config::Options;
    use scout_errors::ErrorKind;
    use scout_logging::NopLogger;
    use scout_plugins::{Ctx, PluginError, Resolver};
    use tempfile::TempDir;

    use super::PipResolver;

    #[tokio::test]
    async fn missing_manifest_is_a_catalog_error() {
        let dir = TempDir::new().unwrap();
        let options = Options::builder().target_file("requirements.txt").build();
        let err = PipResolver::new()
            .build(&Ctx::new(), &NopLogger::shared(), dir.path(), &options)
            .await
            .unwrap_err();
        match err {
            PluginError::Catalog(err) => assert_eq!(err.kind, ErrorKind::ManifestNotFound),
            other => panic!("expected catalog error, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn manifests_are_passed_by_reference() {
        use std::fs;
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("requirements.txt"), "flask\n").unwrap();
        let argv_log = dir.path().join("argv");
        let stub = dir.path().join("pip-stub");
        fs::write(
            &stub,
            format!(
                "#!/bin/sh\nprintf '%s\\n' \"$@\" > {}\nprintf '{{\"install\": []}}'\n",
                argv_log.display()
            ),
        )
        .unwrap();
        fs::set_permissions(&stub, fs::Permissions::from_mode(0o755)).unwrap();

        let resolver = PipResolver::with_command(super::PipCommand::with_program(stub));
        let options = Options::builder().target_file("requirements.txt").build();
        let results = resolver
            .build(&Ctx::new(), &NopLogger::shared(), dir.path(), &options)
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].dep_graph.as_ref().unwrap().pkg_manager(), "pip");
        assert!(results[0].metadata.runtime.as_deref().unwrap().starts_with("Python "));

        let argv = std::fs::read_to_string(&argv_log).unwrap();
        assert!(argv.contains("-r\n"));
        assert!(argv.contains("requirements.txt\n"));
    }
}
