//! The resolver plugin contract.
//!
//! A resolver advertises a [`Capability`] (which manifests it claims, and
//! which companion files must sit next to them) and implements [`Resolver`].
//! Polymorphism is a capability record plus a behavioral trait; adding an
//! ecosystem is one more registration, no inheritance anywhere.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use scout_config::Options;
use scout_errors::CatalogError;
use scout_graph::DepGraph;
use scout_logging::SharedLogger;

mod ctx;
mod matcher;
mod registry;

pub use ctx::Ctx;
pub use matcher::{MatchError, PluginMatch, collect_matches};
pub use registry::{Registry, RegistryError};

/// What a resolver can bind to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capability {
    /// Filename patterns that declare a project (e.g. `requirements.txt`).
    pub primary_manifests: BTreeSet<String>,
    /// Files that must accompany a primary manifest for this resolver to
    /// bind. Companions are never matched as primaries themselves.
    pub required_companions: BTreeSet<String>,
}

impl Capability {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn primary(mut self, manifest: impl Into<String>) -> Self {
        self.primary_manifests.insert(manifest.into());
        self
    }

    #[must_use]
    pub fn companion(mut self, file: impl Into<String>) -> Self {
        self.required_companions.insert(file.into());
        self
    }
}

/// Failure of one resolver invocation.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("resolution was canceled")]
    Canceled,
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// An ecosystem resolver. Instances are stateless and shared across
/// invocations.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Unique registry name.
    fn name(&self) -> &'static str;

    fn capability(&self) -> Capability;

    /// Resolve the manifest named by `options.global.target_file` (relative
    /// to `root`) into zero or more results.
    async fn build(
        &self,
        ctx: &Ctx,
        logger: &SharedLogger,
        root: &Path,
        options: &Options,
    ) -> Result<Vec<ScaResult>, PluginError>;
}

/// The error half of a result record: either a structured catalog error or
/// plain text (fallback lines may carry either).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScaError {
    Catalog(CatalogError),
    Message(String),
}

impl From<PluginError> for ScaError {
    fn from(err: PluginError) -> Self {
        match err {
            PluginError::Canceled => Self::Message("resolution was canceled".to_string()),
            PluginError::Catalog(err) => Self::Catalog(err),
            PluginError::Other(err) => Self::Message(format!("{err:#}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultMetadata {
    pub target_file: PathBuf,
    /// Runtime the graph was resolved against (e.g. `Python 3.11.4`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,
}

/// One record on the result stream. By convention exactly one of
/// `dep_graph` and `error` is populated; `target_file` always is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dep_graph: Option<DepGraph>,
    pub metadata: ResultMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ScaError>,
}

impl ScaResult {
    pub fn graph(target_file: impl Into<PathBuf>, runtime: Option<String>, graph: DepGraph) -> Self {
        Self {
            dep_graph: Some(graph),
            metadata: ResultMetadata {
                target_file: target_file.into(),
                runtime,
            },
            error: None,
        }
    }

    pub fn failure(target_file: impl Into<PathBuf>, error: impl Into<ScaError>) -> Self {
        Self {
            dep_graph: None,
            metadata: ResultMetadata {
                target_file: target_file.into(),
                runtime: None,
            },
            error: Some(error.into()),
        }
    }
}
