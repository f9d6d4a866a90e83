//! The legacy fallback resolver contract.
//!
//! Manifests no plugin claimed are handed to a legacy workflow process that
//! prints one JSON object per line: a `normalisedTargetFile`, an optional
//! embedded dep-graph, and an optional error (plain text or a JSON-API
//! error array). We specify only the invocation and payload contract; the
//! process itself is external.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use scout_graph::DepGraph;
use scout_plugins::{Ctx, ResultMetadata, ScaError, ScaResult};

/// Flag appended to every fallback invocation.
pub const PRINT_GRAPH_FLAG: &str = "--print-effective-graph-with-errors";

#[derive(Debug, Error)]
pub enum FallbackError {
    #[error("failed to invoke fallback resolver `{program}`")]
    Invoke {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("fallback resolver exited with {status} and no payload")]
    Failed {
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error("fallback resolver produced an unparseable payload")]
    Payload(#[source] serde_json::Error),
    #[error("fallback resolution was canceled")]
    Canceled,
}

/// Executes the legacy workflow with a raw argument list.
#[async_trait]
pub trait FallbackExecutor: Send + Sync {
    /// Run the workflow and return its JSONL payload. `Ok` means the
    /// process produced output, even if individual lines carry errors.
    async fn run(&self, ctx: &Ctx, args: &[String]) -> Result<Vec<u8>, FallbackError>;
}

/// Spawns the legacy CLI as a child process.
#[derive(Debug, Clone)]
pub struct LegacyCliFallback {
    program: PathBuf,
}

impl LegacyCliFallback {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl FallbackExecutor for LegacyCliFallback {
    async fn run(&self, ctx: &Ctx, args: &[String]) -> Result<Vec<u8>, FallbackError> {
        debug!("invoking fallback `{}` {args:?}", self.program.display());
        let mut command = tokio::process::Command::new(&self.program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let child = command.spawn().map_err(|source| FallbackError::Invoke {
            program: self.program.display().to_string(),
            source,
        })?;
        let output = tokio::select! {
            output = child.wait_with_output() => {
                output.map_err(|source| FallbackError::Invoke {
                    program: self.program.display().to_string(),
                    source,
                })?
            }
            () = ctx.cancel_token().cancelled() => return Err(FallbackError::Canceled),
        };
        // Per-target errors still arrive as payload lines; only an empty
        // payload from a failed process is an invocation error.
        if output.stdout.is_empty() && !output.status.success() {
            return Err(FallbackError::Failed {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(output.stdout)
    }
}

/// A fallback that resolves nothing, for hosts without a legacy CLI.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFallback;

#[async_trait]
impl FallbackExecutor for NoFallback {
    async fn run(&self, _ctx: &Ctx, _args: &[String]) -> Result<Vec<u8>, FallbackError> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FallbackLine {
    normalised_target_file: String,
    #[serde(default)]
    dep_graph: Option<DepGraph>,
    #[serde(default)]
    error: Option<LineError>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LineError {
    Text(String),
    JsonApi(Vec<JsonApiError>),
}

#[derive(Debug, Deserialize)]
struct JsonApiError {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    detail: Option<String>,
}

/// Parse a JSONL payload into result records, one per line.
pub(crate) fn parse_payload(payload: &[u8]) -> Result<Vec<ScaResult>, FallbackError> {
    let text = String::from_utf8_lossy(payload);
    let mut results = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let parsed: FallbackLine = serde_json::from_str(line).map_err(FallbackError::Payload)?;
        results.push(ScaResult {
            dep_graph: parsed.dep_graph,
            metadata: ResultMetadata {
                target_file: parsed.normalised_target_file.into(),
                runtime: None,
            },
            error: parsed.error.map(|error| match error {
                LineError::Text(text) => ScaError::Message(text),
                LineError::JsonApi(errors) => {
                    // Only the first error of the envelope is recorded.
                    let message = errors
                        .into_iter()
                        .next()
                        .map(|err| match (err.title, err.detail) {
                            (Some(title), Some(detail)) => format!("{title}: {detail}"),
                            (Some(title), None) => title,
                            (None, Some(detail)) => detail,
                            (None, None) => "unknown fallback error".to_string(),
                        })
                        .unwrap_or_else(|| "unknown fallback error".to_string());
                    ScaError::Message(message)
                }
            }),
        });
    }
    Ok(results)
}
