//! The orchestration pipeline: discovery → matching → bounded fan-out →
//! fallback → stream close.
//!
//! `resolve` validates inputs and computes matches up front (validation
//! failures fail the whole call), then returns a stream immediately while a
//! supervisor task runs the plugins and the fallback stage. Results arrive
//! unordered; consumers key them by target file. The stream closes exactly
//! once, after both stages.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use scout_config::Options;
use scout_discovery::FindOptions;
use scout_logging::SharedLogger;
use scout_plugins::{
    Ctx, MatchError, PluginError, PluginMatch, Registry, ScaError, ScaResult, collect_matches,
};

mod fallback;

pub use fallback::{
    FallbackError, FallbackExecutor, LegacyCliFallback, NoFallback, PRINT_GRAPH_FLAG,
};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Match(#[from] MatchError),
}

/// Tunables for the fan-out stage.
#[derive(Debug, Clone)]
pub struct DispatchOptions {
    /// Maximum simultaneously running plugin tasks (and with them, pip
    /// processes).
    pub concurrency: usize,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self { concurrency: 5 }
    }
}

/// Resolve every matched manifest under `root`, streaming results.
///
/// Discovery derivation precedence: an explicit target file pins discovery
/// to that path; `all_projects` walks the whole tree behind the common
/// excludes; otherwise only the project root is searched.
pub async fn resolve(
    ctx: Ctx,
    registry: Arc<Registry>,
    fallback: Arc<dyn FallbackExecutor>,
    logger: SharedLogger,
    root: impl Into<PathBuf>,
    options: Options,
    dispatch: DispatchOptions,
) -> Result<ReceiverStream<ScaResult>, DispatchError> {
    let root = root.into();

    let mut base = FindOptions::new().exclude_globs(options.global.exclude.iter().cloned());
    if let Some(target) = &options.global.target_file {
        base = base.target_file(target);
    } else if options.global.all_projects {
        base = base.common_excludes();
    } else {
        base = base.max_depth(1);
    }
    let matches = collect_matches(&registry, &root, base, ctx.cancel_token())?;
    debug!("matched {} manifest(s) under {}", matches.len(), root.display());

    let (tx, rx) = mpsc::channel(matches.len().max(16));
    tokio::spawn(supervise(
        ctx, fallback, logger, root, options, dispatch, matches, tx,
    ));
    Ok(ReceiverStream::new(rx))
}

async fn supervise(
    ctx: Ctx,
    fallback: Arc<dyn FallbackExecutor>,
    logger: SharedLogger,
    root: PathBuf,
    options: Options,
    dispatch: DispatchOptions,
    matches: Vec<PluginMatch>,
    tx: mpsc::Sender<ScaResult>,
) {
    let handled: Vec<PathBuf> = matches
        .iter()
        .map(|m| m.target_file.clone())
        .collect();

    let semaphore = Arc::new(Semaphore::new(dispatch.concurrency.max(1)));
    let mut tasks = JoinSet::new();
    for m in matches {
        let ctx = ctx.clone();
        let logger = logger.clone();
        let root = root.clone();
        let options = options.clone();
        let semaphore = Arc::clone(&semaphore);
        let tx = tx.clone();
        tasks.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return;
            };
            run_match(&ctx, &logger, &root, &options, &m, &tx).await;
        });
    }
    while tasks.join_next().await.is_some() {}

    if ctx.is_cancelled() {
        return;
    }
    run_fallback(&ctx, fallback.as_ref(), &root, &options, &handled, &tx).await;
    // `tx` drops here, closing the stream.
}

/// Execute one plugin match, emitting at least one record in every terminal
/// state. Failures are isolated to the match.
async fn run_match(
    ctx: &Ctx,
    logger: &SharedLogger,
    root: &Path,
    options: &Options,
    m: &PluginMatch,
    tx: &mpsc::Sender<ScaResult>,
) {
    let target = m.target_file.clone();
    if ctx.is_cancelled() {
        let _ = tx
            .send(ScaResult::failure(target, ScaError::from(PluginError::Canceled)))
            .await;
        return;
    }
    debug!(
        "running plugin `{}` for `{}`",
        m.plugin.name(),
        target.display()
    );
    let scoped = options.for_target(&target);
    match m.plugin.build(ctx, logger, root, &scoped).await {
        Ok(results) => {
            for result in results {
                if tx.send(result).await.is_err() {
                    return;
                }
            }
        }
        Err(err) => {
            debug!(
                "plugin `{}` failed for `{}`: {err}",
                m.plugin.name(),
                target.display()
            );
            let _ = tx.send(ScaResult::failure(target, ScaError::from(err))).await;
        }
    }
}

/// Hand everything the plugins did not claim to the legacy resolver and
/// forward its per-line results. A dead or unparseable fallback surfaces a
/// single terminal error record.
async fn run_fallback(
    ctx: &Ctx,
    fallback: &dyn FallbackExecutor,
    root: &Path,
    options: &Options,
    handled: &[PathBuf],
    tx: &mpsc::Sender<ScaResult>,
) {
    let mut args = options.global.raw_flags.clone();
    args.push(PRINT_GRAPH_FLAG.to_string());
    for target in handled {
        args.push(format!("--exclude={}", target.display()));
    }

    let results = match fallback.run(ctx, &args).await {
        Ok(payload) => fallback::parse_payload(&payload),
        Err(FallbackError::Canceled) => return,
        Err(err) => Err(err),
    };
    match results {
        Ok(results) => {
            for result in results {
                if tx.send(result).await.is_err() {
                    return;
                }
            }
        }
        Err(err) => {
            let _ = tx
                .send(ScaResult::failure(
                    root.to_path_buf(),
                    ScaError::Message(format!("fallback resolution failed: {err}")),
                ))
                .await;
        }
    }
}
