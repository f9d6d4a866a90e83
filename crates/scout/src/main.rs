use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use owo_colors::OwoColorize;
use tokio_stream::StreamExt;

use scout_config::Options;
use scout_dispatch::{DispatchOptions, FallbackExecutor, LegacyCliFallback, NoFallback};
use scout_logging::TracingLogger;
use scout_pip::PipResolver;
use scout_pipenv::PipenvResolver;
use scout_plugins::{Ctx, Registry};

mod logging;

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Project root to scan.
    #[arg(default_value = ".")]
    root: PathBuf,

    /// Resolve exactly this manifest, absolute or relative to the root.
    #[arg(long, conflicts_with = "all_projects")]
    file: Option<PathBuf>,

    /// Discover manifests in every directory under the root.
    #[arg(long)]
    all_projects: bool,

    /// Include development dependency groups.
    #[arg(long)]
    dev: bool,

    /// Exclude entries matching this glob; may be provided more than once.
    #[arg(long)]
    exclude: Vec<String>,

    /// Pass `--no-build-isolation` to pip.
    #[arg(long)]
    no_build_isolation: bool,

    /// Maximum simultaneously running resolver tasks.
    #[arg(long, default_value_t = 5)]
    concurrency: usize,

    /// Legacy resolver executable for manifests no plugin claims.
    #[arg(long)]
    fallback_cmd: Option<PathBuf>,

    /// Do not print any output.
    #[arg(long, short, conflicts_with = "verbose")]
    quiet: bool,

    /// Use verbose output.
    #[arg(long, short, conflicts_with = "quiet")]
    verbose: bool,

    /// Flags forwarded verbatim to the fallback resolver.
    #[arg(last = true)]
    raw_flags: Vec<String>,
}

#[derive(Copy, Clone)]
enum ExitStatus {
    /// Every manifest resolved cleanly.
    Success,
    /// At least one result carried an error.
    Failure,
    /// The invocation itself failed.
    Error,
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        match status {
            ExitStatus::Success => ExitCode::from(0),
            ExitStatus::Failure => ExitCode::from(1),
            ExitStatus::Error => ExitCode::from(2),
        }
    }
}

async fn inner() -> Result<ExitStatus> {
    let cli = Cli::parse();

    logging::setup_logging(if cli.verbose {
        logging::Level::Verbose
    } else {
        logging::Level::Default
    })?;

    let mut builder = Options::builder()
        .all_projects(cli.all_projects)
        .include_dev(cli.dev)
        .no_build_isolation(cli.no_build_isolation);
    if let Some(file) = cli.file {
        builder = builder.target_file(file);
    }
    for pattern in cli.exclude {
        builder = builder.exclude(pattern);
    }
    for flag in cli.raw_flags {
        builder = builder.raw_flag(flag);
    }
    let options = builder.build();

    let mut registry = Registry::new();
    registry.register(Arc::new(PipResolver::new()))?;
    registry.register(Arc::new(PipenvResolver::new()))?;

    let fallback: Arc<dyn FallbackExecutor> = match cli.fallback_cmd {
        Some(program) => Arc::new(LegacyCliFallback::new(program)),
        None => Arc::new(NoFallback),
    };

    // Ctrl-C cancels the invocation; in-flight pip processes are reaped.
    let ctx = Ctx::new();
    let cancel = ctx.cancel_token().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let mut stream = scout_dispatch::resolve(
        ctx,
        Arc::new(registry),
        fallback,
        TracingLogger::shared(),
        cli.root,
        options,
        DispatchOptions {
            concurrency: cli.concurrency,
        },
    )
    .await?;

    let mut failed = false;
    while let Some(result) = stream.next().await {
        failed |= result.error.is_some();
        if !cli.quiet {
            #[allow(clippy::print_stdout)]
            {
                println!("{}", serde_json::to_string(&result)?);
            }
        }
    }

    Ok(if failed {
        ExitStatus::Failure
    } else {
        ExitStatus::Success
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    match inner().await {
        Ok(status) => status.into(),
        Err(err) => {
            #[allow(clippy::print_stderr)]
            {
                let mut causes = err.chain();
                eprintln!(
                    "{}: {}",
                    "error".red().bold(),
                    causes.next().map_or_else(String::new, |err| err.to_string())
                );
                for err in causes {
                    eprintln!("  {}: {}", "Caused by".red().bold(), err);
                }
            }
            ExitStatus::Error.into()
        }
    }
}
