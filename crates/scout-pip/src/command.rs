//! The pip process wrapper.

use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tracing::debug;

use scout_errors::{PipFailure, classify_pip_failure};
use scout_plugins::Ctx;

use crate::{PipError, PipReport};

/// Environment variable that injects `--index-url` into every invocation.
pub const INDEX_URL_ENV: &str = "PIP_TEST_INDEX_URL";

/// What to hand pip on the command line.
#[derive(Debug, Clone, Copy)]
pub enum PipInput<'a> {
    /// Positional requirement strings (the Pipenv path).
    Packages(&'a [String]),
    /// `-r <file>` (the requirements.txt path).
    RequirementsFile(&'a Path),
}

/// Builds and runs `pip install --dry-run` report invocations.
#[derive(Debug, Clone)]
pub struct PipCommand {
    program: OsString,
}

impl Default for PipCommand {
    fn default() -> Self {
        Self {
            program: OsString::from("pip"),
        }
    }
}

impl PipCommand {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_program(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Run pip and parse the JSON report from stdout.
    ///
    /// Constraints, when given, are piped to pip's stdin and referenced as
    /// `-c /dev/stdin` so versions are pinned without asserting them on the
    /// command line. Non-zero exits are classified against stderr.
    pub async fn dry_run_report(
        &self,
        ctx: &Ctx,
        input: PipInput<'_>,
        constraints: Option<&str>,
        no_build_isolation: bool,
    ) -> Result<PipReport, PipError> {
        let mut command = tokio::process::Command::new(&self.program);
        command.args([
            "install",
            "--dry-run",
            "--ignore-installed",
            "--report",
            "-",
            "--quiet",
        ]);
        match input {
            PipInput::Packages(packages) => {
                command.args(packages);
            }
            PipInput::RequirementsFile(path) => {
                command.arg("-r").arg(path);
            }
        }
        if constraints.is_some() {
            command.args(["-c", "/dev/stdin"]);
        }
        if no_build_isolation {
            command.arg("--no-build-isolation");
        }
        if let Ok(index_url) = std::env::var(INDEX_URL_ENV) {
            if !index_url.is_empty() {
                command.arg("--index-url").arg(index_url);
            }
        }
        command
            .stdin(if constraints.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("invoking {:?}", command.as_std());
        let mut child = command.spawn().map_err(|source| PipError::Spawn {
            program: self.program.to_string_lossy().into_owned(),
            source,
        })?;

        if let Some(constraints) = constraints {
            let mut stdin = child.stdin.take().expect("stdin was piped");
            stdin
                .write_all(constraints.as_bytes())
                .await
                .map_err(PipError::Stdin)?;
            // Close the pipe so pip sees EOF on /dev/stdin.
            drop(stdin);
        }

        let output = tokio::select! {
            output = child.wait_with_output() => output.map_err(PipError::Wait)?,
            () = ctx.cancel_token().cancelled() => return Err(PipError::Canceled),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("pip failed with {}: {}", output.status, stderr.trim());
            return Err(match classify_pip_failure(&stderr, ctx.cancel_signal()) {
                PipFailure::Canceled => PipError::Canceled,
                PipFailure::Catalog(err) => PipError::Catalog(err),
            });
        }

        PipReport::from_json(&output.stdout).map_err(PipError::Report)
    }
}
