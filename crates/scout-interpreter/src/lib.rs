//! Detection of the host Python runtime.
//!
//! Tries `python3 --version` first and `python --version` second, parsing
//! the `Python X.Y.Z` banner. Old interpreters print the banner on stderr,
//! so both streams are inspected.

use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const CANDIDATES: &[&str] = &["python3", "python"];

#[derive(Debug, Error)]
pub enum InterpreterError {
    #[error("no usable Python interpreter found on PATH")]
    NotFound,
    #[error("failed to query interpreter at {interpreter}")]
    Query {
        interpreter: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unexpected version banner from {interpreter}: `{banner}`")]
    Banner { interpreter: PathBuf, banner: String },
    #[error("interpreter detection was canceled")]
    Canceled,
}

/// A detected Python runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PythonRuntime {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    /// Path the interpreter was resolved to.
    pub interpreter: PathBuf,
}

impl PythonRuntime {
    /// Dotted version, e.g. `3.11.4`.
    pub fn version(&self) -> String {
        format!("{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl fmt::Display for PythonRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Python {}", self.version())
    }
}

/// Detect the host Python runtime, preferring `python3`.
pub async fn detect(cancel: &CancellationToken) -> Result<PythonRuntime, InterpreterError> {
    for candidate in CANDIDATES {
        if cancel.is_cancelled() {
            return Err(InterpreterError::Canceled);
        }
        let Ok(interpreter) = which::which(candidate) else {
            debug!("no `{candidate}` on PATH");
            continue;
        };
        let mut command = tokio::process::Command::new(&interpreter);
        command
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let output = tokio::select! {
            output = command.output() => output.map_err(|source| InterpreterError::Query {
                interpreter: interpreter.clone(),
                source,
            })?,
            () = cancel.cancelled() => return Err(InterpreterError::Canceled),
        };
        // Python 2 printed the banner on stderr.
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let banner = if stdout.trim().is_empty() {
            stderr
        } else {
            stdout
        };
        match parse_banner(&banner) {
            Some((major, minor, patch)) => {
                let runtime = PythonRuntime {
                    major,
                    minor,
                    patch,
                    interpreter,
                };
                debug!("detected {runtime} at {}", runtime.interpreter.display());
                return Ok(runtime);
            }
            None => {
                return Err(InterpreterError::Banner {
                    interpreter,
                    banner: banner.trim().to_string(),
                });
            }
        }
    }
    Err(InterpreterError::NotFound)
}

/// Parse `Python X.Y.Z` (patch optional, trailing qualifiers ignored).
fn parse_banner(banner: &str) -> Option<(u32, u32, u32)> {
    let rest = banner.trim().strip_prefix("Python ")?;
    let version = rest.split_whitespace().next()?;
    let mut parts = version.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    let patch = parts
        .next()
        .map(|raw| {
            // e.g. `3.13.0rc1`
            raw.chars()
                .take_while(char::is_ascii_digit)
                .collect::<String>()
        })
        .and_then(|digits| digits.parse().ok())
        .unwrap_or(0);
    Some((major, minor, patch))
}
