//! Structured errors surfaced to the result stream.
//!
//! pip writes free-form diagnostics to stderr; consumers need stable error
//! kinds. [`classify_pip_failure`] maps stderr to a [`CatalogError`] by
//! ordered substring checks, with cancellation and deadline signals taking
//! precedence over the generic fallback.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod classify;

pub use classify::{CancelSignal, PipFailure, classify_pip_failure};

/// Stable error kinds understood by downstream consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    /// A requirement or version string pip could not parse.
    InvalidSyntax,
    /// No distribution satisfies the requested package.
    PackageNotFound,
    /// The resolved set requires a different Python version.
    UnsupportedPython,
    /// Mutually incompatible requirements.
    DependencyConflict,
    /// The invocation deadline elapsed mid-resolution.
    Timeout,
    /// pip failed for a reason we do not recognize.
    InstallFailure,
    /// A required manifest (or its lockfile) is missing.
    ManifestNotFound,
    /// A lockfile exists but could not be parsed.
    UnparseableLockfile,
    /// A required runtime (Python itself) is unavailable.
    InstallationFailure,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidSyntax => "invalid-syntax",
            Self::PackageNotFound => "package-not-found",
            Self::UnsupportedPython => "unsupported-python",
            Self::DependencyConflict => "dependency-conflict",
            Self::Timeout => "timeout",
            Self::InstallFailure => "install-failure",
            Self::ManifestNotFound => "manifest-not-found",
            Self::UnparseableLockfile => "unparseable-lockfile",
            Self::InstallationFailure => "installation-failure",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A catalog error: a stable kind plus a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct CatalogError {
    pub kind: ErrorKind,
    pub message: String,
    /// Raw diagnostic excerpt, when one exists (e.g. trimmed pip stderr).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl CatalogError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: None,
        }
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn manifest_not_found(path: impl fmt::Display) -> Self {
        Self::new(
            ErrorKind::ManifestNotFound,
            format!("manifest not found: {path}"),
        )
    }

    pub fn unparseable_lockfile(path: impl fmt::Display, reason: impl fmt::Display) -> Self {
        Self::new(
            ErrorKind::UnparseableLockfile,
            format!("failed to parse lockfile {path}"),
        )
        .with_detail(reason.to_string())
    }

    pub fn python_not_installed(reason: impl fmt::Display) -> Self {
        Self::new(
            ErrorKind::InstallationFailure,
            "no usable Python runtime found",
        )
        .with_detail(reason.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::{CatalogError, ErrorKind};

    #[test]
    fn kinds_serialize_kebab_case() {
        let err = CatalogError::new(ErrorKind::UnparseableLockfile, "bad lock");
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["kind"], "unparseable-lockfile");
        assert!(value.get("detail").is_none());
    }

    #[test]
    fn detail_round_trips() {
        let err = CatalogError::new(ErrorKind::Timeout, "deadline elapsed").with_detail("120s");
        let back: CatalogError = serde_json::from_str(&serde_json::to_string(&err).unwrap()).unwrap();
        assert_eq!(back, err);
    }
}
