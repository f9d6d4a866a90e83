//! The pip dry-run installation report and its dependency strings.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use scout_normalize::{ExtraName, PackageName};

/// `pip install --report` output, reduced to the fields we consume.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PipReport {
    #[serde(default)]
    pub install: Vec<InstallItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstallItem {
    pub metadata: InstallMetadata,
    /// Whether the package was requested directly (a root dependency).
    #[serde(default)]
    pub requested: bool,
    #[serde(default)]
    pub requested_extras: Vec<ExtraName>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstallMetadata {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub requires_dist: Vec<String>,
}

impl PipReport {
    pub fn from_json(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }
}

/// A parsed `Requires-Dist` entry: the target package, plus the extra the
/// dependency is conditional on, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyRef {
    pub name: PackageName,
    pub extra_marker: Option<ExtraName>,
}

static NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._-]+").expect("valid name regex"));
// Either quote style, flexible whitespace, case-insensitive.
static EXTRA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)extra\s*==\s*['"]([^'"]*)['"]"#).expect("valid extra regex")
});

/// Parse a dependency string such as
/// `pytest (>=6.0) ; extra == "test" and python_version >= "3.8"`.
///
/// Only the leading package name and the `extra` marker matter at this
/// layer; pip has already evaluated platform and Python-version markers.
pub fn parse_dependency(raw: &str) -> Option<DependencyRef> {
    let raw = raw.trim();
    let name = NAME.find(raw)?.as_str();
    let extra_marker = raw
        .split_once(';')
        .and_then(|(_, markers)| EXTRA.captures(markers))
        .map(|captures| ExtraName::new(&captures[1]));
    Some(DependencyRef {
        name: PackageName::new(name),
        extra_marker,
    })
}
