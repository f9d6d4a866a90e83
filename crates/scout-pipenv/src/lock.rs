//! `Pipfile.lock` parsing and constraint derivation.

use indexmap::IndexMap;
use serde::Deserialize;

use scout_normalize::PackageName;

/// A parsed `Pipfile.lock`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PipfileLock {
    #[serde(default, rename = "_meta")]
    pub meta: Option<serde_json::Value>,
    #[serde(default)]
    pub default: IndexMap<String, LockEntry>,
    #[serde(default)]
    pub develop: IndexMap<String, LockEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LockEntry {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub hashes: Vec<String>,
    #[serde(default)]
    pub markers: Option<String>,
    #[serde(default)]
    pub index: Option<String>,
    #[serde(default)]
    pub extras: Vec<String>,
    #[serde(default)]
    pub git: Option<String>,
    #[serde(default, rename = "ref")]
    pub git_ref: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub editable: bool,
}

impl PipfileLock {
    pub fn from_json(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(contents)
    }

    /// Derive `name==version` constraint lines from the pinned sections.
    ///
    /// Git and path entries carry no registry version, so they are omitted;
    /// develop packages join only when `include_dev` is set.
    pub fn constraints(&self, include_dev: bool) -> Vec<String> {
        let mut lines = Vec::new();
        collect(&self.default, &mut lines);
        if include_dev {
            collect(&self.develop, &mut lines);
        }
        lines
    }
}

fn collect(section: &IndexMap<String, LockEntry>, lines: &mut Vec<String>) {
    for (name, entry) in section {
        if entry.git.is_some() || entry.path.is_some() {
            continue;
        }
        let Some(version) = &entry.version else {
            continue;
        };
        let version = version.trim_start_matches("==");
        if version.is_empty() {
            continue;
        }
        lines.push(format!("{}=={version}", PackageName::new(name)));
    }
}
