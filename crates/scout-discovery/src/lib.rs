//! Walks a project tree looking for package-manager manifests.
//!
//! Matching is basename-scoped globbing (`*`, `?`, `[set]`); exclusion
//! patterns are additionally tried against the root-relative path so a
//! caller can exclude one specific directory. The walk prunes excluded
//! directories, dedupes by absolute path, and checks the cancellation token
//! on every entry.

use std::path::{Path, PathBuf};

use glob::Pattern;
use rustc_hash::FxHashSet;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use walkdir::WalkDir;

/// Directory names that are practically never project manifests' home:
/// VCS metadata, build output, vendored trees, virtualenvs.
pub const COMMON_EXCLUDES: &[&str] = &[
    ".*",
    "dist",
    "build",
    "node_modules",
    ".next",
    ".nuxt",
    "__pycache__",
    "*.egg-info",
    "*.dist-info",
    "venv",
    "env",
    "vendor",
    ".bundle",
    "Pods",
    "Carthage",
];

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("discovery requires a non-empty root directory")]
    EmptyRoot,
    #[error("discovery requires at least one target file or include pattern")]
    NoSelectors,
    #[error("invalid glob pattern `{pattern}`")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
    #[error("target file not found: {0}")]
    TargetNotFound(PathBuf),
    #[error("failed to resolve root directory {root}")]
    Root {
        root: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("discovery was canceled")]
    Canceled,
}

/// A manifest found during discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovered {
    pub absolute_path: PathBuf,
    /// Path relative to the discovery root.
    pub relative_path: PathBuf,
}

/// Accumulated discovery parameters.
#[derive(Debug, Default, Clone)]
pub struct FindOptions {
    target_files: Vec<PathBuf>,
    include_globs: Vec<String>,
    exclude_globs: Vec<String>,
    max_depth: Option<usize>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require a specific file, absolute or root-relative. It must exist;
    /// an excluded target is silently skipped.
    #[must_use]
    pub fn target_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.target_files.push(path.into());
        self
    }

    /// Include files whose basename matches the pattern.
    #[must_use]
    pub fn include_glob(mut self, pattern: impl Into<String>) -> Self {
        self.include_globs.push(pattern.into());
        self
    }

    #[must_use]
    pub fn include_globs<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include_globs.extend(patterns.into_iter().map(Into::into));
        self
    }

    /// Exclude entries whose basename or root-relative path matches. A
    /// matched directory is pruned, a matched file omitted.
    #[must_use]
    pub fn exclude_glob(mut self, pattern: impl Into<String>) -> Self {
        self.exclude_globs.push(pattern.into());
        self
    }

    #[must_use]
    pub fn exclude_globs<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_globs.extend(patterns.into_iter().map(Into::into));
        self
    }

    /// Add the fixed common-excludes set.
    #[must_use]
    pub fn common_excludes(self) -> Self {
        self.exclude_globs(COMMON_EXCLUDES.iter().copied())
    }

    /// Bound the walk depth (1 = the root directory's own entries).
    #[must_use]
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Whether discovery is pinned to explicit target files.
    pub fn has_target_files(&self) -> bool {
        !self.target_files.is_empty()
    }
}

struct Excludes {
    patterns: Vec<Pattern>,
}

impl Excludes {
    fn compile(globs: &[String]) -> Result<Self, DiscoveryError> {
        Ok(Self {
            patterns: compile(globs)?,
        })
    }

    /// An entry is excluded when any pattern matches its basename, or its
    /// path relative to the root.
    fn matches(&self, path: &Path, root: &Path) -> bool {
        if self.patterns.is_empty() {
            return false;
        }
        let basename = path.file_name().map(Path::new);
        let relative = path.strip_prefix(root).ok();
        self.patterns.iter().any(|pattern| {
            basename.is_some_and(|name| pattern.matches_path(name))
                || relative.is_some_and(|rel| pattern.matches_path(rel))
        })
    }

    /// Target files bypass the walk (and with it, directory pruning), so
    /// exclusion has to consider every path component under the root.
    fn matches_target(&self, path: &Path, root: &Path) -> bool {
        if self.patterns.is_empty() {
            return false;
        }
        let Ok(relative) = path.strip_prefix(root) else {
            return self.matches(path, root);
        };
        let mut prefix = PathBuf::new();
        for component in relative.components() {
            prefix.push(component);
            let name = Path::new(component.as_os_str());
            if self
                .patterns
                .iter()
                .any(|pattern| pattern.matches_path(name) || pattern.matches_path(&prefix))
            {
                return true;
            }
        }
        false
    }
}

fn compile(globs: &[String]) -> Result<Vec<Pattern>, DiscoveryError> {
    globs
        .iter()
        .map(|raw| {
            Pattern::new(raw).map_err(|source| DiscoveryError::InvalidPattern {
                pattern: raw.clone(),
                source,
            })
        })
        .collect()
}

/// Find manifests under `root` according to `options`.
///
/// Input validation failures are fatal; unreadable entries mid-walk are
/// logged and skipped. Results carry absolute paths even for a relative
/// root, deduplicated by absolute path.
pub fn find(
    root: &Path,
    options: &FindOptions,
    cancel: &CancellationToken,
) -> Result<Vec<Discovered>, DiscoveryError> {
    if root.as_os_str().is_empty() {
        return Err(DiscoveryError::EmptyRoot);
    }
    if options.target_files.is_empty() && options.include_globs.is_empty() {
        return Err(DiscoveryError::NoSelectors);
    }

    // Validate every pattern before touching the filesystem.
    let includes = compile(&options.include_globs)?;
    let excludes = Excludes::compile(&options.exclude_globs)?;

    let root = fs_err::canonicalize(root).map_err(|source| DiscoveryError::Root {
        root: root.to_path_buf(),
        source,
    })?;

    let mut seen = FxHashSet::default();
    let mut results = Vec::new();
    let mut push = |absolute: PathBuf, seen: &mut FxHashSet<PathBuf>, results: &mut Vec<Discovered>| {
        let relative = absolute
            .strip_prefix(&root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| absolute.clone());
        if seen.insert(absolute.clone()) {
            results.push(Discovered {
                absolute_path: absolute,
                relative_path: relative,
            });
        }
    };

    for target in &options.target_files {
        if cancel.is_cancelled() {
            return Err(DiscoveryError::Canceled);
        }
        let absolute = if target.is_absolute() {
            target.clone()
        } else {
            root.join(target)
        };
        let Ok(absolute) = fs_err::canonicalize(&absolute) else {
            return Err(DiscoveryError::TargetNotFound(target.clone()));
        };
        if !absolute.is_file() {
            return Err(DiscoveryError::TargetNotFound(target.clone()));
        }
        if excludes.matches_target(&absolute, &root) {
            debug!("target file excluded by pattern: {}", absolute.display());
            continue;
        }
        push(absolute, &mut seen, &mut results);
    }

    if includes.is_empty() {
        return Ok(results);
    }

    let mut walker = WalkDir::new(&root).follow_links(false);
    if let Some(depth) = options.max_depth {
        walker = walker.max_depth(depth);
    }
    let walk = walker.into_iter().filter_entry(|entry| {
        // The root itself is never excluded, whatever its name.
        entry.depth() == 0 || !excludes.matches(entry.path(), &root)
    });

    for entry in walk {
        if cancel.is_cancelled() {
            return Err(DiscoveryError::Canceled);
        }
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                debug!("skipping unreadable entry: {err}");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let basename = Path::new(entry.file_name());
        if includes.iter().any(|pattern| pattern.matches_path(basename)) {
            push(entry.into_path(), &mut seen, &mut results);
        }
    }

    Ok(results)
}
