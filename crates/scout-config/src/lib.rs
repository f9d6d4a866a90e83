//! Options for one orchestrator invocation.
//!
//! A closed record: plain structs with optional fields and a builder, not a
//! key/value map. Unknown keys are rejected when options arrive over the
//! wire (`deny_unknown_fields`). Options are read-only for the duration of
//! an invocation; resolvers clone them to inject a per-file target.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase", default)]
pub struct Options {
    pub global: GlobalOptions,
    pub python: PythonOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase", default)]
pub struct GlobalOptions {
    /// Resolve exactly this manifest instead of discovering one.
    pub target_file: Option<PathBuf>,
    /// Walk the whole tree instead of the project root only.
    pub all_projects: bool,
    /// Include development dependency groups.
    pub include_dev: bool,
    /// Extra exclusion globs applied during discovery.
    pub exclude: Vec<String>,
    /// Flags forwarded verbatim to the fallback resolver.
    pub raw_flags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase", default)]
pub struct PythonOptions {
    /// Pass `--no-build-isolation` to pip.
    pub no_build_isolation: bool,
}

impl Options {
    pub fn builder() -> OptionsBuilder {
        OptionsBuilder::default()
    }

    /// Clone these options with `global.target_file` replaced, the way the
    /// orchestrator scopes options to a single matched manifest.
    #[must_use]
    pub fn for_target(&self, target_file: impl Into<PathBuf>) -> Self {
        let mut options = self.clone();
        options.global.target_file = Some(target_file.into());
        options
    }
}

#[derive(Debug, Default)]
pub struct OptionsBuilder {
    options: Options,
}

impl OptionsBuilder {
    #[must_use]
    pub fn target_file(mut self, target_file: impl Into<PathBuf>) -> Self {
        self.options.global.target_file = Some(target_file.into());
        self
    }

    #[must_use]
    pub fn all_projects(mut self, all_projects: bool) -> Self {
        self.options.global.all_projects = all_projects;
        self
    }

    #[must_use]
    pub fn include_dev(mut self, include_dev: bool) -> Self {
        self.options.global.include_dev = include_dev;
        self
    }

    #[must_use]
    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.options.global.exclude.push(pattern.into());
        self
    }

    #[must_use]
    pub fn raw_flag(mut self, flag: impl Into<String>) -> Self {
        self.options.global.raw_flags.push(flag.into());
        self
    }

    #[must_use]
    pub fn no_build_isolation(mut self, no_build_isolation: bool) -> Self {
        self.options.python.no_build_isolation = no_build_isolation;
        self
    }

    pub fn build(self) -> Options {
        self.options
    }
}

#[cfg(test)]
mod tests {
    use super::Options;

    #[test]
    fn builder_accumulates() {
        let options = Options::builder()
            .all_projects(true)
            .include_dev(true)
            .exclude("tests")
            .exclude("docs")
            .raw_flag("--debug")
            .no_build_isolation(true)
            .build();
        assert!(options.global.all_projects);
        assert!(options.global.include_dev);
        assert_eq!(options.global.exclude, ["tests", "docs"]);
        assert_eq!(options.global.raw_flags, ["--debug"]);
        assert!(options.python.no_build_isolation);
    }

    #[test]
    fn for_target_leaves_the_original_untouched() {
        let options = Options::builder().all_projects(true).build();
        let scoped = options.for_target("app/requirements.txt");
        assert_eq!(options.global.target_file, None);
        assert_eq!(
            scoped.global.target_file.as_deref(),
            Some(std::path::Path::new("app/requirements.txt"))
        );
        assert!(scoped.global.all_projects);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = serde_json::from_str::<Options>(r#"{"global": {"allProjects": true, "frobnicate": 1}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("frobnicate"));
    }

    #[test]
    fn wire_names_are_camel_case() {
        let options: Options =
            serde_json::from_str(r#"{"global": {"includeDev": true}, "python": {"noBuildIsolation": true}}"#)
                .unwrap();
        assert!(options.global.include_dev);
        assert!(options.python.no_build_isolation);
    }
}
