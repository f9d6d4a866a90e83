//! `Pipfile` parsing and requirement rendering.
//!
//! Only package *names* (plus extras) are handed to pip; versions are
//! enforced through the lockfile-derived constraints file instead, so the
//! two sources cannot contradict each other on the command line.

use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::Deserialize;

/// A parsed `Pipfile`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Pipfile {
    #[serde(default)]
    pub source: Vec<Source>,
    #[serde(default)]
    pub packages: IndexMap<String, PackageSpec>,
    #[serde(default, rename = "dev-packages")]
    pub dev_packages: IndexMap<String, PackageSpec>,
    #[serde(default)]
    pub requires: Option<Requires>,
}

impl Pipfile {
    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Source {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub verify_ssl: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Requires {
    #[serde(default)]
    pub python_version: Option<String>,
    #[serde(default)]
    pub python_full_version: Option<String>,
}

/// A package entry: either a bare version spec (`"==2.28.1"`, `"*"`) or a
/// table of source attributes.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PackageSpec {
    Version(String),
    Table(PackageTable),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackageTable {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub extras: Vec<String>,
    #[serde(default)]
    pub markers: Option<String>,
    #[serde(default)]
    pub git: Option<String>,
    #[serde(default, rename = "ref")]
    pub git_ref: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub editable: bool,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub index: Option<String>,
}

static SYS_PLATFORM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"sys_platform\s*(==|!=)\s*['"]([A-Za-z0-9_]+)['"]"#).expect("valid marker regex")
});

/// Map the host OS to Python's `sys.platform` value.
pub fn host_platform() -> &'static str {
    match std::env::consts::OS {
        "windows" => "win32",
        "macos" => "darwin",
        other => other,
    }
}

/// Whether an entry applies on `platform`, judging only its `sys_platform`
/// marker. Every other marker passes through for pip to evaluate.
fn applies_on(table: &PackageTable, platform: &str) -> bool {
    let Some(markers) = &table.markers else {
        return true;
    };
    let Some(captures) = SYS_PLATFORM.captures(markers) else {
        return true;
    };
    let wanted = &captures[2];
    match &captures[1] {
        "==" => platform == wanted,
        _ => platform != wanted,
    }
}

/// Render one Pipfile entry into pip command-line arguments, or `None` when
/// the entry does not apply on `platform`.
///
/// Name-only form by design: `name[extras]` for registry packages,
/// `name @ git+<url>[@ref]` for git sources, `-e <path>`/`<path>` for local
/// trees, and the raw URL for direct URLs.
pub fn requirement_args(name: &str, spec: &PackageSpec, platform: &str) -> Option<Vec<String>> {
    let table = match spec {
        PackageSpec::Version(_) => return Some(vec![name.to_string()]),
        PackageSpec::Table(table) => table,
    };
    if !applies_on(table, platform) {
        return None;
    }
    if let Some(git) = &table.git {
        let reference = table
            .git_ref
            .as_deref()
            .or(table.tag.as_deref())
            .or(table.branch.as_deref());
        let requirement = match reference {
            Some(reference) => format!("{name} @ git+{git}@{reference}"),
            None => format!("{name} @ git+{git}"),
        };
        return Some(vec![requirement]);
    }
    if let Some(path) = &table.path {
        return Some(if table.editable {
            vec!["-e".to_string(), path.clone()]
        } else {
            vec![path.clone()]
        });
    }
    if let Some(url) = &table.url {
        return Some(vec![url.clone()]);
    }
    if table.extras.is_empty() {
        Some(vec![name.to_string()])
    } else {
        Some(vec![format!("{name}[{}]", table.extras.join(","))])
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use test_case::test_case;

    use super::{PackageSpec, PackageTable, Pipfile, requirement_args};

    const PIPFILE: &str = indoc! {r#"
        [[source]]
        url = "https://pypi.org/simple"
        verify_ssl = true
        name = "pypi"

        [packages]
        requests = { version = "==2.28.1", extras = ["security"] }
        flask = "*"
        pywin32 = { version = "==306", markers = "sys_platform == 'win32'" }
        records = { git = "https://github.com/kennethreitz/records.git", ref = "v0.5.2" }
        local-pkg = { path = "./vendor/local-pkg", editable = true }
        direct = { url = "https://example.invalid/direct-1.0.tar.gz" }

        [dev-packages]
        pytest = ">=7.0"

        [requires]
        python_version = "3.11"
    "#};

    #[test]
    fn pipfile_parses_both_entry_shapes() {
        let pipfile = Pipfile::from_toml(PIPFILE).unwrap();
        assert_eq!(pipfile.packages.len(), 6);
        assert_eq!(pipfile.dev_packages.len(), 1);
        assert_eq!(
            pipfile.requires.unwrap().python_version.as_deref(),
            Some("3.11")
        );
        assert!(matches!(&pipfile.packages["flask"], PackageSpec::Version(v) if v == "*"));
    }

    #[test]
    fn versions_are_never_rendered() {
        let pipfile = Pipfile::from_toml(PIPFILE).unwrap();
        let args = requirement_args("requests", &pipfile.packages["requests"], "linux").unwrap();
        assert_eq!(args, ["requests[security]"]);
        let args = requirement_args("pytest", &pipfile.dev_packages["pytest"], "linux").unwrap();
        assert_eq!(args, ["pytest"]);
    }

    #[test_case("linux", false)]
    #[test_case("darwin", false)]
    #[test_case("win32", true)]
    fn platform_marker_gates_inclusion(platform: &str, included: bool) {
        let pipfile = Pipfile::from_toml(PIPFILE).unwrap();
        let args = requirement_args("pywin32", &pipfile.packages["pywin32"], platform);
        assert_eq!(args.is_some(), included);
    }

    #[test]
    fn negated_platform_marker() {
        let spec: PackageSpec =
            toml::from_str::<PackageTable>(r#"markers = "sys_platform != 'win32'""#)
                .map(PackageSpec::Table)
                .unwrap();
        assert!(requirement_args("x", &spec, "linux").is_some());
        assert!(requirement_args("x", &spec, "win32").is_none());
    }

    #[test]
    fn other_markers_pass_through() {
        let spec = PackageSpec::Table(
            toml::from_str::<PackageTable>(r#"markers = "python_version >= '3.8'""#).unwrap(),
        );
        assert_eq!(requirement_args("x", &spec, "linux").unwrap(), ["x"]);
    }

    #[test]
    fn git_path_and_url_forms() {
        let pipfile = Pipfile::from_toml(PIPFILE).unwrap();
        assert_eq!(
            requirement_args("records", &pipfile.packages["records"], "linux").unwrap(),
            ["records @ git+https://github.com/kennethreitz/records.git@v0.5.2"]
        );
        assert_eq!(
            requirement_args("local-pkg", &pipfile.packages["local-pkg"], "linux").unwrap(),
            ["-e", "./vendor/local-pkg"]
        );
        assert_eq!(
            requirement_args("direct", &pipfile.packages["direct"], "linux").unwrap(),
            ["https://example.invalid/direct-1.0.tar.gz"]
        );
    }

    #[test]
    fn git_without_ref_prefers_tag_then_branch() {
        let table = |s: &str| PackageSpec::Table(toml::from_str::<PackageTable>(s).unwrap());
        assert_eq!(
            requirement_args(
                "x",
                &table(r#"git = "https://host/x.git""#),
                "linux"
            )
            .unwrap(),
            ["x @ git+https://host/x.git"]
        );
        assert_eq!(
            requirement_args(
                "x",
                &table(r#"git = "https://host/x.git"
                          tag = "v1.0"
                          branch = "main""#),
                "linux"
            )
            .unwrap(),
            ["x @ git+https://host/x.git@v1.0"]
        );
    }
}
