use crate::{CatalogError, ErrorKind};

/// Cooperative-cancellation state observed when pip failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelSignal {
    /// The caller canceled the invocation.
    Canceled,
    /// The caller's deadline elapsed.
    DeadlineExceeded,
}

/// Outcome of classifying a failed pip invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipFailure {
    /// A plain cancellation, deliberately not a catalog error.
    Canceled,
    Catalog(CatalogError),
}

/// Substring patterns checked in order; first match wins.
const SYNTAX: &[&str] = &[
    "Invalid requirement",
    "Could not parse",
    "invalid requirement",
    "InvalidVersion",
    "Invalid version",
];
const NOT_FOUND: &[&str] = &["Could not find a version", "No matching distribution"];
const UNSUPPORTED_PYTHON: &[&str] = &["requires Python", "Requires-Python"];
const CONFLICT: &[&str] = &["Conflict", "conflicting", "incompatible"];

/// Map pip stderr (plus the observed cancellation state) to a failure.
pub fn classify_pip_failure(stderr: &str, signal: Option<CancelSignal>) -> PipFailure {
    let excerpt = excerpt(stderr);

    if contains_any(stderr, SYNTAX) {
        return catalog(ErrorKind::InvalidSyntax, "pip rejected a requirement", excerpt);
    }
    if contains_any(stderr, NOT_FOUND) {
        return catalog(
            ErrorKind::PackageNotFound,
            "no matching distribution found",
            excerpt,
        );
    }
    if contains_any(stderr, UNSUPPORTED_PYTHON) {
        return catalog(
            ErrorKind::UnsupportedPython,
            "resolved packages require a different Python version",
            excerpt,
        );
    }
    if contains_any(stderr, CONFLICT) {
        return catalog(
            ErrorKind::DependencyConflict,
            "requirements are mutually incompatible",
            excerpt,
        );
    }
    match signal {
        Some(CancelSignal::Canceled) => PipFailure::Canceled,
        Some(CancelSignal::DeadlineExceeded) => catalog(
            ErrorKind::Timeout,
            "pip did not finish before the deadline",
            excerpt,
        ),
        None => catalog(ErrorKind::InstallFailure, "pip failed to resolve", excerpt),
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

fn catalog(kind: ErrorKind, message: &str, excerpt: Option<String>) -> PipFailure {
    let mut err = CatalogError::new(kind, message);
    if let Some(excerpt) = excerpt {
        err = err.with_detail(excerpt);
    }
    PipFailure::Catalog(err)
}

/// Last non-empty stderr line, which is where pip puts its verdict.
fn excerpt(stderr: &str) -> Option<String> {
    stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::{CancelSignal, PipFailure, classify_pip_failure};
    use crate::ErrorKind;

    #[test_case("ERROR: Invalid requirement: 'flask==='", ErrorKind::InvalidSyntax)]
    #[test_case("pip._vendor.packaging.version.InvalidVersion: '1.x'", ErrorKind::InvalidSyntax)]
    #[test_case(
        "ERROR: Could not find a version that satisfies the requirement nopkg",
        ErrorKind::PackageNotFound
    )]
    #[test_case("ERROR: No matching distribution found for nopkg", ErrorKind::PackageNotFound)]
    #[test_case("ERROR: Package 'foo' requires Python '>=3.12'", ErrorKind::UnsupportedPython)]
    #[test_case("Ignoring foo: markers ... Requires-Python", ErrorKind::UnsupportedPython)]
    #[test_case("ERROR: Cannot install a and b: conflicting dependencies", ErrorKind::DependencyConflict)]
    #[test_case("these package versions are incompatible", ErrorKind::DependencyConflict)]
    #[test_case("something else entirely went wrong", ErrorKind::InstallFailure)]
    fn stderr_patterns(stderr: &str, expected: ErrorKind) {
        match classify_pip_failure(stderr, None) {
            PipFailure::Catalog(err) => assert_eq!(err.kind, expected),
            PipFailure::Canceled => panic!("unexpected cancellation"),
        }
    }

    #[test]
    fn patterns_win_over_signals() {
        // A recognizable stderr keeps its kind even if the context was
        // canceled while pip was exiting.
        let failure = classify_pip_failure(
            "ERROR: No matching distribution found for nopkg",
            Some(CancelSignal::Canceled),
        );
        assert!(matches!(
            failure,
            PipFailure::Catalog(err) if err.kind == ErrorKind::PackageNotFound
        ));
    }

    #[test]
    fn cancellation_is_not_a_catalog_error() {
        assert_eq!(
            classify_pip_failure("", Some(CancelSignal::Canceled)),
            PipFailure::Canceled
        );
    }

    #[test]
    fn deadline_maps_to_timeout() {
        match classify_pip_failure("", Some(CancelSignal::DeadlineExceeded)) {
            PipFailure::Catalog(err) => assert_eq!(err.kind, ErrorKind::Timeout),
            PipFailure::Canceled => panic!("expected timeout"),
        }
    }

    #[test]
    fn detail_keeps_the_last_stderr_line() {
        let stderr = "Collecting flask\n  Downloading ...\nERROR: boom\n";
        match classify_pip_failure(stderr, None) {
            PipFailure::Catalog(err) => assert_eq!(err.detail.as_deref(), Some("ERROR: boom")),
            PipFailure::Canceled => panic!("expected catalog error"),
        }
    }
}
