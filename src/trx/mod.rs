//! TRX result file loading and record extraction.
//!
//! A TRX file is the XML test result format written by `dotnet test` and
//! `vstest.console`. Two sections matter for uploading:
//!
//! ```xml
//! <TestRun xmlns="http://microsoft.com/schemas/VisualStudio/TeamTest/2010">
//!   <Results>
//!     <UnitTestResult testId="..." testName="Suite.Test" outcome="Passed">
//!       <Output><StdOut>line 1
//! line 2</StdOut></Output>
//!     </UnitTestResult>
//!   </Results>
//!   <TestDefinitions>
//!     <UnitTest id="..." name="Suite.Test" />
//!   </TestDefinitions>
//! </TestRun>
//! ```
//!
//! Results and definitions are cross-referenced by `testId` / `id`. The
//! [`extract`] module joins them into flat [`TestOutcomeRecord`]s ready
//! for upload.

pub mod document;
pub mod extract;

use std::path::PathBuf;

pub use document::{Element, TrxDocument};
pub use extract::{Extraction, extract, index_definitions};

/// Result type for TRX operations.
pub type TrxResult<T> = Result<T, TrxError>;

/// Errors that can occur while loading or reading a TRX file.
#[derive(Debug, thiserror::Error)]
pub enum TrxError {
    #[error("Source file '{}' doesn't exist", .0.display())]
    FileNotFound(PathBuf),

    #[error("Failed to parse TRX: {0}")]
    Parse(String),

    #[error("Failed to serialize TRX markup: {0}")]
    Serialize(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Binary pass/fail classification of a TRX outcome string.
///
/// TRX knows many outcomes (`Passed`, `Failed`, `Timeout`, `Aborted`,
/// `Inconclusive`, ...). Only `Passed` counts as a pass; everything else,
/// including a missing attribute, is a failure. `NotExecuted` results are
/// filtered out before classification, see [`is_not_executed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    Failed,
}

impl Outcome {
    /// Classify a raw `outcome` attribute value.
    pub fn from_trx(raw: Option<&str>) -> Self {
        match raw {
            Some(value) if eq_ignore_case(value, "Passed") => Outcome::Passed,
            _ => Outcome::Failed,
        }
    }
}

/// Returns true for results that never ran and must not be uploaded.
pub fn is_not_executed(raw: Option<&str>) -> bool {
    raw.is_some_and(|value| eq_ignore_case(value, "NotExecuted"))
}

fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// A `UnitTest` entry from the `TestDefinitions` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestDefinition {
    pub id: Option<String>,
    pub name: Option<String>,
    /// Serialized `UnitTest` element, included in the uploaded payload.
    pub markup: String,
}

/// One executed test, ready to be uploaded as a test run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestOutcomeRecord {
    pub test_id: Option<String>,
    /// Display name; empty when the result carries no `testName`.
    pub test_name: String,
    pub outcome: Outcome,
    pub definition: Option<TestDefinition>,
    /// Captured standard output, one entry per line.
    pub log_lines: Vec<String>,
    /// Serialized `UnitTestResult` element.
    pub result_markup: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_passed_any_case() {
        assert_eq!(Outcome::from_trx(Some("Passed")), Outcome::Passed);
        assert_eq!(Outcome::from_trx(Some("passed")), Outcome::Passed);
        assert_eq!(Outcome::from_trx(Some("PASSED")), Outcome::Passed);
    }

    #[test]
    fn test_outcome_everything_else_fails() {
        for raw in ["Failed", "Timeout", "Aborted", "Inconclusive", "", "Pass"] {
            assert_eq!(Outcome::from_trx(Some(raw)), Outcome::Failed, "{raw}");
        }
        assert_eq!(Outcome::from_trx(None), Outcome::Failed);
    }

    #[test]
    fn test_not_executed_detection() {
        assert!(is_not_executed(Some("NotExecuted")));
        assert!(is_not_executed(Some("notexecuted")));
        assert!(is_not_executed(Some("NOTEXECUTED")));
        assert!(!is_not_executed(Some("Passed")));
        assert!(!is_not_executed(Some("")));
        assert!(!is_not_executed(None));
    }
}
