//! Remote results service abstraction.
//!
//! The upload pipeline only needs a handful of calls against the results
//! server. They are modelled by the [`ResultsService`] trait so the driver
//! can run against the real HTTP client ([`conical::ConicalClient`]) or the
//! in-memory [`recording::RecordingService`] used for dry runs.
//!
//! ```text
//! product(name) ──► Product
//!                     │ create_test_run_set()
//!                     ▼
//!                 TestRunSet ──► publish_additional_file(), set_status()
//!                     │ create_test_run()
//!                     ▼
//!                  TestRun ──► publish_results_xml(), publish_log_messages()
//! ```
//!
//! Every call is a single request/response. Nothing is retried.

pub mod conical;
pub mod recording;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::trx::Outcome;

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors returned by a [`ResultsService`].
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The named product does not exist on the server.
    #[error("Product '{0}' not found")]
    ProductNotFound(String),

    /// The request could not be sent or the response could not be read.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("Server returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The configured server address cannot be used as a base URL.
    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),
}

/// Pass/fail status of an uploaded test run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestRunStatus {
    Passed,
    Failed,
}

impl From<Outcome> for TestRunStatus {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Passed => TestRunStatus::Passed,
            Outcome::Failed => TestRunStatus::Failed,
        }
    }
}

/// Lifecycle status of a test run set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestRunSetStatus {
    /// Upload finished normally.
    Standard,
    /// Upload finished but some test runs could not be published.
    Exception,
}

/// A product on the results server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Handle to a created test run set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRunSet {
    pub product: String,
    pub id: u64,
}

/// Handle to a created test run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRun {
    pub product: String,
    pub test_run_set: u64,
    pub id: u64,
}

/// Parameters for creating a test run set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTestRunSet {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ref_date: Option<NaiveDateTime>,
    pub tags: Vec<String>,
}

/// Parameters for creating a test run inside a set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTestRun {
    pub name: String,
    pub description: String,
    pub test_run_type: String,
    pub status: TestRunStatus,
}

/// The remote calls issued by the upload driver.
#[async_trait]
pub trait ResultsService: Send + Sync {
    /// Resolve a product by name.
    async fn product(&self, name: &str) -> ServiceResult<Product>;

    /// Create a new test run set under a product.
    async fn create_test_run_set(
        &self,
        product: &Product,
        request: &NewTestRunSet,
    ) -> ServiceResult<TestRunSet>;

    /// Create a test run inside a test run set.
    async fn create_test_run(
        &self,
        run_set: &TestRunSet,
        request: &NewTestRun,
    ) -> ServiceResult<TestRun>;

    /// Attach the XML results payload to a test run.
    async fn publish_results_xml(&self, run: &TestRun, xml: &str) -> ServiceResult<()>;

    /// Attach log lines to a test run.
    async fn publish_log_messages(&self, run: &TestRun, lines: &[String]) -> ServiceResult<()>;

    /// Attach a file to a test run set.
    async fn publish_additional_file(
        &self,
        run_set: &TestRunSet,
        file_name: &str,
        description: &str,
        content: Vec<u8>,
    ) -> ServiceResult<()>;

    /// Update the status of a test run set.
    async fn set_status(&self, run_set: &TestRunSet, status: TestRunSetStatus) -> ServiceResult<()>;

    /// Service name (for logging).
    fn name(&self) -> &str;
}
