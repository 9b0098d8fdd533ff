//! Upload driver: publish extracted records as a new test run set.
//!
//! # Upload Flow
//!
//! 1. **Product**: resolve the product by name
//! 2. **Test run set**: create it with name, description, ref date and tags
//! 3. **Test runs**: for each record in name order, create a run named after
//!    the escaped test name, publish its results XML, then its log lines
//! 4. **Attachment**: publish the source TRX file on the test run set
//! 5. **Status**: mark the test run set as finished
//!
//! Each step is a separate remote call and the first failure aborts the
//! upload. Nothing already published is rolled back. With
//! [`Uploader::keep_going`] a failing record is reported and skipped
//! instead, and the test run set is finalized as
//! [`TestRunSetStatus::Exception`].

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::UploadContext;
use crate::naming::sanitize_test_name;
use crate::report::UploadReporter;
use crate::service::{
    NewTestRun, NewTestRunSet, ResultsService, ServiceError, TestRunSet, TestRunSetStatus,
};
use crate::trx::TestOutcomeRecord;

/// Description given to every created test run.
pub const TEST_RUN_DESCRIPTION: &str = "Description";

/// Description of the source file attachment.
pub const SOURCE_FILE_DESCRIPTION: &str = "Source TRX file";

/// Result type for upload operations.
pub type UploadResult<T> = Result<T, UploadError>;

/// A failed upload step.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Failed to source product info for '{product}': {source}")]
    ProductLookup {
        product: String,
        source: ServiceError,
    },

    #[error("Failed to create test run set: {0}")]
    RunSetCreation(#[source] ServiceError),

    #[error("Failed to create test run '{test_name}': {source}")]
    TestRunCreation {
        test_name: String,
        source: ServiceError,
    },

    #[error("Failed to publish results for '{test_name}': {source}")]
    ResultsPublish {
        test_name: String,
        source: ServiceError,
    },

    #[error("Failed to publish logs for '{test_name}': {source}")]
    LogPublish {
        test_name: String,
        source: ServiceError,
    },

    #[error("Failed to read source file {}: {source}", path.display())]
    AttachmentRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to publish source file: {0}")]
    AttachmentPublish(#[source] ServiceError),

    #[error("Failed to set test run set status: {0}")]
    StatusUpdate(#[source] ServiceError),
}

/// A record that could not be uploaded in keep-going mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedRecord {
    pub test_name: String,
    pub error: String,
}

/// Outcome of a finished upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSummary {
    pub run_set_id: u64,
    pub uploaded: usize,
    pub failed: Vec<FailedRecord>,
}

impl UploadSummary {
    fn new(run_set_id: u64) -> Self {
        Self {
            run_set_id,
            uploaded: 0,
            failed: Vec::new(),
        }
    }

    /// True when every record was uploaded.
    pub fn success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Build the XML payload published for a record: the result element
/// followed by its definition element, wrapped in `<test>`.
pub fn result_payload(record: &TestOutcomeRecord) -> String {
    let definition = record
        .definition
        .as_ref()
        .map(|d| d.markup.as_str())
        .unwrap_or_default();
    format!("<test>{}{}</test>", record.result_markup, definition)
}

/// Drives the upload of one TRX file against a [`ResultsService`].
pub struct Uploader<S, R> {
    service: S,
    reporter: R,
    keep_going: bool,
}

impl<S, R> Uploader<S, R>
where
    S: ResultsService,
    R: UploadReporter,
{
    pub fn new(service: S, reporter: R) -> Self {
        Self {
            service,
            reporter,
            keep_going: false,
        }
    }

    /// Continue past records that fail to upload instead of aborting.
    pub fn keep_going(mut self, keep_going: bool) -> Self {
        self.keep_going = keep_going;
        self
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Upload `records` as a new test run set and attach `source`.
    pub async fn upload(
        &self,
        context: &UploadContext,
        source: &Path,
        records: &[TestOutcomeRecord],
    ) -> UploadResult<UploadSummary> {
        info!("Using service: {}", self.service.name());

        let product = self
            .service
            .product(&context.product_name)
            .await
            .map_err(|source| UploadError::ProductLookup {
                product: context.product_name.clone(),
                source,
            })?;

        let request = NewTestRunSet {
            name: context.run_set_name.clone(),
            description: context.run_set_description.clone(),
            ref_date: context.ref_date,
            tags: context.tags.to_vec(),
        };
        let run_set = self
            .service
            .create_test_run_set(&product, &request)
            .await
            .map_err(UploadError::RunSetCreation)?;

        info!("Created test run set #{}", run_set.id);
        self.reporter.on_run_set_created(&run_set);

        let mut summary = UploadSummary::new(run_set.id);
        for (index, record) in records.iter().enumerate() {
            self.reporter.on_record_start(index + 1, record);

            match self.upload_record(context, &run_set, record).await {
                Ok(()) => summary.uploaded += 1,
                Err(e) => {
                    self.reporter.on_record_failed(record, &e);
                    if !self.keep_going {
                        return Err(e);
                    }

                    warn!("Skipping '{}': {}", record.test_name, e);
                    summary.failed.push(FailedRecord {
                        test_name: record.test_name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!("Uploading additional files");
        self.publish_source(&run_set, source).await?;

        let status = if summary.success() {
            TestRunSetStatus::Standard
        } else {
            TestRunSetStatus::Exception
        };
        self.service
            .set_status(&run_set, status)
            .await
            .map_err(UploadError::StatusUpdate)?;

        info!(
            "Upload complete: {} uploaded, {} failed",
            summary.uploaded,
            summary.failed.len()
        );
        self.reporter.on_upload_complete(&summary);

        Ok(summary)
    }

    async fn upload_record(
        &self,
        context: &UploadContext,
        run_set: &TestRunSet,
        record: &TestOutcomeRecord,
    ) -> UploadResult<()> {
        let request = NewTestRun {
            name: sanitize_test_name(&record.test_name),
            description: TEST_RUN_DESCRIPTION.to_string(),
            test_run_type: context.run_type.clone(),
            status: record.outcome.into(),
        };
        debug!("Creating test run '{}'", request.name);

        let run = self
            .service
            .create_test_run(run_set, &request)
            .await
            .map_err(|source| UploadError::TestRunCreation {
                test_name: record.test_name.clone(),
                source,
            })?;

        self.service
            .publish_results_xml(&run, &result_payload(record))
            .await
            .map_err(|source| UploadError::ResultsPublish {
                test_name: record.test_name.clone(),
                source,
            })?;

        if !record.log_lines.is_empty() {
            self.service
                .publish_log_messages(&run, &record.log_lines)
                .await
                .map_err(|source| UploadError::LogPublish {
                    test_name: record.test_name.clone(),
                    source,
                })?;
        }

        Ok(())
    }

    async fn publish_source(&self, run_set: &TestRunSet, source: &Path) -> UploadResult<()> {
        let content = tokio::fs::read(source)
            .await
            .map_err(|e| UploadError::AttachmentRead {
                path: source.to_path_buf(),
                source: e,
            })?;

        let file_name = source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| source.display().to_string());

        self.service
            .publish_additional_file(run_set, &file_name, SOURCE_FILE_DESCRIPTION, content)
            .await
            .map_err(UploadError::AttachmentPublish)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TagSet;
    use crate::report::NullReporter;
    use crate::service::TestRunStatus;
    use crate::service::recording::{Call, RecordingService};
    use crate::trx::{Outcome, TestDefinition};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn context() -> UploadContext {
        UploadContext {
            server: None,
            access_token: None,
            product_name: "widgets".to_string(),
            run_set_name: "Unit Tests".to_string(),
            run_set_description: "Nightly".to_string(),
            run_type: "Unit".to_string(),
            tags: ["ci"].into_iter().collect::<TagSet>(),
            ref_date: None,
        }
    }

    fn record(name: &str, outcome: Outcome, logs: &[&str]) -> TestOutcomeRecord {
        TestOutcomeRecord {
            test_id: Some(format!("id-{name}")),
            test_name: name.to_string(),
            outcome,
            definition: None,
            log_lines: logs.iter().map(|l| l.to_string()).collect(),
            result_markup: format!(r#"<UnitTestResult testName="{name}"/>"#),
        }
    }

    fn source() -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".trx").tempfile().unwrap();
        file.write_all(b"<TestRun/>").unwrap();
        file
    }

    fn created_runs(calls: &[Call]) -> Vec<NewTestRun> {
        calls
            .iter()
            .filter_map(|c| match c {
                Call::CreateTestRun { request, .. } => Some(request.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_result_payload_with_definition() {
        let mut r = record("A", Outcome::Passed, &[]);
        r.definition = Some(TestDefinition {
            id: Some("id-A".to_string()),
            name: Some("A".to_string()),
            markup: r#"<UnitTest id="id-A"/>"#.to_string(),
        });
        assert_eq!(
            result_payload(&r),
            r#"<test><UnitTestResult testName="A"/><UnitTest id="id-A"/></test>"#
        );
    }

    #[test]
    fn test_result_payload_without_definition() {
        let r = record("A", Outcome::Passed, &[]);
        assert_eq!(
            result_payload(&r),
            r#"<test><UnitTestResult testName="A"/></test>"#
        );
    }

    #[tokio::test]
    async fn test_upload_call_sequence() {
        let file = source();
        let records = vec![
            record("Ns.Alpha", Outcome::Passed, &["hello"]),
            record("Ns.Beta(1.5)", Outcome::Failed, &[]),
        ];

        let uploader = Uploader::new(RecordingService::new(), NullReporter);
        let summary = uploader
            .upload(&context(), file.path(), &records)
            .await
            .unwrap();

        assert_eq!(summary.uploaded, 2);
        assert!(summary.success());

        let calls = uploader.service().calls();
        let file_name = file.path().file_name().unwrap().to_string_lossy().into_owned();
        assert_eq!(
            calls,
            vec![
                Call::Product {
                    name: "widgets".to_string()
                },
                Call::CreateTestRunSet {
                    product: "widgets".to_string(),
                    name: "Unit Tests".to_string(),
                    description: "Nightly".to_string(),
                    ref_date: None,
                    tags: vec!["ci".to_string()],
                },
                Call::CreateTestRun {
                    run_set: 1,
                    request: NewTestRun {
                        name: "Ns\\Alpha".to_string(),
                        description: TEST_RUN_DESCRIPTION.to_string(),
                        test_run_type: "Unit".to_string(),
                        status: TestRunStatus::Passed,
                    },
                },
                Call::PublishResultsXml {
                    run: 2,
                    xml: r#"<test><UnitTestResult testName="Ns.Alpha"/></test>"#.to_string(),
                },
                Call::PublishLogMessages {
                    run: 2,
                    lines: vec!["hello".to_string()],
                },
                Call::CreateTestRun {
                    run_set: 1,
                    request: NewTestRun {
                        name: "Ns\\Beta\\(1.5)".to_string(),
                        description: TEST_RUN_DESCRIPTION.to_string(),
                        test_run_type: "Unit".to_string(),
                        status: TestRunStatus::Failed,
                    },
                },
                Call::PublishResultsXml {
                    run: 3,
                    xml: r#"<test><UnitTestResult testName="Ns.Beta(1.5)"/></test>"#.to_string(),
                },
                Call::PublishAdditionalFile {
                    run_set: 1,
                    file_name,
                    description: SOURCE_FILE_DESCRIPTION.to_string(),
                    content: b"<TestRun/>".to_vec(),
                },
                Call::SetStatus {
                    run_set: 1,
                    status: TestRunSetStatus::Standard,
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_product_not_found_aborts() {
        let file = source();
        let uploader = Uploader::new(
            RecordingService::new().with_products(["other"]),
            NullReporter,
        );

        let err = uploader
            .upload(&context(), file.path(), &[record("A", Outcome::Passed, &[])])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            UploadError::ProductLookup {
                source: ServiceError::ProductNotFound(_),
                ..
            }
        ));
        assert_eq!(uploader.service().calls().len(), 1);
    }

    #[tokio::test]
    async fn test_failing_record_aborts_remaining() {
        let file = source();
        let records = vec![
            record("A", Outcome::Passed, &[]),
            record("B", Outcome::Passed, &[]),
            record("C", Outcome::Passed, &[]),
        ];
        let uploader = Uploader::new(RecordingService::new().fail_test_run("B"), NullReporter);

        let err = uploader
            .upload(&context(), file.path(), &records)
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::TestRunCreation { ref test_name, .. } if test_name == "B"));

        let calls = uploader.service().calls();
        let names: Vec<String> = created_runs(&calls).into_iter().map(|r| r.name).collect();
        assert_eq!(names, ["A", "B"]);
        assert!(!calls.iter().any(|c| matches!(c, Call::PublishAdditionalFile { .. })));
        assert!(!calls.iter().any(|c| matches!(c, Call::SetStatus { .. })));
    }

    /// Collects the names of records reported as failed.
    #[derive(Default)]
    struct FailureLog(std::sync::Mutex<Vec<String>>);

    impl UploadReporter for &FailureLog {
        fn on_run_set_created(&self, _run_set: &TestRunSet) {}
        fn on_record_start(&self, _position: usize, _record: &TestOutcomeRecord) {}
        fn on_record_failed(&self, record: &TestOutcomeRecord, _error: &UploadError) {
            self.0.lock().unwrap().push(record.test_name.clone());
        }
        fn on_upload_complete(&self, _summary: &UploadSummary) {}
    }

    #[tokio::test]
    async fn test_fail_fast_reports_failed_record() {
        let file = source();
        let records = vec![
            record("A", Outcome::Passed, &[]),
            record("B", Outcome::Passed, &[]),
        ];
        let failures = FailureLog::default();
        let uploader = Uploader::new(RecordingService::new().fail_test_run("A"), &failures);

        assert!(uploader.upload(&context(), file.path(), &records).await.is_err());
        assert_eq!(*failures.0.lock().unwrap(), ["A"]);
    }

    #[tokio::test]
    async fn test_keep_going_skips_failures() {
        let file = source();
        let records = vec![
            record("A", Outcome::Passed, &[]),
            record("B", Outcome::Passed, &[]),
            record("C", Outcome::Failed, &[]),
        ];
        let uploader = Uploader::new(RecordingService::new().fail_test_run("B"), NullReporter)
            .keep_going(true);

        let summary = uploader
            .upload(&context(), file.path(), &records)
            .await
            .unwrap();

        assert_eq!(summary.uploaded, 2);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].test_name, "B");
        assert!(!summary.success());

        let calls = uploader.service().calls();
        assert_eq!(created_runs(&calls).len(), 3);
        assert_eq!(
            calls.last(),
            Some(&Call::SetStatus {
                run_set: 1,
                status: TestRunSetStatus::Exception,
            })
        );
    }

    #[tokio::test]
    async fn test_empty_upload_still_finalizes() {
        let file = source();
        let uploader = Uploader::new(RecordingService::new(), NullReporter);

        let summary = uploader.upload(&context(), file.path(), &[]).await.unwrap();
        assert_eq!(summary.uploaded, 0);

        let calls = uploader.service().calls();
        assert!(created_runs(&calls).is_empty());
        assert!(matches!(calls.last(), Some(Call::SetStatus { .. })));
    }

    #[tokio::test]
    async fn test_missing_source_fails_attachment() {
        let uploader = Uploader::new(RecordingService::new(), NullReporter);
        let err = uploader
            .upload(&context(), Path::new("/no/such/file.trx"), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::AttachmentRead { .. }));
    }
}
