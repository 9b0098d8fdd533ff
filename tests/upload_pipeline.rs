//! End-to-end upload of a TRX file against the recording service.

use std::io::Write;

use tempfile::NamedTempFile;

use trx_uploader::config::{self, Overrides, UploadSettings};
use trx_uploader::report::NullReporter;
use trx_uploader::service::recording::{Call, RecordingService};
use trx_uploader::service::{ServiceError, TestRunSetStatus, TestRunStatus};
use trx_uploader::trx::{self, TrxDocument};
use trx_uploader::upload::{SOURCE_FILE_DESCRIPTION, TEST_RUN_DESCRIPTION, UploadError, Uploader};

const TRX: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<TestRun id="run-1" name="nightly" xmlns="http://microsoft.com/schemas/VisualStudio/TeamTest/2010">
  <Results>
    <UnitTestResult testId="t3" testName="Suite.Zeta" outcome="Failed">
      <Output>
        <StdOut>expected 1
got 2</StdOut>
      </Output>
    </UnitTestResult>
    <UnitTestResult testId="t2" testName="Suite.Skipped" outcome="NotExecuted" />
    <UnitTestResult testId="t1" testName="Suite.Alpha(1.5)" outcome="Passed" />
  </Results>
  <TestDefinitions>
    <UnitTest id="t1" name="Suite.Alpha(1.5)" />
    <UnitTest id="t3" name="Suite.Zeta" />
  </TestDefinitions>
</TestRun>
"#;

fn trx_file() -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".trx").tempfile().unwrap();
    file.write_all(TRX.as_bytes()).unwrap();
    file
}

fn invocation(file: &NamedTempFile) -> config::Invocation {
    config::resolve(
        &UploadSettings::default(),
        Overrides {
            product: Some("widgets".to_string()),
            test_run_type: Some("Unit".to_string()),
            tags: vec!["nightly".to_string()],
            source: Some(file.path().to_path_buf()),
            ..Default::default()
        },
    )
    .unwrap()
}

fn created_run_names(calls: &[Call]) -> Vec<(String, TestRunStatus)> {
    calls
        .iter()
        .filter_map(|c| match c {
            Call::CreateTestRun { request, .. } => Some((request.name.clone(), request.status)),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_uploads_executed_results_in_name_order() {
    let file = trx_file();
    let invocation = invocation(&file);
    let document = TrxDocument::load(&invocation.source).unwrap();
    let extraction = trx::extract(&document).unwrap();
    assert_eq!(extraction.not_executed, 1);

    let uploader = Uploader::new(RecordingService::new(), NullReporter);
    let summary = uploader
        .upload(&invocation.context, &invocation.source, &extraction.records)
        .await
        .unwrap();
    assert_eq!(summary.uploaded, 2);
    assert!(summary.success());

    let calls = uploader.service().calls();
    assert_eq!(
        created_run_names(&calls),
        [
            ("Suite\\Alpha\\(1.5)".to_string(), TestRunStatus::Passed),
            ("Suite\\Zeta".to_string(), TestRunStatus::Failed),
        ]
    );

    assert!(calls.iter().all(|c| match c {
        Call::CreateTestRun { request, .. } => {
            request.description == TEST_RUN_DESCRIPTION && request.test_run_type == "Unit"
        }
        _ => true,
    }));

    assert!(matches!(
        &calls[1],
        Call::CreateTestRunSet { name, description, tags, .. }
            if name == "Unit Tests" && description == "Unit Tests" && tags == &["nightly"]
    ));
}

#[tokio::test]
async fn test_payloads_logs_and_attachment() {
    let file = trx_file();
    let invocation = invocation(&file);
    let document = TrxDocument::load(&invocation.source).unwrap();
    let extraction = trx::extract(&document).unwrap();

    let uploader = Uploader::new(RecordingService::new(), NullReporter);
    uploader
        .upload(&invocation.context, &invocation.source, &extraction.records)
        .await
        .unwrap();
    let calls = uploader.service().calls();

    let payloads: Vec<&String> = calls
        .iter()
        .filter_map(|c| match c {
            Call::PublishResultsXml { xml, .. } => Some(xml),
            _ => None,
        })
        .collect();
    assert_eq!(payloads.len(), 2);
    for payload in &payloads {
        assert!(payload.starts_with("<test><UnitTestResult "));
        assert!(payload.ends_with("</test>"));
        assert!(payload.contains("<UnitTest "));
    }
    assert!(payloads[0].contains(r#"testName="Suite.Alpha(1.5)""#));
    assert!(payloads[1].contains("<StdOut>expected 1\ngot 2</StdOut>"));

    let logs: Vec<&Vec<String>> = calls
        .iter()
        .filter_map(|c| match c {
            Call::PublishLogMessages { lines, .. } => Some(lines),
            _ => None,
        })
        .collect();
    assert_eq!(logs, [&vec!["expected 1".to_string(), "got 2".to_string()]]);

    let expected_name = file.path().file_name().unwrap().to_string_lossy().into_owned();
    let attachment = calls
        .iter()
        .find_map(|c| match c {
            Call::PublishAdditionalFile {
                file_name,
                description,
                content,
                ..
            } => Some((file_name, description, content)),
            _ => None,
        })
        .unwrap();
    assert_eq!(attachment.0, &expected_name);
    assert_eq!(attachment.1, SOURCE_FILE_DESCRIPTION);
    assert_eq!(attachment.2.as_slice(), TRX.as_bytes());

    assert_eq!(
        calls.last(),
        Some(&Call::SetStatus {
            run_set: 1,
            status: TestRunSetStatus::Standard,
        })
    );
}

#[tokio::test]
async fn test_unknown_product_makes_no_further_calls() {
    let file = trx_file();
    let invocation = invocation(&file);
    let document = TrxDocument::load(&invocation.source).unwrap();
    let extraction = trx::extract(&document).unwrap();

    let uploader = Uploader::new(
        RecordingService::new().with_products(["gadgets"]),
        NullReporter,
    );
    let err = uploader
        .upload(&invocation.context, &invocation.source, &extraction.records)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        UploadError::ProductLookup {
            source: ServiceError::ProductNotFound(_),
            ..
        }
    ));
    assert_eq!(
        uploader.service().calls(),
        [Call::Product {
            name: "widgets".to_string()
        }]
    );
}

#[tokio::test]
async fn test_fail_fast_and_keep_going() {
    let file = trx_file();
    let invocation = invocation(&file);
    let document = TrxDocument::load(&invocation.source).unwrap();
    let extraction = trx::extract(&document).unwrap();

    let fail_fast = Uploader::new(
        RecordingService::new().fail_test_run("Suite\\Alpha\\(1.5)"),
        NullReporter,
    );
    let err = fail_fast
        .upload(&invocation.context, &invocation.source, &extraction.records)
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::TestRunCreation { .. }));
    assert_eq!(created_run_names(&fail_fast.service().calls()).len(), 1);

    let keep_going = Uploader::new(
        RecordingService::new().fail_test_run("Suite\\Alpha\\(1.5)"),
        NullReporter,
    )
    .keep_going(true);
    let summary = keep_going
        .upload(&invocation.context, &invocation.source, &extraction.records)
        .await
        .unwrap();
    assert_eq!(summary.uploaded, 1);
    assert_eq!(summary.failed[0].test_name, "Suite.Alpha(1.5)");
    assert!(matches!(
        keep_going.service().calls().last(),
        Some(Call::SetStatus {
            status: TestRunSetStatus::Exception,
            ..
        })
    ));
}
