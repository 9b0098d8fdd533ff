//! In-memory results service that records every call.
//!
//! Used for `--dry-run`, where the whole upload pipeline runs without a
//! server and the recorded calls are printed instead, and as a test double.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::NaiveDateTime;

use super::{
    NewTestRun, NewTestRunSet, Product, ResultsService, ServiceError, ServiceResult, TestRun,
    TestRunSet, TestRunSetStatus,
};

/// A call received by a [`RecordingService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Product {
        name: String,
    },
    CreateTestRunSet {
        product: String,
        name: String,
        description: String,
        ref_date: Option<NaiveDateTime>,
        tags: Vec<String>,
    },
    CreateTestRun {
        run_set: u64,
        request: NewTestRun,
    },
    PublishResultsXml {
        run: u64,
        xml: String,
    },
    PublishLogMessages {
        run: u64,
        lines: Vec<String>,
    },
    PublishAdditionalFile {
        run_set: u64,
        file_name: String,
        description: String,
        content: Vec<u8>,
    },
    SetStatus {
        run_set: u64,
        status: TestRunSetStatus,
    },
}

/// Records calls and hands out sequential ids.
pub struct RecordingService {
    calls: Mutex<Vec<Call>>,
    next_id: AtomicU64,
    /// When set, only these products exist.
    products: Option<Vec<String>>,
    /// Test run names whose creation fails.
    failing_runs: Vec<String>,
}

impl RecordingService {
    /// A service where every product exists and every call succeeds.
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            products: None,
            failing_runs: Vec::new(),
        }
    }

    /// Restrict the known products; lookups for anything else fail.
    pub fn with_products<I, S>(mut self, products: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.products = Some(products.into_iter().map(Into::into).collect());
        self
    }

    /// Make creation of the test run with this (uploaded) name fail.
    pub fn fail_test_run(mut self, name: impl Into<String>) -> Self {
        self.failing_runs.push(name.into());
        self
    }

    /// Calls received so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, call: Call) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for RecordingService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResultsService for RecordingService {
    async fn product(&self, name: &str) -> ServiceResult<Product> {
        self.record(Call::Product {
            name: name.to_string(),
        });

        match &self.products {
            Some(products) if !products.iter().any(|p| p == name) => {
                Err(ServiceError::ProductNotFound(name.to_string()))
            }
            _ => Ok(Product {
                name: name.to_string(),
                description: None,
            }),
        }
    }

    async fn create_test_run_set(
        &self,
        product: &Product,
        request: &NewTestRunSet,
    ) -> ServiceResult<TestRunSet> {
        self.record(Call::CreateTestRunSet {
            product: product.name.clone(),
            name: request.name.clone(),
            description: request.description.clone(),
            ref_date: request.ref_date,
            tags: request.tags.clone(),
        });

        Ok(TestRunSet {
            product: product.name.clone(),
            id: self.next_id(),
        })
    }

    async fn create_test_run(
        &self,
        run_set: &TestRunSet,
        request: &NewTestRun,
    ) -> ServiceResult<TestRun> {
        self.record(Call::CreateTestRun {
            run_set: run_set.id,
            request: request.clone(),
        });

        if self.failing_runs.contains(&request.name) {
            return Err(ServiceError::Status {
                status: 500,
                body: format!("cannot create test run '{}'", request.name),
            });
        }

        Ok(TestRun {
            product: run_set.product.clone(),
            test_run_set: run_set.id,
            id: self.next_id(),
        })
    }

    async fn publish_results_xml(&self, run: &TestRun, xml: &str) -> ServiceResult<()> {
        self.record(Call::PublishResultsXml {
            run: run.id,
            xml: xml.to_string(),
        });
        Ok(())
    }

    async fn publish_log_messages(&self, run: &TestRun, lines: &[String]) -> ServiceResult<()> {
        self.record(Call::PublishLogMessages {
            run: run.id,
            lines: lines.to_vec(),
        });
        Ok(())
    }

    async fn publish_additional_file(
        &self,
        run_set: &TestRunSet,
        file_name: &str,
        description: &str,
        content: Vec<u8>,
    ) -> ServiceResult<()> {
        self.record(Call::PublishAdditionalFile {
            run_set: run_set.id,
            file_name: file_name.to_string(),
            description: description.to_string(),
            content,
        });
        Ok(())
    }

    async fn set_status(&self, run_set: &TestRunSet, status: TestRunSetStatus) -> ServiceResult<()> {
        self.record(Call::SetStatus {
            run_set: run_set.id,
            status,
        });
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}
