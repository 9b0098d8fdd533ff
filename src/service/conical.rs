//! HTTP client for a Conical results server.
//!
//! # Endpoints
//!
//! | Call | Request |
//! |------|---------|
//! | product | `GET api/product/{product}` |
//! | create test run set | `POST api/product/{product}/testrunsets` |
//! | create test run | `POST api/product/{product}/testrunset/{trs}/testruns` |
//! | results XML | `PUT .../testrunset/{trs}/testrun/{tr}/results/xml` |
//! | log messages | `PUT .../testrunset/{trs}/testrun/{tr}/logs` |
//! | additional file | `POST .../testrunset/{trs}/additionalfiles?name=..&description=..` |
//! | status | `PUT .../testrunset/{trs}/status` |
//!
//! Requests carry the access token as a bearer token when one is configured.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;

use super::{
    NewTestRun, NewTestRunSet, Product, ResultsService, ServiceError, ServiceResult, TestRun,
    TestRunSet, TestRunSetStatus,
};

/// HTTP connect timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP total timeout per request. Attachments can be large.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Body of a create response.
#[derive(Deserialize)]
struct Created {
    id: u64,
}

/// Client for the Conical REST API.
pub struct ConicalClient {
    base: Url,
    token: Option<SecretString>,
    http: reqwest::Client,
}

impl ConicalClient {
    /// Create a client for the server at `server`.
    ///
    /// A server given without a scheme is assumed to be `https://`.
    pub fn new(server: &str, token: Option<SecretString>) -> ServiceResult<Self> {
        let base = parse_base(server)?;

        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        debug!("Conical client for {}", base);

        Ok(Self { base, token, http })
    }

    /// Base URL requests are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Append path segments to the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> ServiceResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ServiceError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn run_set_endpoint(&self, run_set: &TestRunSet, rest: &[&str]) -> ServiceResult<Url> {
        let id = run_set.id.to_string();
        let mut segments = vec!["api", "product", run_set.product.as_str(), "testrunset", id.as_str()];
        segments.extend_from_slice(rest);
        self.endpoint(&segments)
    }

    fn run_endpoint(&self, run: &TestRun, rest: &[&str]) -> ServiceResult<Url> {
        let run_set = run.test_run_set.to_string();
        let id = run.id.to_string();
        let mut segments = vec![
            "api",
            "product",
            run.product.as_str(),
            "testrunset",
            run_set.as_str(),
            "testrun",
            id.as_str(),
        ];
        segments.extend_from_slice(rest);
        self.endpoint(&segments)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        debug!("{} {}", method, url);
        let builder = self.http.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        }
    }
}

/// Send a request, turning non-success statuses into errors.
async fn send(builder: RequestBuilder) -> ServiceResult<Response> {
    let response = builder.send().await?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(ServiceError::Status {
        status: status.as_u16(),
        body,
    })
}

fn parse_base(server: &str) -> ServiceResult<Url> {
    let server = server.trim();
    let with_scheme = if server.contains("://") {
        server.to_string()
    } else {
        format!("https://{server}")
    };

    let url = Url::parse(&with_scheme).map_err(|e| ServiceError::InvalidUrl(format!("{server}: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(ServiceError::InvalidUrl(server.to_string()));
    }
    Ok(url)
}

#[async_trait]
impl ResultsService for ConicalClient {
    async fn product(&self, name: &str) -> ServiceResult<Product> {
        let url = self.endpoint(&["api", "product", name])?;
        match send(self.request(Method::GET, url)).await {
            Ok(response) => Ok(response.json::<Product>().await?),
            Err(ServiceError::Status { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                Err(ServiceError::ProductNotFound(name.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    async fn create_test_run_set(
        &self,
        product: &Product,
        request: &NewTestRunSet,
    ) -> ServiceResult<TestRunSet> {
        let url = self.endpoint(&["api", "product", product.name.as_str(), "testrunsets"])?;
        let created: Created = send(self.request(Method::POST, url).json(request))
            .await?
            .json()
            .await?;

        Ok(TestRunSet {
            product: product.name.clone(),
            id: created.id,
        })
    }

    async fn create_test_run(
        &self,
        run_set: &TestRunSet,
        request: &NewTestRun,
    ) -> ServiceResult<TestRun> {
        let url = self.run_set_endpoint(run_set, &["testruns"])?;
        let created: Created = send(self.request(Method::POST, url).json(request))
            .await?
            .json()
            .await?;

        Ok(TestRun {
            product: run_set.product.clone(),
            test_run_set: run_set.id,
            id: created.id,
        })
    }

    async fn publish_results_xml(&self, run: &TestRun, xml: &str) -> ServiceResult<()> {
        let url = self.run_endpoint(run, &["results", "xml"])?;
        send(
            self.request(Method::PUT, url)
                .header(CONTENT_TYPE, "application/xml")
                .body(xml.to_string()),
        )
        .await?;
        Ok(())
    }

    async fn publish_log_messages(&self, run: &TestRun, lines: &[String]) -> ServiceResult<()> {
        let url = self.run_endpoint(run, &["logs"])?;
        send(self.request(Method::PUT, url).json(lines)).await?;
        Ok(())
    }

    async fn publish_additional_file(
        &self,
        run_set: &TestRunSet,
        file_name: &str,
        description: &str,
        content: Vec<u8>,
    ) -> ServiceResult<()> {
        let mut url = self.run_set_endpoint(run_set, &["additionalfiles"])?;
        url.query_pairs_mut()
            .append_pair("name", file_name)
            .append_pair("description", description);

        send(
            self.request(Method::POST, url)
                .header(CONTENT_TYPE, "application/octet-stream")
                .body(content),
        )
        .await?;
        Ok(())
    }

    async fn set_status(&self, run_set: &TestRunSet, status: TestRunSetStatus) -> ServiceResult<()> {
        let url = self.run_set_endpoint(run_set, &["status"])?;
        send(
            self.request(Method::PUT, url)
                .json(&serde_json::json!({ "status": status })),
        )
        .await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "conical"
    }
}
