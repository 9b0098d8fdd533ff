//! trx-uploader: publish TRX test results to a Conical results server.
//!
//! A TRX file (the XML test results format written by `dotnet test` and
//! Visual Studio) is parsed, its executed results are joined with their
//! test definitions, and each result becomes a test run inside a newly
//! created test run set.
//!
//! # Architecture
//!
//! The main components are:
//!
//! - **Config**: Settings file, command line overrides, validation
//! - **Trx**: Namespace-aware TRX parsing and record extraction
//! - **Naming**: Escaping of test names for the results server
//! - **Service**: The remote calls (Conical REST client, recording double)
//! - **Upload**: The driver that publishes records in order
//! - **Report**: Console progress and summaries
//!
//! # Example
//!
//! ```no_run
//! use trx_uploader::config::{self, Overrides};
//! use trx_uploader::report::ConsoleReporter;
//! use trx_uploader::service::conical::ConicalClient;
//! use trx_uploader::trx::{TrxDocument, extract};
//! use trx_uploader::upload::Uploader;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = config::load_settings(None)?;
//!     let invocation = config::resolve(
//!         &settings.upload,
//!         Overrides {
//!             source: Some("results.trx".into()),
//!             ..Default::default()
//!         },
//!     )?;
//!     let document = TrxDocument::load(&invocation.source)?;
//!     let extraction = extract(&document)?;
//!
//!     let context = &invocation.context;
//!     let client = ConicalClient::new(context.require_server()?, context.access_token.clone())?;
//!     Uploader::new(client, ConsoleReporter::new(false))
//!         .upload(context, &invocation.source, &extraction.records)
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod naming;
pub mod report;
pub mod service;
pub mod trx;
pub mod upload;

// Re-export commonly used types
pub use config::{Config, Invocation, UploadContext, load_config, resolve};
pub use report::{ConsoleReporter, UploadReporter};
pub use service::{ResultsService, ServiceError};
pub use trx::{Outcome, TestOutcomeRecord, TrxDocument, TrxError};
pub use upload::{UploadError, UploadSummary, Uploader};
