//! trx-uploader CLI - Upload TRX test results to a Conical server.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use tracing::level_filters::LevelFilter;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use trx_uploader::config::{self, Invocation, Overrides};
use trx_uploader::report::{self, ConsoleReporter, NullReporter};
use trx_uploader::service::conical::ConicalClient;
use trx_uploader::service::recording::RecordingService;
use trx_uploader::trx::{self, TestOutcomeRecord, TrxDocument};
use trx_uploader::upload::{UploadSummary, Uploader};

#[derive(Parser)]
#[command(name = "trx-uploader")]
#[command(about = "Upload TRX test results to a Conical results server", long_about = None)]
#[command(version)]
struct Cli {
    /// Conical server address
    #[arg(long)]
    server: Option<String>,

    /// Access token
    #[arg(long, env = "TRX_UPLOADER_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Product to upload to
    #[arg(long)]
    product: Option<String>,

    /// Test run type of every created test run
    #[arg(long)]
    test_run_type: Option<String>,

    /// Name of the test run set [default: Unit Tests]
    #[arg(long)]
    test_run_set_name: Option<String>,

    /// Description of the test run set [default: Unit Tests]
    #[arg(long)]
    test_run_set_description: Option<String>,

    /// Reference date of the test run set
    #[arg(long)]
    ref_date: Option<String>,

    /// strftime-style format used to parse --ref-date
    #[arg(long)]
    ref_date_format: Option<String>,

    /// Tag for the test run set (repeatable)
    #[arg(long = "tag", value_name = "TAG")]
    tags: Vec<String>,

    /// TRX file to upload
    #[arg(short, long)]
    source: Option<PathBuf>,

    /// Settings file path [default: trx-uploader.toml, if present]
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Run the upload against an in-memory service and print what would be sent
    #[arg(long)]
    dry_run: bool,

    /// Skip tests that fail to upload instead of aborting
    #[arg(long)]
    keep_going: bool,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            server: self.server.clone(),
            token: self.token.clone(),
            product: self.product.clone(),
            test_run_set_name: self.test_run_set_name.clone(),
            test_run_set_description: self.test_run_set_description.clone(),
            test_run_type: self.test_run_type.clone(),
            ref_date: self.ref_date.clone(),
            ref_date_format: self.ref_date_format.clone(),
            tags: self.tags.clone(),
            source: self.source.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    if std::env::args_os().len() <= 1 {
        let _ = Cli::command().print_help();
        return ExitCode::SUCCESS;
    }

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        }
    };

    if let Err(e) = init_logging(cli.verbose) {
        eprintln!("Error: {e:#}");
        return ExitCode::FAILURE;
    }

    match run(&cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) -> Result<()> {
    let log_level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .from_env_lossy();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}

/// Returns whether every record was uploaded.
async fn run(cli: &Cli) -> Result<bool> {
    let settings = config::load_settings(cli.config.as_deref())?;
    let invocation = config::resolve(&settings.upload, cli.overrides())?;

    info!("Loading test results from {}", invocation.source.display());
    let document = TrxDocument::load(&invocation.source)?;
    let extraction = trx::extract(&document)?;

    if extraction.records.is_empty() {
        warn!(
            "No executed test results in {}",
            invocation.source.display()
        );
    }

    if cli.dry_run {
        dry_run(&invocation, &extraction.records).await?;
        return Ok(true);
    }

    let summary = upload(cli, &invocation, &extraction.records).await?;
    Ok(summary.success())
}

async fn upload(
    cli: &Cli,
    invocation: &Invocation,
    records: &[TestOutcomeRecord],
) -> Result<UploadSummary> {
    let context = &invocation.context;
    let server = context.require_server()?;

    let client = ConicalClient::new(server, context.access_token.clone())
        .with_context(|| format!("Failed to create client for {server}"))?;
    info!("Uploading to {}", client.base_url());

    let uploader = Uploader::new(client, ConsoleReporter::new(cli.verbose))
        .keep_going(cli.keep_going);
    let summary = uploader
        .upload(context, &invocation.source, records)
        .await?;

    Ok(summary)
}

async fn dry_run(invocation: &Invocation, records: &[TestOutcomeRecord]) -> Result<()> {
    let uploader = Uploader::new(RecordingService::new(), NullReporter);
    uploader
        .upload(&invocation.context, &invocation.source, records)
        .await
        .context("Dry run failed")?;

    report::print_dry_run(&uploader.service().calls());
    Ok(())
}
