//! Upload progress reporting and console output.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::service::TestRunSet;
use crate::service::recording::Call;
use crate::trx::TestOutcomeRecord;
use crate::upload::{UploadError, UploadSummary};

/// Records between progress ticks on the console.
pub const TICK_INTERVAL: usize = 10;

/// Receives events while an upload runs.
pub trait UploadReporter: Send + Sync {
    /// Called once the test run set exists on the server.
    fn on_run_set_created(&self, run_set: &TestRunSet);

    /// Called before a record is uploaded. `position` starts at 1.
    fn on_record_start(&self, position: usize, record: &TestOutcomeRecord);

    /// Called when a record fails to upload, before the upload either
    /// aborts or moves on to the next record.
    fn on_record_failed(&self, record: &TestOutcomeRecord, error: &UploadError);

    /// Called after the test run set has been finalized.
    fn on_upload_complete(&self, summary: &UploadSummary);
}

/// A reporter that does nothing.
pub struct NullReporter;

impl UploadReporter for NullReporter {
    fn on_run_set_created(&self, _run_set: &TestRunSet) {}
    fn on_record_start(&self, _position: usize, _record: &TestOutcomeRecord) {}
    fn on_record_failed(&self, _record: &TestOutcomeRecord, _error: &UploadError) {}
    fn on_upload_complete(&self, _summary: &UploadSummary) {}
}

/// Whether the record at `position` (1-based) gets a progress tick.
pub fn is_tick(position: usize) -> bool {
    position > 0 && position % TICK_INTERVAL == 0
}

/// Console reporter: a `.` every [`TICK_INTERVAL`] records, then a summary.
pub struct ConsoleReporter {
    verbose: bool,
    /// Progress dots are on an unterminated stdout line.
    line_open: AtomicBool,
}

impl ConsoleReporter {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            line_open: AtomicBool::new(false),
        }
    }

    fn end_progress_line(&self) {
        if self.line_open.swap(false, Ordering::Relaxed) {
            println!();
        }
    }
}

impl UploadReporter for ConsoleReporter {
    fn on_run_set_created(&self, run_set: &TestRunSet) {
        println!("TRS created (#{})", run_set.id);
        println!("Uploading tests");
    }

    fn on_record_start(&self, position: usize, record: &TestOutcomeRecord) {
        if self.verbose {
            println!("Uploading: {}", record.test_name);
        } else if is_tick(position) {
            print!(".");
            let _ = std::io::stdout().flush();
            self.line_open.store(true, Ordering::Relaxed);
        }
    }

    fn on_record_failed(&self, record: &TestOutcomeRecord, error: &UploadError) {
        self.end_progress_line();
        eprintln!(
            "{} {}: {}",
            console::style("FAIL").red(),
            record.test_name,
            console::style(error).dim()
        );
    }

    fn on_upload_complete(&self, summary: &UploadSummary) {
        self.end_progress_line();
        println!();
        println!("Upload Results:");
        println!("  Test run set: #{}", summary.run_set_id);
        println!("  Uploaded:     {}", console::style(summary.uploaded).green());

        if summary.failed.is_empty() {
            println!();
            println!("{}", console::style("Upload complete").green().bold());
            return;
        }

        println!("  Failed:       {}", console::style(summary.failed.len()).red());
        println!();
        println!("Failed tests:");
        for failed in &summary.failed {
            println!("  - {}", failed.test_name);
            println!("    {}", console::style(&failed.error).dim());
        }
        println!();
        println!(
            "{}",
            console::style("Upload finished with failures.").red().bold()
        );
    }
}

/// Print what a dry run would have sent to the server.
pub fn print_dry_run(calls: &[Call]) {
    let mut runs = 0;

    for call in calls {
        match call {
            Call::Product { name } => println!("Product:      {name}"),
            Call::CreateTestRunSet {
                name,
                description,
                ref_date,
                tags,
                ..
            } => {
                println!("Test run set: {name} ({description})");
                if let Some(ref_date) = ref_date {
                    println!("Ref date:     {ref_date}");
                }
                if !tags.is_empty() {
                    println!("Tags:         {}", tags.join(", "));
                }
                println!();
            }
            Call::CreateTestRun { request, .. } => {
                runs += 1;
                let status = match request.status {
                    crate::service::TestRunStatus::Passed => console::style("PASS").green(),
                    crate::service::TestRunStatus::Failed => console::style("FAIL").red(),
                };
                println!("  {} {}", status, request.name);
            }
            Call::PublishLogMessages { lines, .. } => {
                println!("       {} log lines", lines.len());
            }
            Call::PublishAdditionalFile {
                file_name, content, ..
            } => {
                println!();
                println!("Attachment:   {} ({} bytes)", file_name, content.len());
            }
            Call::PublishResultsXml { .. } | Call::SetStatus { .. } => {}
        }
    }

    println!();
    println!("{} test runs would be uploaded (dry run)", runs);
}
