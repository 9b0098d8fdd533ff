//! Join TRX results with their definitions into upload records.

use std::collections::HashMap;

use tracing::{debug, info};

use super::{
    Element, Outcome, TestDefinition, TestOutcomeRecord, TrxDocument, TrxResult,
    is_not_executed,
};

const DEFINITIONS_PATH: &[&str] = &["TestDefinitions", "UnitTest"];
const RESULTS_PATH: &[&str] = &["Results", "UnitTestResult"];
const STDOUT_PATH: &[&str] = &["Output", "StdOut"];

/// Everything pulled out of a TRX document.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// Definitions keyed by `id`.
    pub definitions: HashMap<String, TestDefinition>,

    /// Executed results, sorted by test name.
    pub records: Vec<TestOutcomeRecord>,

    /// Number of results dropped because they were never executed.
    pub not_executed: usize,
}

/// Build the `id -> definition` index from the `TestDefinitions` section.
///
/// Later definitions replace earlier ones with the same id. Definitions
/// without an `id` cannot be joined against and are left out of the index.
pub fn index_definitions(document: &TrxDocument) -> TrxResult<HashMap<String, TestDefinition>> {
    let mut index = HashMap::new();

    for node in document.root().select(DEFINITIONS_PATH, document.namespace()) {
        let definition = TestDefinition {
            id: node.attribute("id").map(str::to_owned),
            name: node.attribute("name").map(str::to_owned),
            markup: node.outer_xml()?,
        };

        match definition.id.clone() {
            Some(id) => {
                index.insert(id, definition);
            }
            None => debug!("Skipping test definition without id: {:?}", definition.name),
        }
    }

    Ok(index)
}

/// Extract upload records from a TRX document.
///
/// Results whose outcome is `NotExecuted` are dropped. A document without
/// `Results` or `TestDefinitions` sections yields no records rather than
/// an error.
pub fn extract(document: &TrxDocument) -> TrxResult<Extraction> {
    let definitions = index_definitions(document)?;
    let namespace = document.namespace();

    let mut records = Vec::new();
    let mut not_executed = 0;

    for node in document.root().select(RESULTS_PATH, namespace) {
        let outcome = node.attribute("outcome");
        if is_not_executed(outcome) {
            not_executed += 1;
            continue;
        }

        let test_id = node.attribute("testId").map(str::to_owned);
        let definition = test_id
            .as_deref()
            .and_then(|id| definitions.get(id))
            .cloned();

        records.push(TestOutcomeRecord {
            test_name: node.attribute("testName").unwrap_or_default().to_owned(),
            test_id,
            outcome: Outcome::from_trx(outcome),
            definition,
            log_lines: log_lines(node, namespace),
            result_markup: node.outer_xml()?,
        });
    }

    records.sort_by(|a, b| a.test_name.cmp(&b.test_name));

    info!(
        "Extracted {} results ({} not executed, {} definitions)",
        records.len(),
        not_executed,
        definitions.len()
    );

    Ok(Extraction {
        definitions,
        records,
        not_executed,
    })
}

/// Captured standard output of a result, split into lines.
fn log_lines(result: &Element, namespace: Option<&str>) -> Vec<String> {
    let Some(stdout) = result.select_first(STDOUT_PATH, namespace) else {
        return Vec::new();
    };

    split_lines(&stdout.inner_text())
}

/// Split on `\n`, dropping the `\r` of CRLF line endings.
fn split_lines(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line).to_owned())
        .collect()
}
