//! Configuration loading and resolution for trx-uploader.
//!
//! Settings come from two places: an optional TOML settings file (see
//! [`schema`]) and command line overrides. [`resolve`] merges the two and
//! validates the result into an [`Invocation`], reporting missing or
//! invalid values as [`ConfigError::UserInput`] before any file is parsed
//! or any remote call is made.

pub mod context;
pub mod schema;

pub use context::{TagSet, UploadContext, parse_ref_date};
pub use schema::*;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use secrecy::SecretString;
use tracing::debug;

/// Settings file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "trx-uploader.toml";

/// Errors found while validating upload parameters.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required value is missing or a value cannot be used.
    #[error("{0}")]
    UserInput(String),

    /// The TRX file to upload does not exist.
    #[error("Source file '{}' doesn't exist", .0.display())]
    SourceNotFound(PathBuf),
}

/// Loads configuration from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or does not match the
/// schema.
///
/// # Example
///
/// ```no_run
/// use trx_uploader::config::load_config;
/// use std::path::Path;
///
/// let config = load_config(Path::new("trx-uploader.toml"))?;
/// println!("Product: {:?}", config.upload.product);
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

    Ok(config)
}

/// Loads configuration from a TOML string.
///
/// # Example
///
/// ```
/// use trx_uploader::config::load_config_str;
///
/// let config = load_config_str(r#"
///     [upload]
///     product = "widgets"
///     test_run_type = "Unit"
/// "#)?;
///
/// assert_eq!(config.upload.test_run_type.as_deref(), Some("Unit"));
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn load_config_str(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).context("Failed to parse config")?;

    Ok(config)
}

/// Load the settings file for this run.
///
/// An explicitly requested file must exist. When none is requested,
/// [`DEFAULT_CONFIG_FILE`] is read if present and defaults are used
/// otherwise.
pub fn load_settings(explicit: Option<&Path>) -> Result<Config> {
    match explicit {
        Some(path) => load_config(path),
        None => {
            let path = Path::new(DEFAULT_CONFIG_FILE);
            if path.exists() {
                debug!("Using settings from {}", path.display());
                load_config(path)
            } else {
                Ok(Config::default())
            }
        }
    }
}

/// Values supplied on the command line. `None` means "use the settings file".
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub server: Option<String>,
    pub token: Option<String>,
    pub product: Option<String>,
    pub test_run_set_name: Option<String>,
    pub test_run_set_description: Option<String>,
    pub test_run_type: Option<String>,
    pub ref_date: Option<String>,
    pub ref_date_format: Option<String>,
    pub tags: Vec<String>,
    pub source: Option<PathBuf>,
}

/// A validated request to upload one TRX file.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub context: UploadContext,
    /// Absolute path of the TRX file.
    pub source: PathBuf,
}

/// Merge settings with command line overrides and validate the result.
///
/// Checks run in a fixed order and stop at the first problem: source
/// given, source exists, product, test run set name, test run type,
/// reference date.
pub fn resolve(settings: &UploadSettings, overrides: Overrides) -> Result<Invocation, ConfigError> {
    let source = overrides
        .source
        .filter(|p| !p.as_os_str().is_empty())
        .ok_or_else(|| ConfigError::UserInput("No source file".to_string()))?;
    let source = std::path::absolute(&source)
        .map_err(|e| ConfigError::UserInput(format!("Invalid source path: {e}")))?;
    if !source.exists() {
        return Err(ConfigError::SourceNotFound(source));
    }

    let product_name = non_empty(overrides.product.or_else(|| settings.product.clone()))
        .ok_or_else(|| ConfigError::UserInput("No product name specified".to_string()))?;

    let run_set_name = non_empty(
        overrides
            .test_run_set_name
            .or_else(|| Some(settings.test_run_set_name.clone())),
    )
    .ok_or_else(|| ConfigError::UserInput("No test run set name specified".to_string()))?;

    let run_type = non_empty(overrides.test_run_type.or_else(|| settings.test_run_type.clone()))
        .ok_or_else(|| ConfigError::UserInput("No test run type specified".to_string()))?;

    let ref_date = match non_empty(overrides.ref_date) {
        Some(value) => Some(parse_ref_date(&value, overrides.ref_date_format.as_deref())?),
        None => None,
    };

    let run_set_description = overrides
        .test_run_set_description
        .unwrap_or_else(|| settings.test_run_set_description.clone());

    let mut tags: TagSet = settings.tags.iter().cloned().collect();
    tags.extend(overrides.tags);

    let context = UploadContext {
        server: non_empty(overrides.server.or_else(|| settings.server.clone())),
        access_token: non_empty(overrides.token.or_else(|| settings.token.clone()))
            .map(SecretString::from),
        product_name,
        run_set_name,
        run_set_description,
        run_type,
        tags,
        ref_date,
    };

    Ok(Invocation { context, source })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
