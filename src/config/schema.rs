//! Settings file schema for trx-uploader.
//!
//! The settings file supplies defaults for values that rarely change
//! between uploads (server, token, product). Every field can be
//! overridden on the command line.
//!
//! # Schema Overview
//!
//! ```text
//! Config (root)
//! └── UploadSettings   - [upload] table: server, token, product, test run set defaults
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Root configuration structure.
///
/// # TOML Structure
///
/// ```toml
/// [upload]
/// server = "https://conical.example.com"
/// token = "..."
/// product = "my-product"
/// test_run_type = "Unit"
/// test_run_set_name = "Unit Tests"
/// tags = ["ci"]
/// ```
///
/// # Example
///
/// ```
/// use trx_uploader::config::Config;
///
/// let config: Config = toml::from_str(r#"
///     [upload]
///     product = "my-product"
/// "#).unwrap();
///
/// assert_eq!(config.upload.product.as_deref(), Some("my-product"));
/// assert_eq!(config.upload.test_run_set_name, "Unit Tests");
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Upload defaults (optional, has defaults).
    #[serde(default)]
    pub upload: UploadSettings,
}

/// Defaults for an upload.
///
/// # Defaults
///
/// | Field | Default |
/// |-------|---------|
/// | `server` | None |
/// | `token` | None |
/// | `product` | None |
/// | `test_run_set_name` | `"Unit Tests"` |
/// | `test_run_set_description` | `"Unit Tests"` |
/// | `test_run_type` | None |
/// | `tags` | empty |
#[derive(Clone, Deserialize, Serialize)]
pub struct UploadSettings {
    /// Address of the results server.
    pub server: Option<String>,

    /// Access token sent with every request.
    pub token: Option<String>,

    /// Product the test run set is created under.
    pub product: Option<String>,

    /// Name of the created test run set.
    ///
    /// Default: "Unit Tests"
    #[serde(default = "default_test_run_set_name")]
    pub test_run_set_name: String,

    /// Description of the created test run set.
    ///
    /// Default: "Unit Tests"
    #[serde(default = "default_test_run_set_description")]
    pub test_run_set_description: String,

    /// Test run type each uploaded test is recorded as.
    ///
    /// Must already exist on the server.
    pub test_run_type: Option<String>,

    /// Tags applied to every created test run set.
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_test_run_set_name() -> String {
    "Unit Tests".to_string()
}

fn default_test_run_set_description() -> String {
    "Unit Tests".to_string()
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            server: None,
            token: None,
            product: None,
            test_run_set_name: default_test_run_set_name(),
            test_run_set_description: default_test_run_set_description(),
            test_run_type: None,
            tags: Vec::new(),
        }
    }
}

impl fmt::Debug for UploadSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadSettings")
            .field("server", &self.server)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("product", &self.product)
            .field("test_run_set_name", &self.test_run_set_name)
            .field("test_run_set_description", &self.test_run_set_description)
            .field("test_run_type", &self.test_run_type)
            .field("tags", &self.tags)
            .finish()
    }
}
