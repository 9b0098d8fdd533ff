//! Resolved, read-only upload parameters.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use secrecy::SecretString;

use super::ConfigError;

/// Formats tried, in order, when a reference date is given without an
/// explicit format.
const REF_DATE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const REF_DATE_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y%m%d"];

/// Everything needed to create a test run set, fixed for the whole run.
#[derive(Debug, Clone)]
pub struct UploadContext {
    pub server: Option<String>,
    pub access_token: Option<SecretString>,
    pub product_name: String,
    pub run_set_name: String,
    pub run_set_description: String,
    pub run_type: String,
    pub tags: TagSet,
    pub ref_date: Option<NaiveDateTime>,
}

impl UploadContext {
    /// The server address, required for anything but a dry run.
    pub fn require_server(&self) -> Result<&str, ConfigError> {
        match self.server.as_deref() {
            Some(server) if !server.trim().is_empty() => Ok(server),
            _ => Err(ConfigError::UserInput("No server specified".to_string())),
        }
    }
}

/// A set of tags where `CI` and `ci` are the same tag.
///
/// The first spelling added is kept, and iteration follows insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSet {
    tags: Vec<String>,
}

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tag. Returns false if an equal tag (ignoring case) is present.
    pub fn insert(&mut self, tag: impl Into<String>) -> bool {
        let tag = tag.into();
        if self.contains(&tag) {
            return false;
        }
        self.tags.push(tag);
        true
    }

    pub fn contains(&self, tag: &str) -> bool {
        let folded = tag.to_lowercase();
        self.tags.iter().any(|t| t.to_lowercase() == folded)
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.tags.clone()
    }
}

impl<S: Into<String>> Extend<S> for TagSet {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        for tag in iter {
            self.insert(tag);
        }
    }
}

impl<S: Into<String>> FromIterator<S> for TagSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = TagSet::new();
        set.extend(iter);
        set
    }
}

/// Parse a reference date given on the command line.
///
/// With a `format` (chrono `strftime` syntax) the value must match it
/// exactly; a date-only format yields midnight. Without one, RFC 3339 and
/// a few ISO-like layouts are accepted.
pub fn parse_ref_date(value: &str, format: Option<&str>) -> Result<NaiveDateTime, ConfigError> {
    let value = value.trim();

    if let Some(format) = format.filter(|f| !f.is_empty()) {
        return parse_with(value, format).ok_or_else(|| {
            ConfigError::UserInput(format!(
                "Cannot parse '{value}' using format string '{format}' as a valid ref date"
            ))
        });
    }

    if let Ok(date) = DateTime::parse_from_rfc3339(value) {
        return Ok(date.naive_local());
    }

    REF_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .or_else(|| {
            REF_DATE_DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(|| {
            ConfigError::UserInput(format!("Cannot parse '{value}' as a valid ref date"))
        })
}

fn parse_with(value: &str, format: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, format).ok().or_else(|| {
        NaiveDate::parse_from_str(value, format)
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
    })
}
