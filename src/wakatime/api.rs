//! Wire types for the two WakaTime reads. Every field is optional on the
//! wire; normalization happens in the client.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// WakaTime wraps every response body in a `data` object.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
}

/// `GET /users/current`, reduced to the last-seen fields.
#[derive(Debug, Default, Deserialize)]
pub struct CurrentUser {
    #[serde(default)]
    pub last_project: Option<String>,
    #[serde(default)]
    pub last_language: Option<String>,
    #[serde(default)]
    pub languages: Option<Vec<LanguageUsage>>,
}

/// `GET /users/current/status_bar/today`.
#[derive(Debug, Default, Deserialize)]
pub struct StatusBarToday {
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub heartbeat_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub grand_total: Option<GrandTotal>,
    #[serde(default)]
    pub languages: Option<Vec<LanguageUsage>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GrandTotal {
    #[serde(default)]
    pub total_seconds: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LanguageUsage {
    pub name: String,
    #[serde(default)]
    pub total_seconds: f64,
}
