use thiserror::Error;

use crate::db_types::{Setting, Settings};

#[derive(Debug, Clone, Error)]
pub enum SettingsApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Unknown setting: {0}")]
    UnknownSetting(String),
    #[error("Invalid value for setting {name}: {reason}")]
    InvalidValue { name: String, reason: String },
}

impl From<sqlx::Error> for SettingsApiError {
    fn from(e: sqlx::Error) -> Self {
        SettingsApiError::DatabaseError(e.to_string())
    }
}

/// Access to the small store of named, runtime-configurable ledger parameters.
///
/// Reconciliation reads a fresh [`Settings`] snapshot on every resolution, so an operator change takes effect for
/// any transaction resolved after it, including transactions opened before it.
#[allow(async_fn_in_trait)]
pub trait SettingsManagement {
    /// Reads the current snapshot. Missing or unparseable rows fall back to the documented defaults.
    async fn fetch_settings(&self) -> Result<Settings, SettingsApiError>;

    /// Returns the raw settings rows.
    async fn fetch_all_settings(&self) -> Result<Vec<Setting>, SettingsApiError>;

    /// Updates a single named setting. The value must parse for the setting's type, and the name must be one of the
    /// known settings; arbitrary names are rejected.
    async fn update_setting(&self, name: &str, value: &str) -> Result<Setting, SettingsApiError>;
}
