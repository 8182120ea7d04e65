use log::*;

use crate::{
    db_types::{Setting, Settings},
    traits::{SettingsApiError, SettingsManagement},
};

/// Operator access to the runtime-configurable ledger parameters.
#[derive(Debug, Clone)]
pub struct SettingsApi<B> {
    db: B,
}

impl<B> SettingsApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> SettingsApi<B>
where B: SettingsManagement
{
    pub async fn settings(&self) -> Result<Settings, SettingsApiError> {
        self.db.fetch_settings().await
    }

    pub async fn all_settings(&self) -> Result<Vec<Setting>, SettingsApiError> {
        self.db.fetch_all_settings().await
    }

    /// Updates a named setting. Transactions resolved after this call use the new value; pending transactions are
    /// not rewritten.
    pub async fn update_setting(&self, name: &str, value: &str) -> Result<Setting, SettingsApiError> {
        let setting = self.db.update_setting(name, value).await?;
        info!("🪛️ Setting {name} updated to {value}");
        Ok(setting)
    }
}
