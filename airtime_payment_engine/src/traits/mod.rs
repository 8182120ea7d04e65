//! The behaviour a storage backend (and the payment providers) must implement to drive the engine.
//!
//! * [`LedgerDatabase`] — the write side. Every balance mutation and status transition goes through here, and each
//!   multi-statement mutation is atomic.
//! * [`AccountManagement`] — the read side: accounts, transactions, notifications, stats.
//! * [`SettingsManagement`] — the runtime-configurable ledger parameters.
//! * [`CollectionProvider`] / [`DisbursementProvider`] — ports onto the two upstream payment services.

mod account_management;
mod ledger_database;
mod payment_provider;
mod settings_management;

pub use account_management::{AccountApiError, AccountManagement};
pub use ledger_database::{LedgerDatabase, LedgerError};
pub use payment_provider::{CollectionProvider, DisbursementProvider, ProviderResult};
pub use settings_management::{SettingsApiError, SettingsManagement};
