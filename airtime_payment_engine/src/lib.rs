//! Airtime Payment Engine
//!
//! The ledger and reconciliation service for the airtime reselling platform. The engine owns every write to
//! `Account.balance` and `Transaction.status`; everything else in the system only reads.
//!
//! The library is divided into three main sections:
//! 1. Database management ([`mod@sqlite`]). SQLite is the supported backend. You should never need to access the
//!    database directly; use the public API instead. The exception is the data types used in the database, which are
//!    defined in the `db_types` module and are public.
//! 2. The backend traits ([`mod@traits`]). A backend must implement [`LedgerDatabase`] (and its super-traits) to
//!    drive the engine. The payment-provider ports ([`traits::CollectionProvider`] and
//!    [`traits::DisbursementProvider`]) also live here; concrete HTTP clients are supplied by the `provider_tools`
//!    crate.
//! 3. The public API ([`mod@api`]). [`LedgerFlowApi`] carries the transaction state machine: intent creation,
//!    reconciliation of synchronous responses and asynchronous callbacks, queued-purchase settlement, manual
//!    verification and balance adjustments. [`AccountApi`] and [`SettingsApi`] are the read-side query surfaces.

pub mod api;
pub mod db_types;
pub mod helpers;
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use api::{
    accounts_api::AccountApi,
    ledger_flow_api::LedgerFlowApi,
    objects::{AirtimeOutcome, CallbackResolution, CallbackUpdate, LedgerStats, TransactionFilter},
    settings_api::SettingsApi,
};
pub use traits::{
    AccountApiError,
    AccountManagement,
    CollectionProvider,
    DisbursementProvider,
    LedgerDatabase,
    LedgerError,
    ProviderResult,
    SettingsApiError,
    SettingsManagement,
};
