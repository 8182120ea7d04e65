//! The public-facing API of the ledger engine.
//!
//! [`ledger_flow_api::LedgerFlowApi`] is the write side: it drives intents through the providers and applies
//! reconciliation outcomes. [`accounts_api::AccountApi`] and [`settings_api::SettingsApi`] are thin read-side
//! wrappers around the backend traits.

pub mod accounts_api;
pub mod ledger_flow_api;
pub mod objects;
pub mod settings_api;
