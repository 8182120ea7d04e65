//! HTTP clients for the external payment providers.
//!
//! [`PayNectaApi`] talks to the PayNecta mobile-money collection service (STK push) and [`StatumApi`] to the Statum
//! airtime disbursement service. Both implement the engine's provider ports, translating every transport or HTTP
//! failure into a [`airtime_payment_engine::ProviderResult`] so the ledger can resolve transactions
//! deterministically.
mod config;
mod error;
mod paynecta;
mod statum;

mod data_objects;

pub use config::{PayNectaConfig, StatumConfig};
pub use data_objects::{PayNectaCallback, PayNectaStkResponse, StatumAirtimeResponse, StatumBalanceResponse};
pub use error::ProviderApiError;
pub use paynecta::PayNectaApi;
pub use statum::StatumApi;
