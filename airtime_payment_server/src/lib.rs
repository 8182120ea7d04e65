//! # Airtime payment server
//! This module hosts the REST server for the airtime reselling ledger. It is responsible for:
//! * Serving the account, deposit, airtime and conversion endpoints.
//! * Receiving and reconciling asynchronous provider callbacks.
//! * The operator console endpoints under `/admin`, guarded by an API key.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/api/...`: The user-facing ledger API.
//! * `/callback/{provider}`: The webhook the payment providers post their results to.
//! * `/admin/...`: Operator endpoints, requiring the `X-APG-Admin-Key` header.

pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod middleware;
pub mod receipts;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
