use std::env;

use apg_common::Secret;
use log::*;
use provider_tools::{PayNectaConfig, StatumConfig};

const DEFAULT_APG_HOST: &str = "127.0.0.1";
const DEFAULT_APG_PORT: u16 = 8360;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// The shared key operators must present in the `X-APG-Admin-Key` header.
    pub admin_api_key: Secret<String>,
    pub paynecta: PayNectaConfig,
    pub statum: StatumConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_APG_HOST.to_string(),
            port: DEFAULT_APG_PORT,
            database_url: String::default(),
            admin_api_key: Secret::default(),
            paynecta: PayNectaConfig::default(),
            statum: StatumConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("APG_HOST").ok().unwrap_or_else(|| DEFAULT_APG_HOST.into());
        let port = env::var("APG_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for APG_PORT. {e} Using the default, {DEFAULT_APG_PORT}, instead."
                    );
                    DEFAULT_APG_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_APG_PORT);
        let database_url = env::var("APG_DATABASE_URL").unwrap_or_else(|_| {
            warn!("🪛️ APG_DATABASE_URL is not set. Using the default, sqlite://data/airtime_ledger.db");
            "sqlite://data/airtime_ledger.db".to_string()
        });
        let admin_api_key = Secret::new(env::var("APG_ADMIN_API_KEY").unwrap_or_else(|_| {
            warn!("🪛️ APG_ADMIN_API_KEY is not set. The /admin endpoints will reject every request.");
            String::default()
        }));
        let paynecta = PayNectaConfig::new_from_env_or_default();
        let statum = StatumConfig::new_from_env_or_default();
        Self { host, port, database_url, admin_api_key, paynecta, statum }
    }
}
