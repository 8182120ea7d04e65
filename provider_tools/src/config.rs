use apg_common::Secret;
use log::*;

#[derive(Debug, Clone, Default)]
pub struct PayNectaConfig {
    pub base_url: String,
    pub api_key: Secret<String>,
    /// The short code money is collected into
    pub shortcode: String,
    /// Where PayNecta posts its result callbacks
    pub callback_url: String,
}

impl PayNectaConfig {
    pub fn new_from_env_or_default() -> Self {
        let base_url = std::env::var("APG_PAYNECTA_BASE_URL").unwrap_or_else(|_| {
            warn!("APG_PAYNECTA_BASE_URL not set, using the production endpoint");
            "https://api.paynecta.com/v1".to_string()
        });
        let api_key = Secret::new(std::env::var("APG_PAYNECTA_API_KEY").unwrap_or_else(|_| {
            warn!("APG_PAYNECTA_API_KEY not set, using (probably useless) default");
            "pn_test_00000000".to_string()
        }));
        let shortcode = std::env::var("APG_PAYNECTA_SHORTCODE").unwrap_or_else(|_| {
            warn!("APG_PAYNECTA_SHORTCODE not set, using (probably useless) default");
            "000000".to_string()
        });
        let callback_url = std::env::var("APG_PAYNECTA_CALLBACK_URL").unwrap_or_else(|_| {
            warn!("APG_PAYNECTA_CALLBACK_URL not set, using localhost");
            "http://localhost:8360/callback/paynecta".to_string()
        });
        Self { base_url, api_key, shortcode, callback_url }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StatumConfig {
    pub base_url: String,
    pub api_key: Secret<String>,
    pub api_secret: Secret<String>,
}

impl StatumConfig {
    pub fn new_from_env_or_default() -> Self {
        let base_url = std::env::var("APG_STATUM_BASE_URL").unwrap_or_else(|_| {
            warn!("APG_STATUM_BASE_URL not set, using the production endpoint");
            "https://api.statum.co.ke/api/v2".to_string()
        });
        let api_key = Secret::new(std::env::var("APG_STATUM_API_KEY").unwrap_or_else(|_| {
            warn!("APG_STATUM_API_KEY not set, using (probably useless) default");
            "st_test_00000000".to_string()
        }));
        let api_secret = Secret::new(std::env::var("APG_STATUM_API_SECRET").unwrap_or_else(|_| {
            warn!("APG_STATUM_API_SECRET not set, using (probably useless) default");
            "00000000".to_string()
        }));
        Self { base_url, api_key, api_secret }
    }
}
