use std::{str::FromStr, sync::Arc};

use airtime_payment_engine::{DisbursementProvider, ProviderResult};
use apg_common::Money;
use async_trait::async_trait;
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
};

use crate::{
    config::StatumConfig,
    data_objects::{wire_amount, AirtimeRequest, StatumAirtimeResponse, StatumBalanceResponse},
    ProviderApiError,
};

pub const PROVIDER_NAME: &str = "statum";

/// Client for the Statum airtime disbursement API, funded by the platform's prepaid float.
#[derive(Clone)]
pub struct StatumApi {
    client: Arc<Client>,
    base_url: String,
}

impl StatumApi {
    pub fn new(config: StatumConfig) -> Result<Self, ProviderApiError> {
        let mut headers = HeaderMap::with_capacity(3);
        let key = HeaderValue::from_str(config.api_key.reveal())
            .map_err(|e| ProviderApiError::Initialization(e.to_string()))?;
        let secret = HeaderValue::from_str(config.api_secret.reveal())
            .map_err(|e| ProviderApiError::Initialization(e.to_string()))?;
        headers.insert("X-Api-Key", key);
        headers.insert("X-Api-Secret", secret);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| ProviderApiError::Initialization(e.to_string()))?;
        Ok(Self { client: Arc::new(client), base_url: config.base_url })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send_request(&self, body: &AirtimeRequest) -> Result<StatumAirtimeResponse, ProviderApiError> {
        let response = self
            .client
            .post(self.url("/airtime"))
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderApiError::ResponseError(e.to_string()))?;
        if response.status().is_success() {
            response.json::<StatumAirtimeResponse>().await.map_err(|e| ProviderApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| ProviderApiError::ResponseError(e.to_string()))?;
            Err(ProviderApiError::QueryError { status, message })
        }
    }
}

#[async_trait]
impl DisbursementProvider for StatumApi {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn send_airtime(&self, msisdn: &str, amount: Money) -> ProviderResult {
        let body = AirtimeRequest { phone_number: msisdn.to_string(), amount: wire_amount(amount) };
        debug!("📡️ Sending {amount} of airtime to {msisdn}");
        match self.send_request(&body).await {
            Ok(response) if response.is_success() => ProviderResult::Completed { receipt_code: response.receipt },
            Ok(response) => ProviderResult::Declined {
                code: response.response_code.unwrap_or_else(|| response.status.clone()),
                message: response.description.unwrap_or_else(|| "The airtime could not be sent".into()),
            },
            Err(ProviderApiError::QueryError { status, message }) if (400..500).contains(&status) => {
                ProviderResult::Declined { code: status.to_string(), message }
            },
            Err(e) => {
                warn!("📡️ Airtime send to {msisdn} did not get a definite answer: {e}");
                ProviderResult::Unavailable { reason: e.to_string() }
            },
        }
    }

    async fn float_balance(&self) -> Option<Money> {
        let response = match self.client.get(self.url("/balance")).send().await {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                warn!("📡️ Balance query failed with status {}", r.status());
                return None;
            },
            Err(e) => {
                warn!("📡️ Balance query failed: {e}");
                return None;
            },
        };
        let balance = response
            .json::<StatumBalanceResponse>()
            .await
            .ok()
            .and_then(|b| Money::from_str(&b.balance).ok());
        if balance.is_none() {
            warn!("📡️ Balance response could not be parsed");
        }
        balance
    }
}
