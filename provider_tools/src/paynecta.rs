use std::sync::Arc;

use airtime_payment_engine::{db_types::TxReference, CollectionProvider, ProviderResult};
use apg_common::Money;
use async_trait::async_trait;
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::{
    config::PayNectaConfig,
    data_objects::{wire_amount, PayNectaStkResponse, StkPushRequest},
    ProviderApiError,
};

pub const PROVIDER_NAME: &str = "paynecta";

/// Client for the PayNecta mobile-money collection API.
///
/// The ledger never sees a transport error from this client: anything that prevents a definite answer maps to
/// [`ProviderResult::Unavailable`], and a definite rejection maps to [`ProviderResult::Declined`].
#[derive(Clone)]
pub struct PayNectaApi {
    config: PayNectaConfig,
    client: Arc<Client>,
}

impl PayNectaApi {
    pub fn new(config: PayNectaConfig) -> Result<Self, ProviderApiError> {
        let mut headers = HeaderMap::with_capacity(2);
        let val = HeaderValue::from_str(&format!("Bearer {}", config.api_key.reveal()))
            .map_err(|e| ProviderApiError::Initialization(e.to_string()))?;
        headers.insert("Authorization", val);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| ProviderApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T, ProviderApiError> {
        let url = self.url(path);
        trace!("Sending POST to {url}");
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderApiError::ResponseError(e.to_string()))?;
        if response.status().is_success() {
            response.json::<T>().await.map_err(|e| ProviderApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| ProviderApiError::ResponseError(e.to_string()))?;
            Err(ProviderApiError::QueryError { status, message })
        }
    }

    fn to_result(response: PayNectaStkResponse) -> ProviderResult {
        if response.is_success() {
            return ProviderResult::Completed { receipt_code: response.receipt };
        }
        if response.is_queued() {
            match response.checkout_id {
                Some(correlation_id) => ProviderResult::Accepted { correlation_id },
                None => ProviderResult::Unavailable { reason: "PayNecta queued the request without a checkout id".into() },
            }
        } else {
            ProviderResult::Declined {
                code: response.response_code.unwrap_or_else(|| response.status.clone()),
                message: response.message.unwrap_or_else(|| "The payment was not completed".into()),
            }
        }
    }

    fn error_to_result(e: ProviderApiError) -> ProviderResult {
        match e {
            // A definitive rejection from the API is a decline; anything else means we do not know.
            ProviderApiError::QueryError { status, message } if (400..500).contains(&status) => {
                ProviderResult::Declined { code: status.to_string(), message }
            },
            e => ProviderResult::Unavailable { reason: e.to_string() },
        }
    }
}

#[async_trait]
impl CollectionProvider for PayNectaApi {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn initiate(&self, msisdn: &str, amount: Money, reference: &TxReference) -> ProviderResult {
        let body = StkPushRequest {
            shortcode: self.config.shortcode.clone(),
            phone_number: msisdn.to_string(),
            amount: wire_amount(amount),
            reference: reference.to_string(),
            callback_url: self.config.callback_url.clone(),
        };
        debug!("💳️ Sending STK push of {amount} to {msisdn} for [{reference}]");
        match self.post::<PayNectaStkResponse, _>("/express/initiate", &body).await {
            Ok(response) => Self::to_result(response),
            Err(e) => {
                warn!("💳️ STK push for [{reference}] did not get a definite answer: {e}");
                Self::error_to_result(e)
            },
        }
    }

    async fn query(&self, reference: &TxReference) -> ProviderResult {
        let body = serde_json::json!({ "reference": reference.as_str() });
        match self.post::<PayNectaStkResponse, _>("/express/status", &body).await {
            Ok(response) => Self::to_result(response),
            Err(e) => Self::error_to_result(e),
        }
    }
}
