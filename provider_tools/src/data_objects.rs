use airtime_payment_engine::CallbackUpdate;
use apg_common::Money;
use serde::{Deserialize, Serialize};

/// Providers take plain decimal amounts without a currency tag; everything is KES.
pub fn wire_amount(amount: Money) -> String {
    let cents = amount.value();
    format!("{}.{:02}", cents / 100, cents % 100)
}

//--------------------------------------   PayNecta wire   -----------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct StkPushRequest {
    pub shortcode: String,
    pub phone_number: String,
    pub amount: String,
    pub reference: String,
    pub callback_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PayNectaStkResponse {
    pub status: String,
    #[serde(default)]
    pub checkout_id: Option<String>,
    #[serde(default)]
    pub receipt: Option<String>,
    #[serde(default)]
    pub response_code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl PayNectaStkResponse {
    pub fn is_queued(&self) -> bool {
        matches!(self.status.as_str(), "QUEUED" | "PENDING")
    }

    pub fn is_success(&self) -> bool {
        self.status == "SUCCESS"
    }
}

/// The callback PayNecta posts to `/callback/paynecta` once the payer has responded to the STK prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayNectaCallback {
    #[serde(default)]
    pub checkout_id: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
    pub status: String,
    #[serde(default)]
    pub receipt: Option<String>,
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub response_code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl PayNectaCallback {
    /// The correlation key: our reference when present, the provider's checkout id otherwise.
    pub fn key(&self) -> Option<String> {
        self.reference.clone().or_else(|| self.checkout_id.clone())
    }
}

impl From<PayNectaCallback> for CallbackUpdate {
    fn from(cb: PayNectaCallback) -> Self {
        let key = cb.key().unwrap_or_default();
        let mut update = if cb.status == "SUCCESS" {
            CallbackUpdate::success(key, cb.receipt)
        } else {
            CallbackUpdate::failure(key, cb.response_code, cb.message)
        };
        if let Some(amount) = cb.amount.as_deref().and_then(|a| a.parse::<Money>().ok()) {
            update = update.with_amount(amount);
        }
        update
    }
}

//--------------------------------------    Statum wire    -----------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct AirtimeRequest {
    pub phone_number: String,
    pub amount: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatumAirtimeResponse {
    pub status: String,
    #[serde(default)]
    pub receipt: Option<String>,
    #[serde(default)]
    pub response_code: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl StatumAirtimeResponse {
    pub fn is_success(&self) -> bool {
        self.status == "SUCCESS"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatumBalanceResponse {
    pub balance: String,
}
