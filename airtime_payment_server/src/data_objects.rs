use std::fmt::Display;

use airtime_payment_engine::db_types::{AccountStatus, Severity, TransactionKind, TransactionStatus};
use apg_common::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterAccountRequest {
    pub handle: String,
    pub msisdn: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositRequest {
    pub account_id: i64,
    /// The paying phone, if different from the account's registered number
    #[serde(default)]
    pub msisdn: Option<String>,
    pub amount: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AirtimePurchaseRequest {
    pub account_id: i64,
    pub recipient: String,
    pub amount: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectPurchaseRequest {
    pub payer: String,
    pub recipient: String,
    pub amount: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationSubmission {
    pub account_id: i64,
    pub receipt_code: String,
    pub amount: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionRequest {
    pub account_id: i64,
    /// The line the airtime will be sent from, if different from the registered number
    #[serde(default)]
    pub msisdn: Option<String>,
    pub amount: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionReceiptRequest {
    pub reference: String,
    pub receipt_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRequest {
    pub reviewed_by: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustmentRequest {
    pub account_id: i64,
    /// Positive credits, negative debits
    pub delta: Money,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: AccountStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingUpdateRequest {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastRequest {
    pub title: String,
    pub message: String,
    pub severity: Severity,
}

/// Query parameters for the admin transaction search.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionQuery {
    #[serde(default)]
    pub account_id: Option<i64>,
    #[serde(default)]
    pub kind: Option<TransactionKind>,
    #[serde(default)]
    pub status: Option<TransactionStatus>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub since: Option<DateTime<Utc>>,
    #[serde(default)]
    pub until: Option<DateTime<Utc>>,
}

impl From<TransactionQuery> for airtime_payment_engine::TransactionFilter {
    fn from(q: TransactionQuery) -> Self {
        Self { account_id: q.account_id, kind: q.kind, status: q.status, provider: q.provider, since: q.since, until: q.until }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaginationQuery {
    #[serde(default)]
    pub offset: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread_only: bool,
}
