use apg_common::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{QueuedPurchase, Transaction, TransactionKind, TransactionStatus};

//--------------------------------------  CallbackUpdate   -----------------------------------------------------------
/// A provider callback, reduced to the engine-neutral fields reconciliation needs. The server layer maps each
/// provider's wire format onto this.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackUpdate {
    /// Our reference or the provider's correlation id; matched exactly against the stored values.
    pub key: String,
    pub success: bool,
    /// The provider's decline code when `success` is false
    pub result_code: Option<String>,
    pub result_message: Option<String>,
    /// The provider settlement code, e.g. an M-Pesa receipt
    pub receipt_code: Option<String>,
    /// The amount the provider says it settled. Logged when it disagrees with the intent; the intent amount governs.
    pub amount: Option<Money>,
}

impl CallbackUpdate {
    pub fn success<S: Into<String>>(key: S, receipt_code: Option<String>) -> Self {
        Self { key: key.into(), success: true, result_code: None, result_message: None, receipt_code, amount: None }
    }

    pub fn failure<S: Into<String>>(key: S, code: Option<String>, message: Option<String>) -> Self {
        Self {
            key: key.into(),
            success: false,
            result_code: code,
            result_message: message,
            receipt_code: None,
            amount: None,
        }
    }

    pub fn with_amount(mut self, amount: Money) -> Self {
        self.amount = Some(amount);
        self
    }
}

//-------------------------------------- CallbackResolution ----------------------------------------------------------
/// What a callback did to the ledger.
#[derive(Debug, Clone)]
pub enum CallbackResolution {
    /// The transaction settled and any credit was applied
    Settled(Transaction),
    /// The transaction was marked failed (and any reserve debit reversed)
    Failed(Transaction),
    /// The transaction was already terminal. Acknowledged without side effect.
    AlreadyResolved(Transaction),
}

//--------------------------------------   AirtimeOutcome   ----------------------------------------------------------
/// The result of an airtime purchase request.
#[derive(Debug, Clone)]
pub enum AirtimeOutcome {
    /// The provider delivered (or accepted) the airtime; the wallet was debited the requested amount.
    Delivered(Transaction),
    /// The balance fell short. No transaction was created; the purchase waits in the queue for the next credit.
    Queued { purchase: QueuedPurchase, shortfall: Money },
}

//-------------------------------------- TransactionFilter -----------------------------------------------------------
/// Criteria for transaction history queries. Empty fields match everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionFilter {
    pub account_id: Option<i64>,
    pub kind: Option<TransactionKind>,
    pub status: Option<TransactionStatus>,
    pub provider: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl TransactionFilter {
    pub fn is_empty(&self) -> bool {
        self.account_id.is_none()
            && self.kind.is_none()
            && self.status.is_none()
            && self.provider.is_none()
            && self.since.is_none()
            && self.until.is_none()
    }

    pub fn for_account(account_id: i64) -> Self {
        Self { account_id: Some(account_id), ..Self::default() }
    }

    pub fn with_kind(mut self, kind: TransactionKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_status(mut self, status: TransactionStatus) -> Self {
        self.status = Some(status);
        self
    }
}

//--------------------------------------     Pagination     ----------------------------------------------------------
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Pagination {
    pub offset: i64,
    pub limit: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self { offset: 0, limit: 50 }
    }
}

//--------------------------------------     LedgerStats    ----------------------------------------------------------
/// Platform-wide counters for the admin dashboard.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerStats {
    pub total_accounts: i64,
    pub total_balance: Money,
    pub deposits_settled: i64,
    pub total_deposited: Money,
    pub airtime_sold: i64,
    pub total_airtime: Money,
    pub pending_transactions: i64,
    pub failed_transactions: i64,
    pub queued_purchases: i64,
}
