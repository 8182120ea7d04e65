use std::fmt::Display;

use apg_common::Money;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::db_types::TxReference;

//--------------------------------------   ProviderResult   ----------------------------------------------------------
/// The outcome of a provider call.
///
/// Transport failures (connection refused, timeout) are a *result* (`Unavailable`), not an error: the caller marks
/// the transaction failed deterministically instead of leaving it stuck pending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderResult {
    /// The provider accepted the request and will report the outcome asynchronously via callback.
    Accepted { correlation_id: String },
    /// The provider completed the request synchronously.
    Completed { receipt_code: Option<String> },
    /// The provider processed the request and rejected it.
    Declined { code: String, message: String },
    /// The provider could not be reached, or timed out. Retryable.
    Unavailable { reason: String },
}

impl Display for ProviderResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderResult::Accepted { correlation_id } => write!(f, "Accepted ({correlation_id})"),
            ProviderResult::Completed { receipt_code } => {
                write!(f, "Completed ({})", receipt_code.as_deref().unwrap_or("no receipt"))
            },
            ProviderResult::Declined { code, message } => write!(f, "Declined ({code}: {message})"),
            ProviderResult::Unavailable { reason } => write!(f, "Unavailable ({reason})"),
        }
    }
}

//-------------------------------------- CollectionProvider ----------------------------------------------------------
/// A mobile-money collection service: prompts the payer's phone (STK push) to authorise a charge and reports the
/// outcome through the `/callback/{provider}` webhook, correlated by our reference or the provider's correlation id.
#[async_trait]
pub trait CollectionProvider: Send + Sync {
    /// The provider name as recorded on transactions and used in the callback route.
    fn name(&self) -> &str;

    /// Sends the STK push. The transaction intent for `reference` must already be persisted, so that a callback
    /// racing the synchronous response still resolves.
    async fn initiate(&self, msisdn: &str, amount: Money, reference: &TxReference) -> ProviderResult;

    /// Queries the current status of a previously initiated collection.
    async fn query(&self, reference: &TxReference) -> ProviderResult;
}

//-------------------------------------- DisbursementProvider --------------------------------------------------------
/// An airtime disbursement service, funded by the platform's prepaid float.
#[async_trait]
pub trait DisbursementProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Sends airtime of the given value to the phone number.
    async fn send_airtime(&self, msisdn: &str, amount: Money) -> ProviderResult;

    /// The provider-side prepaid balance, if it can be read right now.
    async fn float_balance(&self) -> Option<Money>;
}
