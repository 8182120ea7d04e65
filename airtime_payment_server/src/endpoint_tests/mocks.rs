//! Scripted provider stubs: each call pops the next pre-programmed result, and an exhausted script reads as the
//! provider being unreachable.

use std::{collections::VecDeque, sync::Arc};

use airtime_payment_engine::{db_types::TxReference, CollectionProvider, DisbursementProvider, ProviderResult};
use apg_common::Money;
use async_trait::async_trait;
use tokio::sync::Mutex;

pub struct ScriptedCollection {
    script: Mutex<VecDeque<ProviderResult>>,
}

impl ScriptedCollection {
    pub fn new<I: IntoIterator<Item = ProviderResult>>(results: I) -> Arc<Self> {
        Arc::new(Self { script: Mutex::new(results.into_iter().collect()) })
    }
}

#[async_trait]
impl CollectionProvider for ScriptedCollection {
    fn name(&self) -> &str {
        "paynecta"
    }

    async fn initiate(&self, _msisdn: &str, _amount: Money, _reference: &TxReference) -> ProviderResult {
        self.script.lock().await.pop_front().unwrap_or(ProviderResult::Unavailable { reason: "script exhausted".into() })
    }

    async fn query(&self, _reference: &TxReference) -> ProviderResult {
        self.script.lock().await.pop_front().unwrap_or(ProviderResult::Unavailable { reason: "script exhausted".into() })
    }
}

pub struct ScriptedDisbursement {
    script: Mutex<VecDeque<ProviderResult>>,
}

impl ScriptedDisbursement {
    pub fn new<I: IntoIterator<Item = ProviderResult>>(results: I) -> Arc<Self> {
        Arc::new(Self { script: Mutex::new(results.into_iter().collect()) })
    }
}

#[async_trait]
impl DisbursementProvider for ScriptedDisbursement {
    fn name(&self) -> &str {
        "statum"
    }

    async fn send_airtime(&self, _msisdn: &str, _amount: Money) -> ProviderResult {
        self.script.lock().await.pop_front().unwrap_or(ProviderResult::Unavailable { reason: "script exhausted".into() })
    }

    async fn float_balance(&self) -> Option<Money> {
        Some(Money::from_shillings(5_000))
    }
}

pub fn accepted(correlation_id: &str) -> ProviderResult {
    ProviderResult::Accepted { correlation_id: correlation_id.to_string() }
}

pub fn completed(receipt: &str) -> ProviderResult {
    ProviderResult::Completed { receipt_code: Some(receipt.to_string()) }
}
