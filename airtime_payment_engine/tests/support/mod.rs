//! Shared helpers for the ledger flow tests: a throwaway database per test and scripted provider stubs that return
//! a pre-programmed sequence of results.
pub mod prepare_env;

use std::{collections::VecDeque, sync::Arc};

use airtime_payment_engine::{
    db_types::TxReference,
    CollectionProvider,
    DisbursementProvider,
    LedgerFlowApi,
    ProviderResult,
    SqliteDatabase,
};
use apg_common::Money;
use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::support::prepare_env::{prepare_test_env, random_db_path};

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
    pub float: Option<Money>,
}

impl ScriptedDisbursement {
    pub fn new<I: IntoIterator<Item = ProviderResult>>(results: I) -> Arc<Self> {
        Arc::new(Self { script: Mutex::new(results.into_iter().collect()), float: None })
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
        self.float
    }
}

pub fn accepted(correlation_id: &str) -> ProviderResult {
    ProviderResult::Accepted { correlation_id: correlation_id.to_string() }
}

pub fn completed(receipt: &str) -> ProviderResult {
    ProviderResult::Completed { receipt_code: Some(receipt.to_string()) }
}

pub fn declined(code: &str, message: &str) -> ProviderResult {
    ProviderResult::Declined { code: code.to_string(), message: message.to_string() }
}

/// A fresh migrated database plus a flow API wired to the given provider scripts.
pub async fn new_ledger(
    collection: Arc<ScriptedCollection>,
    disbursement: Arc<ScriptedDisbursement>,
) -> (LedgerFlowApi<SqliteDatabase>, SqliteDatabase) {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
    let api = LedgerFlowApi::new(db.clone(), collection, disbursement);
    (api, db)
}
