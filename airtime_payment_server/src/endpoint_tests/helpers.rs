//! A throwaway server instance per test: a fresh migrated SQLite database, scripted providers, and request helpers
//! that return the status code and body.

use std::sync::Arc;

use actix_web::{http::StatusCode, test, test::TestRequest, web, App};
use airtime_payment_engine::{
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    AccountApi,
    CollectionProvider,
    DisbursementProvider,
    LedgerFlowApi,
    ProviderResult,
    SettingsApi,
    SqliteDatabase,
};
use apg_common::Secret;

use super::mocks::{ScriptedCollection, ScriptedDisbursement};
use crate::{middleware::ADMIN_KEY_HEADER, server::configure_routes};

pub const TEST_ADMIN_KEY: &str = "test-admin-key";

pub struct TestContext {
    pub db: SqliteDatabase,
    collection: Arc<ScriptedCollection>,
    disbursement: Arc<ScriptedDisbursement>,
}

impl TestContext {
    pub async fn new(
        collection_script: Vec<ProviderResult>,
        disbursement_script: Vec<ProviderResult>,
    ) -> Self {
        let url = random_db_path();
        prepare_test_env(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
        Self {
            db,
            collection: ScriptedCollection::new(collection_script),
            disbursement: ScriptedDisbursement::new(disbursement_script),
        }
    }

    /// Builds the full route tree and runs a single request against it. The database outlives the app, so state
    /// carries across requests within a test.
    pub async fn request(&self, req: TestRequest) -> (StatusCode, String) {
        let collection = Arc::clone(&self.collection) as Arc<dyn CollectionProvider>;
        let disbursement = Arc::clone(&self.disbursement) as Arc<dyn DisbursementProvider>;
        let ledger_api = LedgerFlowApi::new(self.db.clone(), collection, disbursement);
        let app = App::new()
            .app_data(web::Data::new(ledger_api))
            .app_data(web::Data::new(AccountApi::new(self.db.clone())))
            .app_data(web::Data::new(SettingsApi::new(self.db.clone())))
            .configure(|cfg| configure_routes(cfg, Secret::new(TEST_ADMIN_KEY.to_string())));
        let service = test::init_service(app).await;
        match test::try_call_service(&service, req.to_request()).await {
            Ok(res) => {
                let status = res.status();
                let body = test::read_body(res).await;
                (status, String::from_utf8_lossy(&body).into_owned())
            },
            // Middleware rejections surface as service errors rather than responses
            Err(e) => (e.as_response_error().status_code(), e.to_string()),
        }
    }

    pub async fn get(&self, path: &str) -> (StatusCode, String) {
        self.request(TestRequest::get().uri(path)).await
    }

    pub async fn post(&self, path: &str, body: serde_json::Value) -> (StatusCode, String) {
        self.request(TestRequest::post().uri(path).set_json(body)).await
    }

    pub async fn admin_get(&self, path: &str) -> (StatusCode, String) {
        self.request(TestRequest::get().uri(path).insert_header((ADMIN_KEY_HEADER, TEST_ADMIN_KEY))).await
    }

    pub async fn admin_post(&self, path: &str, body: serde_json::Value) -> (StatusCode, String) {
        self.request(TestRequest::post().uri(path).insert_header((ADMIN_KEY_HEADER, TEST_ADMIN_KEY)).set_json(body))
            .await
    }

    /// Registers an account and returns its JSON representation.
    pub async fn register(&self, handle: &str, msisdn: &str) -> serde_json::Value {
        let (status, body) =
            self.post("/api/accounts", serde_json::json!({ "handle": handle, "msisdn": msisdn })).await;
        assert_eq!(status, StatusCode::CREATED, "registration failed: {body}");
        json(&body)
    }
}

pub fn json(body: &str) -> serde_json::Value {
    serde_json::from_str(body).unwrap_or_else(|e| panic!("Invalid JSON body ({e}): {body}"))
}
