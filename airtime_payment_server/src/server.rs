use std::{sync::Arc, time::Duration};

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use airtime_payment_engine::{
    AccountApi,
    CollectionProvider,
    DisbursementProvider,
    LedgerFlowApi,
    SettingsApi,
    SqliteDatabase,
};
use apg_common::Secret;
use provider_tools::{PayNectaApi, StatumApi};

use crate::{
    config::ServerConfig,
    errors::ServerError,
    middleware::ApiKeyMiddlewareFactory,
    routes::{
        account_history,
        account_notifications,
        account_queue,
        adjust_balance,
        admin_accounts,
        admin_stats,
        admin_transactions,
        admin_verifications,
        approve_verification,
        broadcast,
        buy_airtime,
        check_float,
        deposit_status,
        direct_purchase,
        get_account,
        get_receipt,
        get_settings,
        health,
        initiate_conversion,
        initiate_deposit,
        mark_notification_read,
        provider_callback,
        register_account,
        reject_verification,
        set_account_status,
        submit_conversion_receipt,
        submit_verification,
        update_setting,
    },
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let collection: Arc<dyn CollectionProvider> = Arc::new(
        PayNectaApi::new(config.paynecta.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?,
    );
    let disbursement: Arc<dyn DisbursementProvider> =
        Arc::new(StatumApi::new(config.statum.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?);
    let srv = create_server_instance(config, db, collection, disbursement)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    collection: Arc<dyn CollectionProvider>,
    disbursement: Arc<dyn DisbursementProvider>,
) -> Result<Server, ServerError> {
    let srv = HttpServer::new(move || {
        let ledger_api = LedgerFlowApi::new(db.clone(), Arc::clone(&collection), Arc::clone(&disbursement));
        let accounts_api = AccountApi::new(db.clone());
        let settings_api = SettingsApi::new(db.clone());
        let admin_key = config.admin_api_key.clone();
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("apg::access_log"))
            .app_data(web::Data::new(ledger_api))
            .app_data(web::Data::new(accounts_api))
            .app_data(web::Data::new(settings_api))
            .configure(|cfg| configure_routes(cfg, admin_key))
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}

/// Registers every route on the given service config. The admin key guards the `/admin` scope.
pub fn configure_routes(cfg: &mut web::ServiceConfig, admin_key: Secret<String>) {
    let api_scope = web::scope("/api")
        .service(register_account)
        .service(get_account)
        .service(account_history)
        .service(account_notifications)
        .service(mark_notification_read)
        .service(account_queue)
        .service(initiate_deposit)
        .service(deposit_status)
        .service(buy_airtime)
        .service(direct_purchase)
        .service(submit_verification)
        .service(initiate_conversion)
        .service(submit_conversion_receipt)
        .service(get_receipt);
    let callback_scope = web::scope("/callback").service(provider_callback);
    let admin_scope = web::scope("/admin")
        .wrap(ApiKeyMiddlewareFactory::new(admin_key))
        .service(admin_accounts)
        .service(admin_stats)
        .service(admin_transactions)
        .service(admin_verifications)
        .service(approve_verification)
        .service(reject_verification)
        .service(adjust_balance)
        .service(set_account_status)
        .service(get_settings)
        .service(update_setting)
        .service(broadcast)
        .service(check_float);
    cfg.service(health).service(api_scope).service(callback_scope).service(admin_scope);
}
