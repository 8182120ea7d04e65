//! Request handlers for the payment server.
//!
//! The handlers are deliberately thin: deserialize, call the engine, map the result to a response. Every business
//! rule lives in `airtime_payment_engine`; the error-to-status mapping lives in [`crate::errors`].

use actix_web::{get, post, web, HttpResponse, Responder};
use airtime_payment_engine::{
    api::objects::Pagination,
    db_types::{Transaction, TxReference},
    AccountApi,
    AirtimeOutcome,
    CallbackUpdate,
    LedgerFlowApi,
    SettingsApi,
    SqliteDatabase,
};
use log::*;
use provider_tools::PayNectaCallback;

use crate::{
    data_objects::{
        AdjustmentRequest,
        AirtimePurchaseRequest,
        BroadcastRequest,
        ConversionReceiptRequest,
        ConversionRequest,
        DepositRequest,
        DirectPurchaseRequest,
        JsonResponse,
        NotificationQuery,
        PaginationQuery,
        RegisterAccountRequest,
        ReviewRequest,
        SettingUpdateRequest,
        StatusUpdateRequest,
        TransactionQuery,
        VerificationSubmission,
    },
    errors::ServerError,
    receipts::{HtmlReceiptRenderer, Receipt, ReceiptRenderer},
};

type Ledger = web::Data<LedgerFlowApi<SqliteDatabase>>;
type Accounts = web::Data<AccountApi<SqliteDatabase>>;
type SettingsData = web::Data<SettingsApi<SqliteDatabase>>;

//----------------------------------------------   Health  ----------------------------------------------------------

/// Route handler for the health check endpoint
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------  Accounts ----------------------------------------------------------

/// Route handler for registering a new account
#[post("/accounts")]
pub async fn register_account(ledger: Ledger, body: web::Json<RegisterAccountRequest>) -> Result<HttpResponse, ServerError> {
    let req = body.into_inner();
    trace!("💻️ POST /accounts for handle {}", req.handle);
    let account = ledger.register_account(&req.handle, &req.msisdn).await?;
    Ok(HttpResponse::Created().json(account))
}

/// Route handler for fetching an account by id
#[get("/accounts/{id}")]
pub async fn get_account(accounts: Accounts, path: web::Path<i64>) -> Result<HttpResponse, ServerError> {
    let account_id = path.into_inner();
    let account = accounts
        .account_by_id(account_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("No account with id {account_id}")))?;
    Ok(HttpResponse::Ok().json(account))
}

/// Route handler for an account's transaction history
#[get("/accounts/{id}/history")]
pub async fn account_history(
    accounts: Accounts,
    path: web::Path<i64>,
    query: web::Query<TransactionQuery>,
) -> Result<HttpResponse, ServerError> {
    let account_id = path.into_inner();
    let mut filter = airtime_payment_engine::TransactionFilter::from(query.into_inner());
    filter.account_id = Some(account_id);
    let transactions = accounts.history(filter).await?;
    Ok(HttpResponse::Ok().json(transactions))
}

/// Route handler for an account's notifications. Includes platform broadcasts.
#[get("/accounts/{id}/notifications")]
pub async fn account_notifications(
    accounts: Accounts,
    path: web::Path<i64>,
    query: web::Query<NotificationQuery>,
) -> Result<HttpResponse, ServerError> {
    let account_id = path.into_inner();
    let notifications = accounts.notifications(account_id, query.unread_only).await?;
    Ok(HttpResponse::Ok().json(notifications))
}

/// Route handler for marking a notification as read
#[post("/accounts/{id}/notifications/{notification_id}/read")]
pub async fn mark_notification_read(ledger: Ledger, path: web::Path<(i64, i64)>) -> Result<HttpResponse, ServerError> {
    let (account_id, notification_id) = path.into_inner();
    ledger.mark_notification_read(notification_id, account_id).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::success("Notification marked as read")))
}

/// Route handler for an account's queued purchases
#[get("/accounts/{id}/queue")]
pub async fn account_queue(accounts: Accounts, path: web::Path<i64>) -> Result<HttpResponse, ServerError> {
    let account_id = path.into_inner();
    let queue = accounts.queued_purchases(account_id).await?;
    Ok(HttpResponse::Ok().json(queue))
}

//----------------------------------------------  Deposits ----------------------------------------------------------

/// Route handler for initiating a deposit via STK push
#[post("/deposits")]
pub async fn initiate_deposit(ledger: Ledger, body: web::Json<DepositRequest>) -> Result<HttpResponse, ServerError> {
    let req = body.into_inner();
    trace!("💻️ POST /deposits of {} for account #{}", req.amount, req.account_id);
    let txn = ledger.initiate_deposit(req.account_id, req.msisdn.as_deref(), req.amount).await?;
    Ok(HttpResponse::Ok().json(txn))
}

/// Route handler for polling a deposit's status. A terminal answer from the provider reconciles the deposit exactly
/// as a callback would.
#[get("/deposits/{reference}")]
pub async fn deposit_status(ledger: Ledger, path: web::Path<String>) -> Result<HttpResponse, ServerError> {
    let reference = TxReference::from(path.into_inner());
    let txn = ledger.check_deposit_status(&reference).await?;
    Ok(HttpResponse::Ok().json(txn))
}

//----------------------------------------------  Airtime  ----------------------------------------------------------

/// Route handler for buying airtime from the wallet balance.
///
/// Returns 200 with the transaction when the airtime was sent, or 202 with the queue entry when the balance fell
/// short and the purchase was queued for the next top-up.
#[post("/airtime")]
pub async fn buy_airtime(ledger: Ledger, body: web::Json<AirtimePurchaseRequest>) -> Result<HttpResponse, ServerError> {
    let req = body.into_inner();
    trace!("💻️ POST /airtime of {} for account #{}", req.amount, req.account_id);
    match ledger.buy_airtime(req.account_id, &req.recipient, req.amount).await? {
        AirtimeOutcome::Delivered(txn) => Ok(HttpResponse::Ok().json(txn)),
        AirtimeOutcome::Queued { purchase, shortfall } => Ok(HttpResponse::Accepted()
            .json(serde_json::json!({ "queued": purchase, "shortfall": shortfall }))),
    }
}

/// Route handler for a direct airtime purchase by an unregistered buyer
#[post("/airtime/direct")]
pub async fn direct_purchase(ledger: Ledger, body: web::Json<DirectPurchaseRequest>) -> Result<HttpResponse, ServerError> {
    let req = body.into_inner();
    trace!("💻️ POST /airtime/direct of {} for {}", req.amount, req.recipient);
    let txn = ledger.direct_purchase(&req.payer, &req.recipient, req.amount).await?;
    Ok(HttpResponse::Ok().json(txn))
}

//---------------------------------------------- Verification -------------------------------------------------------

/// Route handler for submitting a deposit receipt for manual verification
#[post("/verifications")]
pub async fn submit_verification(
    ledger: Ledger,
    body: web::Json<VerificationSubmission>,
) -> Result<HttpResponse, ServerError> {
    let req = body.into_inner();
    let request = ledger.submit_deposit_verification(req.account_id, &req.receipt_code, req.amount).await?;
    Ok(HttpResponse::Created().json(request))
}

/// Route handler for opening an airtime-to-cash conversion
#[post("/conversions")]
pub async fn initiate_conversion(ledger: Ledger, body: web::Json<ConversionRequest>) -> Result<HttpResponse, ServerError> {
    let req = body.into_inner();
    let txn = ledger.initiate_conversion(req.account_id, req.msisdn.as_deref(), req.amount).await?;
    Ok(HttpResponse::Created().json(txn))
}

/// Route handler for attaching the telco receipt to a pending conversion
#[post("/conversions/receipt")]
pub async fn submit_conversion_receipt(
    ledger: Ledger,
    body: web::Json<ConversionReceiptRequest>,
) -> Result<HttpResponse, ServerError> {
    let req = body.into_inner();
    let reference = TxReference::from(req.reference);
    let request = ledger.submit_conversion_receipt(&reference, &req.receipt_code).await?;
    Ok(HttpResponse::Created().json(request))
}

//----------------------------------------------  Receipts ----------------------------------------------------------

/// Route handler for rendering the receipt of a settled transaction
#[get("/receipts/{reference}")]
pub async fn get_receipt(accounts: Accounts, path: web::Path<String>) -> Result<HttpResponse, ServerError> {
    let reference = TxReference::from(path.into_inner());
    let txn = accounts
        .transaction_by_reference(&reference)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("No transaction with reference {reference}")))?;
    let receipt = Receipt::try_from(&txn)?;
    let renderer = HtmlReceiptRenderer;
    Ok(HttpResponse::Ok().content_type("text/html; charset=utf-8").body(renderer.render(&receipt)))
}

//----------------------------------------------  Callbacks ---------------------------------------------------------

/// Route handler for asynchronous provider callbacks.
///
/// Providers retry until they get a 2xx, so a callback for an already-settled transaction is acknowledged with a
/// success body rather than an error.
#[post("/{provider}")]
pub async fn provider_callback(
    ledger: Ledger,
    path: web::Path<String>,
    body: web::Json<serde_json::Value>,
) -> Result<HttpResponse, ServerError> {
    let provider = path.into_inner();
    let update = match provider.as_str() {
        "paynecta" => {
            let callback: PayNectaCallback = serde_json::from_value(body.into_inner())
                .map_err(|e| ServerError::InvalidRequestBody(e.to_string()))?;
            if callback.key().is_none() {
                return Err(ServerError::InvalidRequestBody(
                    "The callback carries neither a reference nor a checkout id".to_string(),
                ));
            }
            CallbackUpdate::from(callback)
        },
        other => {
            warn!("🔁️ Received a callback for unknown provider '{other}'");
            return Err(ServerError::NoRecordFound(format!("Unknown provider: {other}")));
        },
    };
    debug!("🔁️ {provider} callback for [{}]", update.key);
    let resolution = ledger.handle_callback(update).await?;
    let txn: &Transaction = match &resolution {
        airtime_payment_engine::CallbackResolution::Settled(t) |
        airtime_payment_engine::CallbackResolution::Failed(t) |
        airtime_payment_engine::CallbackResolution::AlreadyResolved(t) => t,
    };
    Ok(HttpResponse::Ok().json(JsonResponse::success(format!("[{}] is {}", txn.reference, txn.status))))
}

//----------------------------------------------   Admin    ---------------------------------------------------------

/// Route handler for listing accounts (admin)
#[get("/accounts")]
pub async fn admin_accounts(accounts: Accounts, query: web::Query<PaginationQuery>) -> Result<HttpResponse, ServerError> {
    let q = query.into_inner();
    let defaults = Pagination::default();
    let pagination =
        Pagination { offset: q.offset.unwrap_or(defaults.offset), limit: q.limit.unwrap_or(defaults.limit) };
    let accounts = accounts.accounts(pagination).await?;
    Ok(HttpResponse::Ok().json(accounts))
}

/// Route handler for the platform dashboard counters (admin)
#[get("/stats")]
pub async fn admin_stats(accounts: Accounts) -> Result<HttpResponse, ServerError> {
    let stats = accounts.stats().await?;
    Ok(HttpResponse::Ok().json(stats))
}

/// Route handler for the transaction search (admin)
#[get("/transactions")]
pub async fn admin_transactions(
    accounts: Accounts,
    query: web::Query<TransactionQuery>,
) -> Result<HttpResponse, ServerError> {
    let filter = airtime_payment_engine::TransactionFilter::from(query.into_inner());
    let transactions = accounts.history(filter).await?;
    Ok(HttpResponse::Ok().json(transactions))
}

/// Route handler for the pending verification queue (admin)
#[get("/verifications")]
pub async fn admin_verifications(accounts: Accounts) -> Result<HttpResponse, ServerError> {
    let pending = accounts.pending_verifications().await?;
    Ok(HttpResponse::Ok().json(pending))
}

/// Route handler for approving a verification request (admin)
#[post("/verifications/{id}/approve")]
pub async fn approve_verification(
    ledger: Ledger,
    path: web::Path<i64>,
    body: web::Json<ReviewRequest>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    let req = body.into_inner();
    let txn = ledger.approve_verification(id, &req.reviewed_by).await?;
    Ok(HttpResponse::Ok().json(txn))
}

/// Route handler for rejecting a verification request (admin)
#[post("/verifications/{id}/reject")]
pub async fn reject_verification(
    ledger: Ledger,
    path: web::Path<i64>,
    body: web::Json<ReviewRequest>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    let req = body.into_inner();
    let reason = req.reason.as_deref().unwrap_or("Rejected by operator");
    let txn = ledger.reject_verification(id, &req.reviewed_by, reason).await?;
    Ok(HttpResponse::Ok().json(txn))
}

/// Route handler for manual balance corrections (admin)
#[post("/adjustments")]
pub async fn adjust_balance(ledger: Ledger, body: web::Json<AdjustmentRequest>) -> Result<HttpResponse, ServerError> {
    let req = body.into_inner();
    let (txn, account) = ledger.adjust_balance(req.account_id, req.delta, &req.reason).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "transaction": txn, "account": account })))
}

/// Route handler for suspending or reactivating an account (admin)
#[post("/accounts/{id}/status")]
pub async fn set_account_status(
    ledger: Ledger,
    path: web::Path<i64>,
    body: web::Json<StatusUpdateRequest>,
) -> Result<HttpResponse, ServerError> {
    let account_id = path.into_inner();
    let account = ledger.set_account_status(account_id, body.into_inner().status).await?;
    Ok(HttpResponse::Ok().json(account))
}

/// Route handler for reading the runtime settings (admin)
#[get("/settings")]
pub async fn get_settings(settings: SettingsData) -> Result<HttpResponse, ServerError> {
    let all = settings.all_settings().await?;
    Ok(HttpResponse::Ok().json(all))
}

/// Route handler for updating a runtime setting (admin)
#[post("/settings")]
pub async fn update_setting(
    settings: SettingsData,
    body: web::Json<SettingUpdateRequest>,
) -> Result<HttpResponse, ServerError> {
    let req = body.into_inner();
    let setting = settings.update_setting(&req.name, &req.value).await?;
    Ok(HttpResponse::Ok().json(setting))
}

/// Route handler for posting a platform-wide broadcast (admin)
#[post("/broadcast")]
pub async fn broadcast(ledger: Ledger, body: web::Json<BroadcastRequest>) -> Result<HttpResponse, ServerError> {
    let req = body.into_inner();
    let notification = ledger.broadcast_notification(&req.title, &req.message, req.severity).await?;
    Ok(HttpResponse::Created().json(notification))
}

/// Route handler for checking the disbursement float (admin)
#[get("/float")]
pub async fn check_float(ledger: Ledger) -> Result<HttpResponse, ServerError> {
    let balance = ledger.check_float().await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "float": balance })))
}
