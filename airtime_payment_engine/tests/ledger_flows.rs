use std::sync::Arc;

use airtime_payment_engine::{
    db_types::{NewNotification, QueueStatus, TransactionStatus, TxReference},
    AccountManagement,
    AirtimeOutcome,
    CallbackResolution,
    CallbackUpdate,
    CollectionProvider,
    LedgerDatabase,
    LedgerError,
    LedgerFlowApi,
    ProviderResult,
    SqliteDatabase,
};
use apg_common::Money;
use async_trait::async_trait;
use log::*;

mod support;

use support::{
    accepted,
    completed,
    declined,
    new_ledger,
    prepare_env::{prepare_test_env, random_db_path},
    ScriptedCollection,
    ScriptedDisbursement,
};

fn kes(shillings: i64) -> Money {
    Money::from_shillings(shillings)
}

#[tokio::test]
async fn deposit_settles_via_callback_with_bonus() {
    let collection = ScriptedCollection::new([accepted("corr-1")]);
    let disbursement = ScriptedDisbursement::new([]);
    let (api, db) = new_ledger(collection, disbursement).await;

    let account = api.register_account("wanjiku", "0712345678").await.expect("registration failed");
    assert_eq!(account.balance, Money::default());
    assert_eq!(account.msisdn, "254712345678");

    let txn = api.initiate_deposit(account.id, None, kes(60)).await.expect("deposit failed");
    assert_eq!(txn.status, TransactionStatus::Pending);

    let resolution = api
        .handle_callback(CallbackUpdate::success("corr-1", Some("QGH7TK91XP".into())))
        .await
        .expect("callback failed");
    let settled = match resolution {
        CallbackResolution::Settled(txn) => txn,
        other => panic!("Expected a settlement, got {other:?}"),
    };
    assert_eq!(settled.status, TransactionStatus::Success);
    assert_eq!(settled.bonus, kes(6));
    assert_eq!(settled.receipt_code.as_deref(), Some("QGH7TK91XP"));

    // 60 deposited at the default bonus policy credits 66.
    let account = db.fetch_account(account.id).await.unwrap().unwrap();
    assert_eq!(account.balance, kes(66));
}

#[tokio::test]
async fn small_deposit_earns_no_bonus() {
    let collection = ScriptedCollection::new([completed("RCP100")]);
    let disbursement = ScriptedDisbursement::new([]);
    let (api, db) = new_ledger(collection, disbursement).await;

    let account = api.register_account("otieno", "0722000111").await.unwrap();
    let txn = api.initiate_deposit(account.id, None, kes(49)).await.expect("deposit failed");
    assert_eq!(txn.status, TransactionStatus::Success);
    assert_eq!(txn.bonus, Money::default());
    let account = db.fetch_account(account.id).await.unwrap().unwrap();
    assert_eq!(account.balance, kes(49));
}

#[tokio::test]
async fn duplicate_callback_is_acknowledged_without_a_second_credit() {
    let collection = ScriptedCollection::new([accepted("corr-dup")]);
    let disbursement = ScriptedDisbursement::new([]);
    let (api, db) = new_ledger(collection, disbursement).await;

    let account = api.register_account("njeri", "0733999000").await.unwrap();
    api.initiate_deposit(account.id, None, kes(100)).await.unwrap();

    let first = api.handle_callback(CallbackUpdate::success("corr-dup", Some("RCP200".into()))).await.unwrap();
    assert!(matches!(first, CallbackResolution::Settled(_)));

    // The provider retries the same callback. It must be acknowledged and do nothing.
    let second = api.handle_callback(CallbackUpdate::success("corr-dup", Some("RCP200".into()))).await.unwrap();
    assert!(matches!(second, CallbackResolution::AlreadyResolved(_)));

    let account = db.fetch_account(account.id).await.unwrap().unwrap();
    assert_eq!(account.balance, kes(106));
}

#[tokio::test]
async fn failed_deposit_callback_credits_nothing() {
    let collection = ScriptedCollection::new([accepted("corr-fail")]);
    let disbursement = ScriptedDisbursement::new([]);
    let (api, db) = new_ledger(collection, disbursement).await;

    let account = api.register_account("baraka", "0744123123").await.unwrap();
    api.initiate_deposit(account.id, None, kes(80)).await.unwrap();

    let resolution = api
        .handle_callback(CallbackUpdate::failure("corr-fail", Some("1032".into()), Some("Request cancelled by user".into())))
        .await
        .unwrap();
    let failed = match resolution {
        CallbackResolution::Failed(txn) => txn,
        other => panic!("Expected a failure, got {other:?}"),
    };
    assert_eq!(failed.status, TransactionStatus::Failed);
    let account = db.fetch_account(account.id).await.unwrap().unwrap();
    assert_eq!(account.balance, Money::default());
}

#[tokio::test]
async fn purchase_debits_and_delivers() {
    let collection = ScriptedCollection::new([completed("RCP300")]);
    let disbursement = ScriptedDisbursement::new([completed("AIR300")]);
    let (api, db) = new_ledger(collection, disbursement).await;

    let account = api.register_account("amina", "0755001002").await.unwrap();
    api.initiate_deposit(account.id, None, kes(100)).await.unwrap();

    let outcome = api.buy_airtime(account.id, "0711222333", kes(50)).await.expect("purchase failed");
    let txn = match outcome {
        AirtimeOutcome::Delivered(txn) => txn,
        AirtimeOutcome::Queued { .. } => panic!("The balance covered the purchase"),
    };
    assert_eq!(txn.status, TransactionStatus::Success);
    assert_eq!(txn.amount, kes(50));
    // 5% margin on a 50 purchase.
    assert_eq!(txn.fee, Money::from_cents(250));

    let account = db.fetch_account(account.id).await.unwrap().unwrap();
    assert_eq!(account.balance, kes(106) - kes(50));
}

#[tokio::test]
async fn shortfall_queues_the_purchase() {
    let collection = ScriptedCollection::new([completed("RCP400")]);
    let disbursement = ScriptedDisbursement::new([]);
    let (api, db) = new_ledger(collection, disbursement).await;

    let account = api.register_account("kip", "0766004005").await.unwrap();
    // No deposit: balance is 3 after an operator adjustment.
    api.adjust_balance(account.id, kes(3), "test fixture").await.unwrap();

    let outcome = api.buy_airtime(account.id, "0711222333", kes(5)).await.expect("request failed");
    match outcome {
        AirtimeOutcome::Queued { purchase, shortfall } => {
            assert_eq!(shortfall, kes(2));
            assert_eq!(purchase.amount, kes(5));
            assert_eq!(purchase.status, QueueStatus::Pending);
        },
        AirtimeOutcome::Delivered(_) => panic!("A 3 balance cannot cover a 5 purchase"),
    }
    // The balance is untouched and no transaction was opened.
    let account = db.fetch_account(account.id).await.unwrap().unwrap();
    assert_eq!(account.balance, kes(3));
    info!("📦️ Queued purchase verified");
}

#[tokio::test]
async fn queued_purchase_settles_after_the_next_deposit() {
    let collection = ScriptedCollection::new([completed("RCP500")]);
    let disbursement = ScriptedDisbursement::new([completed("AIR500")]);
    let (api, db) = new_ledger(collection, disbursement).await;

    let account = api.register_account("wafula", "0777006007").await.unwrap();
    api.adjust_balance(account.id, kes(3), "test fixture").await.unwrap();
    let outcome = api.buy_airtime(account.id, "0711888999", kes(5)).await.unwrap();
    assert!(matches!(outcome, AirtimeOutcome::Queued { .. }));

    // A 60 deposit credits 66 and triggers the queue: the 5 purchase settles immediately.
    api.initiate_deposit(account.id, None, kes(60)).await.unwrap();

    let queued = db.fetch_queued_purchases(account.id).await.unwrap();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].status, QueueStatus::Completed);
    assert!(queued[0].transaction_id.is_some());

    let account = db.fetch_account(account.id).await.unwrap().unwrap();
    assert_eq!(account.balance, kes(3) + kes(66) - kes(5));
}

#[tokio::test]
async fn declined_disbursement_reverses_the_debit_exactly_once() {
    let collection = ScriptedCollection::new([completed("RCP600")]);
    let disbursement = ScriptedDisbursement::new([declined("42", "Recipient barred")]);
    let (api, db) = new_ledger(collection, disbursement).await;

    let account = api.register_account("chebet", "0788010011").await.unwrap();
    api.initiate_deposit(account.id, None, kes(100)).await.unwrap();

    let err = api.buy_airtime(account.id, "0711000111", kes(40)).await.expect_err("the provider declined");
    assert!(matches!(err, LedgerError::ProviderDeclined { .. }));

    // The reserve debit was reversed with the failure, in the same atomic unit.
    let account = db.fetch_account(account.id).await.unwrap().unwrap();
    assert_eq!(account.balance, kes(106));

    let history = db
        .search_transactions(airtime_payment_engine::TransactionFilter::for_account(account.id))
        .await
        .unwrap();
    let failed = history.iter().find(|t| t.status == TransactionStatus::Failed).expect("no failed transaction");
    assert_eq!(failed.amount, kes(40));
}

#[tokio::test]
async fn unavailable_collection_fails_the_deposit_deterministically() {
    let collection = ScriptedCollection::new([]);
    let disbursement = ScriptedDisbursement::new([]);
    let (api, db) = new_ledger(collection, disbursement).await;

    let account = api.register_account("mwangi", "0799012013").await.unwrap();
    let err = api.initiate_deposit(account.id, None, kes(50)).await.expect_err("the provider is down");
    assert!(matches!(err, LedgerError::ProviderUnavailable(_)));

    // The intent exists and is terminal; nothing is stuck pending.
    let history = db
        .search_transactions(airtime_payment_engine::TransactionFilter::for_account(account.id))
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, TransactionStatus::Failed);
}

#[tokio::test]
async fn deposits_below_the_minimum_are_rejected() {
    let collection = ScriptedCollection::new([]);
    let disbursement = ScriptedDisbursement::new([]);
    let (api, _db) = new_ledger(collection, disbursement).await;

    let account = api.register_account("halima", "0700014015").await.unwrap();
    let err = api.initiate_deposit(account.id, None, kes(9)).await.expect_err("below the minimum");
    assert!(matches!(err, LedgerError::InvalidAmount { .. }));
}

#[tokio::test]
async fn suspended_accounts_cannot_transact() {
    use airtime_payment_engine::db_types::AccountStatus;
    let collection = ScriptedCollection::new([completed("RCP700")]);
    let disbursement = ScriptedDisbursement::new([]);
    let (api, _db) = new_ledger(collection, disbursement).await;

    let account = api.register_account("juma", "0701016017").await.unwrap();
    api.set_account_status(account.id, AccountStatus::Suspended).await.unwrap();

    let err = api.initiate_deposit(account.id, None, kes(50)).await.expect_err("suspended");
    assert!(matches!(err, LedgerError::AccountSuspended(_)));
    let err = api.buy_airtime(account.id, "0711222333", kes(10)).await.expect_err("suspended");
    assert!(matches!(err, LedgerError::AccountSuspended(_)));
}

#[tokio::test]
async fn negative_adjustment_cannot_overdraw() {
    let collection = ScriptedCollection::new([]);
    let disbursement = ScriptedDisbursement::new([]);
    let (api, db) = new_ledger(collection, disbursement).await;

    let account = api.register_account("zawadi", "0702018019").await.unwrap();
    api.adjust_balance(account.id, kes(20), "opening balance").await.unwrap();

    let err = api.adjust_balance(account.id, -kes(30), "correction").await.expect_err("would overdraw");
    assert!(matches!(err, LedgerError::InsufficientFunds { .. }));

    let account = db.fetch_account(account.id).await.unwrap().unwrap();
    assert_eq!(account.balance, kes(20));
}

#[tokio::test]
async fn direct_purchase_disburses_after_the_collection_callback() {
    let collection = ScriptedCollection::new([accepted("corr-direct")]);
    let disbursement = ScriptedDisbursement::new([completed("AIR800")]);
    let (api, db) = new_ledger(collection, disbursement).await;

    let txn = api.direct_purchase("0712000001", "0712000002", kes(20)).await.expect("purchase failed");
    assert_eq!(txn.status, TransactionStatus::Pending);
    assert!(txn.account_id.is_none());

    let resolution = api
        .handle_callback(CallbackUpdate::success("corr-direct", Some("RCP800".into())))
        .await
        .expect("callback failed");
    let settled = match resolution {
        CallbackResolution::Settled(txn) => txn,
        other => panic!("Expected a settlement, got {other:?}"),
    };
    assert_eq!(settled.status, TransactionStatus::Success);
    assert_eq!(settled.receipt_code.as_deref(), Some("RCP800"));

    // No wallet is involved; the recipient is recorded on the transaction itself.
    assert_eq!(settled.msisdn.as_deref(), Some("254712000002"));
    let txn = db.fetch_transaction_by_id(settled.id).await.unwrap().unwrap();
    assert_eq!(txn.fee, kes(1));
}

#[tokio::test]
async fn direct_purchase_failure_after_collection_is_flagged_for_followup() {
    let collection = ScriptedCollection::new([accepted("corr-direct2")]);
    let disbursement = ScriptedDisbursement::new([declined("7", "Invalid recipient")]);
    let (api, db) = new_ledger(collection, disbursement).await;

    api.direct_purchase("0712000003", "0712000004", kes(20)).await.unwrap();
    let resolution = api
        .handle_callback(CallbackUpdate::success("corr-direct2", Some("RCP900".into())))
        .await
        .expect("callback handling failed");
    let failed = match resolution {
        CallbackResolution::Failed(txn) => txn,
        other => panic!("Expected a failure, got {other:?}"),
    };
    assert_eq!(failed.status, TransactionStatus::Failed);

    // The operators see a broadcast carrying the collection receipt for manual follow-up.
    let broadcasts = db.fetch_notifications(0, false).await.unwrap();
    assert!(broadcasts.iter().any(|n| n.account_id.is_none() && n.message.contains("RCP900")));
}

#[tokio::test]
async fn status_writes_are_committed_before_they_return() {
    use airtime_payment_engine::db_types::AccountStatus;
    let collection = ScriptedCollection::new([]);
    let disbursement = ScriptedDisbursement::new([]);
    let (api, db) = new_ledger(collection, disbursement).await;

    let account = api.register_account("rehema", "0704022023").await.unwrap();
    api.set_account_status(account.id, AccountStatus::Suspended).await.unwrap();

    // The very next read may land on a different pool connection and must already see the new status.
    let fetched = db.fetch_account(account.id).await.unwrap().unwrap();
    assert_eq!(fetched.status, AccountStatus::Suspended);
}

#[tokio::test]
async fn queued_purchase_survives_a_failed_asynchronous_disbursement() {
    let collection = ScriptedCollection::new([completed("RCP510"), completed("RCP511")]);
    let disbursement = ScriptedDisbursement::new([accepted("air-corr-1"), completed("AIR511")]);
    let (api, db) = new_ledger(collection, disbursement).await;

    let account = api.register_account("kadzo", "0705024025").await.unwrap();
    api.adjust_balance(account.id, kes(3), "test fixture").await.unwrap();
    api.buy_airtime(account.id, "0711888999", kes(5)).await.unwrap();

    // The deposit triggers the queue, but the disbursement only answers Accepted: the entry stays pending,
    // linked to the in-flight transaction.
    api.initiate_deposit(account.id, None, kes(60)).await.unwrap();
    let queued = db.fetch_queued_purchases(account.id).await.unwrap();
    assert_eq!(queued[0].status, QueueStatus::Pending);
    assert!(queued[0].transaction_id.is_some());

    // The provider reports failure: the debit is refunded and the entry returns to the pool.
    api.handle_callback(CallbackUpdate::failure("air-corr-1", Some("42".into()), Some("Recipient barred".into())))
        .await
        .unwrap();
    let queued = db.fetch_queued_purchases(account.id).await.unwrap();
    assert_eq!(queued[0].status, QueueStatus::Pending);
    assert!(queued[0].transaction_id.is_none());
    let row = db.fetch_account(account.id).await.unwrap().unwrap();
    assert_eq!(row.balance, kes(69));

    // The next deposit retries it and this time the airtime is delivered.
    api.initiate_deposit(account.id, None, kes(10)).await.unwrap();
    let queued = db.fetch_queued_purchases(account.id).await.unwrap();
    assert_eq!(queued[0].status, QueueStatus::Completed);
    let row = db.fetch_account(account.id).await.unwrap().unwrap();
    assert_eq!(row.balance, kes(69) + kes(10) - kes(5));
}

#[tokio::test]
async fn queued_purchase_completes_when_the_disbursement_confirms_later() {
    let collection = ScriptedCollection::new([completed("RCP520")]);
    let disbursement = ScriptedDisbursement::new([accepted("air-corr-2")]);
    let (api, db) = new_ledger(collection, disbursement).await;

    let account = api.register_account("nyambura", "0706026027").await.unwrap();
    api.adjust_balance(account.id, kes(3), "test fixture").await.unwrap();
    api.buy_airtime(account.id, "0711888999", kes(5)).await.unwrap();
    api.initiate_deposit(account.id, None, kes(60)).await.unwrap();

    let queued = db.fetch_queued_purchases(account.id).await.unwrap();
    assert_eq!(queued[0].status, QueueStatus::Pending);

    // The confirmation arrives; the entry is completed by the callback, not a second dispatch.
    api.handle_callback(CallbackUpdate::success("air-corr-2", Some("AIR520".into()))).await.unwrap();
    let queued = db.fetch_queued_purchases(account.id).await.unwrap();
    assert_eq!(queued[0].status, QueueStatus::Completed);
    let row = db.fetch_account(account.id).await.unwrap().unwrap();
    assert_eq!(row.balance, kes(3) + kes(66) - kes(5));
}

#[tokio::test]
async fn a_broadcast_read_by_one_account_stays_unread_for_the_rest() {
    use airtime_payment_engine::db_types::Severity;
    let collection = ScriptedCollection::new([]);
    let disbursement = ScriptedDisbursement::new([]);
    let (api, db) = new_ledger(collection, disbursement).await;

    let a = api.register_account("zuri", "0707028029").await.unwrap();
    let b = api.register_account("tabitha", "0707028030").await.unwrap();
    let note = api
        .broadcast_notification("Maintenance", "Deposits pause at midnight for 15 minutes", Severity::Warning)
        .await
        .unwrap();

    api.mark_notification_read(note.id, a.id).await.unwrap();

    let unread_a = db.fetch_notifications(a.id, true).await.unwrap();
    assert!(!unread_a.iter().any(|n| n.id == note.id));
    let unread_b = db.fetch_notifications(b.id, true).await.unwrap();
    assert!(unread_b.iter().any(|n| n.id == note.id));

    // Marking it a second time is a no-op, not an error.
    api.mark_notification_read(note.id, a.id).await.unwrap();
}

/// A collection stub whose callback lands before the synchronous response: it settles the transaction through the
/// database and only then answers `Completed`.
struct SettlesBeforeResponding {
    db: SqliteDatabase,
}

#[async_trait]
impl CollectionProvider for SettlesBeforeResponding {
    fn name(&self) -> &str {
        "paynecta"
    }

    async fn initiate(&self, _msisdn: &str, _amount: Money, reference: &TxReference) -> ProviderResult {
        let txn = self.db.fetch_transaction_by_reference(reference).await.unwrap().unwrap();
        let note = NewNotification::success(txn.account_id.unwrap(), "Deposit received", "Settled by callback");
        self.db
            .settle_credit(txn.id, txn.amount, Money::default(), Money::default(), Some("RCPFIRST"), note)
            .await
            .unwrap();
        ProviderResult::Completed { receipt_code: Some("RCPSECOND".into()) }
    }

    async fn query(&self, _reference: &TxReference) -> ProviderResult {
        ProviderResult::Unavailable { reason: "not used".into() }
    }
}

#[tokio::test]
async fn a_deposit_settled_during_the_synchronous_response_is_not_an_error() {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
    let collection = Arc::new(SettlesBeforeResponding { db: db.clone() });
    let api = LedgerFlowApi::new(db.clone(), collection, ScriptedDisbursement::new([]));

    let account = api.register_account("said", "0708030031").await.unwrap();
    let txn = api.initiate_deposit(account.id, None, kes(60)).await.expect("the settled row is returned");
    assert_eq!(txn.status, TransactionStatus::Success);
    assert_eq!(txn.receipt_code.as_deref(), Some("RCPFIRST"));

    // Credited exactly once, by the winner of the race.
    let account = db.fetch_account(account.id).await.unwrap().unwrap();
    assert_eq!(account.balance, kes(60));
}

#[tokio::test]
async fn duplicate_handle_or_msisdn_is_rejected() {
    let collection = ScriptedCollection::new([]);
    let disbursement = ScriptedDisbursement::new([]);
    let (api, _db) = new_ledger(collection, disbursement).await;

    api.register_account("pendo", "0703020021").await.unwrap();
    let err = api.register_account("pendo", "0703020022").await.expect_err("handle taken");
    assert!(matches!(err, LedgerError::AccountAlreadyExists(_)));
    let err = api.register_account("pendo2", "0703020021").await.expect_err("msisdn taken");
    assert!(matches!(err, LedgerError::AccountAlreadyExists(_)));
}
