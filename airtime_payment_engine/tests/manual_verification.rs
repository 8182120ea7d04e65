use airtime_payment_engine::{
    db_types::{TransactionKind, TransactionStatus, VerificationStatus},
    AccountManagement,
    LedgerDatabase,
    LedgerError,
};
use apg_common::Money;

mod support;

use support::{declined, new_ledger, ScriptedCollection, ScriptedDisbursement};

fn kes(shillings: i64) -> Money {
    Money::from_shillings(shillings)
}

#[tokio::test]
async fn approved_deposit_verification_credits_with_bonus() {
    let (api, db) = new_ledger(ScriptedCollection::new([]), ScriptedDisbursement::new([])).await;

    let account = api.register_account("maria", "0710100200").await.unwrap();
    let request = api.submit_deposit_verification(account.id, "SBX91LM20Q", kes(75)).await.expect("submission failed");
    assert_eq!(request.status, VerificationStatus::Pending);

    // Nothing is credited until an operator approves.
    let before = db.fetch_account(account.id).await.unwrap().unwrap();
    assert_eq!(before.balance, Money::default());

    let txn = api.approve_verification(request.id, "operator-1").await.expect("approval failed");
    assert_eq!(txn.status, TransactionStatus::Success);
    assert_eq!(txn.kind, TransactionKind::Deposit);
    assert_eq!(txn.receipt_code.as_deref(), Some("SBX91LM20Q"));

    let after = db.fetch_account(account.id).await.unwrap().unwrap();
    assert_eq!(after.balance, kes(75) + kes(6));
}

#[tokio::test]
async fn rejected_verification_fails_the_transaction() {
    let (api, db) = new_ledger(ScriptedCollection::new([]), ScriptedDisbursement::new([])).await;

    let account = api.register_account("dan", "0710300400").await.unwrap();
    let request = api.submit_deposit_verification(account.id, "SBX91LM21R", kes(75)).await.unwrap();

    let txn = api.reject_verification(request.id, "operator-1", "receipt not found at the provider").await.unwrap();
    assert_eq!(txn.status, TransactionStatus::Failed);

    let account = db.fetch_account(account.id).await.unwrap().unwrap();
    assert_eq!(account.balance, Money::default());
}

#[tokio::test]
async fn a_receipt_code_can_only_be_claimed_once() {
    let (api, _db) = new_ledger(ScriptedCollection::new([]), ScriptedDisbursement::new([])).await;

    let a = api.register_account("ada", "0710500600").await.unwrap();
    let b = api.register_account("ben", "0710700800").await.unwrap();

    api.submit_deposit_verification(a.id, "SBX91LM22S", kes(50)).await.unwrap();
    let err = api.submit_deposit_verification(b.id, "SBX91LM22S", kes(50)).await.expect_err("receipt claimed");
    assert!(matches!(err, LedgerError::DuplicateReceipt(_)));
}

#[tokio::test]
async fn verification_cannot_be_approved_twice() {
    let (api, db) = new_ledger(ScriptedCollection::new([]), ScriptedDisbursement::new([])).await;

    let account = api.register_account("eva", "0710900100").await.unwrap();
    let request = api.submit_deposit_verification(account.id, "SBX91LM23T", kes(60)).await.unwrap();

    api.approve_verification(request.id, "operator-1").await.unwrap();
    let err = api.approve_verification(request.id, "operator-2").await.expect_err("already resolved");
    assert!(matches!(err, LedgerError::ConflictingState(_)));

    // Exactly one credit.
    let account = db.fetch_account(account.id).await.unwrap().unwrap();
    assert_eq!(account.balance, kes(66));
}

#[tokio::test]
async fn approved_conversion_credits_at_the_configured_rate() {
    let (api, db) = new_ledger(ScriptedCollection::new([]), ScriptedDisbursement::new([])).await;

    let account = api.register_account("farida", "0711100200").await.unwrap();
    let txn = api.initiate_conversion(account.id, None, kes(100)).await.expect("conversion failed");
    assert_eq!(txn.kind, TransactionKind::Conversion);
    assert_eq!(txn.status, TransactionStatus::Pending);

    let request = api.submit_conversion_receipt(&txn.reference, "CNVRCPT01").await.expect("receipt failed");
    let settled = api.approve_verification(request.id, "operator-1").await.expect("approval failed");
    assert_eq!(settled.status, TransactionStatus::Success);
    // 80% of face value is credited; the remainder is recorded as the fee.
    assert_eq!(settled.fee, kes(20));

    let account = db.fetch_account(account.id).await.unwrap().unwrap();
    assert_eq!(account.balance, kes(80));
}

#[tokio::test]
async fn conversion_receipt_requires_a_pending_conversion() {
    let (api, _db) = new_ledger(ScriptedCollection::new([]), ScriptedDisbursement::new([])).await;

    let account = api.register_account("gitau", "0711300400").await.unwrap();
    let txn = api.initiate_conversion(account.id, None, kes(50)).await.unwrap();
    let request = api.submit_conversion_receipt(&txn.reference, "CNVRCPT02").await.unwrap();
    api.reject_verification(request.id, "operator-1", "no such transfer").await.unwrap();

    // The transaction is now terminal; a second receipt submission is refused.
    let err = api.submit_conversion_receipt(&txn.reference, "CNVRCPT03").await.expect_err("already resolved");
    assert!(matches!(err, LedgerError::ConflictingState(_)));
}

#[tokio::test]
async fn a_status_poll_does_not_touch_manual_deposits() {
    let collection = ScriptedCollection::new([declined("1", "no such request")]);
    let (api, db) = new_ledger(collection, ScriptedDisbursement::new([])).await;

    let account = api.register_account("imani", "0711700900").await.unwrap();
    let request = api.submit_deposit_verification(account.id, "SBX91LM27X", kes(75)).await.unwrap();
    let txn = db.fetch_transaction_by_id(request.transaction_id).await.unwrap().unwrap();

    // The collection provider never saw this deposit; a status poll must not consult it, so the scripted
    // Declined answer goes unconsumed and the transaction stays pending.
    let polled = api.check_deposit_status(&txn.reference).await.unwrap();
    assert_eq!(polled.status, TransactionStatus::Pending);

    let settled = api.approve_verification(request.id, "operator-1").await.expect("approval failed");
    assert_eq!(settled.status, TransactionStatus::Success);
}

#[tokio::test]
async fn a_failed_approval_leaves_the_request_pending() {
    let (api, db) = new_ledger(ScriptedCollection::new([]), ScriptedDisbursement::new([])).await;

    let account = api.register_account("juma", "0711901100").await.unwrap();
    let request = api.submit_deposit_verification(account.id, "SBX91LM28Y", kes(60)).await.unwrap();

    // The underlying transaction dies before the operator gets to it.
    db.fail_transaction(request.transaction_id, "expired", None, None).await.unwrap();

    let err = api.approve_verification(request.id, "operator-1").await.expect_err("settlement cannot run");
    assert!(matches!(err, LedgerError::ConflictingState(_)));

    // The request is back in the operator's queue instead of stuck Approved without a credit.
    let request = db.fetch_verification_request(request.id).await.unwrap().unwrap();
    assert_eq!(request.status, VerificationStatus::Pending);
    let account = db.fetch_account(account.id).await.unwrap().unwrap();
    assert_eq!(account.balance, Money::default());
}

#[tokio::test]
async fn pending_verifications_are_listed_for_operators() {
    let (api, db) = new_ledger(ScriptedCollection::new([]), ScriptedDisbursement::new([])).await;

    let account = api.register_account("hawa", "0711500600").await.unwrap();
    api.submit_deposit_verification(account.id, "SBX91LM24U", kes(50)).await.unwrap();
    api.submit_deposit_verification(account.id, "SBX91LM25V", kes(70)).await.unwrap();

    let pending = db.fetch_pending_verifications().await.unwrap();
    assert_eq!(pending.len(), 2);
    assert!(pending.iter().all(|r| r.status == VerificationStatus::Pending));
}
