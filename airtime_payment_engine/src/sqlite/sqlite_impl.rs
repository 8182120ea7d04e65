//! `SqliteDatabase` is a concrete implementation of a ledger engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module. Every method that mutates a balance together with a transaction status runs the two statements inside a
//! single database transaction, so they commit together or not at all.
//!
//! Single-statement writes also run inside an explicit transaction. SQLite finishes the implicit write transaction
//! of an `UPDATE .. RETURNING` lazily, after the row has been yielded; the explicit commit guarantees the write is
//! visible to the caller's next read, which may land on a different pool connection.
use std::fmt::Debug;

use apg_common::Money;
use log::*;
use sqlx::SqlitePool;

use super::db::{accounts, db_url, new_pool, notifications, queue, settings, transactions, verifications};
use crate::{
    api::objects::{LedgerStats, Pagination, TransactionFilter},
    db_types::{
        Account,
        AccountStatus,
        NewAccount,
        NewNotification,
        NewQueuedPurchase,
        NewTransaction,
        Notification,
        QueuedPurchase,
        Setting,
        Settings,
        Transaction,
        TxReference,
        VerificationRequest,
        VerificationStatus,
    },
    traits::{
        AccountApiError,
        AccountManagement,
        LedgerDatabase,
        LedgerError,
        SettingsApiError,
        SettingsManagement,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new connection pool using the `APG_DATABASE_URL` environment variable (or the default).
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        Self::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl AccountManagement for SqliteDatabase {
    async fn fetch_account(&self, account_id: i64) -> Result<Option<Account>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        accounts::account_by_id(account_id, &mut conn).await
    }

    async fn fetch_account_by_msisdn(&self, msisdn: &str) -> Result<Option<Account>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        accounts::account_by_msisdn(msisdn, &mut conn).await
    }

    async fn fetch_transaction_by_reference(
        &self,
        reference: &TxReference,
    ) -> Result<Option<Transaction>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        transactions::transaction_by_reference(reference, &mut conn).await
    }

    async fn fetch_transaction_by_id(&self, transaction_id: i64) -> Result<Option<Transaction>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        transactions::transaction_by_id(transaction_id, &mut conn).await
    }

    async fn search_transactions(&self, filter: TransactionFilter) -> Result<Vec<Transaction>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        transactions::search(filter, &mut conn).await
    }

    async fn fetch_notifications(
        &self,
        account_id: i64,
        unread_only: bool,
    ) -> Result<Vec<Notification>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        notifications::fetch_for_account(account_id, unread_only, &mut conn).await
    }

    async fn fetch_queued_purchases(&self, account_id: i64) -> Result<Vec<QueuedPurchase>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        queue::fetch_for_account(account_id, &mut conn).await
    }

    async fn fetch_pending_verifications(&self) -> Result<Vec<VerificationRequest>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        verifications::fetch_pending(&mut conn).await
    }

    async fn fetch_accounts(&self, pagination: Pagination) -> Result<Vec<Account>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        accounts::fetch_accounts(pagination, &mut conn).await
    }

    async fn fetch_stats(&self) -> Result<LedgerStats, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        transactions::stats(&mut conn).await
    }
}

impl SettingsManagement for SqliteDatabase {
    async fn fetch_settings(&self) -> Result<Settings, SettingsApiError> {
        let mut conn = self.pool.acquire().await?;
        settings::fetch_snapshot(&mut conn).await
    }

    async fn fetch_all_settings(&self) -> Result<Vec<Setting>, SettingsApiError> {
        let mut conn = self.pool.acquire().await?;
        settings::fetch_all(&mut conn).await
    }

    async fn update_setting(&self, name: &str, value: &str) -> Result<Setting, SettingsApiError> {
        let mut tx = self.pool.begin().await?;
        let setting = settings::update(name, value, &mut tx).await?;
        tx.commit().await?;
        Ok(setting)
    }
}

impl LedgerDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn register_account(&self, account: NewAccount) -> Result<Account, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let account = accounts::insert_account(account, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Account #{} ({}) saved in the DB", account.id, account.handle);
        Ok(account)
    }

    async fn set_account_status(&self, account_id: i64, status: AccountStatus) -> Result<Account, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let account = accounts::set_status(account_id, status, &mut tx).await?;
        tx.commit().await?;
        Ok(account)
    }

    async fn open_intent(&self, transaction: NewTransaction) -> Result<Transaction, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let txn = transactions::insert_intent(transaction, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Transaction [{}] saved in the DB with id {}", txn.reference, txn.id);
        Ok(txn)
    }

    async fn attach_correlation_id(&self, transaction_id: i64, correlation_id: &str) -> Result<(), LedgerError> {
        let mut tx = self.pool.begin().await?;
        transactions::attach_correlation_id(transaction_id, correlation_id, &mut tx).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn fetch_transaction_for_callback(&self, key: &str) -> Result<Option<Transaction>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        transactions::transaction_for_callback(key, &mut conn).await
    }

    /// In a single atomic transaction,
    /// * the pending transaction is marked `Success` with its bonus/fee split and receipt code,
    /// * the owning account is credited with `credit`,
    /// * the notification is stored.
    async fn settle_credit(
        &self,
        transaction_id: i64,
        credit: Money,
        bonus: Money,
        fee: Money,
        receipt_code: Option<&str>,
        notification: NewNotification,
    ) -> Result<(Transaction, Account), LedgerError> {
        let mut tx = self.pool.begin().await?;
        let txn = transactions::mark_success(transaction_id, bonus, fee, receipt_code, &mut tx).await?;
        let account_id = txn
            .account_id
            .ok_or_else(|| LedgerError::ValidationError(format!("[{}] has no owning account", txn.reference)))?;
        let account = accounts::credit_account(account_id, credit, &mut tx).await?;
        notifications::insert(notification, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ [{}] settled. {credit} credited to account #{account_id}", txn.reference);
        Ok((txn, account))
    }

    async fn fail_transaction(
        &self,
        transaction_id: i64,
        reason: &str,
        refund: Option<Money>,
        notification: Option<NewNotification>,
    ) -> Result<Transaction, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let txn = transactions::mark_failed(transaction_id, reason, &mut tx).await?;
        if let Some(amount) = refund {
            let account_id = txn
                .account_id
                .ok_or_else(|| LedgerError::ValidationError(format!("[{}] has no owning account", txn.reference)))?;
            accounts::credit_account(account_id, amount, &mut tx).await?;
            debug!("🗃️ [{}] failed. {amount} refunded to account #{account_id}", txn.reference);
        }
        if let Some(notification) = notification {
            notifications::insert(notification, &mut tx).await?;
        }
        tx.commit().await?;
        Ok(txn)
    }

    async fn reserve_debit(&self, account_id: i64, amount: Money) -> Result<Account, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let account = accounts::debit_if_covered(account_id, amount, &mut tx).await?;
        tx.commit().await?;
        Ok(account)
    }

    async fn confirm_purchase(
        &self,
        transaction_id: i64,
        fee: Money,
        receipt_code: Option<&str>,
        notification: Option<NewNotification>,
    ) -> Result<Transaction, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let txn = transactions::mark_success(transaction_id, Money::default(), fee, receipt_code, &mut tx).await?;
        if let Some(notification) = notification {
            notifications::insert(notification, &mut tx).await?;
        }
        tx.commit().await?;
        Ok(txn)
    }

    async fn enqueue_purchase(&self, purchase: NewQueuedPurchase) -> Result<QueuedPurchase, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let purchase = queue::insert(purchase, &mut tx).await?;
        tx.commit().await?;
        Ok(purchase)
    }

    async fn next_pending_queued_purchase(&self, account_id: i64) -> Result<Option<QueuedPurchase>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        queue::next_pending(account_id, &mut conn).await
    }

    async fn complete_queued_purchase(
        &self,
        queue_id: i64,
        transaction_id: i64,
    ) -> Result<QueuedPurchase, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let purchase = queue::complete(queue_id, transaction_id, &mut tx).await?;
        tx.commit().await?;
        Ok(purchase)
    }

    async fn link_queued_purchase(&self, queue_id: i64, transaction_id: i64) -> Result<QueuedPurchase, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let purchase = queue::link(queue_id, transaction_id, &mut tx).await?;
        tx.commit().await?;
        Ok(purchase)
    }

    async fn complete_queued_purchase_for_transaction(
        &self,
        transaction_id: i64,
    ) -> Result<Option<QueuedPurchase>, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let purchase = queue::complete_linked(transaction_id, &mut tx).await?;
        tx.commit().await?;
        Ok(purchase)
    }

    async fn release_queued_purchase_for_transaction(
        &self,
        transaction_id: i64,
    ) -> Result<Option<QueuedPurchase>, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let purchase = queue::release_linked(transaction_id, &mut tx).await?;
        tx.commit().await?;
        Ok(purchase)
    }

    /// The adjustment transaction and the balance change commit together. Negative deltas reuse the conditional
    /// debit, so an adjustment can never overdraw a wallet.
    async fn apply_adjustment(
        &self,
        account_id: i64,
        delta: Money,
        reason: &str,
        reference: TxReference,
    ) -> Result<(Transaction, Account), LedgerError> {
        let mut tx = self.pool.begin().await?;
        let account = if delta.is_negative() {
            accounts::debit_if_covered(account_id, -delta, &mut tx).await?
        } else {
            accounts::credit_account(account_id, delta, &mut tx).await?
        };
        let intent = NewTransaction::new(crate::db_types::TransactionKind::Adjustment, delta, "admin", reference)
            .for_account(account_id)
            .with_payload(serde_json::json!({ "reason": reason }).to_string());
        let txn = transactions::insert_intent(intent, &mut tx).await?;
        let txn = transactions::mark_success(txn.id, Money::default(), Money::default(), None, &mut tx).await?;
        tx.commit().await?;
        Ok((txn, account))
    }

    async fn receipt_code_in_use(&self, receipt_code: &str) -> Result<bool, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        verifications::receipt_code_in_use(receipt_code, &mut conn).await
    }

    async fn create_verification_request(
        &self,
        transaction_id: i64,
        receipt_code: &str,
    ) -> Result<VerificationRequest, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let request = verifications::insert(transaction_id, receipt_code, &mut tx).await?;
        tx.commit().await?;
        Ok(request)
    }

    async fn fetch_verification_request(&self, id: i64) -> Result<Option<VerificationRequest>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        verifications::by_id(id, &mut conn).await
    }

    async fn resolve_verification(
        &self,
        id: i64,
        status: VerificationStatus,
        reviewed_by: &str,
    ) -> Result<VerificationRequest, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let request = verifications::resolve(id, status, reviewed_by, &mut tx).await?;
        tx.commit().await?;
        Ok(request)
    }

    async fn reopen_verification(&self, id: i64) -> Result<VerificationRequest, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let request = verifications::reopen(id, &mut tx).await?;
        tx.commit().await?;
        warn!("🧾️ Verification #{id} reopened after a failed settlement");
        Ok(request)
    }

    async fn insert_notification(&self, notification: NewNotification) -> Result<Notification, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let notification = notifications::insert(notification, &mut tx).await?;
        tx.commit().await?;
        Ok(notification)
    }

    async fn mark_notification_read(&self, notification_id: i64, account_id: i64) -> Result<(), LedgerError> {
        let mut tx = self.pool.begin().await?;
        notifications::mark_read(notification_id, account_id, &mut tx).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), LedgerError> {
        info!("🗃️ Closing connection to database");
        self.pool.close().await;
        Ok(())
    }
}
