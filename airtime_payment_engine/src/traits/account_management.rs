use thiserror::Error;

use crate::{
    api::objects::{LedgerStats, Pagination, TransactionFilter},
    db_types::{Account, Notification, QueuedPurchase, Transaction, TxReference, VerificationRequest},
};

#[derive(Debug, Clone, Error)]
pub enum AccountApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("User error constructing query: {0}")]
    QueryError(String),
}

impl From<sqlx::Error> for AccountApiError {
    fn from(e: sqlx::Error) -> Self {
        AccountApiError::DatabaseError(e.to_string())
    }
}

/// The `AccountManagement` trait defines the read-side behaviour for accounts and their ledger history.
///
/// The [`super::LedgerDatabase`] trait handles the machinery of mutating balances and transaction statuses;
/// `AccountManagement` only ever reads.
#[allow(async_fn_in_trait)]
pub trait AccountManagement {
    /// Fetches the account with the given id. If no account exists, `None` is returned.
    async fn fetch_account(&self, account_id: i64) -> Result<Option<Account>, AccountApiError>;

    /// Fetches the account registered with the given contact number, if any.
    async fn fetch_account_by_msisdn(&self, msisdn: &str) -> Result<Option<Account>, AccountApiError>;

    /// Fetches the transaction carrying the given reference. References are unique, so at most one row matches.
    async fn fetch_transaction_by_reference(
        &self,
        reference: &TxReference,
    ) -> Result<Option<Transaction>, AccountApiError>;

    /// Fetches a transaction by its internal id.
    async fn fetch_transaction_by_id(&self, transaction_id: i64) -> Result<Option<Transaction>, AccountApiError>;

    /// Fetches transactions according to the criteria in the filter, ordered by `created_at` ascending.
    async fn search_transactions(&self, filter: TransactionFilter) -> Result<Vec<Transaction>, AccountApiError>;

    /// Fetches notifications addressed to the account (including broadcasts), newest first.
    async fn fetch_notifications(&self, account_id: i64, unread_only: bool)
        -> Result<Vec<Notification>, AccountApiError>;

    /// Fetches the account's queued purchases, oldest first.
    async fn fetch_queued_purchases(&self, account_id: i64) -> Result<Vec<QueuedPurchase>, AccountApiError>;

    /// Fetches all verification requests awaiting operator review, oldest first.
    async fn fetch_pending_verifications(&self) -> Result<Vec<VerificationRequest>, AccountApiError>;

    /// Lists accounts for the admin console.
    async fn fetch_accounts(&self, pagination: Pagination) -> Result<Vec<Account>, AccountApiError>;

    /// Platform-wide counters and totals for the admin dashboard.
    async fn fetch_stats(&self) -> Result<LedgerStats, AccountApiError>;
}
