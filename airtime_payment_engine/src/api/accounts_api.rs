use crate::{
    api::objects::{LedgerStats, Pagination, TransactionFilter},
    db_types::{Account, Notification, QueuedPurchase, Transaction, TxReference, VerificationRequest},
    traits::{AccountApiError, AccountManagement},
};

/// The `AccountApi` provides read access to accounts, transaction history, notifications, and the purchase queue.
/// All mutation goes through [`super::ledger_flow_api::LedgerFlowApi`].
#[derive(Debug, Clone)]
pub struct AccountApi<B> {
    db: B,
}

impl<B> AccountApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> AccountApi<B>
where B: AccountManagement
{
    pub async fn account_by_id(&self, account_id: i64) -> Result<Option<Account>, AccountApiError> {
        self.db.fetch_account(account_id).await
    }

    pub async fn account_by_msisdn(&self, msisdn: &str) -> Result<Option<Account>, AccountApiError> {
        self.db.fetch_account_by_msisdn(msisdn).await
    }

    pub async fn transaction_by_reference(
        &self,
        reference: &TxReference,
    ) -> Result<Option<Transaction>, AccountApiError> {
        self.db.fetch_transaction_by_reference(reference).await
    }

    /// Transaction history matching the filter, oldest first.
    pub async fn history(&self, filter: TransactionFilter) -> Result<Vec<Transaction>, AccountApiError> {
        self.db.search_transactions(filter).await
    }

    pub async fn notifications(
        &self,
        account_id: i64,
        unread_only: bool,
    ) -> Result<Vec<Notification>, AccountApiError> {
        self.db.fetch_notifications(account_id, unread_only).await
    }

    pub async fn queued_purchases(&self, account_id: i64) -> Result<Vec<QueuedPurchase>, AccountApiError> {
        self.db.fetch_queued_purchases(account_id).await
    }

    pub async fn pending_verifications(&self) -> Result<Vec<VerificationRequest>, AccountApiError> {
        self.db.fetch_pending_verifications().await
    }

    pub async fn accounts(&self, pagination: Pagination) -> Result<Vec<Account>, AccountApiError> {
        self.db.fetch_accounts(pagination).await
    }

    pub async fn stats(&self) -> Result<LedgerStats, AccountApiError> {
        self.db.fetch_stats().await
    }
}
