use apg_common::Money;
use thiserror::Error;

use crate::{
    db_types::{
        Account,
        AccountStatus,
        NewAccount,
        NewNotification,
        NewQueuedPurchase,
        NewTransaction,
        Notification,
        QueuedPurchase,
        Transaction,
        TxReference,
        VerificationRequest,
        VerificationStatus,
    },
    traits::{AccountApiError, AccountManagement, SettingsApiError, SettingsManagement},
};

/// This trait defines the highest level of behaviour for backends supporting the ledger engine.
///
/// The ledger exclusively owns writes to `Account.balance` and `Transaction.status`. Implementations must make every
/// method that touches both a single atomic unit: the balance mutation and the status transition commit together or
/// not at all. Status transitions are guarded in the store itself (`... AND status = 'Pending'`), so a concurrent
/// duplicate resolution surfaces as [`LedgerError::ConflictingState`] rather than a double credit.
#[allow(async_fn_in_trait)]
pub trait LedgerDatabase: Clone + AccountManagement + SettingsManagement {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Creates a new account with zero balance. The handle and contact number must both be unused.
    async fn register_account(&self, account: NewAccount) -> Result<Account, LedgerError>;

    /// Sets the account status. Accounts are never deleted; suspension is the only removal mechanism.
    async fn set_account_status(&self, account_id: i64, status: AccountStatus) -> Result<Account, LedgerError>;

    /// Persists a transaction intent with status `Pending` and the given globally unique reference.
    ///
    /// This happens *before* the provider is contacted, so a callback arriving ahead of the synchronous response
    /// still finds the row.
    async fn open_intent(&self, transaction: NewTransaction) -> Result<Transaction, LedgerError>;

    /// Stores the provider-issued correlation id against a pending transaction.
    async fn attach_correlation_id(&self, transaction_id: i64, correlation_id: &str) -> Result<(), LedgerError>;

    /// Finds the transaction whose reference *or* correlation id equals `key` exactly. No pattern matching.
    async fn fetch_transaction_for_callback(&self, key: &str) -> Result<Option<Transaction>, LedgerError>;

    /// Atomically marks a pending transaction `Success`, credits the owning account with `credit`, records the bonus
    /// and fee split, attaches the receipt code, and stores the notification. Used by deposit settlement and
    /// conversion approval.
    ///
    /// Returns `ConflictingState` if the transaction is already terminal; nothing is applied in that case.
    async fn settle_credit(
        &self,
        transaction_id: i64,
        credit: Money,
        bonus: Money,
        fee: Money,
        receipt_code: Option<&str>,
        notification: NewNotification,
    ) -> Result<(Transaction, Account), LedgerError>;

    /// Atomically marks a pending transaction `Failed`, refunds `refund` to the owning account if a reserve debit
    /// had been applied, and stores the notification. The refund is applied at most once because the status guard
    /// only matches a pending row.
    async fn fail_transaction(
        &self,
        transaction_id: i64,
        reason: &str,
        refund: Option<Money>,
        notification: Option<NewNotification>,
    ) -> Result<Transaction, LedgerError>;

    /// Debits the account if, and only if, the balance covers the amount; the conditional, row-scoped update is the
    /// reservation step of the reserve-then-confirm purchase flow. Fails with `InsufficientFunds` carrying the
    /// shortfall otherwise.
    async fn reserve_debit(&self, account_id: i64, amount: Money) -> Result<Account, LedgerError>;

    /// Atomically marks a pending (already debited) purchase `Success`, records the margin as its fee, attaches the
    /// receipt, and stores the notification.
    async fn confirm_purchase(
        &self,
        transaction_id: i64,
        fee: Money,
        receipt_code: Option<&str>,
        notification: Option<NewNotification>,
    ) -> Result<Transaction, LedgerError>;

    /// Creates a queued purchase for an account whose balance fell short.
    async fn enqueue_purchase(&self, purchase: NewQueuedPurchase) -> Result<QueuedPurchase, LedgerError>;

    /// The oldest pending queued purchase for the account, if any.
    async fn next_pending_queued_purchase(&self, account_id: i64) -> Result<Option<QueuedPurchase>, LedgerError>;

    /// Marks a queued purchase completed and links it to the transaction that settled it.
    async fn complete_queued_purchase(&self, queue_id: i64, transaction_id: i64)
        -> Result<QueuedPurchase, LedgerError>;

    /// Records an in-flight purchase transaction against a pending queue entry so it is not dispatched a second
    /// time while the provider confirmation is outstanding.
    async fn link_queued_purchase(&self, queue_id: i64, transaction_id: i64) -> Result<QueuedPurchase, LedgerError>;

    /// Completes the queue entry linked to the transaction, if there is one.
    async fn complete_queued_purchase_for_transaction(
        &self,
        transaction_id: i64,
    ) -> Result<Option<QueuedPurchase>, LedgerError>;

    /// Returns the queue entry linked to a failed purchase transaction to the pending pool.
    async fn release_queued_purchase_for_transaction(
        &self,
        transaction_id: i64,
    ) -> Result<Option<QueuedPurchase>, LedgerError>;

    /// Applies an operator balance adjustment: one `Adjustment` transaction created directly in `Success` status and
    /// the balance change, atomically. Negative deltas are guarded against overdrawing.
    async fn apply_adjustment(
        &self,
        account_id: i64,
        delta: Money,
        reason: &str,
        reference: TxReference,
    ) -> Result<(Transaction, Account), LedgerError>;

    /// Whether the receipt code has already been claimed by a verification request or a settled transaction.
    async fn receipt_code_in_use(&self, receipt_code: &str) -> Result<bool, LedgerError>;

    /// Creates a pending verification request for the transaction, claiming the receipt code.
    async fn create_verification_request(
        &self,
        transaction_id: i64,
        receipt_code: &str,
    ) -> Result<VerificationRequest, LedgerError>;

    /// Fetches a verification request by id.
    async fn fetch_verification_request(&self, id: i64) -> Result<Option<VerificationRequest>, LedgerError>;

    /// Resolves a pending verification request. Returns `ConflictingState` if it was already resolved.
    async fn resolve_verification(
        &self,
        id: i64,
        status: VerificationStatus,
        reviewed_by: &str,
    ) -> Result<VerificationRequest, LedgerError>;

    /// Returns an approved verification request to `Pending` after its settlement failed, so no request is left
    /// approved without the corresponding credit.
    async fn reopen_verification(&self, id: i64) -> Result<VerificationRequest, LedgerError>;

    /// Stores a notification outside of a settlement (broadcasts, operator messages).
    async fn insert_notification(&self, notification: NewNotification) -> Result<Notification, LedgerError>;

    /// Marks a notification read by its addressee.
    async fn mark_notification_read(&self, notification_id: i64, account_id: i64) -> Result<(), LedgerError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), LedgerError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("We have an internal database engine error (configuration/uptime etc.): {0}")]
    DatabaseError(String),
    #[error("The requested account id {0} does not exist")]
    AccountNotFound(i64),
    #[error("Account #{0} is suspended")]
    AccountSuspended(i64),
    #[error("An account already exists for {0}")]
    AccountAlreadyExists(String),
    #[error("The requested transaction {0} does not exist")]
    TransactionNotFound(String),
    #[error("Cannot insert transaction, since the reference {0} already exists")]
    ReferenceAlreadyExists(TxReference),
    #[error("Amount {amount} is below the minimum of {minimum}")]
    InvalidAmount { amount: Money, minimum: Money },
    #[error("Invalid request: {0}")]
    ValidationError(String),
    #[error("Insufficient funds. Shortfall: {shortfall}")]
    InsufficientFunds { shortfall: Money },
    #[error("Receipt code {0} has already been used")]
    DuplicateReceipt(String),
    #[error("The transaction is already in a terminal state. {0}")]
    ConflictingState(String),
    #[error("The payment provider could not be reached: {0}")]
    ProviderUnavailable(String),
    #[error("The payment provider declined the request ({code}): {message}")]
    ProviderDeclined { code: String, message: String },
    #[error("The requested verification request {0} does not exist")]
    VerificationNotFound(i64),
    #[error("{0}")]
    AccountError(#[from] AccountApiError),
    #[error("{0}")]
    SettingsError(#[from] SettingsApiError),
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        LedgerError::DatabaseError(e.to_string())
    }
}
