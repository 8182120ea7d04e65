use std::{fmt::Debug, sync::Arc};

use apg_common::{helpers::normalize_msisdn, Money};
use log::*;

use crate::{
    api::objects::{AirtimeOutcome, CallbackResolution, CallbackUpdate},
    db_types::{
        Account,
        NewNotification,
        NewQueuedPurchase,
        NewTransaction,
        Notification,
        Severity,
        Transaction,
        TransactionKind,
        TransactionStatus,
        TxReference,
        VerificationRequest,
        VerificationStatus,
    },
    helpers::new_reference,
    traits::{CollectionProvider, DisbursementProvider, LedgerDatabase, LedgerError, ProviderResult},
};

/// The minimum deposit the platform accepts.
pub const MIN_DEPOSIT: Money = Money::from_shillings(10);
/// The minimum airtime purchase (and conversion) the platform accepts.
pub const MIN_AIRTIME: Money = Money::from_shillings(5);

/// Provider name recorded on manually verified transactions.
const MANUAL_PROVIDER: &str = "manual";

/// `LedgerFlowApi` is the primary API for the money flows: it opens transaction intents, drives them through the
/// payment providers, and applies reconciliation outcomes (synchronous responses, asynchronous callbacks, and
/// operator verifications) to the ledger.
///
/// The flow for every debit is reserve-then-confirm: the wallet is debited with a conditional row-scoped update
/// before the provider is called, and the debit is reversed exactly once if the provider declines or is unreachable.
pub struct LedgerFlowApi<B> {
    db: B,
    collection: Arc<dyn CollectionProvider>,
    disbursement: Arc<dyn DisbursementProvider>,
}

impl<B> Debug for LedgerFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LedgerFlowApi")
    }
}

impl<B> LedgerFlowApi<B> {
    pub fn new(db: B, collection: Arc<dyn CollectionProvider>, disbursement: Arc<dyn DisbursementProvider>) -> Self {
        Self { db, collection, disbursement }
    }
}

impl<B> LedgerFlowApi<B>
where B: LedgerDatabase
{
    //------------------------------------------ Accounts -------------------------------------------------------

    /// Registers a new account. The contact number is normalised to international format and must be unused, as
    /// must the handle.
    pub async fn register_account(&self, handle: &str, msisdn: &str) -> Result<Account, LedgerError> {
        let msisdn = normalize_msisdn(msisdn)
            .ok_or_else(|| LedgerError::ValidationError(format!("{msisdn} is not a valid phone number")))?;
        let account = self.db.register_account(crate::db_types::NewAccount::new(handle, msisdn)).await?;
        debug!("🧑️ Account #{} registered for {}", account.id, account.msisdn);
        if let Err(e) = self
            .db
            .insert_notification(NewNotification::info(
                account.id,
                "Welcome",
                "Your wallet is ready. Top up to start buying airtime.",
            ))
            .await
        {
            warn!("🧑️ Could not store the welcome notification for account #{}: {e}", account.id);
        }
        Ok(account)
    }

    //------------------------------------------ Deposits -------------------------------------------------------

    /// Opens a deposit intent and sends the STK push to the payer's phone.
    ///
    /// The pending transaction row is persisted *before* the provider is contacted, so a callback that beats the
    /// synchronous response still resolves. If the provider completes synchronously the deposit is settled here;
    /// if it declines or cannot be reached the transaction is marked failed deterministically.
    pub async fn initiate_deposit(
        &self,
        account_id: i64,
        msisdn: Option<&str>,
        amount: Money,
    ) -> Result<Transaction, LedgerError> {
        let account = self.active_account(account_id).await?;
        if amount < MIN_DEPOSIT {
            return Err(LedgerError::InvalidAmount { amount, minimum: MIN_DEPOSIT });
        }
        let msisdn = match msisdn {
            Some(raw) => normalize_msisdn(raw)
                .ok_or_else(|| LedgerError::ValidationError(format!("{raw} is not a valid phone number")))?,
            None => account.msisdn.clone(),
        };
        let reference = new_reference("DEP");
        let intent = NewTransaction::new(TransactionKind::Deposit, amount, self.collection.name(), reference.clone())
            .for_account(account.id)
            .with_msisdn(msisdn.clone());
        let txn = self.db.open_intent(intent).await?;
        debug!("💰️ Deposit intent [{reference}] of {amount} opened for account #{account_id}");
        match self.collection.initiate(&msisdn, amount, &reference).await {
            ProviderResult::Accepted { correlation_id } => {
                self.db.attach_correlation_id(txn.id, &correlation_id).await?;
                trace!("💰️ [{reference}] accepted by {}, correlation id {correlation_id}", self.collection.name());
                Ok(txn)
            },
            ProviderResult::Completed { receipt_code } => {
                match self.settle_deposit_success(&txn, receipt_code.as_deref()).await {
                    Ok((txn, _)) => Ok(txn),
                    // The callback beat the synchronous response; the deposit is already settled.
                    Err(LedgerError::ConflictingState(_)) => self.refetch(txn.id).await,
                    Err(e) => Err(e),
                }
            },
            ProviderResult::Declined { code, message } => {
                let note = NewNotification::warning(account.id, "Deposit failed", format!("{message} ({code})"));
                self.db.fail_transaction(txn.id, &format!("{code}: {message}"), None, Some(note)).await?;
                Err(LedgerError::ProviderDeclined { code, message })
            },
            ProviderResult::Unavailable { reason } => {
                self.db.fail_transaction(txn.id, &reason, None, None).await?;
                Err(LedgerError::ProviderUnavailable(reason))
            },
        }
    }

    /// Returns the transaction for the reference, polling the collection provider first if it is still pending.
    /// A poll that reports a terminal outcome reconciles it exactly as a callback would.
    pub async fn check_deposit_status(&self, reference: &TxReference) -> Result<Transaction, LedgerError> {
        let txn = self
            .db
            .fetch_transaction_by_reference(reference)
            .await?
            .ok_or_else(|| LedgerError::TransactionNotFound(reference.to_string()))?;
        // Manually verified deposits never went to the collection provider; polling it for them would resolve the
        // wrong transaction. Only the provider that owns the intent is asked.
        if txn.status.is_terminal()
            || txn.kind != TransactionKind::Deposit
            || txn.provider != self.collection.name()
        {
            return Ok(txn);
        }
        match self.collection.query(reference).await {
            ProviderResult::Completed { receipt_code } => {
                match self.settle_deposit_success(&txn, receipt_code.as_deref()).await {
                    Ok((txn, _)) => Ok(txn),
                    // A callback settled it while we were polling. The poll is a read; just return the row.
                    Err(LedgerError::ConflictingState(_)) => self.refetch(txn.id).await,
                    Err(e) => Err(e),
                }
            },
            ProviderResult::Declined { code, message } => {
                let note = txn
                    .account_id
                    .map(|aid| NewNotification::warning(aid, "Deposit failed", format!("{message} ({code})")));
                match self.db.fail_transaction(txn.id, &format!("{code}: {message}"), None, note).await {
                    Ok(txn) => Ok(txn),
                    Err(LedgerError::ConflictingState(_)) => self.refetch(txn.id).await,
                    Err(e) => Err(e),
                }
            },
            ProviderResult::Accepted { .. } | ProviderResult::Unavailable { .. } => Ok(txn),
        }
    }

    //------------------------------------------ Callbacks ------------------------------------------------------

    /// Applies an asynchronous provider callback to the ledger.
    ///
    /// The update key is matched exactly against the stored reference or correlation id. A callback for a
    /// transaction already in a terminal state is a no-op acknowledged as success, which is what defuses provider
    /// retry storms; the same applies when a concurrent resolution wins the status guard.
    pub async fn handle_callback(&self, update: CallbackUpdate) -> Result<CallbackResolution, LedgerError> {
        let txn = self
            .db
            .fetch_transaction_for_callback(&update.key)
            .await?
            .ok_or_else(|| LedgerError::TransactionNotFound(update.key.clone()))?;
        if txn.status.is_terminal() {
            info!("🔁️ Duplicate callback for [{}] ({}). Acknowledged, no effect.", txn.reference, txn.status);
            return Ok(CallbackResolution::AlreadyResolved(txn));
        }
        if let Some(reported) = update.amount {
            if reported != txn.amount {
                warn!(
                    "🔁️ Callback for [{}] reports {reported} but the intent was for {}. The intent amount governs.",
                    txn.reference, txn.amount
                );
            }
        }
        let result = if update.success {
            self.apply_success(&txn, update.receipt_code.as_deref()).await
        } else {
            let code = update.result_code.unwrap_or_else(|| "unknown".into());
            let message = update.result_message.unwrap_or_else(|| "The provider reported a failure".into());
            self.apply_failure(&txn, &code, &message).await
        };
        match result {
            Err(LedgerError::ConflictingState(reason)) => {
                // Two callbacks raced past the status read; the loser lands here. Swallow and ack.
                info!("🔁️ Callback for [{}] lost a resolution race ({reason}). Acknowledged.", txn.reference);
                let txn = self.refetch(txn.id).await?;
                Ok(CallbackResolution::AlreadyResolved(txn))
            },
            other => other,
        }
    }

    async fn apply_success(
        &self,
        txn: &Transaction,
        receipt_code: Option<&str>,
    ) -> Result<CallbackResolution, LedgerError> {
        match txn.kind {
            TransactionKind::Deposit => {
                let (txn, _) = self.settle_deposit_success(txn, receipt_code).await?;
                Ok(CallbackResolution::Settled(txn))
            },
            TransactionKind::AirtimePurchase => {
                let settings = self.db.fetch_settings().await?;
                let fee = txn.amount - settings.delivered_value(txn.amount);
                let note = txn.account_id.map(|aid| {
                    NewNotification::success(
                        aid,
                        "Airtime sent",
                        format!("{} of airtime was sent to {}", txn.amount, txn.msisdn.as_deref().unwrap_or("you")),
                    )
                });
                let txn = self.db.confirm_purchase(txn.id, fee, receipt_code, note).await?;
                if let Some(purchase) = self.db.complete_queued_purchase_for_transaction(txn.id).await? {
                    info!("📦️ Queued purchase #{} settled by [{}]", purchase.id, txn.reference);
                }
                Ok(CallbackResolution::Settled(txn))
            },
            TransactionKind::DirectPurchase => self.settle_direct_purchase(txn, receipt_code).await,
            TransactionKind::Adjustment | TransactionKind::Conversion => Err(LedgerError::ValidationError(format!(
                "{} transactions are not resolved by provider callbacks",
                txn.kind
            ))),
        }
    }

    async fn apply_failure(
        &self,
        txn: &Transaction,
        code: &str,
        message: &str,
    ) -> Result<CallbackResolution, LedgerError> {
        // Airtime purchases debit up front; the reversal happens in the same atomic unit as the status flip.
        let refund = matches!(txn.kind, TransactionKind::AirtimePurchase).then_some(txn.amount);
        let note = txn.account_id.map(|aid| {
            let title = match txn.kind {
                TransactionKind::Deposit => "Deposit failed",
                _ => "Purchase failed",
            };
            NewNotification::warning(aid, title, format!("{message} ({code})"))
        });
        let failed = self.db.fail_transaction(txn.id, &format!("{code}: {message}"), refund, note).await?;
        debug!("🔁️ [{}] marked failed from callback: {code} {message}", failed.reference);
        if matches!(txn.kind, TransactionKind::AirtimePurchase) {
            if let Some(purchase) = self.db.release_queued_purchase_for_transaction(failed.id).await? {
                info!("📦️ Queued purchase #{} returns to the queue after the failed attempt", purchase.id);
            }
        }
        Ok(CallbackResolution::Failed(failed))
    }

    /// The money for a direct purchase has been collected; run the disbursement leg.
    async fn settle_direct_purchase(
        &self,
        txn: &Transaction,
        collection_receipt: Option<&str>,
    ) -> Result<CallbackResolution, LedgerError> {
        let settings = self.db.fetch_settings().await?;
        let delivered = settings.delivered_value(txn.amount);
        let fee = txn.amount - delivered;
        let recipient = txn
            .msisdn
            .clone()
            .ok_or_else(|| LedgerError::ValidationError(format!("[{}] has no recipient number", txn.reference)))?;
        match self.disbursement.send_airtime(&recipient, delivered).await {
            ProviderResult::Completed { .. } => {
                let txn = self.db.confirm_purchase(txn.id, fee, collection_receipt, None).await?;
                debug!("📲️ Direct purchase [{}] delivered {delivered} to {recipient}", txn.reference);
                Ok(CallbackResolution::Settled(txn))
            },
            ProviderResult::Accepted { correlation_id } => {
                self.db.attach_correlation_id(txn.id, &correlation_id).await?;
                let txn = self.refetch(txn.id).await?;
                Ok(CallbackResolution::Settled(txn))
            },
            ProviderResult::Declined { code, message } => {
                self.direct_purchase_undelivered(txn, collection_receipt, &format!("{message} ({code})")).await
            },
            ProviderResult::Unavailable { reason } => {
                self.direct_purchase_undelivered(txn, collection_receipt, &reason).await
            },
        }
    }

    async fn direct_purchase_undelivered(
        &self,
        txn: &Transaction,
        collection_receipt: Option<&str>,
        message: &str,
    ) -> Result<CallbackResolution, LedgerError> {
        // The payer's money is already collected. Flag it loudly for manual follow-up; there is no refund
        // API on the collection side.
        let receipt = collection_receipt.unwrap_or("no receipt");
        let note = NewNotification::broadcast(
            "Direct purchase needs follow-up",
            format!(
                "Collected {} (receipt {receipt}) for [{}] but the airtime could not be sent: {message}",
                txn.amount, txn.reference
            ),
            Severity::Error,
        );
        let reason = format!("airtime leg failed after collection (receipt {receipt}): {message}");
        let failed = self.db.fail_transaction(txn.id, &reason, None, Some(note)).await?;
        error!("📲️ Direct purchase [{}] collected but not delivered: {message}", failed.reference);
        Ok(CallbackResolution::Failed(failed))
    }

    //------------------------------------------ Airtime --------------------------------------------------------

    /// Buys airtime from the wallet balance.
    ///
    /// If the balance does not cover the requested amount, no transaction is created; the request is queued and the
    /// shortfall reported. Queued purchases are retried automatically, oldest first, when the balance next
    /// increases.
    pub async fn buy_airtime(
        &self,
        account_id: i64,
        recipient: &str,
        amount: Money,
    ) -> Result<AirtimeOutcome, LedgerError> {
        let account = self.active_account(account_id).await?;
        if amount < MIN_AIRTIME {
            return Err(LedgerError::InvalidAmount { amount, minimum: MIN_AIRTIME });
        }
        let recipient = normalize_msisdn(recipient)
            .ok_or_else(|| LedgerError::ValidationError(format!("{recipient} is not a valid phone number")))?;
        if account.balance < amount {
            return self.queue_purchase(&account, &recipient, amount).await;
        }
        match self.execute_purchase(account.id, &recipient, amount).await {
            Ok(txn) => Ok(AirtimeOutcome::Delivered(txn)),
            // A concurrent debit won the reservation. Same outcome as an up-front shortfall.
            Err(LedgerError::InsufficientFunds { .. }) => self.queue_purchase(&account, &recipient, amount).await,
            Err(e) => Err(e),
        }
    }

    async fn queue_purchase(
        &self,
        account: &Account,
        recipient: &str,
        amount: Money,
    ) -> Result<AirtimeOutcome, LedgerError> {
        let shortfall = amount - account.balance;
        let purchase = self.db.enqueue_purchase(NewQueuedPurchase::new(account.id, recipient, amount)).await?;
        info!(
            "📦️ Account #{} is {shortfall} short of a {amount} purchase. Queued as #{} for the next top-up.",
            account.id, purchase.id
        );
        Ok(AirtimeOutcome::Queued { purchase, shortfall })
    }

    /// The reserve-then-confirm purchase: intent, conditional debit, provider call, then confirm or reverse.
    async fn execute_purchase(
        &self,
        account_id: i64,
        recipient: &str,
        amount: Money,
    ) -> Result<Transaction, LedgerError> {
        let reference = new_reference("AIR");
        let intent =
            NewTransaction::new(TransactionKind::AirtimePurchase, amount, self.disbursement.name(), reference.clone())
                .for_account(account_id)
                .with_msisdn(recipient);
        let txn = self.db.open_intent(intent).await?;
        if let Err(e) = self.db.reserve_debit(account_id, amount).await {
            // Nothing was debited, so the intent closes without a refund.
            let _ = self.db.fail_transaction(txn.id, "balance no longer covers the purchase", None, None).await;
            return Err(e);
        }
        let settings = self.db.fetch_settings().await?;
        let delivered = settings.delivered_value(amount);
        let fee = amount - delivered;
        trace!("📲️ [{reference}] reserved {amount}; sending {delivered} of airtime to {recipient}");
        match self.disbursement.send_airtime(recipient, delivered).await {
            ProviderResult::Completed { receipt_code } => {
                let note = NewNotification::success(
                    account_id,
                    "Airtime sent",
                    format!("{amount} of airtime was sent to {recipient}"),
                );
                let txn = self.db.confirm_purchase(txn.id, fee, receipt_code.as_deref(), Some(note)).await?;
                debug!("📲️ [{reference}] delivered. {amount} debited from account #{account_id}");
                Ok(txn)
            },
            ProviderResult::Accepted { correlation_id } => {
                // The debit stays reserved; the provider's callback will confirm or fail the purchase.
                self.db.attach_correlation_id(txn.id, &correlation_id).await?;
                self.refetch(txn.id).await
            },
            ProviderResult::Declined { code, message } => {
                let note =
                    NewNotification::warning(account_id, "Purchase failed", format!("Refunded {amount}. {message}"));
                self.db.fail_transaction(txn.id, &format!("{code}: {message}"), Some(amount), Some(note)).await?;
                Err(LedgerError::ProviderDeclined { code, message })
            },
            ProviderResult::Unavailable { reason } => {
                let note = NewNotification::warning(
                    account_id,
                    "Purchase failed",
                    format!("Refunded {amount}. The airtime service is unavailable, please retry shortly."),
                );
                self.db.fail_transaction(txn.id, &reason, Some(amount), Some(note)).await?;
                Err(LedgerError::ProviderUnavailable(reason))
            },
        }
    }

    /// Sells airtime to an unregistered buyer: the money is collected by STK push and the airtime disbursed to the
    /// recipient once the collection callback confirms. No wallet is involved.
    pub async fn direct_purchase(
        &self,
        payer: &str,
        recipient: &str,
        amount: Money,
    ) -> Result<Transaction, LedgerError> {
        if amount < MIN_AIRTIME {
            return Err(LedgerError::InvalidAmount { amount, minimum: MIN_AIRTIME });
        }
        let payer = normalize_msisdn(payer)
            .ok_or_else(|| LedgerError::ValidationError(format!("{payer} is not a valid phone number")))?;
        let recipient = normalize_msisdn(recipient)
            .ok_or_else(|| LedgerError::ValidationError(format!("{recipient} is not a valid phone number")))?;
        let reference = new_reference("DIR");
        let payload = serde_json::json!({ "payer": payer, "recipient": recipient }).to_string();
        let intent =
            NewTransaction::new(TransactionKind::DirectPurchase, amount, self.collection.name(), reference.clone())
                .with_msisdn(recipient.clone())
                .with_payload(payload);
        let txn = self.db.open_intent(intent).await?;
        debug!("📲️ Direct purchase [{reference}]: {amount} for {recipient}, paid by {payer}");
        match self.collection.initiate(&payer, amount, &reference).await {
            ProviderResult::Accepted { correlation_id } => {
                self.db.attach_correlation_id(txn.id, &correlation_id).await?;
                Ok(txn)
            },
            ProviderResult::Completed { receipt_code } => {
                match self.settle_direct_purchase(&txn, receipt_code.as_deref()).await? {
                    CallbackResolution::Settled(txn) | CallbackResolution::Failed(txn) => Ok(txn),
                    CallbackResolution::AlreadyResolved(txn) => Ok(txn),
                }
            },
            ProviderResult::Declined { code, message } => {
                self.db.fail_transaction(txn.id, &format!("{code}: {message}"), None, None).await?;
                Err(LedgerError::ProviderDeclined { code, message })
            },
            ProviderResult::Unavailable { reason } => {
                self.db.fail_transaction(txn.id, &reason, None, None).await?;
                Err(LedgerError::ProviderUnavailable(reason))
            },
        }
    }

    //------------------------------------------ Settlement core ------------------------------------------------

    /// Settles a successful deposit: bonus per the settings snapshot read *now*, credit of amount + bonus, receipt
    /// attached, notification stored, all in one atomic unit. Afterwards the oldest queued purchase is attempted.
    async fn settle_deposit_success(
        &self,
        txn: &Transaction,
        receipt_code: Option<&str>,
    ) -> Result<(Transaction, Account), LedgerError> {
        let account_id = txn
            .account_id
            .ok_or_else(|| LedgerError::ValidationError(format!("Deposit [{}] has no owning account", txn.reference)))?;
        let settings = self.db.fetch_settings().await?;
        let bonus = settings.bonus_for(txn.amount);
        let credit = txn.amount + bonus;
        let message = if bonus > Money::default() {
            format!("{} received, plus a {bonus} bonus. New deposits of this size keep earning it.", txn.amount)
        } else {
            format!("{} received.", txn.amount)
        };
        let note = NewNotification::success(account_id, "Deposit received", message);
        let (txn, account) =
            self.db.settle_credit(txn.id, credit, bonus, Money::default(), receipt_code, note).await?;
        debug!("💰️ Deposit [{}] settled. {credit} credited to account #{account_id}", txn.reference);
        if let Err(e) = self.try_settle_queued_purchase(&account).await {
            // The deposit itself is settled; a queue problem must not undo that.
            warn!("📦️ Could not settle a queued purchase for account #{}: {e}", account.id);
        }
        Ok((txn, account))
    }

    /// Attempts exactly one queued purchase, oldest first, after a balance increase. If the new balance still does
    /// not cover it, it stays queued.
    async fn try_settle_queued_purchase(&self, account: &Account) -> Result<(), LedgerError> {
        let Some(purchase) = self.db.next_pending_queued_purchase(account.id).await? else {
            return Ok(());
        };
        if account.balance < purchase.amount {
            trace!(
                "📦️ Queued purchase #{} ({}) still exceeds the balance of account #{}. Leaving it queued.",
                purchase.id, purchase.amount, account.id
            );
            return Ok(());
        }
        match self.execute_purchase(account.id, &purchase.msisdn, purchase.amount).await {
            Ok(txn) if txn.status == TransactionStatus::Success => {
                self.db.complete_queued_purchase(purchase.id, txn.id).await?;
                info!("📦️ Queued purchase #{} settled by [{}] for account #{}", purchase.id, txn.reference, account.id);
            },
            Ok(txn) => {
                // The disbursement was accepted but not yet confirmed. The entry stays pending, linked to the
                // in-flight transaction so it is not dispatched twice; the callback completes or releases it.
                self.db.link_queued_purchase(purchase.id, txn.id).await?;
                info!("📦️ Queued purchase #{} is in flight as [{}]", purchase.id, txn.reference);
            },
            Err(e) => {
                // The purchase transaction records the failure and the debit was reversed; the queue entry waits
                // for the next credit.
                warn!("📦️ Queued purchase #{} failed and remains queued: {e}", purchase.id);
            },
        }
        Ok(())
    }

    //------------------------------------------ Manual verification --------------------------------------------

    /// Submits a provider receipt for a deposit without a reliable callback. The receipt code must be unclaimed;
    /// an operator approves or rejects the request later.
    pub async fn submit_deposit_verification(
        &self,
        account_id: i64,
        receipt_code: &str,
        amount: Money,
    ) -> Result<VerificationRequest, LedgerError> {
        let account = self.active_account(account_id).await?;
        if amount < MIN_DEPOSIT {
            return Err(LedgerError::InvalidAmount { amount, minimum: MIN_DEPOSIT });
        }
        if self.db.receipt_code_in_use(receipt_code).await? {
            return Err(LedgerError::DuplicateReceipt(receipt_code.to_string()));
        }
        let reference = new_reference("MAN");
        let intent = NewTransaction::new(TransactionKind::Deposit, amount, MANUAL_PROVIDER, reference.clone())
            .for_account(account.id)
            .with_msisdn(account.msisdn.clone());
        let txn = self.db.open_intent(intent).await?;
        let request = self.db.create_verification_request(txn.id, receipt_code).await?;
        info!("🧾️ Verification #{} submitted for deposit [{reference}] with receipt {receipt_code}", request.id);
        Ok(request)
    }

    /// Opens an airtime-to-cash conversion intent: the user sends airtime to the platform's line and will quote the
    /// confirmation receipt via [`Self::submit_conversion_receipt`].
    pub async fn initiate_conversion(
        &self,
        account_id: i64,
        msisdn: Option<&str>,
        amount: Money,
    ) -> Result<Transaction, LedgerError> {
        let account = self.active_account(account_id).await?;
        if amount < MIN_AIRTIME {
            return Err(LedgerError::InvalidAmount { amount, minimum: MIN_AIRTIME });
        }
        let msisdn = match msisdn {
            Some(raw) => normalize_msisdn(raw)
                .ok_or_else(|| LedgerError::ValidationError(format!("{raw} is not a valid phone number")))?,
            None => account.msisdn.clone(),
        };
        let reference = new_reference("CNV");
        let intent = NewTransaction::new(TransactionKind::Conversion, amount, MANUAL_PROVIDER, reference.clone())
            .for_account(account.id)
            .with_msisdn(msisdn);
        let txn = self.db.open_intent(intent).await?;
        debug!("🧾️ Conversion [{reference}] of {amount} opened for account #{account_id}");
        Ok(txn)
    }

    /// Attaches the telco confirmation receipt to a pending conversion, creating the verification request an
    /// operator will review.
    pub async fn submit_conversion_receipt(
        &self,
        reference: &TxReference,
        receipt_code: &str,
    ) -> Result<VerificationRequest, LedgerError> {
        let txn = self
            .db
            .fetch_transaction_by_reference(reference)
            .await?
            .ok_or_else(|| LedgerError::TransactionNotFound(reference.to_string()))?;
        if txn.kind != TransactionKind::Conversion {
            return Err(LedgerError::ValidationError(format!("[{reference}] is not a conversion")));
        }
        if txn.status.is_terminal() {
            return Err(LedgerError::ConflictingState(format!("[{reference}] is already {}", txn.status)));
        }
        if self.db.receipt_code_in_use(receipt_code).await? {
            return Err(LedgerError::DuplicateReceipt(receipt_code.to_string()));
        }
        let request = self.db.create_verification_request(txn.id, receipt_code).await?;
        info!("🧾️ Verification #{} submitted for conversion [{reference}] with receipt {receipt_code}", request.id);
        Ok(request)
    }

    /// Operator approval of a verification request. Runs the same settlement as automatic reconciliation: the
    /// standard credit+bonus for deposits, the configured conversion rate for conversions.
    pub async fn approve_verification(&self, id: i64, reviewed_by: &str) -> Result<Transaction, LedgerError> {
        let request = self.db.fetch_verification_request(id).await?.ok_or(LedgerError::VerificationNotFound(id))?;
        // Claiming the request first means a concurrent reviewer gets ConflictingState, not a double credit.
        let request = self.db.resolve_verification(request.id, VerificationStatus::Approved, reviewed_by).await?;
        match self.settle_approved_verification(&request, reviewed_by).await {
            Ok(txn) => Ok(txn),
            Err(e) => {
                // The claim must not outlive a failed settlement; the request goes back for a retry.
                if let Err(re) = self.db.reopen_verification(request.id).await {
                    warn!("🧾️ Could not reopen verification #{} after a failed settlement: {re}", request.id);
                }
                Err(e)
            },
        }
    }

    async fn settle_approved_verification(
        &self,
        request: &VerificationRequest,
        reviewed_by: &str,
    ) -> Result<Transaction, LedgerError> {
        let txn = self
            .db
            .fetch_transaction_by_id(request.transaction_id)
            .await?
            .ok_or_else(|| LedgerError::TransactionNotFound(format!("#{}", request.transaction_id)))?;
        match txn.kind {
            TransactionKind::Deposit => {
                let (txn, _) = self.settle_deposit_success(&txn, Some(&request.receipt_code)).await?;
                Ok(txn)
            },
            TransactionKind::Conversion => {
                let account_id = txn.account_id.ok_or_else(|| {
                    LedgerError::ValidationError(format!("Conversion [{}] has no owning account", txn.reference))
                })?;
                let settings = self.db.fetch_settings().await?;
                let credit = settings.conversion_credit(txn.amount);
                let fee = txn.amount - credit;
                let note = NewNotification::success(
                    account_id,
                    "Conversion approved",
                    format!("{} of airtime was converted; {credit} has been credited to your wallet.", txn.amount),
                );
                let (txn, account) = self
                    .db
                    .settle_credit(txn.id, credit, Money::default(), fee, Some(&request.receipt_code), note)
                    .await?;
                info!("🧾️ Conversion [{}] approved by {reviewed_by}. {credit} credited.", txn.reference);
                if let Err(e) = self.try_settle_queued_purchase(&account).await {
                    warn!("📦️ Could not settle a queued purchase for account #{}: {e}", account.id);
                }
                Ok(txn)
            },
            kind => Err(LedgerError::ValidationError(format!("{kind} transactions cannot be manually verified"))),
        }
    }

    /// Operator rejection: the verification and its underlying transaction are both marked failed. No balance was
    /// touched on this path, so there is nothing to reverse.
    pub async fn reject_verification(
        &self,
        id: i64,
        reviewed_by: &str,
        reason: &str,
    ) -> Result<Transaction, LedgerError> {
        let request = self.db.fetch_verification_request(id).await?.ok_or(LedgerError::VerificationNotFound(id))?;
        let request = self.db.resolve_verification(request.id, VerificationStatus::Rejected, reviewed_by).await?;
        let txn = self
            .db
            .fetch_transaction_by_id(request.transaction_id)
            .await?
            .ok_or_else(|| LedgerError::TransactionNotFound(format!("#{}", request.transaction_id)))?;
        let note = txn
            .account_id
            .map(|aid| NewNotification::warning(aid, "Verification rejected", format!("Receipt {}: {reason}", request.receipt_code)));
        let txn = self.db.fail_transaction(txn.id, reason, None, note).await?;
        info!("🧾️ Verification #{id} rejected by {reviewed_by}: {reason}");
        Ok(txn)
    }

    //------------------------------------------ Admin ----------------------------------------------------------

    /// Operator balance correction. Positive deltas credit, negative deltas debit (guarded against overdrawing).
    pub async fn adjust_balance(
        &self,
        account_id: i64,
        delta: Money,
        reason: &str,
    ) -> Result<(Transaction, Account), LedgerError> {
        let reference = new_reference("ADJ");
        let (txn, account) = self.db.apply_adjustment(account_id, delta, reason, reference).await?;
        let direction = if delta.is_negative() { "debited from" } else { "credited to" };
        let note = NewNotification::info(
            account_id,
            "Balance adjusted",
            format!("An adjustment of {delta} was {direction} your wallet: {reason}"),
        );
        if let Err(e) = self.db.insert_notification(note).await {
            warn!("⚖️ Could not store the adjustment notification for account #{account_id}: {e}");
        }
        info!("⚖️ Adjustment [{}] of {delta} applied to account #{account_id}: {reason}", txn.reference);
        Ok((txn, account))
    }

    pub async fn set_account_status(
        &self,
        account_id: i64,
        status: crate::db_types::AccountStatus,
    ) -> Result<Account, LedgerError> {
        let account = self.db.set_account_status(account_id, status).await?;
        info!("🧑️ Account #{account_id} is now {status}");
        Ok(account)
    }

    pub async fn broadcast_notification(
        &self,
        title: &str,
        message: &str,
        severity: Severity,
    ) -> Result<Notification, LedgerError> {
        self.db.insert_notification(NewNotification::broadcast(title, message, severity)).await
    }

    pub async fn mark_notification_read(&self, notification_id: i64, account_id: i64) -> Result<(), LedgerError> {
        self.db.mark_notification_read(notification_id, account_id).await
    }

    /// Reads the disbursement float and warns when it is below the configured minimum.
    pub async fn check_float(&self) -> Result<Option<Money>, LedgerError> {
        let Some(balance) = self.disbursement.float_balance().await else {
            warn!("🛟️ The disbursement float balance could not be read");
            return Ok(None);
        };
        let settings = self.db.fetch_settings().await?;
        if balance < settings.min_float {
            warn!("🛟️ Disbursement float is {balance}, below the configured minimum of {}", settings.min_float);
        }
        Ok(Some(balance))
    }

    //------------------------------------------ Internals ------------------------------------------------------

    async fn active_account(&self, account_id: i64) -> Result<Account, LedgerError> {
        let account = self.db.fetch_account(account_id).await?.ok_or(LedgerError::AccountNotFound(account_id))?;
        if !account.is_active() {
            return Err(LedgerError::AccountSuspended(account_id));
        }
        Ok(account)
    }

    async fn refetch(&self, transaction_id: i64) -> Result<Transaction, LedgerError> {
        self.db
            .fetch_transaction_by_id(transaction_id)
            .await?
            .ok_or_else(|| LedgerError::TransactionNotFound(format!("#{transaction_id}")))
    }
}
