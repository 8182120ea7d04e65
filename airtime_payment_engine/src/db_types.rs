//! Data types as they are stored in, and retrieved from, the database.
//!
//! Enumerations are stored as TEXT using their `Display` form; the `FromStr`/`From<String>` pair converts them back.

use std::{fmt::Display, str::FromStr};

use apg_common::Money;
use chrono::{DateTime, Utc};
use log::error;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid conversion: {0}")]
pub struct ConversionError(String);

//--------------------------------------   AccountStatus   -----------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum AccountStatus {
    Active,
    Suspended,
}

impl Display for AccountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccountStatus::Active => write!(f, "Active"),
            AccountStatus::Suspended => write!(f, "Suspended"),
        }
    }
}

impl FromStr for AccountStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Active" => Ok(Self::Active),
            "Suspended" => Ok(Self::Suspended),
            s => Err(ConversionError(format!("Invalid account status: {s}"))),
        }
    }
}

impl From<String> for AccountStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid account status: {value}. But this conversion cannot fail. Defaulting to Suspended");
            AccountStatus::Suspended
        })
    }
}

//--------------------------------------      Account      -----------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    /// Unique display handle chosen at registration
    pub handle: String,
    /// Contact number in international format, `2547XXXXXXXX`
    pub msisdn: String,
    /// The wallet balance. Never negative; only the ledger mutates it.
    pub balance: Money,
    pub status: AccountStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAccount {
    pub handle: String,
    pub msisdn: String,
}

impl NewAccount {
    pub fn new<S1: Into<String>, S2: Into<String>>(handle: S1, msisdn: S2) -> Self {
        Self { handle: handle.into(), msisdn: msisdn.into() }
    }
}

//--------------------------------------  TransactionKind  -----------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum TransactionKind {
    /// Mobile-money collection that credits a wallet
    Deposit,
    /// Airtime bought from a wallet balance
    AirtimePurchase,
    /// Anonymous purchase paid by STK push, no wallet involved
    DirectPurchase,
    /// Operator-applied balance correction
    Adjustment,
    /// Airtime-to-cash conversion credited to a wallet
    Conversion,
}

impl Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionKind::Deposit => write!(f, "Deposit"),
            TransactionKind::AirtimePurchase => write!(f, "AirtimePurchase"),
            TransactionKind::DirectPurchase => write!(f, "DirectPurchase"),
            TransactionKind::Adjustment => write!(f, "Adjustment"),
            TransactionKind::Conversion => write!(f, "Conversion"),
        }
    }
}

impl FromStr for TransactionKind {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Deposit" => Ok(Self::Deposit),
            "AirtimePurchase" => Ok(Self::AirtimePurchase),
            "DirectPurchase" => Ok(Self::DirectPurchase),
            "Adjustment" => Ok(Self::Adjustment),
            "Conversion" => Ok(Self::Conversion),
            s => Err(ConversionError(format!("Invalid transaction kind: {s}"))),
        }
    }
}

//-------------------------------------- TransactionStatus -----------------------------------------------------------
/// The lifecycle of a transaction. `Pending` may move to `Success` or `Failed` exactly once; both are terminal and a
/// transaction is never re-opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

impl Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionStatus::Pending => write!(f, "Pending"),
            TransactionStatus::Success => write!(f, "Success"),
            TransactionStatus::Failed => write!(f, "Failed"),
        }
    }
}

impl FromStr for TransactionStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Success" => Ok(Self::Success),
            "Failed" => Ok(Self::Failed),
            s => Err(ConversionError(format!("Invalid transaction status: {s}"))),
        }
    }
}

//--------------------------------------    TxReference    -----------------------------------------------------------
/// The globally unique reference assigned to a transaction at intent creation. Callbacks match on this value (or on
/// the provider-issued correlation id) exactly; it is immutable once the row exists.
#[derive(Debug, Clone, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct TxReference(pub String);

impl FromStr for TxReference {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for TxReference {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for TxReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TxReference {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------    Transaction    -----------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    /// The owning account. `None` for anonymous direct purchases.
    pub account_id: Option<i64>,
    pub kind: TransactionKind,
    /// The requested amount
    pub amount: Money,
    /// Bonus credited on top of a qualifying deposit
    pub bonus: Money,
    /// The platform margin withheld on airtime flows
    pub fee: Money,
    /// Name of the external payment provider
    pub provider: String,
    pub reference: TxReference,
    /// Provider-issued correlation id, attached after `initiate` is accepted
    pub correlation_id: Option<String>,
    /// Counterparty or recipient phone number
    pub msisdn: Option<String>,
    /// Provider settlement code attached at resolution
    pub receipt_code: Option<String>,
    pub status: TransactionStatus,
    /// Free-form result payload (JSON)
    pub payload: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------   NewTransaction  -----------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub account_id: Option<i64>,
    pub kind: TransactionKind,
    pub amount: Money,
    pub provider: String,
    pub reference: TxReference,
    pub msisdn: Option<String>,
    pub payload: Option<String>,
}

impl NewTransaction {
    pub fn new<S: Into<String>>(kind: TransactionKind, amount: Money, provider: S, reference: TxReference) -> Self {
        Self {
            account_id: None,
            kind,
            amount,
            provider: provider.into(),
            reference,
            msisdn: None,
            payload: None,
        }
    }

    pub fn for_account(mut self, account_id: i64) -> Self {
        self.account_id = Some(account_id);
        self
    }

    pub fn with_msisdn<S: Into<String>>(mut self, msisdn: S) -> Self {
        self.msisdn = Some(msisdn.into());
        self
    }

    pub fn with_payload<S: Into<String>>(mut self, payload: S) -> Self {
        self.payload = Some(payload.into());
        self
    }
}

//--------------------------------------    QueueStatus    -----------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum QueueStatus {
    Pending,
    Completed,
}

impl Display for QueueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueStatus::Pending => write!(f, "Pending"),
            QueueStatus::Completed => write!(f, "Completed"),
        }
    }
}

impl FromStr for QueueStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Completed" => Ok(Self::Completed),
            s => Err(ConversionError(format!("Invalid queue status: {s}"))),
        }
    }
}

//--------------------------------------  QueuedPurchase   -----------------------------------------------------------
/// A purchase deferred because the wallet could not cover it. The oldest pending entry is retried automatically the
/// next time the account balance increases.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QueuedPurchase {
    pub id: i64,
    pub account_id: i64,
    /// The target contact number for the airtime
    pub msisdn: String,
    pub amount: Money,
    pub status: QueueStatus,
    /// The transaction that eventually settled this entry
    pub transaction_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewQueuedPurchase {
    pub account_id: i64,
    pub msisdn: String,
    pub amount: Money,
}

impl NewQueuedPurchase {
    pub fn new<S: Into<String>>(account_id: i64, msisdn: S, amount: Money) -> Self {
        Self { account_id, msisdn: msisdn.into(), amount }
    }
}

//--------------------------------------     Severity      -----------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "Info"),
            Severity::Success => write!(f, "Success"),
            Severity::Warning => write!(f, "Warning"),
            Severity::Error => write!(f, "Error"),
        }
    }
}

impl FromStr for Severity {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Info" => Ok(Self::Info),
            "Success" => Ok(Self::Success),
            "Warning" => Ok(Self::Warning),
            "Error" => Ok(Self::Error),
            s => Err(ConversionError(format!("Invalid severity: {s}"))),
        }
    }
}

//--------------------------------------   Notification    -----------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    /// `None` means a broadcast visible to operators / all users
    pub account_id: Option<i64>,
    pub title: String,
    pub message: String,
    pub severity: Severity,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub account_id: Option<i64>,
    pub title: String,
    pub message: String,
    pub severity: Severity,
}

impl NewNotification {
    pub fn success<S1: Into<String>, S2: Into<String>>(account_id: i64, title: S1, message: S2) -> Self {
        Self { account_id: Some(account_id), title: title.into(), message: message.into(), severity: Severity::Success }
    }

    pub fn info<S1: Into<String>, S2: Into<String>>(account_id: i64, title: S1, message: S2) -> Self {
        Self { account_id: Some(account_id), title: title.into(), message: message.into(), severity: Severity::Info }
    }

    pub fn warning<S1: Into<String>, S2: Into<String>>(account_id: i64, title: S1, message: S2) -> Self {
        Self { account_id: Some(account_id), title: title.into(), message: message.into(), severity: Severity::Warning }
    }

    pub fn broadcast<S1: Into<String>, S2: Into<String>>(title: S1, message: S2, severity: Severity) -> Self {
        Self { account_id: None, title: title.into(), message: message.into(), severity }
    }
}

//-------------------------------------- VerificationStatus ----------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum VerificationStatus {
    Pending,
    Approved,
    Rejected,
}

impl Display for VerificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerificationStatus::Pending => write!(f, "Pending"),
            VerificationStatus::Approved => write!(f, "Approved"),
            VerificationStatus::Rejected => write!(f, "Rejected"),
        }
    }
}

impl FromStr for VerificationStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Approved" => Ok(Self::Approved),
            "Rejected" => Ok(Self::Rejected),
            s => Err(ConversionError(format!("Invalid verification status: {s}"))),
        }
    }
}

//-------------------------------------- VerificationRequest ---------------------------------------------------------
/// An operator-reviewed claim that a provider receipt settles the linked transaction. The receipt code is unique
/// across all requests and settled transactions, which is what makes the manual path idempotent.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct VerificationRequest {
    pub id: i64,
    pub transaction_id: i64,
    pub receipt_code: String,
    pub status: VerificationStatus,
    pub reviewed_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------      Setting      -----------------------------------------------------------
/// A raw settings row. Use [`crate::api::settings_api::SettingsApi`] or the
/// [`crate::traits::SettingsManagement::fetch_settings`] snapshot for typed access.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Setting {
    pub name: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------     Settings      -----------------------------------------------------------
/// A point-in-time snapshot of the configurable ledger parameters.
///
/// The snapshot is read at *resolution* time, not intent-creation time: the rate in effect when a transaction
/// resolves governs the computed bonus and discount. That is explicit policy, not an oversight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Deposits of at least this amount earn `bonus_amount`
    pub bonus_threshold: Money,
    pub bonus_amount: Money,
    /// Platform margin on airtime, in basis points
    pub discount_rate_bps: i64,
    /// Fraction of face value credited on airtime-to-cash conversions, in basis points
    pub conversion_rate_bps: i64,
    /// The disbursement float level below which operators are warned
    pub min_float: Money,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bonus_threshold: Money::from_shillings(50),
            bonus_amount: Money::from_shillings(6),
            discount_rate_bps: 500,
            conversion_rate_bps: 8_000,
            min_float: Money::from_shillings(1_000),
        }
    }
}

impl Settings {
    /// The bonus credited for a deposit of `amount`, per the snapshot.
    pub fn bonus_for(&self, amount: Money) -> Money {
        if amount >= self.bonus_threshold {
            self.bonus_amount
        } else {
            Money::default()
        }
    }

    /// The net airtime value delivered to the recipient; the difference to the requested amount is the margin.
    pub fn delivered_value(&self, requested: Money) -> Money {
        requested.scale_bps(10_000 - self.discount_rate_bps)
    }

    /// The cash credited for a conversion of airtime with the given face value.
    pub fn conversion_credit(&self, face_value: Money) -> Money {
        face_value.scale_bps(self.conversion_rate_bps)
    }
}
