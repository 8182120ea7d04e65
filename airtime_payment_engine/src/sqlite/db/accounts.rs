use apg_common::Money;
use log::trace;
use sqlx::SqliteConnection;

use crate::{
    api::objects::Pagination,
    db_types::{Account, AccountStatus, NewAccount},
    traits::{AccountApiError, LedgerError},
};

pub async fn insert_account(account: NewAccount, conn: &mut SqliteConnection) -> Result<Account, LedgerError> {
    let result = sqlx::query_as(
        r#"INSERT INTO accounts (handle, msisdn, balance, status) VALUES ($1, $2, 0, 'Active') RETURNING *"#,
    )
    .bind(&account.handle)
    .bind(&account.msisdn)
    .fetch_one(conn)
    .await;
    result.map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => {
            LedgerError::AccountAlreadyExists(format!("{} / {}", account.handle, account.msisdn))
        },
        e => e.into(),
    })
}

pub async fn account_by_id(account_id: i64, conn: &mut SqliteConnection) -> Result<Option<Account>, AccountApiError> {
    let account =
        sqlx::query_as("SELECT * FROM accounts WHERE id = $1").bind(account_id).fetch_optional(conn).await?;
    Ok(account)
}

pub async fn account_by_msisdn(msisdn: &str, conn: &mut SqliteConnection) -> Result<Option<Account>, AccountApiError> {
    let account =
        sqlx::query_as("SELECT * FROM accounts WHERE msisdn = $1").bind(msisdn).fetch_optional(conn).await?;
    Ok(account)
}

pub async fn set_status(
    account_id: i64,
    status: AccountStatus,
    conn: &mut SqliteConnection,
) -> Result<Account, LedgerError> {
    let account: Option<Account> = sqlx::query_as(
        "UPDATE accounts SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *",
    )
    .bind(status.to_string())
    .bind(account_id)
    .fetch_optional(conn)
    .await?;
    account.ok_or(LedgerError::AccountNotFound(account_id))
}

/// Credits the account unconditionally. Only ledger settlement paths call this, and always inside the transaction
/// that flips the corresponding status.
pub async fn credit_account(account_id: i64, amount: Money, conn: &mut SqliteConnection) -> Result<Account, LedgerError> {
    let account: Option<Account> = sqlx::query_as(
        "UPDATE accounts SET balance = balance + $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *",
    )
    .bind(amount)
    .bind(account_id)
    .fetch_optional(conn)
    .await?;
    account.ok_or(LedgerError::AccountNotFound(account_id))
}

/// The reservation step of the purchase flow: debits the account only if the balance covers the amount. The
/// condition lives in the UPDATE itself, so two concurrent purchases cannot both spend the same shilling.
pub async fn debit_if_covered(
    account_id: i64,
    amount: Money,
    conn: &mut SqliteConnection,
) -> Result<Account, LedgerError> {
    let account: Option<Account> = sqlx::query_as(
        r#"UPDATE accounts
           SET balance = balance - $1, updated_at = CURRENT_TIMESTAMP
           WHERE id = $2 AND balance >= $1
           RETURNING *"#,
    )
    .bind(amount)
    .bind(account_id)
    .fetch_optional(&mut *conn)
    .await?;
    match account {
        Some(account) => {
            trace!("🗃️ Reserved {amount} from account #{account_id}. New balance: {}", account.balance);
            Ok(account)
        },
        None => {
            let current = account_by_id(account_id, conn).await?.ok_or(LedgerError::AccountNotFound(account_id))?;
            Err(LedgerError::InsufficientFunds { shortfall: amount - current.balance })
        },
    }
}

pub async fn fetch_accounts(pagination: Pagination, conn: &mut SqliteConnection) -> Result<Vec<Account>, AccountApiError> {
    let accounts = sqlx::query_as("SELECT * FROM accounts ORDER BY id ASC LIMIT $1 OFFSET $2")
        .bind(pagination.limit)
        .bind(pagination.offset)
        .fetch_all(conn)
        .await?;
    Ok(accounts)
}
