use apg_common::Money;
use log::trace;
use sqlx::{QueryBuilder, Row, SqliteConnection};

use crate::{
    api::objects::{LedgerStats, TransactionFilter},
    db_types::{NewTransaction, Transaction, TxReference},
    traits::{AccountApiError, LedgerError},
};

pub async fn insert_intent(transaction: NewTransaction, conn: &mut SqliteConnection) -> Result<Transaction, LedgerError> {
    let result = sqlx::query_as(
        r#"
            INSERT INTO transactions (
                account_id,
                kind,
                amount,
                provider,
                reference,
                msisdn,
                payload,
                status
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, 'Pending')
            RETURNING *
        "#,
    )
    .bind(transaction.account_id)
    .bind(transaction.kind.to_string())
    .bind(transaction.amount)
    .bind(&transaction.provider)
    .bind(transaction.reference.as_str())
    .bind(&transaction.msisdn)
    .bind(&transaction.payload)
    .fetch_one(conn)
    .await;
    result.map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => {
            LedgerError::ReferenceAlreadyExists(transaction.reference.clone())
        },
        e => e.into(),
    })
}

pub async fn attach_correlation_id(
    transaction_id: i64,
    correlation_id: &str,
    conn: &mut SqliteConnection,
) -> Result<(), LedgerError> {
    let rows = sqlx::query("UPDATE transactions SET correlation_id = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2")
        .bind(correlation_id)
        .bind(transaction_id)
        .execute(conn)
        .await?
        .rows_affected();
    if rows == 0 {
        return Err(LedgerError::TransactionNotFound(format!("#{transaction_id}")));
    }
    Ok(())
}

pub async fn transaction_by_id(
    transaction_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, AccountApiError> {
    let txn = sqlx::query_as("SELECT * FROM transactions WHERE id = $1")
        .bind(transaction_id)
        .fetch_optional(conn)
        .await?;
    Ok(txn)
}

pub async fn transaction_by_reference(
    reference: &TxReference,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, AccountApiError> {
    let txn = sqlx::query_as("SELECT * FROM transactions WHERE reference = $1")
        .bind(reference.as_str())
        .fetch_optional(conn)
        .await?;
    Ok(txn)
}

/// Callback correlation is an exact match against the reference or the provider-issued correlation id. No pattern
/// matching, ever.
pub async fn transaction_for_callback(
    key: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, LedgerError> {
    let txn = sqlx::query_as("SELECT * FROM transactions WHERE reference = $1 OR correlation_id = $1 LIMIT 1")
        .bind(key)
        .fetch_optional(conn)
        .await?;
    Ok(txn)
}

/// Flips a pending transaction to `Success`, recording the bonus/fee split and the provider receipt. The status
/// guard is in the UPDATE: a row that is already terminal does not match, and the caller gets `ConflictingState`.
pub async fn mark_success(
    transaction_id: i64,
    bonus: Money,
    fee: Money,
    receipt_code: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Transaction, LedgerError> {
    let txn: Option<Transaction> = sqlx::query_as(
        r#"UPDATE transactions
           SET status = 'Success', bonus = $1, fee = $2, receipt_code = COALESCE($3, receipt_code),
               updated_at = CURRENT_TIMESTAMP
           WHERE id = $4 AND status = 'Pending'
           RETURNING *"#,
    )
    .bind(bonus)
    .bind(fee)
    .bind(receipt_code)
    .bind(transaction_id)
    .fetch_optional(&mut *conn)
    .await?;
    match txn {
        Some(txn) => Ok(txn),
        None => Err(conflicting_or_missing(transaction_id, conn).await),
    }
}

/// Flips a pending transaction to `Failed`, storing the reason in the payload. Guarded the same way as
/// [`mark_success`].
pub async fn mark_failed(
    transaction_id: i64,
    reason: &str,
    conn: &mut SqliteConnection,
) -> Result<Transaction, LedgerError> {
    // json_set preserves whatever the intent already stored in the payload (e.g. the payer of a direct purchase).
    let txn: Option<Transaction> = sqlx::query_as(
        r#"UPDATE transactions
           SET status = 'Failed', payload = json_set(COALESCE(payload, '{}'), '$.failure_reason', $1),
               updated_at = CURRENT_TIMESTAMP
           WHERE id = $2 AND status = 'Pending'
           RETURNING *"#,
    )
    .bind(reason)
    .bind(transaction_id)
    .fetch_optional(&mut *conn)
    .await?;
    match txn {
        Some(txn) => Ok(txn),
        None => Err(conflicting_or_missing(transaction_id, conn).await),
    }
}

/// Distinguishes "the row is terminal" from "the row does not exist" after a guarded update matched nothing.
async fn conflicting_or_missing(transaction_id: i64, conn: &mut SqliteConnection) -> LedgerError {
    match transaction_by_id(transaction_id, conn).await {
        Ok(Some(txn)) => LedgerError::ConflictingState(format!("[{}] is already {}", txn.reference, txn.status)),
        Ok(None) => LedgerError::TransactionNotFound(format!("#{transaction_id}")),
        Err(e) => e.into(),
    }
}

/// Fetches transactions according to criteria specified in the `TransactionFilter`.
///
/// Resulting transactions are ordered by `created_at` in ascending order.
pub async fn search(filter: TransactionFilter, conn: &mut SqliteConnection) -> Result<Vec<Transaction>, AccountApiError> {
    let mut builder = QueryBuilder::new("SELECT * FROM transactions ");
    if !filter.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(account_id) = filter.account_id {
        where_clause.push("account_id = ");
        where_clause.push_bind_unseparated(account_id);
    }
    if let Some(kind) = filter.kind {
        where_clause.push("kind = ");
        where_clause.push_bind_unseparated(kind.to_string());
    }
    if let Some(status) = filter.status {
        where_clause.push("status = ");
        where_clause.push_bind_unseparated(status.to_string());
    }
    if let Some(provider) = filter.provider {
        where_clause.push("provider = ");
        where_clause.push_bind_unseparated(provider);
    }
    if let Some(since) = filter.since {
        where_clause.push("created_at >= ");
        where_clause.push_bind_unseparated(since);
    }
    if let Some(until) = filter.until {
        where_clause.push("created_at <= ");
        where_clause.push_bind_unseparated(until);
    }
    builder.push(" ORDER BY created_at ASC");
    trace!("🗃️ Executing query: {}", builder.sql());
    let transactions = builder.build_query_as::<Transaction>().fetch_all(conn).await?;
    Ok(transactions)
}

pub async fn stats(conn: &mut SqliteConnection) -> Result<LedgerStats, AccountApiError> {
    let row = sqlx::query(
        r#"SELECT
            (SELECT COUNT(*) FROM accounts) AS total_accounts,
            (SELECT COALESCE(SUM(balance), 0) FROM accounts) AS total_balance,
            (SELECT COUNT(*) FROM transactions WHERE kind = 'Deposit' AND status = 'Success') AS deposits_settled,
            (SELECT COALESCE(SUM(amount), 0) FROM transactions WHERE kind = 'Deposit' AND status = 'Success')
                AS total_deposited,
            (SELECT COUNT(*) FROM transactions
                WHERE kind IN ('AirtimePurchase', 'DirectPurchase') AND status = 'Success') AS airtime_sold,
            (SELECT COALESCE(SUM(amount), 0) FROM transactions
                WHERE kind IN ('AirtimePurchase', 'DirectPurchase') AND status = 'Success') AS total_airtime,
            (SELECT COUNT(*) FROM transactions WHERE status = 'Pending') AS pending_transactions,
            (SELECT COUNT(*) FROM transactions WHERE status = 'Failed') AS failed_transactions,
            (SELECT COUNT(*) FROM queued_purchases WHERE status = 'Pending') AS queued_purchases
        "#,
    )
    .fetch_one(conn)
    .await?;
    Ok(LedgerStats {
        total_accounts: row.try_get("total_accounts")?,
        total_balance: Money::from_cents(row.try_get("total_balance")?),
        deposits_settled: row.try_get("deposits_settled")?,
        total_deposited: Money::from_cents(row.try_get("total_deposited")?),
        airtime_sold: row.try_get("airtime_sold")?,
        total_airtime: Money::from_cents(row.try_get("total_airtime")?),
        pending_transactions: row.try_get("pending_transactions")?,
        failed_transactions: row.try_get("failed_transactions")?,
        queued_purchases: row.try_get("queued_purchases")?,
    })
}
