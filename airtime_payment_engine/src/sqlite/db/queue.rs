use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewQueuedPurchase, QueuedPurchase},
    traits::{AccountApiError, LedgerError},
};

pub async fn insert(purchase: NewQueuedPurchase, conn: &mut SqliteConnection) -> Result<QueuedPurchase, LedgerError> {
    let purchase: QueuedPurchase = sqlx::query_as(
        r#"INSERT INTO queued_purchases (account_id, msisdn, amount, status) VALUES ($1, $2, $3, 'Pending')
           RETURNING *"#,
    )
    .bind(purchase.account_id)
    .bind(&purchase.msisdn)
    .bind(purchase.amount)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Queued purchase #{} saved for account #{}", purchase.id, purchase.account_id);
    Ok(purchase)
}

/// The oldest pending entry for the account. Queue settlement is strictly FIFO. Entries linked to an in-flight
/// transaction are skipped so a slow provider confirmation cannot trigger a second dispatch.
pub async fn next_pending(account_id: i64, conn: &mut SqliteConnection) -> Result<Option<QueuedPurchase>, LedgerError> {
    let purchase = sqlx::query_as(
        r#"SELECT * FROM queued_purchases
           WHERE account_id = $1 AND status = 'Pending' AND transaction_id IS NULL
           ORDER BY id ASC LIMIT 1"#,
    )
    .bind(account_id)
    .fetch_optional(conn)
    .await?;
    Ok(purchase)
}

/// Records the in-flight purchase transaction against a pending entry. The entry stays pending until the provider
/// confirms or fails the purchase.
pub async fn link(
    queue_id: i64,
    transaction_id: i64,
    conn: &mut SqliteConnection,
) -> Result<QueuedPurchase, LedgerError> {
    let purchase: Option<QueuedPurchase> = sqlx::query_as(
        r#"UPDATE queued_purchases
           SET transaction_id = $1, updated_at = CURRENT_TIMESTAMP
           WHERE id = $2 AND status = 'Pending'
           RETURNING *"#,
    )
    .bind(transaction_id)
    .bind(queue_id)
    .fetch_optional(conn)
    .await?;
    purchase.ok_or_else(|| LedgerError::ConflictingState(format!("Queued purchase #{queue_id} is not pending")))
}

/// Completes the entry linked to the transaction, if there is one.
pub async fn complete_linked(
    transaction_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<QueuedPurchase>, LedgerError> {
    let purchase = sqlx::query_as(
        r#"UPDATE queued_purchases
           SET status = 'Completed', updated_at = CURRENT_TIMESTAMP
           WHERE transaction_id = $1 AND status = 'Pending'
           RETURNING *"#,
    )
    .bind(transaction_id)
    .fetch_optional(conn)
    .await?;
    Ok(purchase)
}

/// Unlinks the entry whose purchase failed, returning it to the pool for the next credit.
pub async fn release_linked(
    transaction_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<QueuedPurchase>, LedgerError> {
    let purchase = sqlx::query_as(
        r#"UPDATE queued_purchases
           SET transaction_id = NULL, updated_at = CURRENT_TIMESTAMP
           WHERE transaction_id = $1 AND status = 'Pending'
           RETURNING *"#,
    )
    .bind(transaction_id)
    .fetch_optional(conn)
    .await?;
    Ok(purchase)
}

pub async fn complete(
    queue_id: i64,
    transaction_id: i64,
    conn: &mut SqliteConnection,
) -> Result<QueuedPurchase, LedgerError> {
    let purchase: Option<QueuedPurchase> = sqlx::query_as(
        r#"UPDATE queued_purchases
           SET status = 'Completed', transaction_id = $1, updated_at = CURRENT_TIMESTAMP
           WHERE id = $2 AND status = 'Pending'
           RETURNING *"#,
    )
    .bind(transaction_id)
    .bind(queue_id)
    .fetch_optional(conn)
    .await?;
    purchase.ok_or_else(|| LedgerError::ConflictingState(format!("Queued purchase #{queue_id} is not pending")))
}

pub async fn fetch_for_account(
    account_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<QueuedPurchase>, AccountApiError> {
    let purchases = sqlx::query_as("SELECT * FROM queued_purchases WHERE account_id = $1 ORDER BY id ASC")
        .bind(account_id)
        .fetch_all(conn)
        .await?;
    Ok(purchases)
}
