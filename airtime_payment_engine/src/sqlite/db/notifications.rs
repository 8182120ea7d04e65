use sqlx::SqliteConnection;

use crate::{
    db_types::{NewNotification, Notification},
    traits::{AccountApiError, LedgerError},
};

pub async fn insert(notification: NewNotification, conn: &mut SqliteConnection) -> Result<Notification, LedgerError> {
    let notification = sqlx::query_as(
        r#"INSERT INTO notifications (account_id, title, message, severity) VALUES ($1, $2, $3, $4) RETURNING *"#,
    )
    .bind(notification.account_id)
    .bind(&notification.title)
    .bind(&notification.message)
    .bind(notification.severity.to_string())
    .fetch_one(conn)
    .await?;
    Ok(notification)
}

/// Notifications addressed to the account plus broadcasts (`account_id IS NULL`), newest first. Broadcasts carry a
/// per-reader read flag from `notification_reads`; the stored `is_read` column only applies to personal rows.
pub async fn fetch_for_account(
    account_id: i64,
    unread_only: bool,
    conn: &mut SqliteConnection,
) -> Result<Vec<Notification>, AccountApiError> {
    let sql = if unread_only {
        r#"SELECT n.id, n.account_id, n.title, n.message, n.severity,
                  CASE WHEN n.account_id IS NULL
                       THEN EXISTS (SELECT 1 FROM notification_reads r
                                    WHERE r.notification_id = n.id AND r.account_id = $1)
                       ELSE n.is_read END AS is_read,
                  n.created_at
           FROM notifications n
           WHERE (n.account_id = $1 AND n.is_read = FALSE)
              OR (n.account_id IS NULL AND NOT EXISTS (SELECT 1 FROM notification_reads r
                                                       WHERE r.notification_id = n.id AND r.account_id = $1))
           ORDER BY n.created_at DESC, n.id DESC"#
    } else {
        r#"SELECT n.id, n.account_id, n.title, n.message, n.severity,
                  CASE WHEN n.account_id IS NULL
                       THEN EXISTS (SELECT 1 FROM notification_reads r
                                    WHERE r.notification_id = n.id AND r.account_id = $1)
                       ELSE n.is_read END AS is_read,
                  n.created_at
           FROM notifications n
           WHERE n.account_id = $1 OR n.account_id IS NULL
           ORDER BY n.created_at DESC, n.id DESC"#
    };
    let notifications = sqlx::query_as(sql).bind(account_id).fetch_all(conn).await?;
    Ok(notifications)
}

/// Marks a notification read. Personal rows flip their own flag, scoped to the owner; broadcasts record the reader
/// in `notification_reads` so one account cannot hide a broadcast from the rest. Idempotent.
pub async fn mark_read(notification_id: i64, account_id: i64, conn: &mut SqliteConnection) -> Result<(), LedgerError> {
    let rows = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE id = $1 AND account_id = $2")
        .bind(notification_id)
        .bind(account_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();
    if rows > 0 {
        return Ok(());
    }
    let rows = sqlx::query(
        r#"INSERT OR IGNORE INTO notification_reads (notification_id, account_id)
           SELECT id, $2 FROM notifications WHERE id = $1 AND account_id IS NULL"#,
    )
    .bind(notification_id)
    .bind(account_id)
    .execute(&mut *conn)
    .await?
    .rows_affected();
    if rows > 0 {
        return Ok(());
    }
    // Nothing matched: either an already-read broadcast (fine) or a row that is not this account's to mark.
    let broadcast: Option<(i64,)> =
        sqlx::query_as("SELECT id FROM notifications WHERE id = $1 AND account_id IS NULL")
            .bind(notification_id)
            .fetch_optional(conn)
            .await?;
    match broadcast {
        Some(_) => Ok(()),
        None => Err(LedgerError::ValidationError(format!("Notification #{notification_id} does not exist"))),
    }
}
