use log::debug;
use sqlx::{Row, SqliteConnection};

use crate::{
    db_types::{VerificationRequest, VerificationStatus},
    traits::{AccountApiError, LedgerError},
};

pub async fn insert(
    transaction_id: i64,
    receipt_code: &str,
    conn: &mut SqliteConnection,
) -> Result<VerificationRequest, LedgerError> {
    let result = sqlx::query_as(
        r#"INSERT INTO verification_requests (transaction_id, receipt_code, status) VALUES ($1, $2, 'Pending')
           RETURNING *"#,
    )
    .bind(transaction_id)
    .bind(receipt_code)
    .fetch_one(conn)
    .await;
    result.map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => {
            LedgerError::DuplicateReceipt(receipt_code.to_string())
        },
        e => e.into(),
    })
}

pub async fn by_id(id: i64, conn: &mut SqliteConnection) -> Result<Option<VerificationRequest>, LedgerError> {
    let request =
        sqlx::query_as("SELECT * FROM verification_requests WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(request)
}

pub async fn fetch_pending(conn: &mut SqliteConnection) -> Result<Vec<VerificationRequest>, AccountApiError> {
    let requests = sqlx::query_as("SELECT * FROM verification_requests WHERE status = 'Pending' ORDER BY id ASC")
        .fetch_all(conn)
        .await?;
    Ok(requests)
}

/// Resolves a pending request. The status guard makes approval single-shot: a second reviewer matches no row and
/// gets `ConflictingState` instead of a second credit.
pub async fn resolve(
    id: i64,
    status: VerificationStatus,
    reviewed_by: &str,
    conn: &mut SqliteConnection,
) -> Result<VerificationRequest, LedgerError> {
    let request: Option<VerificationRequest> = sqlx::query_as(
        r#"UPDATE verification_requests
           SET status = $1, reviewed_by = $2, updated_at = CURRENT_TIMESTAMP
           WHERE id = $3 AND status = 'Pending'
           RETURNING *"#,
    )
    .bind(status.to_string())
    .bind(reviewed_by)
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    match request {
        Some(request) => {
            debug!("🧾️ Verification #{id} resolved as {status} by {reviewed_by}");
            Ok(request)
        },
        None => match by_id(id, conn).await? {
            Some(request) => {
                Err(LedgerError::ConflictingState(format!("Verification #{id} is already {}", request.status)))
            },
            None => Err(LedgerError::VerificationNotFound(id)),
        },
    }
}

/// Returns an approved request to `Pending` after its settlement failed, so the operator can retry. Rejections are
/// final and cannot be reopened.
pub async fn reopen(id: i64, conn: &mut SqliteConnection) -> Result<VerificationRequest, LedgerError> {
    let request: Option<VerificationRequest> = sqlx::query_as(
        r#"UPDATE verification_requests
           SET status = 'Pending', reviewed_by = NULL, updated_at = CURRENT_TIMESTAMP
           WHERE id = $1 AND status = 'Approved'
           RETURNING *"#,
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;
    request.ok_or_else(|| LedgerError::ConflictingState(format!("Verification #{id} is not approved")))
}

/// Whether the receipt code is claimed by any verification request or any settled transaction.
pub async fn receipt_code_in_use(receipt_code: &str, conn: &mut SqliteConnection) -> Result<bool, LedgerError> {
    let row = sqlx::query(
        r#"SELECT
            EXISTS (SELECT 1 FROM verification_requests WHERE receipt_code = $1)
            OR EXISTS (SELECT 1 FROM transactions WHERE receipt_code = $1) AS in_use"#,
    )
    .bind(receipt_code)
    .fetch_one(conn)
    .await?;
    let in_use: bool = row.try_get("in_use")?;
    Ok(in_use)
}
