// src/db/queries/approval.rs
use axum::extract::{Extension, Path, State};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::db::models::approval::{Approval, ApprovalStatus};
use crate::db::models::user::{Role, UserAccess};
use crate::utils::api_response::ApiResponse;
use crate::workflow::OutpassError;

/// Upserts the ledger row for (outpass, role). Replaying the same call is
/// idempotent: the row count stays at one and the payload reflects the last
/// write.
#[allow(clippy::too_many_arguments)]
pub async fn record_approval<'e>(
    executor: impl PgExecutor<'e>,
    outpass_id: Uuid,
    approver_role: Role,
    approver_id: i32,
    status: ApprovalStatus,
    comments: &str,
    fee_amount: Option<&BigDecimal>,
    meeting_date: Option<DateTime<Utc>>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO approvals (outpass_id, approver_role, approver_id, status, comments, fee_amount, meeting_date)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (outpass_id, approver_role)
        DO UPDATE SET
            approver_id = EXCLUDED.approver_id,
            status = EXCLUDED.status,
            comments = EXCLUDED.comments,
            fee_amount = EXCLUDED.fee_amount,
            meeting_date = EXCLUDED.meeting_date
        "#,
    )
    .bind(outpass_id)
    .bind(approver_role)
    .bind(approver_id)
    .bind(status)
    .bind(comments)
    .bind(fee_amount)
    .bind(meeting_date)
    .execute(executor)
    .await?;
    Ok(())
}

#[utoipa::path(
    get,
    path = "/outpasses/{outpass_id}/approvals",
    params(
        ("outpass_id" = Uuid, Path, description = "Outpass ID")
    ),
    responses(
        (status = 200, description = "Approval ledger rows for the outpass", body = Vec<Approval>),
        (status = 404, description = "Outpass not found")
    ),
    tag = "Outpasses",
    security(("bearerAuth" = []))
)]
pub async fn list_approvals(
    State(pool): State<PgPool>,
    Extension(_access): Extension<UserAccess>,
    Path(outpass_id): Path<Uuid>,
) -> Result<ApiResponse<Vec<Approval>>, ApiResponse<()>> {
    let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM outpasses WHERE id = $1)")
        .bind(outpass_id)
        .fetch_one(&pool)
        .await
        .map_err(OutpassError::Database)?;
    if !exists {
        return Err(OutpassError::NotFound.into());
    }

    let approvals = sqlx::query_as::<_, Approval>(
        "SELECT * FROM approvals WHERE outpass_id = $1 ORDER BY approved_at",
    )
    .bind(outpass_id)
    .fetch_all(&pool)
    .await
    .map_err(OutpassError::Database)?;

    Ok(ApiResponse::ok("Approval ledger", approvals))
}
