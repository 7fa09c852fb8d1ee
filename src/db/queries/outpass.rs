// src/db/queries/outpass.rs
//
// Lifecycle handlers. Every transition runs inside one transaction that
// re-reads the outpass row FOR UPDATE before validating the source state, so
// check-then-act is atomic and concurrent operations on the same request
// serialize. Code minting additionally holds a per-phase advisory lock while
// it checks the live-code set.
use std::collections::HashSet;

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use bigdecimal::BigDecimal;
use serde_json::{json, Value};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::db::models::approval::ApprovalStatus;
use crate::db::models::outpass::{
    CheckoutPayload, FeePendingPayload, MeetingPayload, NewOutpass, Outpass, OutpassStatus,
    ProcessCodePayload, RejectPayload, ScanDirection, ScanOutcome, SweepOutcome, VacatePayload,
};
use crate::db::models::user::{Role, UserAccess};
use crate::db::queries::approval::record_approval;
use crate::db::queries::student::{parent_owns_student, resolve_guardian, resolve_student};
use crate::utils::api_response::ApiResponse;
use crate::workflow::codes::{mint_code, CodePoolExhausted};
use crate::workflow::{authorize, next_status, Action, OutpassError};

// Advisory lock keys serializing code minting per phase.
const EXIT_CODE_LOCK_KEY: i64 = 0x6f75_7470_6173_7331;
const RETURN_CODE_LOCK_KEY: i64 = 0x6f75_7470_6173_7332;

async fn lock_outpass(
    tx: &mut Transaction<'_, Postgres>,
    outpass_id: Uuid,
) -> Result<Outpass, OutpassError> {
    sqlx::query_as::<_, Outpass>("SELECT * FROM outpasses WHERE id = $1 FOR UPDATE")
        .bind(outpass_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(OutpassError::NotFound)
}

async fn set_status(
    tx: &mut Transaction<'_, Postgres>,
    outpass_id: Uuid,
    status: OutpassStatus,
) -> Result<(), OutpassError> {
    sqlx::query("UPDATE outpasses SET status = $1 WHERE id = $2")
        .bind(status)
        .bind(outpass_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

fn draw_code(live: &HashSet<String>) -> Result<String, CodePoolExhausted> {
    let mut rng = rand::thread_rng();
    mint_code(&mut rng, live)
}

/// Collects every code currently live in the given status. Call with the
/// matching advisory lock held.
async fn live_codes(
    tx: &mut Transaction<'_, Postgres>,
    column: &str,
    status: OutpassStatus,
) -> Result<HashSet<String>, OutpassError> {
    let sql = format!("SELECT {column} FROM outpasses WHERE status = $1 AND {column} <> ''");
    let codes: Vec<String> = sqlx::query_scalar(&sql)
        .bind(status)
        .fetch_all(&mut **tx)
        .await?;
    Ok(codes.into_iter().collect())
}

async fn take_code_lock(
    tx: &mut Transaction<'_, Postgres>,
    key: i64,
) -> Result<(), OutpassError> {
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(key)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

fn exhausted(e: CodePoolExhausted) -> ApiResponse<()> {
    ApiResponse::error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string(), None)
}

#[utoipa::path(
    post,
    path = "/outpasses",
    request_body = NewOutpass,
    responses(
        (status = 201, description = "Outpass request created", body = Outpass),
        (status = 409, description = "Student already has an active outpass request"),
        (status = 422, description = "Validation failed")
    ),
    tag = "Outpasses",
    security(("bearerAuth" = []))
)]
pub async fn create_outpass(
    State(pool): State<PgPool>,
    Extension(access): Extension<UserAccess>,
    Json(payload): Json<NewOutpass>,
) -> Result<ApiResponse<Outpass>, ApiResponse<()>> {
    authorize(access.role, Action::Create)?;

    let mut field_errors = serde_json::Map::new();
    if payload.reason.trim().is_empty() {
        field_errors.insert("reason".into(), json!("This field is required"));
    }
    if (payload.expected_return_date, payload.expected_return_time)
        < (payload.outgoing_date, payload.outgoing_time)
    {
        field_errors.insert(
            "expected_return_date".into(),
            json!("Expected return must not precede the outgoing time"),
        );
    }
    if !field_errors.is_empty() {
        return Err(OutpassError::Validation(Value::Object(field_errors)).into());
    }

    let mut tx = pool.begin().await.map_err(OutpassError::Database)?;

    // Locking the student row serializes concurrent creates for the same
    // student, making the active-request check race-free.
    let student_exists: Option<Uuid> =
        sqlx::query_scalar("SELECT id FROM students WHERE id = $1 FOR UPDATE")
            .bind(payload.student_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(OutpassError::Database)?;
    if student_exists.is_none() {
        return Err(OutpassError::Validation(json!({ "student_id": "Unknown student" })).into());
    }

    if !parent_owns_student(&mut *tx, payload.student_id, access.user_id)
        .await
        .map_err(OutpassError::Database)?
    {
        return Err(OutpassError::Validation(
            json!({ "student_id": "You can only request outpasses for your own registered children" }),
        )
        .into());
    }

    if let Some(guardian_id) = payload.guardian_id {
        let guardian = resolve_guardian(&mut *tx, guardian_id)
            .await
            .map_err(OutpassError::Database)?;
        if guardian.map(|g| g.student_id) != Some(payload.student_id) {
            return Err(OutpassError::Validation(
                json!({ "guardian_id": "Guardian is not registered for this student" }),
            )
            .into());
        }
    }

    let has_active: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM outpasses
            WHERE student_id = $1
              AND status NOT IN ('COMPLETED', 'REJECTED', 'CANCELLED', 'EXPIRED')
        )
        "#,
    )
    .bind(payload.student_id)
    .fetch_one(&mut *tx)
    .await
    .map_err(OutpassError::Database)?;
    if has_active {
        return Err(OutpassError::ActiveRequestExists.into());
    }

    let outpass = sqlx::query_as::<_, Outpass>(
        r#"
        INSERT INTO outpasses (
            student_id, parent_id, guardian_id,
            pickup_person_name, pickup_person_phone, pickup_person_relation,
            outgoing_date, outgoing_time, expected_return_date, expected_return_time,
            reason, destination, mode_of_travel,
            is_priority, priority_reason, priority_level
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
        RETURNING *
        "#,
    )
    .bind(payload.student_id)
    .bind(access.user_id)
    .bind(payload.guardian_id)
    .bind(&payload.pickup_person_name)
    .bind(&payload.pickup_person_phone)
    .bind(&payload.pickup_person_relation)
    .bind(payload.outgoing_date)
    .bind(payload.outgoing_time)
    .bind(payload.expected_return_date)
    .bind(payload.expected_return_time)
    .bind(&payload.reason)
    .bind(&payload.destination)
    .bind(&payload.mode_of_travel)
    .bind(payload.is_priority)
    .bind(&payload.priority_reason)
    .bind(payload.priority_level)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        // The partial unique index backs up the check above.
        if e.as_database_error()
            .and_then(|d| d.constraint())
            .is_some_and(|c| c == "one_active_outpass_per_student")
        {
            OutpassError::ActiveRequestExists
        } else {
            OutpassError::Database(e)
        }
    })?;

    tx.commit().await.map_err(OutpassError::Database)?;

    tracing::info!(outpass_id = %outpass.id, student_id = %outpass.student_id, "outpass created");
    Ok(ApiResponse::created("Outpass request created", outpass))
}

#[utoipa::path(
    get,
    path = "/outpasses",
    responses(
        (status = 200, description = "Outpasses visible to the caller", body = Vec<Outpass>)
    ),
    tag = "Outpasses",
    security(("bearerAuth" = []))
)]
pub async fn list_outpasses(
    State(pool): State<PgPool>,
    Extension(access): Extension<UserAccess>,
) -> Result<ApiResponse<Vec<Outpass>>, ApiResponse<()>> {
    let outpasses = if access.role == Role::Parent {
        sqlx::query_as::<_, Outpass>(
            r#"
            SELECT o.* FROM outpasses o
            JOIN student_parents sp ON sp.student_id = o.student_id
            WHERE sp.parent_id = $1
            ORDER BY o.created_at DESC
            "#,
        )
        .bind(access.user_id)
        .fetch_all(&pool)
        .await
    } else {
        sqlx::query_as::<_, Outpass>("SELECT * FROM outpasses ORDER BY created_at DESC")
            .fetch_all(&pool)
            .await
    }
    .map_err(OutpassError::Database)?;

    Ok(ApiResponse::ok("Outpasses", outpasses))
}

#[utoipa::path(
    get,
    path = "/outpasses/{outpass_id}",
    params(("outpass_id" = Uuid, Path, description = "Outpass ID")),
    responses(
        (status = 200, description = "Outpass retrieved", body = Outpass),
        (status = 404, description = "Outpass not found")
    ),
    tag = "Outpasses",
    security(("bearerAuth" = []))
)]
pub async fn get_outpass(
    State(pool): State<PgPool>,
    Extension(access): Extension<UserAccess>,
    Path(outpass_id): Path<Uuid>,
) -> Result<ApiResponse<Outpass>, ApiResponse<()>> {
    let outpass = sqlx::query_as::<_, Outpass>("SELECT * FROM outpasses WHERE id = $1")
        .bind(outpass_id)
        .fetch_optional(&pool)
        .await
        .map_err(OutpassError::Database)?
        .ok_or(OutpassError::NotFound)?;

    // Parents only ever see their own requests.
    if access.role == Role::Parent && outpass.parent_id != access.user_id {
        return Err(OutpassError::NotFound.into());
    }

    Ok(ApiResponse::ok("Outpass retrieved", outpass))
}

#[utoipa::path(
    post,
    path = "/outpasses/{outpass_id}/cancel",
    params(("outpass_id" = Uuid, Path, description = "Outpass ID")),
    responses(
        (status = 200, description = "Outpass cancelled", body = Outpass),
        (status = 409, description = "Outpass is not in a cancellable status")
    ),
    tag = "Outpasses",
    security(("bearerAuth" = []))
)]
pub async fn cancel_outpass(
    State(pool): State<PgPool>,
    Extension(access): Extension<UserAccess>,
    Path(outpass_id): Path<Uuid>,
) -> Result<ApiResponse<Outpass>, ApiResponse<()>> {
    authorize(access.role, Action::Cancel)?;

    let mut tx = pool.begin().await.map_err(OutpassError::Database)?;
    let outpass = lock_outpass(&mut tx, outpass_id).await?;

    if outpass.parent_id != access.user_id {
        return Err(ApiResponse::error(
            StatusCode::FORBIDDEN,
            "You can only cancel your own outpass requests",
            None,
        ));
    }

    let target = next_status(Action::Cancel, outpass.status)?;
    set_status(&mut tx, outpass_id, target).await?;
    tx.commit().await.map_err(OutpassError::Database)?;

    tracing::info!(%outpass_id, from = %outpass.status, to = %target, "outpass cancelled");
    Ok(ApiResponse::ok(
        "Outpass cancelled",
        Outpass {
            status: target,
            ..outpass
        },
    ))
}

#[utoipa::path(
    post,
    path = "/outpasses/{outpass_id}/accountant/fee-pending",
    params(("outpass_id" = Uuid, Path, description = "Outpass ID")),
    request_body = FeePendingPayload,
    responses(
        (status = 200, description = "Outpass marked fee pending"),
        (status = 422, description = "Validation failed")
    ),
    tag = "Outpasses",
    security(("bearerAuth" = []))
)]
pub async fn mark_fee_pending(
    State(pool): State<PgPool>,
    Extension(access): Extension<UserAccess>,
    Path(outpass_id): Path<Uuid>,
    Json(payload): Json<FeePendingPayload>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    authorize(access.role, Action::MarkFeePending)?;

    if payload.amount <= BigDecimal::from(0) {
        return Err(OutpassError::Validation(
            json!({ "amount": "Fee amount must be greater than zero" }),
        )
        .into());
    }

    let mut tx = pool.begin().await.map_err(OutpassError::Database)?;
    let outpass = lock_outpass(&mut tx, outpass_id).await?;
    let target = next_status(Action::MarkFeePending, outpass.status)?;

    sqlx::query("UPDATE outpasses SET fee_due = $1, status = $2 WHERE id = $3")
        .bind(&payload.amount)
        .bind(target)
        .bind(outpass_id)
        .execute(&mut *tx)
        .await
        .map_err(OutpassError::Database)?;
    tx.commit().await.map_err(OutpassError::Database)?;

    tracing::info!(%outpass_id, from = %outpass.status, to = %target, "outpass marked fee pending");
    Ok(ApiResponse::ok("Marked as fee pending", ()))
}

#[utoipa::path(
    post,
    path = "/outpasses/{outpass_id}/accountant/approve",
    params(("outpass_id" = Uuid, Path, description = "Outpass ID")),
    responses(
        (status = 200, description = "Fee marked paid")
    ),
    tag = "Outpasses",
    security(("bearerAuth" = []))
)]
pub async fn mark_fee_paid(
    State(pool): State<PgPool>,
    Extension(access): Extension<UserAccess>,
    Path(outpass_id): Path<Uuid>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    authorize(access.role, Action::MarkFeePaid)?;

    let mut tx = pool.begin().await.map_err(OutpassError::Database)?;
    let outpass = lock_outpass(&mut tx, outpass_id).await?;
    let target = next_status(Action::MarkFeePaid, outpass.status)?;

    sqlx::query(
        "UPDATE outpasses SET fee_paid = TRUE, fee_paid_at = NOW(), status = $1 WHERE id = $2",
    )
    .bind(target)
    .bind(outpass_id)
    .execute(&mut *tx)
    .await
    .map_err(OutpassError::Database)?;

    record_approval(
        &mut *tx,
        outpass_id,
        Role::Accountant,
        access.user_id,
        ApprovalStatus::Approved,
        "",
        outpass.fee_due.as_ref(),
        None,
    )
    .await
    .map_err(OutpassError::Database)?;
    tx.commit().await.map_err(OutpassError::Database)?;

    tracing::info!(%outpass_id, from = %outpass.status, to = %target, "fee marked paid");
    Ok(ApiResponse::ok("Fee marked paid", ()))
}

#[utoipa::path(
    post,
    path = "/outpasses/{outpass_id}/hm/approve",
    params(("outpass_id" = Uuid, Path, description = "Outpass ID")),
    responses(
        (status = 200, description = "Outpass approved")
    ),
    tag = "Outpasses",
    security(("bearerAuth" = []))
)]
pub async fn hm_approve(
    State(pool): State<PgPool>,
    Extension(access): Extension<UserAccess>,
    Path(outpass_id): Path<Uuid>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    authorize(access.role, Action::Approve)?;

    let mut tx = pool.begin().await.map_err(OutpassError::Database)?;
    let outpass = lock_outpass(&mut tx, outpass_id).await?;
    let target = next_status(Action::Approve, outpass.status)?;

    set_status(&mut tx, outpass_id, target).await?;
    record_approval(
        &mut *tx,
        outpass_id,
        Role::Hm,
        access.user_id,
        ApprovalStatus::Approved,
        "",
        None,
        None,
    )
    .await
    .map_err(OutpassError::Database)?;
    tx.commit().await.map_err(OutpassError::Database)?;

    tracing::info!(%outpass_id, from = %outpass.status, to = %target, "outpass approved");
    Ok(ApiResponse::ok("Approved by HM", ()))
}

async fn reject_outpass(
    pool: &PgPool,
    access: &UserAccess,
    outpass_id: Uuid,
    reason: String,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    authorize(access.role, Action::Reject)?;

    let mut tx = pool.begin().await.map_err(OutpassError::Database)?;
    let outpass = lock_outpass(&mut tx, outpass_id).await?;
    let target = next_status(Action::Reject, outpass.status)?;

    set_status(&mut tx, outpass_id, target).await?;
    record_approval(
        &mut *tx,
        outpass_id,
        access.role,
        access.user_id,
        ApprovalStatus::Rejected,
        &reason,
        None,
        None,
    )
    .await
    .map_err(OutpassError::Database)?;
    tx.commit().await.map_err(OutpassError::Database)?;

    tracing::info!(%outpass_id, from = %outpass.status, to = %target, role = %access.role, "outpass rejected");
    Ok(ApiResponse::ok(format!("Rejected by {}", access.role), ()))
}

#[utoipa::path(
    post,
    path = "/outpasses/{outpass_id}/hm/reject",
    params(("outpass_id" = Uuid, Path, description = "Outpass ID")),
    request_body = RejectPayload,
    responses(
        (status = 200, description = "Outpass rejected")
    ),
    tag = "Outpasses",
    security(("bearerAuth" = []))
)]
pub async fn hm_reject(
    State(pool): State<PgPool>,
    Extension(access): Extension<UserAccess>,
    Path(outpass_id): Path<Uuid>,
    Json(payload): Json<RejectPayload>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    if access.role != Role::Hm {
        return Err(OutpassError::Unauthorized {
            role: access.role,
            action: Action::Reject,
        }
        .into());
    }
    let reason = payload
        .reason
        .unwrap_or_else(|| "No reason provided".to_string());
    reject_outpass(&pool, &access, outpass_id, reason).await
}

#[utoipa::path(
    post,
    path = "/outpasses/{outpass_id}/warden/reject",
    params(("outpass_id" = Uuid, Path, description = "Outpass ID")),
    request_body = RejectPayload,
    responses(
        (status = 200, description = "Outpass rejected")
    ),
    tag = "Outpasses",
    security(("bearerAuth" = []))
)]
pub async fn warden_reject(
    State(pool): State<PgPool>,
    Extension(access): Extension<UserAccess>,
    Path(outpass_id): Path<Uuid>,
    Json(payload): Json<RejectPayload>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    if access.role != Role::Warden {
        return Err(OutpassError::Unauthorized {
            role: access.role,
            action: Action::Reject,
        }
        .into());
    }
    let reason = payload
        .reason
        .unwrap_or_else(|| "Rejected by Warden".to_string());
    reject_outpass(&pool, &access, outpass_id, reason).await
}

#[utoipa::path(
    post,
    path = "/outpasses/{outpass_id}/hm/meeting",
    params(("outpass_id" = Uuid, Path, description = "Outpass ID")),
    request_body = MeetingPayload,
    responses(
        (status = 200, description = "Meeting scheduled"),
        (status = 422, description = "Validation failed")
    ),
    tag = "Outpasses",
    security(("bearerAuth" = []))
)]
pub async fn schedule_meeting(
    State(pool): State<PgPool>,
    Extension(access): Extension<UserAccess>,
    Path(outpass_id): Path<Uuid>,
    Json(payload): Json<MeetingPayload>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    authorize(access.role, Action::ScheduleMeeting)?;

    if payload.venue.trim().is_empty() {
        return Err(OutpassError::Validation(json!({ "venue": "This field is required" })).into());
    }

    let mut tx = pool.begin().await.map_err(OutpassError::Database)?;
    let outpass = lock_outpass(&mut tx, outpass_id).await?;
    let target = next_status(Action::ScheduleMeeting, outpass.status)?;

    sqlx::query(
        r#"
        UPDATE outpasses
        SET meeting_scheduled = TRUE, meeting_date = $1, meeting_venue = $2,
            meeting_notes = $3, status = $4
        WHERE id = $5
        "#,
    )
    .bind(payload.date)
    .bind(&payload.venue)
    .bind(&payload.reason)
    .bind(target)
    .bind(outpass_id)
    .execute(&mut *tx)
    .await
    .map_err(OutpassError::Database)?;
    tx.commit().await.map_err(OutpassError::Database)?;

    tracing::info!(%outpass_id, from = %outpass.status, to = %target, "meeting scheduled");
    Ok(ApiResponse::ok("Meeting scheduled", ()))
}

#[utoipa::path(
    post,
    path = "/outpasses/{outpass_id}/hm/cancel-meeting",
    params(("outpass_id" = Uuid, Path, description = "Outpass ID")),
    responses(
        (status = 200, description = "Meeting cancelled, outpass back to pending")
    ),
    tag = "Outpasses",
    security(("bearerAuth" = []))
)]
pub async fn cancel_meeting(
    State(pool): State<PgPool>,
    Extension(access): Extension<UserAccess>,
    Path(outpass_id): Path<Uuid>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    authorize(access.role, Action::CancelMeeting)?;

    let mut tx = pool.begin().await.map_err(OutpassError::Database)?;
    let outpass = lock_outpass(&mut tx, outpass_id).await?;
    let target = next_status(Action::CancelMeeting, outpass.status)?;

    sqlx::query(
        r#"
        UPDATE outpasses
        SET meeting_scheduled = FALSE, meeting_date = NULL, meeting_venue = '',
            meeting_notes = '', status = $1
        WHERE id = $2
        "#,
    )
    .bind(target)
    .bind(outpass_id)
    .execute(&mut *tx)
    .await
    .map_err(OutpassError::Database)?;
    tx.commit().await.map_err(OutpassError::Database)?;

    tracing::info!(%outpass_id, from = %outpass.status, to = %target, "meeting cancelled");
    Ok(ApiResponse::ok(
        "Meeting cancelled and outpass reverted to pending",
        (),
    ))
}

#[utoipa::path(
    post,
    path = "/outpasses/{outpass_id}/warden/vacate",
    params(("outpass_id" = Uuid, Path, description = "Outpass ID")),
    request_body = VacatePayload,
    responses(
        (status = 200, description = "Student released, exit code generated", body = Outpass),
        (status = 409, description = "Outpass must be approved by HM first")
    ),
    tag = "Outpasses",
    security(("bearerAuth" = []))
)]
pub async fn warden_vacate(
    State(pool): State<PgPool>,
    Extension(access): Extension<UserAccess>,
    Path(outpass_id): Path<Uuid>,
    Json(payload): Json<VacatePayload>,
) -> Result<ApiResponse<Outpass>, ApiResponse<()>> {
    authorize(access.role, Action::Vacate)?;

    let mut tx = pool.begin().await.map_err(OutpassError::Database)?;
    let outpass = lock_outpass(&mut tx, outpass_id).await?;
    let target = next_status(Action::Vacate, outpass.status)?;

    // The advisory lock keeps a second concurrent release from drawing the
    // same live code; the mint happens in the same transaction that assigns
    // it.
    take_code_lock(&mut tx, EXIT_CODE_LOCK_KEY).await?;
    let live = live_codes(&mut tx, "exit_code", OutpassStatus::ReadyForExit).await?;
    let exit_code = draw_code(&live).map_err(exhausted)?;

    let updated = sqlx::query_as::<_, Outpass>(
        r#"
        UPDATE outpasses
        SET status = $1, exit_code = $2,
            verification_photo = COALESCE($3, verification_photo)
        WHERE id = $4
        RETURNING *
        "#,
    )
    .bind(target)
    .bind(&exit_code)
    .bind(payload.verification_photo.as_deref())
    .bind(outpass_id)
    .fetch_one(&mut *tx)
    .await
    .map_err(OutpassError::Database)?;

    record_approval(
        &mut *tx,
        outpass_id,
        Role::Warden,
        access.user_id,
        ApprovalStatus::Approved,
        "",
        None,
        None,
    )
    .await
    .map_err(OutpassError::Database)?;
    tx.commit().await.map_err(OutpassError::Database)?;

    tracing::info!(%outpass_id, from = %outpass.status, to = %target, "student released for exit");
    Ok(ApiResponse::ok("Vacated and exit code generated", updated))
}

#[utoipa::path(
    post,
    path = "/outpasses/{outpass_id}/gate/checkout",
    params(("outpass_id" = Uuid, Path, description = "Outpass ID")),
    request_body = CheckoutPayload,
    responses(
        (status = 200, description = "Student checked out"),
        (status = 409, description = "Outpass not ready for exit")
    ),
    tag = "Outpasses",
    security(("bearerAuth" = []))
)]
pub async fn gate_checkout(
    State(pool): State<PgPool>,
    Extension(access): Extension<UserAccess>,
    Path(outpass_id): Path<Uuid>,
    Json(payload): Json<CheckoutPayload>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    authorize(access.role, Action::GateCheckout)?;

    let mut tx = pool.begin().await.map_err(OutpassError::Database)?;
    let outpass = lock_outpass(&mut tx, outpass_id).await?;
    let target = next_status(Action::GateCheckout, outpass.status)?;

    sqlx::query(
        r#"
        UPDATE outpasses
        SET status = $1, checkout_time = NOW(), checked_out_by = $2,
            gate_number = COALESCE($3, gate_number)
        WHERE id = $4
        "#,
    )
    .bind(target)
    .bind(access.user_id)
    .bind(payload.gate_number.as_deref())
    .bind(outpass_id)
    .execute(&mut *tx)
    .await
    .map_err(OutpassError::Database)?;
    tx.commit().await.map_err(OutpassError::Database)?;

    tracing::info!(%outpass_id, from = %outpass.status, to = %target, "student checked out");
    Ok(ApiResponse::ok("Checked out from campus", ()))
}

#[utoipa::path(
    post,
    path = "/outpasses/{outpass_id}/mark-returned",
    params(("outpass_id" = Uuid, Path, description = "Outpass ID")),
    responses(
        (status = 200, description = "Outpass closed as returned")
    ),
    tag = "Outpasses",
    security(("bearerAuth" = []))
)]
pub async fn mark_returned(
    State(pool): State<PgPool>,
    Extension(access): Extension<UserAccess>,
    Path(outpass_id): Path<Uuid>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    authorize(access.role, Action::MarkReturned)?;

    let mut tx = pool.begin().await.map_err(OutpassError::Database)?;
    let outpass = lock_outpass(&mut tx, outpass_id).await?;
    let target = next_status(Action::MarkReturned, outpass.status)?;

    sqlx::query("UPDATE outpasses SET status = $1, actual_return_date = NOW() WHERE id = $2")
        .bind(target)
        .bind(outpass_id)
        .execute(&mut *tx)
        .await
        .map_err(OutpassError::Database)?;
    tx.commit().await.map_err(OutpassError::Database)?;

    tracing::info!(%outpass_id, from = %outpass.status, to = %target, role = %access.role, "marked returned");
    Ok(ApiResponse::ok(
        format!("Marked as returned by {}", access.role),
        (),
    ))
}

#[utoipa::path(
    post,
    path = "/outpasses/gate/process-code",
    request_body = ProcessCodePayload,
    responses(
        (status = 200, description = "Code consumed", body = ScanOutcome),
        (status = 404, description = "Invalid code")
    ),
    tag = "Outpasses",
    security(("bearerAuth" = []))
)]
pub async fn process_code(
    State(pool): State<PgPool>,
    Extension(access): Extension<UserAccess>,
    Json(payload): Json<ProcessCodePayload>,
) -> Result<ApiResponse<ScanOutcome>, ApiResponse<()>> {
    authorize(access.role, Action::ProcessExitCode)?;

    let code = payload.code.trim();
    if code.is_empty() {
        return Err(OutpassError::Validation(json!({ "code": "This field is required" })).into());
    }

    let mut tx = pool.begin().await.map_err(OutpassError::Database)?;

    // Phase one: the code opens an exit. FOR UPDATE makes consumption
    // single-shot: a concurrent submission of the same code blocks here and
    // re-evaluates the predicate after this transaction commits, so it can
    // never see READY_FOR_EXIT again.
    let exiting = sqlx::query_as::<_, Outpass>(
        "SELECT * FROM outpasses WHERE exit_code = $1 AND status = 'READY_FOR_EXIT' FOR UPDATE",
    )
    .bind(code)
    .fetch_optional(&mut *tx)
    .await
    .map_err(OutpassError::Database)?;

    if let Some(outpass) = exiting {
        let target = next_status(Action::ProcessExitCode, outpass.status)?;

        take_code_lock(&mut tx, RETURN_CODE_LOCK_KEY).await?;
        let live = live_codes(&mut tx, "return_code", OutpassStatus::CheckedOut).await?;
        let return_code = draw_code(&live).map_err(exhausted)?;

        sqlx::query(
            r#"
            UPDATE outpasses
            SET status = $1, checkout_time = NOW(), checked_out_by = $2,
                gate_number = COALESCE($3, gate_number), return_code = $4
            WHERE id = $5
            "#,
        )
        .bind(target)
        .bind(access.user_id)
        .bind(payload.gate_number.as_deref())
        .bind(&return_code)
        .bind(outpass.id)
        .execute(&mut *tx)
        .await
        .map_err(OutpassError::Database)?;

        let student = resolve_student(&mut *tx, outpass.student_id)
            .await
            .map_err(OutpassError::Database)?
            .ok_or(OutpassError::NotFound)?;
        tx.commit().await.map_err(OutpassError::Database)?;

        tracing::info!(outpass_id = %outpass.id, "exit code consumed, student checked out");
        return Ok(ApiResponse::ok(
            "Student checked OUT",
            ScanOutcome {
                direction: ScanDirection::Exit,
                student: student.first_name,
                return_code: Some(return_code),
            },
        ));
    }

    // Phase two: the code closes a return.
    let returning = sqlx::query_as::<_, Outpass>(
        "SELECT * FROM outpasses WHERE return_code = $1 AND status = 'CHECKED_OUT' FOR UPDATE",
    )
    .bind(code)
    .fetch_optional(&mut *tx)
    .await
    .map_err(OutpassError::Database)?;

    if let Some(outpass) = returning {
        let target = next_status(Action::ProcessReturnCode, outpass.status)?;

        sqlx::query("UPDATE outpasses SET status = $1, actual_return_date = NOW() WHERE id = $2")
            .bind(target)
            .bind(outpass.id)
            .execute(&mut *tx)
            .await
            .map_err(OutpassError::Database)?;

        let student = resolve_student(&mut *tx, outpass.student_id)
            .await
            .map_err(OutpassError::Database)?
            .ok_or(OutpassError::NotFound)?;
        tx.commit().await.map_err(OutpassError::Database)?;

        tracing::info!(outpass_id = %outpass.id, "return code consumed, outpass completed");
        return Ok(ApiResponse::ok(
            "Student checked IN (returned)",
            ScanOutcome {
                direction: ScanDirection::Entry,
                student: student.first_name,
                return_code: None,
            },
        ));
    }

    Err(OutpassError::CodeNotFound.into())
}

#[utoipa::path(
    post,
    path = "/outpasses/sweep",
    responses(
        (status = 200, description = "Lapsed outpasses swept", body = SweepOutcome)
    ),
    tag = "Outpasses",
    security(("bearerAuth" = []))
)]
pub async fn sweep_lapsed(
    State(pool): State<PgPool>,
    Extension(access): Extension<UserAccess>,
) -> Result<ApiResponse<SweepOutcome>, ApiResponse<()>> {
    authorize(access.role, Action::Sweep)?;

    let mut tx = pool.begin().await.map_err(OutpassError::Database)?;

    let overdue = sqlx::query(
        r#"
        UPDATE outpasses SET status = 'OVERDUE'
        WHERE status = 'CHECKED_OUT'
          AND (expected_return_date < CURRENT_DATE
               OR (expected_return_date = CURRENT_DATE AND expected_return_time < CURRENT_TIME))
        "#,
    )
    .execute(&mut *tx)
    .await
    .map_err(OutpassError::Database)?
    .rows_affected();

    let expired = sqlx::query(
        r#"
        UPDATE outpasses SET status = 'EXPIRED'
        WHERE status IN ('PENDING', 'FEE_PENDING', 'MEETING')
          AND outgoing_date < CURRENT_DATE
        "#,
    )
    .execute(&mut *tx)
    .await
    .map_err(OutpassError::Database)?
    .rows_affected();

    tx.commit().await.map_err(OutpassError::Database)?;

    tracing::info!(overdue, expired, "lapsed outpasses swept");
    Ok(ApiResponse::ok(
        "Lapsed outpasses swept",
        SweepOutcome {
            marked_overdue: overdue,
            marked_expired: expired,
        },
    ))
}
