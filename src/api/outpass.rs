// src/api/outpass.rs
use axum::{
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use utoipa::OpenApi;

use crate::db::models::approval::{Approval, ApprovalStatus};
use crate::db::models::outpass::{
    CheckoutPayload, FeePendingPayload, MeetingPayload, NewOutpass, Outpass, OutpassStatus,
    ProcessCodePayload, RejectPayload, ScanDirection, ScanOutcome, SweepOutcome, VacatePayload,
};
use crate::db::models::user::Role;
use crate::db::queries::approval::{self, list_approvals};
use crate::db::queries::outpass::*;

pub fn outpass_routes() -> Router<PgPool> {
    Router::new()
        .route("/outpasses", post(create_outpass).get(list_outpasses))
        .route("/outpasses/{outpass_id}", get(get_outpass))
        .route("/outpasses/{outpass_id}/approvals", get(list_approvals))
        .route("/outpasses/{outpass_id}/cancel", post(cancel_outpass))
        .route(
            "/outpasses/{outpass_id}/accountant/fee-pending",
            post(mark_fee_pending),
        )
        .route(
            "/outpasses/{outpass_id}/accountant/approve",
            post(mark_fee_paid),
        )
        .route("/outpasses/{outpass_id}/hm/approve", post(hm_approve))
        .route("/outpasses/{outpass_id}/hm/reject", post(hm_reject))
        .route("/outpasses/{outpass_id}/hm/meeting", post(schedule_meeting))
        .route(
            "/outpasses/{outpass_id}/hm/cancel-meeting",
            post(cancel_meeting),
        )
        .route("/outpasses/{outpass_id}/warden/vacate", post(warden_vacate))
        .route("/outpasses/{outpass_id}/warden/reject", post(warden_reject))
        .route("/outpasses/{outpass_id}/gate/checkout", post(gate_checkout))
        .route("/outpasses/{outpass_id}/mark-returned", post(mark_returned))
        .route("/outpasses/gate/process-code", post(process_code))
        .route("/outpasses/sweep", post(sweep_lapsed))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        create_outpass,
        list_outpasses,
        get_outpass,
        approval::list_approvals,
        cancel_outpass,
        mark_fee_pending,
        mark_fee_paid,
        hm_approve,
        hm_reject,
        schedule_meeting,
        cancel_meeting,
        warden_vacate,
        warden_reject,
        gate_checkout,
        mark_returned,
        process_code,
        sweep_lapsed
    ),
    components(schemas(
        Outpass,
        OutpassStatus,
        NewOutpass,
        FeePendingPayload,
        MeetingPayload,
        RejectPayload,
        VacatePayload,
        CheckoutPayload,
        ProcessCodePayload,
        ScanDirection,
        ScanOutcome,
        SweepOutcome,
        Approval,
        ApprovalStatus,
        Role
    )),
    tags(
        (name = "Outpasses", description = "Outpass lifecycle and gate verification")
    )
)]
pub struct OutpassDoc;
