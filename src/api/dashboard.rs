// src/api/dashboard.rs
use axum::{routing::get, Router};
use sqlx::PgPool;
use utoipa::OpenApi;

use crate::db::queries::dashboard::{
    get_stats, list_dashboard_outpasses, DashboardOutpass, OutpassStats, TrendPoint,
};

pub fn dashboard_routes() -> Router<PgPool> {
    Router::new()
        .route("/dashboard/outpasses", get(list_dashboard_outpasses))
        .route("/dashboard/stats", get(get_stats))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::db::queries::dashboard::list_dashboard_outpasses,
        crate::db::queries::dashboard::get_stats
    ),
    components(schemas(DashboardOutpass, OutpassStats, TrendPoint)),
    tags(
        (name = "Dashboard", description = "Role-scoped read views and counters")
    )
)]
pub struct DashboardDoc;
