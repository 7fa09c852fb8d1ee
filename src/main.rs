use std::net::SocketAddr;
use std::time::Duration;

use axum::middleware::{from_fn, from_fn_with_state};
use axum::{Extension, Router};
use dotenvy::dotenv;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;
use utoipa_swagger_ui::SwaggerUi;

mod api;
mod config;
mod db;
mod middleware;
mod utils;
mod workflow;

use crate::api::dashboard::DashboardDoc;
use crate::api::outpass::OutpassDoc;
use crate::config::Config;
use crate::middleware::auth::{access_middleware, create_access_cache, jwt_middleware};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    Config::init();
    let config = Config::get();

    std::fs::create_dir_all(&config.log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&config.log_dir, "outpass-backend.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(true)
        .with_writer(non_blocking.and(std::io::stdout))
        .init();

    let access_cache = create_access_cache();
    let pool = db::pool::get_db_pool().await?;
    sqlx::migrate!().run(&pool).await?;

    let merged_doc = OutpassDoc::openapi().merge_from(DashboardDoc::openapi());

    let public_routes = Router::new().merge(api::health::health_routes());

    let private_routes = Router::new()
        .merge(api::outpass::outpass_routes())
        .merge(api::dashboard::dashboard_routes())
        .route_layer(from_fn_with_state(pool.clone(), access_middleware))
        .route_layer(from_fn(jwt_middleware));

    let app = Router::new()
        .merge(public_routes)
        .merge(private_routes)
        .merge(SwaggerUi::new("/swagger").url("/api-docs/openapi.json", merged_doc.clone()))
        .merge(RapiDoc::with_openapi("/api-docs/rapidoc.json", merged_doc).path("/rapidoc"))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(RequestBodyLimitLayer::new(1024 * 1024))
        .layer(CompressionLayer::new())
        .layer(Extension(access_cache))
        .with_state(pool.clone());

    let addr: SocketAddr = config.bind_addr.parse()?;
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server running at http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(pool))
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal(pool: PgPool) {
    if let Err(e) = signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {e}");
        return;
    }
    tracing::info!("Received Ctrl+C, closing database pool...");
    pool.close().await;
    tracing::info!("Database pool closed, server shutting down");
}
