// src/db/pool.rs
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;

use crate::config::Config;

pub async fn get_db_pool() -> Result<Pool<Postgres>, sqlx::Error> {
    let config = Config::get();
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .idle_timeout(Duration::from_secs(30))
        .connect(&config.database_url)
        .await
}
