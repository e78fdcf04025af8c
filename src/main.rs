// src/main.rs
mod auth;
mod config;
mod db;
mod error;
mod handlers;
mod migrations;
mod models;
mod poll;
mod results;
mod routes;
mod slug;
mod state;
mod vote;

use std::net::SocketAddr;

use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use config::Config;
use state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = Config::load();

    let pool = db::create_pool(&config)
        .await
        .expect("Failed to connect to the database");

    // Migration failure is fatal: never serve traffic against a schema we
    // cannot guarantee.
    migrations::run(&pool).await.expect("Schema migrations failed");

    auth::ensure_default_admin(&pool, &config)
        .await
        .expect("Failed to bootstrap the admin user");

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let app = routes::create_routes(AppState::new(pool, config));

    info!("listening on {addr}");
    axum_server::bind(addr)
        .serve(app.into_make_service())
        .await
        .expect("Server error");
}
