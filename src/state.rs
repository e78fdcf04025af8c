// src/state.rs
use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;

/// Shared per-process state handed to every handler. The pool does its own
/// per-request connection checkout; nothing else is mutable across requests.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Self {
        Self {
            pool,
            config: Arc::new(config),
        }
    }
}
