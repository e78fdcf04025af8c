// src/config.rs
use std::{env, fmt::Display, str::FromStr};

use jsonwebtoken::Algorithm;
use tracing::{info, warn};

/// Runtime configuration, read from the environment exactly once at startup
/// and handed to the components that need it. No ambient globals.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub db_max_connections: u32,
    pub jwt_secret: String,
    pub jwt_algorithm: Algorithm,
    pub token_expire_minutes: i64,
    pub admin_username: String,
    pub admin_password: String,
}

impl Config {
    pub fn load() -> Self {
        Self {
            database_url: required("DATABASE_URL"),
            port: try_load("PORT", "8000"),
            db_max_connections: try_load("DB_MAX_CONNECTIONS", "5"),
            jwt_secret: load_secret("JWT_SECRET_KEY", "supersecretkey"),
            jwt_algorithm: try_load("JWT_ALGORITHM", "HS256"),
            token_expire_minutes: try_load("ACCESS_TOKEN_EXPIRE_MINUTES", "60"),
            admin_username: try_load("ADMIN_USERNAME", "admin"),
            admin_password: load_secret("ADMIN_PASSWORD", "admin123"),
        }
    }
}

fn required(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} must be set"))
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    env::var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| warn!("Invalid {key} value: {e}"))
        .unwrap_or_else(|()| panic!("{key} misconfigured"))
}

fn load_secret(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| {
        warn!("{key} not set, falling back to the built-in development value");
        default.to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn algorithm_parses_from_env_string() {
        assert_eq!("HS256".parse::<Algorithm>().unwrap(), Algorithm::HS256);
        assert_eq!("HS512".parse::<Algorithm>().unwrap(), Algorithm::HS512);
    }
}
