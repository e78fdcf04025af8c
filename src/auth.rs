// src/auth.rs
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{extract::FromRequestParts, http::request::Parts};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::info;

use crate::{config::Config, error::AppError, models::User, state::AppState};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AppError::Validation("Could not hash password".to_string()))
}

/// One-way check only: the candidate is hashed and compared against the
/// stored PHC string, never the other direction.
pub fn verify_password(password: &str, hashed: &str) -> bool {
    PasswordHash::new(hashed)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

pub fn create_access_token(config: &Config, username: &str) -> Result<String, AppError> {
    let exp = (Utc::now() + Duration::minutes(config.token_expire_minutes)).timestamp() as usize;
    let claims = Claims {
        sub: username.to_string(),
        exp,
    };
    encode(
        &Header::new(config.jwt_algorithm),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|_| AppError::Unauthorized)
}

/// Decode and verify signature + expiry. Every failure collapses into the
/// same 401 so the caller cannot tell which part of the check failed.
pub fn decode_token(config: &Config, token: &str) -> Result<Claims, AppError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::new(config.jwt_algorithm),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::Unauthorized)
}

/// Bootstrap the configured admin account so a fresh database is usable.
pub async fn ensure_default_admin(pool: &PgPool, config: &Config) -> Result<(), AppError> {
    let existing = sqlx::query_scalar::<_, i32>("SELECT id FROM users WHERE is_admin = TRUE LIMIT 1")
        .fetch_optional(pool)
        .await?;
    if existing.is_none() {
        let hashed = hash_password(&config.admin_password)?;
        sqlx::query("INSERT INTO users (username, hashed_password, is_admin) VALUES ($1, $2, TRUE)")
            .bind(&config.admin_username)
            .bind(&hashed)
            .execute(pool)
            .await?;
        info!("created default admin user '{}'", config.admin_username);
    }
    Ok(())
}

pub async fn find_user(pool: &PgPool, username: &str) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, username, hashed_password, is_admin FROM users WHERE username = $1",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

/// Extractor for admin-gated routes: bearer token, verified claims, a user
/// row the subject resolves to, and the admin flag on that user.
pub struct AdminUser(pub User);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(AppError::Unauthorized)?;
        let token = header.strip_prefix("Bearer ").ok_or(AppError::Unauthorized)?;

        let claims = decode_token(&state.config, token)?;
        let user = find_user(&state.pool, &claims.sub)
            .await?
            .ok_or(AppError::Unauthorized)?;
        if !user.is_admin {
            return Err(AppError::Forbidden);
        }
        Ok(AdminUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::Algorithm;

    fn config() -> Config {
        Config {
            database_url: "postgres://unused".to_string(),
            port: 8000,
            db_max_connections: 5,
            jwt_secret: "test-secret".to_string(),
            jwt_algorithm: Algorithm::HS256,
            token_expire_minutes: 60,
            admin_username: "admin".to_string(),
            admin_password: "admin123".to_string(),
        }
    }

    #[test]
    fn token_round_trips_subject() {
        let config = config();
        let token = create_access_token(&config, "admin").unwrap();
        let claims = decode_token(&config, &token).unwrap();
        assert_eq!(claims.sub, "admin");
        assert!(claims.exp > Utc::now().timestamp() as usize);
    }

    #[test]
    fn tampered_and_foreign_tokens_are_rejected() {
        let config = config();
        let token = create_access_token(&config, "admin").unwrap();

        let mut other = config.clone();
        other.jwt_secret = "another-secret".to_string();
        assert!(decode_token(&other, &token).is_err());
        assert!(decode_token(&config, "not-a-token").is_err());
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let mut config = config();
        config.token_expire_minutes = -120;
        let token = create_access_token(&config, "admin").unwrap();
        assert!(decode_token(&config, &token).is_err());
    }

    #[test]
    fn password_verification_is_one_way() {
        let hashed = hash_password("admin123").unwrap();
        assert_ne!(hashed, "admin123");
        assert!(verify_password("admin123", &hashed));
        assert!(!verify_password("wrong", &hashed));
        assert!(!verify_password("admin123", "not-a-phc-string"));
    }

    #[test]
    fn two_hashes_of_the_same_password_differ() {
        // Random salt per hash.
        let a = hash_password("pw").unwrap();
        let b = hash_password("pw").unwrap();
        assert_ne!(a, b);
        assert!(verify_password("pw", &a) && verify_password("pw", &b));
    }
}
