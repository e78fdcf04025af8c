// handlers.rs
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::auth::{self, AdminUser};
use crate::error::AppError;
use crate::models::{
    LoginRequest, PollCreate, PollRead, PollStatus, ReactivateRequest, Token, UserCreate,
    VoteSubmit,
};
use crate::results::{self, LeaderboardEntry, PollResults, ScoreRow};
use crate::state::AppState;
use crate::{poll, vote};

// ---------- Auth ----------

/// Validate admin credentials and mint a bearer token. A uniform 401 hides
/// which part of the check failed.
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<Token>, AppError> {
    let user = auth::find_user(&state.pool, &payload.username)
        .await?
        .ok_or(AppError::Unauthorized)?;
    if !user.is_admin || !auth::verify_password(&payload.password, &user.hashed_password) {
        return Err(AppError::Unauthorized);
    }
    let token = auth::create_access_token(&state.config, &user.username)?;
    Ok(Json(Token::bearer(token)))
}

/// Bootstrap an additional admin account and hand back a token for it.
pub async fn create_admin(
    State(state): State<AppState>,
    Json(payload): Json<UserCreate>,
) -> Result<Json<Token>, AppError> {
    if payload.username.trim().len() < 3 {
        return Err(AppError::Validation(
            "Username must be at least 3 characters".to_string(),
        ));
    }
    if payload.password.len() < 6 {
        return Err(AppError::Validation(
            "Password must be at least 6 characters".to_string(),
        ));
    }
    if auth::find_user(&state.pool, payload.username.trim())
        .await?
        .is_some()
    {
        return Err(AppError::Validation("Username already exists".to_string()));
    }

    let hashed = auth::hash_password(&payload.password)?;
    sqlx::query("INSERT INTO users (username, hashed_password, is_admin) VALUES ($1, $2, TRUE)")
        .bind(payload.username.trim())
        .bind(&hashed)
        .execute(&state.pool)
        .await?;

    let token = auth::create_access_token(&state.config, payload.username.trim())?;
    Ok(Json(Token::bearer(token)))
}

// ---------- Poll management (admin) ----------

pub async fn create_poll(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(payload): Json<PollCreate>,
) -> Result<(StatusCode, Json<PollRead>), AppError> {
    let poll_id = poll::create(&state.pool, admin.id, payload).await?;
    info!("admin '{}' created poll {poll_id}", admin.username);
    let created = poll::get_or_404(&state.pool, poll_id).await?;
    Ok((StatusCode::CREATED, Json(poll::read(&state.pool, created).await?)))
}

pub async fn list_polls(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<PollRead>>, AppError> {
    let mut out = Vec::new();
    for p in poll::list_all(&state.pool).await? {
        out.push(poll::read(&state.pool, p).await?);
    }
    Ok(Json(out))
}

pub async fn get_poll_admin(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(poll_id): Path<i32>,
) -> Result<Json<PollRead>, AppError> {
    let found = poll::get_or_404(&state.pool, poll_id).await?;
    Ok(Json(poll::read(&state.pool, found).await?))
}

pub async fn activate_poll(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(poll_id): Path<i32>,
) -> Result<Json<Value>, AppError> {
    poll::activate(&state.pool, poll_id).await?;
    Ok(Json(json!({ "detail": "Poll activated" })))
}

pub async fn deactivate_poll(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(poll_id): Path<i32>,
) -> Result<Json<Value>, AppError> {
    poll::deactivate(&state.pool, poll_id).await?;
    Ok(Json(json!({ "detail": "Poll deactivated" })))
}

pub async fn archive_poll(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(poll_id): Path<i32>,
) -> Result<Json<Value>, AppError> {
    poll::archive(&state.pool, poll_id).await?;
    Ok(Json(json!({ "detail": "Poll archived" })))
}

pub async fn unarchive_poll(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(poll_id): Path<i32>,
) -> Result<Json<Value>, AppError> {
    poll::unarchive(&state.pool, poll_id).await?;
    Ok(Json(json!({ "detail": "Poll unarchived" })))
}

pub async fn reactivate_poll(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(poll_id): Path<i32>,
    Json(payload): Json<ReactivateRequest>,
) -> Result<Json<Value>, AppError> {
    poll::reactivate(&state.pool, poll_id, payload.minutes).await?;
    info!("poll {poll_id} reactivated for {} minute(s)", payload.minutes.max(1));
    Ok(Json(json!({ "detail": "Poll reactivated" })))
}

pub async fn delete_poll(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(poll_id): Path<i32>,
) -> Result<Json<Value>, AppError> {
    poll::delete(&state.pool, poll_id).await?;
    info!("admin '{}' deleted poll {poll_id}", admin.username);
    Ok(Json(json!({ "detail": "Poll deleted" })))
}

pub async fn activate_poll_by_slug(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(poll_slug): Path<String>,
) -> Result<Json<Value>, AppError> {
    poll::activate_by_slug(&state.pool, &poll_slug).await?;
    Ok(Json(json!({ "detail": "Poll activated" })))
}

pub async fn deactivate_poll_by_slug(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(poll_slug): Path<String>,
) -> Result<Json<Value>, AppError> {
    poll::deactivate_by_slug(&state.pool, &poll_slug).await?;
    Ok(Json(json!({ "detail": "Poll deactivated" })))
}

// ---------- Results (admin) ----------

pub async fn poll_results(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(poll_id): Path<i32>,
) -> Result<Json<PollResults>, AppError> {
    let found = poll::get_or_404(&state.pool, poll_id).await?;
    Ok(Json(results::poll_results(&state.pool, &found).await?))
}

pub async fn poll_results_csv(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(poll_id): Path<i32>,
) -> Result<Response, AppError> {
    let found = poll::get_or_404(&state.pool, poll_id).await?;
    let aggregated = results::poll_results(&state.pool, &found).await?;
    let body = results::render_csv(&found, &aggregated.results);
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"poll-{poll_id}-results.csv\""),
            ),
        ],
        body,
    )
        .into_response())
}

pub async fn poll_winners(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(poll_id): Path<i32>,
) -> Result<Json<Vec<ScoreRow>>, AppError> {
    let found = poll::get_or_404(&state.pool, poll_id).await?;
    let scores = results::scores(&state.pool, &found).await?;
    let total = results::question_count(&state.pool, found.id).await?;
    Ok(Json(results::winners(&scores, total)))
}

pub async fn poll_leaderboard(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(poll_id): Path<i32>,
) -> Result<Json<Vec<LeaderboardEntry>>, AppError> {
    let found = poll::get_or_404(&state.pool, poll_id).await?;
    let scores = results::scores(&state.pool, &found).await?;
    let total = results::question_count(&state.pool, found.id).await?;
    Ok(Json(results::leaderboard(&scores, total)))
}

pub async fn pick_winner(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(poll_id): Path<i32>,
) -> Result<Json<ScoreRow>, AppError> {
    let found = poll::get_or_404(&state.pool, poll_id).await?;
    let scores = results::scores(&state.pool, &found).await?;
    let total = results::question_count(&state.pool, found.id).await?;
    let winner_set = results::winners(&scores, total);
    Ok(Json(results::pick_winner(&winner_set)?))
}

// ---------- Attendee-facing ----------

#[derive(Debug, Deserialize)]
pub struct ActiveQuery {
    pub poll_type: Option<String>,
}

pub async fn active_polls(
    State(state): State<AppState>,
    Query(query): Query<ActiveQuery>,
) -> Result<Json<Vec<PollRead>>, AppError> {
    let mut out = Vec::new();
    for p in poll::list_active(&state.pool, query.poll_type.as_deref()).await? {
        out.push(poll::read(&state.pool, p).await?);
    }
    Ok(Json(out))
}

#[derive(Debug, Deserialize)]
pub struct TitleQuery {
    pub title: String,
}

pub async fn poll_by_title(
    State(state): State<AppState>,
    Query(query): Query<TitleQuery>,
) -> Result<Json<PollRead>, AppError> {
    let found = poll::get_by_title(&state.pool, &query.title)
        .await?
        .filter(|p| p.is_active && !p.archived)
        .ok_or_else(|| AppError::NotFound("Active poll not found for given title".to_string()))?;
    Ok(Json(poll::read(&state.pool, found).await?))
}

pub async fn poll_by_slug(
    State(state): State<AppState>,
    Path(poll_slug): Path<String>,
) -> Result<Json<PollRead>, AppError> {
    let found = poll::get_by_slug(&state.pool, &poll_slug)
        .await?
        .filter(|p| p.is_active && !p.archived)
        .ok_or_else(|| AppError::NotFound("Active poll not found for given slug".to_string()))?;
    Ok(Json(poll::read(&state.pool, found).await?))
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub slug: Option<String>,
    pub title: Option<String>,
}

/// Lightweight join-screen probe; answers 200 with `exists: false` rather
/// than 404 so clients can poll it cheaply.
pub async fn poll_status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<PollStatus>, AppError> {
    let found = match (&query.slug, &query.title) {
        (Some(slug), _) => poll::get_by_slug(&state.pool, slug).await?,
        (None, Some(title)) => poll::get_by_title(&state.pool, title).await?,
        (None, None) => {
            return Err(AppError::Validation(
                "Provide a slug or title to look up".to_string(),
            ))
        }
    };
    Ok(Json(match found {
        Some(p) => PollStatus::of(&p, Utc::now()),
        None => PollStatus::absent(),
    }))
}

pub async fn get_active_poll(
    State(state): State<AppState>,
    Path(poll_id): Path<i32>,
) -> Result<Json<PollRead>, AppError> {
    let found = poll::get(&state.pool, poll_id)
        .await?
        .filter(|p| p.is_active && !p.archived)
        .ok_or_else(|| AppError::NotFound("Active poll not found".to_string()))?;
    Ok(Json(poll::read(&state.pool, found).await?))
}

pub async fn submit_votes(
    State(state): State<AppState>,
    Path(poll_id): Path<i32>,
    Json(payload): Json<VoteSubmit>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let found = poll::get_or_404(&state.pool, poll_id).await?;
    let participant_id = vote::submit(&state.pool, &found, payload).await?;
    info!("participant {participant_id} submitted votes for poll {poll_id}");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "detail": "Votes submitted successfully", "participant_id": participant_id })),
    ))
}
