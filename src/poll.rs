// src/poll.rs
//! Poll lifecycle: atomic nested create, activation window management,
//! archive/unarchive, destructive reactivation, and ordered cascading delete.

use chrono::{Duration, Utc};
use sqlx::PgPool;

use crate::error::AppError;
use crate::models::{
    Choice, ChoiceRead, Poll, PollCreate, PollRead, Question, QuestionRead, ALLOWED_POLL_TYPES,
    POLL_TYPE_TRIVIA,
};
use crate::slug;

pub async fn get(pool: &PgPool, poll_id: i32) -> Result<Option<Poll>, AppError> {
    let poll = sqlx::query_as::<_, Poll>("SELECT * FROM polls WHERE id = $1")
        .bind(poll_id)
        .fetch_optional(pool)
        .await?;
    Ok(poll)
}

pub async fn get_or_404(pool: &PgPool, poll_id: i32) -> Result<Poll, AppError> {
    get(pool, poll_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Poll not found".to_string()))
}

pub async fn get_by_slug(pool: &PgPool, slug: &str) -> Result<Option<Poll>, AppError> {
    let poll = sqlx::query_as::<_, Poll>("SELECT * FROM polls WHERE lower(slug) = lower($1)")
        .bind(slug)
        .fetch_optional(pool)
        .await?;
    Ok(poll)
}

pub async fn get_by_title(pool: &PgPool, title: &str) -> Result<Option<Poll>, AppError> {
    let poll = sqlx::query_as::<_, Poll>("SELECT * FROM polls WHERE lower(title) = lower($1)")
        .bind(title)
        .fetch_optional(pool)
        .await?;
    Ok(poll)
}

pub async fn list_all(pool: &PgPool) -> Result<Vec<Poll>, AppError> {
    let polls = sqlx::query_as::<_, Poll>("SELECT * FROM polls ORDER BY id")
        .fetch_all(pool)
        .await?;
    Ok(polls)
}

/// Attendee-facing listing: active, not archived, optionally one poll_type.
pub async fn list_active(pool: &PgPool, poll_type: Option<&str>) -> Result<Vec<Poll>, AppError> {
    let polls = match poll_type {
        Some(kind) => {
            sqlx::query_as::<_, Poll>(
                "SELECT * FROM polls \
                 WHERE is_active = TRUE AND archived = FALSE AND poll_type = $1 ORDER BY id",
            )
            .bind(kind)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, Poll>(
                "SELECT * FROM polls WHERE is_active = TRUE AND archived = FALSE ORDER BY id",
            )
            .fetch_all(pool)
            .await?
        }
    };
    Ok(polls)
}

/// Atomic nested create: poll, then questions, then choices, one transaction.
/// Slug resolution happens inside the transaction so two concurrent creates
/// with the same title cannot end up with the same slug.
pub async fn create(pool: &PgPool, created_by: i32, payload: PollCreate) -> Result<i32, AppError> {
    if payload.title.trim().is_empty() {
        return Err(AppError::Validation("Poll title is required".to_string()));
    }
    let poll_type = payload
        .poll_type
        .unwrap_or_else(|| POLL_TYPE_TRIVIA.to_string());
    if !ALLOWED_POLL_TYPES.contains(&poll_type.as_str()) {
        return Err(AppError::Validation(format!(
            "Unknown poll_type '{poll_type}'"
        )));
    }
    for question in &payload.questions {
        if question.text.trim().is_empty() {
            return Err(AppError::Validation("Question text is required".to_string()));
        }
        for choice in &question.choices {
            if choice.text.trim().is_empty() {
                return Err(AppError::Validation("Choice text is required".to_string()));
            }
        }
    }

    let mut tx = pool.begin().await?;

    let requested = payload.slug.as_deref().unwrap_or(&payload.title);
    let base = slug::slugify(requested);
    let base = if base.is_empty() {
        slug::random_code()
    } else {
        base
    };
    let poll_slug = slug::unique_slug(&mut *tx, &base).await?;

    let poll_id = sqlx::query_scalar::<_, i32>(
        "INSERT INTO polls \
         (title, description, slug, poll_type, is_active, archived, start_time, end_time, created_by) \
         VALUES ($1, $2, $3, $4, FALSE, FALSE, $5, $6, $7) RETURNING id",
    )
    .bind(payload.title.trim())
    .bind(&payload.description)
    .bind(&poll_slug)
    .bind(&poll_type)
    .bind(payload.start_time)
    .bind(payload.end_time)
    .bind(created_by)
    .fetch_one(&mut *tx)
    .await?;

    for question in &payload.questions {
        let question_id = sqlx::query_scalar::<_, i32>(
            "INSERT INTO questions (poll_id, text) VALUES ($1, $2) RETURNING id",
        )
        .bind(poll_id)
        .bind(question.text.trim())
        .fetch_one(&mut *tx)
        .await?;

        for choice in &question.choices {
            sqlx::query("INSERT INTO choices (question_id, text, is_correct) VALUES ($1, $2, $3)")
                .bind(question_id)
                .bind(choice.text.trim())
                .bind(choice.is_correct)
                .execute(&mut *tx)
                .await?;
        }
    }

    tx.commit().await?;
    Ok(poll_id)
}

pub async fn activate(pool: &PgPool, poll_id: i32) -> Result<(), AppError> {
    let result = sqlx::query("UPDATE polls SET is_active = TRUE, start_time = $2 WHERE id = $1")
        .bind(poll_id)
        .bind(Utc::now())
        .execute(pool)
        .await?;
    ensure_touched(result.rows_affected())
}

pub async fn deactivate(pool: &PgPool, poll_id: i32) -> Result<(), AppError> {
    let result = sqlx::query("UPDATE polls SET is_active = FALSE, end_time = $2 WHERE id = $1")
        .bind(poll_id)
        .bind(Utc::now())
        .execute(pool)
        .await?;
    ensure_touched(result.rows_affected())
}

pub async fn activate_by_slug(pool: &PgPool, poll_slug: &str) -> Result<(), AppError> {
    let result =
        sqlx::query("UPDATE polls SET is_active = TRUE, start_time = $2 WHERE lower(slug) = lower($1)")
            .bind(poll_slug)
            .bind(Utc::now())
            .execute(pool)
            .await?;
    ensure_touched(result.rows_affected())
}

pub async fn deactivate_by_slug(pool: &PgPool, poll_slug: &str) -> Result<(), AppError> {
    let result =
        sqlx::query("UPDATE polls SET is_active = FALSE, end_time = $2 WHERE lower(slug) = lower($1)")
            .bind(poll_slug)
            .bind(Utc::now())
            .execute(pool)
            .await?;
    ensure_touched(result.rows_affected())
}

/// Archived polls disappear from attendee listings but keep their data for
/// analytics. The window end is stamped only if it was never set.
pub async fn archive(pool: &PgPool, poll_id: i32) -> Result<(), AppError> {
    let result = sqlx::query(
        "UPDATE polls SET archived = TRUE, is_active = FALSE, \
         end_time = COALESCE(end_time, $2) WHERE id = $1",
    )
    .bind(poll_id)
    .bind(Utc::now())
    .execute(pool)
    .await?;
    ensure_touched(result.rows_affected())
}

pub async fn unarchive(pool: &PgPool, poll_id: i32) -> Result<(), AppError> {
    let result = sqlx::query("UPDATE polls SET archived = FALSE WHERE id = $1")
        .bind(poll_id)
        .execute(pool)
        .await?;
    ensure_touched(result.rows_affected())
}

/// Fresh activity window starting now and ending `minutes` later, with the
/// requested minutes clamped to at least one.
pub fn reactivation_window(
    now: chrono::DateTime<Utc>,
    minutes: i64,
) -> (chrono::DateTime<Utc>, chrono::DateTime<Utc>) {
    (now, now + Duration::minutes(minutes.max(1)))
}

/// Destructive reset used to rerun a live event: wipes every participant and
/// vote for the poll (questions and choices survive) and opens a fresh
/// window of `minutes` (clamped to at least one).
pub async fn reactivate(pool: &PgPool, poll_id: i32, minutes: i64) -> Result<(), AppError> {
    let (start_time, end_time) = reactivation_window(Utc::now(), minutes);

    let mut tx = pool.begin().await?;

    sqlx::query(
        "DELETE FROM votes WHERE participant_id IN \
         (SELECT id FROM participants WHERE poll_id = $1)",
    )
    .bind(poll_id)
    .execute(&mut *tx)
    .await?;
    sqlx::query("DELETE FROM participants WHERE poll_id = $1")
        .bind(poll_id)
        .execute(&mut *tx)
        .await?;

    let result = sqlx::query(
        "UPDATE polls SET is_active = TRUE, archived = FALSE, start_time = $2, end_time = $3 \
         WHERE id = $1",
    )
    .bind(poll_id)
    .bind(start_time)
    .bind(end_time)
    .execute(&mut *tx)
    .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Poll not found".to_string()));
    }

    tx.commit().await?;
    Ok(())
}

/// Ordered cascading delete in dependency order, one transaction: a failure
/// anywhere leaves the original rows fully intact.
pub async fn delete(pool: &PgPool, poll_id: i32) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "DELETE FROM votes WHERE question_id IN (SELECT id FROM questions WHERE poll_id = $1)",
    )
    .bind(poll_id)
    .execute(&mut *tx)
    .await?;
    sqlx::query("DELETE FROM participants WHERE poll_id = $1")
        .bind(poll_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query(
        "DELETE FROM choices WHERE question_id IN (SELECT id FROM questions WHERE poll_id = $1)",
    )
    .bind(poll_id)
    .execute(&mut *tx)
    .await?;
    sqlx::query("DELETE FROM questions WHERE poll_id = $1")
        .bind(poll_id)
        .execute(&mut *tx)
        .await?;
    let result = sqlx::query("DELETE FROM polls WHERE id = $1")
        .bind(poll_id)
        .execute(&mut *tx)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Poll not found".to_string()));
    }

    tx.commit().await?;
    Ok(())
}

/// Serialize a poll with its nested questions and choices plus the derived
/// `expired` flag. Two queries; choices are grouped in memory.
pub async fn read(pool: &PgPool, poll: Poll) -> Result<PollRead, AppError> {
    let questions =
        sqlx::query_as::<_, Question>("SELECT * FROM questions WHERE poll_id = $1 ORDER BY id")
            .bind(poll.id)
            .fetch_all(pool)
            .await?;
    let question_ids: Vec<i32> = questions.iter().map(|q| q.id).collect();
    let choices = sqlx::query_as::<_, Choice>(
        "SELECT * FROM choices WHERE question_id = ANY($1) ORDER BY id",
    )
    .bind(&question_ids)
    .fetch_all(pool)
    .await?;

    let questions = questions
        .into_iter()
        .map(|question| QuestionRead {
            id: question.id,
            text: question.text,
            choices: choices
                .iter()
                .filter(|c| c.question_id == question.id)
                .map(|c| ChoiceRead {
                    id: c.id,
                    text: c.text.clone(),
                })
                .collect(),
        })
        .collect();

    let expired = poll.expired_at(Utc::now());
    Ok(PollRead {
        id: poll.id,
        title: poll.title,
        description: poll.description,
        slug: poll.slug,
        poll_type: poll.poll_type,
        is_active: poll.is_active,
        archived: poll.archived,
        start_time: poll.start_time,
        end_time: poll.end_time,
        expired,
        questions,
    })
}

fn ensure_touched(rows: u64) -> Result<(), AppError> {
    if rows == 0 {
        Err(AppError::NotFound("Poll not found".to_string()))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reactivation_window_spans_the_requested_minutes() {
        let now = Utc::now();
        let (start, end) = reactivation_window(now, 5);
        assert_eq!(start, now);
        assert_eq!(end - start, Duration::minutes(5));
    }

    #[test]
    fn reactivation_window_clamps_zero_minutes_to_one() {
        let now = Utc::now();
        let (start, end) = reactivation_window(now, 0);
        assert_eq!(end - start, Duration::minutes(1));
    }

    #[test]
    fn reactivation_window_clamps_negative_minutes_to_one() {
        let now = Utc::now();
        let (start, end) = reactivation_window(now, -30);
        assert_eq!(end - start, Duration::minutes(1));
    }
}
