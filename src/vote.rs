// src/vote.rs
//! Vote ingestion: one participant row plus one vote per answered question,
//! all-or-nothing. Parent-child validation happens inside the transaction;
//! the (participant_id, question_id) unique index is the last line of
//! defense against duplicates and surfaces as a 409.

use chrono::Utc;
use sqlx::PgPool;

use crate::error::AppError;
use crate::models::{Poll, VoteSubmit};

/// Reject submissions the poll's state does not allow. Each precondition is
/// a distinct failure; a closed session is reported even if is_active was
/// never flipped off.
pub fn check_open(poll: &Poll) -> Result<(), AppError> {
    if !poll.is_active {
        return Err(AppError::NotFound("Active poll not found".to_string()));
    }
    if poll.archived {
        return Err(AppError::Closed("Poll is archived".to_string()));
    }
    if poll.expired_at(Utc::now()) {
        return Err(AppError::Closed("Poll session has ended".to_string()));
    }
    Ok(())
}

pub async fn submit(pool: &PgPool, poll: &Poll, payload: VoteSubmit) -> Result<i32, AppError> {
    check_open(poll)?;
    if payload.participant.name.trim().is_empty() {
        return Err(AppError::Validation("Participant name is required".to_string()));
    }

    let mut tx = pool.begin().await?;

    let participant_id = sqlx::query_scalar::<_, i32>(
        "INSERT INTO participants (poll_id, name, company, email) \
         VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(poll.id)
    .bind(payload.participant.name.trim())
    .bind(&payload.participant.company)
    .bind(&payload.participant.email)
    .fetch_one(&mut *tx)
    .await?;

    for vote in &payload.votes {
        let question = sqlx::query_scalar::<_, i32>(
            "SELECT id FROM questions WHERE id = $1 AND poll_id = $2",
        )
        .bind(vote.question_id)
        .bind(poll.id)
        .fetch_optional(&mut *tx)
        .await?;
        if question.is_none() {
            return Err(AppError::Validation(format!(
                "Invalid question ID {}",
                vote.question_id
            )));
        }

        let choice = sqlx::query_scalar::<_, i32>(
            "SELECT id FROM choices WHERE id = $1 AND question_id = $2",
        )
        .bind(vote.choice_id)
        .bind(vote.question_id)
        .fetch_optional(&mut *tx)
        .await?;
        if choice.is_none() {
            return Err(AppError::Validation(format!(
                "Invalid choice ID {}",
                vote.choice_id
            )));
        }

        sqlx::query("INSERT INTO votes (participant_id, choice_id, question_id) VALUES ($1, $2, $3)")
            .bind(participant_id)
            .bind(vote.choice_id)
            .bind(vote.question_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db) if db.is_unique_violation() => AppError::Conflict(
                    format!("Duplicate vote for question {}", vote.question_id),
                ),
                _ => AppError::Database(e),
            })?;
    }

    tx.commit().await?;
    Ok(participant_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn poll() -> Poll {
        Poll {
            id: 7,
            title: "Quiz".to_string(),
            description: None,
            slug: Some("quiz".to_string()),
            poll_type: "trivia".to_string(),
            is_active: true,
            archived: false,
            start_time: Some(Utc::now()),
            end_time: None,
            created_by: Some(1),
        }
    }

    #[test]
    fn open_poll_passes_preconditions() {
        assert!(check_open(&poll()).is_ok());
    }

    #[test]
    fn inactive_poll_is_not_found() {
        let mut p = poll();
        p.is_active = false;
        assert!(matches!(check_open(&p), Err(AppError::NotFound(_))));
    }

    #[test]
    fn archived_poll_is_closed() {
        let mut p = poll();
        p.archived = true;
        assert!(matches!(check_open(&p), Err(AppError::Closed(_))));
    }

    #[test]
    fn past_end_time_is_closed_even_while_active() {
        let mut p = poll();
        p.end_time = Some(Utc::now() - Duration::minutes(1));
        assert!(p.is_active);
        assert!(matches!(check_open(&p), Err(AppError::Closed(_))));
    }
}
