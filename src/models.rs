// models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const POLL_TYPE_TRIVIA: &str = "trivia";
pub const ALLOWED_POLL_TYPES: [&str; 3] = ["trivia", "survey", "poll"];

// ---------- Rows ----------

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i32,
    pub username: String,
    #[serde(skip_serializing)]
    pub hashed_password: String,
    pub is_admin: bool,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Poll {
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub slug: Option<String>,
    pub poll_type: String,
    pub is_active: bool,
    pub archived: bool,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub created_by: Option<i32>,
}

impl Poll {
    pub fn is_trivia(&self) -> bool {
        self.poll_type == POLL_TYPE_TRIVIA
    }

    /// Derived, never persisted: the session window has an end and it passed.
    pub fn expired_at(&self, now: DateTime<Utc>) -> bool {
        self.end_time.is_some_and(|end| end < now)
    }
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct Question {
    pub id: i32,
    pub poll_id: i32,
    pub text: String,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct Choice {
    pub id: i32,
    pub question_id: i32,
    pub text: String,
    pub is_correct: bool,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct Participant {
    pub id: i32,
    pub poll_id: i32,
    pub name: String,
    pub company: Option<String>,
    pub email: Option<String>,
}

// ---------- Auth payloads ----------

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct UserCreate {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct Token {
    pub access_token: String,
    pub token_type: String,
}

impl Token {
    pub fn bearer(access_token: String) -> Self {
        Self {
            access_token,
            token_type: "bearer".to_string(),
        }
    }
}

// ---------- Poll payloads ----------

#[derive(Debug, Deserialize)]
pub struct ChoiceCreate {
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

#[derive(Debug, Deserialize)]
pub struct QuestionCreate {
    pub text: String,
    pub choices: Vec<ChoiceCreate>,
}

#[derive(Debug, Deserialize)]
pub struct PollCreate {
    pub title: String,
    pub description: Option<String>,
    pub poll_type: Option<String>,
    pub slug: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub questions: Vec<QuestionCreate>,
}

#[derive(Debug, Deserialize)]
pub struct ReactivateRequest {
    pub minutes: i64,
}

// ---------- Vote payloads ----------

#[derive(Debug, Deserialize)]
pub struct ParticipantCreate {
    pub name: String,
    pub company: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VoteCreate {
    pub question_id: i32,
    pub choice_id: i32,
}

#[derive(Debug, Deserialize)]
pub struct VoteSubmit {
    pub participant: ParticipantCreate,
    pub votes: Vec<VoteCreate>,
}

// ---------- Read shapes ----------

/// Attendee-facing choice; deliberately omits is_correct so trivia answers
/// are never leaked before the session closes.
#[derive(Debug, Serialize)]
pub struct ChoiceRead {
    pub id: i32,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct QuestionRead {
    pub id: i32,
    pub text: String,
    pub choices: Vec<ChoiceRead>,
}

#[derive(Debug, Serialize)]
pub struct PollRead {
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub slug: Option<String>,
    pub poll_type: String,
    pub is_active: bool,
    pub archived: bool,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub expired: bool,
    pub questions: Vec<QuestionRead>,
}

/// Lightweight lookup result for join screens; 200s even when no poll matches.
#[derive(Debug, Serialize)]
pub struct PollStatus {
    pub exists: bool,
    pub active: bool,
    pub archived: bool,
    pub expired: bool,
}

impl PollStatus {
    pub fn absent() -> Self {
        Self {
            exists: false,
            active: false,
            archived: false,
            expired: false,
        }
    }

    pub fn of(poll: &Poll, now: DateTime<Utc>) -> Self {
        Self {
            exists: true,
            active: poll.is_active,
            archived: poll.archived,
            expired: poll.expired_at(now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn poll(end_time: Option<DateTime<Utc>>) -> Poll {
        Poll {
            id: 1,
            title: "Quiz".to_string(),
            description: None,
            slug: Some("quiz".to_string()),
            poll_type: "trivia".to_string(),
            is_active: true,
            archived: false,
            start_time: None,
            end_time,
            created_by: Some(1),
        }
    }

    #[test]
    fn expired_requires_a_past_end_time() {
        let now = Utc::now();
        assert!(!poll(None).expired_at(now));
        assert!(!poll(Some(now + Duration::minutes(5))).expired_at(now));
        assert!(poll(Some(now - Duration::seconds(1))).expired_at(now));
    }

    #[test]
    fn status_reflects_the_poll_even_when_expired_but_active() {
        let now = Utc::now();
        let stale = poll(Some(now - Duration::minutes(10)));
        let status = PollStatus::of(&stale, now);
        assert!(status.exists && status.active && status.expired);
        assert!(!status.archived);
    }

    #[test]
    fn only_trivia_polls_score() {
        let mut p = poll(None);
        assert!(p.is_trivia());
        p.poll_type = "survey".to_string();
        assert!(!p.is_trivia());
    }
}
