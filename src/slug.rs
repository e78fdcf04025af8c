// src/slug.rs
use rand::{distributions::Alphanumeric, Rng};
use sqlx::PgConnection;

use crate::error::AppError;

const RANDOM_CODE_LEN: usize = 6;

/// Normalize a title or requested join code into a URL-safe slug: lowercase,
/// non-alphanumeric runs collapsed to single hyphens, trimmed at both ends.
/// Returns an empty string when nothing survives normalization.
pub fn slugify(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_hyphen = false;
    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_hyphen && !out.is_empty() {
                out.push('-');
            }
            out.push(ch.to_ascii_lowercase());
            pending_hyphen = false;
        } else {
            pending_hyphen = true;
        }
    }
    out
}

/// Short random join code, used when a title slugifies to nothing.
pub fn random_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(RANDOM_CODE_LEN)
        .map(|b| (b as char).to_ascii_lowercase())
        .collect()
}

/// Candidate for the nth attempt at a base slug: the base itself first,
/// then `{base}-2`, `{base}-3`, and so on.
pub fn candidate(base: &str, attempt: u32) -> String {
    if attempt == 1 {
        base.to_string()
    } else {
        format!("{base}-{attempt}")
    }
}

/// Resolve a base slug to one that is unique among polls (case-insensitive),
/// appending -2, -3, ... deterministically. The check-then-insert here is
/// best effort; the unique index on lower(slug) is what actually rules out
/// a concurrent create landing on the same slug.
pub async fn unique_slug(conn: &mut PgConnection, base: &str) -> Result<String, AppError> {
    let mut attempt = 1u32;
    loop {
        let next = candidate(base, attempt);
        let taken = sqlx::query_scalar::<_, i32>(
            "SELECT 1 FROM polls WHERE lower(slug) = lower($1) LIMIT 1",
        )
        .bind(&next)
        .fetch_optional(&mut *conn)
        .await?;
        if taken.is_none() {
            return Ok(next);
        }
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_runs_and_trims() {
        assert_eq!(slugify("Friday Night Trivia!"), "friday-night-trivia");
        assert_eq!(slugify("  --Hello__World--  "), "hello-world");
        assert_eq!(slugify("A  B   C"), "a-b-c");
    }

    #[test]
    fn lowercases() {
        assert_eq!(slugify("QuizNight"), "quiznight");
    }

    #[test]
    fn empty_when_nothing_survives() {
        assert_eq!(slugify("???"), "");
        assert_eq!(slugify(""), "");
    }

    #[test]
    fn collision_candidates_count_up_from_the_bare_base() {
        let sequence: Vec<String> = (1..=4).map(|n| candidate("quiz-night", n)).collect();
        assert_eq!(
            sequence,
            vec!["quiz-night", "quiz-night-2", "quiz-night-3", "quiz-night-4"]
        );
    }

    #[test]
    fn random_codes_are_short_lowercase_alphanumeric() {
        let code = random_code();
        assert_eq!(code.len(), RANDOM_CODE_LEN);
        assert!(code.chars().all(|c| c.is_ascii_alphanumeric() && !c.is_ascii_uppercase()));
    }
}
