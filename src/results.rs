// src/results.rs
//! Results aggregation, computed on demand from the store with no persisted
//! caches. The arithmetic (tallies, leaderboard ordering, winner selection,
//! CSV rendering) is pure so it can be tested without a database.

use std::collections::HashMap;

use rand::seq::SliceRandom;
use serde::Serialize;
use sqlx::PgPool;

use crate::error::AppError;
use crate::models::{Choice, Poll, Question};

#[derive(Debug, Serialize)]
pub struct ChoiceTally {
    pub choice_id: i32,
    pub choice_text: String,
    pub votes: i64,
    pub percent: i64,
    pub is_correct: bool,
}

#[derive(Debug, Serialize)]
pub struct QuestionResult {
    pub question_id: i32,
    pub question_text: String,
    pub choices: Vec<ChoiceTally>,
}

#[derive(Debug, Serialize)]
pub struct PollResults {
    pub poll_id: i32,
    pub title: String,
    pub poll_type: String,
    pub results: Vec<QuestionResult>,
}

/// A participant with their correct-answer count, as fetched from the store.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ScoreRow {
    pub participant_id: i32,
    pub name: String,
    pub company: Option<String>,
    pub correct: i64,
}

#[derive(Debug, Serialize)]
pub struct LeaderboardEntry {
    pub participant_id: i32,
    pub name: String,
    pub company: Option<String>,
    pub correct: i64,
    pub total: i64,
    pub percent: i64,
}

// ---------- Pure aggregation ----------

/// Per-choice tallies for one question. A zero-vote question contributes a
/// denominator of 1 so every percentage is well defined (and 0).
pub fn tally_question(
    question: &Question,
    choices: &[Choice],
    counts: &HashMap<i32, i64>,
) -> QuestionResult {
    let total: i64 = choices
        .iter()
        .filter(|c| c.question_id == question.id)
        .map(|c| counts.get(&c.id).copied().unwrap_or(0))
        .sum();
    let denominator = total.max(1);

    QuestionResult {
        question_id: question.id,
        question_text: question.text.clone(),
        choices: choices
            .iter()
            .filter(|c| c.question_id == question.id)
            .map(|c| {
                let votes = counts.get(&c.id).copied().unwrap_or(0);
                ChoiceTally {
                    choice_id: c.id,
                    choice_text: c.text.clone(),
                    votes,
                    percent: percent_of(votes, denominator),
                    is_correct: c.is_correct,
                }
            })
            .collect(),
    }
}

fn percent_of(part: i64, whole: i64) -> i64 {
    (part as f64 / whole as f64 * 100.0).round() as i64
}

/// Winners: everyone who answered every question correctly. A poll with no
/// questions has no winners by definition.
pub fn winners(scores: &[ScoreRow], total_questions: i64) -> Vec<ScoreRow> {
    if total_questions == 0 {
        return Vec::new();
    }
    scores
        .iter()
        .filter(|s| s.correct == total_questions)
        .cloned()
        .collect()
}

/// Every participant ranked by correct count descending, ties broken by name
/// ascending (case-sensitive). Deterministic for identical inputs.
pub fn leaderboard(scores: &[ScoreRow], total_questions: i64) -> Vec<LeaderboardEntry> {
    let mut entries: Vec<LeaderboardEntry> = scores
        .iter()
        .map(|s| LeaderboardEntry {
            participant_id: s.participant_id,
            name: s.name.clone(),
            company: s.company.clone(),
            correct: s.correct,
            total: total_questions,
            percent: if total_questions == 0 {
                0
            } else {
                percent_of(s.correct, total_questions)
            },
        })
        .collect();
    entries.sort_by(|a, b| b.correct.cmp(&a.correct).then_with(|| a.name.cmp(&b.name)));
    entries
}

/// One row per (question, choice) pair in question-then-choice order,
/// matching the per-choice tallies; question_index is 1-based.
pub fn render_csv(poll: &Poll, results: &[QuestionResult]) -> String {
    let mut out = String::from(
        "poll_id,title,type,question_index,question_id,question_text,\
         choice_id,choice_text,votes,percent,is_correct\n",
    );
    for (index, question) in results.iter().enumerate() {
        for choice in &question.choices {
            out.push_str(&format!(
                "{},{},{},{},{},{},{},{},{},{},{}\n",
                poll.id,
                csv_field(&poll.title),
                poll.poll_type,
                index + 1,
                question.question_id,
                csv_field(&question.question_text),
                choice.choice_id,
                csv_field(&choice.choice_text),
                choice.votes,
                choice.percent,
                choice.is_correct,
            ));
        }
    }
    out
}

fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

// ---------- Store access ----------

pub async fn poll_results(pool: &PgPool, poll: &Poll) -> Result<PollResults, AppError> {
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

    let rows = sqlx::query_as::<_, (i32, i64)>(
        "SELECT choice_id, COUNT(*) FROM votes WHERE question_id = ANY($1) GROUP BY choice_id",
    )
    .bind(&question_ids)
    .fetch_all(pool)
    .await?;
    let counts: HashMap<i32, i64> = rows.into_iter().collect();

    Ok(PollResults {
        poll_id: poll.id,
        title: poll.title.clone(),
        poll_type: poll.poll_type.clone(),
        results: questions
            .iter()
            .map(|q| tally_question(q, &choices, &counts))
            .collect(),
    })
}

/// Correct-answer counts per participant. Only meaningful for trivia polls;
/// callers gate on the poll type before asking.
pub async fn scores(pool: &PgPool, poll: &Poll) -> Result<Vec<ScoreRow>, AppError> {
    if !poll.is_trivia() {
        return Err(AppError::Conflict(
            "Scoring is only available for trivia polls".to_string(),
        ));
    }
    let rows = sqlx::query_as::<_, ScoreRow>(
        "SELECT p.id AS participant_id, p.name, p.company, \
                COALESCE(SUM(CASE WHEN c.is_correct THEN 1 ELSE 0 END), 0) AS correct \
         FROM participants p \
         LEFT JOIN votes v ON v.participant_id = p.id \
         LEFT JOIN choices c ON c.id = v.choice_id \
         WHERE p.poll_id = $1 \
         GROUP BY p.id, p.name, p.company",
    )
    .bind(poll.id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn question_count(pool: &PgPool, poll_id: i32) -> Result<i64, AppError> {
    let count =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM questions WHERE poll_id = $1")
            .bind(poll_id)
            .fetch_one(pool)
            .await?;
    Ok(count)
}

/// Uniform random pick from the winner set; rejects when nobody has won.
pub fn pick_winner(winner_set: &[ScoreRow]) -> Result<ScoreRow, AppError> {
    winner_set
        .choose(&mut rand::thread_rng())
        .cloned()
        .ok_or_else(|| AppError::Conflict("No winners to pick from".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(id: i32) -> Question {
        Question {
            id,
            poll_id: 1,
            text: format!("Question {id}"),
        }
    }

    fn choice(id: i32, question_id: i32, correct: bool) -> Choice {
        Choice {
            id,
            question_id,
            text: format!("Choice {id}"),
            is_correct: correct,
        }
    }

    fn score(id: i32, name: &str, correct: i64) -> ScoreRow {
        ScoreRow {
            participant_id: id,
            name: name.to_string(),
            company: None,
            correct,
        }
    }

    fn poll() -> Poll {
        Poll {
            id: 1,
            title: "Q1".to_string(),
            description: None,
            slug: Some("q1".to_string()),
            poll_type: "trivia".to_string(),
            is_active: true,
            archived: false,
            start_time: None,
            end_time: None,
            created_by: Some(1),
        }
    }

    #[test]
    fn tally_splits_votes_and_percentages() {
        // "2+2?" with "4" (correct) and "5": one vote each.
        let q = question(10);
        let choices = vec![choice(100, 10, true), choice(101, 10, false)];
        let counts = HashMap::from([(100, 1_i64), (101, 1_i64)]);

        let result = tally_question(&q, &choices, &counts);
        assert_eq!(result.choices.len(), 2);
        assert_eq!(result.choices[0].votes, 1);
        assert_eq!(result.choices[0].percent, 50);
        assert_eq!(result.choices[1].percent, 50);
        assert!(result.choices[0].is_correct);
    }

    #[test]
    fn zero_vote_question_reports_zero_percent_without_dividing_by_zero() {
        let q = question(10);
        let choices = vec![choice(100, 10, false), choice(101, 10, false)];
        let result = tally_question(&q, &choices, &HashMap::new());
        assert!(result.choices.iter().all(|c| c.votes == 0 && c.percent == 0));
    }

    #[test]
    fn percentages_round_to_nearest() {
        let q = question(1);
        let choices = vec![choice(1, 1, false), choice(2, 1, false), choice(3, 1, false)];
        let counts = HashMap::from([(1, 1_i64), (2, 1_i64), (3, 1_i64)]);
        let result = tally_question(&q, &choices, &counts);
        // 1/3 rounds to 33.
        assert!(result.choices.iter().all(|c| c.percent == 33));
    }

    #[test]
    fn winners_are_exactly_the_perfect_scores() {
        let scores = vec![score(1, "Alice", 3), score(2, "Bob", 2), score(3, "Cara", 3)];
        let set = winners(&scores, 3);
        let names: Vec<&str> = set.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Alice", "Cara"]);
    }

    #[test]
    fn zero_question_polls_have_no_winners() {
        let scores = vec![score(1, "Alice", 0)];
        assert!(winners(&scores, 0).is_empty());
    }

    #[test]
    fn leaderboard_orders_by_correct_desc_then_name_asc() {
        let scores = vec![
            score(1, "Bob", 1),
            score(2, "Alice", 1),
            score(3, "Zoe", 2),
            score(4, "alice", 1),
        ];
        let board = leaderboard(&scores, 2);
        let names: Vec<&str> = board.iter().map(|e| e.name.as_str()).collect();
        // Case-sensitive lexicographic tie-break: uppercase sorts first.
        assert_eq!(names, vec!["Zoe", "Alice", "Bob", "alice"]);
        assert_eq!(board[0].percent, 100);
        assert_eq!(board[1].percent, 50);
    }

    #[test]
    fn leaderboard_is_deterministic() {
        let scores = vec![score(1, "Bob", 1), score(2, "Alice", 2)];
        let a: Vec<i32> = leaderboard(&scores, 2).iter().map(|e| e.participant_id).collect();
        let b: Vec<i32> = leaderboard(&scores, 2).iter().map(|e| e.participant_id).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn leaderboard_with_zero_questions_reports_zero_percent() {
        let board = leaderboard(&[score(1, "Alice", 0)], 0);
        assert_eq!(board[0].percent, 0);
        assert_eq!(board[0].total, 0);
    }

    #[test]
    fn pick_winner_rejects_an_empty_set() {
        assert!(matches!(pick_winner(&[]), Err(AppError::Conflict(_))));
    }

    #[test]
    fn pick_winner_returns_a_member_of_the_set() {
        let set = vec![score(1, "Alice", 2), score(2, "Bob", 2)];
        let picked = pick_winner(&set).unwrap();
        assert!(set.iter().any(|s| s.participant_id == picked.participant_id));
    }

    #[test]
    fn csv_has_one_row_per_choice_in_question_order() {
        let q1 = question(10);
        let q2 = question(11);
        let choices = vec![choice(100, 10, true), choice(101, 10, false), choice(102, 11, false)];
        let counts = HashMap::from([(100, 2_i64)]);
        let results = vec![
            tally_question(&q1, &choices, &counts),
            tally_question(&q2, &choices, &counts),
        ];

        let csv = render_csv(&poll(), &results);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("poll_id,title,type,question_index"));
        assert!(lines[1].starts_with("1,Q1,trivia,1,10,"));
        assert!(lines[3].starts_with("1,Q1,trivia,2,11,"));
        assert!(lines[1].ends_with("2,100,true"));
    }

    #[test]
    fn csv_quotes_fields_with_commas_and_quotes() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
