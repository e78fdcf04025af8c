// src/migrations.rs
//! Idempotent schema migrations. The whole batch runs in one transaction and
//! every step is safe to re-run unboundedly; any failure aborts startup so the
//! service never serves traffic against a schema it cannot guarantee.

use sqlx::PgPool;
use tracing::info;

const CREATE_TABLES: &str = r#"
    CREATE TABLE IF NOT EXISTS users (
        id SERIAL PRIMARY KEY,
        username VARCHAR(150) NOT NULL UNIQUE,
        hashed_password TEXT NOT NULL,
        is_admin BOOLEAN NOT NULL DEFAULT TRUE
    );

    CREATE TABLE IF NOT EXISTS polls (
        id SERIAL PRIMARY KEY,
        title VARCHAR(255) NOT NULL,
        description TEXT,
        slug VARCHAR(255),
        poll_type VARCHAR(20) NOT NULL DEFAULT 'trivia',
        is_active BOOLEAN NOT NULL DEFAULT FALSE,
        archived BOOLEAN NOT NULL DEFAULT FALSE,
        start_time TIMESTAMPTZ,
        end_time TIMESTAMPTZ,
        created_by INTEGER REFERENCES users(id)
    );

    CREATE TABLE IF NOT EXISTS questions (
        id SERIAL PRIMARY KEY,
        poll_id INTEGER NOT NULL REFERENCES polls(id),
        text TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS choices (
        id SERIAL PRIMARY KEY,
        question_id INTEGER NOT NULL REFERENCES questions(id),
        text VARCHAR(255) NOT NULL,
        is_correct BOOLEAN NOT NULL DEFAULT FALSE
    );

    CREATE TABLE IF NOT EXISTS participants (
        id SERIAL PRIMARY KEY,
        poll_id INTEGER NOT NULL REFERENCES polls(id),
        name VARCHAR(150) NOT NULL,
        company VARCHAR(150),
        email VARCHAR(255)
    );

    CREATE TABLE IF NOT EXISTS votes (
        id SERIAL PRIMARY KEY,
        participant_id INTEGER NOT NULL REFERENCES participants(id),
        choice_id INTEGER NOT NULL REFERENCES choices(id),
        question_id INTEGER REFERENCES questions(id),
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    );
"#;

// Upgrade steps for databases created by earlier shapes of the schema.
// Ordering matters: columns are added and backfilled before NOT NULL is
// applied, and the votes uniqueness index comes after the backfill.
const UPGRADE_STEPS: &[&str] = &[
    // polls.slug + case-insensitive unique join codes
    "ALTER TABLE polls ADD COLUMN IF NOT EXISTS slug VARCHAR(255)",
    "CREATE UNIQUE INDEX IF NOT EXISTS ix_polls_slug_lower ON polls (lower(slug))",
    // polls.poll_type
    "ALTER TABLE polls ADD COLUMN IF NOT EXISTS poll_type VARCHAR(20) DEFAULT 'trivia'",
    "UPDATE polls SET poll_type = 'trivia' WHERE poll_type IS NULL",
    "ALTER TABLE polls ALTER COLUMN poll_type SET NOT NULL",
    // polls.archived
    "ALTER TABLE polls ADD COLUMN IF NOT EXISTS archived BOOLEAN DEFAULT FALSE",
    "UPDATE polls SET archived = FALSE WHERE archived IS NULL",
    "ALTER TABLE polls ALTER COLUMN archived SET NOT NULL",
    // choices.is_correct
    "ALTER TABLE choices ADD COLUMN IF NOT EXISTS is_correct BOOLEAN DEFAULT FALSE",
    "UPDATE choices SET is_correct = FALSE WHERE is_correct IS NULL",
    "ALTER TABLE choices ALTER COLUMN is_correct SET NOT NULL",
    // participants optional profile fields
    "ALTER TABLE participants ADD COLUMN IF NOT EXISTS company VARCHAR(150)",
    "ALTER TABLE participants ADD COLUMN IF NOT EXISTS email VARCHAR(255)",
    // votes.question_id: add nullable, backfill from the choice, tighten,
    // then enforce one vote per participant per question at the store level
    "ALTER TABLE votes ADD COLUMN IF NOT EXISTS question_id INTEGER REFERENCES questions(id)",
    "UPDATE votes SET question_id = c.question_id FROM choices c \
     WHERE votes.choice_id = c.id AND votes.question_id IS NULL",
    "ALTER TABLE votes ALTER COLUMN question_id SET NOT NULL",
    "CREATE UNIQUE INDEX IF NOT EXISTS ix_votes_participant_question \
     ON votes (participant_id, question_id)",
];

pub async fn run(pool: &PgPool) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::raw_sql(CREATE_TABLES).execute(&mut *tx).await?;
    for step in UPGRADE_STEPS {
        sqlx::query(step).execute(&mut *tx).await?;
    }

    tx.commit().await?;
    info!("schema migrations applied");
    Ok(())
}
